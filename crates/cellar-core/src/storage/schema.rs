//! SQLite schema for the key-value medium
//!
//! One row per storage key. Values are the serialized JSON documents; the
//! database never interprets them.

use rusqlite::{Connection, OptionalExtension, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Statements that bring a database from version `i` to `i + 1`
const MIGRATIONS: &[&str] = &[r#"
    CREATE TABLE IF NOT EXISTS kv (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );
    "#];

/// Create the version table and run every pending migration
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_info (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
    )?;

    let from = stored_version(conn)?.unwrap_or(0).max(0) as usize;
    for migration in MIGRATIONS.iter().skip(from) {
        conn.execute_batch(migration)?;
    }

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Version recorded in `schema_info`, if any
fn stored_version(conn: &Connection) -> Result<Option<i32>> {
    conn.query_row(
        "SELECT value FROM schema_info WHERE key = 'version'",
        [],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .map(|v| v.and_then(|s| s.parse().ok()))
}

/// Whether the database is new or older than [`SCHEMA_VERSION`]
pub fn needs_init(conn: &Connection) -> bool {
    match stored_version(conn) {
        Ok(Some(version)) => version < SCHEMA_VERSION,
        // Missing schema_info table or unreadable version
        _ => true,
    }
}
