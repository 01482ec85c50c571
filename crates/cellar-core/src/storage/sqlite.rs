//! SQLite-backed key-value medium
//!
//! The durable default. Each write runs in its own transaction, so a failed
//! write (including running out of space) leaves the previous value intact.
//!
//! A storage quota is enforced with `PRAGMA max_page_count`; SQLite reports
//! `SQLITE_FULL` once the database would grow past it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::medium::{KeyValueMedium, MediumStats};
use super::schema::{init_schema, needs_init};

/// Key-value medium stored in a single SQLite file
pub struct SqliteMedium {
    conn: Connection,
    path: Option<PathBuf>,
    quota_bytes: Option<u64>,
}

impl SqliteMedium {
    /// Open or create the database at `path`
    pub fn open(path: &Path, quota_bytes: Option<u64>) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        let mut medium = Self {
            conn,
            path: Some(path.to_path_buf()),
            quota_bytes,
        };
        medium.prepare()?;
        debug!("Opened key-value database at {:?}", path);
        Ok(medium)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(quota_bytes: Option<u64>) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let mut medium = Self {
            conn,
            path: None,
            quota_bytes,
        };
        medium.prepare()?;
        Ok(medium)
    }

    fn prepare(&mut self) -> StorageResult<()> {
        if needs_init(&self.conn) {
            init_schema(&self.conn)?;
        }
        if let Some(quota) = self.quota_bytes {
            self.apply_quota(quota)?;
        }
        Ok(())
    }

    /// Cap the database size. SQLite never lowers the limit below the
    /// current size, so an existing database stays readable.
    fn apply_quota(&self, quota: u64) -> StorageResult<()> {
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))?;
        let pages = (quota as i64 / page_size.max(1)).max(1);
        let applied: i64 = self.conn.query_row(
            &format!("PRAGMA max_page_count = {}", pages),
            [],
            |row| row.get(0),
        )?;
        debug!("Storage quota {} bytes -> max_page_count {}", quota, applied);
        Ok(())
    }
}

impl KeyValueMedium for SqliteMedium {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.set_many(&[(key, value.to_string())])
    }

    fn set_many(&mut self, entries: &[(&str, String)]) -> StorageResult<()> {
        let now = Utc::now().timestamp_millis();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
        let keys = keys.join(", ");

        let tx = self
            .conn
            .transaction()
            .map_err(|e| StorageError::from_sqlite(e, &keys))?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .map_err(|e| StorageError::from_sqlite(e, key))?;
        }
        tx.commit().map_err(|e| StorageError::from_sqlite(e, &keys))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(|e| StorageError::from_sqlite(e, key))?;
        Ok(())
    }

    fn stats(&self) -> StorageResult<MediumStats> {
        let (keys, value_bytes): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0) FROM kv",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let file_bytes = self
            .path
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len());

        Ok(MediumStats {
            keys: keys as usize,
            value_bytes: value_bytes as u64,
            file_bytes,
            quota_bytes: self.quota_bytes,
        })
    }
}
