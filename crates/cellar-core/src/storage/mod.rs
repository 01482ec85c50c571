//! Storage layer
//!
//! Persists each collection as one JSON document under a fixed key in a
//! key-value medium.
//!
//! ## Architecture
//!
//! - **Medium**: `KeyValueMedium` trait; `SqliteMedium` is the durable default,
//!   `MemoryMedium` backs tests and throwaway sessions
//! - **Collections**: whole-collection read and rewrite helpers on top of a medium
//!
//! Every collection write replaces the entire serialized document in a single
//! medium call, so a rejected write never leaves a partial collection behind.

pub mod atomic;
pub mod collection;
pub mod error;
pub mod medium;
pub mod schema;
pub mod sqlite;

pub use atomic::atomic_write;
pub use collection::{
    is_present, read_all, read_settings, write_all, write_settings, Record, BOTTLES_KEY,
    CELLARS_KEY, SETTINGS_KEY,
};
pub use error::{StorageError, StorageResult};
pub use medium::{
    format_bytes, lock, share, KeyValueMedium, MediumStats, MemoryMedium, SharedMedium,
};
pub use sqlite::SqliteMedium;
