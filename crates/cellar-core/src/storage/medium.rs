//! Key-value medium abstraction
//!
//! The store persists each collection as one JSON document under a fixed key.
//! A medium only needs to get, set and remove whole values; every write
//! either lands completely or not at all.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{StorageError, StorageResult};

/// Durable string key-value storage
pub trait KeyValueMedium: Send {
    /// Read a value. An absent key is `Ok(None)`, not an error.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replace the value under `key`
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()>;

    /// Replace several values in one all-or-nothing write
    fn set_many(&mut self, entries: &[(&str, String)]) -> StorageResult<()>;

    /// Remove a key. Removing an absent key is a no-op.
    fn remove(&mut self, key: &str) -> StorageResult<()>;

    /// Size information for status displays
    fn stats(&self) -> StorageResult<MediumStats>;
}

/// Medium shared between the store and the sync coordinator
pub type SharedMedium = Arc<Mutex<Box<dyn KeyValueMedium>>>;

/// Wrap a medium for sharing
pub fn share(medium: Box<dyn KeyValueMedium>) -> SharedMedium {
    Arc::new(Mutex::new(medium))
}

/// Acquire the medium for one critical section
pub fn lock(medium: &SharedMedium) -> StorageResult<MutexGuard<'_, Box<dyn KeyValueMedium>>> {
    medium.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Storage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediumStats {
    /// Number of stored keys
    pub keys: usize,
    /// Total bytes of stored values
    pub value_bytes: u64,
    /// Size of the backing file, when there is one
    pub file_bytes: Option<u64>,
    /// Configured quota, if any
    pub quota_bytes: Option<u64>,
}

impl MediumStats {
    /// Get human-readable size of the stored values
    pub fn value_size_human(&self) -> String {
        format_bytes(self.value_bytes)
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// In-process medium with an optional byte quota
///
/// The quota counts key and value bytes, mirroring how browser-style
/// storage accounts for usage.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    values: BTreeMap<String, String>,
    quota_bytes: Option<u64>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            values: BTreeMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn used_bytes(&self) -> u64 {
        self.values
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }

    /// Usage after replacing the given entries
    fn projected_bytes(&self, entries: &[(&str, &str)]) -> u64 {
        let mut used = self.used_bytes();
        for (key, value) in entries {
            if let Some(old) = self.values.get(*key) {
                used -= (key.len() + old.len()) as u64;
            }
            used += (key.len() + value.len()) as u64;
        }
        used
    }

    fn check_quota(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };
        let projected = self.projected_bytes(entries);
        if projected > quota {
            let keys: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
            return Err(StorageError::CapacityExceeded {
                key: keys.join(", "),
                details: format!("{} bytes needed, quota is {} bytes", projected, quota),
            });
        }
        Ok(())
    }
}

impl KeyValueMedium for MemoryMedium {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.check_quota(&[(key, value)])?;
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_many(&mut self, entries: &[(&str, String)]) -> StorageResult<()> {
        let borrowed: Vec<(&str, &str)> = entries.iter().map(|(k, v)| (*k, v.as_str())).collect();
        self.check_quota(&borrowed)?;
        for (key, value) in entries {
            self.values.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.values.remove(key);
        Ok(())
    }

    fn stats(&self) -> StorageResult<MediumStats> {
        Ok(MediumStats {
            keys: self.values.len(),
            value_bytes: self.values.values().map(|v| v.len() as u64).sum(),
            file_bytes: None,
            quota_bytes: self.quota_bytes,
        })
    }
}
