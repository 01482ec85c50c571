//! Whole-collection persistence
//!
//! Each collection lives under one fixed key as a JSON array (settings as a
//! single object). Reads deserialize the whole document; writes re-serialize
//! the whole document.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{StorageError, StorageResult};
use super::medium::KeyValueMedium;
use crate::models::{Bottle, Cellar, Settings};

pub const CELLARS_KEY: &str = "cv_cellars";
pub const BOTTLES_KEY: &str = "cv_bottles";
pub const SETTINGS_KEY: &str = "cv_settings";

/// An entity stored in a keyed collection
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// Storage key of the collection
    const KEY: &'static str;

    fn id(&self) -> &str;
}

impl Record for Cellar {
    const KEY: &'static str = CELLARS_KEY;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Bottle {
    const KEY: &'static str = BOTTLES_KEY;

    fn id(&self) -> &str {
        &self.id
    }
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> StorageResult<T> {
    serde_json::from_str(raw).map_err(|e| StorageError::Corrupt {
        key: key.to_string(),
        details: e.to_string(),
    })
}

pub(crate) fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|source| StorageError::Serialize {
        key: key.to_string(),
        source,
    })
}

/// Whether a key has ever been written
pub fn is_present(medium: &dyn KeyValueMedium, key: &str) -> StorageResult<bool> {
    Ok(medium.get(key)?.is_some())
}

/// Read a whole collection; an absent key is an empty collection
pub fn read_all<T: Record>(medium: &dyn KeyValueMedium) -> StorageResult<Vec<T>> {
    match medium.get(T::KEY)? {
        Some(raw) => decode(T::KEY, &raw),
        None => Ok(Vec::new()),
    }
}

/// Rewrite a whole collection
pub fn write_all<T: Record>(medium: &mut dyn KeyValueMedium, items: &[T]) -> StorageResult<()> {
    let raw = encode(T::KEY, items)?;
    medium.set(T::KEY, &raw)
}

/// Read the settings record, if one has been saved
pub fn read_settings(medium: &dyn KeyValueMedium) -> StorageResult<Option<Settings>> {
    medium
        .get(SETTINGS_KEY)?
        .map(|raw| decode(SETTINGS_KEY, &raw))
        .transpose()
}

/// Overwrite the settings record
pub fn write_settings(medium: &mut dyn KeyValueMedium, settings: &Settings) -> StorageResult<()> {
    let raw = encode(SETTINGS_KEY, settings)?;
    medium.set(SETTINGS_KEY, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryMedium;

    fn cellar(id: &str) -> Cellar {
        Cellar {
            id: id.to_string(),
            name: format!("Cellar {}", id),
            description: None,
            rows: 2,
            columns: 2,
        }
    }

    #[test]
    fn test_absent_collection_is_empty() {
        let medium = MemoryMedium::new();
        let cellars: Vec<Cellar> = read_all(&medium).unwrap();
        assert!(cellars.is_empty());
        assert!(!is_present(&medium, CELLARS_KEY).unwrap());
        assert!(read_settings(&medium).unwrap().is_none());
    }

    #[test]
    fn test_write_and_read_collection() {
        let mut medium = MemoryMedium::new();
        write_all(&mut medium, &[cellar("a"), cellar("b")]).unwrap();

        let cellars: Vec<Cellar> = read_all(&medium).unwrap();
        assert_eq!(cellars.len(), 2);
        assert_eq!(cellars[1].id(), "b");
        assert!(is_present(&medium, CELLARS_KEY).unwrap());
    }

    #[test]
    fn test_corrupt_collection_is_reported() {
        let mut medium = MemoryMedium::new();
        medium.set(BOTTLES_KEY, "{not json").unwrap();

        let err = read_all::<Bottle>(&medium).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { ref key, .. } if key == BOTTLES_KEY));
    }

    #[test]
    fn test_settings_round_trip() {
        let mut medium = MemoryMedium::new();
        let settings = Settings::custom("NZD", "NZ$");
        write_settings(&mut medium, &settings).unwrap();
        assert_eq!(read_settings(&medium).unwrap(), Some(settings));
    }
}
