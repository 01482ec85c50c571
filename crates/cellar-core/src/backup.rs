//! Backup export and import
//!
//! The backup document is also the sync payload: one JSON object with
//! optional `cellars`, `bottles` and `settings` keys. Import parses the whole
//! payload before touching storage, then replaces every collection the
//! payload names in a single write. Collections it leaves out stay as they
//! are.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Bottle, Cellar, Settings};
use crate::storage::collection::encode;
use crate::storage::{
    read_all, read_settings, KeyValueMedium, StorageError, BOTTLES_KEY, CELLARS_KEY, SETTINGS_KEY,
};

/// Errors from importing a backup or CSV file
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Backup is not valid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Backup must be a JSON object with cellars, bottles or settings")]
    NotAnObject,

    #[error("CSV parse error at record {record}: {source}")]
    Csv {
        record: usize,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Full or partial dataset snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cellars: Option<Vec<Cellar>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottles: Option<Vec<Bottle>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

impl Backup {
    /// Parse a payload without touching storage
    pub fn parse(payload: &str) -> Result<Self, ImportError> {
        let value: serde_json::Value = serde_json::from_str(payload)?;
        if !value.is_object() {
            return Err(ImportError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn is_empty(&self) -> bool {
        self.cellars.is_none() && self.bottles.is_none() && self.settings.is_none()
    }
}

/// What an import replaced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Number of cellars written, if the payload had them
    pub cellars: Option<usize>,
    pub bottles: Option<usize>,
    pub settings: bool,
}

impl ImportSummary {
    pub fn changed_anything(&self) -> bool {
        self.cellars.is_some() || self.bottles.is_some() || self.settings
    }
}

/// Snapshot every collection. Settings fall back to defaults.
pub fn export_from(medium: &dyn KeyValueMedium) -> Result<Backup, StorageError> {
    let cellars: Vec<Cellar> = read_all(medium)?;
    let bottles: Vec<Bottle> = read_all(medium)?;
    let settings = read_settings(medium)?.unwrap_or_default();
    debug!("Exporting {} cellars and {} bottles", cellars.len(), bottles.len());

    Ok(Backup {
        cellars: Some(cellars),
        bottles: Some(bottles),
        settings: Some(settings),
    })
}

/// Replace the collections present in `backup` in one write
pub fn apply_backup(medium: &mut dyn KeyValueMedium, backup: &Backup) -> Result<ImportSummary, StorageError> {
    let mut entries: Vec<(&str, String)> = Vec::new();
    let mut summary = ImportSummary::default();

    if let Some(cellars) = &backup.cellars {
        entries.push((CELLARS_KEY, encode(CELLARS_KEY, cellars)?));
        summary.cellars = Some(cellars.len());
    }
    if let Some(bottles) = &backup.bottles {
        entries.push((BOTTLES_KEY, encode(BOTTLES_KEY, bottles)?));
        summary.bottles = Some(bottles.len());
    }
    if let Some(settings) = &backup.settings {
        entries.push((SETTINGS_KEY, encode(SETTINGS_KEY, settings)?));
        summary.settings = true;
    }

    if !entries.is_empty() {
        medium.set_many(&entries)?;
    }
    info!(
        "Imported backup (cellars: {:?}, bottles: {:?}, settings: {})",
        summary.cellars, summary.bottles, summary.settings
    );
    Ok(summary)
}

/// Parse then apply; a malformed payload writes nothing
pub fn import_into(medium: &mut dyn KeyValueMedium, payload: &str) -> Result<ImportSummary, ImportError> {
    let backup = Backup::parse(payload)?;
    Ok(apply_backup(medium, &backup)?)
}
