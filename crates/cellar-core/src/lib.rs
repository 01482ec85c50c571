//! Cellar Core Library
//!
//! This crate provides the core functionality for Cellar, a personal wine
//! inventory: cellars laid out as grids of slots, the bottles in them, and
//! an optional mirror of the whole dataset on a cloud drive.
//!
//! # Architecture
//!
//! - **Storage**: each collection is one JSON document under a fixed key in a
//!   key-value medium (SQLite on disk by default)
//! - **Store**: the single writer; every read goes to the medium
//! - **Sync**: whole-document pull and push, last writer wins
//!
//! # Quick Start
//!
//! ```text
//! let mut store = Store::open()?;
//!
//! let rack = store.create_cellar(NewCellar::new("Garage Rack", 4, 6))?;
//! let bottle = store.create_bottle(NewBottle::new("Ridge", "Zinfandel", Vintage::Year(2019), WineType::Red))?;
//! store.place_bottle(&bottle.id, &rack.id, Some(Coordinates::new(0, 0)))?;
//!
//! let stats = store.stats()?;
//! ```
//!
//! # Modules
//!
//! - `store`: Entity store (main entry point)
//! - `models`: Cellars, bottles, settings and their input types
//! - `query`: Search, filters and statistics
//! - `placement`: Slot occupancy rules
//! - `backup`: JSON export and import
//! - `csv_import`: Spreadsheet import
//! - `storage`: Key-value media
//! - `sync`: Cloud drive sync
//! - `config`: Application configuration

pub mod backup;
pub mod config;
pub mod csv_import;
pub mod models;
pub mod placement;
pub mod query;
pub mod storage;
pub mod store;
pub mod sync;

pub use backup::{Backup, ImportError, ImportSummary};
pub use config::Config;
pub use models::{
    Bottle, BottlePatch, BottleStatus, Cellar, CellarPatch, Coordinates, ModelError, NewBottle,
    NewCellar, Settings, Tasting, Vintage, WineType,
};
pub use placement::{CellarGrid, PlacementError, PlacementState};
pub use query::{CellarSummary, Stats};
pub use storage::{MediumStats, StorageError};
pub use store::Store;
pub use sync::{Credential, DriveClient, SyncCoordinator, SyncError, SyncNotifier};
