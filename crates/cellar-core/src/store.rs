//! Entity store
//!
//! The `Store` is the only writer of cellars, bottles and settings. Every
//! operation reads the current collection from the medium, so reads always
//! reflect the latest write; there is no cache.
//!
//! Each mutation is one read-modify-write under the medium lock. After it
//! succeeds the attached [`SyncNotifier`] (if any) is told about it.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = Store::open()?;
//!
//! let cellar = store.create_cellar(NewCellar::new("Garage Rack", 4, 6))?;
//! let bottle = store.create_bottle(NewBottle::new("Ridge", "Zinfandel", Vintage::Year(2019), WineType::Red))?;
//! store.place_bottle(&bottle.id, &cellar.id, Some(Coordinates::new(0, 0)))?;
//! ```

use anyhow::{Context, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::backup::{self, Backup, ImportSummary};
use crate::config::Config;
use crate::csv_import;
use crate::models::{
    now_millis, Bottle, BottlePatch, Cellar, CellarPatch, Coordinates, NewBottle, NewCellar,
    Settings, Tasting,
};
use crate::placement::{self, CellarGrid};
use crate::query::{self, CellarSummary, Stats};
use crate::storage::{
    is_present, lock, read_all, read_settings, share, write_all, write_settings, KeyValueMedium,
    MediumStats, MemoryMedium, SharedMedium, SqliteMedium, StorageResult, CELLARS_KEY,
};
use crate::sync::{Change, SyncNotifier};

/// Id of the cellar created on first run
pub const DEFAULT_CELLAR_ID: &str = "default_kitchen";

/// Generate a fresh entity id
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Result of a mutation closure
enum Outcome<T> {
    /// Something was written; notify sync
    Changed(T),
    /// Nothing to write
    Unchanged(T),
}

/// Entity store for cellars, bottles and settings
pub struct Store {
    medium: SharedMedium,
    config: Config,
    notifier: Option<SyncNotifier>,
}

impl Store {
    /// Open the store using the default configuration
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open the durable store described by `config`
    ///
    /// Seeds the default cellar on first run when `seed_default_cellar` is set.
    pub fn open_with_config(config: Config) -> Result<Self> {
        let medium = SqliteMedium::open(&config.database_path(), config.storage_quota_bytes)
            .context("Failed to open database")?;
        let store = Self::with_medium(Box::new(medium), config);
        if store.config.seed_default_cellar {
            store.seed_defaults()?;
        }
        Ok(store)
    }

    /// Build a store over any medium. Nothing is seeded.
    pub fn with_medium(medium: Box<dyn KeyValueMedium>, config: Config) -> Self {
        Self {
            medium: share(medium),
            config,
            notifier: None,
        }
    }

    /// Throwaway store backed by memory
    pub fn in_memory(config: Config) -> Self {
        Self::with_medium(Box::new(MemoryMedium::new()), config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle to the medium for the sync coordinator
    pub fn shared_medium(&self) -> SharedMedium {
        SharedMedium::clone(&self.medium)
    }

    /// Send a notification after every successful mutation
    pub fn attach_sync(&mut self, notifier: SyncNotifier) {
        self.notifier = Some(notifier);
    }

    /// Stop notifying. Dropping the returned notifier lets the push task end.
    pub fn detach_sync(&mut self) -> Option<SyncNotifier> {
        self.notifier.take()
    }

    /// Write the default cellar if the cellars key has never been written.
    ///
    /// Returns whether anything was seeded. Not a user mutation, so sync is
    /// not notified.
    pub fn seed_defaults(&self) -> Result<bool> {
        let mut medium = lock(&self.medium)?;
        if is_present(&**medium, CELLARS_KEY)? {
            return Ok(false);
        }
        let cellar = Cellar {
            id: DEFAULT_CELLAR_ID.to_string(),
            name: "Kitchen Fridge".to_string(),
            description: Some("Main dual-zone fridge".to_string()),
            rows: 6,
            columns: 6,
        };
        write_all(&mut **medium, &[cellar]).context("Failed to seed default cellar")?;
        info!("Seeded default cellar {}", DEFAULT_CELLAR_ID);
        Ok(true)
    }

    fn read<T>(&self, f: impl FnOnce(&dyn KeyValueMedium) -> StorageResult<T>) -> Result<T> {
        let medium = lock(&self.medium)?;
        Ok(f(&**medium)?)
    }

    /// Run one read-modify-write under the lock, then notify
    fn mutate<T>(
        &mut self,
        change: Change,
        f: impl FnOnce(&mut dyn KeyValueMedium) -> Result<Outcome<T>>,
    ) -> Result<T> {
        let outcome = {
            let mut medium = lock(&self.medium)?;
            f(&mut **medium)?
        };
        match outcome {
            Outcome::Changed(value) => {
                if let Some(notifier) = &self.notifier {
                    notifier.notify(change);
                }
                Ok(value)
            }
            Outcome::Unchanged(value) => Ok(value),
        }
    }

    // ==================== Cellar Operations ====================

    /// All cellars in insertion order
    pub fn cellars(&self) -> Result<Vec<Cellar>> {
        self.read(read_all).context("Failed to read cellars")
    }

    pub fn cellar(&self, id: &str) -> Result<Option<Cellar>> {
        Ok(self.cellars()?.into_iter().find(|c| c.id == id))
    }

    pub fn create_cellar(&mut self, new: NewCellar) -> Result<Cellar> {
        self.mutate(Change::Cellars, |medium| {
            let mut cellars: Vec<Cellar> = read_all(medium)?;
            let cellar = new.into_cellar(generate_id())?;
            cellars.push(cellar.clone());
            write_all(medium, &cellars)?;
            info!("Created cellar {} ({})", cellar.name, cellar.id);
            Ok(Outcome::Changed(cellar))
        })
        .context("Failed to create cellar")
    }

    /// Apply a patch; `None` if the id is unknown
    pub fn update_cellar(&mut self, id: &str, patch: CellarPatch) -> Result<Option<Cellar>> {
        self.mutate(Change::Cellars, |medium| {
            let mut cellars: Vec<Cellar> = read_all(medium)?;
            let Some(cellar) = cellars.iter_mut().find(|c| c.id == id) else {
                return Ok(Outcome::Unchanged(None));
            };
            patch.apply(cellar)?;
            let updated = cellar.clone();
            write_all(medium, &cellars)?;
            debug!("Updated cellar {}", id);
            Ok(Outcome::Changed(Some(updated)))
        })
        .context("Failed to update cellar")
    }

    /// Remove a cellar. Bottles that referenced it keep the dangling id.
    pub fn delete_cellar(&mut self, id: &str) -> Result<bool> {
        self.mutate(Change::Cellars, |medium| {
            let mut cellars: Vec<Cellar> = read_all(medium)?;
            let before = cellars.len();
            cellars.retain(|c| c.id != id);
            if cellars.len() == before {
                return Ok(Outcome::Unchanged(false));
            }
            write_all(medium, &cellars)?;
            info!("Deleted cellar {}", id);
            Ok(Outcome::Changed(true))
        })
        .context("Failed to delete cellar")
    }

    // ==================== Bottle Operations ====================

    /// All bottles in insertion order
    pub fn bottles(&self) -> Result<Vec<Bottle>> {
        self.read(read_all).context("Failed to read bottles")
    }

    pub fn bottle(&self, id: &str) -> Result<Option<Bottle>> {
        Ok(self.bottles()?.into_iter().find(|b| b.id == id))
    }

    pub fn create_bottle(&mut self, new: NewBottle) -> Result<Bottle> {
        let mut created = self.bulk_save_bottles(vec![new])?;
        created
            .pop()
            .context("Bulk save returned no bottle")
    }

    /// Append many bottles in a single write.
    ///
    /// A bottle that claims a taken slot (including one claimed earlier in
    /// the same batch) fails the whole batch with a
    /// [`placement::PlacementError`].
    pub fn bulk_save_bottles(&mut self, new: Vec<NewBottle>) -> Result<Vec<Bottle>> {
        if new.is_empty() {
            return Ok(Vec::new());
        }
        self.mutate(Change::Bottles, |medium| {
            let cellars: Vec<Cellar> = read_all(medium)?;
            let mut bottles: Vec<Bottle> = read_all(medium)?;
            let now = now_millis();
            let mut created = Vec::with_capacity(new.len());
            for n in new {
                let bottle = n.into_bottle(generate_id(), now);
                placement::check_slot_claim(&bottles, &cellars, &bottle)?;
                bottles.push(bottle.clone());
                created.push(bottle);
            }
            write_all(medium, &bottles)?;
            info!("Saved {} new bottle(s)", created.len());
            Ok(Outcome::Changed(created))
        })
        .context("Failed to save bottles")
    }

    /// Shallow-merge a patch; `None` if the id is unknown.
    ///
    /// A patch that moves the bottle into a taken or out-of-range slot is
    /// refused and nothing is written.
    pub fn update_bottle(&mut self, id: &str, patch: BottlePatch) -> Result<Option<Bottle>> {
        let moves = patch.touches_placement();
        let now = now_millis();
        self.mutate(Change::Bottles, |medium| {
            let mut bottles: Vec<Bottle> = read_all(medium)?;
            let Some(index) = bottles.iter().position(|b| b.id == id) else {
                return Ok(Outcome::Unchanged(None));
            };
            patch.apply(&mut bottles[index], now)?;
            if moves {
                let cellars: Vec<Cellar> = read_all(medium)?;
                placement::check_slot_claim(&bottles, &cellars, &bottles[index])?;
            }
            let updated = bottles[index].clone();
            write_all(medium, &bottles)?;
            debug!("Updated bottle {}", id);
            Ok(Outcome::Changed(Some(updated)))
        })
        .context("Failed to update bottle")
    }

    pub fn delete_bottle(&mut self, id: &str) -> Result<bool> {
        self.mutate(Change::Bottles, |medium| {
            let mut bottles: Vec<Bottle> = read_all(medium)?;
            let before = bottles.len();
            bottles.retain(|b| b.id != id);
            if bottles.len() == before {
                return Ok(Outcome::Unchanged(false));
            }
            write_all(medium, &bottles)?;
            info!("Deleted bottle {}", id);
            Ok(Outcome::Changed(true))
        })
        .context("Failed to delete bottle")
    }

    /// Add `count` active, unplaced copies of a bottle in one write.
    ///
    /// `None` if the source id is unknown.
    pub fn duplicate_bottle(&mut self, id: &str, count: usize) -> Result<Option<Vec<Bottle>>> {
        self.mutate(Change::Bottles, |medium| {
            let mut bottles: Vec<Bottle> = read_all(medium)?;
            let Some(source) = bottles.iter().find(|b| b.id == id).cloned() else {
                return Ok(Outcome::Unchanged(None));
            };
            if count == 0 {
                return Ok(Outcome::Unchanged(Some(Vec::new())));
            }
            let now = now_millis();
            let copies: Vec<Bottle> = (0..count)
                .map(|_| source.duplicate(generate_id(), now))
                .collect();
            bottles.extend(copies.iter().cloned());
            write_all(medium, &bottles)?;
            info!("Duplicated bottle {} x{}", id, count);
            Ok(Outcome::Changed(Some(copies)))
        })
        .context("Failed to duplicate bottle")
    }

    /// Mark a bottle consumed with tasting notes
    pub fn consume_bottle(&mut self, id: &str, tasting: Tasting) -> Result<Option<Bottle>> {
        let now = now_millis();
        self.modify_bottle(id, |bottle| Ok(tasting.apply(bottle, now)?))
            .context("Failed to consume bottle")
    }

    /// Change one bottle in place and persist the collection
    fn modify_bottle(
        &mut self,
        id: &str,
        f: impl FnOnce(&mut Bottle) -> Result<()>,
    ) -> Result<Option<Bottle>> {
        self.mutate(Change::Bottles, |medium| {
            let mut bottles: Vec<Bottle> = read_all(medium)?;
            let Some(bottle) = bottles.iter_mut().find(|b| b.id == id) else {
                return Ok(Outcome::Unchanged(None));
            };
            f(bottle)?;
            let updated = bottle.clone();
            write_all(medium, &bottles)?;
            debug!("Updated bottle {}", id);
            Ok(Outcome::Changed(Some(updated)))
        })
    }

    // ==================== Placement ====================

    /// Move a bottle into a cellar, at a slot or loose.
    ///
    /// The occupancy check and the write happen under one lock. A refusal is
    /// a [`placement::PlacementError`] and nothing is written.
    pub fn place_bottle(
        &mut self,
        bottle_id: &str,
        cellar_id: &str,
        coordinates: Option<Coordinates>,
    ) -> Result<Bottle> {
        self.mutate(Change::Bottles, |medium| {
            let cellars: Vec<Cellar> = read_all(medium)?;
            let mut bottles: Vec<Bottle> = read_all(medium)?;
            let index =
                placement::check_placement(&bottles, &cellars, bottle_id, cellar_id, coordinates)?;

            let bottle = &mut bottles[index];
            bottle.storage_id = Some(cellar_id.to_string());
            bottle.coordinates = coordinates;
            let placed = bottle.clone();
            write_all(medium, &bottles)?;
            match coordinates {
                Some(c) => info!("Placed bottle {} in {} at {}", bottle_id, cellar_id, c),
                None => info!("Moved bottle {} loose into {}", bottle_id, cellar_id),
            }
            Ok(Outcome::Changed(placed))
        })
    }

    /// Clear cellar and slot; `None` if the id is unknown
    pub fn unplace_bottle(&mut self, id: &str) -> Result<Option<Bottle>> {
        self.modify_bottle(id, |bottle| {
            bottle.storage_id = None;
            bottle.coordinates = None;
            Ok(())
        })
        .context("Failed to unplace bottle")
    }

    /// Keep the cellar but leave the slot
    pub fn loosen_bottle(&mut self, id: &str) -> Result<Option<Bottle>> {
        self.modify_bottle(id, |bottle| {
            bottle.coordinates = None;
            Ok(())
        })
        .context("Failed to loosen bottle")
    }

    pub fn is_slot_occupied(&self, cellar_id: &str, coordinates: Coordinates) -> Result<bool> {
        let bottles = self.bottles()?;
        Ok(placement::occupant(&bottles, cellar_id, coordinates, None).is_some())
    }

    /// Occupancy grid of one cellar; `None` if the id is unknown
    pub fn cellar_grid(&self, cellar_id: &str) -> Result<Option<CellarGrid>> {
        let Some(cellar) = self.cellar(cellar_id)? else {
            return Ok(None);
        };
        Ok(Some(CellarGrid::build(&cellar, &self.bottles()?)))
    }

    // ==================== Queries ====================

    pub fn search(&self, query: &str) -> Result<Vec<Bottle>> {
        Ok(query::search(&self.bottles()?, query))
    }

    pub fn bottles_in_cellar(&self, cellar_id: &str) -> Result<Vec<Bottle>> {
        Ok(query::bottles_in_cellar(&self.bottles()?, cellar_id))
    }

    pub fn unplaced_bottles(&self) -> Result<Vec<Bottle>> {
        Ok(query::unplaced_bottles(&self.bottles()?))
    }

    pub fn consumed_bottles(&self) -> Result<Vec<Bottle>> {
        Ok(query::consumed_bottles(&self.bottles()?))
    }

    pub fn distinct_varietals(&self) -> Result<Vec<String>> {
        Ok(query::distinct_varietals(&self.bottles()?))
    }

    pub fn stats(&self) -> Result<Stats> {
        Ok(query::stats(&self.bottles()?))
    }

    pub fn location_label(&self, bottle: &Bottle) -> Result<String> {
        Ok(query::location_label(bottle, &self.cellars()?))
    }

    pub fn bottle_counts_by_cellar(&self) -> Result<Vec<CellarSummary>> {
        Ok(query::bottle_counts_by_cellar(&self.cellars()?, &self.bottles()?))
    }

    // ==================== Settings ====================

    /// Saved settings, or the defaults if none were saved
    pub fn settings(&self) -> Result<Settings> {
        Ok(self
            .read(read_settings)
            .context("Failed to read settings")?
            .unwrap_or_default())
    }

    pub fn save_settings(&mut self, settings: &Settings) -> Result<()> {
        self.mutate(Change::Settings, |medium| {
            write_settings(medium, settings)?;
            info!("Saved settings (currency {})", settings.currency_code());
            Ok(Outcome::Changed(()))
        })
        .context("Failed to save settings")
    }

    // ==================== Backup ====================

    pub fn export_backup(&self) -> Result<Backup> {
        self.read(backup::export_from).context("Failed to export data")
    }

    /// Whole dataset as the backup/sync JSON document
    pub fn export_data(&self) -> Result<String> {
        self.export_backup()?
            .to_json()
            .context("Failed to serialize backup")
    }

    /// Replace the collections present in `payload`.
    ///
    /// A malformed payload is an [`backup::ImportError`] and nothing changes.
    pub fn import_data(&mut self, payload: &str) -> Result<ImportSummary> {
        let backup = Backup::parse(payload)?;
        self.mutate(Change::Import, |medium| {
            let summary = backup::apply_backup(medium, &backup)?;
            if summary.changed_anything() {
                Ok(Outcome::Changed(summary))
            } else {
                Ok(Outcome::Unchanged(summary))
            }
        })
        .context("Failed to import data")
    }

    /// Parse CSV then save every row in one write
    pub fn import_csv(&mut self, data: &[u8]) -> Result<Vec<Bottle>> {
        let new = csv_import::parse_csv_bytes(data)?;
        self.bulk_save_bottles(new)
    }

    // ==================== Status ====================

    pub fn medium_stats(&self) -> Result<MediumStats> {
        self.read(|medium| medium.stats())
            .context("Failed to read storage stats")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::ImportError;
    use crate::models::{BottleStatus, ModelError, Vintage, WineType};
    use crate::placement::PlacementError;
    use crate::storage::StorageError;
    use crate::sync::notification_channel;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        }
    }

    fn memory_store() -> Store {
        Store::in_memory(Config::default())
    }

    fn new_bottle(producer: &str) -> NewBottle {
        NewBottle::new(producer, "Cabernet Sauvignon", Vintage::Year(2018), WineType::Red)
    }

    #[test]
    fn test_open_seeds_default_cellar_once() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut store = Store::open_with_config(test_config(&temp_dir)).unwrap();
            let cellars = store.cellars().unwrap();
            assert_eq!(cellars.len(), 1);
            assert_eq!(cellars[0].id, DEFAULT_CELLAR_ID);
            assert_eq!(cellars[0].capacity(), 36);

            // Deleting it must not bring it back on reopen
            assert!(store.delete_cellar(DEFAULT_CELLAR_ID).unwrap());
        }

        let store = Store::open_with_config(test_config(&temp_dir)).unwrap();
        assert!(store.cellars().unwrap().is_empty());
    }

    #[test]
    fn test_seeding_can_be_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            seed_default_cellar: false,
            ..test_config(&temp_dir)
        };
        let store = Store::open_with_config(config).unwrap();
        assert!(store.cellars().unwrap().is_empty());
    }

    #[test]
    fn test_data_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let id = {
            let mut store = Store::open_with_config(test_config(&temp_dir)).unwrap();
            store.create_bottle(new_bottle("Ridge")).unwrap().id
        };

        let store = Store::open_with_config(test_config(&temp_dir)).unwrap();
        let bottle = store.bottle(&id).unwrap().unwrap();
        assert_eq!(bottle.producer, "Ridge");
    }

    #[test]
    fn test_cellar_crud() {
        let mut store = memory_store();
        let cellar = store
            .create_cellar(NewCellar::new("Garage", 3, 4).with_description("Rack"))
            .unwrap();
        assert_eq!(store.cellar(&cellar.id).unwrap(), Some(cellar.clone()));

        let patch = CellarPatch {
            name: Some("Garage Rack".to_string()),
            description: Some(None),
            ..CellarPatch::default()
        };
        let updated = store.update_cellar(&cellar.id, patch).unwrap().unwrap();
        assert_eq!(updated.name, "Garage Rack");
        assert!(updated.description.is_none());
        assert_eq!(updated.rows, 3);

        assert!(store.update_cellar("missing", CellarPatch::default()).unwrap().is_none());
        assert!(store.delete_cellar(&cellar.id).unwrap());
        assert!(!store.delete_cellar(&cellar.id).unwrap());
        assert!(store.cellars().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_cellar_rejected() {
        let mut store = memory_store();
        let err = store.create_cellar(NewCellar::new("Flat", 0, 3)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::InvalidDimensions { .. })
        ));
        assert!(store.cellars().unwrap().is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let mut store = memory_store();
        let created = store
            .bulk_save_bottles((0..50).map(|i| new_bottle(&i.to_string())).collect())
            .unwrap();
        let mut ids: Vec<&str> = created.iter().map(|b| b.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
        assert_eq!(store.bottles().unwrap().len(), 50);
    }

    #[test]
    fn test_create_bottle_defaults() {
        let mut store = memory_store();
        let bottle = store
            .create_bottle(new_bottle("Caymus").with_purchase_price(90.0))
            .unwrap();
        assert!(bottle.is_active());
        assert_eq!(bottle.current_price, Some(90.0));
        assert_eq!(store.bottle(&bottle.id).unwrap(), Some(bottle));
    }

    #[test]
    fn test_update_bottle_merges_and_drops_orphan_coordinates() {
        let mut store = memory_store();
        let bottle = store
            .create_bottle(new_bottle("A").in_cellar("c1", Some(Coordinates::new(0, 0))))
            .unwrap();
        assert_eq!(bottle.coordinates, Some(Coordinates::new(0, 0)));

        let patch = BottlePatch {
            storage_id: Some(None),
            notes: Some(Some("gift".to_string())),
            ..BottlePatch::default()
        };
        let updated = store.update_bottle(&bottle.id, patch).unwrap().unwrap();
        assert!(updated.storage_id.is_none());
        assert!(updated.coordinates.is_none());
        assert_eq!(updated.notes.as_deref(), Some("gift"));
        assert_eq!(updated.producer, "A");

        assert!(store.update_bottle("missing", BottlePatch::default()).unwrap().is_none());
    }

    #[test]
    fn test_create_and_update_refuse_taken_slot() {
        let mut store = memory_store();
        let cellar = store.create_cellar(NewCellar::new("Rack", 2, 2)).unwrap();
        let slot = Coordinates::new(0, 0);
        let a = store
            .create_bottle(new_bottle("A").in_cellar(cellar.id.clone(), Some(slot)))
            .unwrap();

        let err = store
            .create_bottle(new_bottle("B").in_cellar(cellar.id.clone(), Some(slot)))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlacementError>(),
            Some(PlacementError::SlotOccupied { occupant_id, .. }) if *occupant_id == a.id
        ));
        assert_eq!(store.bottles().unwrap().len(), 1);

        let c = store.create_bottle(new_bottle("C")).unwrap();
        let err = store
            .update_bottle(&c.id, BottlePatch::placement(Some(cellar.id.clone()), Some(slot)))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlacementError>(),
            Some(PlacementError::SlotOccupied { .. })
        ));
        assert_eq!(store.bottle(&c.id).unwrap(), Some(c.clone()));

        let err = store
            .update_bottle(
                &c.id,
                BottlePatch::placement(Some(cellar.id.clone()), Some(Coordinates::new(5, 0))),
            )
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlacementError>(),
            Some(PlacementError::OutOfBounds { .. })
        ));

        let moved = store
            .update_bottle(
                &c.id,
                BottlePatch::placement(Some(cellar.id.clone()), Some(Coordinates::new(1, 1))),
            )
            .unwrap()
            .unwrap();
        assert_eq!(moved.coordinates, Some(Coordinates::new(1, 1)));

        // Unrelated edits of a placed bottle keep working
        let renamed = BottlePatch {
            producer: Some("A2".to_string()),
            ..BottlePatch::default()
        };
        assert!(store.update_bottle(&a.id, renamed).unwrap().is_some());
    }

    #[test]
    fn test_bulk_save_refuses_slot_claimed_twice_in_batch() {
        let mut store = memory_store();
        let slot = Some(Coordinates::new(0, 1));
        let err = store
            .bulk_save_bottles(vec![
                new_bottle("A").in_cellar(DEFAULT_CELLAR_ID, slot),
                new_bottle("B").in_cellar(DEFAULT_CELLAR_ID, slot),
            ])
            .unwrap_err();
        assert!(err.downcast_ref::<PlacementError>().is_some());
        assert!(store.bottles().unwrap().is_empty());
    }

    #[test]
    fn test_returned_bottles_match_storage() {
        let mut store = memory_store();
        let created = store.create_bottle(new_bottle("Ridge")).unwrap();
        assert_eq!(store.bottle(&created.id).unwrap(), Some(created.clone()));

        let copies = store.duplicate_bottle(&created.id, 2).unwrap().unwrap();
        for copy in copies {
            assert_eq!(store.bottle(&copy.id).unwrap(), Some(copy));
        }

        let consumed = store
            .consume_bottle(
                &created.id,
                Tasting {
                    rating: 4,
                    ..Tasting::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(store.bottle(&created.id).unwrap(), Some(consumed));
    }

    #[test]
    fn test_patch_to_consumed_records_date() {
        let mut store = memory_store();
        let bottle = store.create_bottle(new_bottle("A")).unwrap();
        let patch = BottlePatch {
            status: Some(BottleStatus::Consumed),
            ..BottlePatch::default()
        };
        let updated = store.update_bottle(&bottle.id, patch).unwrap().unwrap();
        assert!(updated.is_consumed());
        assert!(updated.date_consumed.is_some());
        assert_eq!(store.bottle(&bottle.id).unwrap(), Some(updated));
    }

    #[test]
    fn test_duplicate_scenario() {
        let mut store = memory_store();
        let cellar = store.create_cellar(NewCellar::new("Rack", 2, 2)).unwrap();
        let source = store.create_bottle(new_bottle("Opus")).unwrap();
        store
            .place_bottle(&source.id, &cellar.id, Some(Coordinates::new(1, 1)))
            .unwrap();
        store
            .consume_bottle(
                &source.id,
                Tasting {
                    rating: 5,
                    notes: Some("Superb".to_string()),
                    occasion: None,
                },
            )
            .unwrap();

        let before = now_millis();
        let copies = store.duplicate_bottle(&source.id, 3).unwrap().unwrap();
        assert_eq!(copies.len(), 3);
        for copy in &copies {
            assert_ne!(copy.id, source.id);
            assert_eq!(copy.status, BottleStatus::Active);
            assert!(copy.storage_id.is_none());
            assert!(copy.coordinates.is_none());
            assert!(copy.rating.is_none());
            assert!(copy.notes.is_none());
            assert!(copy.date_consumed.is_none());
            assert!(copy.date_added >= before);
        }
        assert_eq!(store.bottles().unwrap().len(), 4);
        assert!(store.duplicate_bottle("missing", 2).unwrap().is_none());
    }

    #[test]
    fn test_consume_twice_fails() {
        let mut store = memory_store();
        let bottle = store.create_bottle(new_bottle("A")).unwrap();
        let tasting = Tasting {
            rating: 3,
            ..Tasting::default()
        };
        let consumed = store.consume_bottle(&bottle.id, tasting.clone()).unwrap().unwrap();
        assert!(consumed.is_consumed());
        assert!(consumed.date_consumed.is_some());

        let err = store.consume_bottle(&bottle.id, tasting).unwrap_err();
        assert!(err.downcast_ref::<ModelError>().is_some());
        assert_eq!(store.consumed_bottles().unwrap().len(), 1);
    }

    #[test]
    fn test_placement_scenario() {
        let mut store = memory_store();
        let cellar = store.create_cellar(NewCellar::new("Rack", 2, 2)).unwrap();
        let a = store.create_bottle(new_bottle("A")).unwrap();
        let b = store.create_bottle(new_bottle("B")).unwrap();
        let slot = Coordinates::new(0, 0);

        store.place_bottle(&a.id, &cellar.id, Some(slot)).unwrap();
        let err = store.place_bottle(&b.id, &cellar.id, Some(slot)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlacementError>(),
            Some(PlacementError::SlotOccupied { occupant_id, .. }) if occupant_id == &a.id
        ));

        let a_now = store.bottle(&a.id).unwrap().unwrap();
        assert_eq!(a_now.coordinates, Some(slot));
        let b_now = store.bottle(&b.id).unwrap().unwrap();
        assert!(b_now.storage_id.is_none());
        assert!(store.is_slot_occupied(&cellar.id, slot).unwrap());
    }

    #[test]
    fn test_move_within_cellar_and_unplace() {
        let mut store = memory_store();
        let cellar = store.create_cellar(NewCellar::new("Rack", 2, 2)).unwrap();
        let a = store.create_bottle(new_bottle("A")).unwrap();

        store.place_bottle(&a.id, &cellar.id, Some(Coordinates::new(0, 0))).unwrap();
        store.place_bottle(&a.id, &cellar.id, Some(Coordinates::new(1, 0))).unwrap();
        assert!(!store.is_slot_occupied(&cellar.id, Coordinates::new(0, 0)).unwrap());

        let loose = store.loosen_bottle(&a.id).unwrap().unwrap();
        assert_eq!(loose.storage_id.as_deref(), Some(cellar.id.as_str()));
        assert!(loose.coordinates.is_none());
        assert_eq!(store.bottles_in_cellar(&cellar.id).unwrap().len(), 1);

        let unplaced = store.unplace_bottle(&a.id).unwrap().unwrap();
        assert!(unplaced.storage_id.is_none());
        assert!(unplaced.coordinates.is_none());
        assert_eq!(store.unplaced_bottles().unwrap().len(), 1);
    }

    #[test]
    fn test_place_refusals_write_nothing() {
        let mut store = memory_store();
        let cellar = store.create_cellar(NewCellar::new("Rack", 1, 1)).unwrap();
        let a = store.create_bottle(new_bottle("A")).unwrap();
        let before = store.export_data().unwrap();

        let out_of_bounds = store
            .place_bottle(&a.id, &cellar.id, Some(Coordinates::new(1, 0)))
            .unwrap_err();
        assert!(matches!(
            out_of_bounds.downcast_ref::<PlacementError>(),
            Some(PlacementError::OutOfBounds { .. })
        ));
        let missing = store.place_bottle(&a.id, "nope", None).unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<PlacementError>(),
            Some(PlacementError::CellarNotFound(_))
        ));

        assert_eq!(store.export_data().unwrap(), before);
    }

    #[test]
    fn test_deleted_cellar_leaves_orphans() {
        let mut store = memory_store();
        let cellar = store.create_cellar(NewCellar::new("Rack", 2, 2)).unwrap();
        let a = store.create_bottle(new_bottle("A")).unwrap();
        store.place_bottle(&a.id, &cellar.id, Some(Coordinates::new(0, 0))).unwrap();

        store.delete_cellar(&cellar.id).unwrap();
        let orphan = store.bottle(&a.id).unwrap().unwrap();
        assert_eq!(orphan.storage_id.as_deref(), Some(cellar.id.as_str()));
        assert_eq!(store.location_label(&orphan).unwrap(), query::UNKNOWN_LOCATION);
        // Orphans are neither unplaced nor in any listed cellar
        assert!(store.unplaced_bottles().unwrap().is_empty());
        assert!(store.cellar_grid(&cellar.id).unwrap().is_none());
    }

    #[test]
    fn test_settings_default_and_save() {
        let mut store = memory_store();
        assert_eq!(store.settings().unwrap(), Settings::default());

        let custom = Settings::custom("NZD", "NZ$");
        store.save_settings(&custom).unwrap();
        assert_eq!(store.settings().unwrap(), custom);
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut source = memory_store();
        let cellar = source.create_cellar(NewCellar::new("Rack", 2, 2)).unwrap();
        let bottle = source.create_bottle(new_bottle("A")).unwrap();
        source.place_bottle(&bottle.id, &cellar.id, None).unwrap();
        source.save_settings(&Settings::preset("GBP").unwrap()).unwrap();

        let exported = source.export_data().unwrap();
        let mut target = memory_store();
        let summary = target.import_data(&exported).unwrap();
        assert_eq!(summary.bottles, Some(1));

        assert_eq!(target.export_backup().unwrap(), source.export_backup().unwrap());
    }

    #[test]
    fn test_malformed_import_changes_nothing() {
        let mut store = memory_store();
        store.create_bottle(new_bottle("A")).unwrap();
        let before = store.export_data().unwrap();

        let err = store.import_data("{\"bottles\": 12}").unwrap_err();
        assert!(err.downcast_ref::<ImportError>().is_some());
        assert_eq!(store.export_data().unwrap(), before);
    }

    #[test]
    fn test_import_csv() {
        let mut store = memory_store();
        let csv = b"producer,varietal,vintage,price\nRidge,Zinfandel,2019,40\nKrug,Champagne,NV,\n";
        let saved = store.import_csv(csv).unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(store.stats().unwrap().total_value, 40.0);
        assert_eq!(store.distinct_varietals().unwrap(), vec!["Champagne", "Zinfandel"]);

        assert!(store.import_csv(b"").unwrap().is_empty());
    }

    #[test]
    fn test_capacity_exceeded_keeps_state() {
        let mut store = Store::with_medium(Box::new(MemoryMedium::with_quota(600)), Config::default());
        store.create_bottle(new_bottle("A")).unwrap();
        let before = store.bottles().unwrap();

        let mut huge = new_bottle("B");
        huge.photo_url = Some(format!("data:image/jpeg;base64,{}", "A".repeat(4096)));
        let err = store.create_bottle(huge).unwrap_err();
        let storage = err.downcast_ref::<StorageError>().unwrap();
        assert!(storage.is_capacity_exceeded());
        assert!(storage.recovery_suggestion().is_some());

        assert_eq!(store.bottles().unwrap(), before);
    }

    #[test]
    fn test_mutations_notify_sync() {
        let mut store = memory_store();
        let (notifier, mut rx) = notification_channel();
        store.attach_sync(notifier);

        let cellar = store.create_cellar(NewCellar::new("Rack", 1, 1)).unwrap();
        let bottle = store.create_bottle(new_bottle("A")).unwrap();
        store.save_settings(&Settings::default()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Change::Cellars);
        assert_eq!(rx.try_recv().unwrap(), Change::Bottles);
        assert_eq!(rx.try_recv().unwrap(), Change::Settings);

        // Failed or no-op mutations send nothing
        let _ = store.create_cellar(NewCellar::new("Bad", 0, 0));
        let _ = store.place_bottle(&bottle.id, "nope", None);
        store.delete_bottle("missing").unwrap();
        store.import_data("{}").unwrap();
        assert!(rx.try_recv().is_err());

        store.place_bottle(&bottle.id, &cellar.id, None).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Change::Bottles);

        assert!(store.detach_sync().is_some());
        store.delete_bottle(&bottle.id).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_queries_see_latest_write() {
        let mut store = memory_store();
        let bottle = store.create_bottle(new_bottle("Caymus")).unwrap();
        assert_eq!(store.search("cay").unwrap().len(), 1);

        store.delete_bottle(&bottle.id).unwrap();
        assert!(store.search("cay").unwrap().is_empty());
        assert_eq!(store.stats().unwrap(), Stats::default());
    }

    #[test]
    fn test_medium_stats() {
        let mut store = memory_store();
        store.create_cellar(NewCellar::new("Rack", 1, 1)).unwrap();
        let stats = store.medium_stats().unwrap();
        assert_eq!(stats.keys, 1);
        assert!(stats.value_bytes > 0);
    }
}
