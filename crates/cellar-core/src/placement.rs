//! Placement engine
//!
//! A bottle is in one of three states: Unplaced (no cellar), Loose (in a
//! cellar without a slot) or Placed (in a specific slot). Within a cellar
//! at most one active bottle occupies a slot.
//!
//! The checks here are pure. The store runs [`check_placement`] (moves) or
//! [`check_slot_claim`] (creates and patches) and the write under the same
//! lock so nothing can claim the slot in between.

use thiserror::Error;

use crate::models::{Bottle, Cellar, Coordinates};

/// Why a placement request was refused
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    #[error("Bottle not found: {0}")]
    BottleNotFound(String),

    #[error("Cellar not found: {0}")]
    CellarNotFound(String),

    #[error("Bottle {0} has been consumed and cannot be placed")]
    BottleConsumed(String),

    #[error("Slot {coordinates} is outside cellar {cellar_id} ({rows} rows x {columns} columns)")]
    OutOfBounds {
        cellar_id: String,
        coordinates: Coordinates,
        rows: u32,
        columns: u32,
    },

    #[error("Slot {coordinates} in cellar {cellar_id} is occupied by {occupant_label} ({occupant_id})")]
    SlotOccupied {
        cellar_id: String,
        coordinates: Coordinates,
        occupant_id: String,
        occupant_label: String,
    },
}

/// Where a bottle currently sits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementState {
    Unplaced,
    Loose { storage_id: String },
    Placed { storage_id: String, coordinates: Coordinates },
}

impl PlacementState {
    pub fn of(bottle: &Bottle) -> Self {
        match (&bottle.storage_id, bottle.coordinates) {
            (None, _) => PlacementState::Unplaced,
            (Some(id), None) => PlacementState::Loose {
                storage_id: id.clone(),
            },
            (Some(id), Some(coordinates)) => PlacementState::Placed {
                storage_id: id.clone(),
                coordinates,
            },
        }
    }

    pub fn storage_id(&self) -> Option<&str> {
        match self {
            PlacementState::Unplaced => None,
            PlacementState::Loose { storage_id } | PlacementState::Placed { storage_id, .. } => {
                Some(storage_id)
            }
        }
    }
}

/// The active bottle in a slot, ignoring `excluding`
pub fn occupant<'a>(
    bottles: &'a [Bottle],
    cellar_id: &str,
    coordinates: Coordinates,
    excluding: Option<&str>,
) -> Option<&'a Bottle> {
    bottles.iter().find(|b| {
        b.is_active()
            && b.storage_id.as_deref() == Some(cellar_id)
            && b.coordinates == Some(coordinates)
            && Some(b.id.as_str()) != excluding
    })
}

/// Validate a move and return the index of the bottle to update.
///
/// `coordinates: None` means loose inside the cellar.
pub fn check_placement(
    bottles: &[Bottle],
    cellars: &[Cellar],
    bottle_id: &str,
    cellar_id: &str,
    coordinates: Option<Coordinates>,
) -> Result<usize, PlacementError> {
    let index = bottles
        .iter()
        .position(|b| b.id == bottle_id)
        .ok_or_else(|| PlacementError::BottleNotFound(bottle_id.to_string()))?;
    if bottles[index].is_consumed() {
        return Err(PlacementError::BottleConsumed(bottle_id.to_string()));
    }

    let cellar = cellars
        .iter()
        .find(|c| c.id == cellar_id)
        .ok_or_else(|| PlacementError::CellarNotFound(cellar_id.to_string()))?;

    if let Some(coordinates) = coordinates {
        check_bounds(cellar, coordinates)?;
        check_vacant(bottles, cellar_id, coordinates, bottle_id)?;
    }

    Ok(index)
}

/// Validate the slot a new or patched bottle claims.
///
/// Only an active bottle with both a cellar and coordinates claims a slot.
/// The cellar does not have to exist; bounds are checked when it does.
pub fn check_slot_claim(
    bottles: &[Bottle],
    cellars: &[Cellar],
    bottle: &Bottle,
) -> Result<(), PlacementError> {
    let (Some(cellar_id), Some(coordinates)) = (bottle.storage_id.as_deref(), bottle.coordinates)
    else {
        return Ok(());
    };
    if !bottle.is_active() {
        return Ok(());
    }
    if let Some(cellar) = cellars.iter().find(|c| c.id == cellar_id) {
        check_bounds(cellar, coordinates)?;
    }
    check_vacant(bottles, cellar_id, coordinates, &bottle.id)
}

fn check_bounds(cellar: &Cellar, coordinates: Coordinates) -> Result<(), PlacementError> {
    if cellar.contains(coordinates) {
        return Ok(());
    }
    Err(PlacementError::OutOfBounds {
        cellar_id: cellar.id.clone(),
        coordinates,
        rows: cellar.rows,
        columns: cellar.columns,
    })
}

fn check_vacant(
    bottles: &[Bottle],
    cellar_id: &str,
    coordinates: Coordinates,
    claimant: &str,
) -> Result<(), PlacementError> {
    match occupant(bottles, cellar_id, coordinates, Some(claimant)) {
        Some(other) => Err(PlacementError::SlotOccupied {
            cellar_id: cellar_id.to_string(),
            coordinates,
            occupant_id: other.id.clone(),
            occupant_label: other.label(),
        }),
        None => Ok(()),
    }
}

/// Occupancy view of one cellar
#[derive(Debug, Clone, PartialEq)]
pub struct CellarGrid {
    pub cellar: Cellar,
    /// `slots[row][col]`
    pub slots: Vec<Vec<Option<Bottle>>>,
    /// Active bottles in the cellar without a slot
    pub loose: Vec<Bottle>,
    /// Bottles whose slot no longer fits the grid (after a resize)
    pub stranded: Vec<Bottle>,
}

impl CellarGrid {
    pub fn build(cellar: &Cellar, bottles: &[Bottle]) -> Self {
        let mut slots = vec![vec![None; cellar.columns as usize]; cellar.rows as usize];
        let mut loose = Vec::new();
        let mut stranded = Vec::new();

        for bottle in bottles
            .iter()
            .filter(|b| b.is_active() && b.storage_id.as_deref() == Some(cellar.id.as_str()))
        {
            match bottle.coordinates {
                None => loose.push(bottle.clone()),
                Some(c) if cellar.contains(c) => {
                    let slot = &mut slots[c.row as usize][c.col as usize];
                    if slot.is_none() {
                        *slot = Some(bottle.clone());
                    } else {
                        stranded.push(bottle.clone());
                    }
                }
                Some(_) => stranded.push(bottle.clone()),
            }
        }

        Self {
            cellar: cellar.clone(),
            slots,
            loose,
            stranded,
        }
    }

    pub fn slot(&self, coordinates: Coordinates) -> Option<&Bottle> {
        self.slots
            .get(coordinates.row as usize)?
            .get(coordinates.col as usize)?
            .as_ref()
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().flatten().filter(|s| s.is_some()).count()
    }

    pub fn free(&self) -> usize {
        self.cellar.capacity() as usize - self.occupied()
    }

    /// First empty slot in row-major order
    pub fn first_free(&self) -> Option<Coordinates> {
        self.slots.iter().enumerate().find_map(|(row, cols)| {
            cols.iter()
                .position(Option::is_none)
                .map(|col| Coordinates::new(row as u32, col as u32))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BottleStatus, NewBottle, Vintage, WineType};
    use chrono::Utc;

    fn cellar(rows: u32, columns: u32) -> Cellar {
        Cellar {
            id: "c1".to_string(),
            name: "Rack".to_string(),
            description: None,
            rows,
            columns,
        }
    }

    fn bottle(id: &str) -> Bottle {
        NewBottle::new("Producer", "Syrah", Vintage::Year(2016), WineType::Red)
            .into_bottle(id.to_string(), Utc::now())
    }

    fn placed(id: &str, row: u32, col: u32) -> Bottle {
        let mut b = bottle(id);
        b.storage_id = Some("c1".to_string());
        b.coordinates = Some(Coordinates::new(row, col));
        b
    }

    #[test]
    fn test_state_of() {
        let mut b = bottle("a");
        assert_eq!(PlacementState::of(&b), PlacementState::Unplaced);

        b.storage_id = Some("c1".to_string());
        assert_eq!(
            PlacementState::of(&b),
            PlacementState::Loose {
                storage_id: "c1".to_string()
            }
        );

        b.coordinates = Some(Coordinates::new(0, 1));
        let state = PlacementState::of(&b);
        assert_eq!(state.storage_id(), Some("c1"));
        assert!(matches!(state, PlacementState::Placed { .. }));
    }

    #[test]
    fn test_occupied_slot_refused() {
        let bottles = vec![placed("a", 0, 0), bottle("b")];
        let err = check_placement(&bottles, &[cellar(2, 2)], "b", "c1", Some(Coordinates::new(0, 0)))
            .unwrap_err();
        match err {
            PlacementError::SlotOccupied { occupant_id, .. } => assert_eq!(occupant_id, "a"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_same_slot_for_same_bottle_is_allowed() {
        let bottles = vec![placed("a", 0, 0)];
        let index =
            check_placement(&bottles, &[cellar(2, 2)], "a", "c1", Some(Coordinates::new(0, 0))).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn test_consumed_occupant_does_not_block() {
        let mut gone = placed("a", 1, 1);
        gone.status = BottleStatus::Consumed;
        let bottles = vec![gone, bottle("b")];
        assert!(check_placement(&bottles, &[cellar(2, 2)], "b", "c1", Some(Coordinates::new(1, 1))).is_ok());
    }

    #[test]
    fn test_refusals() {
        let mut consumed = bottle("gone");
        consumed.status = BottleStatus::Consumed;
        let bottles = vec![bottle("b"), consumed];
        let cellars = [cellar(2, 3)];

        assert_eq!(
            check_placement(&bottles, &cellars, "missing", "c1", None),
            Err(PlacementError::BottleNotFound("missing".to_string()))
        );
        assert_eq!(
            check_placement(&bottles, &cellars, "b", "nope", None),
            Err(PlacementError::CellarNotFound("nope".to_string()))
        );
        assert_eq!(
            check_placement(&bottles, &cellars, "gone", "c1", None),
            Err(PlacementError::BottleConsumed("gone".to_string()))
        );
        assert!(matches!(
            check_placement(&bottles, &cellars, "b", "c1", Some(Coordinates::new(2, 0))),
            Err(PlacementError::OutOfBounds { rows: 2, columns: 3, .. })
        ));
        assert!(check_placement(&bottles, &cellars, "b", "c1", Some(Coordinates::new(1, 2))).is_ok());
    }

    #[test]
    fn test_loose_never_conflicts() {
        let bottles = vec![placed("a", 0, 0), bottle("b")];
        assert!(check_placement(&bottles, &[cellar(1, 1)], "b", "c1", None).is_ok());
    }

    #[test]
    fn test_slot_claim() {
        let bottles = vec![placed("a", 0, 0)];
        let cellars = [cellar(2, 2)];

        let rival = placed("b", 0, 0);
        assert!(matches!(
            check_slot_claim(&bottles, &cellars, &rival),
            Err(PlacementError::SlotOccupied { occupant_id, .. }) if occupant_id == "a"
        ));
        assert!(matches!(
            check_slot_claim(&bottles, &cellars, &placed("b", 3, 0)),
            Err(PlacementError::OutOfBounds { rows: 2, columns: 2, .. })
        ));

        // The occupant re-claiming its own slot is fine
        assert!(check_slot_claim(&bottles, &cellars, &bottles[0]).is_ok());

        // Unknown cellars skip bounds but not occupancy
        assert!(check_slot_claim(&bottles, &[], &placed("b", 7, 7)).is_ok());
        assert!(check_slot_claim(&bottles, &[], &rival).is_err());

        let mut consumed = rival;
        consumed.status = BottleStatus::Consumed;
        assert!(check_slot_claim(&bottles, &cellars, &consumed).is_ok());
        assert!(check_slot_claim(&bottles, &cellars, &bottle("loose")).is_ok());
    }

    #[test]
    fn test_grid_build() {
        let mut loose = bottle("loose");
        loose.storage_id = Some("c1".to_string());
        let mut elsewhere = placed("other", 0, 0);
        elsewhere.storage_id = Some("c2".to_string());
        let bottles = vec![placed("a", 0, 1), loose, placed("far", 5, 5), elsewhere];

        let grid = CellarGrid::build(&cellar(2, 2), &bottles);
        assert_eq!(grid.slot(Coordinates::new(0, 1)).map(|b| b.id.as_str()), Some("a"));
        assert!(grid.slot(Coordinates::new(0, 0)).is_none());
        assert!(grid.slot(Coordinates::new(9, 9)).is_none());
        assert_eq!(grid.occupied(), 1);
        assert_eq!(grid.free(), 3);
        assert_eq!(grid.loose.len(), 1);
        assert_eq!(grid.stranded.len(), 1);
        assert_eq!(grid.first_free(), Some(Coordinates::new(0, 0)));
    }

    #[test]
    fn test_full_grid_has_no_free_slot() {
        let bottles = vec![placed("a", 0, 0)];
        let grid = CellarGrid::build(&cellar(1, 1), &bottles);
        assert_eq!(grid.free(), 0);
        assert!(grid.first_free().is_none());
    }
}
