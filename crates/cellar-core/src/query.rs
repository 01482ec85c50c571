//! Derived read operations
//!
//! Pure functions over a snapshot of bottles. Nothing here is cached or
//! indexed; the store hands in a fresh read every call.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::{Bottle, Cellar, WineType};

/// Maximum number of search results
pub const SEARCH_LIMIT: usize = 10;

/// Queries shorter than this return nothing
pub const MIN_QUERY_LEN: usize = 2;

/// Label for a bottle whose cellar no longer exists
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Label for a bottle with no cellar
pub const UNPLACED_LOCATION: &str = "Unplaced";

/// Inventory statistics over active bottles
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_bottles: usize,
    pub total_value: f64,
    pub red_count: usize,
    pub white_count: usize,
    pub rose_count: usize,
    pub sparkling_count: usize,
    pub unplaced_count: usize,
}

/// Per-cellar counts for listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellarSummary {
    pub cellar: Cellar,
    /// Active bottles assigned to the cellar
    pub bottles: usize,
    /// Of those, bottles sitting in a slot
    pub placed: usize,
}

/// Case-insensitive search over active bottles.
///
/// Matches producer, varietal, region, country and vintage.
pub fn search(bottles: &[Bottle], query: &str) -> Vec<Bottle> {
    if query.chars().count() < MIN_QUERY_LEN {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    let hit = |field: &str| field.to_lowercase().contains(&needle);

    bottles
        .iter()
        .filter(|b| b.is_active())
        .filter(|b| {
            hit(&b.producer)
                || hit(&b.varietal)
                || b.region.as_deref().is_some_and(hit)
                || b.country.as_deref().is_some_and(hit)
                || hit(&b.vintage.to_string())
        })
        .take(SEARCH_LIMIT)
        .cloned()
        .collect()
}

/// Active bottles assigned to a cellar, placed or loose
pub fn bottles_in_cellar(bottles: &[Bottle], cellar_id: &str) -> Vec<Bottle> {
    bottles
        .iter()
        .filter(|b| b.is_active() && b.storage_id.as_deref() == Some(cellar_id))
        .cloned()
        .collect()
}

/// Active bottles with no cellar at all
pub fn unplaced_bottles(bottles: &[Bottle]) -> Vec<Bottle> {
    bottles
        .iter()
        .filter(|b| b.is_active() && b.storage_id.is_none())
        .cloned()
        .collect()
}

/// Consumed bottles, most recently consumed first
pub fn consumed_bottles(bottles: &[Bottle]) -> Vec<Bottle> {
    let mut consumed: Vec<Bottle> = bottles.iter().filter(|b| b.is_consumed()).cloned().collect();
    consumed.sort_by(|a, b| b.date_consumed.cmp(&a.date_consumed));
    consumed
}

/// Sorted unique varietals across all bottles, for autocomplete
pub fn distinct_varietals(bottles: &[Bottle]) -> Vec<String> {
    bottles
        .iter()
        .map(|b| b.varietal.as_str())
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn stats(bottles: &[Bottle]) -> Stats {
    let active: Vec<&Bottle> = bottles.iter().filter(|b| b.is_active()).collect();
    let count = |t: WineType| active.iter().filter(|b| b.wine_type == t).count();

    Stats {
        total_bottles: active.len(),
        total_value: active.iter().map(|b| b.value()).sum(),
        red_count: count(WineType::Red),
        white_count: count(WineType::White),
        rose_count: count(WineType::Rose),
        sparkling_count: count(WineType::Sparkling),
        unplaced_count: active.iter().filter(|b| b.storage_id.is_none()).count(),
    }
}

/// Resolve where a bottle lives, tolerating dangling cellar references
pub fn location_label(bottle: &Bottle, cellars: &[Cellar]) -> String {
    match bottle.storage_id.as_deref() {
        None => UNPLACED_LOCATION.to_string(),
        Some(id) => cellars
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
    }
}

/// Active bottle counts for every cellar
pub fn bottle_counts_by_cellar(cellars: &[Cellar], bottles: &[Bottle]) -> Vec<CellarSummary> {
    cellars
        .iter()
        .map(|cellar| {
            let inside = bottles_in_cellar(bottles, &cellar.id);
            CellarSummary {
                cellar: cellar.clone(),
                bottles: inside.len(),
                placed: inside.iter().filter(|b| b.coordinates.is_some()).count(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BottleStatus, Coordinates, NewBottle, Vintage};
    use chrono::{Duration, Utc};

    fn bottle(id: &str, producer: &str, varietal: &str) -> Bottle {
        NewBottle::new(producer, varietal, Vintage::Year(2018), WineType::Red)
            .into_bottle(id.to_string(), Utc::now())
    }

    #[test]
    fn test_search_scenario() {
        let bottles = vec![
            bottle("1", "Caymus", "Zinfandel"),
            bottle("2", "Ridge", "Cabernet"),
            bottle("3", "Opus", "Blend"),
        ];

        let results = search(&bottles, "ca");
        let ids: Vec<&str> = results.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        assert!(search(&bottles, "c").is_empty());
        assert!(search(&bottles, "").is_empty());
    }

    #[test]
    fn test_search_fields_and_case() {
        let mut b = bottle("1", "Domaine X", "Pinot Noir");
        b.region = Some("Burgundy".to_string());
        b.country = Some("France".to_string());
        b.vintage = Vintage::NonVintage;
        let bottles = vec![b];

        assert_eq!(search(&bottles, "BURG").len(), 1);
        assert_eq!(search(&bottles, "fran").len(), 1);
        assert_eq!(search(&bottles, "nv").len(), 1);
        assert_eq!(search(&bottles, "noir").len(), 1);
        assert!(search(&bottles, "italy").is_empty());
    }

    #[test]
    fn test_search_excludes_consumed_and_limits() {
        let mut bottles: Vec<Bottle> = (0..15)
            .map(|i| bottle(&i.to_string(), "Same Producer", "Merlot"))
            .collect();
        bottles[0].status = BottleStatus::Consumed;

        let results = search(&bottles, "merlot");
        assert_eq!(results.len(), SEARCH_LIMIT);
        assert!(results.iter().all(|b| b.id != "0"));
    }

    #[test]
    fn test_vintage_year_search() {
        let bottles = vec![bottle("1", "A", "B")];
        assert_eq!(search(&bottles, "2018").len(), 1);
        assert_eq!(search(&bottles, "18").len(), 1);
    }

    #[test]
    fn test_cellar_filters() {
        let mut placed = bottle("placed", "A", "B");
        placed.storage_id = Some("c1".to_string());
        placed.coordinates = Some(Coordinates::new(0, 0));

        let mut loose = bottle("loose", "A", "B");
        loose.storage_id = Some("c1".to_string());

        let mut gone = bottle("gone", "A", "B");
        gone.storage_id = Some("c1".to_string());
        gone.status = BottleStatus::Consumed;

        let unplaced = bottle("unplaced", "A", "B");
        let bottles = vec![placed, loose, gone, unplaced];

        let in_cellar: Vec<String> = bottles_in_cellar(&bottles, "c1").into_iter().map(|b| b.id).collect();
        assert_eq!(in_cellar, vec!["placed", "loose"]);

        let pool: Vec<String> = unplaced_bottles(&bottles).into_iter().map(|b| b.id).collect();
        assert_eq!(pool, vec!["unplaced"]);
    }

    #[test]
    fn test_consumed_sorted_descending() {
        let now = Utc::now();
        let mut older = bottle("older", "A", "B");
        older.status = BottleStatus::Consumed;
        older.date_consumed = Some(now - Duration::days(3));
        let mut newer = bottle("newer", "A", "B");
        newer.status = BottleStatus::Consumed;
        newer.date_consumed = Some(now);
        let active = bottle("active", "A", "B");

        let ids: Vec<String> = consumed_bottles(&[older, active, newer])
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec!["newer", "older"]);
    }

    #[test]
    fn test_distinct_varietals() {
        let bottles = vec![
            bottle("1", "A", "Syrah"),
            bottle("2", "A", "Merlot"),
            bottle("3", "A", "Syrah"),
            bottle("4", "A", ""),
        ];
        assert_eq!(distinct_varietals(&bottles), vec!["Merlot", "Syrah"]);
    }

    #[test]
    fn test_stats_consistency() {
        let mut red = bottle("1", "A", "B");
        red.current_price = Some(50.0);
        let mut white = bottle("2", "A", "B");
        white.wine_type = WineType::White;
        white.current_price = None;
        white.purchase_price = Some(20.0);
        white.storage_id = Some("c1".to_string());
        let mut no_price = bottle("3", "A", "B");
        no_price.wine_type = WineType::Other;
        no_price.current_price = None;
        no_price.purchase_price = None;
        let mut consumed = bottle("4", "A", "B");
        consumed.status = BottleStatus::Consumed;
        consumed.current_price = Some(1000.0);

        let bottles = vec![red, white, no_price, consumed];
        let stats = stats(&bottles);

        let active: Vec<&Bottle> = bottles.iter().filter(|b| b.is_active()).collect();
        assert_eq!(stats.total_bottles, active.len());
        assert_eq!(stats.total_value, 70.0);
        assert_eq!(stats.red_count, 1);
        assert_eq!(stats.white_count, 1);
        assert_eq!(stats.rose_count, 0);
        assert_eq!(stats.sparkling_count, 0);
        assert_eq!(stats.unplaced_count, 2);
    }

    #[test]
    fn test_stats_json_shape() {
        let json = serde_json::to_value(stats(&[])).unwrap();
        assert_eq!(json["totalBottles"], 0);
        assert_eq!(json["unplacedCount"], 0);
    }

    #[test]
    fn test_location_label() {
        let cellar = Cellar {
            id: "c1".to_string(),
            name: "Basement".to_string(),
            description: None,
            rows: 1,
            columns: 1,
        };
        let mut b = bottle("1", "A", "B");
        assert_eq!(location_label(&b, &[cellar.clone()]), UNPLACED_LOCATION);

        b.storage_id = Some("c1".to_string());
        assert_eq!(location_label(&b, &[cellar.clone()]), "Basement");

        b.storage_id = Some("deleted".to_string());
        assert_eq!(location_label(&b, &[cellar]), UNKNOWN_LOCATION);
    }

    #[test]
    fn test_bottle_counts_by_cellar() {
        let cellar = Cellar {
            id: "c1".to_string(),
            name: "Rack".to_string(),
            description: None,
            rows: 2,
            columns: 2,
        };
        let mut a = bottle("a", "A", "B");
        a.storage_id = Some("c1".to_string());
        a.coordinates = Some(Coordinates::new(1, 1));
        let mut b = bottle("b", "A", "B");
        b.storage_id = Some("c1".to_string());

        let summaries = bottle_counts_by_cellar(&[cellar], &[a, b, bottle("c", "A", "B")]);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].bottles, 2);
        assert_eq!(summaries[0].placed, 1);
    }
}
