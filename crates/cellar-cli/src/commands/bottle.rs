//! Bottle command handlers

use anyhow::{anyhow, bail, Context, Result};

use cellar_core::{Bottle, BottlePatch, Coordinates, NewBottle, Store, Tasting, Vintage, WineType};

use crate::commands::{cellar, match_id};
use crate::output::{short_id, Output, OutputFormat};
use crate::prompt::confirm;

/// Which bottles `bottle list` shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter {
    Active,
    All,
    Consumed,
    Unplaced,
    Cellar(String),
}

/// Optional bottle fields shared by `add` and `edit`
#[derive(Debug, Clone, Default)]
pub struct BottleFields {
    pub producer: Option<String>,
    pub varietal: Option<String>,
    pub vintage: Option<Vintage>,
    pub wine_type: Option<WineType>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub price: Option<f64>,
    pub value: Option<f64>,
    pub notes: Option<String>,
}

impl BottleFields {
    /// Empty strings clear optional text fields
    fn into_patch(self) -> BottlePatch {
        let clearable = |v: Option<String>| v.map(|s| if s.is_empty() { None } else { Some(s) });
        BottlePatch {
            producer: self.producer,
            varietal: self.varietal,
            vintage: self.vintage,
            wine_type: self.wine_type,
            region: clearable(self.region),
            country: clearable(self.country),
            notes: clearable(self.notes),
            purchase_price: self.price.map(Some),
            current_price: self.value.map(Some),
            ..Default::default()
        }
    }
}

pub fn list(store: &Store, filter: ListFilter, output: &Output) -> Result<()> {
    let bottles = match filter {
        ListFilter::Active => store.bottles()?.into_iter().filter(Bottle::is_active).collect(),
        ListFilter::All => store.bottles()?,
        ListFilter::Consumed => store.consumed_bottles()?,
        ListFilter::Unplaced => store.unplaced_bottles()?,
        ListFilter::Cellar(input) => {
            let cellar = cellar::resolve(store, &input)?;
            store.bottles_in_cellar(&cellar.id)?
        }
    };
    output.print_bottles(&bottles, &store.settings()?);
    Ok(())
}

pub fn show(store: &Store, id: &str, output: &Output) -> Result<()> {
    let bottle = resolve(store, id)?;
    let location = store.location_label(&bottle)?;
    output.print_bottle(&bottle, &location, &store.settings()?);
    Ok(())
}

/// Add a bottle, optionally putting it straight into a cellar.
///
/// The slot is checked in the same write that creates the bottle, so a
/// refused slot adds nothing.
pub fn add(
    store: &mut Store,
    (producer, varietal, vintage, wine_type): (String, String, Vintage, WineType),
    fields: BottleFields,
    cellar: Option<String>,
    slot: Option<(u32, u32)>,
    output: &Output,
) -> Result<()> {
    let target = cellar
        .map(|input| cellar::resolve(store, &input))
        .transpose()?;

    let mut new = NewBottle::new(producer, varietal, vintage, wine_type);
    if let Some(region) = fields.region.filter(|s| !s.is_empty()) {
        new = new.with_region(region);
    }
    if let Some(country) = fields.country.filter(|s| !s.is_empty()) {
        new = new.with_country(country);
    }
    if let Some(price) = fields.price {
        new = new.with_purchase_price(price);
    }
    if let Some(value) = fields.value {
        new = new.with_current_price(value);
    }

    if let Some(target) = target {
        new = new.in_cellar(target.id, slot.map(|(row, col)| Coordinates::new(row, col)));
    }
    let bottle = store
        .create_bottle(new)
        .context("Bottle was not added")?;

    match output.format {
        OutputFormat::Json => output.json(&bottle),
        OutputFormat::Quiet => println!("{}", bottle.id),
        OutputFormat::Human => {
            output.success(&format!("Added {}: {}", bottle.label(), bottle.id));
        }
    }
    Ok(())
}

pub fn edit(store: &mut Store, id: &str, fields: BottleFields, output: &Output) -> Result<()> {
    let bottle = resolve(store, id)?;
    let patch = fields.into_patch();
    if patch == BottlePatch::default() {
        output.message("Nothing to change.");
        return Ok(());
    }

    let updated = store
        .update_bottle(&bottle.id, patch)?
        .ok_or_else(|| anyhow!("Bottle not found: {}", id))?;

    if output.is_json() {
        output.json(&updated);
    } else {
        output.success(&format!("Updated {}", updated.label()));
    }
    Ok(())
}

pub fn delete(store: &mut Store, id: &str, yes: bool, output: &Output) -> Result<()> {
    let bottle = resolve(store, id)?;

    if !yes && output.should_prompt() {
        println!("Delete bottle: {} - {}", short_id(&bottle.id), bottle.label());
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete_bottle(&bottle.id)?;
    output.success(&format!("Deleted bottle: {}", bottle.id));
    Ok(())
}

pub fn duplicate(store: &mut Store, id: &str, count: usize, output: &Output) -> Result<()> {
    let bottle = resolve(store, id)?;
    let copies = store
        .duplicate_bottle(&bottle.id, count)?
        .ok_or_else(|| anyhow!("Bottle not found: {}", id))?;

    match output.format {
        OutputFormat::Json => output.json(&copies),
        OutputFormat::Quiet => {
            for copy in &copies {
                println!("{}", copy.id);
            }
        }
        OutputFormat::Human => {
            output.success(&format!("Added {} unplaced copies of {}", copies.len(), bottle.label()));
        }
    }
    Ok(())
}

pub fn consume(
    store: &mut Store,
    id: &str,
    rating: u8,
    notes: Option<String>,
    occasion: Option<String>,
    output: &Output,
) -> Result<()> {
    let bottle = resolve(store, id)?;
    let tasting = Tasting {
        rating,
        notes,
        occasion,
    };
    let consumed = store
        .consume_bottle(&bottle.id, tasting)?
        .ok_or_else(|| anyhow!("Bottle not found: {}", id))?;

    if output.is_json() {
        output.json(&consumed);
    } else {
        output.success(&format!("Enjoyed {} ({}/5)", consumed.label(), rating));
    }
    Ok(())
}

/// Put a bottle in a slot, or in the first free slot when none is given
pub fn place(
    store: &mut Store,
    id: &str,
    cellar_input: &str,
    slot: Option<(u32, u32)>,
    output: &Output,
) -> Result<()> {
    let bottle = resolve(store, id)?;
    let target = cellar::resolve(store, cellar_input)?;

    let coordinates = match slot {
        Some((row, col)) => Coordinates::new(row, col),
        None => store
            .cellar_grid(&target.id)?
            .and_then(|grid| grid.first_free())
            .with_context(|| format!("Cellar {} has no free slot", target.name))?,
    };

    let placed = store.place_bottle(&bottle.id, &target.id, Some(coordinates))?;
    report_location(store, &placed, output)
}

/// Move a bottle to a cellar, loose unless a slot is given
pub fn move_to(
    store: &mut Store,
    id: &str,
    cellar_input: &str,
    slot: Option<(u32, u32)>,
    output: &Output,
) -> Result<()> {
    let bottle = resolve(store, id)?;
    let target = cellar::resolve(store, cellar_input)?;
    let coordinates = slot.map(|(row, col)| Coordinates::new(row, col));

    let moved = store.place_bottle(&bottle.id, &target.id, coordinates)?;
    report_location(store, &moved, output)
}

/// Take a bottle out of its slot; with `keep_cellar` it stays loose in the cellar
pub fn unplace(store: &mut Store, id: &str, keep_cellar: bool, output: &Output) -> Result<()> {
    let bottle = resolve(store, id)?;
    let updated = if keep_cellar {
        store.loosen_bottle(&bottle.id)?
    } else {
        store.unplace_bottle(&bottle.id)?
    };
    let updated = updated.ok_or_else(|| anyhow!("Bottle not found: {}", id))?;
    report_location(store, &updated, output)
}

pub fn search(store: &Store, query: &str, output: &Output) -> Result<()> {
    if query.trim().chars().count() < cellar_core::query::MIN_QUERY_LEN {
        bail!(
            "Search query must be at least {} characters",
            cellar_core::query::MIN_QUERY_LEN
        );
    }
    let bottles = store.search(query.trim())?;
    output.print_bottles(&bottles, &store.settings()?);
    Ok(())
}

fn report_location(store: &Store, bottle: &Bottle, output: &Output) -> Result<()> {
    if output.is_json() {
        output.json(bottle);
        return Ok(());
    }
    let location = store.location_label(bottle)?;
    let message = match bottle.coordinates {
        Some(c) => format!("{} is in {} at row {}, col {}", bottle.label(), location, c.row, c.col),
        None if bottle.storage_id.is_some() => format!("{} is loose in {}", bottle.label(), location),
        None => format!("{} is unplaced", bottle.label()),
    };
    output.success(&message);
    Ok(())
}

/// Resolve a full id or unique prefix to a bottle
pub(crate) fn resolve(store: &Store, input: &str) -> Result<Bottle> {
    let bottles = store.bottles()?;
    let id = match_id(
        "bottle",
        input,
        bottles.iter().map(|b| (b.id.as_str(), b.label())),
    )?;
    bottles
        .into_iter()
        .find(|b| b.id == id)
        .ok_or_else(|| anyhow!("Bottle not found: {}", input))
}
