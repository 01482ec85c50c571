//! Cellar command handlers

use anyhow::{anyhow, Context, Result};

use cellar_core::{Cellar, CellarPatch, NewCellar, Store};

use crate::commands::match_id;
use crate::output::{Output, OutputFormat};
use crate::prompt::confirm;

/// List cellars with their bottle counts
pub fn list(store: &Store, output: &Output) -> Result<()> {
    let summaries = store.bottle_counts_by_cellar()?;
    output.print_cellars(&summaries);
    Ok(())
}

/// Show a cellar as a grid
pub fn show(store: &Store, id: &str, output: &Output) -> Result<()> {
    let cellar = resolve(store, id)?;
    let grid = store
        .cellar_grid(&cellar.id)?
        .ok_or_else(|| anyhow!("Cellar not found: {}", id))?;
    output.print_grid(&grid);
    Ok(())
}

pub fn create(
    store: &mut Store,
    name: String,
    rows: u32,
    columns: u32,
    description: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut new = NewCellar::new(name, rows, columns);
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        new = new.with_description(description);
    }
    let cellar = store.create_cellar(new)?;

    match output.format {
        OutputFormat::Json => output.json(&cellar),
        OutputFormat::Quiet => println!("{}", cellar.id),
        OutputFormat::Human => {
            output.success(&format!(
                "Created cellar {} ({}x{}): {}",
                cellar.name, cellar.rows, cellar.columns, cellar.id
            ));
        }
    }
    Ok(())
}

pub fn edit(
    store: &mut Store,
    id: &str,
    name: Option<String>,
    rows: Option<u32>,
    columns: Option<u32>,
    description: Option<String>,
    output: &Output,
) -> Result<()> {
    let cellar = resolve(store, id)?;
    let patch = CellarPatch {
        name,
        description: description.map(|d| if d.is_empty() { None } else { Some(d) }),
        rows,
        columns,
    };
    if patch == CellarPatch::default() {
        output.message("Nothing to change.");
        return Ok(());
    }

    let updated = store
        .update_cellar(&cellar.id, patch)?
        .ok_or_else(|| anyhow!("Cellar not found: {}", id))?;

    if output.is_json() {
        output.json(&updated);
    } else {
        output.success(&format!("Updated cellar: {}", updated.name));
    }
    Ok(())
}

/// Delete a cellar. Bottles that referenced it are left as they are.
pub fn delete(store: &mut Store, id: &str, yes: bool, output: &Output) -> Result<()> {
    let cellar = resolve(store, id)?;

    if !yes && output.should_prompt() {
        let contents = store.bottles_in_cellar(&cellar.id)?.len();
        println!("Delete cellar: {} ({} active bottles inside)", cellar.name, contents);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store
        .delete_cellar(&cellar.id)
        .context("Failed to delete cellar")?;
    output.success(&format!("Deleted cellar: {}", cellar.id));
    Ok(())
}

/// Resolve a full id or unique prefix to a cellar
pub(crate) fn resolve(store: &Store, input: &str) -> Result<Cellar> {
    let cellars = store.cellars()?;
    let id = match_id(
        "cellar",
        input,
        cellars.iter().map(|c| (c.id.as_str(), c.name.clone())),
    )?;
    cellars
        .into_iter()
        .find(|c| c.id == id)
        .ok_or_else(|| anyhow!("Cellar not found: {}", input))
}
