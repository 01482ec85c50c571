//! Statistics and varietal listing

use anyhow::Result;

use cellar_core::Store;

use crate::output::Output;

pub fn show(store: &Store, output: &Output) -> Result<()> {
    let stats = store.stats()?;
    output.print_stats(&stats, &store.settings()?);
    Ok(())
}

pub fn varietals(store: &Store, output: &Output) -> Result<()> {
    let varietals = store.distinct_varietals()?;
    output.print_lines(&varietals, "No varietals yet.");
    Ok(())
}
