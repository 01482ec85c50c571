//! Export, JSON import and CSV import

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use cellar_core::storage::{atomic_write, format_bytes};
use cellar_core::{Backup, ImportSummary, Store};

use crate::output::{Output, OutputFormat};
use crate::prompt::confirm;

/// Write the whole dataset as JSON to a file or stdout
pub fn export(store: &Store, path: Option<PathBuf>, output: &Output) -> Result<()> {
    let json = store.export_data()?;

    match path {
        Some(path) => {
            atomic_write(&path, json.as_bytes())
                .with_context(|| format!("Failed to write backup to {}", path.display()))?;
            output.success(&format!(
                "Exported {} to {}",
                format_bytes(json.len() as u64),
                path.display()
            ));
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Replace the collections found in a backup file
pub fn import(store: &mut Store, path: &Path, yes: bool, output: &Output) -> Result<()> {
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if !yes && output.should_prompt() {
        let backup = Backup::parse(&payload)?;
        println!("Import {}:", path.display());
        for line in describe(&backup) {
            println!("  {}", line);
        }
        if !confirm("This replaces the matching local data. Continue?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let summary = store.import_data(&payload)?;
    report_import(&summary, output);
    Ok(())
}

/// Append bottles from a CSV export
pub fn import_csv(store: &mut Store, path: &Path, output: &Output) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let bottles = store.import_csv(&data)?;

    match output.format {
        OutputFormat::Json => output.json(&bottles),
        OutputFormat::Quiet => {
            for bottle in &bottles {
                println!("{}", bottle.id);
            }
        }
        OutputFormat::Human => {
            output.success(&format!("Imported {} bottle(s) from {}", bottles.len(), path.display()))
        }
    }
    Ok(())
}

fn describe(backup: &Backup) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(ref cellars) = backup.cellars {
        lines.push(format!("{} cellar(s)", cellars.len()));
    }
    if let Some(ref bottles) = backup.bottles {
        lines.push(format!("{} bottle(s)", bottles.len()));
    }
    if backup.settings.is_some() {
        lines.push("settings".to_string());
    }
    if lines.is_empty() {
        lines.push("nothing".to_string());
    }
    lines
}

fn report_import(summary: &ImportSummary, output: &Output) {
    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({
            "status": "success",
            "cellars": summary.cellars,
            "bottles": summary.bottles,
            "settings": summary.settings
        })),
        OutputFormat::Quiet => {}
        OutputFormat::Human => {
            if !summary.changed_anything() {
                output.message("Backup contained no data; nothing changed.");
                return;
            }
            let mut parts = Vec::new();
            if let Some(n) = summary.cellars {
                parts.push(format!("{} cellar(s)", n));
            }
            if let Some(n) = summary.bottles {
                parts.push(format!("{} bottle(s)", n));
            }
            if summary.settings {
                parts.push("settings".to_string());
            }
            output.success(&format!("Imported {}", parts.join(", ")));
        }
    }
}
