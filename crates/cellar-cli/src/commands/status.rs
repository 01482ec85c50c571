//! Status command handler

use anyhow::Result;

use cellar_core::storage::format_bytes;
use cellar_core::Store;

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(store: &Store, output: &Output) -> Result<()> {
    let storage = store.medium_stats()?;
    let config = store.config();
    let cellars = store.cellars()?.len();
    let stats = store.stats()?;
    let consumed = store.consumed_bottles()?.len();

    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({
            "data_dir": config.data_dir,
            "database": config.database_path(),
            "sync_enabled": config.sync_enabled,
            "sync_file_name": config.sync_file_name,
            "storage": {
                "keys": storage.keys,
                "value_bytes": storage.value_bytes,
                "file_bytes": storage.file_bytes,
                "quota_bytes": storage.quota_bytes
            },
            "counts": {
                "cellars": cellars,
                "active_bottles": stats.total_bottles,
                "consumed_bottles": consumed
            }
        })),
        OutputFormat::Quiet => {
            println!("{}", config.database_path().display());
        }
        OutputFormat::Human => {
            println!("Cellar Status");
            println!("=============");
            println!();
            println!("Storage:");
            println!("  Location: {}", config.database_path().display());
            println!("  Data:     {}", storage.value_size_human());
            if let Some(file_bytes) = storage.file_bytes {
                println!("  File:     {}", format_bytes(file_bytes));
            }
            if let Some(quota) = storage.quota_bytes {
                println!("  Quota:    {}", format_bytes(quota));
            }
            println!();
            println!("Sync:");
            println!(
                "  Status: {}",
                if config.sync_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!("  File:   {}", config.sync_file_name);
            println!();
            println!("Contents:");
            println!("  Cellars:  {}", cellars);
            println!("  Bottles:  {} active, {} consumed", stats.total_bottles, consumed);
        }
    }

    Ok(())
}
