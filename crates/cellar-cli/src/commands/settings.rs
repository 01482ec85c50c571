//! Currency settings

use anyhow::{bail, Result};

use cellar_core::models::CURRENCY_PRESETS;
use cellar_core::{Settings, Store};

use crate::output::{Output, OutputFormat};

pub fn show(store: &Store, output: &Output) -> Result<()> {
    let settings = store.settings()?;
    match output.format {
        OutputFormat::Json => output.json(&settings),
        OutputFormat::Quiet => println!("{}", settings.currency_code()),
        OutputFormat::Human => {
            println!("Currency: {} ({})", settings.currency_code(), settings.currency_symbol);
            if settings.is_custom() {
                println!("          custom currency");
            }
            println!();
            println!("Built-in currencies:");
            for preset in CURRENCY_PRESETS {
                println!("  {:<4} {:<4} {}", preset.code, preset.symbol, preset.name);
            }
        }
    }
    Ok(())
}

/// Switch to a built-in currency
pub fn currency(store: &mut Store, code: &str, output: &Output) -> Result<()> {
    let Some(settings) = Settings::preset(code) else {
        let known: Vec<&str> = CURRENCY_PRESETS.iter().map(|p| p.code).collect();
        bail!(
            "Unknown currency '{}'. Built-in currencies: {}\nUse `cellar settings custom <code> <symbol>` for others.",
            code,
            known.join(", ")
        );
    };
    save(store, settings, output)
}

/// Switch to a user-defined currency
pub fn custom(store: &mut Store, code: String, symbol: String, output: &Output) -> Result<()> {
    if code.trim().is_empty() || symbol.trim().is_empty() {
        bail!("Currency code and symbol cannot be empty");
    }
    save(store, Settings::custom(code.trim(), symbol.trim()), output)
}

fn save(store: &mut Store, settings: Settings, output: &Output) -> Result<()> {
    store.save_settings(&settings)?;
    if output.is_json() {
        output.json(&settings);
    } else {
        output.success(&format!(
            "Currency set to {} ({})",
            settings.currency_code(),
            settings.currency_symbol
        ));
    }
    Ok(())
}
