//! Config command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use cellar_core::Config;

use crate::output::{Output, OutputFormat};

fn or_unset<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => output.json(&config),
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:            {}", config.data_dir.display());
            println!("  sync_enabled:        {}", config.sync_enabled);
            println!("  sync_api_url:        {}", config.sync_api_url);
            println!("  sync_file_name:      {}", config.sync_file_name);
            println!("  sync_timeout_secs:   {}", config.sync_timeout_secs);
            println!("  storage_quota_bytes: {}", or_unset(config.storage_quota_bytes));
            println!("  seed_default_cellar: {}", config.seed_default_cellar);
            println!(
                "  log_file:            {}",
                or_unset(config.log_file.as_ref().map(|p| p.display()))
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(config_path: Option<&PathBuf>, key: &str, value: &str, output: &Output) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    config.set_value(key, value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_writes_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        set(Some(&path), "sync_file_name", "cellar_backup.json", &output).unwrap();
        set(Some(&path), "storage_quota_bytes", "1048576", &output).unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.sync_file_name, "cellar_backup.json");
        assert_eq!(config.storage_quota_bytes, Some(1_048_576));
    }

    #[test]
    fn test_set_unknown_key_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        assert!(set(Some(&path), "favorite_wine", "Barolo", &output).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_or_unset() {
        assert_eq!(or_unset(None::<u64>), "(not set)");
        assert_eq!(or_unset(Some(42)), "42");
    }
}
