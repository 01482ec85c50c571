//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/cellar/config.toml)
//! 3. Environment variables (CELLAR_* prefix)
//!
//! Environment variables take precedence over config file values. The sync
//! bearer token is never stored here.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::sync::{DEFAULT_API_URL, DEFAULT_FILE_NAME};

/// Environment variable prefix
const ENV_PREFIX: &str = "CELLAR";

/// Keys accepted by [`Config::set_value`]
pub const CONFIG_KEYS: &[&str] = &[
    "data_dir",
    "sync_enabled",
    "sync_api_url",
    "sync_file_name",
    "sync_timeout_secs",
    "storage_quota_bytes",
    "seed_default_cellar",
    "log_file",
];

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for the database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Push to the cloud drive after every change
    #[serde(default)]
    pub sync_enabled: bool,

    /// Cloud drive API root
    #[serde(default = "default_sync_api_url")]
    pub sync_api_url: String,

    /// Name of the remote file
    #[serde(default = "default_sync_file_name")]
    pub sync_file_name: String,

    /// Upper bound on each sync request and on the final push at exit
    #[serde(default = "default_sync_timeout_secs")]
    pub sync_timeout_secs: u64,

    /// Optional cap on database size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_quota_bytes: Option<u64>,

    /// Create the default cellar on first run
    #[serde(default = "default_true")]
    pub seed_default_cellar: bool,

    /// Write logs here instead of stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sync_enabled: false,
            sync_api_url: default_sync_api_url(),
            sync_file_name: default_sync_file_name(),
            sync_timeout_secs: default_sync_timeout_secs(),
            storage_quota_bytes: None,
            seed_default_cellar: true,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (CELLAR_DATA_DIR, CELLAR_SYNC_ENABLED, CELLAR_SYNC_API_URL)
    /// 2. Config file (~/.config/cellar/config.toml or CELLAR_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load from `--config` when given, otherwise the default location
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_SYNC_ENABLED", ENV_PREFIX)) {
            self.sync_enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }

        // Empty string restores the default
        if let Ok(val) = std::env::var(format!("{}_SYNC_API_URL", ENV_PREFIX)) {
            self.sync_api_url = if val.is_empty() {
                default_sync_api_url()
            } else {
                val
            };
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Update one key from its string form
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let cleared = value.is_empty() || value == "none";
        match key {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "sync_enabled" => {
                self.sync_enabled = value
                    .parse()
                    .context("Invalid value for sync_enabled. Use 'true' or 'false'.")?
            }
            "sync_api_url" => {
                self.sync_api_url = if cleared {
                    default_sync_api_url()
                } else {
                    value.to_string()
                }
            }
            "sync_file_name" => {
                if cleared {
                    bail!("sync_file_name cannot be empty");
                }
                self.sync_file_name = value.to_string();
            }
            "sync_timeout_secs" => {
                self.sync_timeout_secs = value
                    .parse()
                    .context("Invalid value for sync_timeout_secs. Use a number of seconds.")?
            }
            "storage_quota_bytes" => {
                self.storage_quota_bytes = if cleared {
                    None
                } else {
                    Some(value.parse().context(
                        "Invalid value for storage_quota_bytes. Use a number of bytes or 'none'.",
                    )?)
                }
            }
            "seed_default_cellar" => {
                self.seed_default_cellar = value
                    .parse()
                    .context("Invalid value for seed_default_cellar. Use 'true' or 'false'.")?
            }
            "log_file" => {
                self.log_file = if cleared {
                    None
                } else {
                    Some(PathBuf::from(value))
                }
            }
            _ => bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                CONFIG_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with CELLAR_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cellar")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("cellar.db")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cellar")
}

fn default_sync_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_sync_file_name() -> String {
    DEFAULT_FILE_NAME.to_string()
}

fn default_sync_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "CELLAR_DATA_DIR",
        "CELLAR_SYNC_ENABLED",
        "CELLAR_SYNC_API_URL",
        "CELLAR_CONFIG",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.sync_enabled);
        assert_eq!(config.sync_api_url, DEFAULT_API_URL);
        assert_eq!(config.sync_file_name, "cellarvision_db.json");
        assert_eq!(config.sync_timeout_secs, 30);
        assert!(config.seed_default_cellar);
        assert!(config.storage_quota_bytes.is_none());
        assert!(config.data_dir.ends_with("cellar"));
        assert!(config.database_path().ends_with("cellar.db"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("CELLAR_DATA_DIR", "/tmp/cellar-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/cellar-test"));
    }

    #[test]
    fn test_env_override_sync_enabled() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("CELLAR_SYNC_ENABLED", "TRUE");
        config.apply_env_overrides();
        assert!(config.sync_enabled);

        env::set_var("CELLAR_SYNC_ENABLED", "0");
        config.apply_env_overrides();
        assert!(!config.sync_enabled);
    }

    #[test]
    fn test_env_override_sync_api_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("CELLAR_SYNC_API_URL", "http://localhost:9000");
        config.apply_env_overrides();
        assert_eq!(config.sync_api_url, "http://localhost:9000");

        env::set_var("CELLAR_SYNC_API_URL", "");
        config.apply_env_overrides();
        assert_eq!(config.sync_api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_load_from_str_fills_defaults() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::load_from_str(
            r#"
            data_dir = "/custom/data"
            sync_enabled = true
            storage_quota_bytes = 5242880
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert!(config.sync_enabled);
        assert_eq!(config.storage_quota_bytes, Some(5_242_880));
        assert_eq!(config.sync_file_name, DEFAULT_FILE_NAME);
        assert!(config.seed_default_cellar);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        env::set_var("CELLAR_DATA_DIR", &data_dir);

        let config = Config::load_from_path(&temp_dir.path().join("missing.toml")).unwrap();
        assert!(!config.sync_enabled);
        assert_eq!(config.data_dir, data_dir);
        assert!(data_dir.exists());
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.data_dir = temp_dir.path().join("data");
        config.set_value("sync_timeout_secs", "5").unwrap();
        config.set_value("log_file", "/tmp/cellar.log").unwrap();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_with_cli_override(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_set_value() {
        let mut config = Config::default();

        config.set_value("sync_enabled", "true").unwrap();
        assert!(config.sync_enabled);

        config.set_value("storage_quota_bytes", "1024").unwrap();
        assert_eq!(config.storage_quota_bytes, Some(1024));
        config.set_value("storage_quota_bytes", "none").unwrap();
        assert!(config.storage_quota_bytes.is_none());

        config.set_value("sync_api_url", "").unwrap();
        assert_eq!(config.sync_api_url, DEFAULT_API_URL);

        assert!(config.set_value("sync_enabled", "yes").is_err());
        assert!(config.set_value("sync_file_name", "").is_err());

        let err = config.set_value("favorite_tag", "x").unwrap_err();
        assert!(err.to_string().contains("Valid keys"));
    }
}
