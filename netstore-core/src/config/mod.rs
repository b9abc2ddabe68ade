//! Configuration management for netstore
//!
//! TOML file or environment based configuration with defaults and
//! validation. Every section falls back to its defaults when omitted.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;

pub use error::ConfigError;

use crate::core_store::payload::AuthorizedKeySet;
use crate::logging::LogLevel;

const ENV_PREFIX: &str = "NETSTORE_";

/// Main node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,

    pub inventory: InventoryConfig,

    pub logging: LoggingConfig,

    pub metrics: MetricsConfig,

    /// Upper bound for the final flush on shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

/// Store location and maintenance timers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory, stores live under `<data_dir>/db/network`
    pub data_dir: PathBuf,

    /// Minimum interval between two flushes of a dirty store
    #[serde(with = "humantime_serde")]
    pub persist_interval: Duration,

    /// Period of the expiry sweep
    #[serde(with = "humantime_serde")]
    pub prune_interval: Duration,

    /// Hex encoded Ed25519 keys allowed to sign bonded role attestations
    pub authorized_public_keys: Vec<String>,
}

/// Inventory exchange limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Response size budget in KB
    pub max_size_kb: usize,

    /// Cap on the entries of a locally built filter
    pub max_filter_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    pub json_format: bool,

    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Describe and emit metrics through the `metrics` facade
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            inventory: InventoryConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            persist_interval: Duration::from_secs(1),
            prune_interval: Duration::from_secs(1),
            authorized_public_keys: vec![],
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            max_size_kb: 2000,
            max_filter_entries: 10_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl InventoryConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_kb as u64 * 1024
    }
}

fn invalid_value(var: &str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        var: format!("{}{}", ENV_PREFIX, var),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse().map_err(|e| invalid_value(var, value, e))
}

fn parse_count(var: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse().map_err(|e| invalid_value(var, value, e))
}

fn parse_duration(var: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| invalid_value(var, value, e))
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Variables follow the pattern `NETSTORE_<SECTION>_<KEY>`, for example
    /// `NETSTORE_STORAGE_DATA_DIR=/var/lib/netstore`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `lookup`, keyed by full variable name
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(dir) = var("STORAGE_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = var("STORAGE_PERSIST_INTERVAL") {
            self.storage.persist_interval = parse_duration("STORAGE_PERSIST_INTERVAL", &v)?;
        }
        if let Some(v) = var("STORAGE_PRUNE_INTERVAL") {
            self.storage.prune_interval = parse_duration("STORAGE_PRUNE_INTERVAL", &v)?;
        }
        if let Some(keys) = var("STORAGE_AUTHORIZED_PUBLIC_KEYS") {
            self.storage.authorized_public_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(v) = var("INVENTORY_MAX_SIZE_KB") {
            self.inventory.max_size_kb = parse_count("INVENTORY_MAX_SIZE_KB", &v)?;
        }
        if let Some(v) = var("INVENTORY_MAX_FILTER_ENTRIES") {
            self.inventory.max_filter_entries = parse_count("INVENTORY_MAX_FILTER_ENTRIES", &v)?;
        }

        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(v) = var("LOG_JSON") {
            self.logging.json_format = parse_flag("LOG_JSON", &v)?;
        }

        if let Some(v) = var("METRICS_ENABLED") {
            self.metrics.enabled = parse_flag("METRICS_ENABLED", &v)?;
        }
        if let Some(v) = var("SHUTDOWN_TIMEOUT") {
            self.shutdown_timeout = parse_duration("SHUTDOWN_TIMEOUT", &v)?;
        }
        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.persist_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                key: "storage.persist_interval",
                reason: "must be greater than 0",
            });
        }
        if self.storage.prune_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                key: "storage.prune_interval",
                reason: "must be greater than 0",
            });
        }
        self.authorized_keys()?;

        if self.inventory.max_size_kb == 0 {
            return Err(ConfigError::OutOfRange {
                key: "inventory.max_size_kb",
                reason: "must be greater than 0",
            });
        }

        self.logging
            .level
            .parse::<LogLevel>()
            .map_err(|e| ConfigError::LogLevel(e.to_string()))?;

        Ok(())
    }

    /// Parsed set of bonded role authorizers
    pub fn authorized_keys(&self) -> Result<AuthorizedKeySet, ConfigError> {
        let keys = &self.storage.authorized_public_keys;
        AuthorizedKeySet::from_hex(keys).map_err(|source| ConfigError::AuthorizedKey {
            key: keys
                .iter()
                .find(|key| AuthorizedKeySet::from_hex([key]).is_err())
                .cloned()
                .unwrap_or_default(),
            source,
        })
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
