//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/wxreader/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/wxreader/` (~/.config/wxreader/)
//! - State/Logs: `$XDG_STATE_HOME/wxreader/` (~/.local/state/wxreader/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Storage location and layout limits
    #[serde(default)]
    pub storage: StoreConfig,

    /// Local account overrides
    #[serde(default)]
    pub account: AccountConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage discovery configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Default storage root used when none is given on the command line
    pub root: Option<PathBuf>,

    /// Upper bound on `message_N.db` shards enumerated per root
    #[serde(default = "default_max_shards")]
    pub max_shards: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: None,
            max_shards: default_max_shards(),
        }
    }
}

fn default_max_shards() -> usize {
    100
}

/// Local account configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AccountConfig {
    /// The local user's own identifier.
    ///
    /// Takes precedence over `info.json` in the storage root.
    pub wxid: Option<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::debug!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        if config.storage.max_shards == 0 {
            return Err(Error::Config(
                "storage.max_shards must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/wxreader/config.toml` (~/.config/wxreader/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("wxreader").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/wxreader/` (~/.local/state/wxreader/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("wxreader")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/wxreader/wxreader.log` (~/.local/state/wxreader/wxreader.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("wxreader.log")
    }
}
