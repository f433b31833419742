//! Configuration loading and path resolution
//!
//! Configuration is loaded from `~/.config/wox-settings/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/wox-settings/` (~/.config/wox-settings/)
//! - Data: `$XDG_DATA_HOME/wox/wox-user/` (~/.local/share/wox/wox-user/)
//! - State/Logs: `$XDG_STATE_HOME/wox-settings/` (~/.local/state/wox-settings/)
//!
//! Every component receives its paths through a [`Location`] value built once
//! at startup, never through a global lookup.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Plugin id of the built-in clipboard plugin whose favorites are reconciled
/// during migration.
pub const CLIPBOARD_PLUGIN_ID: &str = "5f815d98-27f5-488d-a756-c317ea39935b";

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

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
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
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Directory overrides
    #[serde(default)]
    pub paths: PathOverrides,

    /// One-shot migration parameters
    #[serde(default)]
    pub migration: MigrationConfig,
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

/// Override paths for the user data directory
#[derive(Debug, Deserialize, Default)]
pub struct PathOverrides {
    /// Root of all persisted user state (target store, settings directory)
    pub user_data_dir: Option<PathBuf>,
}

/// Parameters of the legacy-to-store migration
#[derive(Debug, Deserialize, Clone)]
pub struct MigrationConfig {
    /// JSON files in the settings directory whose name contains this
    /// fragment belong to the application itself, not to a plugin
    #[serde(default = "default_reserved_name_fragment")]
    pub reserved_name_fragment: String,

    /// Plugin id owning the clipboard secondary store
    #[serde(default = "default_clipboard_plugin_id")]
    pub clipboard_plugin_id: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            reserved_name_fragment: default_reserved_name_fragment(),
            clipboard_plugin_id: default_clipboard_plugin_id(),
        }
    }
}

fn default_reserved_name_fragment() -> String {
    "wox".to_string()
}

fn default_clipboard_plugin_id() -> String {
    CLIPBOARD_PLUGIN_ID.to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
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

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/wox-settings/config.toml`
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("wox-settings").join("config.toml")
    }

    /// Returns the default user data directory
    ///
    /// `$XDG_DATA_HOME/wox/wox-user/`
    pub fn default_user_data_dir() -> PathBuf {
        xdg_data_home().join("wox").join("wox-user")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/wox-settings/`
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("wox-settings")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("wox-settings.log")
    }

    /// Resolve the on-disk layout described by this configuration.
    pub fn location(&self) -> Location {
        let root = self
            .paths
            .user_data_dir
            .clone()
            .unwrap_or_else(Self::default_user_data_dir);
        Location::new(root)
    }
}

/// On-disk layout of the user data directory.
///
/// ```text
/// <user_data_dir>/
///   wox.db                          target store
///   settings/
///     wox.setting.json              legacy global settings
///     wox.app.data.json             legacy usage history
///     <pluginId>.json               legacy plugin settings
///     <pluginId>_clipboard.db       clipboard plugin secondary store
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    user_data_dir: PathBuf,
}

impl Location {
    pub fn new(user_data_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_data_dir: user_data_dir.into(),
        }
    }

    pub fn user_data_dir(&self) -> &Path {
        &self.user_data_dir
    }

    /// Target store file. Its existence means migration already happened.
    pub fn database_path(&self) -> PathBuf {
        self.user_data_dir.join("wox.db")
    }

    pub fn settings_dir(&self) -> PathBuf {
        self.user_data_dir.join("settings")
    }

    pub fn legacy_setting_path(&self) -> PathBuf {
        self.settings_dir().join("wox.setting.json")
    }

    pub fn legacy_app_data_path(&self) -> PathBuf {
        self.settings_dir().join("wox.app.data.json")
    }

    pub fn clipboard_database_path(&self, plugin_id: &str) -> PathBuf {
        self.settings_dir().join(format!("{}_clipboard.db", plugin_id))
    }
}
