//! Configuration module for treesync.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `TREESYNC_` and use double
//! underscores to separate nested levels:
//! - `TREESYNC_MONITOR__PERSISTENT=true` sets `monitor.persistent`
//! - `TREESYNC_SYNC__BATCH_SIZE=50` sets `sync.batch_size`
//! - `TREESYNC_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::monitor::BackendKind;
use crate::monitor::EventMask;
use crate::monitor::event::event_from_name;
use crate::sync::QUEUE_PROCESS_BATCH_SIZE;

/// Directory holding settings and databases, relative to the workspace root.
pub const CONFIG_DIR: &str = ".treesync";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration file already exists: {0}. Use --force to overwrite")]
    AlreadyExists(PathBuf),

    #[error("Unknown event name '{name}' for watched path {path}")]
    UnknownEvent { name: String, path: PathBuf },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .treesync is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Change detection settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Reconciliation settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MonitorConfig {
    /// Keep the scanner baseline on disk so restarts recover missed events
    #[serde(default = "default_false")]
    pub persistent: bool,

    /// Dispatch CREATED for every file found when a path is first scanned
    #[serde(default = "default_false")]
    pub trigger_events_for_initial_scan: bool,

    /// Directory names skipped anywhere in a monitored tree
    #[serde(default)]
    pub ignored_dirs: Vec<String>,

    #[serde(default)]
    pub backend: BackendKind,

    /// Rescan interval for the polling backend
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long a live event must stay quiet before it is dispatched
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Monitoring loop wait; bounds shutdown latency
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Baseline database used when persistent
    #[serde(default = "default_baseline_db")]
    pub baseline_db: PathBuf,

    /// Directories to monitor at startup
    #[serde(default)]
    pub paths: Vec<WatchedDir>,
}

/// A directory and the events its subscriber wants.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct WatchedDir {
    pub path: PathBuf,

    /// Canonical event names, e.g. `["CREATED", "DELETED"]`
    #[serde(default = "default_events")]
    pub events: Vec<String>,
}

impl WatchedDir {
    /// Parse the configured event names into a mask.
    pub fn mask(&self) -> Result<EventMask, ConfigError> {
        self.events.iter().try_fold(EventMask::empty(), |mask, name| {
            event_from_name(name)
                .map(|bit| mask | bit)
                .ok_or_else(|| ConfigError::UnknownEvent {
                    name: name.clone(),
                    path: self.path.clone(),
                })
        })
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Items reconciled per drain cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between drain cycles
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,

    /// Remote server every change is mirrored to
    #[serde(default = "default_server")]
    pub server: String,

    /// Prefix joined with the path relative to the monitored directory
    #[serde(default)]
    pub url_prefix: String,

    /// Synced-files database
    #[serde(default = "default_synced_files_db")]
    pub synced_files_db: PathBuf,
}

/// Logging configuration.
///
/// `RUST_LOG` takes precedence over these settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all modules
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `treesync::sync = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_settle_ms() -> u64 {
    250
}
fn default_tick_ms() -> u64 {
    100
}
fn default_baseline_db() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("baseline.db")
}
fn default_events() -> Vec<String> {
    ["CREATED", "MODIFIED", "DELETED", "MONITORED_DIR_MOVED", "DROPPED_EVENTS"]
        .map(String::from)
        .to_vec()
}
fn default_batch_size() -> usize {
    QUEUE_PROCESS_BATCH_SIZE
}
fn default_drain_interval_ms() -> u64 {
    500
}
fn default_server() -> String {
    "default".to_string()
}
fn default_synced_files_db() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("synced_files.db")
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            monitor: MonitorConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            persistent: false,
            trigger_events_for_initial_scan: false,
            ignored_dirs: vec![".git".to_string(), CONFIG_DIR.to_string()],
            backend: BackendKind::default(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_ms: default_settle_ms(),
            tick_ms: default_tick_ms(),
            baseline_db: default_baseline_db(),
            paths: Vec::new(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            drain_interval_ms: default_drain_interval_ms(),
            server: default_server(),
            url_prefix: String::new(),
            synced_files_db: default_synced_files_db(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, ConfigError> {
        // Try to find the workspace root by looking for .treesync directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        let mut settings = Self::figment(config_path)
            .extract::<Settings>()
            .map_err(Box::new)?;

        // If workspace_root is not set in config, detect it
        if settings.workspace_root.is_none() {
            settings.workspace_root = Self::workspace_root();
        }
        Ok(settings)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment(path.as_ref())
            .extract::<Settings>()
            .map_err(Box::new)?)
    }

    fn figment(config_path: impl AsRef<Path>) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path.as_ref()))
            // Double underscore separates nested levels; single underscores
            // stay within field names
            .merge(Env::prefixed("TREESYNC_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
    }

    /// Find the workspace root by looking for .treesync directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join("settings.toml"))
    }

    /// Get the workspace root directory (where .treesync is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Resolve a configured path against the workspace root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Every watched directory with its parsed event mask.
    pub fn watched_dirs(&self) -> Result<Vec<(PathBuf, EventMask)>, ConfigError> {
        self.monitor
            .paths
            .iter()
            .map(|dir| Ok((self.resolve(&dir.path), dir.mask()?)))
            .collect()
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `dir`
    pub fn init_config_file(dir: impl AsRef<Path>, force: bool) -> Result<PathBuf, ConfigError> {
        let config_path = dir.as_ref().join(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err(ConfigError::AlreadyExists(config_path));
        }

        let settings = Settings {
            workspace_root: Some(dir.as_ref().to_path_buf()),
            ..Settings::default()
        };
        settings.save(&config_path)?;

        Ok(config_path)
    }
}
