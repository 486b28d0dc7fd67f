//! Configuration types.

use crate::offline::{DEFAULT_CACHE_NAME, DEFAULT_MANIFEST, OFFLINE_FALLBACK_PATH};
use crate::scheduler::{DEFAULT_HIGHLIGHT_MS, DEFAULT_HORIZON_DAYS, SchedulerPolicy};
use crate::store::prefs::{DEFAULT_NOTIFICATIONS_KEY, DEFAULT_THEME_KEY};
use crate::store::{DEFAULT_TASKS_KEY, DEFAULT_UNDO_WINDOW_MS};
use crate::view::{Filter, SortKey, ViewParams};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default HTTP port for `serve`.
pub const DEFAULT_PORT: u16 = 8421;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub undo: UndoConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

/// Where and under which keys state is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_tasks_key")]
    pub tasks_key: String,

    #[serde(default = "default_theme_key")]
    pub theme_key: String,

    #[serde(default = "default_notifications_key")]
    pub notifications_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            tasks_key: default_tasks_key(),
            theme_key: default_theme_key(),
            notifications_key: default_notifications_key(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("taskdeck/taskdeck.db")
}

fn default_tasks_key() -> String {
    DEFAULT_TASKS_KEY.to_string()
}

fn default_theme_key() -> String {
    DEFAULT_THEME_KEY.to_string()
}

fn default_notifications_key() -> String {
    DEFAULT_NOTIFICATIONS_KEY.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoConfig {
    /// How long a deletion stays undoable.
    #[serde(default = "default_undo_window_ms")]
    pub window_ms: i64,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            window_ms: default_undo_window_ms(),
        }
    }
}

impl UndoConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.window_ms.max(0))
    }
}

fn default_undo_window_ms() -> i64 {
    DEFAULT_UNDO_WINDOW_MS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Due times further out than this are not armed yet.
    #[serde(default = "default_horizon_days")]
    pub horizon_days: i64,

    /// How long a fired task stays highlighted.
    #[serde(default = "default_highlight_ms")]
    pub highlight_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            highlight_ms: default_highlight_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn policy(&self) -> SchedulerPolicy {
        SchedulerPolicy {
            horizon: chrono::Duration::days(self.horizon_days.max(0)),
            highlight_for: Duration::from_millis(self.highlight_ms),
        }
    }
}

fn default_horizon_days() -> i64 {
    DEFAULT_HORIZON_DAYS
}

fn default_highlight_ms() -> u64 {
    DEFAULT_HIGHLIGHT_MS
}

/// Offline cache worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Version tag; caches with any other name are deleted on activation.
    #[serde(default = "default_cache_name")]
    pub name: String,

    /// Assets pre-cached on install.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    #[serde(default = "default_fallback_path")]
    pub fallback_path: String,

    /// Local origin directory served as the "network".
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,

    /// Proxy this HTTP origin instead of the local directory.
    #[serde(default)]
    pub upstream: Option<String>,

    /// Upstream request timeout.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: default_cache_name(),
            manifest: default_manifest(),
            fallback_path: default_fallback_path(),
            asset_root: default_asset_root(),
            upstream: None,
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

fn default_cache_name() -> String {
    DEFAULT_CACHE_NAME.to_string()
}

fn default_manifest() -> Vec<String> {
    DEFAULT_MANIFEST.iter().map(|p| p.to_string()).collect()
}

fn default_fallback_path() -> String {
    OFFLINE_FALLBACK_PATH.to_string()
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("public")
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Defaults for list projections when the caller does not pick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub filter: Filter,

    #[serde(default)]
    pub sort: SortKey,
}

impl ViewConfig {
    pub fn params(&self) -> ViewParams {
        ViewParams::default()
            .with_filter(self.filter)
            .with_sort(self.sort)
    }
}
