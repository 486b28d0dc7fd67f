//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::merge::deep_merge_all;
use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Embedded defaults (lowest priority)
    Defaults = 0,
    /// Project-level config ($CWD/taskdeck/)
    Project = 1,
    /// User-level config (~/.taskdeck/)
    User = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Paths for each configuration tier.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project-level config directory
    pub project_dir: Option<PathBuf>,
    /// User-level config directory
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        // User dir: TASKDECK_USER_DIR or ~/.taskdeck
        let user_dir = std::env::var("TASKDECK_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".taskdeck")));

        // Project dir: TASKDECK_PROJECT_DIR or $CWD/taskdeck
        let project_dir = std::env::var("TASKDECK_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("taskdeck")));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }
}

/// Read a YAML file as a generic value, skipping missing or malformed files.
fn read_tier(file: &Path, tier: ConfigTier) -> Option<Value> {
    if !file.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(e) => {
            warn!(%tier, path = %file.display(), error = %e, "failed to read config file");
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => {
            debug!(%tier, path = %file.display(), "loaded config tier");
            Some(value)
        }
        Err(e) => {
            warn!(%tier, path = %file.display(), error = %e, "ignoring malformed config file");
            None
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Paths for each tier
    pub paths: ConfigPaths,
    /// Loaded configuration
    config: Config,
    /// Highest-priority config file that contributed (if any)
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load configuration with explicit paths.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        // Check for explicit config path override
        if let Ok(explicit_path) = std::env::var("TASKDECK_CONFIG_PATH") {
            return Self::load_file(paths, PathBuf::from(explicit_path));
        }

        // Tier 1: Defaults (embedded)
        let mut configs: Vec<Value> = vec![serde_json::to_value(Config::default())?];
        let mut config_path = None;

        // Tier 2: Project config
        if let Some(ref project_dir) = paths.project_dir {
            let file = project_dir.join("config.yaml");
            if let Some(value) = read_tier(&file, ConfigTier::Project) {
                configs.push(value);
                config_path = Some(file);
            }
        }

        // Tier 3: User config
        if let Some(ref user_dir) = paths.user_dir {
            let file = user_dir.join("config.yaml");
            if let Some(value) = read_tier(&file, ConfigTier::User) {
                configs.push(value);
                config_path = Some(file);
            }
        }

        let merged = deep_merge_all(configs);
        let mut config: Config = serde_json::from_value(merged)?;

        // Tier 4: Environment variable overrides
        apply_overrides(&mut config, |key| std::env::var(key).ok());

        Ok(Self {
            paths,
            config,
            config_path,
        })
    }

    /// Load an explicit config file over the defaults, ignoring the other
    /// file tiers. Environment overrides still apply.
    pub fn load_file(paths: ConfigPaths, path: PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let overlay: Value = serde_yaml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;

        let merged = deep_merge_all([serde_json::to_value(Config::default())?, overlay]);
        let mut config: Config = serde_json::from_value(merged)?;
        apply_overrides(&mut config, |key| std::env::var(key).ok());

        Ok(Self {
            paths,
            config,
            config_path: Some(path),
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Get the config file path that was used.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

/// Apply environment-style overrides from `lookup`.
///
/// Unparseable port values are ignored with a warning.
pub fn apply_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(db_path) = lookup("TASKDECK_DB_PATH") {
        config.storage.db_path = PathBuf::from(db_path);
    }

    if let Some(asset_root) = lookup("TASKDECK_ASSET_ROOT") {
        config.cache.asset_root = PathBuf::from(asset_root);
    }

    if let Some(port) = lookup("TASKDECK_PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!(value = %port, error = %e, "ignoring invalid TASKDECK_PORT"),
        }
    }
}
