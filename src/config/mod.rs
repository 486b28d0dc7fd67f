//! Layered configuration.
//!
//! Consolidates configuration from these tiers with field-by-field YAML merging:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/taskdeck/config.yaml`
//! 3. **User** - `~/.taskdeck/config.yaml`
//! 4. **Environment** - the variables below
//!
//! Command-line flags are applied by the caller after loading.
//!
//! ## Environment Variables
//! - `TASKDECK_CONFIG_PATH` - Explicit config file (replaces the file tiers)
//! - `TASKDECK_DB_PATH` - Database path
//! - `TASKDECK_ASSET_ROOT` - Origin directory for offline assets
//! - `TASKDECK_PORT` - HTTP port for `serve`
//! - `TASKDECK_USER_DIR` - User config dir (default: `~/.taskdeck`)
//! - `TASKDECK_PROJECT_DIR` - Project config dir (default: `./taskdeck`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier, apply_overrides};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
