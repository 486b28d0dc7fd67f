//! Persisted UI preferences: colour theme and the notification switch.

use crate::db::KeyValueStore;
use crate::error::{TodoError, TodoResult};
use crate::types::Theme;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_THEME_KEY: &str = "tasks_theme";
pub const DEFAULT_NOTIFICATIONS_KEY: &str = "notifications_enabled";

/// Preference accessors over the same backing store as the tasks.
#[derive(Clone)]
pub struct Preferences {
    backend: Arc<dyn KeyValueStore>,
    theme_key: String,
    notifications_key: String,
}

impl Preferences {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            theme_key: DEFAULT_THEME_KEY.to_string(),
            notifications_key: DEFAULT_NOTIFICATIONS_KEY.to_string(),
        }
    }

    pub fn with_keys(mut self, theme_key: impl Into<String>, notifications_key: impl Into<String>) -> Self {
        self.theme_key = theme_key.into();
        self.notifications_key = notifications_key.into();
        self
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "failed to read preference");
                None
            }
        }
    }

    /// Selected theme; missing or unrecognised values mean light.
    pub fn theme(&self) -> Theme {
        self.read(&self.theme_key)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> TodoResult<()> {
        self.backend
            .set(&self.theme_key, theme.as_str())
            .map_err(TodoError::storage)
    }

    /// Flip the theme and return the new one.
    pub fn toggle_theme(&self) -> TodoResult<Theme> {
        let next = self.theme().toggled();
        self.set_theme(next)?;
        Ok(next)
    }

    /// Whether due alerts may be shown. Defaults to on.
    pub fn notifications_enabled(&self) -> bool {
        match self.read(&self.notifications_key).as_deref() {
            Some("false") => false,
            Some(_) | None => true,
        }
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> TodoResult<()> {
        let value = if enabled { "true" } else { "false" };
        self.backend
            .set(&self.notifications_key, value)
            .map_err(TodoError::storage)
    }
}
