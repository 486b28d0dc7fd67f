//! Notification sinks: where due alerts are delivered.

use crate::store::Preferences;
use crate::types::{Task, TaskId};
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Permission state of a notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// Not decided yet; the sink may be asked.
    Default,
}

/// A user-facing alert for a task that became due.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DueAlert {
    pub task_id: TaskId,
    pub title: String,
    pub body: String,
    pub due: Option<DateTime<Utc>>,
}

impl DueAlert {
    pub fn for_task(task: &Task) -> Self {
        let body = match task.due {
            Some(due) => format!(
                "{} (due {})",
                task.text,
                due.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            ),
            None => task.text.clone(),
        };
        Self {
            task_id: task.id.clone(),
            title: "Task due".to_string(),
            body,
            due: task.due,
        }
    }
}

/// External alert channel. Delivery is fire-and-forget.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn permission(&self) -> Permission;

    /// Ask for permission when it has not been decided yet.
    async fn request_permission(&self) -> Permission {
        self.permission()
    }

    async fn show(&self, alert: &DueAlert) -> anyhow::Result<()>;
}

/// Resolve permission, asking once if undecided.
pub async fn ensure_permission(sink: &dyn NotificationSink) -> bool {
    match sink.permission() {
        Permission::Granted => true,
        Permission::Denied => false,
        Permission::Default => sink.request_permission().await == Permission::Granted,
    }
}

/// Emits alerts as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    async fn show(&self, alert: &DueAlert) -> anyhow::Result<()> {
        info!(task_id = %alert.task_id, title = %alert.title, "{}", alert.body);
        Ok(())
    }
}

/// Prints alerts to stdout, for the foreground `watch` command.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

#[async_trait]
impl NotificationSink for ConsoleSink {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    async fn show(&self, alert: &DueAlert) -> anyhow::Result<()> {
        println!("\u{23f0} {}: {}", alert.title, alert.body);
        Ok(())
    }
}

/// Wraps a sink and reports `Denied` while the notification preference is off.
pub struct GatedSink {
    inner: Arc<dyn NotificationSink>,
    prefs: Preferences,
}

impl GatedSink {
    pub fn new(inner: Arc<dyn NotificationSink>, prefs: Preferences) -> Self {
        Self { inner, prefs }
    }
}

#[async_trait]
impl NotificationSink for GatedSink {
    fn permission(&self) -> Permission {
        if !self.prefs.notifications_enabled() {
            return Permission::Denied;
        }
        self.inner.permission()
    }

    async fn request_permission(&self) -> Permission {
        if !self.prefs.notifications_enabled() {
            return Permission::Denied;
        }
        self.inner.request_permission().await
    }

    async fn show(&self, alert: &DueAlert) -> anyhow::Result<()> {
        self.inner.show(alert).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use std::sync::Mutex;

    struct Undecided {
        answer: Permission,
        asked: Mutex<u32>,
    }

    #[async_trait]
    impl NotificationSink for Undecided {
        fn permission(&self) -> Permission {
            Permission::Default
        }

        async fn request_permission(&self) -> Permission {
            *self.asked.lock().unwrap() += 1;
            self.answer
        }

        async fn show(&self, _alert: &DueAlert) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_ensure_permission_asks_when_undecided() {
        let sink = Undecided {
            answer: Permission::Granted,
            asked: Mutex::new(0),
        };
        assert!(ensure_permission(&sink).await);
        assert_eq!(*sink.asked.lock().unwrap(), 1);

        let refusing = Undecided {
            answer: Permission::Denied,
            asked: Mutex::new(0),
        };
        assert!(!ensure_permission(&refusing).await);
    }

    #[tokio::test]
    async fn test_gated_sink_follows_preference() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let prefs = Preferences::new(db);
        let gated = GatedSink::new(Arc::new(LogSink), prefs.clone());

        assert_eq!(gated.permission(), Permission::Granted);
        prefs.set_notifications_enabled(false).unwrap();
        assert_eq!(gated.permission(), Permission::Denied);
        assert!(!ensure_permission(&gated).await);
    }

    #[test]
    fn test_alert_body_includes_text() {
        let task = Task {
            id: "t1".to_string(),
            text: "Pay rent".to_string(),
            tags: vec![],
            due: DateTime::from_timestamp(1_700_000_000, 0),
            priority: Default::default(),
            done: false,
            created_at: DateTime::from_timestamp(1_690_000_000, 0).unwrap(),
            notified: false,
        };
        let alert = DueAlert::for_task(&task);
        assert!(alert.body.starts_with("Pay rent (due "));
        assert_eq!(alert.task_id, "t1");
    }
}
