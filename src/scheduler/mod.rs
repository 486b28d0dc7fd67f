//! Due-time scheduling.
//!
//! Each call to [`DueScheduler::schedule_all`] cancels every timer armed by
//! the previous pass and re-derives the schedule from the current store
//! contents. A pass never arms two timers for the same task, and a task is
//! marked notified (and persisted) before its alert is handed to the sink,
//! so each due time fires at most once across reloads.

pub mod highlight;
pub mod sink;

pub use highlight::{HighlightBoard, Highlighter};
pub use sink::{ConsoleSink, DueAlert, GatedSink, LogSink, NotificationSink, Permission};

use crate::clock::Clock;
use crate::error::ErrorCode;
use crate::store::SharedStore;
use crate::types::{Task, TaskId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Tasks due further out than this are left for a later pass.
pub const DEFAULT_HORIZON_DAYS: i64 = 7;

/// How long a fired task stays highlighted.
pub const DEFAULT_HIGHLIGHT_MS: u64 = 4_000;

const EVENT_CAPACITY: usize = 64;

/// Timing policy for a scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerPolicy {
    pub horizon: chrono::Duration,
    pub highlight_for: Duration,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            horizon: chrono::Duration::days(DEFAULT_HORIZON_DAYS),
            highlight_for: Duration::from_millis(DEFAULT_HIGHLIGHT_MS),
        }
    }
}

/// Broadcast whenever a due notification fires.
#[derive(Debug, Clone)]
pub enum DueEvent {
    /// The task was marked notified; carries the updated record.
    Fired(Task),
}

/// What a scheduling pass did with each eligible task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleReport {
    /// Already past due; fired during the pass.
    pub fired: Vec<TaskId>,
    /// Timer armed within the horizon.
    pub armed: Vec<TaskId>,
    /// Beyond the horizon.
    pub deferred: Vec<TaskId>,
}

struct Inner {
    store: SharedStore,
    sink: Arc<dyn NotificationSink>,
    highlighter: Arc<dyn Highlighter>,
    clock: Arc<dyn Clock>,
    policy: SchedulerPolicy,
    events: broadcast::Sender<DueEvent>,
    current: Mutex<CancellationToken>,
    alerts: TaskTracker,
}

/// Arms one timer per eligible task and fires due notifications.
#[derive(Clone)]
pub struct DueScheduler {
    inner: Arc<Inner>,
}

impl DueScheduler {
    pub fn new(
        store: SharedStore,
        sink: Arc<dyn NotificationSink>,
        highlighter: Arc<dyn Highlighter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_policy(store, sink, highlighter, clock, SchedulerPolicy::default())
    }

    pub fn with_policy(
        store: SharedStore,
        sink: Arc<dyn NotificationSink>,
        highlighter: Arc<dyn Highlighter>,
        clock: Arc<dyn Clock>,
        policy: SchedulerPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                sink,
                highlighter,
                clock,
                policy,
                events,
                current: Mutex::new(CancellationToken::new()),
                alerts: TaskTracker::new(),
            }),
        }
    }

    pub fn policy(&self) -> &SchedulerPolicy {
        &self.inner.policy
    }

    /// Subscribe to fired notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<DueEvent> {
        self.inner.events.subscribe()
    }

    /// Cancel every armed timer without re-arming.
    pub fn cancel_all(&self) {
        let mut current = self.inner.current.lock().unwrap();
        current.cancel();
        *current = CancellationToken::new();
    }

    /// Wait for alerts handed to the sink so far to finish delivering.
    ///
    /// Short-lived processes call this before exiting.
    pub async fn flush_alerts(&self) {
        self.inner.alerts.close();
        self.inner.alerts.wait().await;
        self.inner.alerts.reopen();
    }

    /// Re-derive the schedule from the store.
    ///
    /// Must be called from within a tokio runtime: timers and alert delivery
    /// are spawned tasks.
    pub fn schedule_all(&self) -> ScheduleReport {
        let token = {
            let mut current = self.inner.current.lock().unwrap();
            current.cancel();
            *current = CancellationToken::new();
            current.clone()
        };

        let now = self.inner.clock.now();
        let candidates: Vec<(TaskId, DateTime<Utc>)> = self.inner.store.with(|store| {
            store
                .tasks()
                .iter()
                .filter(|t| t.awaits_notification())
                .filter_map(|t| t.due.map(|due| (t.id.clone(), due)))
                .collect()
        });

        let mut report = ScheduleReport::default();
        for (id, due) in candidates {
            let remaining = due - now;
            if remaining <= chrono::Duration::zero() {
                if self.inner.fire(&id, due) {
                    report.fired.push(id);
                }
            } else if remaining <= self.inner.policy.horizon {
                let wait = remaining.to_std().unwrap_or_default();
                self.arm(token.clone(), id.clone(), due, wait);
                report.armed.push(id);
            } else {
                report.deferred.push(id);
            }
        }

        debug!(
            fired = report.fired.len(),
            armed = report.armed.len(),
            deferred = report.deferred.len(),
            "scheduling pass complete"
        );
        report
    }

    fn arm(&self, token: CancellationToken, id: TaskId, due: DateTime<Utc>, wait: Duration) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(wait) => {
                    inner.fire(&id, due);
                }
            }
        });
    }
}

impl Inner {
    /// Mark the task notified, then deliver the alert and highlight it.
    /// Returns false if the task no longer qualifies.
    fn fire(&self, id: &str, due: DateTime<Utc>) -> bool {
        let Some(task) = self.store.with_mut(|store| store.mark_notified(id, due)) else {
            debug!(task_id = %id, "task no longer awaits notification, skipping");
            return false;
        };
        info!(task_id = %task.id, "due notification fired");

        self.deliver(&task);
        self.highlight(&task.id);
        // No subscribers is fine
        let _ = self.events.send(DueEvent::Fired(task));
        true
    }

    fn deliver(&self, task: &Task) {
        let channel = Arc::clone(&self.sink);
        let alert = DueAlert::for_task(task);
        self.alerts.spawn(async move {
            if !sink::ensure_permission(channel.as_ref()).await {
                debug!(
                    task_id = %alert.task_id,
                    code = ?ErrorCode::NotificationDenied,
                    "notification permission denied, alert dropped"
                );
                return;
            }
            if let Err(e) = channel.show(&alert).await {
                warn!(task_id = %alert.task_id, error = %e, "failed to show notification");
            }
        });
    }

    fn highlight(&self, id: &str) {
        let ticket = self.highlighter.highlight(id);
        let highlighter = Arc::clone(&self.highlighter);
        let id = id.to_string();
        let hold = self.policy.highlight_for;
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            highlighter.clear(&id, ticket);
        });
    }
}
