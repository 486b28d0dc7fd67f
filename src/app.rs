//! Composition root: the store, preferences, scheduler and highlight board
//! wired together.
//!
//! Every mutation goes through the store (which persists) and is followed
//! by [`TodoApp::refresh`], the equivalent of a render: it drops an expired
//! undo buffer and runs a scheduling pass.

use crate::clock::Clock;
use crate::config::Config;
use crate::db::Database;
use crate::error::{TodoError, TodoResult};
use crate::scheduler::{
    DueEvent, DueScheduler, GatedSink, HighlightBoard, NotificationSink, ScheduleReport,
};
use crate::store::{DeletionHandle, LoadOutcome, Preferences, SharedStore, TaskStore};
use crate::types::{NewTask, Task, TaskEdit, Theme};
use crate::view::{self, Projection, ViewParams};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct AppView {
    #[serde(flatten)]
    pub projection: Projection,
    /// Tasks whose due alert fired recently.
    pub highlighted: Vec<String>,
    /// Tag filter choices across the whole collection.
    pub tags: Vec<String>,
    /// Deletion that can still be undone.
    pub pending_undo: Option<DeletionHandle>,
}

#[derive(Clone)]
pub struct TodoApp {
    store: SharedStore,
    prefs: Preferences,
    scheduler: DueScheduler,
    highlights: Arc<HighlightBoard>,
}

impl TodoApp {
    pub fn new(
        store: SharedStore,
        prefs: Preferences,
        scheduler: DueScheduler,
        highlights: Arc<HighlightBoard>,
    ) -> Self {
        Self {
            store,
            prefs,
            scheduler,
            highlights,
        }
    }

    /// Build the app over a database using the configured keys and policies.
    ///
    /// Alerts go to `sink`, gated by the notification preference.
    pub fn open(
        db: &Database,
        config: &Config,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let backend = Arc::new(db.clone());
        let prefs = Preferences::new(backend.clone()).with_keys(
            config.storage.theme_key.clone(),
            config.storage.notifications_key.clone(),
        );

        let mut store = TaskStore::new(backend, config.storage.tasks_key.clone(), clock.clone())
            .with_undo_window(config.undo.window());
        match store.load() {
            LoadOutcome::Empty => debug!("no stored tasks"),
            LoadOutcome::Loaded(count) => info!(count, "tasks loaded"),
            LoadOutcome::Recovered => warn!("stored tasks were unreadable, started empty"),
        }
        let store = SharedStore::new(store);

        let highlights = Arc::new(HighlightBoard::new());
        let gated: Arc<dyn NotificationSink> = Arc::new(GatedSink::new(sink, prefs.clone()));
        let scheduler = DueScheduler::with_policy(
            store.clone(),
            gated,
            highlights.clone(),
            clock,
            config.scheduler.policy(),
        );

        Self::new(store, prefs, scheduler, highlights)
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn scheduler(&self) -> &DueScheduler {
        &self.scheduler
    }

    pub fn highlights(&self) -> &HighlightBoard {
        &self.highlights
    }

    /// Re-render: expire a stale undo buffer and re-arm due timers.
    pub fn refresh(&self) -> ScheduleReport {
        if self.store.with_mut(|s| s.expire_pending()) {
            debug!("undo window elapsed, pending deletion discarded");
        }
        self.scheduler.schedule_all()
    }

    /// Re-run [`TodoApp::refresh`] whenever a due notification fires,
    /// until `shutdown` is cancelled.
    pub fn spawn_listener(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let app = self.clone();
        let mut events = self.scheduler.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(DueEvent::Fired(task)) => {
                            debug!(task_id = %task.id, "re-rendering after due notification");
                            app.refresh();
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "due events lagged, re-rendering");
                            app.refresh();
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        })
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut TaskStore) -> TodoResult<T>) -> TodoResult<T> {
        let result = self.store.with_mut(f)?;
        self.refresh();
        Ok(result)
    }

    pub fn add(&self, new: NewTask) -> TodoResult<Task> {
        self.mutate(|s| s.add(new))
    }

    pub fn edit(&self, id: &str, edit: TaskEdit) -> TodoResult<Task> {
        self.mutate(|s| s.edit(id, edit))
    }

    pub fn set_due(&self, id: &str, due: Option<DateTime<Utc>>) -> TodoResult<Task> {
        self.mutate(|s| s.set_due(id, due))
    }

    pub fn toggle_done(&self, id: &str) -> TodoResult<Task> {
        self.mutate(|s| s.toggle_done(id))
    }

    pub fn delete(&self, id: &str) -> TodoResult<DeletionHandle> {
        self.mutate(|s| s.delete(id))
    }

    pub fn undo(&self, handle: &DeletionHandle) -> TodoResult<Task> {
        self.mutate(|s| s.undo(handle))
    }

    pub fn undo_last(&self) -> TodoResult<Task> {
        self.mutate(|s| s.undo_last())
    }

    /// Move `moved_id` before `before_id`, or to the end when `before_id`
    /// is `None` (a drop below the last item).
    pub fn reorder(&self, moved_id: &str, before_id: Option<&str>) -> TodoResult<()> {
        self.mutate(|s| match before_id {
            Some(before) => s.reorder(moved_id, before),
            None => s.move_to_end(moved_id),
        })
    }

    pub fn clear_completed(&self) -> usize {
        let removed = self.store.with_mut(|s| s.clear_completed());
        self.refresh();
        removed
    }

    /// Remove every task. Refused unless `confirmed`.
    pub fn clear_all(&self, confirmed: bool) -> TodoResult<usize> {
        if !confirmed {
            return Err(TodoError::confirmation_required("Clearing all tasks"));
        }
        let removed = self.store.with_mut(|s| {
            let count = s.len();
            s.clear_all();
            count
        });
        self.refresh();
        Ok(removed)
    }

    pub fn theme(&self) -> Theme {
        self.prefs.theme()
    }

    pub fn set_theme(&self, theme: Theme) -> TodoResult<()> {
        self.prefs.set_theme(theme)
    }

    pub fn toggle_theme(&self) -> TodoResult<Theme> {
        self.prefs.toggle_theme()
    }

    pub fn notifications_enabled(&self) -> bool {
        self.prefs.notifications_enabled()
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> TodoResult<()> {
        self.prefs.set_notifications_enabled(enabled)
    }

    /// Project the current collection for display.
    pub fn view(&self, params: &ViewParams) -> AppView {
        let (projection, tags, pending_undo) = self.store.with(|s| {
            (
                view::project(s.tasks(), params),
                view::tag_options(s.tasks()),
                s.pending_deletion(),
            )
        });
        AppView {
            projection,
            highlighted: self.highlights.highlighted(),
            tags,
            pending_undo,
        }
    }
}
