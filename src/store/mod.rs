//! Task store: the ordered task collection and every mutation on it.
//!
//! The store exclusively owns the collection. Each mutating operation writes
//! the whole collection through to the backing key-value store as one JSON
//! blob before returning.

pub mod prefs;
mod undo;

pub use prefs::Preferences;
pub use undo::DeletionHandle;

use crate::clock::Clock;
use crate::db::KeyValueStore;
use crate::error::{TodoError, TodoResult};
use crate::types::{NewTask, Task, TaskEdit, TaskId, normalize_tags};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use undo::UndoSlot;

/// Default key the task collection is stored under.
pub const DEFAULT_TASKS_KEY: &str = "tasks_v2";

/// Default undo window for deletions (matches the undo toast lifetime).
pub const DEFAULT_UNDO_WINDOW_MS: i64 = 7_000;

/// What `load` found in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing stored yet.
    Empty,
    /// Collection restored with this many tasks.
    Loaded(usize),
    /// Stored data was unreadable and the collection was reset to empty.
    Recovered,
}

/// In-memory task collection with write-through persistence.
pub struct TaskStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    clock: Arc<dyn Clock>,
    tasks: Vec<Task>,
    undo: UndoSlot,
}

impl TaskStore {
    /// Create an empty store. Call [`TaskStore::load`] to restore persisted tasks.
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            key: key.into(),
            clock,
            tasks: Vec::new(),
            undo: UndoSlot::new(Duration::milliseconds(DEFAULT_UNDO_WINDOW_MS)),
        }
    }

    /// Create a store and immediately load the persisted collection.
    pub fn open(backend: Arc<dyn KeyValueStore>, key: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let mut store = Self::new(backend, key, clock);
        store.load();
        store
    }

    pub fn with_undo_window(mut self, window: Duration) -> Self {
        self.undo = UndoSlot::new(window);
        self
    }

    pub fn undo_window(&self) -> Duration {
        self.undo.window()
    }

    /// Current time according to the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// All tasks in stored (manual) order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn position(&self, id: &str) -> TodoResult<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| TodoError::task_not_found(id))
    }

    /// Create a task and insert it at the head of the collection.
    pub fn add(&mut self, new: NewTask) -> TodoResult<Task> {
        let text = new.text.trim();
        if text.is_empty() {
            return Err(TodoError::blank_text());
        }

        let task = Task {
            id: uuid::Uuid::now_v7().to_string(),
            text: text.to_string(),
            tags: normalize_tags(&new.tags),
            due: new.due,
            priority: new.priority,
            done: false,
            created_at: self.clock.now(),
            notified: false,
        };

        self.tasks.insert(0, task.clone());
        self.persist();
        info!(task_id = %task.id, "task added");
        Ok(task)
    }

    /// Apply a partial update. Nothing is changed if validation fails.
    pub fn edit(&mut self, id: &str, edit: TaskEdit) -> TodoResult<Task> {
        let idx = self.position(id)?;

        let text = match edit.text {
            Some(ref text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(TodoError::blank_text());
                }
                Some(trimmed.to_string())
            }
            None => None,
        };

        let task = &mut self.tasks[idx];
        if let Some(text) = text {
            task.text = text;
        }
        if let Some(tags) = edit.tags {
            task.tags = normalize_tags(&tags);
        }
        if let Some(priority) = edit.priority {
            task.priority = priority;
        }
        if let Some(due) = edit.due
            && due != task.due
        {
            task.due = due;
            task.notified = false;
        }

        let updated = task.clone();
        self.persist();
        debug!(task_id = %updated.id, "task edited");
        Ok(updated)
    }

    /// Set or clear a task's due time (the "remind" action).
    pub fn set_due(&mut self, id: &str, due: Option<DateTime<Utc>>) -> TodoResult<Task> {
        self.edit(
            id,
            TaskEdit {
                due: Some(due),
                ..Default::default()
            },
        )
    }

    /// Flip the completion flag. Due and notified state are left alone.
    pub fn toggle_done(&mut self, id: &str) -> TodoResult<Task> {
        let idx = self.position(id)?;
        let task = &mut self.tasks[idx];
        task.done = !task.done;
        let updated = task.clone();
        self.persist();
        debug!(task_id = %updated.id, done = updated.done, "task toggled");
        Ok(updated)
    }

    /// Remove a task, keeping it in the single-slot undo buffer.
    pub fn delete(&mut self, id: &str) -> TodoResult<DeletionHandle> {
        let idx = self.position(id)?;
        let task = self.tasks.remove(idx);
        let handle = self.undo.stash(task, idx, self.clock.now());
        self.persist();
        info!(task_id = %handle.task_id, generation = handle.generation, "task deleted");
        Ok(handle)
    }

    /// Restore the deletion identified by `handle` at its original index.
    pub fn undo(&mut self, handle: &DeletionHandle) -> TodoResult<Task> {
        let Some(pending) = self.undo.peek() else {
            return Err(TodoError::no_pending_deletion());
        };
        if pending.generation != handle.generation {
            return Err(TodoError::handle_expired(handle.generation));
        }
        self.restore_pending()
    }

    /// Restore whatever deletion is currently buffered.
    pub fn undo_last(&mut self) -> TodoResult<Task> {
        if self.undo.peek().is_none() {
            return Err(TodoError::no_pending_deletion());
        }
        self.restore_pending()
    }

    fn restore_pending(&mut self) -> TodoResult<Task> {
        let now = self.clock.now();
        let Some(pending) = self.undo.take() else {
            return Err(TodoError::no_pending_deletion());
        };
        if self.undo.is_elapsed(&pending, now) {
            debug!(task_id = %pending.task.id, "undo window elapsed, deletion is final");
            return Err(TodoError::handle_expired(pending.generation));
        }

        let index = pending.index.min(self.tasks.len());
        let task = pending.task;
        self.tasks.insert(index, task.clone());
        self.persist();
        info!(task_id = %task.id, index, "deletion undone");
        Ok(task)
    }

    /// Handle of the buffered deletion, if one is still undoable.
    pub fn pending_deletion(&self) -> Option<DeletionHandle> {
        let pending = self.undo.peek()?;
        if self.undo.is_elapsed(pending, self.clock.now()) {
            return None;
        }
        Some(DeletionHandle {
            generation: pending.generation,
            task_id: pending.task.id.clone(),
        })
    }

    /// Drop the buffered deletion once its undo window has passed.
    /// Returns true if something was discarded.
    pub fn expire_pending(&mut self) -> bool {
        let now = self.clock.now();
        let elapsed = self
            .undo
            .peek()
            .is_some_and(|pending| self.undo.is_elapsed(pending, now));
        if elapsed {
            self.undo.clear();
        }
        elapsed
    }

    /// Move `moved_id` so that it sits immediately before `before_id`.
    pub fn reorder(&mut self, moved_id: &str, before_id: &str) -> TodoResult<()> {
        let from = self.position(moved_id)?;
        self.position(before_id)?;
        if moved_id == before_id {
            return Ok(());
        }

        let moved = self.tasks.remove(from);
        let to = self
            .tasks
            .iter()
            .position(|t| t.id == before_id)
            .unwrap_or(self.tasks.len());
        self.tasks.insert(to, moved);
        self.persist();
        debug!(task_id = %moved_id, before = %before_id, "task reordered");
        Ok(())
    }

    /// Move a task to the end of the manual order.
    pub fn move_to_end(&mut self, moved_id: &str) -> TodoResult<()> {
        let from = self.position(moved_id)?;
        let moved = self.tasks.remove(from);
        self.tasks.push(moved);
        self.persist();
        Ok(())
    }

    /// Remove all completed tasks. Returns how many were removed.
    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.done);
        let removed = before - self.tasks.len();
        self.persist();
        info!(removed, "completed tasks cleared");
        removed
    }

    /// Remove every task. Irreversible: the undo buffer is dropped too.
    ///
    /// Callers must have obtained explicit confirmation first.
    pub fn clear_all(&mut self) {
        let removed = self.tasks.len();
        self.tasks.clear();
        self.undo.clear();
        self.persist();
        info!(removed, "all tasks cleared");
    }

    /// Record that the due notification for `due` fired.
    ///
    /// Only applies while the task is still undone, un-notified and carries
    /// the same due time; returns the updated task when it did.
    pub fn mark_notified(&mut self, id: &str, due: DateTime<Utc>) -> Option<Task> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        if task.done || task.notified || task.due != Some(due) {
            return None;
        }
        task.notified = true;
        let updated = task.clone();
        self.persist();
        Some(updated)
    }

    /// Replace the in-memory collection with the persisted one.
    ///
    /// Unreadable data never surfaces as an error: the collection is reset
    /// to empty and the next persist overwrites the bad blob.
    pub fn load(&mut self) -> LoadOutcome {
        self.undo.clear();

        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.tasks.clear();
                return LoadOutcome::Empty;
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to read stored tasks, starting empty");
                self.tasks.clear();
                return LoadOutcome::Recovered;
            }
        };

        match serde_json::from_str::<Vec<Task>>(&raw) {
            Ok(tasks) => {
                self.tasks = sanitize(tasks);
                LoadOutcome::Loaded(self.tasks.len())
            }
            Err(e) => {
                let err = TodoError::persistence_corrupt(e);
                warn!(key = %self.key, code = ?err.code, error = %err, "resetting to empty collection");
                self.tasks.clear();
                LoadOutcome::Recovered
            }
        }
    }

    /// Serialize the full collection to the backing store.
    ///
    /// Write failures are logged and not retried.
    pub fn persist(&self) {
        if let Err(e) = self.try_persist() {
            error!(key = %self.key, error = %e, "failed to persist tasks");
        }
    }

    /// Like [`TaskStore::persist`] but reports failures to the caller.
    pub fn try_persist(&self) -> TodoResult<()> {
        let json = serde_json::to_string(&self.tasks).map_err(TodoError::internal)?;
        self.backend
            .set(&self.key, &json)
            .map_err(TodoError::storage)
    }
}

/// Drop records that would violate store invariants (blank text, repeated ids).
fn sanitize(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen: HashSet<TaskId> = HashSet::new();
    let mut out = Vec::with_capacity(tasks.len());
    for mut task in tasks {
        if task.text.trim().is_empty() {
            warn!(task_id = %task.id, "dropping stored task with blank text");
            continue;
        }
        if !seen.insert(task.id.clone()) {
            warn!(task_id = %task.id, "dropping stored task with duplicate id");
            continue;
        }
        task.tags = normalize_tags(&task.tags);
        out.push(task);
    }
    out
}

/// Shared handle to the store for the composition root and scheduler.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<TaskStore>>,
}

impl SharedStore {
    pub fn new(store: TaskStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Execute a function with read access to the store.
    pub fn with<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&TaskStore) -> T,
    {
        let store = self.inner.lock().unwrap();
        f(&store)
    }

    /// Execute a function with exclusive access to the store.
    pub fn with_mut<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut TaskStore) -> T,
    {
        let mut store = self.inner.lock().unwrap();
        f(&mut store)
    }

    /// Snapshot of the collection in stored order.
    pub fn snapshot(&self) -> Vec<Task> {
        self.with(|s| s.tasks().to_vec())
    }
}
