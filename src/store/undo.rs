//! Single-slot "last deletion" buffer.

use crate::types::{Task, TaskId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Token returned by `delete`, redeemable once via `undo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionHandle {
    pub generation: u64,
    pub task_id: TaskId,
}

/// A deleted task held back for undo.
#[derive(Debug, Clone)]
pub(crate) struct PendingDeletion {
    pub generation: u64,
    pub task: Task,
    pub index: usize,
    pub deleted_at: DateTime<Utc>,
}

/// Holds at most one pending deletion; a new deletion evicts the old one.
#[derive(Debug)]
pub(crate) struct UndoSlot {
    pending: Option<PendingDeletion>,
    next_generation: u64,
    window: Duration,
}

impl UndoSlot {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: None,
            next_generation: 1,
            window,
        }
    }

    /// Buffer a deletion, discarding whatever was buffered before.
    pub fn stash(&mut self, task: Task, index: usize, now: DateTime<Utc>) -> DeletionHandle {
        let generation = self.next_generation;
        self.next_generation += 1;
        if let Some(evicted) = self.pending.take() {
            tracing::debug!(task_id = %evicted.task.id, "undo buffer evicted by newer deletion");
        }
        let handle = DeletionHandle {
            generation,
            task_id: task.id.clone(),
        };
        self.pending = Some(PendingDeletion {
            generation,
            task,
            index,
            deleted_at: now,
        });
        handle
    }

    pub fn peek(&self) -> Option<&PendingDeletion> {
        self.pending.as_ref()
    }

    pub fn take(&mut self) -> Option<PendingDeletion> {
        self.pending.take()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn is_elapsed(&self, pending: &PendingDeletion, now: DateTime<Utc>) -> bool {
        now - pending.deleted_at > self.window
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
