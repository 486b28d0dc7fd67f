//! Transient visual highlight of tasks whose due alert fired.

use crate::types::TaskId;
use std::collections::HashMap;
use std::sync::Mutex;

/// Renderer-side highlight channel.
///
/// `highlight` returns a ticket; `clear` only removes the highlight if no
/// newer highlight of the same task was issued since.
pub trait Highlighter: Send + Sync {
    fn highlight(&self, task_id: &str) -> u64;
    fn clear(&self, task_id: &str, ticket: u64);
}

#[derive(Debug, Default)]
struct BoardState {
    next_ticket: u64,
    active: HashMap<TaskId, u64>,
}

/// In-memory set of highlighted tasks, read by the renderer.
#[derive(Debug, Default)]
pub struct HighlightBoard {
    state: Mutex<BoardState>,
}

impl HighlightBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_highlighted(&self, task_id: &str) -> bool {
        self.state.lock().unwrap().active.contains_key(task_id)
    }

    /// Currently highlighted task ids, sorted.
    pub fn highlighted(&self) -> Vec<TaskId> {
        let state = self.state.lock().unwrap();
        let mut ids: Vec<TaskId> = state.active.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Highlighter for HighlightBoard {
    fn highlight(&self, task_id: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_ticket += 1;
        let ticket = state.next_ticket;
        state.active.insert(task_id.to_string(), ticket);
        ticket
    }

    fn clear(&self, task_id: &str, ticket: u64) {
        let mut state = self.state.lock().unwrap();
        if state.active.get(task_id) == Some(&ticket) {
            state.active.remove(task_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_and_clear() {
        let board = HighlightBoard::new();
        let ticket = board.highlight("a");
        assert!(board.is_highlighted("a"));
        board.clear("a", ticket);
        assert!(!board.is_highlighted("a"));
    }

    #[test]
    fn test_stale_clear_keeps_newer_highlight() {
        let board = HighlightBoard::new();
        let first = board.highlight("a");
        let _second = board.highlight("a");
        board.clear("a", first);
        assert!(board.is_highlighted("a"));
        assert_eq!(board.highlighted(), vec!["a".to_string()]);
    }
}
