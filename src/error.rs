//! Structured error types for task operations.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    BlankText,
    InvalidFieldValue,
    ConfirmationRequired,

    // Not found errors
    TaskNotFound,

    // Undo errors
    NoPendingDeletion,
    HandleExpired,

    // Recovered locally, reported for logging only
    PersistenceCorrupt,
    NotificationDenied,
    NetworkUnavailable,

    // Internal errors
    StorageError,
    InternalError,
}

impl ErrorCode {
    /// Whether the condition is a caller mistake rather than a fault.
    pub fn is_client_error(self) -> bool {
        !matches!(self, ErrorCode::StorageError | ErrorCode::InternalError)
    }
}

/// Structured error returned by store and view operations.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TodoError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl TodoError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // Convenience constructors

    pub fn blank_text() -> Self {
        Self::new(ErrorCode::BlankText, "Task text cannot be blank").with_field("text")
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn no_pending_deletion() -> Self {
        Self::new(ErrorCode::NoPendingDeletion, "Nothing to undo")
    }

    pub fn handle_expired(generation: u64) -> Self {
        Self::new(
            ErrorCode::HandleExpired,
            format!("Deletion #{} can no longer be undone", generation),
        )
    }

    pub fn confirmation_required(action: &str) -> Self {
        Self::new(
            ErrorCode::ConfirmationRequired,
            format!("{} requires explicit confirmation", action),
        )
        .with_field("confirm")
    }

    pub fn persistence_corrupt(err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::PersistenceCorrupt,
            format!("Stored tasks could not be read: {}", err),
        )
    }

    pub fn storage(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::StorageError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for TodoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TodoError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for TodoError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<TodoError>() {
            Ok(todo_err) => todo_err,
            Err(err) => TodoError::internal(err),
        }
    }
}

/// Result type for task operations.
pub type TodoResult<T> = std::result::Result<T, TodoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serializes_code() {
        let err = TodoError::blank_text();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "BLANK_TEXT");
        assert_eq!(json["field"], "text");
    }

    #[test]
    fn test_field_omitted_when_absent() {
        let err = TodoError::task_not_found("abc");
        let json = serde_json::to_string(&err).unwrap();
        assert!(!json.contains("field"));
        assert!(json.contains("Task not found: abc"));
    }

    #[test]
    fn test_from_anyhow_preserves_todo_error() {
        let original = anyhow::Error::new(TodoError::no_pending_deletion());
        let converted: TodoError = original.into();
        assert_eq!(converted.code, ErrorCode::NoPendingDeletion);

        let other: TodoError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(other.code, ErrorCode::InternalError);
        assert!(!other.code.is_client_error());
    }
}
