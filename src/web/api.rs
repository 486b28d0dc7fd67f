//! JSON API handlers.

use super::WebState;
use crate::error::{ErrorCode, TodoError};
use crate::store::DeletionHandle;
use crate::types::{NewTask, TaskEdit, Theme};
use crate::view::ViewParams;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A [`TodoError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub TodoError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.code {
            ErrorCode::BlankText => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::TaskNotFound => StatusCode::NOT_FOUND,
            ErrorCode::NoPendingDeletion | ErrorCode::HandleExpired => StatusCode::CONFLICT,
            ErrorCode::ConfirmationRequired | ErrorCode::InvalidFieldValue => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::NetworkUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::PersistenceCorrupt
            | ErrorCode::NotificationDenied
            | ErrorCode::StorageError
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TodoError> for ApiError {
    fn from(err: TodoError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.0)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Parse an optional JSON body; an empty body yields the default.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError(TodoError::invalid_value("body", &e.to_string())))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    worker: crate::offline::WorkerState,
}

pub async fn health(State(state): State<WebState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        worker: state.worker().state(),
    })
}

pub async fn list_tasks(
    State(state): State<WebState>,
    Query(params): Query<ViewParams>,
) -> impl IntoResponse {
    Json(state.app().view(&params))
}

pub async fn create_task(
    State(state): State<WebState>,
    Json(new): Json<NewTask>,
) -> ApiResult<impl IntoResponse> {
    let task = state.app().add(new)?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn edit_task(
    State(state): State<WebState>,
    Path(id): Path<String>,
    Json(edit): Json<TaskEdit>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.app().edit(&id, edit)?))
}

pub async fn toggle_task(
    State(state): State<WebState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.app().toggle_done(&id)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct MoveRequest {
    /// Drop target; absent means "after the last task".
    #[serde(default)]
    pub before: Option<String>,
}

pub async fn move_task(
    State(state): State<WebState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: MoveRequest = optional_body(&body)?;
    state.app().reorder(&id, request.before.as_deref())?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_task(
    State(state): State<WebState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let handle = state.app().delete(&id)?;
    Ok(Json(handle))
}

/// Body of `POST /api/undo`. Without a generation the last deletion is undone.
#[derive(Debug, Default, Deserialize)]
pub struct UndoRequest {
    #[serde(default)]
    pub generation: Option<u64>,
    #[serde(default)]
    pub task_id: Option<String>,
}

pub async fn undo(State(state): State<WebState>, body: Bytes) -> ApiResult<impl IntoResponse> {
    let request: UndoRequest = optional_body(&body)?;
    let task = match request.generation {
        Some(generation) => state.app().undo(&DeletionHandle {
            generation,
            task_id: request.task_id.unwrap_or_default(),
        })?,
        None => state.app().undo_last()?,
    };
    Ok(Json(task))
}

pub async fn clear_completed(State(state): State<WebState>) -> impl IntoResponse {
    let removed = state.app().clear_completed();
    Json(json!({ "removed": removed }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearAllRequest {
    #[serde(default)]
    pub confirm: bool,
}

pub async fn clear_all(State(state): State<WebState>, body: Bytes) -> ApiResult<impl IntoResponse> {
    let request: ClearAllRequest = optional_body(&body)?;
    let removed = state.app().clear_all(request.confirm)?;
    Ok(Json(json!({ "removed": removed })))
}

#[derive(Debug, Serialize)]
pub struct PrefsResponse {
    pub theme: Theme,
    pub notifications: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PrefsUpdate {
    pub theme: Option<Theme>,
    pub notifications: Option<bool>,
}

fn current_prefs(state: &WebState) -> PrefsResponse {
    PrefsResponse {
        theme: state.app().theme(),
        notifications: state.app().notifications_enabled(),
    }
}

pub async fn get_prefs(State(state): State<WebState>) -> impl IntoResponse {
    Json(current_prefs(&state))
}

pub async fn put_prefs(
    State(state): State<WebState>,
    Json(update): Json<PrefsUpdate>,
) -> ApiResult<impl IntoResponse> {
    if let Some(theme) = update.theme {
        state.app().set_theme(theme)?;
    }
    if let Some(enabled) = update.notifications {
        state.app().set_notifications_enabled(enabled)?;
        // Re-render so a freshly enabled switch picks up pending alerts
        state.app().refresh();
    }
    Ok(Json(current_prefs(&state)))
}
