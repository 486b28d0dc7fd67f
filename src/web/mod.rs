//! HTTP surface: the task JSON API plus offline-cached asset serving.
//!
//! `/api/*` routes call into [`TodoApp`]; every other request is handed to
//! the [`OfflineCacheWorker`], which answers cache-first.

mod api;
mod assets;

pub use api::ApiError;
pub use assets::SOURCE_HEADER;

use crate::app::TodoApp;
use crate::offline::OfflineCacheWorker;
use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// State shared across handlers.
#[derive(Clone)]
pub struct WebState {
    app: TodoApp,
    worker: Arc<OfflineCacheWorker>,
}

impl WebState {
    pub fn new(app: TodoApp, worker: Arc<OfflineCacheWorker>) -> Self {
        Self { app, worker }
    }

    pub fn app(&self) -> &TodoApp {
        &self.app
    }

    pub fn worker(&self) -> &OfflineCacheWorker {
        &self.worker
    }
}

/// Build the router with all routes.
pub fn build_router(state: WebState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/tasks", get(api::list_tasks).post(api::create_task))
        .route("/api/tasks/clear-completed", post(api::clear_completed))
        .route("/api/tasks/clear-all", post(api::clear_all))
        .route(
            "/api/tasks/{id}",
            axum::routing::patch(api::edit_task).delete(api::delete_task),
        )
        .route("/api/tasks/{id}/toggle", post(api::toggle_task))
        .route("/api/tasks/{id}/move", post(api::move_task))
        .route("/api/undo", post(api::undo))
        .route("/api/prefs", get(api::get_prefs).put(api::put_prefs))
        .fallback(assets::serve)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns a oneshot sender that signals shutdown, and the bound address.
pub async fn start_server(
    state: WebState,
    addr: SocketAddr,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("server shutting down");
            })
            .await
        {
            tracing::error!("server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}
