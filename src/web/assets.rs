//! Fallback route: everything outside `/api` goes through the offline worker.

use super::WebState;
use crate::offline::{CacheRequest, RequestMode, ServeSource};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::debug;

/// Header reporting where the response came from.
pub const SOURCE_HEADER: &str = "x-taskdeck-source";

fn source_label(source: ServeSource) -> &'static str {
    match source {
        ServeSource::Cache => "cache",
        ServeSource::Network => "network",
        ServeSource::OfflineFallback => "offline-fallback",
        ServeSource::Passthrough => "passthrough",
    }
}

/// Translate an incoming HTTP request into the worker's request model.
fn to_cache_request(request: &Request) -> CacheRequest {
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let headers = request.headers();
    let navigate = headers
        .get("sec-fetch-mode")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|mode| mode.eq_ignore_ascii_case("navigate"));

    CacheRequest {
        method: request.method().as_str().to_string(),
        path,
        mode: if navigate {
            RequestMode::Navigate
        } else {
            RequestMode::Other
        },
        accept: headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

pub async fn serve(State(state): State<WebState>, request: Request) -> Response {
    let cache_request = to_cache_request(&request);

    match state.worker().fetch(&cache_request).await {
        Ok(served) => {
            let status =
                StatusCode::from_u16(served.response.status).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut builder = Response::builder()
                .status(status)
                .header(SOURCE_HEADER, source_label(served.source));
            if let Some(content_type) = served
                .response
                .content_type
                .as_deref()
                .and_then(|ct| HeaderValue::from_str(ct).ok())
            {
                builder = builder.header(header::CONTENT_TYPE, content_type);
            }
            builder
                .body(Body::from(served.response.body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => {
            debug!(path = %cache_request.path, error = %e, "asset unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}
