//! Cache-first offline asset layer.
//!
//! The worker pre-populates a versioned cache from a fixed asset manifest,
//! garbage-collects caches from earlier versions on activation, and then
//! answers GET requests from cache before falling back to the network.
//! It shares no state with the task store.

pub mod cache;
pub mod fetch;
pub mod worker;

pub use cache::CacheStorage;
pub use fetch::{DirFetcher, Fetcher, HttpFetcher};
pub use worker::{OfflineCacheWorker, WorkerState};

use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};

/// Current cache version tag.
pub const DEFAULT_CACHE_NAME: &str = "tasks-app-cache-v2";

/// Page served to navigations when the network is down.
pub const OFFLINE_FALLBACK_PATH: &str = "/offline.html";

/// Assets pre-cached on install.
pub const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/styles.css",
    "/app.js",
    "/manifest.json",
    OFFLINE_FALLBACK_PATH,
];

/// Errors from the offline cache layer.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("install failed at {path}: {reason}")]
    InstallFailed { path: String, reason: String },

    #[error("cannot {action} a worker that is {state}")]
    InvalidState { action: &'static str, state: String },

    #[error("cache storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl CacheError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CacheError::NetworkUnavailable(_) | CacheError::InstallFailed { .. } => {
                ErrorCode::NetworkUnavailable
            }
            CacheError::InvalidState { .. } => ErrorCode::InternalError,
            CacheError::Storage(_) => ErrorCode::StorageError,
        }
    }
}

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    #[default]
    Other,
}

/// An outbound request as seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    pub method: String,
    /// Root-relative path, including any query string.
    pub path: String,
    pub mode: RequestMode,
    pub accept: Option<String>,
}

impl CacheRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            mode: RequestMode::Other,
            accept: None,
        }
    }

    pub fn navigate(path: impl Into<String>) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(path)
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Navigations and requests that accept HTML get the offline page.
    pub fn wants_html(&self) -> bool {
        self.mode == RequestMode::Navigate
            || self
                .accept
                .as_deref()
                .is_some_and(|accept| accept.contains("text/html"))
    }

    /// Key the response is cached under.
    pub fn cache_key(&self) -> &str {
        &self.path
    }
}

/// Response type, after the fetch API's classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin.
    Basic,
    Cors,
    Opaque,
}

impl ResponseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
        }
    }

    /// Unknown stored values are treated as opaque.
    pub fn parse(s: &str) -> Self {
        match s {
            "basic" => ResponseKind::Basic,
            "cors" => ResponseKind::Cors,
            _ => ResponseKind::Opaque,
        }
    }
}

/// A response body plus the metadata the cache keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub kind: ResponseKind,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl CachedResponse {
    pub fn basic(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            kind: ResponseKind::Basic,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::basic(404, Some("text/plain; charset=utf-8"), "Not Found")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only complete same-origin responses are stored at runtime.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind == ResponseKind::Basic
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServeSource {
    Cache,
    Network,
    OfflineFallback,
    /// The worker did not intercept (not active, or not a GET).
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: CachedResponse,
    pub source: ServeSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_html() {
        assert!(CacheRequest::navigate("/tasks").wants_html());
        assert!(
            CacheRequest::get("/x")
                .with_accept("text/html,application/xhtml+xml")
                .wants_html()
        );
        assert!(!CacheRequest::get("/app.js").wants_html());
    }

    #[test]
    fn test_only_basic_200_is_cacheable() {
        assert!(CachedResponse::basic(200, None, "ok").is_cacheable());
        assert!(!CachedResponse::basic(204, None, "").is_cacheable());

        let cors = CachedResponse {
            kind: ResponseKind::Cors,
            ..CachedResponse::basic(200, None, "ok")
        };
        assert!(!cors.is_cacheable());
    }

    #[test]
    fn test_method_check_is_case_insensitive() {
        assert!(CacheRequest::get("/").with_method("get").is_get());
        assert!(!CacheRequest::get("/").with_method("POST").is_get());
    }
}
