//! Network access for the offline worker.

use super::{CacheError, CacheRequest, CachedResponse, ResponseKind};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// The "network" behind the cache.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a request. Transport failures are `NetworkUnavailable`; HTTP
    /// error statuses are ordinary responses.
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, CacheError>;
}

/// Guess a content type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("webmanifest") => "application/manifest+json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

/// Serves files from a local origin directory.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto the origin directory.
    ///
    /// Returns `None` for paths that would escape the root.
    fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let path = request_path.split(['?', '#']).next().unwrap_or_default();
        let decoded = urlencoding::decode(path).ok()?;
        let relative = decoded.trim_start_matches('/');

        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        if relative.is_empty() || relative.ends_with('/') {
            resolved.push("index.html");
        }
        Some(resolved)
    }
}

#[async_trait]
impl Fetcher for DirFetcher {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, CacheError> {
        if !self.root.is_dir() {
            return Err(CacheError::NetworkUnavailable(format!(
                "origin directory {} is not available",
                self.root.display()
            )));
        }

        let method = request.method.to_ascii_uppercase();
        if method != "GET" && method != "HEAD" {
            return Ok(CachedResponse::basic(
                405,
                Some("text/plain; charset=utf-8"),
                "Method Not Allowed",
            ));
        }

        let Some(file) = self.resolve(&request.path) else {
            debug!(path = %request.path, "rejected path outside origin root");
            return Ok(CachedResponse::not_found());
        };

        match tokio::fs::read(&file).await {
            Ok(body) => Ok(CachedResponse::basic(
                200,
                Some(content_type_for(&file)),
                body,
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CachedResponse::not_found()),
            Err(e) if file.is_dir() => {
                debug!(path = %file.display(), error = %e, "directory requested without index");
                Ok(CachedResponse::not_found())
            }
            Err(e) => Err(CacheError::NetworkUnavailable(format!(
                "failed to read {}: {}",
                file.display(),
                e
            ))),
        }
    }
}

/// Proxies requests to an upstream HTTP origin.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: reqwest::Url,
}

impl HttpFetcher {
    pub fn new(origin: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(origin, client)
    }

    pub fn with_client(origin: &str, client: reqwest::Client) -> anyhow::Result<Self> {
        let origin = reqwest::Url::parse(origin)?;
        Ok(Self { client, origin })
    }

    /// Place a request path (and query) on the origin. The result always
    /// stays on the origin's scheme, host and port.
    fn resolve(&self, path: &str) -> Option<reqwest::Url> {
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };
        let mut url = self.origin.clone();
        url.set_path(path);
        url.set_query(query);
        url.set_fragment(None);
        (url.origin() == self.origin.origin()).then_some(url)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, CacheError> {
        let Some(url) = self.resolve(&request.path) else {
            debug!(path = %request.path, "request path leaves the upstream origin");
            return Ok(CachedResponse::not_found());
        };
        let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| CacheError::NetworkUnavailable(e.to_string()))?;

        let mut builder = self.client.request(method, url);
        if let Some(accept) = &request.accept {
            builder = builder.header(reqwest::header::ACCEPT, accept);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CacheError::NetworkUnavailable(e.to_string()))?;

        let kind = if response.url().origin() == self.origin.origin() {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        };
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::NetworkUnavailable(e.to_string()))?;

        Ok(CachedResponse {
            status,
            kind,
            content_type,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn origin() -> (TempDir, DirFetcher) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(dir.path().join("my file.css"), "body{}").unwrap();
        let fetcher = DirFetcher::new(dir.path());
        (dir, fetcher)
    }

    #[tokio::test]
    async fn test_root_serves_index() {
        let (_dir, fetcher) = origin();
        let response = fetcher.fetch(&CacheRequest::get("/")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"<h1>home</h1>");
        assert_eq!(response.kind, ResponseKind::Basic);
        assert_eq!(response.content_type.as_deref(), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_percent_decoded_path() {
        let (_dir, fetcher) = origin();
        let response = fetcher.fetch(&CacheRequest::get("/my%20file.css?v=2")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"body{}");
    }

    #[tokio::test]
    async fn test_parent_traversal_is_not_found() {
        let (_dir, fetcher) = origin();
        let response = fetcher.fetch(&CacheRequest::get("/../etc/passwd")).await.unwrap();
        assert_eq!(response.status, 404);
    }

    /// Upstream that echoes the path it was asked for.
    async fn upstream() -> (String, tokio::sync::oneshot::Sender<()>) {
        use axum::{Router, http::Uri, routing::get};

        let app = Router::new()
            .route("/hello", get(|uri: Uri| async move { format!("hi {}", uri.query().unwrap_or("")) }))
            .fallback(|uri: Uri| async move {
                (axum::http::StatusCode::NOT_FOUND, uri.path().to_string())
            });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });
        (format!("http://{}/", addr), tx)
    }

    fn http_fetcher(origin: &str) -> HttpFetcher {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpFetcher::with_client(origin, client).unwrap()
    }

    #[tokio::test]
    async fn test_http_fetch_keeps_path_and_query() {
        let (origin, _shutdown) = upstream().await;
        let fetcher = http_fetcher(&origin);
        let response = fetcher.fetch(&CacheRequest::get("/hello?v=2")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.kind, ResponseKind::Basic);
        assert_eq!(response.body, b"hi v=2");
    }

    #[tokio::test]
    async fn test_http_fetch_never_leaves_origin() {
        let (origin, _shutdown) = upstream().await;
        let fetcher = http_fetcher(&origin);

        let url = fetcher.resolve("//evil.example/steal").unwrap();
        assert_eq!(url.origin(), reqwest::Url::parse(&origin).unwrap().origin());

        let response = fetcher
            .fetch(&CacheRequest::get("//evil.example/steal"))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.kind, ResponseKind::Basic);
        assert_eq!(response.body, b"//evil.example/steal");
    }

    #[tokio::test]
    async fn test_missing_root_is_network_failure() {
        let fetcher = DirFetcher::new("/definitely/not/a/real/origin");
        let err = fetcher.fetch(&CacheRequest::get("/")).await.unwrap_err();
        assert!(matches!(err, CacheError::NetworkUnavailable(_)));
    }
}
