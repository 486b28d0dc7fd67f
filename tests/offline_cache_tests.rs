//! Integration tests for the offline cache worker.
//!
//! A scripted in-memory origin stands in for the network so tests can
//! count requests and take the origin offline.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use taskdeck::db::Database;
use taskdeck::offline::{
    CacheError, CacheRequest, CacheStorage, CachedResponse, DEFAULT_CACHE_NAME, DEFAULT_MANIFEST,
    DirFetcher, Fetcher, OfflineCacheWorker, ResponseKind, ServeSource, WorkerState,
};

/// Origin serving fixed responses, with an on/off switch.
struct ScriptedOrigin {
    files: HashMap<String, CachedResponse>,
    online: AtomicBool,
    requests: AtomicUsize,
}

impl ScriptedOrigin {
    fn with_manifest() -> Self {
        let mut files = HashMap::new();
        for path in DEFAULT_MANIFEST {
            let content_type = if path.ends_with(".css") {
                "text/css; charset=utf-8"
            } else if path.ends_with(".js") {
                "text/javascript; charset=utf-8"
            } else if path.ends_with(".json") {
                "application/json"
            } else {
                "text/html; charset=utf-8"
            };
            files.insert(
                path.to_string(),
                CachedResponse::basic(200, Some(content_type), format!("body of {}", path)),
            );
        }
        Self {
            files,
            online: AtomicBool::new(true),
            requests: AtomicUsize::new(0),
        }
    }

    fn with_file(mut self, path: &str, response: CachedResponse) -> Self {
        self.files.insert(path.to_string(), response);
        self
    }

    fn without(mut self, path: &str) -> Self {
        self.files.remove(path);
        self
    }

    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedOrigin {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, CacheError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.online.load(Ordering::SeqCst) {
            return Err(CacheError::NetworkUnavailable("origin offline".to_string()));
        }
        Ok(self
            .files
            .get(&request.path)
            .cloned()
            .unwrap_or_else(CachedResponse::not_found))
    }
}

/// Helper to build a worker over a fresh in-memory database.
fn setup_worker(origin: ScriptedOrigin) -> (OfflineCacheWorker, Arc<ScriptedOrigin>, CacheStorage) {
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    let storage = CacheStorage::new(db);
    let origin = Arc::new(origin);
    let worker = OfflineCacheWorker::new(storage.clone(), origin.clone());
    (worker, origin, storage)
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn install_caches_every_manifest_asset() {
        let (worker, origin, storage) = setup_worker(ScriptedOrigin::with_manifest());
        assert_eq!(worker.state(), WorkerState::Parsed);

        worker.install().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Installed);
        assert_eq!(origin.requests(), DEFAULT_MANIFEST.len());

        let mut cached = storage.entries(DEFAULT_CACHE_NAME).unwrap();
        cached.sort();
        let mut expected: Vec<String> = DEFAULT_MANIFEST.iter().map(|p| p.to_string()).collect();
        expected.sort();
        assert_eq!(cached, expected);
    }

    #[tokio::test]
    async fn install_is_all_or_nothing() {
        let (worker, _origin, storage) =
            setup_worker(ScriptedOrigin::with_manifest().without("/app.js"));

        let err = worker.install().await.unwrap_err();
        assert!(matches!(err, CacheError::InstallFailed { ref path, .. } if path == "/app.js"));
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert!(storage.entries(DEFAULT_CACHE_NAME).unwrap().is_empty());
    }

    #[tokio::test]
    async fn install_fails_when_origin_is_down() {
        let origin = ScriptedOrigin::with_manifest();
        origin.set_online(false);
        let (worker, _origin, _storage) = setup_worker(origin);

        let err = worker.start().await.unwrap_err();
        assert!(matches!(err, CacheError::InstallFailed { .. }));
        assert!(!worker.is_controlling());
    }

    #[tokio::test]
    async fn activate_requires_install() {
        let (worker, _origin, _storage) = setup_worker(ScriptedOrigin::with_manifest());
        let err = worker.activate().await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidState { action: "activate", .. }));
        assert_eq!(worker.state(), WorkerState::Parsed);
    }

    #[tokio::test]
    async fn activate_deletes_other_versions() {
        let (worker, _origin, storage) = setup_worker(ScriptedOrigin::with_manifest());
        let stale = CachedResponse::basic(200, Some("text/html"), "old");
        storage.put("tasks-app-cache-v1", "/index.html", &stale).unwrap();
        storage.put("something-else", "/index.html", &stale).unwrap();

        let mut deleted = worker.start().await.unwrap();
        deleted.sort();
        assert_eq!(deleted, vec!["something-else", "tasks-app-cache-v1"]);
        assert_eq!(storage.keys().unwrap(), vec![DEFAULT_CACHE_NAME.to_string()]);
        assert!(worker.is_controlling());

        // Second activation is a no-op
        assert!(worker.activate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn custom_cache_name_and_manifest() {
        let db = Database::open_in_memory().unwrap();
        let storage = CacheStorage::new(db);
        let origin = Arc::new(ScriptedOrigin::with_manifest());
        let worker = OfflineCacheWorker::new(storage.clone(), origin)
            .with_cache_name("tasks-app-cache-v3")
            .with_manifest(vec!["/".to_string(), "/offline.html".to_string()]);

        worker.start().await.unwrap();
        assert_eq!(storage.entries("tasks-app-cache-v3").unwrap().len(), 2);
    }
}

mod fetch_tests {
    use super::*;

    async fn started() -> (OfflineCacheWorker, Arc<ScriptedOrigin>, CacheStorage) {
        let origin = ScriptedOrigin::with_manifest()
            .with_file("/icons/logo.svg", CachedResponse::basic(200, Some("image/svg+xml"), "<svg/>"))
            .with_file(
                "/third-party.js",
                CachedResponse {
                    status: 200,
                    kind: ResponseKind::Cors,
                    content_type: Some("text/javascript".to_string()),
                    body: b"x".to_vec(),
                },
            );
        let (worker, origin, storage) = setup_worker(origin);
        worker.start().await.unwrap();
        (worker, origin, storage)
    }

    #[tokio::test]
    async fn manifest_asset_served_from_cache_without_network() {
        let (worker, origin, _storage) = started().await;
        let before = origin.requests();

        let served = worker.fetch(&CacheRequest::get("/styles.css")).await.unwrap();
        assert_eq!(served.source, ServeSource::Cache);
        assert_eq!(served.response.body, b"body of /styles.css".to_vec());
        assert_eq!(origin.requests(), before);
    }

    #[tokio::test]
    async fn cached_asset_survives_origin_outage() {
        let (worker, origin, _storage) = started().await;
        origin.set_online(false);

        let served = worker.fetch(&CacheRequest::get("/app.js")).await.unwrap();
        assert_eq!(served.source, ServeSource::Cache);
    }

    #[tokio::test]
    async fn runtime_response_is_cached() {
        let (worker, origin, storage) = started().await;

        let first = worker.fetch(&CacheRequest::get("/icons/logo.svg")).await.unwrap();
        assert_eq!(first.source, ServeSource::Network);
        assert!(storage
            .match_in(DEFAULT_CACHE_NAME, "/icons/logo.svg")
            .unwrap()
            .is_some());

        origin.set_online(false);
        let second = worker.fetch(&CacheRequest::get("/icons/logo.svg")).await.unwrap();
        assert_eq!(second.source, ServeSource::Cache);
        assert_eq!(second.response.body, b"<svg/>".to_vec());
    }

    #[tokio::test]
    async fn non_basic_and_error_responses_are_not_cached() {
        let (worker, _origin, storage) = started().await;

        let cors = worker.fetch(&CacheRequest::get("/third-party.js")).await.unwrap();
        assert_eq!(cors.source, ServeSource::Network);
        let missing = worker.fetch(&CacheRequest::get("/nope.png")).await.unwrap();
        assert_eq!(missing.response.status, 404);

        assert!(storage.match_in(DEFAULT_CACHE_NAME, "/third-party.js").unwrap().is_none());
        assert!(storage.match_in(DEFAULT_CACHE_NAME, "/nope.png").unwrap().is_none());
    }

    #[tokio::test]
    async fn navigation_falls_back_to_offline_page() {
        let (worker, origin, _storage) = started().await;
        origin.set_online(false);

        let served = worker.fetch(&CacheRequest::navigate("/settings")).await.unwrap();
        assert_eq!(served.source, ServeSource::OfflineFallback);
        assert_eq!(served.response.body, b"body of /offline.html".to_vec());

        let html = CacheRequest::get("/about").with_accept("text/html,application/xhtml+xml");
        let served = worker.fetch(&html).await.unwrap();
        assert_eq!(served.source, ServeSource::OfflineFallback);
    }

    #[tokio::test]
    async fn non_html_request_fails_when_offline() {
        let (worker, origin, _storage) = started().await;
        origin.set_online(false);

        let err = worker.fetch(&CacheRequest::get("/data.json")).await.unwrap_err();
        assert!(matches!(err, CacheError::NetworkUnavailable(_)));
    }

    #[tokio::test]
    async fn non_get_passes_through() {
        let (worker, origin, storage) = started().await;
        let before = origin.requests();

        let post = CacheRequest::get("/index.html").with_method("POST");
        let served = worker.fetch(&post).await.unwrap();
        assert_eq!(served.source, ServeSource::Passthrough);
        assert_eq!(origin.requests(), before + 1);
        assert_eq!(storage.entries(DEFAULT_CACHE_NAME).unwrap().len(), DEFAULT_MANIFEST.len());
    }

    #[tokio::test]
    async fn requests_pass_through_before_activation() {
        let (worker, origin, storage) = setup_worker(ScriptedOrigin::with_manifest());
        worker.install().await.unwrap();

        let served = worker.fetch(&CacheRequest::get("/index.html")).await.unwrap();
        assert_eq!(served.source, ServeSource::Passthrough);
        assert_eq!(origin.requests(), DEFAULT_MANIFEST.len() + 1);
        assert!(storage.keys().unwrap().contains(&DEFAULT_CACHE_NAME.to_string()));
    }
}

mod dir_origin_tests {
    use super::*;

    #[tokio::test]
    async fn worker_over_asset_directory() {
        let dir = tempfile::tempdir().unwrap();
        for path in DEFAULT_MANIFEST {
            let relative = path.trim_start_matches('/');
            if !relative.is_empty() {
                std::fs::write(dir.path().join(relative), format!("file {}", relative)).unwrap();
            }
        }

        let db = Database::open_in_memory().unwrap();
        let storage = CacheStorage::new(db);
        let worker = OfflineCacheWorker::new(storage, Arc::new(DirFetcher::new(dir.path())));
        worker.start().await.unwrap();

        let root = worker.fetch(&CacheRequest::navigate("/")).await.unwrap();
        assert_eq!(root.source, ServeSource::Cache);
        assert_eq!(root.response.body, b"file index.html".to_vec());
        assert_eq!(
            root.response.content_type.as_deref(),
            Some("text/html; charset=utf-8")
        );

        // Origin directory disappears: navigations get the offline page
        let root_path = dir.path().to_path_buf();
        drop(dir);
        assert!(!root_path.exists());
        let served = worker.fetch(&CacheRequest::navigate("/later")).await.unwrap();
        assert_eq!(served.source, ServeSource::OfflineFallback);
        assert_eq!(served.response.body, b"file offline.html".to_vec());
    }
}
