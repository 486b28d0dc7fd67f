//! Offline cache worker lifecycle and fetch interception.

use super::{
    CacheError, CacheRequest, CacheStorage, Fetcher, Served, ServeSource, DEFAULT_CACHE_NAME,
    DEFAULT_MANIFEST, OFFLINE_FALLBACK_PATH,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; the worker never controls clients.
    Redundant,
}

/// Cache-first interceptor over a [`Fetcher`].
pub struct OfflineCacheWorker {
    cache_name: String,
    manifest: Vec<String>,
    fallback_path: String,
    storage: CacheStorage,
    fetcher: Arc<dyn Fetcher>,
    state: Mutex<WorkerState>,
}

impl OfflineCacheWorker {
    /// Worker with the default cache name, manifest and fallback page.
    pub fn new(storage: CacheStorage, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            manifest: DEFAULT_MANIFEST.iter().map(|p| p.to_string()).collect(),
            fallback_path: OFFLINE_FALLBACK_PATH.to_string(),
            storage,
            fetcher,
            state: Mutex::new(WorkerState::Parsed),
        }
    }

    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = name.into();
        self
    }

    pub fn with_manifest(mut self, manifest: Vec<String>) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_fallback_path(mut self, path: impl Into<String>) -> Self {
        self.fallback_path = path.into();
        self
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock().unwrap() = state;
        debug!(cache = %self.cache_name, ?state, "worker state changed");
    }

    /// Whether fetches are intercepted.
    pub fn is_controlling(&self) -> bool {
        self.state() == WorkerState::Activated
    }

    /// Pre-cache every manifest asset.
    ///
    /// Nothing is stored unless every asset fetched with a success status;
    /// on failure the worker becomes redundant.
    pub async fn install(&self) -> Result<(), CacheError> {
        self.set_state(WorkerState::Installing);

        let mut entries = Vec::with_capacity(self.manifest.len());
        for path in &self.manifest {
            let request = CacheRequest::get(path.as_str());
            let failure = match self.fetcher.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    entries.push((path.clone(), response));
                    continue;
                }
                Ok(response) => format!("status {}", response.status),
                Err(e) => e.to_string(),
            };

            warn!(cache = %self.cache_name, path = %path, reason = %failure, "install failed");
            self.set_state(WorkerState::Redundant);
            return Err(CacheError::InstallFailed {
                path: path.clone(),
                reason: failure,
            });
        }

        if let Err(e) = self.storage.put_all(&self.cache_name, &entries) {
            self.set_state(WorkerState::Redundant);
            return Err(e);
        }

        self.set_state(WorkerState::Installed);
        info!(cache = %self.cache_name, assets = entries.len(), "offline cache installed");
        Ok(())
    }

    /// Delete caches from other versions and start controlling requests.
    /// Returns the names of the deleted caches.
    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        match self.state() {
            WorkerState::Installed => {}
            WorkerState::Activated => return Ok(Vec::new()),
            other => {
                return Err(CacheError::InvalidState {
                    action: "activate",
                    state: format!("{:?}", other).to_lowercase(),
                });
            }
        }
        self.set_state(WorkerState::Activating);

        let mut deleted = Vec::new();
        for name in self.storage.keys()? {
            if name != self.cache_name && self.storage.delete(&name)? {
                deleted.push(name);
            }
        }

        self.set_state(WorkerState::Activated);
        info!(cache = %self.cache_name, deleted = deleted.len(), "offline cache activated");
        Ok(deleted)
    }

    /// Install then activate.
    pub async fn start(&self) -> Result<Vec<String>, CacheError> {
        self.install().await?;
        self.activate().await
    }

    fn lookup(&self, key: &str) -> Option<super::CachedResponse> {
        match self.storage.match_any(key) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(key, error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Answer a request: cache first, then network, then the offline page.
    pub async fn fetch(&self, request: &CacheRequest) -> Result<Served, CacheError> {
        if !self.is_controlling() || !request.is_get() {
            let response = self.fetcher.fetch(request).await?;
            return Ok(Served {
                response,
                source: ServeSource::Passthrough,
            });
        }

        if let Some(response) = self.lookup(request.cache_key()) {
            return Ok(Served {
                response,
                source: ServeSource::Cache,
            });
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable()
                    && let Err(e) =
                        self.storage
                            .put(&self.cache_name, request.cache_key(), &response)
                {
                    warn!(key = %request.cache_key(), error = %e, "failed to cache response");
                }
                Ok(Served {
                    response,
                    source: ServeSource::Network,
                })
            }
            Err(e) => {
                if request.wants_html()
                    && let Some(response) = self.lookup(&self.fallback_path)
                {
                    debug!(path = %request.path, error = %e, "serving offline fallback");
                    return Ok(Served {
                        response,
                        source: ServeSource::OfflineFallback,
                    });
                }
                Err(e)
            }
        }
    }
}
