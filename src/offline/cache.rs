//! Named caches, persisted in the application database.

use super::{CacheError, CachedResponse};
use crate::db::Database;

/// Handle to the set of named caches.
#[derive(Clone)]
pub struct CacheStorage {
    db: Database,
}

impl CacheStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(&self, name: &str) -> Result<(), CacheError> {
        Ok(self.db.cache_open(name)?)
    }

    /// Cache names, oldest first.
    pub fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.db.cache_names()?)
    }

    pub fn delete(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.db.cache_delete(name)?)
    }

    pub fn put(&self, name: &str, key: &str, response: &CachedResponse) -> Result<(), CacheError> {
        Ok(self.db.cache_put(name, key, response)?)
    }

    /// Store every entry or none.
    pub fn put_all(
        &self,
        name: &str,
        entries: &[(String, CachedResponse)],
    ) -> Result<(), CacheError> {
        Ok(self.db.cache_put_all(name, entries)?)
    }

    /// Look up a key across all caches.
    pub fn match_any(&self, key: &str) -> Result<Option<CachedResponse>, CacheError> {
        Ok(self.db.cache_match_any(key)?.map(|(_, response)| response))
    }

    pub fn match_in(&self, name: &str, key: &str) -> Result<Option<CachedResponse>, CacheError> {
        Ok(self.db.cache_match(name, key)?)
    }

    /// Request keys stored in one cache.
    pub fn entries(&self, name: &str) -> Result<Vec<String>, CacheError> {
        Ok(self.db.cache_keys(name)?)
    }
}
