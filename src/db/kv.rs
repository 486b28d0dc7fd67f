//! Key-value storage backing the task list and preferences.

use super::{Database, now_ms};
use anyhow::Result;
use rusqlite::{OptionalExtension, params};

/// Synchronous string key-value store.
///
/// The task store writes its whole collection under one key, so every
/// write is atomic from the store's point of view.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now_ms()],
            )?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_key() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get("nope").unwrap(), None);
    }

    #[test]
    fn test_set_overwrites() {
        let db = Database::open_in_memory().unwrap();
        db.set("theme", "light").unwrap();
        db.set("theme", "dark").unwrap();
        assert_eq!(db.get("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn test_remove() {
        let db = Database::open_in_memory().unwrap();
        db.set("k", "v").unwrap();
        db.remove("k").unwrap();
        assert!(db.get("k").unwrap().is_none());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tasks.db");
        {
            let db = Database::open(&path).unwrap();
            db.set("tasks_v2", "[]").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.get("tasks_v2").unwrap().as_deref(), Some("[]"));
    }
}
