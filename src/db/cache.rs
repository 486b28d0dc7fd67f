//! Storage for named offline caches.

use super::{Database, now_ms};
use crate::offline::{CachedResponse, ResponseKind};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

fn parse_entry_row(row: &Row) -> rusqlite::Result<CachedResponse> {
    let status: u16 = row.get("status")?;
    let kind: String = row.get("kind")?;
    let content_type: Option<String> = row.get("content_type")?;
    let body: Vec<u8> = row.get("body")?;

    Ok(CachedResponse {
        status,
        kind: ResponseKind::parse(&kind),
        content_type,
        body,
    })
}

fn ensure_cache(conn: &Connection, name: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
        params![name, now_ms()],
    )?;
    Ok(())
}

fn put_entry(
    conn: &Connection,
    name: &str,
    key: &str,
    response: &CachedResponse,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO cache_entries (cache_name, request_key, status, kind, content_type, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(cache_name, request_key) DO UPDATE SET
            status = excluded.status,
            kind = excluded.kind,
            content_type = excluded.content_type,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            name,
            key,
            response.status,
            response.kind.as_str(),
            response.content_type,
            response.body,
            now_ms()
        ],
    )?;
    Ok(())
}

impl Database {
    /// Open (create if missing) a named cache.
    pub fn cache_open(&self, name: &str) -> Result<()> {
        self.with_conn(|conn| {
            ensure_cache(conn, name)?;
            Ok(())
        })
    }

    /// Names of all caches, oldest first.
    pub fn cache_names(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at, name")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(names)
        })
    }

    /// Delete a cache and all of its entries. Returns whether it existed.
    pub fn cache_delete(&self, name: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM cache_entries WHERE cache_name = ?1",
                params![name],
            )?;
            let removed = tx.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
            tx.commit()?;
            Ok(removed > 0)
        })
    }

    /// Store a single response under a request key.
    pub fn cache_put(&self, name: &str, key: &str, response: &CachedResponse) -> Result<()> {
        self.with_conn(|conn| {
            ensure_cache(conn, name)?;
            put_entry(conn, name, key, response)?;
            Ok(())
        })
    }

    /// Store a batch of responses in one transaction; either all land or none.
    pub fn cache_put_all(&self, name: &str, entries: &[(String, CachedResponse)]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            ensure_cache(&tx, name)?;
            for (key, response) in entries {
                put_entry(&tx, name, key, response)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Look up a request key in one cache.
    pub fn cache_match(&self, name: &str, key: &str) -> Result<Option<CachedResponse>> {
        self.with_conn(|conn| {
            let entry = conn
                .query_row(
                    "SELECT status, kind, content_type, body FROM cache_entries
                     WHERE cache_name = ?1 AND request_key = ?2",
                    params![name, key],
                    parse_entry_row,
                )
                .optional()?;
            Ok(entry)
        })
    }

    /// Look up a request key across every cache, oldest cache first.
    pub fn cache_match_any(&self, key: &str) -> Result<Option<(String, CachedResponse)>> {
        self.with_conn(|conn| {
            let entry = conn
                .query_row(
                    "SELECT e.cache_name AS cache_name, e.status AS status, e.kind AS kind,
                            e.content_type AS content_type, e.body AS body
                     FROM cache_entries e JOIN caches c ON c.name = e.cache_name
                     WHERE e.request_key = ?1
                     ORDER BY c.created_at, c.name
                     LIMIT 1",
                    params![key],
                    |row| {
                        let name: String = row.get("cache_name")?;
                        Ok((name, parse_entry_row(row)?))
                    },
                )
                .optional()?;
            Ok(entry)
        })
    }

    /// Request keys stored in a cache, sorted.
    pub fn cache_keys(&self, name: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT request_key FROM cache_entries WHERE cache_name = ?1 ORDER BY request_key",
            )?;
            let keys = stmt
                .query_map(params![name], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(keys)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> CachedResponse {
        CachedResponse {
            status: 200,
            kind: ResponseKind::Basic,
            content_type: Some("text/html".to_string()),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_put_and_match() {
        let db = Database::open_in_memory().unwrap();
        db.cache_put("v1", "/index.html", &page("hello")).unwrap();

        let hit = db.cache_match("v1", "/index.html").unwrap().unwrap();
        assert_eq!(hit.body, b"hello");
        assert!(db.cache_match("v1", "/other").unwrap().is_none());
        assert!(db.cache_match("v2", "/index.html").unwrap().is_none());
    }

    #[test]
    fn test_delete_cache_drops_entries() {
        let db = Database::open_in_memory().unwrap();
        db.cache_put("old", "/a", &page("a")).unwrap();
        db.cache_open("new").unwrap();

        assert!(db.cache_delete("old").unwrap());
        assert!(!db.cache_delete("old").unwrap());
        assert_eq!(db.cache_names().unwrap(), vec!["new".to_string()]);
        assert!(db.cache_match_any("/a").unwrap().is_none());
    }

    #[test]
    fn test_put_all_overwrites_existing_key() {
        let db = Database::open_in_memory().unwrap();
        db.cache_put("v1", "/a", &page("first")).unwrap();
        db.cache_put_all(
            "v1",
            &[
                ("/a".to_string(), page("second")),
                ("/b".to_string(), page("b")),
            ],
        )
        .unwrap();

        assert_eq!(db.cache_keys("v1").unwrap(), vec!["/a", "/b"]);
        assert_eq!(db.cache_match("v1", "/a").unwrap().unwrap().body, b"second");
    }
}
