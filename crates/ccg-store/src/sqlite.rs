//! SQLite key-value backend.

use std::path::{Path, PathBuf};

use ccg_core::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::kv::KeyValueStore;
use crate::schema::KV_SCHEMA_SQL;

/// Key-value store in a single SQLite table.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteKvStore {
    /// Open (or create) the database at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };
        info!(
            "SqliteKvStore initialized: {} keys, path={}",
            store.count_keys()?,
            store.db_path.display()
        );
        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn =
            Connection::open(db_path).map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(KV_SCHEMA_SQL)
            .map_err(|e| Error::StorageUnavailable(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    /// Number of stored keys.
    pub fn count_keys(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(count as usize)
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consent.db");

        {
            let store = SqliteKvStore::open(&path).unwrap();
            assert!(store.get("k").unwrap().is_none());
            store.set("k", "first").unwrap();
            store.set("k", "second").unwrap();
            assert_eq!(store.count_keys().unwrap(), 1);
        }

        let reopened = SqliteKvStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("second"));
        assert_eq!(reopened.backend(), "sqlite");
    }
}
