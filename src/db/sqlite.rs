//! SQLite-backed key/value store.
//!
//! Uses `rusqlite` with the `bundled` feature so no system SQLite
//! library is required.  All trait methods are synchronous rusqlite
//! calls executed under a `Mutex`; SQLite's single-writer transactions
//! linearize concurrent writes while WAL mode keeps reads non-blocking.

use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use super::{KvStore, StoreError, WRITE_ATTEMPTS};

/// Key/value store backed by a single SQLite database file.
pub struct SqliteKvStore {
    /// The database connection, guarded by a mutex for Send + Sync.
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    /// Open (or create) the database at `path` and initialize the schema.
    ///
    /// Passing `":memory:"` creates an in-memory database (useful for tests).
    pub fn new(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_db()?;
        Ok(store)
    }

    /// Apply pragmas and create the records table if missing.
    /// Idempotent — safe to run on every startup.
    fn init_db(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("mutex poisoned");
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;

            CREATE TABLE IF NOT EXISTS records (
                namespace  TEXT NOT NULL,
                key        TEXT NOT NULL,
                value      BLOB NOT NULL,
                updated_at TEXT NOT NULL,

                PRIMARY KEY (namespace, key)
            );

            CREATE INDEX IF NOT EXISTS idx_records_namespace
                ON records(namespace);
            ",
        )?;
        Ok(())
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let value: Option<Vec<u8>> = conn
            .query_row(
                "SELECT value FROM records WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Io(e.to_string()))?;

        // An unknown namespace and an unknown key inside a known
        // namespace look identical to callers.
        value.ok_or(StoreError::NotFound)
    }

    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let now = chrono::Utc::now().to_rfc3339();

        let mut last_err = None;
        for attempt in 1..=WRITE_ATTEMPTS {
            match conn.execute(
                "INSERT INTO records (namespace, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (namespace, key)
                 DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![namespace, key, value, now],
            ) {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!(namespace, key, attempt, "put failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(StoreError::Io(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("mutex poisoned");

        let mut last_err = None;
        for attempt in 1..=WRITE_ATTEMPTS {
            // Deleting an absent row affects zero rows and succeeds.
            match conn.execute(
                "DELETE FROM records WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            ) {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!(namespace, key, attempt, "delete failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(StoreError::Io(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteKvStore {
        SqliteKvStore::new(":memory:").unwrap()
    }

    #[test]
    fn test_put_get_roundtrip() {
        let kv = store();
        kv.put("tenant-a", "s3", b"hello").unwrap();
        assert_eq!(kv.get("tenant-a", "s3").unwrap(), b"hello");
    }

    #[test]
    fn test_put_overwrites() {
        let kv = store();
        kv.put("tenant-a", "s3", b"old").unwrap();
        kv.put("tenant-a", "s3", b"new").unwrap();
        assert_eq!(kv.get("tenant-a", "s3").unwrap(), b"new");
    }

    #[test]
    fn test_missing_namespace_and_missing_key_collapse() {
        let kv = store();
        kv.put("tenant-a", "s3", b"x").unwrap();

        // Tenant never registered.
        let err_ns = kv.get("tenant-b", "s3").unwrap_err();
        // Known tenant, unknown tag.
        let err_key = kv.get("tenant-a", "minio").unwrap_err();

        assert!(matches!(err_ns, StoreError::NotFound));
        assert!(matches!(err_key, StoreError::NotFound));
        assert_eq!(err_ns.to_string(), err_key.to_string());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let kv = store();
        kv.put("tenant-a", "s3", b"x").unwrap();
        kv.delete("tenant-a", "s3").unwrap();
        kv.delete("tenant-a", "s3").unwrap();
        assert!(matches!(
            kv.get("tenant-a", "s3"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_delete_of_unknown_namespace_succeeds() {
        let kv = store();
        kv.delete("nobody", "nothing").unwrap();
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let kv = store();
        kv.put("tenant-a", "s3", b"a").unwrap();
        kv.put("tenant-b", "s3", b"b").unwrap();
        kv.delete("tenant-a", "s3").unwrap();
        assert_eq!(kv.get("tenant-b", "s3").unwrap(), b"b");
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");
        let path = path.to_str().unwrap();

        {
            let kv = SqliteKvStore::new(path).unwrap();
            kv.put("tenant-a", "s3", b"durable").unwrap();
        }
        let kv = SqliteKvStore::new(path).unwrap();
        assert_eq!(kv.get("tenant-a", "s3").unwrap(), b"durable");
    }
}
