//! Key/value persistence for tenant credential records.
//!
//! The store is namespaced: one namespace per tenant identity, with the
//! credential tag as the record key inside it.  The only implementation
//! is [`sqlite::SqliteKvStore`], a single-file ACID engine.

use thiserror::Error;

pub mod sqlite;

pub use sqlite::SqliteKvStore;

/// Number of attempts for `put`/`delete` before surfacing an I/O error.
/// Fixed-count, no backoff.
pub const WRITE_ATTEMPTS: usize = 3;

/// Errors surfaced by a [`KvStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The namespace or the key does not exist.  The two cases are
    /// deliberately not distinguishable.
    #[error("record not found")]
    NotFound,

    /// The underlying engine failed after all write attempts.
    #[error("store i/o: {0}")]
    Io(String),
}

/// Namespaced key/value store contract.
///
/// Writes are serialized by the implementation; reads are snapshot
/// reads and never block writers.
pub trait KvStore: Send + Sync + 'static {
    /// Get the record at `(namespace, key)`.  Does not retry: a missing
    /// record on the first attempt is authoritative.
    fn get(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Insert or overwrite the record at `(namespace, key)`, creating
    /// the namespace if needed.  Retries transient failures up to
    /// [`WRITE_ATTEMPTS`] times.
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Delete the record at `(namespace, key)`.  Absent records are not
    /// an error — delete is idempotent.  Retries like `put`.
    fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError>;
}
