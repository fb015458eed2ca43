//! Abstract storage backend trait.
//!
//! Every backend variant implements [`Backend`].  The trait speaks in
//! buckets and object paths so handlers do not need to know which
//! provider a tenant registered.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by trait methods.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// A generic representation of a stored object.
#[derive(Debug, Clone)]
pub struct StorageObject {
    /// Path of the object within its bucket.
    pub path: String,
    /// Raw content.  Empty for listing entries.
    pub content: Bytes,
    /// Last modification time reported by the backend.
    pub last_modified: DateTime<Utc>,
}

/// Async contract for one tenant's object store.
///
/// Implementations are constructed per request from a credential
/// record; any network call is a suspension point and must not block
/// other tenants' pipelines.
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Create the bucket `bucket`.
    fn create_bucket<'a>(&'a self, bucket: &str) -> BackendFuture<'a, ()>;

    /// Delete the bucket `bucket`.
    fn delete_bucket<'a>(&'a self, bucket: &str) -> BackendFuture<'a, ()>;

    /// List objects in `bucket` under `prefix` ("" = whole bucket).
    /// Returned objects carry paths and timestamps, not content.
    fn list_objects<'a>(&'a self, bucket: &str, prefix: &str)
        -> BackendFuture<'a, Vec<StorageObject>>;

    /// Fetch the object at `path` in `bucket`, content included.
    fn get_object<'a>(&'a self, bucket: &str, path: &str) -> BackendFuture<'a, StorageObject>;

    /// Write `content` to `path` in `bucket`, overwriting any existing object.
    fn put_object<'a>(&'a self, bucket: &str, path: &str, content: Bytes)
        -> BackendFuture<'a, ()>;

    /// Delete the object at `path` in `bucket`.
    fn delete_object<'a>(&'a self, bucket: &str, path: &str) -> BackendFuture<'a, ()>;
}
