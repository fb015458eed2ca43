//! Pluggable tenant storage backends.
//!
//! [`for_record`] is the backend factory: it dispatches strictly on the
//! credential record's `name` field and builds a client bound to that
//! tenant's endpoint and secret.  Backends live for exactly one request
//! — there is no cross-request pooling or caching of clients.

use crate::credentials::CredentialRecord;
use crate::errors::GatewayError;

pub mod backend;
pub mod s3;

pub use backend::{Backend, StorageObject};

/// Construct the backend selected by `record.name`.
///
/// `"s3"` and `"minio"` both select the S3-compatible backend.  Any
/// other name is a hard error — never a silent default.
pub async fn for_record(record: &CredentialRecord) -> Result<Box<dyn Backend>, GatewayError> {
    match record.name.as_str() {
        "s3" | "minio" => Ok(Box::new(s3::S3Backend::new(record).await)),
        other => Err(GatewayError::UnsupportedBackend {
            name: other.to_string(),
        }),
    }
}

// -- Path helpers ------------------------------------------------------------

/// Trim surrounding slashes from a listing prefix.
pub(crate) fn clean_prefix(prefix: &str) -> &str {
    prefix.trim_matches('/')
}

/// Remove the listing prefix from an object path returned by a backend.
pub(crate) fn strip_object_prefix(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }
    path.replacen(&format!("{prefix}/"), "", 1)
}

// -- Tests -------------------------------------------------------------------
