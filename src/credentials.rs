//! Tenant credential records: codec and persistent store.
//!
//! A [`CredentialRecord`] describes how to reach and authenticate to
//! one storage endpoint a tenant has registered.  Records are persisted
//! in the key/value store under `(tenant address, tag)` using a
//! versioned, fixed-field-order byte encoding so records written by one
//! gateway version stay readable by later ones.
//!
//! Wire layout (version 1):
//!
//! ```text
//! [0x01] [len:u32be][name] [len:u32be][region] [len:u32be][endpoint]
//!        [len:u32be][access_key] [len:u32be][access_secret]
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::TenantId;
use crate::db::KvStore;
use crate::errors::GatewayError;

/// Current encoding version byte.
const CODEC_VERSION: u8 = 0x01;

/// One registered storage endpoint.
///
/// `name` doubles as the backend type selector ("s3", "minio") and, at
/// registration time, as the record's tag in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Backend type selector.  The sole dispatch key for backend
    /// construction; unknown names are a hard error, never a default.
    pub name: String,
    /// Region the endpoint lives in.
    #[serde(default)]
    pub region: String,
    /// Endpoint URL ("" = the provider's default endpoint).
    #[serde(default)]
    pub endpoint: String,
    /// Access key / ID for the endpoint.
    #[serde(alias = "key")]
    pub access_key: String,
    /// Secret for the endpoint.
    #[serde(alias = "token")]
    pub access_secret: String,
}

/// Errors produced when decoding a stored record.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input is not a well-formed version-1 record.
    #[error("malformed credential record: {reason}")]
    Malformed { reason: &'static str },
}

fn malformed(reason: &'static str) -> DecodeError {
    DecodeError::Malformed { reason }
}

impl CredentialRecord {
    /// Serialize to the stable byte encoding.  Total and deterministic:
    /// equal records always encode to equal bytes.
    pub fn encode(&self) -> Vec<u8> {
        let fields = [
            &self.name,
            &self.region,
            &self.endpoint,
            &self.access_key,
            &self.access_secret,
        ];
        let mut buf =
            Vec::with_capacity(1 + fields.iter().map(|f| 4 + f.len()).sum::<usize>());
        buf.push(CODEC_VERSION);
        for field in fields {
            buf.extend_from_slice(&(field.len() as u32).to_be_bytes());
            buf.extend_from_slice(field.as_bytes());
        }
        buf
    }

    /// Deserialize from the stable byte encoding.
    ///
    /// Total: any malformed input fails with [`DecodeError::Malformed`];
    /// never panics, never returns a partially populated record.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (&version, mut rest) = bytes.split_first().ok_or(malformed("empty input"))?;
        if version != CODEC_VERSION {
            return Err(malformed("unsupported version"));
        }

        let mut read_field = || -> Result<String, DecodeError> {
            let (len_bytes, tail) = rest
                .split_at_checked(4)
                .ok_or(malformed("truncated length"))?;
            let len = u32::from_be_bytes(len_bytes.try_into().expect("4 bytes")) as usize;
            let (field, tail) = tail
                .split_at_checked(len)
                .ok_or(malformed("truncated field"))?;
            rest = tail;
            String::from_utf8(field.to_vec()).map_err(|_| malformed("field not utf-8"))
        };

        let record = Self {
            name: read_field()?,
            region: read_field()?,
            endpoint: read_field()?,
            access_key: read_field()?,
            access_secret: read_field()?,
        };
        if !rest.is_empty() {
            return Err(malformed("trailing bytes"));
        }
        Ok(record)
    }
}

// -- Store -------------------------------------------------------------------

/// Persistent credential records keyed by `(tenant, tag)`.
///
/// Thin layer over the [`KvStore`]: the tenant address is the
/// namespace, the tag is the key, the value is the encoded record.
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KvStore>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Look up the record registered under `tag` for `tenant`.
    ///
    /// An unregistered tenant and an unregistered tag both surface as
    /// [`GatewayError::CredentialNotFound`].
    pub fn get(&self, tenant: &TenantId, tag: &str) -> Result<CredentialRecord, GatewayError> {
        let bytes = self.kv.get(tenant.as_str(), tag)?;
        Ok(CredentialRecord::decode(&bytes)?)
    }

    /// Register (or overwrite) `record` under `tag` for `tenant`.
    pub fn put(
        &self,
        tenant: &TenantId,
        tag: &str,
        record: &CredentialRecord,
    ) -> Result<(), GatewayError> {
        self.kv.put(tenant.as_str(), tag, &record.encode())?;
        Ok(())
    }

    /// Unregister `tag` for `tenant`.  Idempotent.
    pub fn delete(&self, tenant: &TenantId, tag: &str) -> Result<(), GatewayError> {
        self.kv.delete(tenant.as_str(), tag)?;
        Ok(())
    }
}

// -- Tests -------------------------------------------------------------------
