//! PodGate library — credential-gated multi-tenant object storage gateway.
//!
//! Each tenant is identified by the Ed25519 public key that signs their
//! bearer tokens. A tenant registers the endpoint and secret of an
//! S3-compatible store once; afterwards every bucket ("pod") and object
//! ("pea") operation is authenticated, scope-checked, and dispatched to
//! a backend built from the tenant's own registered credential.

use std::sync::Arc;

use governor::{DefaultKeyedRateLimiter, RateLimiter};

pub mod auth;
pub mod config;
pub mod credentials;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod storage;

use crate::config::Config;
use crate::credentials::CredentialStore;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Persistent per-tenant credential records.
    pub credentials: CredentialStore,
    /// Per-tenant request rate limiter (`None` when disabled in config).
    pub limiter: Option<DefaultKeyedRateLimiter<String>>,
}

impl AppState {
    /// Build the shared state from a loaded config and an open credential store.
    pub fn new(config: Config, credentials: CredentialStore) -> Arc<Self> {
        let limiter = config.rate_limit.quota().map(RateLimiter::keyed);
        Arc::new(Self {
            config,
            credentials,
            limiter,
        })
    }
}
