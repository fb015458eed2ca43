//! Gateway error types.
//!
//! Every failure in the request pipeline terminates in exactly one
//! [`GatewayError`] variant, and every variant maps to a fixed HTTP
//! status.  The enum implements [`axum::response::IntoResponse`] so
//! handlers can simply return `Err(GatewayError::Forbidden)`.
//!
//! Two deliberate choices in the mapping:
//! - A missing credential record surfaces as 204 No Content, never 404,
//!   so an unauthorized caller cannot probe which tenants exist.
//! - Internal failures (store I/O, stored-record decode) return a fixed
//!   category string; store paths, secrets, and error chains stay in
//!   the server log only.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::credentials::DecodeError;
use crate::db::StoreError;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Terminal pipeline failures, one per HTTP status the gateway can emit.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No `Authorization: Bearer` token on the request.
    #[error("missing bearer token")]
    MissingToken,

    /// The token signature does not verify against its own issuer key.
    #[error("token signature verification failed")]
    InvalidSignature,

    /// The token's validity window has ended.
    #[error("token has expired")]
    TokenExpired,

    /// The token's scope does not grant the required capability.
    #[error("you don't have permission for this")]
    Forbidden,

    /// No credential record for this (tenant, tag) pair.  Absent tenant
    /// and absent tag are intentionally indistinguishable.
    #[error("no credential registered")]
    CredentialNotFound,

    /// The stored record names a backend this gateway does not support.
    #[error("storage provider `{name}` not supported")]
    UnsupportedBackend { name: String },

    /// The request body was required but empty.
    #[error("body must be set")]
    EmptyBody,

    /// The request was malformed (bad JSON body, bad field values).
    #[error("{message}")]
    BadRequest { message: String },

    /// The tenant exceeded its request budget.
    #[error("request rate limit exceeded")]
    TooManyRequests,

    /// The tenant's storage backend rejected the operation.
    #[error("{0}")]
    Backend(anyhow::Error),

    /// Credential store I/O failed after retries.
    #[error("credential store error")]
    Store(#[source] anyhow::Error),

    /// A stored credential record failed to decode.
    #[error("credential record corrupt")]
    Decode(#[from] DecodeError),

    /// Catch-all for unexpected internal errors.
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => GatewayError::CredentialNotFound,
            StoreError::Io(msg) => GatewayError::Store(anyhow::anyhow!(msg)),
        }
    }
}

impl GatewayError {
    /// Stable error category string included in every response payload.
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::MissingToken => "MissingToken",
            GatewayError::InvalidSignature => "InvalidSignature",
            GatewayError::TokenExpired => "Expired",
            GatewayError::Forbidden => "Forbidden",
            GatewayError::CredentialNotFound => "NoCredential",
            GatewayError::UnsupportedBackend { .. } => "UnsupportedBackend",
            GatewayError::EmptyBody => "EmptyBody",
            GatewayError::BadRequest { .. } => "BadRequest",
            GatewayError::TooManyRequests => "TooManyRequests",
            GatewayError::Backend(_) => "BackendError",
            GatewayError::Store(_) => "StoreError",
            GatewayError::Decode(_) => "DecodeError",
            GatewayError::Internal(_) => "InternalError",
        }
    }

    /// Return the fixed HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingToken => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidSignature => StatusCode::UNAUTHORIZED,
            GatewayError::TokenExpired => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::CredentialNotFound => StatusCode::NO_CONTENT,
            GatewayError::UnsupportedBackend { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::EmptyBody => StatusCode::BAD_REQUEST,
            GatewayError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            GatewayError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Backend(_) => StatusCode::BAD_REQUEST,
            GatewayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Full error chains go to the log; clients only see the category.
        if status.is_server_error() {
            error!(category = self.category(), "request failed: {:#}", self);
        }

        // 204 No Content responses must not carry a body.
        if matches!(self, GatewayError::CredentialNotFound) {
            return status.into_response();
        }

        let body = json!({
            "error": self.category(),
            "message": self.to_string(),
        });

        (
            status,
            [("content-type", "application/json; charset=utf-8")],
            body.to_string(),
        )
            .into_response()
    }
}

// -- Tests -------------------------------------------------------------------
