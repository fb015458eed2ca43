//! Credential registration endpoints.
//!
//! `POST /register` stores a credential record for the calling tenant;
//! `DELETE /register/:tag` removes one.  These are the only handlers
//! that do not resolve a backend — they manage the records the other
//! handlers resolve from.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Extension;
use bytes::Bytes;
use serde_json::json;
use tracing::info;

use super::render_ok;
use crate::auth::{Capability, Claims, TenantId};
use crate::credentials::CredentialRecord;
use crate::errors::GatewayError;
use crate::AppState;

/// `POST /register` — store a credential record under its backend name.
///
/// The record's `name` field doubles as the tag, so a tenant holds at
/// most one record per backend type and re-registration overwrites.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    claims.authorize(Capability::Create)?;

    if body.is_empty() {
        return Err(GatewayError::EmptyBody);
    }
    let record: CredentialRecord =
        serde_json::from_slice(&body).map_err(|err| GatewayError::BadRequest {
            message: format!("invalid credential payload: {err}"),
        })?;
    if record.name.is_empty() {
        return Err(GatewayError::BadRequest {
            message: "credential name must be set".to_string(),
        });
    }

    let tenant = TenantId::from_issuer(&claims.iss)?;
    state.credentials.put(&tenant, &record.name, &record)?;
    info!(%tenant, tag = %record.name, "credential registered");

    Ok(render_ok(json!({ "message": "successful" })))
}

/// `DELETE /register/:tag` — drop the record under `tag`.  Idempotent.
pub async fn unregister(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(tag): Path<String>,
) -> Result<Response, GatewayError> {
    claims.authorize(Capability::Delete)?;

    let tenant = TenantId::from_issuer(&claims.iss)?;
    state.credentials.delete(&tenant, &tag)?;
    info!(%tenant, %tag, "credential unregistered");

    Ok(render_ok(json!({ "message": "successful" })))
}
