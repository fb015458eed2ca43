//! Pod (bucket) endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Extension;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::pipeline::resolve;
use super::render_ok;
use crate::auth::{Capability, Claims};
use crate::errors::GatewayError;
use crate::AppState;

#[derive(Deserialize)]
struct CreatePodRequest {
    name: String,
}

/// `POST /pods` — create a bucket on the tenant's backend.
pub async fn create_pod(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let ctx = resolve(&state, claims).await?;
    ctx.claims.authorize(Capability::Create)?;

    if body.is_empty() {
        return Err(GatewayError::EmptyBody);
    }
    let req: CreatePodRequest =
        serde_json::from_slice(&body).map_err(|err| GatewayError::BadRequest {
            message: format!("invalid pod payload: {err}"),
        })?;
    if req.name.is_empty() {
        return Err(GatewayError::BadRequest {
            message: "pod name must be set".to_string(),
        });
    }

    ctx.backend
        .create_bucket(&req.name)
        .await
        .map_err(GatewayError::Backend)?;
    info!(tenant = %ctx.tenant, pod = %req.name, "pod created");

    Ok(render_ok(json!({
        "name": req.name,
        "message": "successful",
    })))
}

/// `DELETE /pods/:bucket` — delete a bucket on the tenant's backend.
pub async fn delete_pod(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(bucket): Path<String>,
) -> Result<Response, GatewayError> {
    let ctx = resolve(&state, claims).await?;
    ctx.claims.authorize(Capability::Delete)?;

    ctx.backend
        .delete_bucket(&bucket)
        .await
        .map_err(GatewayError::Backend)?;
    info!(tenant = %ctx.tenant, pod = %bucket, "pod deleted");

    Ok(render_ok(json!({ "message": "successful" })))
}
