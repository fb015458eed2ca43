//! Pea (object) endpoints.
//!
//! Objects are addressed by `/pea/:bucket/*path`.  Listing a bucket is
//! `GET /pea/:bucket`; the other verbs operate on a single object path.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Extension;
use bytes::Bytes;
use serde_json::json;
use tracing::info;

use super::pipeline::resolve;
use super::render_ok;
use crate::auth::{Capability, Claims};
use crate::errors::GatewayError;
use crate::AppState;

/// `GET /pea/:bucket` — list object paths in the bucket.
pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(bucket): Path<String>,
) -> Result<Response, GatewayError> {
    let ctx = resolve(&state, claims).await?;
    ctx.claims.authorize(Capability::Read)?;

    let objects = ctx
        .backend
        .list_objects(&bucket, "")
        .await
        .map_err(GatewayError::Backend)?;

    let content: Vec<serde_json::Value> = objects
        .iter()
        .map(|obj| {
            json!({
                "path": obj.path,
                "last_modified": obj.last_modified.to_rfc3339(),
            })
        })
        .collect();

    Ok(render_ok(json!({ "content": content })))
}

/// `POST /pea/:bucket/*path` — write an object.  The raw request body
/// is the object content; an empty body is rejected before any backend
/// call is made.
pub async fn create_object(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path((bucket, path)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let ctx = resolve(&state, claims).await?;
    ctx.claims.authorize(Capability::Update)?;

    if body.is_empty() {
        return Err(GatewayError::EmptyBody);
    }

    ctx.backend
        .put_object(&bucket, &path, body)
        .await
        .map_err(GatewayError::Backend)?;
    info!(tenant = %ctx.tenant, %bucket, %path, "object written");

    Ok(render_ok(json!({
        "path": path,
        "message": "successful",
    })))
}

/// `GET /pea/:bucket/*path` — fetch one object, content included.
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<Response, GatewayError> {
    let ctx = resolve(&state, claims).await?;
    ctx.claims.authorize(Capability::Read)?;

    let object = ctx
        .backend
        .get_object(&bucket, &path)
        .await
        .map_err(GatewayError::Backend)?;

    Ok(render_ok(json!({
        "path": object.path,
        "content": String::from_utf8_lossy(&object.content),
        "last_modified": object.last_modified.to_rfc3339(),
    })))
}

/// `DELETE /pea/:bucket/*path` — delete one object.
pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<Response, GatewayError> {
    let ctx = resolve(&state, claims).await?;
    ctx.claims.authorize(Capability::Delete)?;

    ctx.backend
        .delete_object(&bucket, &path)
        .await
        .map_err(GatewayError::Backend)?;
    info!(tenant = %ctx.tenant, %bucket, %path, "object deleted");

    Ok(render_ok(json!({ "message": "successful" })))
}
