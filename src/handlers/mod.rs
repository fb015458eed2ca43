//! HTTP handlers for the gateway API.
//!
//! Three groups, mirroring the route tree: credential registration
//! (`/register`), bucket operations (`/pods`), and object operations
//! (`/pea`).  The per-request resolution shared by pods/pea handlers
//! lives in [`pipeline`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub mod pea;
pub mod pipeline;
pub mod pods;
pub mod register;

/// Render a 200 JSON response.
pub(crate) fn render_ok(value: serde_json::Value) -> Response {
    (
        StatusCode::OK,
        [("content-type", "application/json; charset=utf-8")],
        value.to_string(),
    )
        .into_response()
}
