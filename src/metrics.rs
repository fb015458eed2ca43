//! Prometheus metrics for PodGate.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides a Tower-compatible middleware for
//! HTTP RED metrics, and exposes the `/metrics` endpoint handler.

use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, path, status.
pub const HTTP_REQUESTS_TOTAL: &str = "podgate_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, path.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "podgate_http_request_duration_seconds";

/// Total requests rejected by token verification (counter). Labels: reason.
pub const AUTH_FAILURES_TOTAL: &str = "podgate_auth_failures_total";

/// Total requests rejected by the per-tenant rate limiter (counter).
pub const RATE_LIMITED_TOTAL: &str = "podgate_rate_limited_total";

/// Total backend operations dispatched (counter). Labels: operation.
pub const BACKEND_OPERATIONS_TOTAL: &str = "podgate_backend_operations_total";

// -- Global recorder installation ---------------------------------------------

/// Singleton handle to the Prometheus recorder.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent -- safe to call
/// multiple times (e.g. in tests). Returns a reference to the global handle.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    })
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(AUTH_FAILURES_TOTAL, "Requests rejected by token checks");
    describe_counter!(RATE_LIMITED_TOTAL, "Requests rejected by the rate limiter");
    describe_counter!(BACKEND_OPERATIONS_TOTAL, "Backend operations dispatched");
}

// -- Metrics middleware -------------------------------------------------------

/// Axum middleware that records HTTP RED metrics for every request.
///
/// Excludes `/metrics` from self-instrumentation to avoid feedback loops.
/// Must be the outermost layer so it captures the full request lifecycle.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    // Do not instrument the metrics endpoint itself.
    if req.uri().path() == "/metrics" {
        return next.run(req).await;
    }

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

// -- Path normalization -------------------------------------------------------

/// Normalize an actual request path to a route template for metric labels.
///
/// This prevents high-cardinality labels from unique tag/bucket/path names.
///
/// Examples:
/// - `/health` -> `/health`
/// - `/register` -> `/register`
/// - `/register/s3` -> `/register/{tag}`
/// - `/pods/photos` -> `/pods/{bucket}`
/// - `/pea/photos` -> `/pea/{bucket}`
/// - `/pea/photos/a/b.txt` -> `/pea/{bucket}/{path}`
fn normalize_path(path: &str) -> String {
    match path {
        "/health" | "/metrics" | "/register" | "/pods" => path.to_string(),
        _ => {
            let mut segments = path.trim_start_matches('/').splitn(3, '/');
            match (segments.next(), segments.next(), segments.next()) {
                (Some("register"), Some(_), None) => "/register/{tag}".to_string(),
                (Some("pods"), Some(_), None) => "/pods/{bucket}".to_string(),
                (Some("pea"), Some(_), None) => "/pea/{bucket}".to_string(),
                (Some("pea"), Some(_), Some(_)) => "/pea/{bucket}/{path}".to_string(),
                _ => "/".to_string(),
            }
        }
    }
}

// -- Metrics endpoint handler -------------------------------------------------

/// `GET /metrics` -- Render Prometheus exposition format text.
pub async fn metrics_handler() -> impl IntoResponse {
    let handle = PROMETHEUS_HANDLE
        .get()
        .expect("Prometheus recorder not initialized");
    let body = handle.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

// -- Tests --------------------------------------------------------------------
