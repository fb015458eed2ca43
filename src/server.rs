//! Axum router construction and middleware.
//!
//! The [`app`] function wires every gateway endpoint to its handler and
//! returns a ready-to-serve [`axum::Router`].  Middleware runs in a
//! fixed order: metrics wraps everything, common headers next, then
//! token verification, then the per-tenant rate limit (which needs the
//! verified claims for its key).

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tracing::warn;

use crate::auth::{self, Claims};
use crate::errors::{generate_request_id, GatewayError};
use crate::handlers;
use crate::metrics::{metrics_handler, metrics_middleware, AUTH_FAILURES_TOTAL, RATE_LIMITED_TOTAL};
use crate::AppState;

/// Build the axum [`Router`] with all gateway routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        // Infrastructure endpoints, exempt from authentication.
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        // Credential registration.
        .route("/register", post(handlers::register::register))
        .route("/register/:tag", delete(handlers::register::unregister))
        // Pod (bucket) operations.
        .route("/pods", post(handlers::pods::create_pod))
        .route("/pods/:bucket", delete(handlers::pods::delete_pod))
        // Pea (object) operations. The wildcard captures slashes.
        .route("/pea/:bucket", get(handlers::pea::list_objects))
        .route(
            "/pea/:bucket/*path",
            post(handlers::pea::create_object)
                .get(handlers::pea::get_object)
                .delete(handlers::pea::delete_object),
        )
        .with_state(state.clone())
        // Layer ordering: inner layers run last, outer layers wrap them.
        // The rate limiter is innermost so it sees the claims inserted by
        // auth_middleware one layer out.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        // Object bodies can exceed the default 2MB limit.
        .layer(DefaultBodyLimit::disable());

    if let Some(cors) = build_cors(&state) {
        router = router.layer(cors);
    }

    router
}

// -- Health check -------------------------------------------------------------

/// `GET /health` -- liveness probe.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json; charset=utf-8")],
        r#"{"status":"ok"}"#,
    )
}

// -- Common headers middleware -------------------------------------------------

/// Adds standard response headers to every response:
/// - `x-request-id`: 16-character uppercase hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `PodGate`
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        let request_id = generate_request_id();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", value);
        }
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    if let Ok(value) = HeaderValue::from_str(&date) {
        headers.insert("date", value);
    }
    headers.insert("server", HeaderValue::from_static("PodGate"));

    response
}

// -- Auth middleware ----------------------------------------------------------

/// Paths that bypass authentication.
const AUTH_SKIP_PATHS: &[&str] = &["/health", "/metrics"];

/// Bearer-token verification middleware.
///
/// Runs before handlers. Extracts the token, verifies it against the
/// issuer key it names, and inserts the verified [`Claims`] into the
/// request extensions for handlers and inner layers.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, GatewayError> {
    let path = req.uri().path();
    if AUTH_SKIP_PATHS.contains(&path) {
        return Ok(next.run(req).await);
    }

    let header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let Some(token) = auth::bearer_token(header) else {
        metrics::counter!(AUTH_FAILURES_TOTAL, "reason" => "missing").increment(1);
        return Err(GatewayError::MissingToken);
    };

    let claims = auth::verify(token, state.config.auth.expiry_leeway).map_err(|err| {
        warn!(%path, "token rejected: {err}");
        metrics::counter!(AUTH_FAILURES_TOTAL, "reason" => err.category()).increment(1);
        err
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// -- Rate limit middleware ----------------------------------------------------

/// Per-tenant rate limiting keyed by the verified token issuer.
///
/// Runs inside the auth layer, so unauthenticated requests never reach
/// it and the key is always a signature-checked issuer.
async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, GatewayError> {
    if let Some(limiter) = &state.limiter {
        if let Some(claims) = req.extensions().get::<Claims>() {
            if limiter.check_key(&claims.iss).is_err() {
                metrics::counter!(RATE_LIMITED_TOTAL).increment(1);
                return Err(GatewayError::TooManyRequests);
            }
        }
    }
    Ok(next.run(req).await)
}

// -- CORS ---------------------------------------------------------------------

/// Build the CORS layer described by the config, if enabled.
fn build_cors(state: &AppState) -> Option<tower_http::cors::CorsLayer> {
    use tower_http::cors::{Any, CorsLayer};

    let config = &state.config.cors;
    if !config.enabled {
        return None;
    }

    let mut cors = CorsLayer::new();

    if config.allowed_origins.is_empty() {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    if config.allowed_methods.is_empty() {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<Method> = config
            .allowed_methods
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    if config.allowed_headers.is_empty() {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<HeaderName> = config
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    Some(cors)
}

// -- Graceful shutdown --------------------------------------------------------

/// Resolve when SIGINT or SIGTERM arrives.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, CorsConfig};
    use crate::credentials::CredentialStore;
    use crate::db::SqliteKvStore;

    fn state_with_cors(cors: CorsConfig) -> Arc<AppState> {
        let config = Config {
            cors,
            ..Config::default()
        };
        let kv = Arc::new(SqliteKvStore::new(":memory:").unwrap());
        AppState::new(config, CredentialStore::new(kv))
    }

    #[test]
    fn test_cors_disabled_by_default() {
        let state = state_with_cors(CorsConfig::default());
        assert!(build_cors(&state).is_none());
    }

    #[test]
    fn test_cors_enabled_with_origins() {
        let state = state_with_cors(CorsConfig {
            enabled: true,
            allowed_origins: vec!["https://app.example.com".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            allowed_headers: vec!["authorization".to_string()],
        });
        assert!(build_cors(&state).is_some());
    }

    #[test]
    fn test_router_builds() {
        let state = state_with_cors(CorsConfig::default());
        let _ = app(state);
    }
}
