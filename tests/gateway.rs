//! End-to-end tests through the full router: token verification,
//! scope checks, credential registration, and the error-status mapping.
//!
//! Backend-reaching operations are exercised only up to the point where
//! a network call would happen; everything before that (auth, rate
//! limit, credential resolution, body validation) runs for real.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::SigningKey;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::rngs::OsRng;
use tower::ServiceExt;

use podgate::auth::Claims;
use podgate::config::{Config, RateLimitConfig};
use podgate::credentials::CredentialStore;
use podgate::db::SqliteKvStore;
use podgate::{server, AppState};

// -- Helpers ------------------------------------------------------------------

struct Tenant {
    key: SigningKey,
    issuer: String,
}

fn tenant() -> Tenant {
    let key = SigningKey::generate(&mut OsRng);
    let issuer = hex::encode(key.verifying_key().to_bytes());
    Tenant { key, issuer }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn sign(tenant: &Tenant, claims: &Claims) -> String {
    let der = tenant.key.to_pkcs8_der().expect("pkcs8 encode");
    let encoding_key = EncodingKey::from_ed_der(der.as_bytes());
    encode(&Header::new(Algorithm::EdDSA), claims, &encoding_key).expect("sign token")
}

fn token(tenant: &Tenant, sub: &str, scope: &str) -> String {
    sign(
        tenant,
        &Claims {
            iss: tenant.issuer.clone(),
            sub: sub.to_string(),
            scope: scope.to_string(),
            iat: now() - 10,
            exp: now() + 3600,
        },
    )
}

fn expired_token(tenant: &Tenant) -> String {
    sign(
        tenant,
        &Claims {
            iss: tenant.issuer.clone(),
            sub: "s3".to_string(),
            scope: "create:pods".to_string(),
            iat: now() - 7200,
            exp: now() - 3600,
        },
    )
}

fn setup() -> (Router, CredentialStore) {
    setup_with(Config::default())
}

fn setup_with(config: Config) -> (Router, CredentialStore) {
    let kv = Arc::new(SqliteKvStore::new(":memory:").unwrap());
    let credentials = CredentialStore::new(kv);
    let state = AppState::new(config, credentials.clone());
    (server::app(state), credentials)
}

fn request(method: &str, uri: &str, bearer: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

const S3_RECORD: &str = r#"{"name":"s3","region":"us-east-1","endpoint":"http://127.0.0.1:1","key":"ak","token":"sk"}"#;

// -- Unauthenticated surface --------------------------------------------------

#[tokio::test]
async fn health_needs_no_token() {
    let (app, _) = setup();
    let response = app
        .oneshot(request("GET", "/health", None, ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let (app, _) = setup();
    let response = app
        .oneshot(request("POST", "/register", None, S3_RECORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "MissingToken");
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let (app, _) = setup();
    let response = app
        .oneshot(request("POST", "/register", Some("not.a.token"), S3_RECORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "InvalidSignature");
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let (app, _) = setup();
    let t = tenant();
    let response = app
        .oneshot(request(
            "POST",
            "/register",
            Some(&expired_token(&t)),
            S3_RECORD,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Expired");
}

#[tokio::test]
async fn responses_carry_common_headers() {
    let (app, _) = setup();
    let response = app
        .oneshot(request("GET", "/health", None, ""))
        .await
        .unwrap();
    let headers = response.headers();
    assert_eq!(headers.get("server").unwrap(), "PodGate");
    assert!(headers.contains_key("date"));
    let request_id = headers.get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(request_id.len(), 16);
}

// -- Registration -------------------------------------------------------------

#[tokio::test]
async fn register_stores_the_record() {
    let (app, credentials) = setup();
    let t = tenant();
    let response = app
        .oneshot(request(
            "POST",
            "/register",
            Some(&token(&t, "s3", "create:register")),
            S3_RECORD,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "successful");

    let tenant_id = podgate::auth::TenantId::from_issuer(&t.issuer).unwrap();
    let record = credentials.get(&tenant_id, "s3").unwrap();
    assert_eq!(record.name, "s3");
    assert_eq!(record.access_key, "ak");
    assert_eq!(record.access_secret, "sk");
}

#[tokio::test]
async fn register_without_create_scope_is_forbidden() {
    let (app, _) = setup();
    let t = tenant();
    let response = app
        .oneshot(request(
            "POST",
            "/register",
            Some(&token(&t, "s3", "read:register")),
            S3_RECORD,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Forbidden");
}

#[tokio::test]
async fn register_rejects_empty_body() {
    let (app, _) = setup();
    let t = tenant();
    let response = app
        .oneshot(request(
            "POST",
            "/register",
            Some(&token(&t, "s3", "create:register")),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_rejects_malformed_body() {
    let (app, _) = setup();
    let t = tenant();
    let response = app
        .oneshot(request(
            "POST",
            "/register",
            Some(&token(&t, "s3", "create:register")),
            "{not json",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "BadRequest");
}

#[tokio::test]
async fn unregister_is_idempotent() {
    let (app, credentials) = setup();
    let t = tenant();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/register",
            Some(&token(&t, "s3", "create:register delete:register")),
            S3_RECORD,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request(
                "DELETE",
                "/register/s3",
                Some(&token(&t, "s3", "delete:register")),
                "",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let tenant_id = podgate::auth::TenantId::from_issuer(&t.issuer).unwrap();
    assert!(credentials.get(&tenant_id, "s3").is_err());
}

// -- Credential resolution ----------------------------------------------------

#[tokio::test]
async fn pod_create_without_registration_is_no_content() {
    let (app, _) = setup();
    let t = tenant();
    let response = app
        .oneshot(request(
            "POST",
            "/pods",
            Some(&token(&t, "s3", "create:pods")),
            r#"{"name":"photos"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn tenants_do_not_see_each_other_records() {
    let (app, _) = setup();
    let alice = tenant();
    let bob = tenant();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/register",
            Some(&token(&alice, "s3", "create:register")),
            S3_RECORD,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Bob's token addresses the same tag but his namespace is empty.
    let response = app
        .oneshot(request(
            "POST",
            "/pods",
            Some(&token(&bob, "s3", "create:pods")),
            r#"{"name":"photos"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn unsupported_backend_is_service_unavailable() {
    let (app, _) = setup();
    let t = tenant();

    let record = r#"{"name":"tape","region":"","endpoint":"","key":"ak","token":"sk"}"#;
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/register",
            Some(&token(&t, "tape", "create:register")),
            record,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request(
            "POST",
            "/pods",
            Some(&token(&t, "tape", "create:pods")),
            r#"{"name":"photos"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"], "UnsupportedBackend");
}

// -- Scope enforcement on backend routes --------------------------------------

#[tokio::test]
async fn pod_delete_with_read_scope_is_forbidden() {
    let (app, _) = setup();
    let t = tenant();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/register",
            Some(&token(&t, "s3", "create:register")),
            S3_RECORD,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request(
            "DELETE",
            "/pods/photos",
            Some(&token(&t, "s3", "read:pods")),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn scope_substring_does_not_grant() {
    let (app, _) = setup();
    let t = tenant();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/register",
            Some(&token(&t, "s3", "create:register")),
            S3_RECORD,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // "xdelete:pods" contains "delete" but is not a delete grant.
    let response = app
        .oneshot(request(
            "DELETE",
            "/pods/photos",
            Some(&token(&t, "s3", "xdelete:pods")),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn empty_object_body_is_bad_request() {
    let (app, _) = setup();
    let t = tenant();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/register",
            Some(&token(&t, "s3", "create:register")),
            S3_RECORD,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request(
            "POST",
            "/pea/photos/notes.txt",
            Some(&token(&t, "s3", "write:pea")),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "EmptyBody");
}

// -- Rate limiting ------------------------------------------------------------

#[tokio::test]
async fn rate_limit_rejects_excess_requests() {
    let config = Config {
        rate_limit: RateLimitConfig {
            enabled: true,
            request_limit: 2,
            window_seconds: 60,
        },
        ..Config::default()
    };
    let (app, _) = setup_with(config);
    let t = tenant();
    let bearer = token(&t, "s3", "create:register");

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request("POST", "/register", Some(&bearer), S3_RECORD))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(request("POST", "/register", Some(&bearer), S3_RECORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn rate_limit_is_per_tenant() {
    let config = Config {
        rate_limit: RateLimitConfig {
            enabled: true,
            request_limit: 1,
            window_seconds: 60,
        },
        ..Config::default()
    };
    let (app, _) = setup_with(config);
    let alice = tenant();
    let bob = tenant();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/register",
            Some(&token(&alice, "s3", "create:register")),
            S3_RECORD,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Alice exhausted her budget; Bob's is untouched.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/register",
            Some(&token(&alice, "s3", "create:register")),
            S3_RECORD,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = app
        .oneshot(request(
            "POST",
            "/register",
            Some(&token(&bob, "s3", "create:register")),
            S3_RECORD,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
