// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

use axum::body::Body;
use axum::response::Response;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tempus_api::config::Config;
use tempus_api::db::MemoryDb;
use tempus_api::routes::create_router;
use tempus_api::services::IdentityVerifier;
use tempus_api::AppState;

/// Key id the test verifier accepts.
pub const TEST_KID: &str = "test-kid";
/// HS256 secret the test verifier accepts.
pub const TEST_OIDC_SECRET: &[u8] = b"test_oidc_static_secret_32bytes!";

/// Build unshared app state with a deterministic identity verifier.
#[allow(dead_code)]
pub fn test_state(config: Config) -> AppState {
    let identity = Arc::new(
        IdentityVerifier::new_with_static_secret(&config.google_client_id, TEST_KID, TEST_OIDC_SECRET)
            .expect("static verifier should build"),
    );

    AppState::new(config, MemoryDb::new(), identity)
}

/// Create a test app. Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(test_state(Config::test_default()));
    (create_router(state.clone()), state)
}

/// Create a test app running in open-access mode.
#[allow(dead_code)]
pub fn create_open_access_app() -> (axum::Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.open_access = true;

    let state = Arc::new(test_state(config));
    (create_router(state.clone()), state)
}

#[derive(Serialize)]
struct IdTokenClaims {
    iss: String,
    aud: String,
    sub: String,
    exp: usize,
    iat: usize,
    email: Option<String>,
    email_verified: Option<bool>,
}

/// Mint an identity assertion the test verifier will accept.
#[allow(dead_code)]
pub fn test_assertion(subject: &str, email: Option<&str>) -> String {
    assertion_with(subject, email, "test-client-id.apps.googleusercontent.com", 3600)
}

/// Mint an assertion with explicit audience and lifetime, for negative tests.
#[allow(dead_code)]
pub fn assertion_with(subject: &str, email: Option<&str>, audience: &str, ttl_secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = IdTokenClaims {
        iss: "https://accounts.google.com".to_string(),
        aud: audience.to_string(),
        sub: subject.to_string(),
        exp: (now + ttl_secs).max(0) as usize,
        iat: now as usize,
        email: email.map(|e| e.to_string()),
        email_verified: email.map(|_| true),
    };

    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KID.to_string());

    encode(&header, &claims, &EncodingKey::from_secret(TEST_OIDC_SECRET))
        .expect("test assertion should encode")
}

/// Read a JSON response body.
#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Build a JSON POST request.
#[allow(dead_code)]
pub fn json_post(uri: &str, body: serde_json::Value) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Sign in through the router and return the parsed session response.
#[allow(dead_code)]
pub async fn sign_in(app: &axum::Router, subject: &str) -> serde_json::Value {
    use tower::ServiceExt;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/auth/google")
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "assertion": test_assertion(subject, Some("user@example.com")) })
                .to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.status(),
        axum::http::StatusCode::OK,
        "sign-in should succeed"
    );
    body_json(response).await
}
