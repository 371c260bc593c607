// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Caller resolution tests: channel precedence, credential failures,
//! open-access behavior.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

mod common;

fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_cost_table_is_public() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(get("/api/credits/costs").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["generate_hd"], 10);
    assert_eq!(body["generate_balanced"], 5);
    assert_eq!(body["chat"], 1);
    assert_eq!(body["temporal_jump"], 2);
}

#[tokio::test]
async fn test_protected_route_without_credentials() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(get("/api/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_credential_resolves_user() {
    let (app, _) = common::create_test_app();

    let session = common::sign_in(&app, "google-sub-1").await;
    let token = session["token"].as_str().unwrap();

    let response = app
        .oneshot(
            get("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["id"], session["user"]["id"]);
}

#[tokio::test]
async fn test_cookie_fallback_resolves_user() {
    let (app, _) = common::create_test_app();

    let session = common::sign_in(&app, "google-sub-1").await;
    let token = session["token"].as_str().unwrap();

    let response = app
        .oneshot(
            get("/api/me")
                .header(header::COOKIE, format!("tempus_token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_authorization_header_wins_over_cookie() {
    let (app, _) = common::create_test_app();

    let session = common::sign_in(&app, "google-sub-1").await;
    let token = session["token"].as_str().unwrap();

    let response = app
        .oneshot(
            get("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::COOKIE, "tempus_token=stale.garbage.value")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_session_reports_expiry() {
    let (app, state) = common::create_test_app();

    let session = common::sign_in(&app, "google-sub-1").await;
    let user_id = session["user"]["id"].as_u64().unwrap();

    // Past the verifier's 60s leeway
    let token = state.sessions.issue_tagged(user_id, "access", -120).unwrap();

    let response = app
        .oneshot(
            get("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "credential_expired");
}

#[tokio::test]
async fn test_non_access_token_rejected() {
    let (app, state) = common::create_test_app();

    let session = common::sign_in(&app, "google-sub-1").await;
    let user_id = session["user"]["id"].as_u64().unwrap();

    let token = state.sessions.issue_tagged(user_id, "refresh", 900).unwrap();

    let response = app
        .oneshot(
            get("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "wrong_purpose");
}

#[tokio::test]
async fn test_inactive_account_rejected_despite_valid_credential() {
    let (app, state) = common::create_test_app();

    let session = common::sign_in(&app, "google-sub-1").await;
    let user_id = session["user"]["id"].as_u64().unwrap();
    let token = session["token"].as_str().unwrap();

    state.accounts.deactivate(user_id).await.unwrap();

    let response = app
        .oneshot(
            get("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ─── Service channel ─────────────────────────────────────────

#[tokio::test]
async fn test_service_channel_resolves_forwarded_subject() {
    let (app, _) = common::create_test_app();

    let session = common::sign_in(&app, "google-sub-1").await;

    let response = app
        .oneshot(
            get("/api/me")
                .header("x-service-secret", "test_service_secret")
                .header("x-caller-subject", "google-sub-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["id"], session["user"]["id"]);
}

#[tokio::test]
async fn test_wrong_service_secret_is_fatal_even_with_valid_bearer() {
    let (app, _) = common::create_test_app();

    let session = common::sign_in(&app, "google-sub-1").await;
    let token = session["token"].as_str().unwrap();

    // A presented-but-wrong secret must not fall through to the bearer channel
    let response = app
        .oneshot(
            get("/api/me")
                .header("x-service-secret", "wrong_secret")
                .header("x-caller-subject", "google-sub-1")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_service_channel_unknown_subject() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            get("/api/me")
                .header("x-service-secret", "test_service_secret")
                .header("x-caller-subject", "no-such-subject")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "account_not_found");
}

#[tokio::test]
async fn test_service_channel_without_subject_is_anonymous() {
    let (app, _) = common::create_test_app();

    // Valid secret, no forwarded user: resolves, but /api/me needs a user
    let response = app
        .oneshot(
            get("/api/me")
                .header("x-service-secret", "test_service_secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ─── Open access ─────────────────────────────────────────────

#[tokio::test]
async fn test_open_access_resolves_anonymous() {
    let (app, _) = common::create_open_access_app();

    // Resolution succeeds (no 401 from the chain), but the profile route
    // still requires a concrete user
    let response = app
        .clone()
        .oneshot(get("/api/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
