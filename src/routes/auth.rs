// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Sign-in, refresh, and logout routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::SESSION_COOKIE;
use crate::models::User;
use crate::services::SessionBundle;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", post(sign_in_google))
        .route("/auth/refresh", post(refresh_session))
        .route("/auth/logout", post(logout))
}

/// Sign-in request carrying a Google ID token.
#[derive(Deserialize)]
pub struct SignInRequest {
    /// Raw identity assertion from Google Sign-In
    pub assertion: String,
    /// Display name hint from the sign-in widget
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize, Default)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Public view of a user profile.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: u64,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            created_at: user.created_at,
        }
    }
}

/// Session credentials returned by sign-in and refresh.
#[derive(Serialize)]
pub struct SessionResponse {
    /// Bearer session credential
    pub token: String,
    /// Opaque rotating refresh secret; shown exactly once
    pub refresh_token: String,
    /// Session lifetime in seconds
    pub expires_in: i64,
    /// True when this sign-in created the account
    pub created: bool,
    pub user: UserResponse,
}

impl From<SessionBundle> for SessionResponse {
    fn from(bundle: SessionBundle) -> Self {
        Self {
            token: bundle.session_token,
            refresh_token: bundle.refresh_secret,
            expires_in: bundle.expires_in,
            created: bundle.created,
            user: bundle.user.into(),
        }
    }
}

/// Sign in with a Google identity assertion.
async fn sign_in_google(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<SignInRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    if request.assertion.trim().is_empty() {
        return Err(AppError::BadRequest("assertion must not be empty".into()));
    }

    let bundle = state
        .accounts
        .sign_in_with_assertion(&request.assertion, request.display_name)
        .await?;

    tracing::info!(
        user_id = bundle.user.id,
        created = bundle.created,
        "Sign-in successful"
    );

    let jar = jar.add(session_cookie(&bundle.session_token));
    Ok((jar, Json(bundle.into())))
}

/// Exchange a refresh secret for a new session credential.
async fn refresh_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<RefreshRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let bundle = state
        .accounts
        .refresh_session(&request.refresh_token)
        .await?;

    let jar = jar.add(session_cookie(&bundle.session_token));
    Ok((jar, Json(bundle.into())))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Revoke the presented refresh secret and clear the session cookie.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Option<Json<LogoutRequest>>,
) -> Result<(CookieJar, Json<LogoutResponse>)> {
    if let Some(refresh_token) = request.and_then(|Json(r)| r.refresh_token) {
        state.accounts.logout(&refresh_token).await?;
    }

    let jar = jar.remove(Cookie::from(SESSION_COOKIE));
    Ok((jar, Json(LogoutResponse { success: true })))
}

// Session-scoped cookie; the JWT inside carries its own expiry.
fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
