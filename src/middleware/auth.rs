// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Caller resolution and credit gating.
//!
//! Every request is resolved through an ordered list of resolver
//! strategies; each returns resolved, not-applicable, or a fatal error, and
//! the chain short-circuits on the first non-not-applicable result. Adding
//! a channel means appending a resolver, not editing the existing ones.
//!
//! Precedence: trusted service-forwarded identity, bearer session
//! credential, open-access anonymous.

use crate::error::AppError;
use crate::models::{User, UserId};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Session cookie name (fallback when no Authorization header is sent).
pub const SESSION_COOKIE: &str = "tempus_token";
/// Shared secret presented by trusted internal services.
pub const SERVICE_SECRET_HEADER: &str = "x-service-secret";
/// Forwarded end-user subject on the trusted service channel.
pub const CALLER_SUBJECT_HEADER: &str = "x-caller-subject";

/// Authenticated user extracted by the gateway.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
}

/// Resolved caller identity for a request.
#[derive(Debug, Clone)]
pub enum Identity {
    User(AuthUser),
    Anonymous,
}

impl Identity {
    /// The authenticated user, or `Unauthorized` for anonymous callers.
    pub fn require_user(&self) -> Result<&AuthUser, AppError> {
        match self {
            Identity::User(user) => Ok(user),
            Identity::Anonymous => Err(AppError::Unauthorized),
        }
    }
}

/// Credential material extracted from one request.
struct AuthContext {
    bearer_token: Option<String>,
    service_secret: Option<String>,
    caller_subject: Option<String>,
}

/// One resolver's verdict.
enum Resolution {
    Resolved(Identity),
    NotApplicable,
    Fatal(AppError),
}

/// Resolver chain, in precedence order.
const RESOLVERS: &[fn(&AppState, &AuthContext) -> Resolution] = &[
    resolve_service_identity,
    resolve_bearer_credential,
    resolve_open_access,
];

/// Middleware that resolves the caller and stores the [`Identity`] as a
/// request extension. Routes decide whether anonymous is acceptable.
pub async fn resolve_identity(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let context = extract_context(&request, &jar);
    let identity = resolve(&state, &context)?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Run the resolver chain for a request context.
fn resolve(state: &AppState, context: &AuthContext) -> Result<Identity, AppError> {
    for resolver in RESOLVERS {
        match resolver(state, context) {
            Resolution::Resolved(identity) => return Ok(identity),
            Resolution::Fatal(err) => return Err(err),
            Resolution::NotApplicable => continue,
        }
    }
    Err(AppError::Unauthorized)
}

/// Channel 1: trusted forwarded identity from an internal service.
fn resolve_service_identity(state: &AppState, context: &AuthContext) -> Resolution {
    let Some(presented) = &context.service_secret else {
        return Resolution::NotApplicable;
    };

    let Some(expected) = &state.config.service_shared_secret else {
        tracing::warn!("Service secret presented but none is configured");
        return Resolution::Fatal(AppError::Unauthorized);
    };

    if presented.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() != 1 {
        tracing::warn!("Service secret mismatch");
        return Resolution::Fatal(AppError::Unauthorized);
    }

    let Some(subject) = &context.caller_subject else {
        // A trusted service acting on its own behalf (no end user)
        return Resolution::Resolved(Identity::Anonymous);
    };

    let user = state
        .db
        .get_user_by_google_subject(subject)
        .or_else(|| state.db.get_user_by_apple_subject(subject));

    match user {
        Some(User { active: false, .. }) => Resolution::Fatal(AppError::AccountInactive),
        Some(user) => Resolution::Resolved(Identity::User(AuthUser { user_id: user.id })),
        None => Resolution::Fatal(AppError::AccountNotFound(subject.clone())),
    }
}

/// Channel 2: bearer session credential (skipped in open-access mode).
fn resolve_bearer_credential(state: &AppState, context: &AuthContext) -> Resolution {
    if state.config.open_access {
        return Resolution::NotApplicable;
    }

    let Some(token) = &context.bearer_token else {
        return Resolution::Fatal(AppError::Unauthorized);
    };

    let user_id = match state.sessions.verify(token) {
        Ok(user_id) => user_id,
        Err(err) => return Resolution::Fatal(err),
    };

    match state.db.get_user(user_id) {
        Some(User { active: false, .. }) => Resolution::Fatal(AppError::AccountInactive),
        Some(user) => Resolution::Resolved(Identity::User(AuthUser { user_id: user.id })),
        None => Resolution::Fatal(AppError::Unauthorized),
    }
}

/// Channel 3: open-access mode resolves to anonymous instead of failing.
fn resolve_open_access(state: &AppState, _context: &AuthContext) -> Resolution {
    if state.config.open_access {
        Resolution::Resolved(Identity::Anonymous)
    } else {
        Resolution::NotApplicable
    }
}

/// Guard for metered endpoints.
///
/// No-op in open-access mode and for anonymous system calls; otherwise the
/// caller's balance must cover `cost`.
pub fn require_credits(state: &AppState, identity: &Identity, cost: i64) -> Result<(), AppError> {
    if state.config.open_access {
        return Ok(());
    }

    let user = match identity {
        Identity::Anonymous => return Ok(()),
        Identity::User(user) => user,
    };

    if state.ledger.check(user.user_id, cost)? {
        Ok(())
    } else {
        Err(AppError::InsufficientBalance)
    }
}

/// Gate for `/internal/*` routes: the service shared secret is mandatory,
/// independent of whatever identity the resolver chain produced.
pub async fn require_service_channel(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = &state.config.service_shared_secret else {
        tracing::warn!("Internal route called but no service secret is configured");
        return Err(AppError::Unauthorized);
    };

    let presented = request
        .headers()
        .get(SERVICE_SECRET_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if presented.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() != 1 {
        tracing::warn!("Blocked internal request with missing or wrong service secret");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

fn extract_context(request: &Request, jar: &CookieJar) -> AuthContext {
    // Authorization header wins; cookie is the browser fallback
    let bearer_token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()));

    let header_value = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(|v| v.to_string())
    };

    AuthContext {
        bearer_token,
        service_secret: header_value(SERVICE_SECRET_HEADER),
        caller_subject: header_value(CALLER_SUBJECT_HEADER),
    }
}
