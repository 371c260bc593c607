// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Identity assertion rejected: {0}")]
    InvalidAssertion(String),

    #[error("Session credential expired")]
    CredentialExpired,

    #[error("Session credential signature invalid")]
    InvalidSignature,

    #[error("Token purpose is not acceptable here")]
    WrongPurpose,

    #[error("Refresh token not found")]
    RefreshNotFound,

    #[error("Refresh token expired")]
    RefreshExpired,

    #[error("Refresh token reuse detected")]
    ReuseDetected,

    #[error("Insufficient credit balance")]
    InsufficientBalance,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account is deactivated")]
    AccountInactive,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidAssertion(msg) => (
                StatusCode::UNAUTHORIZED,
                "invalid_assertion",
                Some(msg.clone()),
            ),
            AppError::CredentialExpired => (StatusCode::UNAUTHORIZED, "credential_expired", None),
            AppError::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_signature", None),
            AppError::WrongPurpose => (StatusCode::UNAUTHORIZED, "wrong_purpose", None),
            AppError::RefreshNotFound => (StatusCode::UNAUTHORIZED, "refresh_not_found", None),
            AppError::RefreshExpired => (StatusCode::UNAUTHORIZED, "refresh_expired", None),
            AppError::ReuseDetected => {
                // Distinct code so incident response can tell theft from ordinary expiry
                (StatusCode::UNAUTHORIZED, "refresh_reuse_detected", None)
            }
            AppError::InsufficientBalance => {
                (StatusCode::PAYMENT_REQUIRED, "insufficient_credits", None)
            }
            AppError::AccountNotFound(msg) => (
                StatusCode::NOT_FOUND,
                "account_not_found",
                Some(msg.clone()),
            ),
            AppError::AccountInactive => (StatusCode::FORBIDDEN, "account_inactive", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
