// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Application configuration loaded from environment variables.
//!
//! Secrets are read once at startup and cached in memory; nothing here
//! re-reads the environment per request.

use std::env;

/// Default session credential lifetime in minutes.
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 15;
/// Default refresh token lifetime in days.
pub const DEFAULT_REFRESH_TTL_DAYS: i64 = 30;
/// Default signup bonus in credits.
pub const DEFAULT_SIGNUP_BONUS: i64 = 25;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID; the expected audience of identity assertions
    pub google_client_id: String,
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Session credential lifetime in minutes
    pub session_ttl_minutes: i64,
    /// Refresh token lifetime in days
    pub refresh_ttl_days: i64,
    /// Credits granted once on account creation
    pub signup_bonus: i64,
    /// When true, requests without credentials resolve as anonymous and
    /// credit checks are skipped (local development without auth configured)
    pub open_access: bool,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Shared secret presented by trusted internal services, if configured
    pub service_shared_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let open_access = env::var("OPEN_ACCESS_MODE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        // The signing key is only optional when running open-access
        let jwt_signing_key = match env::var("JWT_SIGNING_KEY") {
            Ok(key) => key.into_bytes(),
            Err(_) if open_access => Vec::new(),
            Err(_) => return Err(ConfigError::Missing("JWT_SIGNING_KEY")),
        };

        Ok(Self {
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            session_ttl_minutes: parse_positive("SESSION_TTL_MINUTES")?
                .unwrap_or(DEFAULT_SESSION_TTL_MINUTES),
            refresh_ttl_days: parse_positive("REFRESH_TTL_DAYS")?
                .unwrap_or(DEFAULT_REFRESH_TTL_DAYS),
            signup_bonus: parse_positive("SIGNUP_BONUS_CREDITS")?.unwrap_or(DEFAULT_SIGNUP_BONUS),
            open_access,
            jwt_signing_key,
            service_shared_secret: env::var("SERVICE_SHARED_SECRET")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }

    /// Default config for tests.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test-client-id.apps.googleusercontent.com".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
            refresh_ttl_days: DEFAULT_REFRESH_TTL_DAYS,
            signup_bonus: DEFAULT_SIGNUP_BONUS,
            open_access: false,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            service_shared_secret: Some("test_service_secret".to_string()),
        }
    }
}

/// Parse an optional positive integer env var, rejecting zero and negatives.
fn parse_positive(name: &'static str) -> Result<Option<i64>, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(None),
        Ok(raw) => match raw.trim().parse::<i64>() {
            Ok(v) if v > 0 => Ok(Some(v)),
            _ => Err(ConfigError::Invalid(name)),
        },
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
