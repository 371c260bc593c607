// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Google identity assertion verification for sign-in.
//!
//! Verifies externally-issued ID tokens: signature against a cached JWKS
//! key, issuer, audience (our OAuth client id), expiry. Verification is
//! pure; the only shared state is the key cache, which is refreshed lazily
//! and is safe to race (keys are content-addressed by kid, last writer
//! wins).

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
// Refreshed lazily on the next verification after expiry; a stale cache
// just costs one extra fetch.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const CLOCK_SKEW_SECS: u64 = 60;

/// Verified identity extracted from a valid assertion.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Stable identity-provider subject
    pub subject: String,
    /// Email claim, present only when the provider marked it verified
    pub email: Option<String>,
    pub email_verified: bool,
}

/// Assertion verification failure categories.
#[derive(Debug, Clone)]
pub enum AssertionError {
    InvalidSignature,
    IssuerMismatch,
    AudienceMismatch,
    Expired,
    /// Header/claims could not be parsed, or a required claim is missing.
    Malformed(String),
    /// Transient infrastructure failure (key fetch); caller may retry later.
    Transient(String),
}

impl AssertionError {
    /// Short reason string surfaced to the caller.
    pub fn reason(&self) -> String {
        match self {
            AssertionError::InvalidSignature => "signature_invalid".to_string(),
            AssertionError::IssuerMismatch => "issuer_mismatch".to_string(),
            AssertionError::AudienceMismatch => "audience_mismatch".to_string(),
            AssertionError::Expired => "assertion_expired".to_string(),
            AssertionError::Malformed(msg) => format!("malformed: {msg}"),
            AssertionError::Transient(msg) => format!("transient: {msg}"),
        }
    }
}

#[derive(Clone)]
enum VerifierMode {
    Google,
    /// Deterministic HS256 mode for local/integration tests.
    StaticSecret {
        kid: String,
        secret: Vec<u8>,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for Google-issued ID tokens.
pub struct IdentityVerifier {
    http_client: reqwest::Client,
    jwks_url: String,
    expected_audience: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl IdentityVerifier {
    /// Production verifier that fetches and caches Google JWKS keys.
    pub fn new(expected_audience: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building JWKS HTTP client")?;

        tracing::info!(
            expected_audience = %expected_audience,
            "Initialized Google identity verifier"
        );

        Ok(Self {
            http_client,
            jwks_url: GOOGLE_JWKS_URL.to_string(),
            expected_audience: expected_audience.to_string(),
            mode: VerifierMode::Google,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Verifier with a static HS256 secret, for deterministic tests.
    pub fn new_with_static_secret(
        expected_audience: &str,
        kid: impl Into<String>,
        secret: impl Into<Vec<u8>>,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static verifier kid must not be empty");
        }

        Ok(Self {
            http_client: reqwest::Client::new(),
            jwks_url: GOOGLE_JWKS_URL.to_string(),
            expected_audience: expected_audience.to_string(),
            mode: VerifierMode::StaticSecret {
                kid,
                secret: secret.into(),
            },
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Verify a raw identity assertion.
    ///
    /// Checks, in order: signature against a key matched by kid, issuer,
    /// audience, expiry. Any failure maps to one reason; no partial success.
    pub async fn verify(&self, raw_assertion: &str) -> Result<VerifiedIdentity, AssertionError> {
        let header = decode_header(raw_assertion)
            .map_err(|e| AssertionError::Malformed(format!("invalid JWT header: {e}")))?;

        let expected_alg = match &self.mode {
            VerifierMode::Google => Algorithm::RS256,
            VerifierMode::StaticSecret { .. } => Algorithm::HS256,
        };

        if header.alg != expected_alg {
            return Err(AssertionError::Malformed(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AssertionError::Malformed("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(expected_alg);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[self.expected_audience.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<IdTokenClaims>(raw_assertion, decoding_key.as_ref(), &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AssertionError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AssertionError::IssuerMismatch,
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    AssertionError::AudienceMismatch
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AssertionError::InvalidSignature
                }
                _ => AssertionError::Malformed(format!("JWT validation failed: {e}")),
            })?;

        let claims = token_data.claims;

        tracing::debug!(
            subject = %claims.sub,
            email_verified = ?claims.email_verified,
            issuer = %claims.iss,
            "Identity assertion verified"
        );

        let email_verified = claims.email_verified.unwrap_or(false);

        Ok(VerifiedIdentity {
            subject: claims.sub,
            // Only surface the email when the provider vouched for it
            email: claims.email.filter(|_| email_verified),
            email_verified,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, AssertionError> {
        if let VerifierMode::StaticSecret {
            kid: static_kid,
            secret,
        } = &self.mode
        {
            if kid == static_kid {
                return Ok(Arc::new(DecodingKey::from_secret(secret)));
            }
            return Err(AssertionError::InvalidSignature);
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        // One ordinary refresh, then one forced refresh for an unknown kid
        // (covers Google rotating keys inside our TTL window).
        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(AssertionError::InvalidSignature)
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), AssertionError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_url = %self.jwks_url, "Refreshing Google JWKS cache");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AssertionError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AssertionError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AssertionError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let mut keys_by_kid: HashMap<String, Arc<DecodingKey>> = HashMap::new();

        for jwk in jwks.keys {
            if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
                continue;
            }

            if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
                continue;
            }

            if jwk.use_.as_deref().is_some_and(|use_| use_ != "sig") {
                continue;
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(AssertionError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        let entry = JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        };

        *self.jwks_cache.write().await = Some(entry);

        tracing::debug!(ttl_secs = ttl.as_secs(), "Google JWKS cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    iss: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
}

/// Cache lifetime from a Cache-Control max-age, capped at the fallback.
fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    let Some(max_age) = headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
    else {
        return fallback;
    };

    Duration::from_secs(max_age).min(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    for directive in value.split(',') {
        let directive = directive.trim();

        if let Some(raw) = directive.strip_prefix("max-age=") {
            let raw = raw.trim_matches('"');
            if let Ok(seconds) = raw.parse::<u64>() {
                return Some(seconds);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=3600"),
            Some(3600)
        );
        assert_eq!(parse_cache_control_max_age("max-age=60"), Some(60));
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[test]
    fn cache_ttl_is_capped_at_fallback() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(CACHE_CONTROL, "max-age=999999999".parse().unwrap());

        let ttl = cache_ttl_from_headers(&headers, Duration::from_secs(60));
        assert_eq!(ttl, Duration::from_secs(60));
    }
}
