// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Session credential issuance and verification.
//!
//! Session credentials are short-lived HS256 JWTs carrying the user id, a
//! lifetime, and a `purpose` discriminator. The discriminator keeps other
//! token kinds signed with the same scheme from being replayed as a session
//! credential.

use crate::error::AppError;
use crate::models::UserId;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Purpose tag carried by session credentials.
pub const PURPOSE_ACCESS: &str = "access";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Subject (internal user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Token kind discriminator; must be "access" for session credentials
    pub purpose: String,
}

/// Stateless issuer/verifier for session credentials.
#[derive(Clone)]
pub struct SessionIssuer {
    signing_key: Vec<u8>,
    ttl_minutes: i64,
}

impl SessionIssuer {
    pub fn new(signing_key: Vec<u8>, ttl_minutes: i64) -> Self {
        Self {
            signing_key,
            ttl_minutes,
        }
    }

    /// Mint a session credential for a user.
    pub fn issue(&self, user_id: UserId) -> Result<String, AppError> {
        self.issue_tagged(user_id, PURPOSE_ACCESS, self.ttl_minutes * 60)
    }

    /// Mint a token with an explicit purpose tag and lifetime in seconds.
    ///
    /// Used for non-access token kinds sharing the signing scheme, and by
    /// tests that need expired or mis-tagged tokens.
    pub fn issue_tagged(
        &self,
        user_id: UserId,
        purpose: &str,
        ttl_secs: i64,
    ) -> Result<String, AppError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
            .as_secs() as i64;

        let claims = SessionClaims {
            sub: user_id.to_string(),
            iat: now as usize,
            exp: (now + ttl_secs).max(0) as usize,
            purpose: purpose.to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.signing_key),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT encoding failed: {}", e)))
    }

    /// Verify a session credential and return the subject user id.
    ///
    /// Distinguishes expiry from signature failure for caller diagnostics,
    /// and rejects correctly-signed tokens of any other purpose before
    /// looking at the subject.
    pub fn verify(&self, token: &str) -> Result<UserId, AppError> {
        let key = DecodingKey::from_secret(&self.signing_key);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        let token_data =
            decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::CredentialExpired,
                _ => AppError::InvalidSignature,
            })?;

        if token_data.claims.purpose != PURPOSE_ACCESS {
            return Err(AppError::WrongPurpose);
        }

        token_data
            .claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AppError::InvalidSignature)
    }

    /// Session lifetime in seconds, for token responses.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_minutes * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> SessionIssuer {
        SessionIssuer::new(b"test_signing_key_32_bytes_long!!".to_vec(), 15)
    }

    #[test]
    fn test_roundtrip() {
        let issuer = issuer();
        let token = issuer.issue(42).unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), 42);
    }

    #[test]
    fn test_expired_token_reports_expiry() {
        let issuer = issuer();
        // jsonwebtoken applies default leeway of 60s; go well past it
        let token = issuer.issue_tagged(42, PURPOSE_ACCESS, -120).unwrap();
        assert!(matches!(
            issuer.verify(&token),
            Err(AppError::CredentialExpired)
        ));
    }

    #[test]
    fn test_wrong_purpose_rejected() {
        let issuer = issuer();
        let token = issuer.issue_tagged(42, "refresh", 900).unwrap();
        assert!(matches!(issuer.verify(&token), Err(AppError::WrongPurpose)));
    }

    #[test]
    fn test_wrong_key_is_signature_failure() {
        let issuer = issuer();
        let token = issuer.issue(42).unwrap();

        let other = SessionIssuer::new(b"another_signing_key_32_bytes!!!!".to_vec(), 15);
        assert!(matches!(
            other.verify(&token),
            Err(AppError::InvalidSignature)
        ));
    }
}
