// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Refresh token issuance, rotation, and reuse detection.
//!
//! Refresh tokens are opaque single-use secrets. A presented secret is
//! consumed by rotation: the old row is revoked and a replacement issued as
//! one atomic unit under the owning user's refresh lock. Presenting an
//! already-consumed secret is treated as theft and revokes the whole family.

use crate::db::MemoryDb;
use crate::error::AppError;
use crate::models::{RefreshTokenRecord, UserId};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

/// Raw secret entropy before encoding.
const SECRET_BYTES: usize = 48;

/// Store for long-lived, revocable, rotating refresh tokens.
#[derive(Clone)]
pub struct RefreshTokenStore {
    db: MemoryDb,
    rng: SystemRandom,
    ttl_days: i64,
}

impl RefreshTokenStore {
    pub fn new(db: MemoryDb, ttl_days: i64) -> Self {
        Self {
            db,
            rng: SystemRandom::new(),
            ttl_days,
        }
    }

    /// Issue a fresh refresh secret for a user.
    ///
    /// The raw secret is returned exactly once; only its hash is stored.
    pub fn issue(&self, user_id: UserId) -> Result<String, AppError> {
        let raw_secret = self.generate_secret()?;
        let now = Utc::now();

        self.db.insert_refresh_token(RefreshTokenRecord {
            token_hash: hash_secret(&raw_secret),
            user_id,
            expires_at: now + Duration::days(self.ttl_days),
            revoked_at: None,
            created_at: now,
        });

        Ok(raw_secret)
    }

    /// Consume a refresh secret and issue its replacement.
    ///
    /// State machine per presented token: not found, already revoked
    /// (reuse: family-wide revocation), expired (revoked in passing), or
    /// active (revoke-old + issue-new atomically under the user's lock).
    pub async fn rotate(&self, raw_secret: &str) -> Result<(UserId, String), AppError> {
        let token_hash = hash_secret(raw_secret);

        let record = self
            .db
            .get_refresh_token(&token_hash)
            .ok_or(AppError::RefreshNotFound)?;
        let user_id = record.user_id;

        // Serialize against concurrent rotations in this user's family. A
        // lost race re-reads the row below and lands in the reuse branch.
        let lock = self.db.refresh_lock(user_id);
        let _guard = lock.lock().await;

        let record = self
            .db
            .get_refresh_token(&token_hash)
            .ok_or(AppError::RefreshNotFound)?;

        if record.is_revoked() {
            let revoked = self.db.revoke_all_refresh_tokens(user_id);
            tracing::warn!(
                user_id,
                family_revoked = revoked,
                "Revoked refresh token presented again; revoking token family"
            );
            return Err(AppError::ReuseDetected);
        }

        if record.is_expired(Utc::now()) {
            self.db.revoke_refresh_token(&token_hash);
            return Err(AppError::RefreshExpired);
        }

        // Revoke-old then issue-new while still holding the lock, so no
        // interleaving can observe two active tokens for this session.
        self.db.revoke_refresh_token(&token_hash);
        let new_secret = self.issue(user_id)?;

        tracing::debug!(user_id, "Refresh token rotated");
        Ok((user_id, new_secret))
    }

    /// Revoke a presented secret (logout). Unknown secrets are a no-op.
    pub async fn revoke(&self, raw_secret: &str) -> Result<(), AppError> {
        let token_hash = hash_secret(raw_secret);

        let Some(record) = self.db.get_refresh_token(&token_hash) else {
            return Ok(());
        };

        let lock = self.db.refresh_lock(record.user_id);
        let _guard = lock.lock().await;

        self.db.revoke_refresh_token(&token_hash);
        tracing::debug!(user_id = record.user_id, "Refresh token revoked on logout");
        Ok(())
    }

    /// Revoke every active token for a user (deactivation, reuse response).
    pub fn revoke_all(&self, user_id: UserId) -> usize {
        let revoked = self.db.revoke_all_refresh_tokens(user_id);
        if revoked > 0 {
            tracing::info!(user_id, revoked, "Revoked all refresh tokens for user");
        }
        revoked
    }

    fn generate_secret(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; SECRET_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG failure")))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

/// One-way hash of a raw refresh secret (hex SHA-256).
pub fn hash_secret(raw_secret: &str) -> String {
    hex::encode(Sha256::digest(raw_secret.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_opaque() {
        let h1 = hash_secret("secret-a");
        let h2 = hash_secret("secret-a");
        let h3 = hash_secret("secret-b");

        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert_eq!(h1.len(), 64);
    }

    #[tokio::test]
    async fn issue_returns_distinct_url_safe_secrets() {
        let store = RefreshTokenStore::new(MemoryDb::new(), 30);

        let a = store.issue(1).unwrap();
        let b = store.issue(1).unwrap();

        assert_ne!(a, b);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
        // 48 bytes -> 64 base64 chars unpadded
        assert_eq!(a.len(), 64);
    }
}
