// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Refresh token storage model.

use crate::models::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored refresh token row.
///
/// Only the SHA-256 hash of the opaque secret is persisted; the raw secret
/// is returned to the caller once at issuance and never again derivable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Hex SHA-256 of the raw secret (also the document key)
    pub token_hash: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    /// Set when the token leaves the active state; terminal
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// A token is active while unrevoked; expiry is checked separately so
    /// the rotation path can tell the two apart.
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
