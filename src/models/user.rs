// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// Internal user identifier, assigned by the store.
pub type UserId = u64;

/// User identity record.
///
/// Users are never hard-deleted; `active` is cleared on deactivation so
/// ledger rows keep a valid owner for the lifetime of the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Internal ID (also the document key)
    pub id: UserId,
    /// Primary identity-provider subject (Google `sub` claim), unique
    pub google_subject: String,
    /// Optional secondary external id (Apple subject), unique when present
    pub apple_subject: Option<String>,
    /// Verified email address (may be None if not shared)
    pub email: Option<String>,
    /// Display name
    pub display_name: Option<String>,
    /// Cleared on deactivation instead of deleting the row
    pub active: bool,
    /// When the user first signed in (RFC 3339)
    pub created_at: String,
    /// Last successful sign-in (RFC 3339)
    pub last_login_at: String,
}
