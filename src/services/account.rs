// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Sign-in flow: identity assertion in, session credentials out.
//!
//! Ties the verifier, credential issuers, and ledger together. User creation
//! is find-or-create under a per-subject lock, and the signup bonus is
//! granted inside the creation branch, so a retried sign-in can neither
//! duplicate the user nor the bonus.

use crate::db::MemoryDb;
use crate::error::AppError;
use crate::models::{TransactionKind, User, UserId};
use crate::services::identity::{AssertionError, IdentityVerifier};
use crate::services::ledger::CreditLedger;
use crate::services::refresh::RefreshTokenStore;
use crate::services::session::SessionIssuer;
use chrono::Utc;
use std::sync::Arc;

/// Outcome of a successful sign-in or session refresh.
#[derive(Debug, Clone)]
pub struct SessionBundle {
    pub user: User,
    pub session_token: String,
    pub refresh_secret: String,
    /// Session lifetime in seconds
    pub expires_in: i64,
    /// True when this sign-in created the account
    pub created: bool,
}

/// Account lifecycle service.
#[derive(Clone)]
pub struct AccountService {
    db: MemoryDb,
    identity: Arc<IdentityVerifier>,
    sessions: SessionIssuer,
    refresh_tokens: RefreshTokenStore,
    ledger: CreditLedger,
    signup_bonus: i64,
}

impl AccountService {
    pub fn new(
        db: MemoryDb,
        identity: Arc<IdentityVerifier>,
        sessions: SessionIssuer,
        refresh_tokens: RefreshTokenStore,
        ledger: CreditLedger,
        signup_bonus: i64,
    ) -> Self {
        Self {
            db,
            identity,
            sessions,
            refresh_tokens,
            ledger,
            signup_bonus,
        }
    }

    /// Sign in with an external identity assertion.
    ///
    /// Verifies the assertion, finds or creates the user, grants the signup
    /// bonus on first creation, and mints a session credential plus a paired
    /// refresh secret.
    pub async fn sign_in_with_assertion(
        &self,
        raw_assertion: &str,
        display_name: Option<String>,
    ) -> Result<SessionBundle, AppError> {
        let identity = self
            .identity
            .verify(raw_assertion)
            .await
            .map_err(|e| match e {
                AssertionError::Transient(msg) => {
                    AppError::Internal(anyhow::anyhow!("identity key fetch failed: {msg}"))
                }
                other => AppError::InvalidAssertion(other.reason()),
            })?;

        // Serialize find-or-create per subject so two racing first sign-ins
        // produce one user and one bonus.
        let lock = self.db.signin_lock(&identity.subject);
        let _guard = lock.lock().await;

        let (user, created) = match self.db.get_user_by_google_subject(&identity.subject) {
            Some(mut user) => {
                if !user.active {
                    return Err(AppError::AccountInactive);
                }
                user.last_login_at = Utc::now().to_rfc3339();
                if user.email.is_none() {
                    user.email = identity.email.clone();
                }
                self.db.update_user(&user)?;
                (user, false)
            }
            None => {
                let user = self.db.insert_user(
                    &identity.subject,
                    None,
                    identity.email.clone(),
                    display_name,
                )?;

                if self.signup_bonus > 0 {
                    self.ledger
                        .grant(
                            user.id,
                            self.signup_bonus,
                            TransactionKind::SignupBonus,
                            Some("welcome credits".to_string()),
                        )
                        .await?;
                }

                tracing::info!(user_id = user.id, "New account created on first sign-in");
                (user, true)
            }
        };

        self.mint_bundle(user, created)
    }

    /// Exchange a refresh secret for a fresh session credential.
    ///
    /// Rotation consumes the presented secret; the returned bundle carries
    /// its replacement.
    pub async fn refresh_session(&self, raw_secret: &str) -> Result<SessionBundle, AppError> {
        let (user_id, new_secret) = self.refresh_tokens.rotate(raw_secret).await?;

        let user = self
            .db
            .get_user(user_id)
            .ok_or_else(|| AppError::AccountNotFound(user_id.to_string()))?;

        if !user.active {
            // The rotation above already minted a replacement; a deactivated
            // account must not keep a live family around.
            self.refresh_tokens.revoke_all(user_id);
            return Err(AppError::AccountInactive);
        }

        let session_token = self.sessions.issue(user.id)?;
        Ok(SessionBundle {
            expires_in: self.sessions.ttl_secs(),
            session_token,
            refresh_secret: new_secret,
            user,
            created: false,
        })
    }

    /// Revoke a presented refresh secret (logout).
    pub async fn logout(&self, raw_secret: &str) -> Result<(), AppError> {
        self.refresh_tokens.revoke(raw_secret).await
    }

    /// Deactivate an account: clear the active flag and revoke every
    /// refresh token. Ledger and token rows are retained.
    pub async fn deactivate(&self, user_id: UserId) -> Result<(), AppError> {
        let mut user = self
            .db
            .get_user(user_id)
            .ok_or_else(|| AppError::AccountNotFound(user_id.to_string()))?;

        user.active = false;
        self.db.update_user(&user)?;
        let revoked = self.refresh_tokens.revoke_all(user_id);

        tracing::info!(user_id, revoked, "Account deactivated");
        Ok(())
    }

    fn mint_bundle(&self, user: User, created: bool) -> Result<SessionBundle, AppError> {
        let session_token = self.sessions.issue(user.id)?;
        let refresh_secret = self.refresh_tokens.issue(user.id)?;

        Ok(SessionBundle {
            expires_in: self.sessions.ttl_secs(),
            session_token,
            refresh_secret,
            user,
            created,
        })
    }
}
