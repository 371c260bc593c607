// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! In-memory store with typed operations.
//!
//! Provides high-level operations for:
//! - Users (identity records, unique external-subject indexes)
//! - Credit accounts and the append-only transaction ledger
//! - Refresh tokens (hash-keyed)
//!
//! Mutations that must be atomic (ledger spend/grant, refresh rotation,
//! find-or-create sign-in) acquire the relevant per-row lock first; the
//! store itself only guarantees individual map operations are safe.

use crate::error::AppError;
use crate::models::{CreditAccount, CreditTransaction, RefreshTokenRecord, User, UserId};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-row lock map, keyed by row owner.
type LockMap<K> = DashMap<K, Arc<Mutex<()>>>;

/// In-memory database.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    users: DashMap<UserId, User>,
    users_by_google: DashMap<String, UserId>,
    users_by_apple: DashMap<String, UserId>,
    accounts: DashMap<UserId, CreditAccount>,
    /// Ledger rows per account, in creation order. Append-only.
    transactions: DashMap<UserId, Vec<CreditTransaction>>,
    refresh_tokens: DashMap<String, RefreshTokenRecord>,

    user_id_seq: AtomicU64,
    tx_id_seq: AtomicU64,

    account_locks: LockMap<UserId>,
    refresh_locks: LockMap<UserId>,
    signin_locks: LockMap<String>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Per-Row Locks ───────────────────────────────────────────

    /// Lock serializing balance mutations for one account.
    pub fn account_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        lock_for(&self.inner.account_locks, user_id)
    }

    /// Lock serializing refresh-token rotation for one user's family.
    pub fn refresh_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        lock_for(&self.inner.refresh_locks, user_id)
    }

    /// Lock serializing find-or-create for one external subject.
    pub fn signin_lock(&self, subject: &str) -> Arc<Mutex<()>> {
        lock_for(&self.inner.signin_locks, subject.to_string())
    }

    // ─── User Operations ─────────────────────────────────────────

    pub fn get_user(&self, user_id: UserId) -> Option<User> {
        self.inner.users.get(&user_id).map(|u| u.clone())
    }

    pub fn get_user_by_google_subject(&self, subject: &str) -> Option<User> {
        self.inner
            .users_by_google
            .get(subject)
            .and_then(|id| self.get_user(*id))
    }

    pub fn get_user_by_apple_subject(&self, subject: &str) -> Option<User> {
        self.inner
            .users_by_apple
            .get(subject)
            .and_then(|id| self.get_user(*id))
    }

    /// Insert a new user together with a zero-balance credit account.
    ///
    /// Caller must hold the sign-in lock for the subject; the uniqueness
    /// check here is a backstop, not the concurrency discipline.
    pub fn insert_user(
        &self,
        google_subject: &str,
        apple_subject: Option<&str>,
        email: Option<String>,
        display_name: Option<String>,
    ) -> Result<User, AppError> {
        if self.inner.users_by_google.contains_key(google_subject) {
            return Err(AppError::Database(format!(
                "duplicate google subject: {google_subject}"
            )));
        }

        let id = self.inner.user_id_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now().to_rfc3339();

        let user = User {
            id,
            google_subject: google_subject.to_string(),
            apple_subject: apple_subject.map(|s| s.to_string()),
            email,
            display_name,
            active: true,
            created_at: now.clone(),
            last_login_at: now.clone(),
        };

        self.inner.users.insert(id, user.clone());
        self.inner
            .users_by_google
            .insert(google_subject.to_string(), id);
        if let Some(apple) = &user.apple_subject {
            self.inner.users_by_apple.insert(apple.clone(), id);
        }
        self.inner.accounts.insert(id, CreditAccount::new(id, &now));

        Ok(user)
    }

    /// Replace a user record (profile updates, last-login, active flag).
    pub fn update_user(&self, user: &User) -> Result<(), AppError> {
        if !self.inner.users.contains_key(&user.id) {
            return Err(AppError::NotFound(format!("User {}", user.id)));
        }
        self.inner.users.insert(user.id, user.clone());
        Ok(())
    }

    // ─── Credit Account / Ledger Operations ──────────────────────

    pub fn get_account(&self, user_id: UserId) -> Option<CreditAccount> {
        self.inner.accounts.get(&user_id).map(|a| a.clone())
    }

    /// Write back an account snapshot and append its ledger row.
    ///
    /// Caller must hold the account lock; this keeps the balance cache and
    /// the ledger consistent as one unit.
    pub fn commit_account_mutation(
        &self,
        account: CreditAccount,
        mut transaction: CreditTransaction,
    ) -> CreditTransaction {
        transaction.id = self.inner.tx_id_seq.fetch_add(1, Ordering::SeqCst) + 1;

        self.inner.accounts.insert(account.user_id, account);
        self.inner
            .transactions
            .entry(transaction.user_id)
            .or_default()
            .push(transaction.clone());

        transaction
    }

    /// Ledger rows for an account, newest first.
    pub fn transactions_for_user(&self, user_id: UserId) -> Vec<CreditTransaction> {
        let mut rows = self
            .inner
            .transactions
            .get(&user_id)
            .map(|v| v.clone())
            .unwrap_or_default();
        rows.reverse();
        rows
    }

    // ─── Refresh Token Operations ────────────────────────────────

    pub fn insert_refresh_token(&self, record: RefreshTokenRecord) {
        self.inner
            .refresh_tokens
            .insert(record.token_hash.clone(), record);
    }

    pub fn get_refresh_token(&self, token_hash: &str) -> Option<RefreshTokenRecord> {
        self.inner.refresh_tokens.get(token_hash).map(|r| r.clone())
    }

    /// Mark a token revoked. Idempotent; the first revocation timestamp wins.
    pub fn revoke_refresh_token(&self, token_hash: &str) {
        if let Some(mut record) = self.inner.refresh_tokens.get_mut(token_hash) {
            if record.revoked_at.is_none() {
                record.revoked_at = Some(Utc::now());
            }
        }
    }

    /// Revoke every still-active token for a user. Returns how many were hit.
    pub fn revoke_all_refresh_tokens(&self, user_id: UserId) -> usize {
        let now = Utc::now();
        let mut revoked = 0;
        for mut entry in self.inner.refresh_tokens.iter_mut() {
            if entry.user_id == user_id && entry.revoked_at.is_none() {
                entry.revoked_at = Some(now);
                revoked += 1;
            }
        }
        revoked
    }

    /// Count of unrevoked, unexpired tokens for a user.
    pub fn active_refresh_token_count(&self, user_id: UserId) -> usize {
        let now = Utc::now();
        self.inner
            .refresh_tokens
            .iter()
            .filter(|r| r.user_id == user_id && !r.is_revoked() && !r.is_expired(now))
            .count()
    }
}

fn lock_for<K>(locks: &LockMap<K>, key: K) -> Arc<Mutex<()>>
where
    K: std::hash::Hash + Eq,
{
    locks
        .entry(key)
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}
