// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Tempus API: authentication and credit accounting backend.
//!
//! This crate verifies Google identity assertions, mints the app's own
//! short-lived session credentials with rotating refresh secrets, and
//! meters paid operations against per-user credit balances through an
//! append-only ledger.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::MemoryDb;
use services::{
    AccountService, BillingProvider, CreditLedger, IdentityVerifier, NoopBilling,
    RefreshTokenStore, SessionIssuer,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: MemoryDb,
    pub sessions: SessionIssuer,
    pub identity: Arc<IdentityVerifier>,
    pub refresh_tokens: RefreshTokenStore,
    pub ledger: CreditLedger,
    pub accounts: AccountService,
    pub billing: Arc<dyn BillingProvider>,
}

impl AppState {
    /// Wire up the service graph from a config and an identity verifier.
    ///
    /// The billing provider defaults to [`NoopBilling`]; substitute one
    /// with [`AppState::with_billing_provider`] before the state is shared.
    pub fn new(config: Config, db: MemoryDb, identity: Arc<IdentityVerifier>) -> Self {
        let sessions = SessionIssuer::new(
            config.jwt_signing_key.clone(),
            config.session_ttl_minutes,
        );
        let refresh_tokens = RefreshTokenStore::new(db.clone(), config.refresh_ttl_days);
        let ledger = CreditLedger::new(db.clone());
        let accounts = AccountService::new(
            db.clone(),
            identity.clone(),
            sessions.clone(),
            refresh_tokens.clone(),
            ledger.clone(),
            config.signup_bonus,
        );

        Self {
            config,
            db,
            sessions,
            identity,
            refresh_tokens,
            ledger,
            accounts,
            billing: Arc::new(NoopBilling),
        }
    }

    /// Substitute the billing provider (call once at process start).
    pub fn with_billing_provider(mut self, billing: Arc<dyn BillingProvider>) -> Self {
        tracing::info!(provider = billing.name(), "Billing provider configured");
        self.billing = billing;
        self
    }
}
