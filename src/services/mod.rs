// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Services module - business logic layer.

pub mod account;
pub mod billing;
pub mod identity;
pub mod ledger;
pub mod refresh;
pub mod session;

pub use account::{AccountService, SessionBundle};
pub use billing::{BillingProvider, NoopBilling};
pub use identity::{AssertionError, IdentityVerifier, VerifiedIdentity};
pub use ledger::CreditLedger;
pub use refresh::RefreshTokenStore;
pub use session::SessionIssuer;
