// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Credit account and ledger models.

use crate::models::UserId;
use serde::{Deserialize, Serialize};

/// Per-user credit balance, 1:1 with a user.
///
/// `balance` is a denormalized cache of the ledger sum; the invariant
/// `balance == lifetime_earned - lifetime_spent` holds at all times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAccount {
    pub user_id: UserId,
    /// Current balance; never negative
    pub balance: i64,
    /// Sum of all positive ledger amounts; monotonically non-decreasing
    pub lifetime_earned: i64,
    /// Sum of all debit magnitudes; monotonically non-decreasing
    pub lifetime_spent: i64,
    /// Last mutation timestamp (RFC 3339)
    pub updated_at: String,
}

impl CreditAccount {
    /// Fresh zero-balance account.
    pub fn new(user_id: UserId, now: &str) -> Self {
        Self {
            user_id,
            balance: 0,
            lifetime_earned: 0,
            lifetime_spent: 0,
            updated_at: now.to_string(),
        }
    }
}

/// What a ledger entry was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    SignupBonus,
    Generation,
    Chat,
    TemporalJump,
    AdminGrant,
    Purchase,
    Refund,
    SubscriptionGrant,
}

/// Append-only ledger row. Never updated or deleted after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Row id, monotonically increasing per store
    pub id: u64,
    /// Owning account (user id)
    pub user_id: UserId,
    /// Signed amount: positive = credit, negative = debit
    pub amount: i64,
    /// Balance snapshot after applying `amount`
    pub balance_after: i64,
    pub kind: TransactionKind,
    /// Object the charge relates to (e.g. a generation id)
    pub reference: Option<String>,
    pub note: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}
