// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Credit ledger: balance gating for metered operations.
//!
//! The append-only transaction log is the source of truth; the account
//! balance is a denormalized cache of its sum. Every mutation happens under
//! the per-account lock so the read-check-write is atomic and two concurrent
//! spends can never both succeed on one charge's worth of balance.

use crate::db::MemoryDb;
use crate::error::AppError;
use crate::models::{CreditTransaction, TransactionKind, UserId};
use chrono::Utc;

/// Static cost table: operation name, price in credits, ledger kind.
///
/// One table for both price and kind, so a charge can never be priced under
/// one name and recorded under another.
pub const OPERATION_COSTS: &[(&str, i64, TransactionKind)] = &[
    ("generate_balanced", 5, TransactionKind::Generation),
    ("generate_hd", 10, TransactionKind::Generation),
    ("chat", 1, TransactionKind::Chat),
    ("temporal_jump", 2, TransactionKind::TemporalJump),
];

/// Price and ledger kind of a metered operation, if it is one.
pub fn operation_entry(operation: &str) -> Option<(i64, TransactionKind)> {
    OPERATION_COSTS
        .iter()
        .find(|(name, _, _)| *name == operation)
        .map(|(_, cost, kind)| (*cost, *kind))
}

/// Price of a metered operation, if it is one.
pub fn cost_of(operation: &str) -> Option<i64> {
    operation_entry(operation).map(|(cost, _)| cost)
}

/// Ledger kind for a metered operation name.
pub fn kind_for_operation(operation: &str) -> Option<TransactionKind> {
    operation_entry(operation).map(|(_, kind)| kind)
}

/// Per-user credit accounting.
#[derive(Clone)]
pub struct CreditLedger {
    db: MemoryDb,
}

impl CreditLedger {
    pub fn new(db: MemoryDb) -> Self {
        Self { db }
    }

    /// Read-only cost table snapshot for the pricing surface.
    pub fn costs(&self) -> &'static [(&'static str, i64, TransactionKind)] {
        OPERATION_COSTS
    }

    /// True iff the balance covers `cost`. No side effects.
    pub fn check(&self, user_id: UserId, cost: i64) -> Result<bool, AppError> {
        let account = self
            .db
            .get_account(user_id)
            .ok_or_else(|| AppError::AccountNotFound(user_id.to_string()))?;
        Ok(account.balance >= cost)
    }

    /// Current account snapshot.
    pub fn account(&self, user_id: UserId) -> Result<crate::models::CreditAccount, AppError> {
        self.db
            .get_account(user_id)
            .ok_or_else(|| AppError::AccountNotFound(user_id.to_string()))
    }

    /// Ledger rows for an account, newest first.
    pub fn history(&self, user_id: UserId) -> Result<Vec<CreditTransaction>, AppError> {
        // Existence check keeps "no account" distinct from "no history"
        self.account(user_id)?;
        Ok(self.db.transactions_for_user(user_id))
    }

    /// Atomically debit `cost` credits and append the ledger row.
    ///
    /// Refuses with no mutation at all if the balance cannot cover the cost
    /// at the instant of the check.
    pub async fn spend(
        &self,
        user_id: UserId,
        cost: i64,
        kind: TransactionKind,
        reference: Option<String>,
        note: Option<String>,
    ) -> Result<CreditTransaction, AppError> {
        if cost <= 0 {
            return Err(AppError::BadRequest("spend cost must be positive".into()));
        }

        let lock = self.db.account_lock(user_id);
        let _guard = lock.lock().await;

        let mut account = self
            .db
            .get_account(user_id)
            .ok_or_else(|| AppError::AccountNotFound(user_id.to_string()))?;

        if account.balance < cost {
            tracing::debug!(
                user_id,
                cost,
                balance = account.balance,
                "Spend refused: insufficient balance"
            );
            return Err(AppError::InsufficientBalance);
        }

        let now = Utc::now().to_rfc3339();
        account.balance -= cost;
        account.lifetime_spent += cost;
        account.updated_at = now.clone();

        let transaction = self.db.commit_account_mutation(
            account.clone(),
            CreditTransaction {
                id: 0, // assigned by the store
                user_id,
                amount: -cost,
                balance_after: account.balance,
                kind,
                reference,
                note,
                created_at: now,
            },
        );

        tracing::info!(
            user_id,
            amount = transaction.amount,
            balance_after = transaction.balance_after,
            kind = ?transaction.kind,
            "Credits spent"
        );

        Ok(transaction)
    }

    /// Atomically credit `amount` and append the ledger row.
    pub async fn grant(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
        note: Option<String>,
    ) -> Result<CreditTransaction, AppError> {
        if amount <= 0 {
            return Err(AppError::BadRequest("grant amount must be positive".into()));
        }

        let lock = self.db.account_lock(user_id);
        let _guard = lock.lock().await;

        let mut account = self
            .db
            .get_account(user_id)
            .ok_or_else(|| AppError::AccountNotFound(user_id.to_string()))?;

        // Both sums must fit before anything is written; an oversized grant
        // is refused with no partial mutation, same as a refused spend.
        let new_balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| AppError::BadRequest("grant amount overflows balance".into()))?;
        let new_earned = account
            .lifetime_earned
            .checked_add(amount)
            .ok_or_else(|| AppError::BadRequest("grant amount overflows balance".into()))?;

        let now = Utc::now().to_rfc3339();
        account.balance = new_balance;
        account.lifetime_earned = new_earned;
        account.updated_at = now.clone();

        let transaction = self.db.commit_account_mutation(
            account.clone(),
            CreditTransaction {
                id: 0,
                user_id,
                amount,
                balance_after: account.balance,
                kind,
                reference: None,
                note,
                created_at: now,
            },
        );

        tracing::info!(
            user_id,
            amount,
            balance_after = transaction.balance_after,
            kind = ?transaction.kind,
            "Credits granted"
        );

        Ok(transaction)
    }
}
