// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Credit ledger invariants: balance snapshots, atomic spends, purity of checks.

use tempus_api::db::MemoryDb;
use tempus_api::error::AppError;
use tempus_api::models::TransactionKind;
use tempus_api::services::CreditLedger;

fn ledger_with_user() -> (CreditLedger, u64, MemoryDb) {
    let db = MemoryDb::new();
    let user = db.insert_user("sub-1", None, None, None).unwrap();
    (CreditLedger::new(db.clone()), user.id, db)
}

#[tokio::test]
async fn test_balance_after_snapshots_each_mutation() {
    let (ledger, user_id, _) = ledger_with_user();

    let t1 = ledger
        .grant(user_id, 50, TransactionKind::AdminGrant, None)
        .await
        .unwrap();
    let t2 = ledger
        .spend(user_id, 5, TransactionKind::Generation, None, None)
        .await
        .unwrap();
    let t3 = ledger
        .spend(user_id, 1, TransactionKind::Chat, None, None)
        .await
        .unwrap();

    assert_eq!(t1.balance_after, 50);
    assert_eq!(t2.balance_after, 45);
    assert_eq!(t3.balance_after, 44);
    assert_eq!(t2.amount, -5);

    let account = ledger.account(user_id).unwrap();
    assert_eq!(account.balance, 44);
    assert_eq!(account.lifetime_earned, 50);
    assert_eq!(account.lifetime_spent, 6);
    assert_eq!(
        account.balance,
        account.lifetime_earned - account.lifetime_spent
    );
}

#[tokio::test]
async fn test_insufficient_spend_mutates_nothing() {
    let (ledger, user_id, db) = ledger_with_user();

    ledger
        .grant(user_id, 3, TransactionKind::SignupBonus, None)
        .await
        .unwrap();

    let result = ledger
        .spend(user_id, 5, TransactionKind::Generation, None, None)
        .await;
    assert!(matches!(result, Err(AppError::InsufficientBalance)));

    let account = ledger.account(user_id).unwrap();
    assert_eq!(account.balance, 3);
    assert_eq!(account.lifetime_spent, 0);
    // No ledger row for the refused spend
    assert_eq!(db.transactions_for_user(user_id).len(), 1);
}

#[tokio::test]
async fn test_check_has_no_side_effects() {
    let (ledger, user_id, db) = ledger_with_user();

    ledger
        .grant(user_id, 10, TransactionKind::AdminGrant, None)
        .await
        .unwrap();

    assert!(ledger.check(user_id, 10).unwrap());
    assert!(!ledger.check(user_id, 11).unwrap());

    assert_eq!(ledger.account(user_id).unwrap().balance, 10);
    assert_eq!(db.transactions_for_user(user_id).len(), 1);
}

#[tokio::test]
async fn test_history_is_newest_first() {
    let (ledger, user_id, _) = ledger_with_user();

    ledger
        .grant(user_id, 50, TransactionKind::AdminGrant, None)
        .await
        .unwrap();
    ledger
        .spend(user_id, 2, TransactionKind::TemporalJump, None, None)
        .await
        .unwrap();

    let history = ledger.history(user_id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, TransactionKind::TemporalJump);
    assert_eq!(history[1].kind, TransactionKind::AdminGrant);
    assert!(history[0].id > history[1].id);
}

#[tokio::test]
async fn test_nonpositive_amounts_rejected() {
    let (ledger, user_id, _) = ledger_with_user();

    assert!(matches!(
        ledger.grant(user_id, 0, TransactionKind::AdminGrant, None).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        ledger.grant(user_id, -5, TransactionKind::AdminGrant, None).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        ledger
            .spend(user_id, 0, TransactionKind::Generation, None, None)
            .await,
        Err(AppError::BadRequest(_))
    ));
}

#[tokio::test]
async fn test_oversized_grant_refused_without_mutation() {
    let (ledger, user_id, db) = ledger_with_user();

    ledger
        .grant(user_id, 25, TransactionKind::SignupBonus, None)
        .await
        .unwrap();

    // Passes the positive-amount guard but cannot fit in the balance
    let result = ledger
        .grant(user_id, i64::MAX, TransactionKind::AdminGrant, None)
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let account = ledger.account(user_id).unwrap();
    assert_eq!(account.balance, 25);
    assert_eq!(account.lifetime_earned, 25);
    assert_eq!(
        account.balance,
        account.lifetime_earned - account.lifetime_spent
    );
    assert_eq!(db.transactions_for_user(user_id).len(), 1);
}

#[tokio::test]
async fn test_replaying_history_reproduces_every_balance() {
    let (ledger, user_id, _) = ledger_with_user();

    ledger
        .grant(user_id, 25, TransactionKind::SignupBonus, None)
        .await
        .unwrap();
    ledger
        .spend(user_id, 10, TransactionKind::Generation, None, None)
        .await
        .unwrap();
    ledger
        .grant(user_id, 100, TransactionKind::Purchase, None)
        .await
        .unwrap();
    ledger
        .spend(user_id, 2, TransactionKind::TemporalJump, None, None)
        .await
        .unwrap();
    ledger
        .spend(user_id, 1, TransactionKind::Chat, None, None)
        .await
        .unwrap();

    // Folding the signed amounts from an empty account must land on every
    // recorded snapshot, and end at the live balance
    let mut rows = ledger.history(user_id).unwrap();
    rows.reverse();

    let mut running = 0i64;
    for row in &rows {
        running += row.amount;
        assert_eq!(running, row.balance_after);
        assert!(running >= 0);
    }
    assert_eq!(running, ledger.account(user_id).unwrap().balance);
}

#[tokio::test]
async fn test_unknown_account_reported() {
    let (ledger, _, _) = ledger_with_user();

    assert!(matches!(
        ledger.grant(999, 10, TransactionKind::AdminGrant, None).await,
        Err(AppError::AccountNotFound(_))
    ));
    assert!(matches!(ledger.check(999, 1), Err(AppError::AccountNotFound(_))));
    assert!(matches!(
        ledger.history(999),
        Err(AppError::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_spends_cannot_both_win() {
    let (ledger, user_id, _) = ledger_with_user();

    ledger
        .grant(user_id, 7, TransactionKind::AdminGrant, None)
        .await
        .unwrap();

    let a = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            ledger
                .spend(user_id, 5, TransactionKind::Generation, None, None)
                .await
        })
    };
    let b = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            ledger
                .spend(user_id, 5, TransactionKind::Generation, None, None)
                .await
        })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();

    assert_eq!(winners, 1, "balance of 7 covers exactly one 5-credit spend");
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::InsufficientBalance))));
    assert_eq!(ledger.account(user_id).unwrap().balance, 2);
}
