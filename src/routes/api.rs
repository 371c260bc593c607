// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::Identity;
use crate::models::{CreditTransaction, TransactionKind};
use crate::routes::auth::UserResponse;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// API routes (caller resolution middleware is applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/account/deactivate", post(deactivate_account))
        .route("/api/credits", get(get_credits))
        .route("/api/credits/history", get(get_credit_history))
        .route("/api/credits/purchase", post(purchase_credits))
}

// ─── User Profile ────────────────────────────────────────────

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<UserResponse>> {
    let auth = identity.require_user()?;

    let user = state
        .db
        .get_user(auth.user_id)
        .ok_or_else(|| AppError::AccountNotFound(auth.user_id.to_string()))?;

    Ok(Json(user.into()))
}

#[derive(Serialize)]
pub struct DeactivateResponse {
    pub success: bool,
}

/// Deactivate the caller's account.
///
/// The user row, ledger, and token rows are retained; the active flag is
/// cleared and every refresh token revoked.
async fn deactivate_account(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<DeactivateResponse>> {
    let auth = identity.require_user()?;

    tracing::info!(user_id = auth.user_id, "User-initiated deactivation");
    state.accounts.deactivate(auth.user_id).await?;

    Ok(Json(DeactivateResponse { success: true }))
}

// ─── Credits ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct CreditsResponse {
    pub balance: i64,
    pub lifetime_earned: i64,
    pub lifetime_spent: i64,
}

/// Current balance and lifetime counters.
async fn get_credits(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<CreditsResponse>> {
    let auth = identity.require_user()?;
    let account = state.ledger.account(auth.user_id)?;

    Ok(Json(CreditsResponse {
        balance: account.balance,
        lifetime_earned: account.lifetime_earned,
        lifetime_spent: account.lifetime_spent,
    }))
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub id: u64,
    pub amount: i64,
    pub balance_after: i64,
    pub kind: TransactionKind,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub created_at: String,
}

impl From<CreditTransaction> for TransactionResponse {
    fn from(tx: CreditTransaction) -> Self {
        Self {
            id: tx.id,
            amount: tx.amount,
            balance_after: tx.balance_after,
            kind: tx.kind,
            reference: tx.reference,
            note: tx.note,
            created_at: tx.created_at,
        }
    }
}

/// Transaction history, newest first.
async fn get_credit_history(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<TransactionResponse>>> {
    let auth = identity.require_user()?;
    let history = state.ledger.history(auth.user_id)?;

    Ok(Json(history.into_iter().map(Into::into).collect()))
}

/// Operation cost table (public; consumed by the pricing display).
pub async fn get_costs(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, i64>> {
    let costs = state
        .ledger
        .costs()
        .iter()
        .map(|(name, cost, _)| (name.to_string(), *cost))
        .collect();

    Json(costs)
}

#[derive(Deserialize)]
pub struct PurchaseRequest {
    /// Provider-specific purchase receipt
    pub receipt: String,
}

/// Redeem a purchase receipt through the configured billing provider.
async fn purchase_credits(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<TransactionResponse>> {
    let auth = identity.require_user()?;

    let credits = state.billing.credits_for_receipt(&request.receipt).await?;

    let transaction = state
        .ledger
        .grant(
            auth.user_id,
            credits,
            TransactionKind::Purchase,
            Some(format!("purchase via {}", state.billing.name())),
        )
        .await?;

    Ok(Json(transaction.into()))
}
