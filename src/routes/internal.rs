// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Internal service-channel routes.
//!
//! Called by trusted backend services (the content pipeline) with the
//! shared service secret; the end user rides along in the forwarded
//! caller-subject header.

use crate::error::{AppError, Result};
use crate::middleware::auth::{require_credits, Identity};
use crate::models::TransactionKind;
use crate::routes::api::TransactionResponse;
use crate::services::ledger;
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/internal/charge", post(charge))
        .route("/internal/grant", post(admin_grant))
}

#[derive(Deserialize)]
pub struct ChargeRequest {
    /// Metered operation name from the cost table
    pub operation: String,
    /// Object the charge relates to (e.g. a generation id)
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Serialize)]
pub struct ChargeResponse {
    pub charged: bool,
    pub cost: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionResponse>,
}

/// Charge the forwarded user for one metered operation.
async fn charge(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<ChargeRequest>,
) -> Result<Json<ChargeResponse>> {
    let (cost, kind) = ledger::operation_entry(&request.operation)
        .ok_or_else(|| AppError::BadRequest(format!("unknown operation: {}", request.operation)))?;

    // Metering is disabled entirely in open-access mode
    if state.config.open_access {
        return Ok(Json(ChargeResponse {
            charged: false,
            cost,
            transaction: None,
        }));
    }

    require_credits(&state, &identity, cost)?;

    let auth = identity.require_user()?;
    let transaction = state
        .ledger
        .spend(
            auth.user_id,
            cost,
            kind,
            request.reference,
            Some(request.operation.clone()),
        )
        .await?;

    Ok(Json(ChargeResponse {
        charged: true,
        cost,
        transaction: Some(transaction.into()),
    }))
}

#[derive(Deserialize)]
pub struct GrantRequest {
    pub user_id: u64,
    pub amount: i64,
    #[serde(default)]
    pub note: Option<String>,
}

/// Administrative credit grant for a user.
async fn admin_grant(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GrantRequest>,
) -> Result<Json<TransactionResponse>> {
    let transaction = state
        .ledger
        .grant(
            request.user_id,
            request.amount,
            TransactionKind::AdminGrant,
            request.note,
        )
        .await?;

    Ok(Json(transaction.into()))
}
