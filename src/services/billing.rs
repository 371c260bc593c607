// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Swappable billing provider.
//!
//! Credit purchases go through a provider strategy so the payment backend
//! can be substituted with a single call at process start. The default
//! binding is [`NoopBilling`], which rejects purchases until a real
//! provider is configured.

use crate::error::AppError;
use async_trait::async_trait;

/// Capability set a payment backend must implement.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Validate a provider-specific purchase receipt and return the number
    /// of credits it is worth; the caller records the grant in the ledger.
    async fn credits_for_receipt(&self, receipt: &str) -> Result<i64, AppError>;
}

/// Default provider: purchases are not available.
pub struct NoopBilling;

#[async_trait]
impl BillingProvider for NoopBilling {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn credits_for_receipt(&self, _receipt: &str) -> Result<i64, AppError> {
        Err(AppError::BadRequest(
            "purchases are not enabled on this deployment".to_string(),
        ))
    }
}
