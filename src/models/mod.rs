// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Data models for the application.

pub mod credit;
pub mod token;
pub mod user;

pub use credit::{CreditAccount, CreditTransaction, TransactionKind};
pub use token::RefreshTokenRecord;
pub use user::{User, UserId};
