// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Storage layer.
//!
//! The rest of the crate talks to [`MemoryDb`], a typed-operation wrapper in
//! the shape a database-backed store would take. Persistence mechanics are a
//! deployment concern; the contract the services rely on is the per-row lock
//! discipline exposed here (`account_lock`, `refresh_lock`, `signin_lock`).

pub mod memory;

pub use memory::MemoryDb;
