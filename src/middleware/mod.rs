// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Request middleware.

pub mod auth;
pub mod security;
