// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! Tempus API Server
//!
//! Authentication and credit accounting backend for the Tempus app:
//! Google sign-in, rotating refresh tokens, and metered operation charges.

use std::sync::Arc;
use tempus_api::{config::Config, db::MemoryDb, services::IdentityVerifier, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        port = config.port,
        open_access = config.open_access,
        "Starting Tempus API"
    );

    let db = MemoryDb::new();

    let identity = Arc::new(
        IdentityVerifier::new(&config.google_client_id)
            .expect("Failed to initialize identity verifier"),
    );

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db, identity));

    // Build router
    let app = tempus_api::routes::create_router(state.clone());

    // Start server
    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tempus_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
