// SPDX-License-Identifier: MIT
// Copyright 2026 Tempus Labs

//! HTTP route handlers.

pub mod api;
pub mod auth;
pub mod internal;

use crate::middleware::auth::{require_service_channel, resolve_identity};
use crate::AppState;
use axum::http::{header, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer - allow requests from frontend URL and localhost (for dev)
    let frontend_url = state.config.frontend_url.clone();
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::predicate(
            move |origin: &axum::http::HeaderValue, _request_parts: &axum::http::request::Parts| {
                let origin_str = origin.to_str().unwrap_or("");
                origin_str == frontend_url
                    || origin_str.starts_with("http://localhost")
                    || origin_str.starts_with("http://127.0.0.1")
            },
        ))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Public routes (no caller resolution)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/credits/costs", get(api::get_costs))
        .merge(auth::routes());

    // User-facing routes: caller resolved through the gateway chain
    let protected_routes = api::routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), resolve_identity));

    // Internal service-channel routes: service secret mandatory, then the
    // same resolver chain supplies the forwarded identity
    let internal_routes = internal::routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), resolve_identity))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_service_channel,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(internal_routes)
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
