// ABOUTME: Route module organization for the token server HTTP endpoints
// ABOUTME: Assembles token and health routes behind request tracing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Route module for the token server

/// Health check and readiness routes
pub mod health;
/// OAuth 2.0 token issuance routes
pub mod tokens;

pub use health::HealthRoutes;
pub use tokens::TokenRoutes;

use crate::resources::ServerResources;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the full application router
pub fn router(resources: &Arc<ServerResources>) -> Router {
    Router::new()
        .merge(TokenRoutes::routes(Arc::clone(resources)))
        .merge(HealthRoutes::routes(Arc::clone(resources)))
        .layer(TraceLayer::new_for_http())
}
