// ABOUTME: OAuth 2.0 token route handler for the form-encoded token endpoint
// ABOUTME: Extracts Basic credentials and the form body, then delegates to the token endpoint
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Token routes
//!
//! - `POST /v1/oauth/tokens` - exchange credentials or a refresh token for a token pair

use crate::errors::AppError;
use crate::oauth2_server::{Credentials, TokenRequest, TokenResponse};
use crate::resources::ServerResources;
use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Form, Json, Router,
};
use axum_extra::headers::{authorization::Basic, Authorization, HeaderMapExt};
use std::sync::Arc;

/// Token endpoint path
pub const TOKEN_PATH: &str = "/v1/oauth/tokens";

/// Routes for token issuance
pub struct TokenRoutes;

impl TokenRoutes {
    /// Create token routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(TOKEN_PATH, post(Self::handle_token))
            .with_state(resources)
    }

    /// Credentials from the `Authorization: Basic` header, if present and well formed
    fn basic_credentials(headers: &HeaderMap) -> Option<Credentials> {
        headers
            .typed_get::<Authorization<Basic>>()
            .map(|auth| Credentials::new(auth.username(), auth.password()))
    }

    async fn handle_token(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        form: Option<Form<TokenRequest>>,
    ) -> Result<Json<TokenResponse>, AppError> {
        let basic = Self::basic_credentials(&headers);
        // A missing or unreadable body carries no grant type and is rejected by the endpoint
        let request = form.map(|Form(request)| request).unwrap_or_default();
        let response = resources.token_endpoint.token(basic, request).await?;
        Ok(Json(response))
    }
}
