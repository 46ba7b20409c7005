// ABOUTME: Token issuer creating refresh/access token pairs for an authenticated owner
// ABOUTME: Generates opaque UUID tokens, persists them atomically and shapes the token response
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::models::TokenResponse;
use crate::config::TokenLifetimes;
use crate::constants::{error_messages, oauth};
use crate::database::{CredentialStore, TokenPairError};
use crate::errors::{AppError, AppResult};
use crate::models::{NewTokenPair, Scope, TokenOwner};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Issues token pairs against the injected store
#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn CredentialStore>,
    lifetimes: TokenLifetimes,
}

impl TokenIssuer {
    /// Create an issuer
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, lifetimes: TokenLifetimes) -> Self {
        Self { store, lifetimes }
    }

    /// Issue a fresh token pair for `owner`
    ///
    /// `supersedes` names a refresh token row to delete in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns 500 when either token cannot be saved and 400 when the
    /// superseded refresh token has already been exchanged
    pub async fn issue(
        &self,
        owner: TokenOwner,
        supersedes: Option<i64>,
    ) -> AppResult<TokenResponse> {
        let now = Utc::now();
        let pair = NewTokenPair {
            refresh_token: Uuid::new_v4().to_string(),
            refresh_expires_at: now + self.lifetimes.refresh_token(),
            access_token: Uuid::new_v4().to_string(),
            access_expires_at: now + self.lifetimes.access_token(),
            owner,
            supersedes,
        };

        let issued = self
            .store
            .create_token_pair(&pair)
            .await
            .map_err(|e| Self::map_persist_error(owner, e))?;

        info!(
            owner = ?owner,
            access_token_id = issued.access_token_id,
            refresh_token_id = issued.refresh_token_id,
            "Token pair committed"
        );

        Ok(TokenResponse {
            id: issued.access_token_id,
            access_token: pair.access_token,
            expires_in: self.lifetimes.access_token_secs,
            token_type: oauth::TOKEN_TYPE_BEARER.to_owned(),
            scope: join_scopes(&issued.scopes),
            refresh_token: pair.refresh_token,
        })
    }

    fn map_persist_error(owner: TokenOwner, e: TokenPairError) -> AppError {
        match e {
            TokenPairError::Unavailable(_) => {
                error!(owner = ?owner, error = %e, "Token pair rejected: store unavailable");
                AppError::database_unavailable().with_source(e)
            }
            TokenPairError::RefreshToken(_) => {
                error!(owner = ?owner, error = %e, "Token pair rejected");
                AppError::database(error_messages::SAVE_REFRESH_TOKEN).with_source(e)
            }
            TokenPairError::AccessToken(_) | TokenPairError::Commit(_) => {
                error!(owner = ?owner, error = %e, "Token pair rejected");
                AppError::database(error_messages::SAVE_ACCESS_TOKEN).with_source(e)
            }
            TokenPairError::Superseded(id) => {
                warn!(owner = ?owner, refresh_token_id = id, "Refresh token exchanged concurrently");
                AppError::invalid_grant(error_messages::REFRESH_TOKEN_NOT_FOUND).with_source(e)
            }
        }
    }
}

/// Space separated scope names; callers pass scopes already ordered by name
fn join_scopes(scopes: &[Scope]) -> String {
    scopes
        .iter()
        .map(|s| s.scope.as_str())
        .collect::<Vec<_>>()
        .join(oauth::SCOPE_SEPARATOR)
}
