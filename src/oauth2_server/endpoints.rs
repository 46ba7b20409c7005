// ABOUTME: OAuth 2.0 token endpoint dispatching password, client credentials and refresh token grants
// ABOUTME: Authenticates the caller or validates the presented refresh token, then delegates to the issuer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::credentials::{hash_secret, PasswordVerifier};
use super::issuer::TokenIssuer;
use super::models::{Credentials, GrantType, TokenRequest, TokenResponse};
use crate::config::TokenLifetimes;
use crate::constants::{error_messages, oauth};
use crate::database::CredentialStore;
use crate::errors::{AppError, AppResult};
use crate::models::TokenOwner;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// OAuth 2.0 token endpoint
#[derive(Clone)]
pub struct TokenEndpoint {
    store: Arc<dyn CredentialStore>,
    verifier: Arc<dyn PasswordVerifier>,
    issuer: TokenIssuer,
    bcrypt_cost: u32,
    // Verified against on lookup misses so unknown and known principals cost the same
    unknown_principal_hash: Arc<OnceCell<String>>,
}

impl TokenEndpoint {
    /// Create a token endpoint over the injected store and verifier
    ///
    /// `bcrypt_cost` must match the cost stored secrets are hashed with.
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        verifier: Arc<dyn PasswordVerifier>,
        lifetimes: TokenLifetimes,
        bcrypt_cost: u32,
    ) -> Self {
        let issuer = TokenIssuer::new(Arc::clone(&store), lifetimes);
        Self {
            store,
            verifier,
            issuer,
            bcrypt_cost,
            unknown_principal_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Compute the unknown-principal hash ahead of the first request
    ///
    /// # Errors
    /// Returns an error if bcrypt hashing fails
    pub async fn warm_up(&self) -> AppResult<()> {
        self.unknown_hash().await.map(|_| ())
    }

    async fn unknown_hash(&self) -> AppResult<&str> {
        self.unknown_principal_hash
            .get_or_try_init(|| hash_secret(oauth::UNKNOWN_PRINCIPAL_SECRET, self.bcrypt_cost))
            .await
            .map(String::as_str)
    }

    /// Verify `secret` against the stored hash, spending the same bcrypt work when there is none
    async fn authenticate(&self, secret: &str, stored_hash: Option<&str>) -> AppResult<bool> {
        match stored_hash {
            Some(hash) => Ok(self.verifier.verify(secret, hash).await),
            None => {
                let hash = self.unknown_hash().await?;
                let _ = self.verifier.verify(secret, hash).await;
                Ok(false)
            }
        }
    }

    /// Handle token request (POST /v1/oauth/tokens)
    ///
    /// `basic` carries HTTP Basic credentials when the caller sent them.
    ///
    /// # Errors
    /// Returns 400 for an unsupported grant type or unusable refresh token,
    /// 401 for failed authentication and 500 when tokens cannot be persisted
    pub async fn token(
        &self,
        basic: Option<Credentials>,
        request: TokenRequest,
    ) -> AppResult<TokenResponse> {
        debug!(grant_type = %request.grant_type, "Token request received");

        // Resolved before any store access
        let grant = request.grant_type.parse::<GrantType>().inspect_err(|_| {
            warn!(grant_type = %request.grant_type, "Rejected unsupported grant type");
        })?;
        debug!(grant_type = %grant, "Grant type validated");

        match grant {
            GrantType::Password => self.handle_password_grant(basic, &request).await,
            GrantType::ClientCredentials => {
                self.handle_client_credentials_grant(basic, &request).await
            }
            GrantType::RefreshToken => self.handle_refresh_token_grant(&request).await,
        }
    }

    /// Handle resource owner password credentials grant
    async fn handle_password_grant(
        &self,
        basic: Option<Credentials>,
        request: &TokenRequest,
    ) -> AppResult<TokenResponse> {
        let credentials = Credentials::resolve(
            basic,
            request.username.as_deref(),
            request.password.as_deref(),
        );

        let user = self
            .store
            .get_user_by_username(&credentials.identifier)
            .await?;

        let authenticated = self
            .authenticate(
                &credentials.secret,
                user.as_ref().map(|user| user.password.as_str()),
            )
            .await?;

        match user {
            Some(user) if authenticated => {
                info!(user_id = user.id, "User authenticated");
                self.issuer.issue(TokenOwner::User(user.id), None).await
            }
            _ => {
                warn!(username = %credentials.identifier, "Password grant authentication failed");
                Err(AppError::unauthorized())
            }
        }
    }

    /// Handle client credentials grant
    async fn handle_client_credentials_grant(
        &self,
        basic: Option<Credentials>,
        request: &TokenRequest,
    ) -> AppResult<TokenResponse> {
        let credentials = Credentials::resolve(
            basic,
            request.client_id.as_deref(),
            request.client_secret.as_deref(),
        );

        let client = self
            .store
            .get_client_by_client_id(&credentials.identifier)
            .await?;

        let authenticated = self
            .authenticate(
                &credentials.secret,
                client.as_ref().map(|client| client.password.as_str()),
            )
            .await?;

        match client {
            Some(client) if authenticated => {
                info!(client_id = %client.client_id, "Client authenticated");
                self.issuer.issue(TokenOwner::Client(client.id), None).await
            }
            _ => {
                warn!(client_id = %credentials.identifier, "Client credentials authentication failed");
                Err(AppError::unauthorized())
            }
        }
    }

    /// Handle refresh token grant with rotation
    async fn handle_refresh_token_grant(&self, request: &TokenRequest) -> AppResult<TokenResponse> {
        let presented = request.refresh_token.as_deref().unwrap_or_default();

        let refresh_token = self
            .store
            .get_refresh_token(presented)
            .await?
            .ok_or_else(|| {
                debug!("Presented refresh token is unknown");
                AppError::invalid_grant(error_messages::REFRESH_TOKEN_NOT_FOUND)
            })?;

        if refresh_token.is_expired_at(Utc::now()) {
            debug!(refresh_token_id = refresh_token.id, "Presented refresh token has expired");
            return Err(AppError::invalid_grant(error_messages::REFRESH_TOKEN_EXPIRED));
        }

        let owner = self
            .store
            .get_access_token_by_refresh_token(refresh_token.id)
            .await?
            .and_then(|access_token| access_token.owner())
            .ok_or_else(|| AppError::invalid_grant(error_messages::ACCESS_TOKEN_NOT_FOUND))?;

        info!(owner = ?owner, refresh_token_id = refresh_token.id, "Refresh token accepted");
        self.issuer.issue(owner, Some(refresh_token.id)).await
    }
}
