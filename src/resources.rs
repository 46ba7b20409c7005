// ABOUTME: Shared server resources injected into every request handler
// ABOUTME: Holds the credential store and the token endpoint wired to it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::config::ServerConfig;
use crate::database::CredentialStore;
use crate::oauth2_server::{PasswordVerifier, TokenEndpoint};
use std::sync::Arc;

/// Immutable state shared by all handlers
///
/// Built once at startup and wrapped in `Arc`; nothing here is constructed per request.
#[derive(Clone)]
pub struct ServerResources {
    /// Credential and token storage
    pub store: Arc<dyn CredentialStore>,
    /// Token endpoint wired to the store above
    pub token_endpoint: TokenEndpoint,
}

impl ServerResources {
    /// Wire resources together from configuration
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        verifier: Arc<dyn PasswordVerifier>,
        config: &ServerConfig,
    ) -> Self {
        let token_endpoint = TokenEndpoint::new(
            Arc::clone(&store),
            verifier,
            config.token_lifetimes,
            config.bcrypt_cost,
        );
        Self {
            store,
            token_endpoint,
        }
    }
}
