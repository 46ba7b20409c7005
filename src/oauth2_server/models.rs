// ABOUTME: OAuth 2.0 token endpoint request and response types
// ABOUTME: Form-encoded token request, JSON token response, grant type parsing and presented credentials
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::oauth;
use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OAuth 2.0 Token Request (`application/x-www-form-urlencoded`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// Grant type (`password`, `client_credentials`, `refresh_token`)
    #[serde(default)]
    pub grant_type: String,
    /// Resource owner username, when not sent via Basic auth
    pub username: Option<String>,
    /// Resource owner password, when not sent via Basic auth
    pub password: Option<String>,
    /// Client identifier, when not sent via Basic auth
    pub client_id: Option<String>,
    /// Client secret, when not sent via Basic auth
    pub client_secret: Option<String>,
    /// Refresh token (for `refresh_token` grant)
    pub refresh_token: Option<String>,
    /// Requested scope; ignored, default scopes are always granted
    pub scope: Option<String>,
}

/// OAuth 2.0 Token Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Row id of the access token
    pub id: i64,
    /// Opaque access token
    pub access_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Space separated granted scopes
    pub scope: String,
    /// Opaque refresh token
    pub refresh_token: String,
}

/// Supported grant types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    /// Resource owner password credentials
    Password,
    /// Client credentials
    ClientCredentials,
    /// Refresh token exchange
    RefreshToken,
}

impl GrantType {
    /// Wire name of the grant
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Password => oauth::GRANT_PASSWORD,
            Self::ClientCredentials => oauth::GRANT_CLIENT_CREDENTIALS,
            Self::RefreshToken => oauth::GRANT_REFRESH_TOKEN,
        }
    }
}

impl FromStr for GrantType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            oauth::GRANT_PASSWORD => Ok(Self::Password),
            oauth::GRANT_CLIENT_CREDENTIALS => Ok(Self::ClientCredentials),
            oauth::GRANT_REFRESH_TOKEN => Ok(Self::RefreshToken),
            _ => Err(AppError::invalid_grant_type()),
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier/secret pair presented by the caller
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Username or client id
    pub identifier: String,
    /// Password or client secret
    pub secret: String,
}

impl Credentials {
    /// Create a credential pair
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    /// Basic auth wins when present; otherwise fall back to the form fields
    #[must_use]
    pub fn resolve(basic: Option<Self>, identifier: Option<&str>, secret: Option<&str>) -> Self {
        basic.unwrap_or_else(|| {
            Self::new(identifier.unwrap_or_default(), secret.unwrap_or_default())
        })
    }
}

// Keep secrets out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
