// ABOUTME: OAuth 2.0 token server issuing opaque bearer tokens
// ABOUTME: Supports the password, client credentials and refresh token grants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Secret hashing and verification
pub mod credentials;
/// Token endpoint and grant flows
pub mod endpoints;
/// Token pair issuance
pub mod issuer;
/// Request and response types
pub mod models;

pub use credentials::{hash_secret, BcryptVerifier, PasswordVerifier};
pub use endpoints::TokenEndpoint;
pub use issuer::TokenIssuer;
pub use models::{Credentials, GrantType, TokenRequest, TokenResponse};
