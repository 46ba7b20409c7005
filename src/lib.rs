// ABOUTME: Main library entry point for the OAuth 2.0 token server
// ABOUTME: Issues opaque bearer access and refresh token pairs over a form-encoded HTTP endpoint
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # OAuth2 Token Server
//!
//! An OAuth 2.0 token endpoint supporting three grants:
//!
//! - **`password`**: a user exchanges username and password for a token pair
//! - **`client_credentials`**: a confidential client exchanges its id and secret
//! - **`refresh_token`**: a refresh token is exchanged for a new pair, revoking the old one
//!
//! Every issued pair consists of an access token and a refresh token created in
//! one database transaction, so either both exist or neither does. Newly issued
//! access tokens carry the default scopes.
//!
//! ## Architecture
//!
//! - **Routes**: axum handlers that extract the form body and Basic credentials
//! - **`OAuth2` server**: grant dispatch, the three flows and the token issuer
//! - **Database**: the [`database::CredentialStore`] trait and its `SQLite` implementation
//! - **Config / logging**: environment-driven settings and `tracing` setup

/// Environment-driven configuration
pub mod config;

/// Protocol strings, client-facing messages and defaults
pub mod constants;

/// Credential store trait and `SQLite` implementation
pub mod database;

/// Unified error handling with HTTP status mapping
pub mod errors;

/// Structured logging setup
pub mod logging;

/// Persistent data model
pub mod models;

/// Token endpoint, grant flows and token issuance
pub mod oauth2_server;

/// Shared request handler state
pub mod resources;

/// HTTP routes
pub mod routes;
