// ABOUTME: System-wide constants for the token server
// ABOUTME: Grant identifiers, client-facing error messages, header values and configuration defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Constants Module
//!
//! Protocol strings and configuration defaults. Client-facing error messages
//! live here so that the uniform-failure responses cannot drift apart.

/// OAuth 2.0 protocol identifiers
pub mod oauth {
    /// `grant_type` value for the resource-owner password grant
    pub const GRANT_PASSWORD: &str = "password";

    /// `grant_type` value for the client credentials grant
    pub const GRANT_CLIENT_CREDENTIALS: &str = "client_credentials";

    /// `grant_type` value for the refresh token grant
    pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";

    /// Token type returned with every issued access token
    pub const TOKEN_TYPE_BEARER: &str = "Bearer";

    /// Separator used when serializing scope lists
    pub const SCOPE_SEPARATOR: &str = " ";

    /// Secret hashed once at the configured bcrypt cost and verified against
    /// when the presented username or client id is unknown
    pub const UNKNOWN_PRINCIPAL_SECRET: &str = "unknown-principal-placeholder";
}

/// HTTP header values
pub mod http_headers {
    /// `WWW-Authenticate` challenge sent with every authentication failure
    pub const BASIC_BEARER_CHALLENGE: &str = "Basic realm=Bearer";
}

/// Client-facing error messages
pub mod error_messages {
    /// Unsupported or missing `grant_type`
    pub const INVALID_GRANT_TYPE: &str = "Invalid grant type";

    /// Uniform authentication failure
    pub const UNAUTHORIZED: &str = "Unauthorized";

    /// Store could not be reached
    pub const DATABASE_CONNECTION: &str = "Error connecting to database";

    /// Refresh token row could not be inserted
    pub const SAVE_REFRESH_TOKEN: &str = "Error saving refresh token";

    /// Access token row (or its scopes) could not be inserted
    pub const SAVE_ACCESS_TOKEN: &str = "Error saving access token";

    /// Presented refresh token is unknown or already rotated
    pub const REFRESH_TOKEN_NOT_FOUND: &str = "Refresh token not found";

    /// Presented refresh token is past its expiry
    pub const REFRESH_TOKEN_EXPIRED: &str = "Refresh token expired";

    /// Refresh token has no access token attached
    pub const ACCESS_TOKEN_NOT_FOUND: &str = "Access token with refresh token not found";
}

/// Default values for configuration
pub mod defaults {
    /// Default HTTP port
    pub const HTTP_PORT: u16 = 8080;

    /// Default bind address
    pub const HOST: &str = "0.0.0.0";

    /// Default database location
    pub const DATABASE_URL: &str = "sqlite:./data/oauth2_tokens.db";

    /// Maximum pooled connections for file-backed databases
    pub const MAX_DB_CONNECTIONS: u32 = 10;

    /// Upper bound for configured token lifetimes (ten years)
    pub const MAX_TOKEN_LIFETIME_SECS: i64 = 315_360_000;
}

/// Environment variable names
pub mod env_vars {
    /// HTTP port override
    pub const HTTP_PORT: &str = "HTTP_PORT";
    /// Bind address
    pub const HOST: &str = "HOST";
    /// Database connection string
    pub const DATABASE_URL: &str = "DATABASE_URL";
    /// Access token lifetime in seconds
    pub const ACCESS_TOKEN_LIFETIME: &str = "ACCESS_TOKEN_LIFETIME";
    /// Refresh token lifetime in seconds
    pub const REFRESH_TOKEN_LIFETIME: &str = "REFRESH_TOKEN_LIFETIME";
    /// bcrypt work factor used when hashing new secrets
    pub const BCRYPT_COST: &str = "BCRYPT_COST";
    /// Deployment environment
    pub const ENVIRONMENT: &str = "ENVIRONMENT";
}

/// Service identifiers used in structured logs
pub mod service_names {
    /// Token server service name
    pub const OAUTH2_TOKEN_SERVER: &str = "oauth2-token-server";
}
