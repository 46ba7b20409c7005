// ABOUTME: Unified error taxonomy for the token endpoint with HTTP status mapping
// ABOUTME: Renders every failure as the `{"Error": "<message>"}` JSON body with the right status code
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Unified Error Handling
//!
//! Every failure the token endpoint can produce is an [`AppError`] carrying an
//! [`ErrorCode`]. The code decides the HTTP status; the message is what the
//! client sees. Authentication failures additionally carry the
//! `WWW-Authenticate` challenge header.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::constants::{error_messages, http_headers};

/// Standard error codes used by the token server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Authentication (1000-1999)
    #[serde(rename = "AUTH_INVALID")]
    AuthInvalid = 1001,

    // Validation (3000-3999)
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,
    #[serde(rename = "INVALID_GRANT_TYPE")]
    InvalidGrantType = 3004,
    #[serde(rename = "INVALID_GRANT")]
    InvalidGrant = 3005,

    // Internal Errors (9000-9999)
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError = 9001,
    #[serde(rename = "DATABASE_UNAVAILABLE")]
    DatabaseUnavailable = 9004,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            // 400 Bad Request
            Self::InvalidInput | Self::InvalidGrantType | Self::InvalidGrant => 400,

            // 401 Unauthorized
            Self::AuthInvalid => 401,

            // 500 Internal Server Error
            Self::InternalError | Self::DatabaseError | Self::DatabaseUnavailable => 500,
        }
    }

    /// Get a description of this error for logs
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::AuthInvalid => "The provided authentication credentials are invalid",
            Self::InvalidInput => "The provided input is invalid",
            Self::InvalidGrantType => "The requested grant type is not supported",
            Self::InvalidGrant => "The presented grant is unknown, expired or already used",
            Self::InternalError => "An internal server error occurred",
            Self::DatabaseError => "Database operation failed",
            Self::DatabaseUnavailable => "Database is unreachable",
        }
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Message returned to the client
    pub message: String,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Whether the response must carry the Basic authentication challenge
    #[must_use]
    pub fn requires_challenge(&self) -> bool {
        self.code == ErrorCode::AuthInvalid
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// HTTP error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Client-facing error message
    #[serde(rename = "Error")]
    pub error: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        Self {
            error: error.message.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(code = ?self.code, error = %self, source = ?self.source, "Request failed");
        } else {
            tracing::debug!(code = ?self.code, error = %self, "Request rejected");
        }

        let mut response = (status, Json(ErrorResponse::from(&self))).into_response();
        if self.requires_challenge() {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(http_headers::BASIC_BEARER_CHALLENGE),
            );
        }
        response
    }
}

/// Convenience functions for creating common errors
impl AppError {
    /// Unsupported or missing `grant_type`
    #[must_use]
    pub fn invalid_grant_type() -> Self {
        Self::new(ErrorCode::InvalidGrantType, error_messages::INVALID_GRANT_TYPE)
    }

    /// Uniform authentication failure
    ///
    /// Deliberately carries no detail about which check failed so that
    /// callers cannot enumerate usernames or client ids.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::AuthInvalid, error_messages::UNAUTHORIZED)
    }

    /// Grant presented by the client could not be honoured
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidGrant, message)
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// The store could not be reached
    #[must_use]
    pub fn database_unavailable() -> Self {
        Self::new(
            ErrorCode::DatabaseUnavailable,
            error_messages::DATABASE_CONNECTION,
        )
    }
}
