// ABOUTME: Persistent data model for users, clients, scopes and issued tokens
// ABOUTME: Maps database rows to typed records and models token ownership as an explicit enum
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Data Models
//!
//! Row types read by the credential store. Identities (`User`, `Client`) are
//! never mutated by the token endpoint; tokens are only ever inserted or
//! superseded as a pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Resource owner able to use the password grant
#[derive(Debug, Clone, FromRow)]
pub struct User {
    /// Row id
    pub id: i64,
    /// Unique login name
    pub username: String,
    /// bcrypt hash of the user's password
    pub password: String,
}

/// Confidential client able to use the client credentials grant
#[derive(Debug, Clone, FromRow)]
pub struct Client {
    /// Row id
    pub id: i64,
    /// Public client identifier
    pub client_id: String,
    /// bcrypt hash of the client secret
    pub password: String,
}

/// Named permission attached to access tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Scope {
    /// Row id
    pub id: i64,
    /// Scope name as presented to clients
    pub scope: String,
    /// Granted automatically when no scope is requested
    pub is_default: bool,
}

/// Stored refresh token
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    /// Row id
    pub id: i64,
    /// Opaque token value
    pub refresh_token: String,
    /// Moment after which the token can no longer be exchanged
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Whether the token has expired at `now`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Stored access token
#[derive(Debug, Clone, FromRow)]
pub struct AccessToken {
    /// Row id
    pub id: i64,
    /// Opaque token value
    pub access_token: String,
    /// Moment after which the token is no longer valid
    pub expires_at: DateTime<Utc>,
    /// Owning client, for client credentials tokens
    pub client_id: Option<i64>,
    /// Owning user, for password tokens
    pub user_id: Option<i64>,
    /// Refresh token created in the same transaction
    pub refresh_token_id: i64,
}

impl AccessToken {
    /// Resolve the owner recorded on this token
    ///
    /// Returns `None` if the row carries both or neither owner column.
    #[must_use]
    pub fn owner(&self) -> Option<TokenOwner> {
        TokenOwner::from_columns(self.client_id, self.user_id)
    }
}

/// Principal an access token is issued to
///
/// Exactly one of client or user owns a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenOwner {
    /// Issued through the client credentials grant
    Client(i64),
    /// Issued through the password grant
    User(i64),
}

impl TokenOwner {
    /// Build an owner from the nullable `(client_id, user_id)` column pair
    #[must_use]
    pub const fn from_columns(client_id: Option<i64>, user_id: Option<i64>) -> Option<Self> {
        match (client_id, user_id) {
            (Some(id), None) => Some(Self::Client(id)),
            (None, Some(id)) => Some(Self::User(id)),
            _ => None,
        }
    }

    /// Value for the `client_id` column
    #[must_use]
    pub const fn client_id(self) -> Option<i64> {
        match self {
            Self::Client(id) => Some(id),
            Self::User(_) => None,
        }
    }

    /// Value for the `user_id` column
    #[must_use]
    pub const fn user_id(self) -> Option<i64> {
        match self {
            Self::User(id) => Some(id),
            Self::Client(_) => None,
        }
    }
}

/// Everything needed to persist one token pair
#[derive(Debug, Clone)]
pub struct NewTokenPair {
    /// Opaque refresh token value
    pub refresh_token: String,
    /// Refresh token expiry
    pub refresh_expires_at: DateTime<Utc>,
    /// Opaque access token value
    pub access_token: String,
    /// Access token expiry
    pub access_expires_at: DateTime<Utc>,
    /// Owner of the new access token
    pub owner: TokenOwner,
    /// Refresh token row replaced by this pair, deleted in the same transaction
    pub supersedes: Option<i64>,
}

/// Result of a committed token pair insert
#[derive(Debug, Clone)]
pub struct IssuedTokenPair {
    /// Row id of the new access token
    pub access_token_id: i64,
    /// Row id of the new refresh token
    pub refresh_token_id: i64,
    /// Scopes attached to the access token
    pub scopes: Vec<Scope>,
}
