// ABOUTME: Credential store abstraction and its SQLite implementation
// ABOUTME: Owns the connection pool, schema migrations and the store trait injected into the token endpoint
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Database Management
//!
//! The token endpoint talks to storage only through [`CredentialStore`]. The
//! production implementation is [`Database`], a `SQLite` pool managed by `SQLx`.

mod clients;
mod scopes;
mod tokens;
/// RAII transaction guard
pub mod transactions;
mod users;

use crate::config::DatabaseUrl;
use crate::constants::defaults;
use crate::errors::{AppError, AppResult};
use crate::models::{AccessToken, Client, IssuedTokenPair, NewTokenPair, RefreshToken, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

/// Boxed error carried by [`TokenPairError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure while persisting a token pair, tagged with the step that failed
///
/// Every variant implies the transaction was rolled back: neither token row exists.
#[derive(Debug, Error)]
pub enum TokenPairError {
    /// The transaction could not be started
    #[error("store unavailable: {0}")]
    Unavailable(#[source] BoxError),
    /// Inserting the refresh token (or removing the one it replaces) failed
    #[error("failed to persist refresh token: {0}")]
    RefreshToken(#[source] BoxError),
    /// Inserting the access token or its scope links failed
    #[error("failed to persist access token: {0}")]
    AccessToken(#[source] BoxError),
    /// The commit itself failed
    #[error("failed to commit token pair: {0}")]
    Commit(#[source] BoxError),
    /// The refresh token being replaced no longer exists
    #[error("refresh token {0} was already superseded")]
    Superseded(i64),
}

/// Storage capabilities required by the token endpoint
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a user by exact username
    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Look up a client by its public `client_id`
    async fn get_client_by_client_id(&self, client_id: &str) -> AppResult<Option<Client>>;

    /// Look up a refresh token by exact token value
    async fn get_refresh_token(&self, token: &str) -> AppResult<Option<RefreshToken>>;

    /// Look up the access token created alongside a refresh token
    async fn get_access_token_by_refresh_token(
        &self,
        refresh_token_id: i64,
    ) -> AppResult<Option<AccessToken>>;

    /// Atomically persist a refresh/access token pair with the default scopes
    async fn create_token_pair(
        &self,
        pair: &NewTokenPair,
    ) -> Result<IssuedTokenPair, TokenPairError>;

    /// Verify the store is reachable
    async fn health_check(&self) -> AppResult<()>;
}

/// `SQLite`-backed credential store
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a connection pool and run migrations
    ///
    /// # Errors
    /// Returns an error if the URL is invalid, the database cannot be opened, or migrations fail
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every in-memory connection is its own database, so keep exactly one alive forever
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(defaults::MAX_DB_CONNECTIONS)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to {database_url}"))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open the database described by configuration, creating parent directories as needed
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the database cannot be opened
    pub async fn from_url(url: &DatabaseUrl) -> Result<Self> {
        if let DatabaseUrl::SQLite { path } = url {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        Self::new(&url.to_connection_string()).await
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    /// Returns an error if any schema statement fails
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_identities().await?;
        self.migrate_scopes().await?;
        self.migrate_tokens().await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Create `users` and `clients` tables
    async fn migrate_identities(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create `scopes` table
    async fn migrate_scopes(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS scopes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scope TEXT NOT NULL UNIQUE,
                is_default BOOLEAN NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_scopes_default ON scopes(is_default)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Create token tables
    async fn migrate_tokens(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS refresh_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                refresh_token TEXT NOT NULL UNIQUE,
                expires_at DATETIME NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Owner is client XOR user; each refresh token backs at most one access token
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS access_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                access_token TEXT NOT NULL UNIQUE,
                expires_at DATETIME NOT NULL,
                client_id INTEGER REFERENCES clients(id) ON DELETE CASCADE,
                user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                refresh_token_id INTEGER NOT NULL UNIQUE
                    REFERENCES refresh_tokens(id) ON DELETE CASCADE,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                CHECK ((client_id IS NULL) <> (user_id IS NULL))
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS access_token_scopes (
                access_token_id INTEGER NOT NULL REFERENCES access_tokens(id) ON DELETE CASCADE,
                scope_id INTEGER NOT NULL REFERENCES scopes(id) ON DELETE CASCADE,
                PRIMARY KEY (access_token_id, scope_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_access_tokens_client ON access_tokens(client_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_access_tokens_user ON access_tokens(user_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl CredentialStore for Database {
    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        self.get_user_by_username(username).await
    }

    async fn get_client_by_client_id(&self, client_id: &str) -> AppResult<Option<Client>> {
        self.get_client_by_client_id(client_id).await
    }

    async fn get_refresh_token(&self, token: &str) -> AppResult<Option<RefreshToken>> {
        self.get_refresh_token(token).await
    }

    async fn get_access_token_by_refresh_token(
        &self,
        refresh_token_id: i64,
    ) -> AppResult<Option<AccessToken>> {
        self.get_access_token_by_refresh_token(refresh_token_id)
            .await
    }

    async fn create_token_pair(
        &self,
        pair: &NewTokenPair,
    ) -> Result<IssuedTokenPair, TokenPairError> {
        self.create_token_pair(pair).await
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| query_error(e, "health check"))?;
        Ok(())
    }
}

/// Whether an `SQLx` error means the store could not be reached at all
pub(crate) fn is_connection_error(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
    )
}

/// Map an `SQLx` error from a read query into an [`AppError`]
pub(crate) fn query_error(error: sqlx::Error, what: &str) -> AppError {
    if is_connection_error(&error) {
        AppError::database_unavailable().with_source(error)
    } else {
        AppError::database(format!("Failed to query {what}")).with_source(error)
    }
}

/// Map an `SQLx` error from an administrative insert into an [`AppError`]
pub(crate) fn insert_error(error: sqlx::Error, what: &str) -> AppError {
    let duplicate = error
        .as_database_error()
        .is_some_and(|db_error| db_error.is_unique_violation());
    if duplicate {
        AppError::invalid_input(format!("{what} already exists")).with_source(error)
    } else {
        query_error(error, what)
    }
}
