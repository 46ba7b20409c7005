// ABOUTME: Refresh and access token database operations
// ABOUTME: Token lookups and the transactional insert that creates both tokens of a pair or neither
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::scopes::default_scopes_in;
use super::transactions::SqliteTransactionGuard;
use super::{is_connection_error, query_error, Database, TokenPairError};
use crate::errors::AppResult;
use crate::models::{AccessToken, IssuedTokenPair, NewTokenPair, RefreshToken};
use sqlx::SqliteConnection;
use tracing::{debug, warn};

impl Database {
    /// Look up a refresh token by exact value
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_refresh_token(&self, token: &str) -> AppResult<Option<RefreshToken>> {
        sqlx::query_as::<_, RefreshToken>(
            "SELECT id, refresh_token, expires_at FROM refresh_tokens WHERE refresh_token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error(e, "refresh token"))
    }

    /// Look up the access token issued together with a refresh token
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_access_token_by_refresh_token(
        &self,
        refresh_token_id: i64,
    ) -> AppResult<Option<AccessToken>> {
        sqlx::query_as::<_, AccessToken>(
            r"
            SELECT id, access_token, expires_at, client_id, user_id, refresh_token_id
            FROM access_tokens
            WHERE refresh_token_id = ?1
            ",
        )
        .bind(refresh_token_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error(e, "access token"))
    }

    /// Names of the scopes linked to an access token, ordered by name
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_access_token_scopes(&self, access_token_id: i64) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r"
            SELECT s.scope
            FROM access_token_scopes ats
            JOIN scopes s ON s.id = ats.scope_id
            WHERE ats.access_token_id = ?1
            ORDER BY s.scope
            ",
        )
        .bind(access_token_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error(e, "access token scopes"))
    }

    /// Persist a refresh token, its access token and the default scope links in one transaction
    ///
    /// When `pair.supersedes` is set the replaced refresh token and its access
    /// token are deleted inside the same transaction.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenPairError`] naming the failed step; nothing is persisted in that case
    pub async fn create_token_pair(
        &self,
        pair: &NewTokenPair,
    ) -> Result<IssuedTokenPair, TokenPairError> {
        let tx = self.pool.begin().await.map_err(|e| {
            if is_connection_error(&e) {
                TokenPairError::Unavailable(Box::new(e))
            } else {
                TokenPairError::RefreshToken(Box::new(e))
            }
        })?;
        let mut guard = SqliteTransactionGuard::new(tx);

        let outcome = match guard.executor() {
            Ok(conn) => insert_pair(conn, pair).await,
            Err(e) => Err(TokenPairError::RefreshToken(Box::new(e))),
        };

        match outcome {
            Ok(issued) => {
                guard
                    .commit()
                    .await
                    .map_err(|e| TokenPairError::Commit(Box::new(e)))?;
                debug!(
                    refresh_token_id = issued.refresh_token_id,
                    access_token_id = issued.access_token_id,
                    scopes = issued.scopes.len(),
                    "Token pair committed"
                );
                Ok(issued)
            }
            Err(error) => {
                if let Err(rollback_error) = guard.rollback().await {
                    warn!(error = %rollback_error, "Token pair rollback failed");
                }
                Err(error)
            }
        }
    }
}

async fn insert_pair(
    conn: &mut SqliteConnection,
    pair: &NewTokenPair,
) -> Result<IssuedTokenPair, TokenPairError> {
    if let Some(superseded) = pair.supersedes {
        delete_superseded(conn, superseded).await?;
    }

    let refresh_token_id = sqlx::query(
        "INSERT INTO refresh_tokens (refresh_token, expires_at) VALUES (?1, ?2)",
    )
    .bind(&pair.refresh_token)
    .bind(pair.refresh_expires_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| TokenPairError::RefreshToken(Box::new(e)))?
    .last_insert_rowid();

    let access_err = |e: sqlx::Error| TokenPairError::AccessToken(Box::new(e));

    let scopes = default_scopes_in(conn).await.map_err(access_err)?;

    let access_token_id = sqlx::query(
        r"
        INSERT INTO access_tokens (access_token, expires_at, client_id, user_id, refresh_token_id)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ",
    )
    .bind(&pair.access_token)
    .bind(pair.access_expires_at)
    .bind(pair.owner.client_id())
    .bind(pair.owner.user_id())
    .bind(refresh_token_id)
    .execute(&mut *conn)
    .await
    .map_err(access_err)?
    .last_insert_rowid();

    for scope in &scopes {
        sqlx::query("INSERT INTO access_token_scopes (access_token_id, scope_id) VALUES (?1, ?2)")
            .bind(access_token_id)
            .bind(scope.id)
            .execute(&mut *conn)
            .await
            .map_err(access_err)?;
    }

    Ok(IssuedTokenPair {
        access_token_id,
        refresh_token_id,
        scopes,
    })
}

/// Remove a rotated refresh token and everything issued with it
async fn delete_superseded(
    conn: &mut SqliteConnection,
    refresh_token_id: i64,
) -> Result<(), TokenPairError> {
    let refresh_err = |e: sqlx::Error| TokenPairError::RefreshToken(Box::new(e));

    sqlx::query(
        r"
        DELETE FROM access_token_scopes
        WHERE access_token_id IN (SELECT id FROM access_tokens WHERE refresh_token_id = ?1)
        ",
    )
    .bind(refresh_token_id)
    .execute(&mut *conn)
    .await
    .map_err(refresh_err)?;

    sqlx::query("DELETE FROM access_tokens WHERE refresh_token_id = ?1")
        .bind(refresh_token_id)
        .execute(&mut *conn)
        .await
        .map_err(refresh_err)?;

    let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE id = ?1")
        .bind(refresh_token_id)
        .execute(&mut *conn)
        .await
        .map_err(refresh_err)?
        .rows_affected();

    // A concurrent exchange of the same token got here first
    if deleted == 0 {
        return Err(TokenPairError::Superseded(refresh_token_id));
    }
    Ok(())
}
