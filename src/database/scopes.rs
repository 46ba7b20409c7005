// ABOUTME: Scope database operations
// ABOUTME: Scope registration and the default scope set attached to newly issued access tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{insert_error, Database};
use crate::errors::AppResult;
use crate::models::Scope;

const SELECT_DEFAULT_SCOPES: &str =
    "SELECT id, scope, is_default FROM scopes WHERE is_default = 1 ORDER BY scope";

impl Database {
    /// Register a scope
    ///
    /// # Errors
    ///
    /// Returns an error if the scope already exists or the insert fails
    pub async fn create_scope(&self, scope: &str, is_default: bool) -> AppResult<i64> {
        let result = sqlx::query("INSERT INTO scopes (scope, is_default) VALUES (?1, ?2)")
            .bind(scope)
            .bind(is_default)
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(e, "Scope"))?;

        Ok(result.last_insert_rowid())
    }
}

/// Default scopes read through an open transaction
pub(super) async fn default_scopes_in(
    conn: &mut sqlx::SqliteConnection,
) -> Result<Vec<Scope>, sqlx::Error> {
    sqlx::query_as::<_, Scope>(SELECT_DEFAULT_SCOPES)
        .fetch_all(conn)
        .await
}
