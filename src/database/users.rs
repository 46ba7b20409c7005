// ABOUTME: User account database operations
// ABOUTME: Resource-owner lookup for the password grant and account creation for administrators
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{insert_error, query_error, Database};
use crate::errors::AppResult;
use crate::models::User;

impl Database {
    /// Look up a user by exact username
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, username, password FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error(e, "user"))
    }

    /// Create a user with an already-hashed password
    ///
    /// # Errors
    ///
    /// Returns an error if the username is taken or the insert fails
    pub async fn create_user(&self, username: &str, password_hash: &str) -> AppResult<i64> {
        let result = sqlx::query("INSERT INTO users (username, password) VALUES (?1, ?2)")
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(e, "User"))?;

        Ok(result.last_insert_rowid())
    }
}
