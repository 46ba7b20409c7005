// ABOUTME: OAuth client database operations
// ABOUTME: Client lookup for the client credentials grant and client registration for administrators
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{insert_error, query_error, Database};
use crate::errors::AppResult;
use crate::models::Client;

impl Database {
    /// Look up a client by its public identifier
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_client_by_client_id(&self, client_id: &str) -> AppResult<Option<Client>> {
        sqlx::query_as::<_, Client>(
            "SELECT id, client_id, password FROM clients WHERE client_id = ?1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error(e, "client"))
    }

    /// Register a client with an already-hashed secret
    ///
    /// # Errors
    ///
    /// Returns an error if the client id is taken or the insert fails
    pub async fn create_client(&self, client_id: &str, secret_hash: &str) -> AppResult<i64> {
        let result = sqlx::query("INSERT INTO clients (client_id, password) VALUES (?1, ?2)")
            .bind(client_id)
            .bind(secret_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(e, "Client"))?;

        Ok(result.last_insert_rowid())
    }
}
