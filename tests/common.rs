// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory databases, seeded identities and fully wired routers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `oauth2_token_server`

use anyhow::Result;
use oauth2_token_server::{
    config::{DatabaseUrl, Environment, ServerConfig, TokenLifetimes},
    database::{CredentialStore, Database},
    oauth2_server::{hash_secret, BcryptVerifier},
    resources::ServerResources,
    routes,
};
use std::sync::{Arc, Once};

static INIT_LOGGER: Once = Once::new();

/// Access token lifetime used by test configurations
pub const TEST_ACCESS_LIFETIME: i64 = 3600;
/// Refresh token lifetime used by test configurations
pub const TEST_REFRESH_LIFETIME: i64 = 1_209_600;
/// Lowest bcrypt cost, keeps hashing fast in tests
pub const TEST_BCRYPT_COST: u32 = 4;

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard test database setup
pub async fn create_test_database() -> Result<Arc<Database>> {
    init_test_logging();
    Ok(Arc::new(Database::new("sqlite::memory:").await?))
}

/// Configuration matching the in-memory test database
pub fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        host: "127.0.0.1".into(),
        database_url: DatabaseUrl::Memory,
        token_lifetimes: TokenLifetimes::new(TEST_ACCESS_LIFETIME, TEST_REFRESH_LIFETIME)
            .expect("test lifetimes are positive"),
        bcrypt_cost: TEST_BCRYPT_COST,
        environment: Environment::Testing,
    }
}

/// Wire resources over any store
pub fn create_test_resources(store: Arc<dyn CredentialStore>) -> Arc<ServerResources> {
    Arc::new(ServerResources::new(
        store,
        Arc::new(BcryptVerifier),
        &test_config(),
    ))
}

/// Full application router over the given database
pub fn create_test_router(database: &Arc<Database>) -> axum::Router {
    let store: Arc<dyn CredentialStore> = database.clone();
    routes::router(&create_test_resources(store))
}

/// Create a user with a bcrypt-hashed password
pub async fn create_test_user(database: &Database, username: &str, password: &str) -> Result<i64> {
    let hash = hash_secret(password, TEST_BCRYPT_COST).await?;
    Ok(database.create_user(username, &hash).await?)
}

/// Create a client with a bcrypt-hashed secret
pub async fn create_test_client(database: &Database, client_id: &str, secret: &str) -> Result<i64> {
    let hash = hash_secret(secret, TEST_BCRYPT_COST).await?;
    Ok(database.create_client(client_id, &hash).await?)
}

/// Seed the standard fixtures: user alice, client svc-a, default scopes read and write
pub async fn seed_standard_fixtures(database: &Database) -> Result<()> {
    create_test_user(database, "alice", "correct horse").await?;
    create_test_client(database, "svc-a", "s3cr3t").await?;
    database.create_scope("write", true).await?;
    database.create_scope("read", true).await?;
    database.create_scope("admin", false).await?;
    Ok(())
}

/// Count rows in a table
pub async fn count_rows(database: &Database, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(database.pool())
        .await
        .expect("Failed to count rows")
}
