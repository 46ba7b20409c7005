// ABOUTME: Integration tests for the OAuth 2.0 token endpoint over HTTP
// ABOUTME: Covers grant dispatch, uniform authentication failures, issuance atomicity and refresh rotation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{
    count_rows, create_test_database, create_test_resources, create_test_router,
    seed_standard_fixtures, test_config, TEST_ACCESS_LIFETIME, TEST_BCRYPT_COST,
};
use helpers::axum_test::AxumTestRequest;
use oauth2_token_server::{
    database::{CredentialStore, Database, TokenPairError},
    errors::{AppResult, ErrorCode},
    models::{AccessToken, Client, IssuedTokenPair, NewTokenPair, RefreshToken, TokenOwner, User},
    oauth2_server::{BcryptVerifier, PasswordVerifier, TokenEndpoint, TokenRequest, TokenResponse},
    routes,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const TOKEN_URL: &str = "/v1/oauth/tokens";

// ============================================================================
// Test Helpers
// ============================================================================

async fn setup() -> (Arc<Database>, axum::Router) {
    let database = create_test_database().await.unwrap();
    seed_standard_fixtures(&database).await.unwrap();
    let router = create_test_router(&database);
    (database, router)
}

async fn password_grant(router: axum::Router, username: &str, password: &str) -> TokenResponse {
    AxumTestRequest::post(TOKEN_URL)
        .form(&[
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
        ])
        .send(router)
        .await
        .assert_status(StatusCode::OK)
        .json()
}

async fn refresh_grant(router: axum::Router, refresh_token: &str) -> helpers::axum_test::AxumTestResponse {
    AxumTestRequest::post(TOKEN_URL)
        .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
        .send(router)
        .await
}

async fn owner_of(database: &Database, refresh_token: &str) -> Option<TokenOwner> {
    let refresh = database.get_refresh_token(refresh_token).await.unwrap()?;
    database
        .get_access_token_by_refresh_token(refresh.id)
        .await
        .unwrap()?
        .owner()
}

/// Store wrapper counting every call that reaches storage
struct CountingStore {
    inner: Arc<Database>,
    calls: AtomicUsize,
}

impl CountingStore {
    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        self.hit();
        self.inner.get_user_by_username(username).await
    }

    async fn get_client_by_client_id(&self, client_id: &str) -> AppResult<Option<Client>> {
        self.hit();
        self.inner.get_client_by_client_id(client_id).await
    }

    async fn get_refresh_token(&self, token: &str) -> AppResult<Option<RefreshToken>> {
        self.hit();
        self.inner.get_refresh_token(token).await
    }

    async fn get_access_token_by_refresh_token(
        &self,
        refresh_token_id: i64,
    ) -> AppResult<Option<AccessToken>> {
        self.hit();
        self.inner
            .get_access_token_by_refresh_token(refresh_token_id)
            .await
    }

    async fn create_token_pair(
        &self,
        pair: &NewTokenPair,
    ) -> Result<IssuedTokenPair, TokenPairError> {
        self.hit();
        self.inner.create_token_pair(pair).await
    }

    async fn health_check(&self) -> AppResult<()> {
        self.hit();
        CredentialStore::health_check(self.inner.as_ref()).await
    }
}

/// Verifier wrapper recording every hash it is asked to check
#[derive(Default)]
struct CountingVerifier {
    hashes: Mutex<Vec<String>>,
}

impl CountingVerifier {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.hashes.lock().unwrap())
    }
}

#[async_trait]
impl PasswordVerifier for CountingVerifier {
    async fn verify(&self, secret: &str, hash: &str) -> bool {
        self.hashes.lock().unwrap().push(hash.to_owned());
        BcryptVerifier.verify(secret, hash).await
    }
}

// ============================================================================
// Grant Dispatch
// ============================================================================

#[tokio::test]
async fn test_unsupported_grant_types_rejected_without_store_access() {
    let database = create_test_database().await.unwrap();
    seed_standard_fixtures(&database).await.unwrap();
    let store = Arc::new(CountingStore {
        inner: database,
        calls: AtomicUsize::new(0),
    });
    let router = routes::router(&create_test_resources(store.clone()));

    for grant_type in ["", "authorization_code", "implicit", "PASSWORD"] {
        let response = AxumTestRequest::post(TOKEN_URL)
            .form(&[
                ("grant_type", grant_type),
                ("username", "alice"),
                ("password", "correct horse"),
            ])
            .send(router.clone())
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        assert!(response.header("www-authenticate").is_none());
        let body: Value = response.json();
        assert_eq!(body, json!({ "Error": "Invalid grant type" }), "{grant_type:?}");
    }

    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_grant_type_rejected() {
    let (_database, router) = setup().await;

    let body: Value = AxumTestRequest::post(TOKEN_URL)
        .form(&[("username", "alice")])
        .send(router.clone())
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();
    assert_eq!(body["Error"], "Invalid grant type");

    // No body at all
    let body: Value = AxumTestRequest::post(TOKEN_URL)
        .send(router)
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();
    assert_eq!(body["Error"], "Invalid grant type");
}

// ============================================================================
// Password Grant
// ============================================================================

#[tokio::test]
async fn test_password_grant_issues_token_pair() {
    let (database, router) = setup().await;

    let token = password_grant(router, "alice", "correct horse").await;

    assert!(!token.access_token.is_empty());
    assert!(!token.refresh_token.is_empty());
    assert_ne!(token.access_token, token.refresh_token);
    assert_eq!(token.token_type, "Bearer");
    assert_eq!(token.expires_in, TEST_ACCESS_LIFETIME);
    assert_eq!(token.scope, "read write");

    let alice = database.get_user_by_username("alice").await.unwrap().unwrap();
    assert_eq!(
        owner_of(&database, &token.refresh_token).await,
        Some(TokenOwner::User(alice.id))
    );

    let access = database
        .get_access_token_by_refresh_token(
            database
                .get_refresh_token(&token.refresh_token)
                .await
                .unwrap()
                .unwrap()
                .id,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(access.id, token.id);
    assert_eq!(access.access_token, token.access_token);
    assert_eq!(
        database.get_access_token_scopes(access.id).await.unwrap(),
        vec!["read", "write"]
    );
}

#[tokio::test]
async fn test_password_grant_failures_are_indistinguishable() {
    let (database, router) = setup().await;

    let unknown_user = AxumTestRequest::post(TOKEN_URL)
        .form(&[
            ("grant_type", "password"),
            ("username", "mallory"),
            ("password", "correct horse"),
        ])
        .send(router.clone())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    let wrong_password = AxumTestRequest::post(TOKEN_URL)
        .form(&[
            ("grant_type", "password"),
            ("username", "alice"),
            ("password", "battery staple"),
        ])
        .send(router)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    assert_eq!(unknown_user.header("www-authenticate"), Some("Basic realm=Bearer"));
    assert_eq!(
        unknown_user.header("www-authenticate"),
        wrong_password.header("www-authenticate")
    );
    assert_eq!(unknown_user.text(), wrong_password.text());

    assert_eq!(count_rows(&database, "refresh_tokens").await, 0);
    assert_eq!(count_rows(&database, "access_tokens").await, 0);
}

#[tokio::test]
async fn test_unknown_principals_cost_one_verification() {
    let database = create_test_database().await.unwrap();
    seed_standard_fixtures(&database).await.unwrap();
    let verifier = Arc::new(CountingVerifier::default());
    let endpoint = TokenEndpoint::new(
        database,
        verifier.clone(),
        test_config().token_lifetimes,
        TEST_BCRYPT_COST,
    );
    let cost_prefix = format!("$2b${TEST_BCRYPT_COST:02}$");

    let password_request = |username: &str| TokenRequest {
        grant_type: "password".into(),
        username: Some(username.into()),
        password: Some("battery staple".into()),
        ..TokenRequest::default()
    };
    let client_request = |client_id: &str| TokenRequest {
        grant_type: "client_credentials".into(),
        client_id: Some(client_id.into()),
        client_secret: Some("wrong".into()),
        ..TokenRequest::default()
    };

    for (unknown, known) in [
        (password_request("mallory"), password_request("alice")),
        (client_request("svc-unknown"), client_request("svc-a")),
    ] {
        let unknown_err = endpoint.token(None, unknown).await.unwrap_err();
        let unknown_hashes = verifier.take();
        assert_eq!(unknown_hashes.len(), 1);
        assert!(unknown_hashes[0].starts_with(&cost_prefix));

        let known_err = endpoint.token(None, known).await.unwrap_err();
        let known_hashes = verifier.take();
        assert_eq!(known_hashes.len(), 1);
        assert!(known_hashes[0].starts_with(&cost_prefix));

        assert_eq!(unknown_err.code, ErrorCode::AuthInvalid);
        assert_eq!(known_err.code, ErrorCode::AuthInvalid);
        assert_eq!(unknown_err.message, known_err.message);
    }

    // The placeholder hash is computed once and reused
    endpoint.warm_up().await.unwrap();
    endpoint
        .token(None, password_request("nobody"))
        .await
        .unwrap_err();
    let first = verifier.take();
    endpoint
        .token(None, client_request("nobody"))
        .await
        .unwrap_err();
    assert_eq!(first, verifier.take());
}

#[tokio::test]
async fn test_password_grant_is_not_idempotent() {
    let (database, router) = setup().await;

    let first = password_grant(router.clone(), "alice", "correct horse").await;
    let second = password_grant(router, "alice", "correct horse").await;

    assert_ne!(first.access_token, second.access_token);
    assert_ne!(first.refresh_token, second.refresh_token);
    assert_ne!(first.id, second.id);
    assert_eq!(count_rows(&database, "access_tokens").await, 2);
}

#[tokio::test]
async fn test_basic_auth_takes_precedence_over_form() {
    let (_database, router) = setup().await;

    AxumTestRequest::post(TOKEN_URL)
        .basic_auth("alice", "correct horse")
        .form(&[
            ("grant_type", "password"),
            ("username", "alice"),
            ("password", "wrong"),
        ])
        .send(router.clone())
        .await
        .assert_status(StatusCode::OK);

    AxumTestRequest::post(TOKEN_URL)
        .basic_auth("alice", "wrong")
        .form(&[
            ("grant_type", "password"),
            ("username", "alice"),
            ("password", "correct horse"),
        ])
        .send(router)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Client Credentials Grant
// ============================================================================

#[tokio::test]
async fn test_client_credentials_with_basic_auth() {
    let (database, router) = setup().await;

    let token: TokenResponse = AxumTestRequest::post(TOKEN_URL)
        .basic_auth("svc-a", "s3cr3t")
        .form(&[("grant_type", "client_credentials")])
        .send(router.clone())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(token.token_type, "Bearer");

    let client = database.get_client_by_client_id("svc-a").await.unwrap().unwrap();
    assert_eq!(
        owner_of(&database, &token.refresh_token).await,
        Some(TokenOwner::Client(client.id))
    );

    let rejected = AxumTestRequest::post(TOKEN_URL)
        .basic_auth("svc-a", "wrong")
        .form(&[("grant_type", "client_credentials")])
        .send(router)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(rejected.header("www-authenticate"), Some("Basic realm=Bearer"));
    let body: Value = rejected.json();
    assert_eq!(body, json!({ "Error": "Unauthorized" }));
}

#[tokio::test]
async fn test_client_credentials_with_form_fields() {
    let (_database, router) = setup().await;

    AxumTestRequest::post(TOKEN_URL)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", "svc-a"),
            ("client_secret", "s3cr3t"),
        ])
        .send(router.clone())
        .await
        .assert_status(StatusCode::OK);

    let unknown = AxumTestRequest::post(TOKEN_URL)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", "svc-b"),
            ("client_secret", "s3cr3t"),
        ])
        .send(router)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.header("www-authenticate"), Some("Basic realm=Bearer"));
}

// ============================================================================
// Refresh Token Grant
// ============================================================================

#[tokio::test]
async fn test_refresh_keeps_client_owner() {
    let (database, router) = setup().await;

    let original: TokenResponse = AxumTestRequest::post(TOKEN_URL)
        .basic_auth("svc-a", "s3cr3t")
        .form(&[("grant_type", "client_credentials")])
        .send(router.clone())
        .await
        .assert_status(StatusCode::OK)
        .json();

    let refreshed: TokenResponse = refresh_grant(router, &original.refresh_token)
        .await
        .assert_status(StatusCode::OK)
        .json();

    assert_ne!(refreshed.access_token, original.access_token);
    assert_ne!(refreshed.refresh_token, original.refresh_token);
    assert_eq!(refreshed.scope, "read write");

    let client = database.get_client_by_client_id("svc-a").await.unwrap().unwrap();
    assert_eq!(
        owner_of(&database, &refreshed.refresh_token).await,
        Some(TokenOwner::Client(client.id))
    );
}

#[tokio::test]
async fn test_rotated_refresh_token_cannot_be_reused() {
    let (database, router) = setup().await;

    let original = password_grant(router.clone(), "alice", "correct horse").await;
    refresh_grant(router.clone(), &original.refresh_token)
        .await
        .assert_status(StatusCode::OK);

    // Superseded pair is gone
    assert!(database
        .get_refresh_token(&original.refresh_token)
        .await
        .unwrap()
        .is_none());
    assert_eq!(count_rows(&database, "refresh_tokens").await, 1);
    assert_eq!(count_rows(&database, "access_tokens").await, 1);

    let body: Value = refresh_grant(router, &original.refresh_token)
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();
    assert_eq!(body, json!({ "Error": "Refresh token not found" }));
}

#[tokio::test]
async fn test_unknown_or_missing_refresh_token() {
    let (_database, router) = setup().await;

    let body: Value = refresh_grant(router.clone(), "not-a-token")
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();
    assert_eq!(body["Error"], "Refresh token not found");

    let body: Value = AxumTestRequest::post(TOKEN_URL)
        .form(&[("grant_type", "refresh_token")])
        .send(router)
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();
    assert_eq!(body["Error"], "Refresh token not found");
}

#[tokio::test]
async fn test_expired_refresh_token_rejected() {
    let (database, router) = setup().await;
    let original = password_grant(router.clone(), "alice", "correct horse").await;

    sqlx::query("UPDATE refresh_tokens SET expires_at = ?1 WHERE refresh_token = ?2")
        .bind(Utc::now() - Duration::seconds(10))
        .bind(&original.refresh_token)
        .execute(database.pool())
        .await
        .unwrap();

    let body: Value = refresh_grant(router, &original.refresh_token)
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();
    assert_eq!(body, json!({ "Error": "Refresh token expired" }));

    // Nothing rotated
    assert_eq!(count_rows(&database, "refresh_tokens").await, 1);
}

#[tokio::test]
async fn test_refresh_token_without_access_token_rejected() {
    let (database, router) = setup().await;

    sqlx::query("INSERT INTO refresh_tokens (refresh_token, expires_at) VALUES (?1, ?2)")
        .bind("orphan")
        .bind(Utc::now() + Duration::hours(1))
        .execute(database.pool())
        .await
        .unwrap();

    let body: Value = refresh_grant(router, "orphan")
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .json();
    assert_eq!(body["Error"], "Access token with refresh token not found");
}

// ============================================================================
// Issuance Atomicity
// ============================================================================

#[tokio::test]
async fn test_access_token_failure_leaves_no_refresh_token() {
    let (database, router) = setup().await;

    sqlx::query(
        r"
        CREATE TRIGGER fail_access_tokens BEFORE INSERT ON access_tokens
        BEGIN
            SELECT RAISE(ABORT, 'access token insert disabled');
        END
        ",
    )
    .execute(database.pool())
    .await
    .unwrap();

    let body: Value = AxumTestRequest::post(TOKEN_URL)
        .form(&[
            ("grant_type", "password"),
            ("username", "alice"),
            ("password", "correct horse"),
        ])
        .send(router)
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .json();
    assert_eq!(body, json!({ "Error": "Error saving access token" }));

    assert_eq!(count_rows(&database, "refresh_tokens").await, 0);
    assert_eq!(count_rows(&database, "access_tokens").await, 0);
    assert_eq!(count_rows(&database, "access_token_scopes").await, 0);
}

#[tokio::test]
async fn test_refresh_token_failure_reported() {
    let (database, router) = setup().await;

    sqlx::query(
        r"
        CREATE TRIGGER fail_refresh_tokens BEFORE INSERT ON refresh_tokens
        BEGIN
            SELECT RAISE(ABORT, 'refresh token insert disabled');
        END
        ",
    )
    .execute(database.pool())
    .await
    .unwrap();

    let body: Value = AxumTestRequest::post(TOKEN_URL)
        .basic_auth("svc-a", "s3cr3t")
        .form(&[("grant_type", "client_credentials")])
        .send(router)
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .json();
    assert_eq!(body, json!({ "Error": "Error saving refresh token" }));
    assert_eq!(count_rows(&database, "access_tokens").await, 0);
}

#[tokio::test]
async fn test_failed_rotation_keeps_original_pair() {
    let (database, router) = setup().await;
    let original = password_grant(router.clone(), "alice", "correct horse").await;

    sqlx::query(
        r"
        CREATE TRIGGER fail_access_tokens BEFORE INSERT ON access_tokens
        BEGIN
            SELECT RAISE(ABORT, 'access token insert disabled');
        END
        ",
    )
    .execute(database.pool())
    .await
    .unwrap();

    refresh_grant(router, &original.refresh_token)
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    // Deletion of the superseded pair rolled back with the failed insert
    assert!(database
        .get_refresh_token(&original.refresh_token)
        .await
        .unwrap()
        .is_some());
    assert_eq!(count_rows(&database, "access_tokens").await, 1);
}

#[tokio::test]
async fn test_no_default_scopes_yields_empty_scope() {
    let database = create_test_database().await.unwrap();
    common::create_test_user(&database, "bob", "pw").await.unwrap();
    database.create_scope("admin", false).await.unwrap();
    let router = create_test_router(&database);

    let token = password_grant(router, "bob", "pw").await;
    assert_eq!(token.scope, "");
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_and_readiness() {
    let (database, router) = setup().await;

    let health: Value = AxumTestRequest::get("/health")
        .send(router.clone())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(health["status"], "healthy");

    let ready: Value = AxumTestRequest::get("/ready")
        .send(router.clone())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(ready["status"], "ready");

    database.pool().close().await;
    let body: Value = AxumTestRequest::get("/ready")
        .send(router)
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .json();
    assert_eq!(body["Error"], "Error connecting to database");
}
