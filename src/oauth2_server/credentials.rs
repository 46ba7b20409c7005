// ABOUTME: Secret hashing and verification for users and clients
// ABOUTME: bcrypt work runs on the blocking thread pool so request tasks are never stalled
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::errors::{AppError, AppResult};
use async_trait::async_trait;

/// Checks a presented secret against a stored hash
#[async_trait]
pub trait PasswordVerifier: Send + Sync {
    /// `true` only when `secret` matches `hash`; malformed hashes never match
    async fn verify(&self, secret: &str, hash: &str) -> bool;
}

/// bcrypt-backed verifier
#[derive(Debug, Clone, Copy, Default)]
pub struct BcryptVerifier;

#[async_trait]
impl PasswordVerifier for BcryptVerifier {
    async fn verify(&self, secret: &str, hash: &str) -> bool {
        let secret = secret.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || bcrypt::verify(&secret, &hash).unwrap_or(false))
            .await
            .unwrap_or(false)
    }
}

/// Hash a secret with bcrypt at the given cost
///
/// # Errors
///
/// Returns an error if hashing fails or the blocking task panics
pub async fn hash_secret(secret: &str, cost: u32) -> AppResult<String> {
    let secret = secret.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(&secret, cost))
        .await
        .map_err(|e| AppError::internal(format!("Password hashing task failed: {e}")))?
        .map_err(|e| AppError::internal("Failed to hash secret").with_source(e))
}
