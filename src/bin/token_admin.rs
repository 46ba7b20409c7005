// ABOUTME: Administrative utility for provisioning users, clients and scopes
// ABOUTME: Hashes secrets with bcrypt and writes them to the token server database
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Usage:
//! ```bash
//! # Create a user for the password grant
//! cargo run --bin token-admin -- create-user --username alice --password secret
//!
//! # Register a client for the client credentials grant
//! cargo run --bin token-admin -- create-client --client-id svc-a --secret s3cr3t
//!
//! # Register a scope granted to every new access token
//! cargo run --bin token-admin -- create-scope read --default
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oauth2_token_server::{
    config::DatabaseUrl,
    constants::{defaults, env_vars},
    database::Database,
    oauth2_server::hash_secret,
};
use std::env;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "token-admin",
    about = "OAuth2 token server administration",
    long_about = "Provision users, clients and scopes in the OAuth2 token server database."
)]
struct AdminArgs {
    #[command(subcommand)]
    command: AdminCommand,

    /// Database URL override
    #[arg(long)]
    database_url: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Subcommand)]
enum AdminCommand {
    /// Create a user able to use the password grant
    CreateUser {
        /// Login name
        #[arg(long)]
        username: String,

        /// Plain-text password, stored as a bcrypt hash
        #[arg(long)]
        password: String,
    },

    /// Register a client able to use the client credentials grant
    CreateClient {
        /// Public client identifier
        #[arg(long)]
        client_id: String,

        /// Plain-text client secret, stored as a bcrypt hash
        #[arg(long)]
        secret: String,
    },

    /// Register a scope
    CreateScope {
        /// Scope name
        scope: String,

        /// Attach this scope to every newly issued access token
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AdminArgs::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let database_url = args
        .database_url
        .or_else(|| env::var(env_vars::DATABASE_URL).ok())
        .unwrap_or_else(|| defaults::DATABASE_URL.into());
    let bcrypt_cost: u32 = env::var(env_vars::BCRYPT_COST)
        .ok()
        .map(|v| v.parse())
        .transpose()
        .context("Invalid BCRYPT_COST value")?
        .unwrap_or(bcrypt::DEFAULT_COST);

    let database = Database::from_url(&DatabaseUrl::parse_url(&database_url)?).await?;
    info!("Connected to database: {database_url}");

    match args.command {
        AdminCommand::CreateUser { username, password } => {
            let hash = hash_secret(&password, bcrypt_cost).await?;
            let id = database.create_user(&username, &hash).await?;
            info!(id, username = %username, "User created");
        }
        AdminCommand::CreateClient { client_id, secret } => {
            let hash = hash_secret(&secret, bcrypt_cost).await?;
            let id = database.create_client(&client_id, &hash).await?;
            info!(id, client_id = %client_id, "Client created");
        }
        AdminCommand::CreateScope { scope, default } => {
            let id = database.create_scope(&scope, default).await?;
            info!(id, scope = %scope, default, "Scope created");
        }
    }

    Ok(())
}
