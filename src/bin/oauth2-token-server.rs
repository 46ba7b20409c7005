// ABOUTME: Server binary serving the OAuth 2.0 token endpoint over HTTP
// ABOUTME: Loads configuration, opens the database and serves until Ctrl+C or SIGTERM
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # OAuth2 Token Server Binary
//!
//! Requires `ACCESS_TOKEN_LIFETIME` and `REFRESH_TOKEN_LIFETIME` (seconds).

use anyhow::{Context, Result};
use clap::Parser;
use oauth2_token_server::{
    config::ServerConfig,
    database::Database,
    logging,
    oauth2_server::BcryptVerifier,
    resources::ServerResources,
    routes,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "oauth2-token-server")]
#[command(about = "OAuth 2.0 token endpoint issuing bearer access and refresh tokens")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting OAuth2 token server");
    info!("{}", config.summary());

    let database = Database::from_url(&config.database_url).await?;
    info!(database = %config.database_url, "Database initialized");

    let resources = Arc::new(ServerResources::new(
        Arc::new(database),
        Arc::new(BcryptVerifier),
        &config,
    ));
    resources.token_endpoint.warm_up().await?;
    let app = routes::router(&resources);

    let addr = format!("{}:{}", config.host, config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Token endpoint listening on {addr}, press Ctrl+C to stop");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {e}");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
