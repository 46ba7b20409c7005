// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses token lifetimes, database location and server binding from environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Environment-based configuration management for production deployment

use crate::constants::{defaults, env_vars};
use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Environment type for logging and operational defaults
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Deployed service
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite { path: PathBuf },
    /// In-memory `SQLite` (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string
    ///
    /// # Errors
    /// Returns an error if the scheme is not a supported `SQLite` form
    pub fn parse_url(s: &str) -> Result<Self> {
        let path_str = s.strip_prefix("sqlite://").or_else(|| s.strip_prefix("sqlite:"));
        match path_str {
            Some(":memory:") => Ok(Self::Memory),
            Some("") => Err(anyhow!("DATABASE_URL is missing a file path")),
            Some(path) => Ok(Self::SQLite {
                path: PathBuf::from(path),
            }),
            None if s.contains("://") => Err(anyhow!("Unsupported database scheme in '{s}'")),
            // Bare paths are treated as SQLite files
            None => Ok(Self::SQLite {
                path: PathBuf::from(s),
            }),
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/oauth2_tokens.db"),
        }
    }
}

impl std::fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Lifetimes applied to every issued token pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLifetimes {
    /// Access token lifetime in seconds
    pub access_token_secs: i64,
    /// Refresh token lifetime in seconds
    pub refresh_token_secs: i64,
}

impl TokenLifetimes {
    /// Build lifetimes, rejecting non-positive or absurdly long durations
    ///
    /// # Errors
    /// Returns an error if either lifetime is outside `1..=MAX_TOKEN_LIFETIME_SECS`
    pub fn new(access_token_secs: i64, refresh_token_secs: i64) -> Result<Self> {
        let valid = 1..=defaults::MAX_TOKEN_LIFETIME_SECS;
        if !valid.contains(&access_token_secs) {
            return Err(anyhow!(
                "{} must be between 1 and {} seconds",
                env_vars::ACCESS_TOKEN_LIFETIME,
                defaults::MAX_TOKEN_LIFETIME_SECS
            ));
        }
        if !valid.contains(&refresh_token_secs) {
            return Err(anyhow!(
                "{} must be between 1 and {} seconds",
                env_vars::REFRESH_TOKEN_LIFETIME,
                defaults::MAX_TOKEN_LIFETIME_SECS
            ));
        }
        Ok(Self {
            access_token_secs,
            refresh_token_secs,
        })
    }

    /// Access token lifetime as a duration
    #[must_use]
    pub fn access_token(&self) -> Duration {
        Duration::seconds(self.access_token_secs)
    }

    /// Refresh token lifetime as a duration
    #[must_use]
    pub fn refresh_token(&self) -> Duration {
        Duration::seconds(self.refresh_token_secs)
    }
}

/// Token server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API port
    pub http_port: u16,
    /// Bind address
    pub host: String,
    /// Database location
    pub database_url: DatabaseUrl,
    /// Token lifetimes
    pub token_lifetimes: TokenLifetimes,
    /// bcrypt work factor for newly hashed secrets
    pub bcrypt_cost: u32,
    /// Deployment environment
    pub environment: Environment,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or any value fails to parse
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// # Errors
    /// Returns an error if a required key is missing or any value fails to parse
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        let required = |key: &str| {
            lookup(key).ok_or_else(|| anyhow!("Missing required environment variable {key}"))
        };

        let access_token_secs: i64 = required(env_vars::ACCESS_TOKEN_LIFETIME)?
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value", env_vars::ACCESS_TOKEN_LIFETIME))?;
        let refresh_token_secs: i64 = required(env_vars::REFRESH_TOKEN_LIFETIME)?
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value", env_vars::REFRESH_TOKEN_LIFETIME))?;

        let config = Self {
            http_port: var_or(env_vars::HTTP_PORT, &defaults::HTTP_PORT.to_string())
                .parse()
                .context("Invalid HTTP_PORT value")?,
            host: var_or(env_vars::HOST, defaults::HOST),
            database_url: DatabaseUrl::parse_url(&var_or(
                env_vars::DATABASE_URL,
                defaults::DATABASE_URL,
            ))?,
            token_lifetimes: TokenLifetimes::new(access_token_secs, refresh_token_secs)?,
            bcrypt_cost: var_or(env_vars::BCRYPT_COST, &bcrypt::DEFAULT_COST.to_string())
                .parse()
                .context("Invalid BCRYPT_COST value")?,
            environment: Environment::from_str_or_default(&var_or(
                env_vars::ENVIRONMENT,
                "development",
            )),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    ///
    /// # Errors
    /// Returns an error if the configuration is inconsistent
    pub fn validate(&self) -> Result<()> {
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(anyhow!(
                "BCRYPT_COST must be between 4 and 31, got {}",
                self.bcrypt_cost
            ));
        }
        if self.environment.is_production() && self.database_url.is_memory() {
            return Err(anyhow!(
                "In-memory database is not allowed in production; set DATABASE_URL"
            ));
        }
        Ok(())
    }

    /// Human-readable configuration summary for startup logs
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "OAuth2 Token Server Configuration:\n\
             - Bind: {}:{}\n\
             - Environment: {}\n\
             - Database: {}\n\
             - Access Token Lifetime: {}s\n\
             - Refresh Token Lifetime: {}s",
            self.host,
            self.http_port,
            self.environment,
            self.database_url,
            self.token_lifetimes.access_token_secs,
            self.token_lifetimes.refresh_token_secs,
        )
    }
}
