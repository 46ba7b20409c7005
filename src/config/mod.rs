// ABOUTME: Configuration management module for the token server
// ABOUTME: Re-exports environment-driven server settings and token lifetimes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Configuration module
//!
//! All settings come from environment variables; see [`environment::ServerConfig::from_env`].

/// Environment and server configuration
pub mod environment;

pub use environment::{DatabaseUrl, Environment, ServerConfig, TokenLifetimes};
