// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults and the [`AppConfig`] loaded from
//! them at startup. A `.env` file is honoured (loaded in `main` via
//! `dotenvy`).
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding the ledger database | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET_KEY` | HMAC secret for access/refresh tokens | Required |
//! | `ACCESS_TOKEN_TTL_SECS` | Access token lifetime (refresh is 24×) | `3600` |
//! | `TOKEN_CACHE_CAPACITY` | Max keys held by the token cache | `10000` |
//! | `STORE_TIMEOUT_MS` | Deadline for each durable store call | `5000` |
//! | `CACHE_TIMEOUT_MS` | Deadline for each token cache call | `1000` |
//! | `SESSION_SWEEP_INTERVAL_SECS` | How often expired sessions are purged | `3600` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const JWT_SECRET_KEY_ENV: &str = "JWT_SECRET_KEY";
pub const ACCESS_TOKEN_TTL_SECS_ENV: &str = "ACCESS_TOKEN_TTL_SECS";
pub const TOKEN_CACHE_CAPACITY_ENV: &str = "TOKEN_CACHE_CAPACITY";
pub const STORE_TIMEOUT_MS_ENV: &str = "STORE_TIMEOUT_MS";
pub const CACHE_TIMEOUT_MS_ENV: &str = "CACHE_TIMEOUT_MS";
pub const SESSION_SWEEP_INTERVAL_SECS_ENV: &str = "SESSION_SWEEP_INTERVAL_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 3600;
pub const DEFAULT_TOKEN_CACHE_CAPACITY: usize = 10_000;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_CACHE_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_SESSION_SWEEP_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Upper bound for `ACCESS_TOKEN_TTL_SECS` (30 days).
pub const MAX_ACCESS_TOKEN_TTL_SECS: u64 = 30 * 24 * 3600;

/// Ledger database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "ewallet.redb";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub token_cache_capacity: usize,
    pub store_timeout: Duration,
    pub cache_timeout: Duration,
    pub session_sweep_interval: Duration,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("token_cache_capacity", &self.token_cache_capacity)
            .field("store_timeout", &self.store_timeout)
            .field("cache_timeout", &self.cache_timeout)
            .field("session_sweep_interval", &self.session_sweep_interval)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup(JWT_SECRET_KEY_ENV)
            .filter(|secret| !secret.trim().is_empty())
            .ok_or(ConfigError::Missing(JWT_SECRET_KEY_ENV))?;

        let access_ttl_secs = parse_or(&lookup, ACCESS_TOKEN_TTL_SECS_ENV, DEFAULT_ACCESS_TOKEN_TTL_SECS)?;
        if access_ttl_secs == 0 || access_ttl_secs > MAX_ACCESS_TOKEN_TTL_SECS {
            return Err(ConfigError::Invalid {
                var: ACCESS_TOKEN_TTL_SECS_ENV,
                value: access_ttl_secs.to_string(),
                reason: format!("must be between 1 and {MAX_ACCESS_TOKEN_TTL_SECS}"),
            });
        }

        let sweep_secs = parse_positive(
            &lookup,
            SESSION_SWEEP_INTERVAL_SECS_ENV,
            DEFAULT_SESSION_SWEEP_INTERVAL_SECS,
        )?;
        let store_timeout_ms = parse_positive(&lookup, STORE_TIMEOUT_MS_ENV, DEFAULT_STORE_TIMEOUT_MS)?;
        let cache_timeout_ms = parse_positive(&lookup, CACHE_TIMEOUT_MS_ENV, DEFAULT_CACHE_TIMEOUT_MS)?;

        Ok(Self {
            data_dir: PathBuf::from(
                lookup(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            ),
            host: lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, PORT_ENV, DEFAULT_PORT)?,
            jwt_secret,
            access_token_ttl: Duration::from_secs(access_ttl_secs),
            token_cache_capacity: parse_or(
                &lookup,
                TOKEN_CACHE_CAPACITY_ENV,
                DEFAULT_TOKEN_CACHE_CAPACITY,
            )?,
            store_timeout: Duration::from_millis(store_timeout_ms),
            cache_timeout: Duration::from_millis(cache_timeout_ms),
            session_sweep_interval: Duration::from_secs(sweep_secs),
        })
    }

    /// Path of the ledger database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Like [`parse_or`], rejecting zero.
fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    let value = parse_or(lookup, var, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}
