//! services/sync-client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use crate::socket::protocol::DEFAULT_REQUEST_TIMEOUT_MS;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_url: String,
    pub auth_token: String,
    pub log_level: Level,
    pub request_timeout_ms: u64,
    pub reconnect_attempts: u32,
    pub reconnect_backoff_ms: u64,
    pub assignment_id: Option<i64>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let server_url = std::env::var("SYNC_SERVER_URL")
            .map_err(|_| ConfigError::MissingVar("SYNC_SERVER_URL".to_string()))?;

        let auth_token = std::env::var("SYNC_AUTH_TOKEN")
            .map_err(|_| ConfigError::MissingVar("SYNC_AUTH_TOKEN".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let request_timeout_ms = parse_var("REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?;
        let reconnect_attempts = parse_var("RECONNECT_ATTEMPTS", 5)?;
        let reconnect_backoff_ms = parse_var("RECONNECT_BACKOFF_MS", 2_000)?;

        let assignment_id = match std::env::var("ASSIGNMENT_ID") {
            Ok(raw) => Some(raw.parse::<i64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "ASSIGNMENT_ID".to_string(),
                    format!("'{}' is not an integer", raw),
                )
            })?),
            Err(_) => None,
        };

        Ok(Self {
            server_url,
            auth_token,
            log_level,
            request_timeout_ms,
            reconnect_attempts,
            reconnect_backoff_ms,
            assignment_id,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(name.to_string(), format!("'{}' is not a valid number", raw))
        }),
        Err(_) => Ok(default),
    }
}
