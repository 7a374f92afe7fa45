//! services/sync-client/src/error.rs
//!
//! Defines the primary error type for the sync client.

use crate::config::ConfigError;
use assignment_sync_core::ports::SyncError;

/// The primary error type for the `sync-client` service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the sync layer.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Represents a standard Input/Output error (e.g., waiting on signals).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
