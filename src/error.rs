//! Error types for container operations.
//!
//! Every variant is a usage error: it is returned from the call that broke
//! the contract, before any shared state was touched. Writes whose value
//! equals the current value are not errors, they are reported as no-ops.

use crate::types::KeyPath;
use thiserror::Error;

/// Main error type for container operations.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Invalid item at index {index}: missing identity field `{field}`\n\t[{ids}]")]
    InvalidItem {
        index: usize,
        field: String,
        /// Identities of the submitted items, `null` where missing.
        ids: String,
    },

    #[error("Inconsistent collection: {0}")]
    Inconsistent(String),

    #[error("Path conflict at {path}: {reason}")]
    PathConflict { path: KeyPath, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for WatchError {
    fn from(e: serde_json::Error) -> Self {
        WatchError::Serialization(e.to_string())
    }
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, WatchError>;
