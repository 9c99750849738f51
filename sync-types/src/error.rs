//! Error types for locksync data model.

use thiserror::Error;

/// Errors that can occur while building or parsing locksync values.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Input failed validation before any I/O was attempted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// JSON serialization or deserialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Structurally valid but semantically unusable data
    #[error("invalid data: {0}")]
    InvalidData(String),
}
