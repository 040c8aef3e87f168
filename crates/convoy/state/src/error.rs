//! Error types for convoy-state.

use thiserror::Error;

/// Errors that can occur during state management operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// The domain was never registered with this run.
    #[error("unknown domain: {0}")]
    UnknownDomain(String),

    /// Serializing an audit event failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;
