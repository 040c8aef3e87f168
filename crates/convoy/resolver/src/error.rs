//! Error types for convoy-resolver.

use thiserror::Error;

/// Errors raised while resolving domains.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The name is not registered and no inline configuration was given.
    #[error("unknown domain: {0} (no inline configuration supplied)")]
    UnknownDomain(String),

    /// The supplied configuration is unusable.
    #[error("invalid configuration for {name}: {reason}")]
    InvalidConfig { name: String, reason: String },
}

/// Result type for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;
