//! Error types for platform collaborators.

use thiserror::Error;

/// Errors raised by platform collaborators.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The command could not be spawned.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran past its timeout and was killed.
    #[error("{program} timed out after {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },

    /// Reading or writing the child process streams failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The platform API rejected or could not serve a request.
    #[error("platform unavailable: {0}")]
    Unavailable(String),

    /// A deploy operation failed.
    #[error("deploy failed for {service}: {reason}")]
    DeployFailed { service: String, reason: String },

    /// A health check could not be performed.
    #[error("health check failed: {0}")]
    HealthCheck(String),
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;
