//! Error types for convoy-database.

use convoy_platform::PlatformError;
use thiserror::Error;

/// Errors raised by the database orchestration engine.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The target database does not exist. Migrations never create
    /// databases implicitly; this is fatal and never retried.
    #[error("database '{name}' does not exist")]
    DatabaseMissing { name: String },

    /// The external command finished with a non-zero exit code after the
    /// final retry attempt.
    #[error("command '{command}' failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// Spawning or supervising the external command failed after the
    /// final retry attempt (includes timeouts).
    #[error(transparent)]
    Execution(#[from] PlatformError),

    /// An environment's migrations failed and the caller opted out of
    /// continuing on error.
    #[error("environment '{environment}' failed: {reason}")]
    EnvironmentFailed { environment: String, reason: String },

    /// The confirmation gate declined a destructive cleanup.
    #[error("cleanup in '{environment}' declined by confirmation gate")]
    CleanupDeclined { environment: String },

    /// Reading or writing backup artifacts failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing a backup manifest failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
