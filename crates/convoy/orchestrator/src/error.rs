//! Error types for convoy-orchestrator.

use convoy_database::DatabaseError;
use convoy_platform::PlatformError;
use convoy_resolver::ResolverError;
use convoy_state::StateError;
use thiserror::Error;

/// Errors raised while deploying a domain or a portfolio.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A requested domain could not be resolved. Raised by
    /// `initialize`, which refuses to start a run with unknown domains.
    #[error(transparent)]
    Resolution(#[from] ResolverError),

    /// Prerequisite validation found issues; nothing was deployed.
    #[error("domain '{domain}' failed validation: {}", issues.join("; "))]
    Validation { domain: String, issues: Vec<String> },

    /// The domain's circuit is open; the deployment was not attempted.
    #[error("circuit open for domain '{domain}'")]
    CircuitOpen { domain: String },

    /// A platform collaborator (deployer, health checker) failed.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The database engine failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The post-deploy health probe reported the domain unhealthy.
    #[error("domain '{domain}' unhealthy after deploy: {status}")]
    Unhealthy { domain: String, status: String },

    /// State bookkeeping failed.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Result type for orchestration operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
