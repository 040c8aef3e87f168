//! Portfolio and per-domain deployment state
//!
//! A PortfolioState is created once per orchestration run. Domain entries
//! are pre-populated to `Pending` for every requested domain before any
//! work starts, so a crash before a domain's turn still shows it as
//! pending rather than absent.

use crate::{DeploymentId, OrchestrationId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Deployment status of a single domain within a run
///
/// Transitions are monotonic forward within a run, except the explicit
/// `Failed` to `RolledBack` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    /// Waiting for its turn
    #[default]
    Pending,

    /// Prerequisite validation in progress
    Validating,

    /// Code and secrets being pushed
    Deploying,

    /// Schema migrations being applied
    Migrating,

    /// Deployment finished successfully
    Completed,

    /// Deployment failed
    Failed,

    /// Failure was rolled back
    RolledBack,
}

impl std::fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainStatus::Pending => write!(f, "pending"),
            DomainStatus::Validating => write!(f, "validating"),
            DomainStatus::Deploying => write!(f, "deploying"),
            DomainStatus::Migrating => write!(f, "migrating"),
            DomainStatus::Completed => write!(f, "completed"),
            DomainStatus::Failed => write!(f, "failed"),
            DomainStatus::RolledBack => write!(f, "rolledback"),
        }
    }
}

/// State of one domain's deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainState {
    /// Current status
    pub status: DomainStatus,

    /// Deployment id, assigned once work starts
    pub deployment_id: Option<DeploymentId>,

    /// Error message if the deployment failed
    pub error: Option<String>,

    /// When work on this domain started
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,

    /// When work on this domain finished (completed, failed or rolled back)
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Patch merged into a DomainState by the state manager
///
/// Only fields present in the patch are written; everything else is
/// left as-is.
#[derive(Debug, Clone, Default)]
pub struct DomainStatePatch {
    pub status: Option<DomainStatus>,
    pub deployment_id: Option<DeploymentId>,
    pub error: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl DomainStatePatch {
    pub fn status(status: DomainStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_deployment_id(mut self, id: DeploymentId) -> Self {
        self.deployment_id = Some(id);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_started_at(mut self, at: chrono::DateTime<chrono::Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn with_finished_at(mut self, at: chrono::DateTime<chrono::Utc>) -> Self {
        self.finished_at = Some(at);
        self
    }
}

/// State of a full orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    /// Identifier of this run
    pub orchestration_id: OrchestrationId,

    /// Per-domain state, keyed by domain name
    pub domains: HashMap<String, DomainState>,

    /// Ordered undo actions, replayed in reverse order on rollback
    ///
    /// Append-only during a run.
    pub rollback_plan: Vec<RollbackStep>,

    /// Run start timestamp
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Run end timestamp
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl PortfolioState {
    /// Fresh state for a new run with no domains registered yet.
    pub fn new() -> Self {
        Self {
            orchestration_id: OrchestrationId::generate(),
            domains: HashMap::new(),
            rollback_plan: Vec::new(),
            started_at: chrono::Utc::now(),
            finished_at: None,
        }
    }
}

impl Default for PortfolioState {
    fn default() -> Self {
        Self::new()
    }
}

/// One recorded undo action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackStep {
    /// Domain the action belongs to
    pub domain: String,

    /// The undo action itself
    pub action: RollbackAction,

    /// When the corresponding forward action happened
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// Undo actions the coordinator knows how to replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollbackAction {
    /// Remove a service that was deployed this run
    RemoveService {
        /// Service name
        service: String,
    },

    /// Remove a secret that was applied this run
    RemoveSecret {
        /// Service the secret was applied to
        service: String,
        /// Secret name
        secret: String,
    },

    /// Drop a database that was created this run
    DropDatabase {
        /// Database name
        database: String,
    },

    /// Restore a database from a backup taken this run
    RestoreBackup {
        /// Backup identifier
        backup_id: String,
        /// Database name
        database: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut state = DomainState {
            status: DomainStatus::Deploying,
            deployment_id: Some(DeploymentId::generate()),
            error: None,
            started_at: Some(chrono::Utc::now()),
            finished_at: None,
        };
        let before_id = state.deployment_id.clone();

        let patch = DomainStatePatch::status(DomainStatus::Failed).with_error("boom");
        if let Some(status) = patch.status {
            state.status = status;
        }
        if let Some(err) = patch.error {
            state.error = Some(err);
        }

        assert_eq!(state.status, DomainStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert_eq!(state.deployment_id, before_id);
    }
}
