//! Audit and lifecycle event types
//!
//! Convoy produces two related streams: an append-only audit trail of what
//! happened (persisted by the state manager) and a live lifecycle event
//! stream published by the orchestrator for subscribers.

use crate::{DeploymentId, Environment, OrchestrationId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of the append-only audit trail
///
/// Audit events are never mutated or deleted after being recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event happened
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Event name, e.g. "MIGRATION_COMPLETED"
    pub event: String,

    /// Scope the event applies to
    pub scope: AuditScope,

    /// Structured details (names, counts, durations)
    pub details: serde_json::Value,

    /// Acting user or service
    pub actor: String,
}

/// Scope of an audit event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditScope {
    /// A single environment
    Environment(Environment),

    /// A single domain
    Domain(String),

    /// The whole run
    All,
}

impl std::fmt::Display for AuditScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditScope::Environment(env) => write!(f, "{}", env),
            AuditScope::Domain(domain) => write!(f, "{}", domain),
            AuditScope::All => write!(f, "ALL"),
        }
    }
}

/// Envelope wrapping lifecycle events on the broadcast stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,

    /// Event timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Component that emitted the event
    pub source: EventSource,

    /// Run the event belongs to
    pub orchestration_id: OrchestrationId,

    /// The actual event
    pub event: OrchestratorEvent,
}

impl EventEnvelope {
    pub fn new(
        event: OrchestratorEvent,
        source: EventSource,
        orchestration_id: OrchestrationId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            source,
            orchestration_id,
            event,
        }
    }
}

/// Component that emitted an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    /// Portfolio façade
    Orchestrator,
    /// Per-domain coordinator
    Coordinator,
    /// Database engine
    Database,
}

/// Lifecycle events published during an orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrchestratorEvent {
    /// Run initialized; all requested domains registered as pending
    PortfolioInitialized {
        domains: Vec<String>,
    },

    /// One domain's deployment started
    DomainStarted {
        domain: String,
        deployment_id: DeploymentId,
    },

    /// One domain's deployment completed
    DomainCompleted {
        domain: String,
        deployment_id: DeploymentId,
        duration_ms: u64,
    },

    /// One domain's deployment failed
    DomainFailed {
        domain: String,
        reason: String,
    },

    /// A failed domain was rolled back
    DomainRolledBack {
        domain: String,
        steps_replayed: usize,
    },

    /// Migrations finished for one database
    MigrationsApplied {
        domain: String,
        database: String,
        environment: Environment,
        migrations_applied: u32,
    },

    /// A backup finished for one environment
    BackupCreated {
        environment: Environment,
        backup_id: String,
        databases: usize,
    },

    /// The whole run finished
    PortfolioCompleted {
        successful: usize,
        failed: usize,
        duration_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_scope_display() {
        assert_eq!(AuditScope::All.to_string(), "ALL");
        assert_eq!(
            AuditScope::Environment(Environment::Production).to_string(),
            "production"
        );
        assert_eq!(
            AuditScope::Domain("orders.example.com".into()).to_string(),
            "orders.example.com"
        );
    }

    #[test]
    fn test_envelope_carries_run_id() {
        let run = OrchestrationId::generate();
        let envelope = EventEnvelope::new(
            OrchestratorEvent::PortfolioInitialized {
                domains: vec!["a.example.com".into()],
            },
            EventSource::Orchestrator,
            run.clone(),
        );
        assert_eq!(envelope.orchestration_id, run);
    }
}
