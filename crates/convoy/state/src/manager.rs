//! State Manager - single source of truth for one orchestration run.

use std::path::PathBuf;
use std::sync::RwLock;

use convoy_types::{
    AuditEvent, AuditScope, Domain, DomainState, DomainStatePatch, PortfolioState, RollbackStep,
};
use tracing::{debug, info};

use crate::audit::AuditSink;
use crate::error::{Result, StateError};

/// Configuration for state management.
#[derive(Debug, Clone)]
pub struct StateManagerConfig {
    /// Explicit persistence override. When absent, the `CONVOY_AUDIT_LOG`
    /// environment toggle decides, defaulting to off.
    pub enable_persistence: Option<bool>,

    /// Directory the audit log is written under when persistence is on.
    pub log_dir: PathBuf,

    /// Acting user or service recorded on every audit event.
    pub actor: String,
}

impl Default for StateManagerConfig {
    fn default() -> Self {
        Self {
            enable_persistence: None,
            log_dir: PathBuf::from("logs"),
            actor: "convoy".into(),
        }
    }
}

impl StateManagerConfig {
    /// Resolve whether audit persistence is on.
    ///
    /// Resolution order: embedded detection (force off) > explicit
    /// constructor option > `CONVOY_AUDIT_LOG` environment toggle >
    /// default off. Resolved once at construction and never re-read.
    pub fn resolve_persistence(&self) -> bool {
        self.resolve_with(env_flag("CONVOY_EMBEDDED"), env_flag("CONVOY_AUDIT_LOG"))
    }

    fn resolve_with(&self, embedded: bool, audit_log: bool) -> bool {
        // Running as a dependency of another tool: no guaranteed writable
        // project root, so file writes are disabled outright.
        if embedded {
            return false;
        }
        if let Some(explicit) = self.enable_persistence {
            return explicit;
        }
        audit_log
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Tracks portfolio and per-domain deployment state plus the audit trail.
///
/// Shared across bounded-concurrent domain deployments behind interior
/// locks; callers get clones of the state, never references into it.
pub struct StateManager {
    state: RwLock<PortfolioState>,
    audit: AuditSink,
    actor: String,
}

impl StateManager {
    pub fn new(config: StateManagerConfig) -> Self {
        let persist = config.resolve_persistence();
        info!(persist, "state manager initialized");
        Self {
            state: RwLock::new(PortfolioState::new()),
            audit: AuditSink::new(persist.then(|| config.log_dir.clone())),
            actor: config.actor,
        }
    }

    /// Register every requested domain as pending before any work starts.
    ///
    /// A crash before a domain's turn then still shows it as pending
    /// rather than absent.
    pub fn initialize_domain_states(&self, domains: &[Domain]) {
        let mut state = self.state.write().expect("portfolio state poisoned");
        for domain in domains {
            state
                .domains
                .insert(domain.name.clone(), DomainState::default());
        }
        debug!(count = domains.len(), "domain states initialized");
    }

    /// Merge a patch into one domain's state, returning the updated record.
    pub fn update_domain_state(&self, domain: &str, patch: DomainStatePatch) -> Result<DomainState> {
        let mut state = self.state.write().expect("portfolio state poisoned");
        let entry = state
            .domains
            .get_mut(domain)
            .ok_or_else(|| StateError::UnknownDomain(domain.to_string()))?;

        if let Some(status) = patch.status {
            entry.status = status;
        }
        if let Some(id) = patch.deployment_id {
            entry.deployment_id = Some(id);
        }
        if let Some(error) = patch.error {
            entry.error = Some(error);
        }
        if let Some(at) = patch.started_at {
            entry.started_at = Some(at);
        }
        if let Some(at) = patch.finished_at {
            entry.finished_at = Some(at);
        }

        Ok(entry.clone())
    }

    /// Append an undo action to the run's rollback plan.
    pub fn record_rollback_step(&self, step: RollbackStep) {
        let mut state = self.state.write().expect("portfolio state poisoned");
        state.rollback_plan.push(step);
    }

    /// All recorded undo actions for one domain, in recording order.
    pub fn rollback_plan_for(&self, domain: &str) -> Vec<RollbackStep> {
        let state = self.state.read().expect("portfolio state poisoned");
        state
            .rollback_plan
            .iter()
            .filter(|step| step.domain == domain)
            .cloned()
            .collect()
    }

    /// Snapshot of the full run state.
    pub fn get_state(&self) -> PortfolioState {
        self.state
            .read()
            .expect("portfolio state poisoned")
            .clone()
    }

    /// Snapshot of one domain's state.
    pub fn domain_state(&self, domain: &str) -> Option<DomainState> {
        self.state
            .read()
            .expect("portfolio state poisoned")
            .domains
            .get(domain)
            .cloned()
    }

    /// Stamp the run's end timestamp.
    pub fn finish(&self) {
        let mut state = self.state.write().expect("portfolio state poisoned");
        state.finished_at = Some(chrono::Utc::now());
    }

    /// Record an audit event.
    ///
    /// Always lands in the in-process log; additionally appended to the
    /// audit file when persistence is enabled.
    pub async fn log_audit_event(
        &self,
        event: impl Into<String>,
        scope: AuditScope,
        details: serde_json::Value,
    ) {
        self.audit
            .record(AuditEvent {
                timestamp: chrono::Utc::now(),
                event: event.into(),
                scope,
                details,
                actor: self.actor.clone(),
            })
            .await;
    }

    /// Snapshot of the audit trail recorded so far.
    pub fn audit_log(&self) -> Vec<AuditEvent> {
        self.audit.events()
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new(StateManagerConfig::default())
    }
}
