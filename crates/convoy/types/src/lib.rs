//! Shared types for the Convoy deployment orchestration engine.
//!
//! Convoy rolls out portfolios of domains (services plus their backing
//! databases) across development, staging and production. This crate holds
//! the data model every other Convoy crate speaks: identifiers, the
//! environment policy table, domain descriptors, portfolio state, backup
//! and migration records, and the audit/lifecycle event types.

pub mod domain;
pub mod environment;
pub mod events;
pub mod ids;
pub mod records;
pub mod state;

pub use domain::{DatabaseDescriptor, Domain, DomainFeatures};
pub use environment::Environment;
pub use events::{
    AuditEvent, AuditScope, EventEnvelope, EventSource, OrchestratorEvent,
};
pub use ids::{DeploymentId, OrchestrationId};
pub use records::{
    BackupRecord, DatabaseBackup, ExportStatus, MigrationResult, MigrationStatus,
};
pub use state::{
    DomainState, DomainStatePatch, DomainStatus, PortfolioState, RollbackAction, RollbackStep,
};
