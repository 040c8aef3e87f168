//! Database orchestration for the Convoy engine.
//!
//! Applies schema migrations, creates backups and performs safe cleanup
//! across one-to-many databases and one-to-many environments, with
//! retrying command execution behind the platform command runner. The
//! [`DatabaseOrchestrator`] facade composes the topical services and
//! records an audit event for every mutating operation.

mod backup;
mod cleanup;
mod command;
mod error;
mod migrate;
mod orchestrator;
mod retry;

pub use backup::BackupService;
pub use cleanup::{
    ApproveAll, CleanupKind, CleanupOptions, CleanupReport, CleanupService, CleanupStatus,
    ConfirmationGate, DatabaseCleanup, DenyByDefault,
};
pub use command::CommandBuilder;
pub use error::{DatabaseError, Result};
pub use migrate::{
    EnvironmentMigrationResult, EnvironmentRunStatus, MigrationRunOptions, MigrationRunSummary,
    MigrationService, RunTotals,
};
pub use orchestrator::{DatabaseOrchestrator, DatabaseOrchestratorConfig};
pub use retry::RetryPolicy;
