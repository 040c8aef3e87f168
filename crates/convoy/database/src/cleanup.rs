//! Destructive data cleanup with a confirmation gate.
//!
//! Cleanup issues DELETE statements against live databases, so the
//! production path is gated: unless the caller passes `force`, a
//! [`ConfirmationGate`] must approve the operation, and the default gate
//! declines everything. Non-interactive callers that have not wired a
//! gate can therefore never wipe production by accident.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use convoy_platform::CommandRunner;
use convoy_types::{Domain, Environment};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::command::CommandBuilder;
use crate::error::{DatabaseError, Result};
use crate::retry::RetryPolicy;

/// How much data a cleanup removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupKind {
    /// Operational logs only.
    LogsOnly,

    /// Logs plus transient user data.
    Partial,

    /// Everything, accounts included.
    Full,
}

impl CleanupKind {
    /// Tables to clear, in dependency order so child rows go before
    /// their parents.
    pub fn tables(&self) -> &'static [&'static str] {
        match self {
            CleanupKind::LogsOnly => &["logs"],
            CleanupKind::Partial => &["logs", "sessions", "files"],
            CleanupKind::Full => &["logs", "sessions", "files", "profiles", "users"],
        }
    }
}

/// Options for one cleanup run.
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    pub kind: CleanupKind,

    /// Skip the policy-required backup before deleting.
    pub skip_backup: bool,

    /// Bypass the confirmation gate. For operators who have already
    /// confirmed out of band.
    pub force: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            kind: CleanupKind::LogsOnly,
            skip_backup: false,
            force: false,
        }
    }
}

/// Outcome of one environment cleanup, one entry per database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupReport {
    pub environment: Environment,
    pub kind: CleanupKind,
    pub databases: Vec<DatabaseCleanup>,
}

impl CleanupReport {
    /// True when every database was fully cleared.
    pub fn all_completed(&self) -> bool {
        self.databases
            .iter()
            .all(|db| db.status == CleanupStatus::Completed)
    }

    /// DELETE statements executed, across all databases.
    pub fn statements_executed(&self) -> usize {
        self.databases.iter().map(|db| db.statements_executed).sum()
    }
}

/// Cleanup outcome for a single database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseCleanup {
    pub database: String,
    pub domain: String,

    /// Tables actually cleared, in execution order.
    pub tables_cleared: Vec<String>,

    /// DELETE statements executed against this database.
    pub statements_executed: usize,

    pub status: CleanupStatus,

    /// Captured failure message when `status` is `Failed`.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupStatus {
    /// Every table cleared.
    Completed,

    /// A DELETE failed; `error` carries the captured message and the
    /// database's remaining tables were left untouched.
    Failed,

    /// Dry run; statements planned but not executed.
    Skipped,
}

/// Approves or declines destructive cleanups.
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn confirm(&self, environment: Environment, kind: CleanupKind) -> bool;
}

/// Declines every request. The default gate.
pub struct DenyByDefault;

#[async_trait]
impl ConfirmationGate for DenyByDefault {
    async fn confirm(&self, _environment: Environment, _kind: CleanupKind) -> bool {
        false
    }
}

/// Approves every request. For tests and pre-confirmed automation.
pub struct ApproveAll;

#[async_trait]
impl ConfirmationGate for ApproveAll {
    async fn confirm(&self, _environment: Environment, _kind: CleanupKind) -> bool {
        true
    }
}

/// Clears data from every database a set of domains configures for an
/// environment.
pub struct CleanupService {
    runner: Arc<dyn CommandRunner>,
    commands: CommandBuilder,
    retry: RetryPolicy,
    gate: Arc<dyn ConfirmationGate>,
    timeout: Duration,
    dry_run: bool,
}

impl CleanupService {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        commands: CommandBuilder,
        retry: RetryPolicy,
        gate: Arc<dyn ConfirmationGate>,
        timeout: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            runner,
            commands,
            retry,
            gate,
            timeout,
            dry_run,
        }
    }

    /// Run a cleanup across the environment's databases.
    ///
    /// Production requires confirmation unless `force` is set. One
    /// database's failed DELETE is recorded in its entry and never stops
    /// the remaining databases; earlier statements are not rolled back.
    #[instrument(skip(self, domains), fields(%environment, kind = ?options.kind))]
    pub async fn cleanup_environment(
        &self,
        environment: Environment,
        domains: &[Domain],
        options: &CleanupOptions,
    ) -> Result<CleanupReport> {
        if environment.requires_confirmation() && !options.force {
            let approved = self.gate.confirm(environment, options.kind).await;
            if !approved {
                return Err(DatabaseError::CleanupDeclined {
                    environment: environment.to_string(),
                });
            }
        }

        let mut report = CleanupReport {
            environment,
            kind: options.kind,
            databases: Vec::new(),
        };

        for domain in domains {
            let Some(descriptor) = domain.database(environment) else {
                continue;
            };
            report.databases.push(
                self.cleanup_database(&descriptor.name, &domain.name, environment, options.kind)
                    .await,
            );
        }

        info!(
            %environment,
            statements = report.statements_executed(),
            completed = report.all_completed(),
            "cleanup finished"
        );
        Ok(report)
    }

    /// Clear one database's tables in dependency order.
    ///
    /// A failed DELETE stops this database (later tables may reference
    /// the one that kept its rows) and is captured in the entry.
    async fn cleanup_database(
        &self,
        database: &str,
        domain: &str,
        environment: Environment,
        kind: CleanupKind,
    ) -> DatabaseCleanup {
        let mut entry = DatabaseCleanup {
            database: database.to_string(),
            domain: domain.to_string(),
            tables_cleared: Vec::new(),
            statements_executed: 0,
            status: if self.dry_run {
                CleanupStatus::Skipped
            } else {
                CleanupStatus::Completed
            },
            error: None,
        };

        for table in kind.tables() {
            if self.dry_run {
                entry.tables_cleared.push(table.to_string());
                continue;
            }
            let sql = format!("DELETE FROM {table}");
            let spec = self.commands.execute(database, environment, &sql, self.timeout);
            match self.retry.execute(self.runner.as_ref(), &spec).await {
                Ok(_) => {
                    entry.tables_cleared.push(table.to_string());
                    entry.statements_executed += 1;
                }
                Err(err) => {
                    warn!(database, table, error = %err, "table cleanup failed");
                    entry.status = CleanupStatus::Failed;
                    entry.error = Some(err.to_string());
                    break;
                }
            }
        }
        entry
    }
}
