//! Schema migration service.

use std::sync::Arc;
use std::time::Duration;

use convoy_platform::{CommandRunner, DatabaseProvisioner};
use convoy_types::{BackupRecord, Environment, MigrationResult, MigrationStatus};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::command::CommandBuilder;
use crate::error::{DatabaseError, Result};
use crate::retry::RetryPolicy;

/// How much command output a MigrationResult keeps.
const OUTPUT_LIMIT: usize = 1000;

/// Options for a cross-environment migration run.
#[derive(Debug, Clone)]
pub struct MigrationRunOptions {
    /// Requested environment names; unknown names are skipped with a
    /// warning, not an error.
    pub environments: Vec<String>,

    /// Skip policy-required backups.
    pub skip_backup: bool,

    /// Record a failing environment and keep going instead of raising.
    pub continue_on_error: bool,
}

/// Aggregate result of a cross-environment migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRunSummary {
    /// Environment counts.
    pub totals: RunTotals,

    /// Wall-clock duration of the whole run.
    pub duration_ms: u64,

    /// Full per-environment detail, in request order.
    pub environments: Vec<EnvironmentMigrationResult>,
}

/// Environment counts for a migration run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunTotals {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Outcome for one requested environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentMigrationResult {
    /// The environment name as requested.
    pub environment: String,

    /// Outcome for the environment as a whole.
    pub status: EnvironmentRunStatus,

    /// Backup taken before migrations, when policy required one.
    pub backup: Option<BackupRecord>,

    /// Per-database migration results.
    pub migrations: Vec<MigrationResult>,

    /// Captured error when the environment failed.
    pub error: Option<String>,
}

/// Status of one environment within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentRunStatus {
    /// Every database migrated.
    Completed,

    /// At least one database failed.
    Failed,

    /// Unknown environment name, skipped.
    Skipped,
}

/// Applies migrations to individual databases.
pub struct MigrationService {
    runner: Arc<dyn CommandRunner>,
    provisioner: Arc<dyn DatabaseProvisioner>,
    commands: CommandBuilder,
    retry: RetryPolicy,
    timeout: Duration,
    dry_run: bool,
    applied_pattern: Regex,
}

impl MigrationService {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        provisioner: Arc<dyn DatabaseProvisioner>,
        commands: CommandBuilder,
        retry: RetryPolicy,
        timeout: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            runner,
            provisioner,
            commands,
            retry,
            timeout,
            dry_run,
            applied_pattern: Regex::new(r"Applied (\d+) migration").expect("static pattern"),
        }
    }

    /// Apply pending migrations to one database.
    ///
    /// The database must already exist; a missing database is fatal and
    /// no command is executed. In dry-run mode this returns before any
    /// external interaction, so a dry run cannot fail from external
    /// causes.
    #[instrument(skip(self), fields(database, %environment))]
    pub async fn apply_database_migrations(
        &self,
        database: &str,
        binding: &str,
        environment: Environment,
    ) -> Result<MigrationResult> {
        if self.dry_run {
            debug!(database, "dry run, skipping migration command");
            return Ok(MigrationResult {
                database: database.to_string(),
                binding: binding.to_string(),
                environment,
                migrations_applied: 0,
                status: MigrationStatus::DryRun,
                output: String::new(),
            });
        }

        if !self.provisioner.database_exists(database).await? {
            return Err(DatabaseError::DatabaseMissing {
                name: database.to_string(),
            });
        }

        let spec = self
            .commands
            .migrations_apply(database, environment, self.timeout);
        let output = self.retry.execute(self.runner.as_ref(), &spec).await?;

        let applied = self.parse_applied_count(&output.stdout);
        info!(database, %environment, applied, "migrations applied");

        Ok(MigrationResult {
            database: database.to_string(),
            binding: binding.to_string(),
            environment,
            migrations_applied: applied,
            status: MigrationStatus::Applied,
            output: truncate(&output.stdout, OUTPUT_LIMIT),
        })
    }

    /// Number of applied migrations reported on stdout; 0 when the
    /// fixed pattern is absent.
    fn parse_applied_count(&self, stdout: &str) -> u32 {
        self.applied_pattern
            .captures(stdout)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    }
}

fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        s.to_string()
    } else {
        let mut end = limit;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}
