//! Facade over migration, backup, and cleanup services.
//!
//! The orchestrator owns the cross-environment policy: backups before
//! migrations where the environment requires them, independent failure
//! handling per environment, and an audit event for every mutating
//! operation, successful or not.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use convoy_platform::{CommandRunner, DatabaseProvisioner};
use convoy_state::StateManager;
use convoy_types::{
    AuditScope, BackupRecord, Domain, Environment, MigrationResult, MigrationStatus,
};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::backup::BackupService;
use crate::cleanup::{CleanupOptions, CleanupReport, CleanupService, ConfirmationGate, DenyByDefault};
use crate::command::CommandBuilder;
use crate::error::{DatabaseError, Result};
use crate::migrate::{
    EnvironmentMigrationResult, EnvironmentRunStatus, MigrationRunOptions, MigrationRunSummary,
    MigrationService, RunTotals,
};
use crate::retry::RetryPolicy;

/// Configuration for the database orchestration engine.
#[derive(Debug, Clone)]
pub struct DatabaseOrchestratorConfig {
    /// Platform CLI executable.
    pub cli: String,

    /// Resource namespace under the CLI.
    pub resource: String,

    /// Directory every command runs in.
    pub project_root: PathBuf,

    /// Root directory backups are written under.
    pub backup_dir: PathBuf,

    /// Plan everything, execute nothing.
    pub dry_run: bool,

    /// Retry policy for external commands.
    pub retry: RetryPolicy,

    /// Per-command timeout for migration applies.
    pub migration_timeout: Duration,

    /// Per-command timeout for database exports.
    pub backup_timeout: Duration,
}

impl Default for DatabaseOrchestratorConfig {
    fn default() -> Self {
        Self {
            cli: "wrangler".to_string(),
            resource: "d1".to_string(),
            project_root: PathBuf::from("."),
            backup_dir: PathBuf::from("backups"),
            dry_run: false,
            retry: RetryPolicy::default(),
            migration_timeout: Duration::from_secs(120),
            backup_timeout: Duration::from_secs(300),
        }
    }
}

/// Coordinates migrations, backups, and cleanups across environments.
pub struct DatabaseOrchestrator {
    migrations: MigrationService,
    backups: BackupService,
    cleanups: CleanupService,
    state: Arc<StateManager>,
    dry_run: bool,
}

impl DatabaseOrchestrator {
    pub fn new(
        config: DatabaseOrchestratorConfig,
        runner: Arc<dyn CommandRunner>,
        provisioner: Arc<dyn DatabaseProvisioner>,
        state: Arc<StateManager>,
    ) -> Self {
        Self::with_gate(config, runner, provisioner, state, Arc::new(DenyByDefault))
    }

    pub fn with_gate(
        config: DatabaseOrchestratorConfig,
        runner: Arc<dyn CommandRunner>,
        provisioner: Arc<dyn DatabaseProvisioner>,
        state: Arc<StateManager>,
        gate: Arc<dyn ConfirmationGate>,
    ) -> Self {
        let commands = CommandBuilder::new(&config.cli, &config.resource, &config.project_root);
        Self {
            migrations: MigrationService::new(
                runner.clone(),
                provisioner,
                commands.clone(),
                config.retry.clone(),
                config.migration_timeout,
                config.dry_run,
            ),
            backups: BackupService::new(
                runner.clone(),
                commands.clone(),
                config.retry.clone(),
                config.backup_dir,
                config.backup_timeout,
                config.dry_run,
            ),
            cleanups: CleanupService::new(
                runner,
                commands,
                config.retry,
                gate,
                config.migration_timeout,
                config.dry_run,
            ),
            state,
            dry_run: config.dry_run,
        }
    }

    /// Apply migrations across the requested environments.
    ///
    /// Environments run in request order and fail independently. An
    /// unknown environment name is a skip, not an error. Staging and
    /// production get a backup first unless `skip_backup` is set. With
    /// `continue_on_error` the summary records failures; without it the
    /// first failing environment aborts the run.
    #[instrument(skip(self, domains), fields(environments = options.environments.len()))]
    pub async fn apply_migrations_across_environments(
        &self,
        options: &MigrationRunOptions,
        domains: &[Domain],
    ) -> Result<MigrationRunSummary> {
        let started = Instant::now();
        let mut results = Vec::with_capacity(options.environments.len());
        let mut totals = RunTotals {
            total: options.environments.len(),
            ..RunTotals::default()
        };

        for name in &options.environments {
            let Ok(environment) = name.parse::<Environment>() else {
                warn!(environment = %name, "unknown environment, skipping");
                totals.skipped += 1;
                results.push(EnvironmentMigrationResult {
                    environment: name.clone(),
                    status: EnvironmentRunStatus::Skipped,
                    backup: None,
                    migrations: Vec::new(),
                    error: None,
                });
                continue;
            };

            let result = self
                .migrate_environment(environment, domains, options.skip_backup)
                .await;

            match result {
                Ok(env_result) if env_result.status == EnvironmentRunStatus::Failed => {
                    let reason = env_result.error.clone().unwrap_or_default();
                    error!(%environment, error = %reason, "environment migration failed");
                    totals.failed += 1;
                    if !options.continue_on_error {
                        return Err(DatabaseError::EnvironmentFailed {
                            environment: environment.to_string(),
                            reason,
                        });
                    }
                    results.push(env_result);
                }
                Ok(env_result) => {
                    totals.successful += 1;
                    results.push(env_result);
                }
                Err(err) => {
                    error!(%environment, error = %err, "environment migration failed");
                    totals.failed += 1;
                    if !options.continue_on_error {
                        return Err(DatabaseError::EnvironmentFailed {
                            environment: environment.to_string(),
                            reason: err.to_string(),
                        });
                    }
                    results.push(EnvironmentMigrationResult {
                        environment: environment.to_string(),
                        status: EnvironmentRunStatus::Failed,
                        backup: None,
                        migrations: Vec::new(),
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        Ok(MigrationRunSummary {
            totals,
            duration_ms: started.elapsed().as_millis() as u64,
            environments: results,
        })
    }

    /// One environment: policy backup, then every configured database.
    async fn migrate_environment(
        &self,
        environment: Environment,
        domains: &[Domain],
        skip_backup: bool,
    ) -> Result<EnvironmentMigrationResult> {
        let backup = if environment.requires_backup() && !skip_backup {
            let record = self.backup_environment(environment, domains).await?;
            if !record.all_completed() && !self.dry_run {
                return Err(DatabaseError::EnvironmentFailed {
                    environment: environment.to_string(),
                    reason: "pre-migration backup incomplete".to_string(),
                });
            }
            Some(record)
        } else {
            None
        };

        let mut migrations = Vec::new();
        for domain in domains {
            let Some(descriptor) = domain.database(environment) else {
                continue;
            };
            if !domain.features.migrations {
                migrations.push(MigrationResult {
                    database: descriptor.name.clone(),
                    binding: descriptor.binding.clone(),
                    environment,
                    migrations_applied: 0,
                    status: MigrationStatus::Skipped,
                    output: String::new(),
                });
                continue;
            }

            let result = self
                .migrations
                .apply_database_migrations(&descriptor.name, &descriptor.binding, environment)
                .await;

            match result {
                Ok(result) => {
                    self.state
                        .log_audit_event(
                            "migrations_applied",
                            AuditScope::Environment(environment),
                            json!({
                                "domain": domain.name,
                                "database": result.database,
                                "applied": result.migrations_applied,
                                "status": result.status,
                            }),
                        )
                        .await;
                    migrations.push(result);
                }
                Err(err) => {
                    self.state
                        .log_audit_event(
                            "migrations_failed",
                            AuditScope::Environment(environment),
                            json!({
                                "domain": domain.name,
                                "database": descriptor.name,
                                "error": err.to_string(),
                            }),
                        )
                        .await;
                    // Remaining databases in this environment are not
                    // attempted; the failed one keeps its entry.
                    migrations.push(MigrationResult {
                        database: descriptor.name.clone(),
                        binding: descriptor.binding.clone(),
                        environment,
                        migrations_applied: 0,
                        status: MigrationStatus::Failed,
                        output: err.to_string(),
                    });
                    return Ok(EnvironmentMigrationResult {
                        environment: environment.to_string(),
                        status: EnvironmentRunStatus::Failed,
                        backup,
                        migrations,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        info!(%environment, databases = migrations.len(), "environment migrated");
        Ok(EnvironmentMigrationResult {
            environment: environment.to_string(),
            status: EnvironmentRunStatus::Completed,
            backup,
            migrations,
            error: None,
        })
    }

    /// Back up every database the domains configure for the environment.
    pub async fn backup_environment(
        &self,
        environment: Environment,
        domains: &[Domain],
    ) -> Result<BackupRecord> {
        match self.backups.create_environment_backup(environment, domains).await {
            Ok(record) => {
                self.state
                    .log_audit_event(
                        "backup_created",
                        AuditScope::Environment(environment),
                        json!({
                            "backup_id": record.backup_id,
                            "databases": record.databases.len(),
                            "completed": record.all_completed(),
                        }),
                    )
                    .await;
                Ok(record)
            }
            Err(err) => {
                self.state
                    .log_audit_event(
                        "backup_failed",
                        AuditScope::Environment(environment),
                        json!({ "error": err.to_string() }),
                    )
                    .await;
                Err(err)
            }
        }
    }

    /// Clean up data in one environment, taking a backup first where the
    /// environment's policy requires one and the caller did not skip it.
    pub async fn cleanup_environment(
        &self,
        environment: Environment,
        domains: &[Domain],
        options: &CleanupOptions,
    ) -> Result<CleanupReport> {
        if environment.requires_backup() && !options.skip_backup && !self.dry_run {
            self.backup_environment(environment, domains).await?;
        }

        let report = self
            .cleanups
            .cleanup_environment(environment, domains, options)
            .await;

        match &report {
            Ok(report) => {
                self.state
                    .log_audit_event(
                        "cleanup_completed",
                        AuditScope::Environment(environment),
                        json!({
                            "kind": report.kind,
                            "statements": report.statements_executed(),
                            "completed": report.all_completed(),
                        }),
                    )
                    .await;
            }
            Err(err) => {
                self.state
                    .log_audit_event(
                        "cleanup_failed",
                        AuditScope::Environment(environment),
                        json!({ "error": err.to_string() }),
                    )
                    .await;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::{ApproveAll, CleanupKind};
    use convoy_platform::{ScriptedRunner, StaticProvisioner};
    use convoy_state::StateManagerConfig;
    use convoy_types::DatabaseDescriptor;
    use std::collections::HashMap;

    fn domain(name: &str, db: &str, environments: &[Environment]) -> Domain {
        let mut databases = HashMap::new();
        for env in environments {
            databases.insert(*env, DatabaseDescriptor::new(db, "DB"));
        }
        Domain {
            name: name.to_string(),
            account_id: "a".repeat(32),
            zone_id: "b".repeat(32),
            databases,
            services: vec![name.to_string()],
            features: convoy_types::DomainFeatures::full(),
        }
    }

    fn config(backup_dir: &std::path::Path) -> DatabaseOrchestratorConfig {
        DatabaseOrchestratorConfig {
            backup_dir: backup_dir.to_path_buf(),
            retry: RetryPolicy {
                max_attempts: 1,
                delay: Duration::from_millis(1),
            },
            ..DatabaseOrchestratorConfig::default()
        }
    }

    fn state() -> Arc<StateManager> {
        Arc::new(StateManager::new(StateManagerConfig {
            enable_persistence: Some(false),
            ..StateManagerConfig::default()
        }))
    }

    #[tokio::test]
    async fn test_development_gets_no_policy_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_ok("Applied 2 migrations");
        let orch = DatabaseOrchestrator::new(
            config(tmp.path()),
            runner.clone(),
            Arc::new(StaticProvisioner::with_databases(["shop-db"])),
            state(),
        );

        let summary = orch
            .apply_migrations_across_environments(
                &MigrationRunOptions {
                    environments: vec!["development".into()],
                    skip_backup: false,
                    continue_on_error: false,
                },
                &[domain("shop.example.com", "shop-db", &[Environment::Development])],
            )
            .await
            .unwrap();

        assert_eq!(summary.totals.successful, 1);
        // Only the migration command ran, no export.
        assert_eq!(runner.invocation_count(), 1);
        assert!(summary.environments[0].backup.is_none());
    }

    #[tokio::test]
    async fn test_staging_backed_up_before_migrating() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_ok("exported");
        runner.push_ok("Applied 1 migration");
        let state = state();
        let orch = DatabaseOrchestrator::new(
            config(tmp.path()),
            runner.clone(),
            Arc::new(StaticProvisioner::with_databases(["shop-db"])),
            state.clone(),
        );

        let summary = orch
            .apply_migrations_across_environments(
                &MigrationRunOptions {
                    environments: vec!["staging".into()],
                    skip_backup: false,
                    continue_on_error: false,
                },
                &[domain("shop.example.com", "shop-db", &[Environment::Staging])],
            )
            .await
            .unwrap();

        let lines: Vec<String> = runner
            .invocations()
            .iter()
            .map(|spec| spec.display_line())
            .collect();
        assert!(lines[0].contains("export"), "{}", lines[0]);
        assert!(lines[1].contains("migrations apply"), "{}", lines[1]);

        let backup = summary.environments[0].backup.as_ref().unwrap();
        assert!(backup.all_completed());

        let events: Vec<String> = state
            .audit_log()
            .into_iter()
            .map(|event| event.event)
            .collect();
        assert!(events.contains(&"backup_created".to_string()));
        assert!(events.contains(&"migrations_applied".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_environment_skipped_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_ok("Applied 1 migration");
        let orch = DatabaseOrchestrator::new(
            config(tmp.path()),
            runner,
            Arc::new(StaticProvisioner::with_databases(["shop-db"])),
            state(),
        );

        let summary = orch
            .apply_migrations_across_environments(
                &MigrationRunOptions {
                    environments: vec!["qa".into(), "development".into()],
                    skip_backup: false,
                    continue_on_error: false,
                },
                &[domain("shop.example.com", "shop-db", &[Environment::Development])],
            )
            .await
            .unwrap();

        assert_eq!(summary.totals.skipped, 1);
        assert_eq!(summary.totals.successful, 1);
        assert_eq!(
            summary.environments[0].status,
            EnvironmentRunStatus::Skipped
        );
    }

    #[tokio::test]
    async fn test_continue_on_error_records_and_proceeds() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        // development: migration fails. staging: export then migration succeed.
        runner.push_failed("SQLITE_ERROR");
        runner.push_ok("exported");
        runner.push_ok("Applied 1 migration");
        let orch = DatabaseOrchestrator::new(
            config(tmp.path()),
            runner,
            Arc::new(StaticProvisioner::with_databases(["shop-db"])),
            state(),
        );

        let environments = vec!["development".into(), "staging".into()];
        let domains = [domain(
            "shop.example.com",
            "shop-db",
            &[Environment::Development, Environment::Staging],
        )];

        let summary = orch
            .apply_migrations_across_environments(
                &MigrationRunOptions {
                    environments,
                    skip_backup: false,
                    continue_on_error: true,
                },
                &domains,
            )
            .await
            .unwrap();

        assert_eq!(summary.totals.failed, 1);
        assert_eq!(summary.totals.successful, 1);
        assert_eq!(summary.environments[0].status, EnvironmentRunStatus::Failed);
        assert!(summary.environments[0]
            .error
            .as_deref()
            .unwrap()
            .contains("SQLITE_ERROR"));
        // The failed database keeps a per-database entry.
        let failed = &summary.environments[0].migrations;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status, MigrationStatus::Failed);
        assert!(failed[0].output.contains("SQLITE_ERROR"));
    }

    #[tokio::test]
    async fn test_halt_on_first_failure_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_failed("SQLITE_ERROR");
        let orch = DatabaseOrchestrator::new(
            config(tmp.path()),
            runner,
            Arc::new(StaticProvisioner::with_databases(["shop-db"])),
            state(),
        );

        let err = orch
            .apply_migrations_across_environments(
                &MigrationRunOptions {
                    environments: vec!["development".into(), "staging".into()],
                    skip_backup: false,
                    continue_on_error: false,
                },
                &[domain(
                    "shop.example.com",
                    "shop-db",
                    &[Environment::Development, Environment::Staging],
                )],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DatabaseError::EnvironmentFailed { .. }));
    }

    #[tokio::test]
    async fn test_cleanup_backs_up_first_and_audits() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_ok("exported");
        runner.push_ok("ok");
        let state = state();
        let orch = DatabaseOrchestrator::with_gate(
            config(tmp.path()),
            runner.clone(),
            Arc::new(StaticProvisioner::with_databases(["shop-db"])),
            state.clone(),
            Arc::new(ApproveAll),
        );

        let report = orch
            .cleanup_environment(
                Environment::Production,
                &[domain("shop.example.com", "shop-db", &[Environment::Production])],
                &CleanupOptions {
                    kind: CleanupKind::LogsOnly,
                    skip_backup: false,
                    force: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(report.statements_executed(), 1);
        let lines: Vec<String> = runner
            .invocations()
            .iter()
            .map(|spec| spec.display_line())
            .collect();
        assert!(lines[0].contains("export"));
        assert!(lines[1].contains("DELETE FROM logs"));

        let events: Vec<String> = state
            .audit_log()
            .into_iter()
            .map(|event| event.event)
            .collect();
        assert!(events.contains(&"cleanup_completed".to_string()));
    }

    #[tokio::test]
    async fn test_development_cleanup_takes_no_policy_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_ok("ok");
        let orch = DatabaseOrchestrator::with_gate(
            config(tmp.path()),
            runner.clone(),
            Arc::new(StaticProvisioner::with_databases(["shop-db"])),
            state(),
            Arc::new(ApproveAll),
        );

        let report = orch
            .cleanup_environment(
                Environment::Development,
                &[domain(
                    "shop.example.com",
                    "shop-db",
                    &[Environment::Development],
                )],
                &CleanupOptions {
                    kind: CleanupKind::LogsOnly,
                    skip_backup: false,
                    force: false,
                },
            )
            .await
            .unwrap();

        assert!(report.all_completed());
        // Only the DELETE ran; no export preceded it.
        assert_eq!(runner.invocation_count(), 1);
        assert!(runner.invocations()[0]
            .display_line()
            .contains("DELETE FROM logs"));
    }
}
