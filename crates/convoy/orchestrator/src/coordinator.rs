//! Per-domain deployment coordinator.
//!
//! Runs one domain through the full phase sequence: circuit check,
//! database provisioning, prerequisite validation, service and secret
//! deployment, schema migrations, post-deploy health validation. Every
//! forward action
//! records its undo step first, so a failure at any phase can replay the
//! plan in reverse. Rollback is best effort; a failing undo step is
//! logged and never masks the original error.

use std::sync::Arc;
use std::time::Instant;

use convoy_database::{DatabaseOrchestrator, MigrationRunOptions, MigrationRunSummary};
use convoy_platform::{DatabaseProvisioner, HealthChecker, ServiceDeployer};
use convoy_resilience::CircuitBreaker;
use convoy_resolver::validate_domain_prerequisites;
use convoy_state::StateManager;
use convoy_types::{
    DeploymentId, Domain, DomainStatePatch, DomainStatus, Environment, ExportStatus,
    RollbackAction, RollbackStep,
};
use tracing::{error, info, instrument, warn};

use crate::error::{OrchestratorError, Result};
use crate::hooks::{HookRegistry, LifecycleEvent};

/// Final record of one domain's deployment attempt.
#[derive(Debug, Clone)]
pub struct DomainDeployment {
    pub domain: String,
    pub deployment_id: DeploymentId,
    pub status: DomainStatus,
    pub duration_ms: u64,
    pub error: Option<String>,

    /// Full migration detail when the phase sequence reached and
    /// completed migrations.
    pub migrations: Option<MigrationRunSummary>,
}

impl DomainDeployment {
    pub fn succeeded(&self) -> bool {
        self.status == DomainStatus::Completed
    }
}

/// Deploys a single domain end to end.
pub struct DeploymentCoordinator {
    deployer: Arc<dyn ServiceDeployer>,
    health: Arc<dyn HealthChecker>,
    provisioner: Arc<dyn DatabaseProvisioner>,
    database: Arc<DatabaseOrchestrator>,
    breaker: Arc<CircuitBreaker>,
    state: Arc<StateManager>,
    hooks: Arc<HookRegistry>,
    environment: Environment,
    dry_run: bool,
}

impl DeploymentCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        deployer: Arc<dyn ServiceDeployer>,
        health: Arc<dyn HealthChecker>,
        provisioner: Arc<dyn DatabaseProvisioner>,
        database: Arc<DatabaseOrchestrator>,
        breaker: Arc<CircuitBreaker>,
        state: Arc<StateManager>,
        hooks: Arc<HookRegistry>,
        environment: Environment,
        dry_run: bool,
    ) -> Self {
        Self {
            deployer,
            health,
            provisioner,
            database,
            breaker,
            state,
            hooks,
            environment,
            dry_run,
        }
    }

    /// Deploy one domain, always returning a final record.
    ///
    /// The circuit is consulted before any external call, which puts it
    /// ahead of prerequisite validation: validation with a provisioner
    /// already reaches the platform, and an open circuit must keep the
    /// platform untouched. An open circuit fails the domain without
    /// being counted as a fresh failure. Attempted deployments report
    /// their outcome to the breaker.
    #[instrument(skip(self, domain, deployment_id), fields(domain = %domain.name, environment = %self.environment))]
    pub async fn deploy_domain(
        &self,
        domain: &Domain,
        deployment_id: DeploymentId,
    ) -> DomainDeployment {
        let started = Instant::now();

        self.hooks
            .fire(LifecycleEvent::BeforeDomain, &domain.name)
            .await;
        self.patch_state(
            &domain.name,
            DomainStatePatch::status(DomainStatus::Validating)
                .with_deployment_id(deployment_id.clone())
                .with_started_at(chrono::Utc::now()),
        );

        if !self.breaker.can_execute(&domain.name) {
            warn!(domain = %domain.name, "circuit open, failing fast");
            let reason = OrchestratorError::CircuitOpen {
                domain: domain.name.clone(),
            }
            .to_string();
            self.patch_state(
                &domain.name,
                DomainStatePatch::status(DomainStatus::Failed)
                    .with_error(reason.clone())
                    .with_finished_at(chrono::Utc::now()),
            );
            self.hooks.fire(LifecycleEvent::OnFailure, &domain.name).await;
            return DomainDeployment {
                domain: domain.name.clone(),
                deployment_id,
                status: DomainStatus::Failed,
                duration_ms: started.elapsed().as_millis() as u64,
                error: Some(reason),
                migrations: None,
            };
        }

        match self.run_phases(domain).await {
            Ok(migrations) => {
                self.breaker.record_success(&domain.name);
                self.patch_state(
                    &domain.name,
                    DomainStatePatch::status(DomainStatus::Completed)
                        .with_finished_at(chrono::Utc::now()),
                );
                self.hooks.fire(LifecycleEvent::AfterDomain, &domain.name).await;
                info!(domain = %domain.name, "domain deployed");
                DomainDeployment {
                    domain: domain.name.clone(),
                    deployment_id,
                    status: DomainStatus::Completed,
                    duration_ms: started.elapsed().as_millis() as u64,
                    error: None,
                    migrations,
                }
            }
            Err(err) => {
                error!(domain = %domain.name, error = %err, "domain deployment failed");
                self.breaker.record_failure(&domain.name);
                self.patch_state(
                    &domain.name,
                    DomainStatePatch::status(DomainStatus::Failed)
                        .with_error(err.to_string())
                        .with_finished_at(chrono::Utc::now()),
                );
                self.hooks.fire(LifecycleEvent::OnFailure, &domain.name).await;

                let status = if self.rollback_domain(&domain.name).await {
                    self.patch_state(
                        &domain.name,
                        DomainStatePatch::status(DomainStatus::RolledBack),
                    );
                    self.hooks
                        .fire(LifecycleEvent::OnRollback, &domain.name)
                        .await;
                    DomainStatus::RolledBack
                } else {
                    DomainStatus::Failed
                };

                DomainDeployment {
                    domain: domain.name.clone(),
                    deployment_id,
                    status,
                    duration_ms: started.elapsed().as_millis() as u64,
                    error: Some(err.to_string()),
                    migrations: None,
                }
            }
        }
    }

    /// The forward phase sequence. Any error falls through to the
    /// rollback path in `deploy_domain`. Returns the migration detail
    /// when the migration phase ran.
    async fn run_phases(&self, domain: &Domain) -> Result<Option<MigrationRunSummary>> {
        self.provision_database(domain).await?;

        let report =
            validate_domain_prerequisites(domain, self.environment, Some(self.provisioner.as_ref()))
                .await;
        if !report.valid {
            return Err(OrchestratorError::Validation {
                domain: domain.name.clone(),
                issues: report.issues,
            });
        }

        self.patch_state(&domain.name, DomainStatePatch::status(DomainStatus::Deploying));
        for service in &domain.services {
            if self.dry_run {
                continue;
            }
            self.deployer
                .deploy_service(domain, service, self.environment)
                .await?;
            self.state.record_rollback_step(RollbackStep {
                domain: domain.name.clone(),
                action: RollbackAction::RemoveService {
                    service: service.clone(),
                },
                recorded_at: chrono::Utc::now(),
            });

            if domain.features.secrets {
                let applied = self
                    .deployer
                    .apply_secrets(domain, service, self.environment)
                    .await?;
                for secret in applied {
                    self.state.record_rollback_step(RollbackStep {
                        domain: domain.name.clone(),
                        action: RollbackAction::RemoveSecret {
                            service: service.clone(),
                            secret,
                        },
                        recorded_at: chrono::Utc::now(),
                    });
                }
            }
        }

        let mut migrations = None;
        if domain.features.migrations && domain.database(self.environment).is_some() {
            self.patch_state(&domain.name, DomainStatePatch::status(DomainStatus::Migrating));
            self.hooks
                .fire(LifecycleEvent::BeforeMigrations, &domain.name)
                .await;
            let options = MigrationRunOptions {
                environments: vec![self.environment.to_string()],
                skip_backup: false,
                continue_on_error: false,
            };
            let summary = self
                .database
                .apply_migrations_across_environments(&options, std::slice::from_ref(domain))
                .await?;
            self.record_backup_restore_points(domain, &summary);
            migrations = Some(summary);
            self.hooks
                .fire(LifecycleEvent::AfterMigrations, &domain.name)
                .await;
        }

        if domain.features.health_checks && !self.dry_run {
            let status = self.health.check(domain, self.environment).await?;
            if !status.healthy {
                return Err(OrchestratorError::Unhealthy {
                    domain: domain.name.clone(),
                    status: status.status,
                });
            }
        }

        Ok(migrations)
    }

    /// Create the domain's configured database when it does not exist
    /// yet, recording a drop step so a failed deployment does not leave
    /// an orphan behind. Migrations themselves never create databases.
    async fn provision_database(&self, domain: &Domain) -> Result<()> {
        if !domain.features.migrations || self.dry_run {
            return Ok(());
        }
        let Some(descriptor) = domain.database(self.environment) else {
            return Ok(());
        };
        if self.provisioner.database_exists(&descriptor.name).await? {
            return Ok(());
        }

        let id = self.provisioner.create_database(&descriptor.name).await?;
        info!(domain = %domain.name, database = %descriptor.name, id, "database created");
        self.state.record_rollback_step(RollbackStep {
            domain: domain.name.clone(),
            action: RollbackAction::DropDatabase {
                database: descriptor.name.clone(),
            },
            recorded_at: chrono::Utc::now(),
        });
        Ok(())
    }

    /// Record a restore point per database exported by the policy backup
    /// the migration run took.
    fn record_backup_restore_points(&self, domain: &Domain, summary: &MigrationRunSummary) {
        for env_result in &summary.environments {
            let Some(backup) = &env_result.backup else {
                continue;
            };
            for db in &backup.databases {
                if db.status != ExportStatus::Completed {
                    continue;
                }
                self.state.record_rollback_step(RollbackStep {
                    domain: domain.name.clone(),
                    action: RollbackAction::RestoreBackup {
                        backup_id: backup.backup_id.clone(),
                        database: db.database.clone(),
                    },
                    recorded_at: chrono::Utc::now(),
                });
            }
        }
    }

    /// Replay the domain's recorded undo steps in reverse order.
    ///
    /// Returns true when at least one step was replayed. Undo failures
    /// are logged and skipped.
    async fn rollback_domain(&self, domain: &str) -> bool {
        let plan = self.state.rollback_plan_for(domain);
        if plan.is_empty() {
            return false;
        }

        info!(domain, steps = plan.len(), "rolling back");
        for step in plan.iter().rev() {
            let outcome = match &step.action {
                RollbackAction::RemoveService { service } => {
                    self.deployer.remove_service(service, self.environment).await
                }
                RollbackAction::RemoveSecret { service, secret } => {
                    self.deployer
                        .remove_secret(service, secret, self.environment)
                        .await
                }
                RollbackAction::DropDatabase { database } => {
                    warn!(domain, database, "database drop requires manual action");
                    Ok(())
                }
                RollbackAction::RestoreBackup { backup_id, database } => {
                    warn!(
                        domain,
                        backup_id, database, "backup restore requires manual action"
                    );
                    Ok(())
                }
            };
            if let Err(e) = outcome {
                warn!(domain, action = ?step.action, error = %e, "rollback step failed");
            }
        }
        true
    }

    /// State bookkeeping never fails a deployment; an unknown domain
    /// here means the caller skipped initialization.
    fn patch_state(&self, domain: &str, patch: DomainStatePatch) {
        if let Err(e) = self.state.update_domain_state(domain, patch) {
            warn!(domain, error = %e, "state update dropped");
        }
    }
}
