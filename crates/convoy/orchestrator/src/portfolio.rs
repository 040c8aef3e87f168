//! Multi-domain portfolio facade.
//!
//! The facade resolves the requested domains once up front, pre-populates
//! their states, then deploys them with a bounded number in flight.
//! Lifecycle milestones are mirrored onto a broadcast stream so callers
//! can watch a run without polling the state manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use convoy_resilience::{CircuitBreaker, CircuitStatus};
use convoy_resolver::{DomainRegistry, DomainSource};
use convoy_state::StateManager;
use convoy_types::{
    AuditScope, DeploymentId, Domain, DomainStatus, Environment, EventEnvelope, EventSource,
    MigrationStatus, OrchestratorEvent, OrchestrationId, PortfolioState,
};
use serde_json::json;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::coordinator::{DeploymentCoordinator, DomainDeployment};
use crate::error::Result;

/// Aggregate result of one portfolio run.
#[derive(Debug, Clone)]
pub struct PortfolioSummary {
    pub orchestration_id: OrchestrationId,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,

    /// Domains never launched because an earlier failure stopped the run.
    pub skipped: usize,

    pub duration_ms: u64,

    /// Per-domain records for the domains that did run.
    pub deployments: Vec<DomainDeployment>,
}

/// Orchestrates deployments across a portfolio of domains.
pub struct MultiDomainOrchestrator {
    registry: DomainRegistry,
    coordinator: Arc<DeploymentCoordinator>,
    state: Arc<StateManager>,
    breaker: Arc<CircuitBreaker>,
    events: broadcast::Sender<EventEnvelope>,
    orchestration_id: OrchestrationId,
    environment: Environment,
    parallel_deployments: usize,
    continue_on_error: bool,
    domains: RwLock<Vec<Domain>>,
}

impl MultiDomainOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        registry: DomainRegistry,
        coordinator: Arc<DeploymentCoordinator>,
        state: Arc<StateManager>,
        breaker: Arc<CircuitBreaker>,
        environment: Environment,
        parallel_deployments: usize,
        continue_on_error: bool,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity);
        Self {
            registry,
            coordinator,
            state,
            breaker,
            events,
            orchestration_id: OrchestrationId::generate(),
            environment,
            parallel_deployments: parallel_deployments.max(1),
            continue_on_error,
            domains: RwLock::new(Vec::new()),
        }
    }

    /// Watch the run's lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    pub fn orchestration_id(&self) -> &OrchestrationId {
        &self.orchestration_id
    }

    /// Snapshot of the run's portfolio state.
    pub fn portfolio_state(&self) -> PortfolioState {
        self.state.get_state()
    }

    /// Read-only snapshot of every domain circuit.
    pub fn circuit_statuses(&self) -> Vec<CircuitStatus> {
        self.breaker.all_statuses()
    }

    /// Resolve the requested domains and register them all as pending.
    ///
    /// A single unresolvable name aborts the whole run before any state
    /// is touched.
    #[instrument(skip(self), fields(requested = names.len()))]
    pub async fn initialize(&self, names: &[String]) -> Result<()> {
        let mut resolved = Vec::with_capacity(names.len());
        for resolution in self.registry.resolve_multiple_domains(names) {
            resolved.push(resolution.outcome?);
        }

        self.state.initialize_domain_states(&resolved);
        let domain_names: Vec<String> = resolved.iter().map(|d| d.name.clone()).collect();
        *self.domains.write().expect("domain list poisoned") = resolved;

        self.publish(OrchestratorEvent::PortfolioInitialized {
            domains: domain_names.clone(),
        });
        self.state
            .log_audit_event(
                "portfolio_initialized",
                AuditScope::All,
                json!({ "domains": domain_names }),
            )
            .await;
        info!(domains = domain_names.len(), "portfolio initialized");
        Ok(())
    }

    /// Deploy one domain by name, resolving it on the fly if the run was
    /// not initialized with it.
    pub async fn deploy_single_domain(&self, name: &str) -> Result<DomainDeployment> {
        let known = {
            let domains = self.domains.read().expect("domain list poisoned");
            domains.iter().find(|d| d.name == name).cloned()
        };
        let domain = match known {
            Some(domain) => domain,
            None => {
                let domain = self
                    .registry
                    .resolve_domain(&DomainSource::Named(name.to_string()))?;
                self.state
                    .initialize_domain_states(std::slice::from_ref(&domain));
                domain
            }
        };

        Ok(self.run_domain(&domain).await)
    }

    /// Deploy every initialized domain, at most `parallel_deployments`
    /// in flight.
    ///
    /// With `continue_on_error` disabled, the first failure stops new
    /// launches; deployments already in flight run to completion.
    #[instrument(skip(self), fields(orchestration_id = %self.orchestration_id))]
    pub async fn deploy_portfolio(self: &Arc<Self>) -> Result<PortfolioSummary> {
        let domains = self.domains.read().expect("domain list poisoned").clone();
        let started = Instant::now();
        let total = domains.len();

        let semaphore = Arc::new(Semaphore::new(self.parallel_deployments));
        let stop = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for (index, domain) in domains.into_iter().enumerate() {
            let orchestrator = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let stop = Arc::clone(&stop);
            tasks.spawn(async move {
                // A closed semaphore is unreachable; it lives as long as
                // every task.
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                if stop.load(Ordering::SeqCst) {
                    warn!(domain = %domain.name, "launch skipped after earlier failure");
                    return (index, None);
                }

                let deployment = orchestrator.run_domain(&domain).await;
                if !deployment.succeeded() && !orchestrator.continue_on_error {
                    stop.store(true, Ordering::SeqCst);
                }
                (index, Some(deployment))
            });
        }

        let mut indexed: Vec<(usize, Option<DomainDeployment>)> = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => indexed.push(entry),
                Err(e) => warn!(error = %e, "deployment task panicked"),
            }
        }
        indexed.sort_by_key(|(index, _)| *index);

        let mut summary = PortfolioSummary {
            orchestration_id: self.orchestration_id.clone(),
            total,
            successful: 0,
            failed: 0,
            skipped: 0,
            duration_ms: 0,
            deployments: Vec::new(),
        };
        for (_, deployment) in indexed {
            match deployment {
                Some(deployment) if deployment.succeeded() => {
                    summary.successful += 1;
                    summary.deployments.push(deployment);
                }
                Some(deployment) => {
                    summary.failed += 1;
                    summary.deployments.push(deployment);
                }
                None => summary.skipped += 1,
            }
        }
        summary.duration_ms = started.elapsed().as_millis() as u64;

        self.state.finish();
        self.publish(OrchestratorEvent::PortfolioCompleted {
            successful: summary.successful,
            failed: summary.failed,
            duration_ms: summary.duration_ms,
        });
        self.state
            .log_audit_event(
                "portfolio_completed",
                AuditScope::All,
                json!({
                    "successful": summary.successful,
                    "failed": summary.failed,
                    "skipped": summary.skipped,
                }),
            )
            .await;
        info!(
            successful = summary.successful,
            failed = summary.failed,
            skipped = summary.skipped,
            "portfolio run finished"
        );
        Ok(summary)
    }

    /// Deploy one resolved domain and mirror its milestones onto the
    /// event stream.
    async fn run_domain(&self, domain: &Domain) -> DomainDeployment {
        let deployment_id = DeploymentId::generate();
        self.publish_from(
            EventSource::Coordinator,
            OrchestratorEvent::DomainStarted {
                domain: domain.name.clone(),
                deployment_id: deployment_id.clone(),
            },
        );
        let deployment = self.coordinator.deploy_domain(domain, deployment_id).await;
        self.publish_database_milestones(domain, &deployment);

        match deployment.status {
            DomainStatus::Completed => {
                self.publish_from(
                    EventSource::Coordinator,
                    OrchestratorEvent::DomainCompleted {
                        domain: domain.name.clone(),
                        deployment_id: deployment.deployment_id.clone(),
                        duration_ms: deployment.duration_ms,
                    },
                );
            }
            DomainStatus::RolledBack => {
                self.publish_from(
                    EventSource::Coordinator,
                    OrchestratorEvent::DomainFailed {
                        domain: domain.name.clone(),
                        reason: deployment.error.clone().unwrap_or_default(),
                    },
                );
                self.publish_from(
                    EventSource::Coordinator,
                    OrchestratorEvent::DomainRolledBack {
                        domain: domain.name.clone(),
                        steps_replayed: self.state.rollback_plan_for(&domain.name).len(),
                    },
                );
            }
            _ => {
                self.publish_from(
                    EventSource::Coordinator,
                    OrchestratorEvent::DomainFailed {
                        domain: domain.name.clone(),
                        reason: deployment.error.clone().unwrap_or_default(),
                    },
                );
            }
        }

        self.state
            .log_audit_event(
                "domain_deployed",
                AuditScope::Domain(domain.name.clone()),
                json!({
                    "environment": self.environment,
                    "status": deployment.status,
                    "duration_ms": deployment.duration_ms,
                    "error": deployment.error,
                }),
            )
            .await;
        deployment
    }

    /// Mirror the backups and migrations a deployment performed onto the
    /// event stream, tagged as coming from the database engine.
    fn publish_database_milestones(&self, domain: &Domain, deployment: &DomainDeployment) {
        let Some(summary) = &deployment.migrations else {
            return;
        };
        for env_result in &summary.environments {
            if let Some(backup) = &env_result.backup {
                self.publish_from(
                    EventSource::Database,
                    OrchestratorEvent::BackupCreated {
                        environment: backup.environment,
                        backup_id: backup.backup_id.clone(),
                        databases: backup.databases.len(),
                    },
                );
            }
            for migration in &env_result.migrations {
                if migration.status != MigrationStatus::Applied {
                    continue;
                }
                self.publish_from(
                    EventSource::Database,
                    OrchestratorEvent::MigrationsApplied {
                        domain: domain.name.clone(),
                        database: migration.database.clone(),
                        environment: migration.environment,
                        migrations_applied: migration.migrations_applied,
                    },
                );
            }
        }
    }

    /// Portfolio-level events come from the façade itself.
    fn publish(&self, event: OrchestratorEvent) {
        self.publish_from(EventSource::Orchestrator, event);
    }

    /// Lagging or absent subscribers never fail a deployment.
    fn publish_from(&self, source: EventSource, event: OrchestratorEvent) {
        let envelope = EventEnvelope::new(event, source, self.orchestration_id.clone());
        let _ = self.events.send(envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::OrchestratorBuilder;
    use crate::hooks::{LifecycleEvent, RecordingHook};
    use convoy_database::{DatabaseOrchestratorConfig, RetryPolicy};
    use convoy_platform::{FailingDeployer, NoOpDeployer, ScriptedRunner, StaticProvisioner};
    use convoy_resolver::DomainConfig;
    use convoy_state::StateManagerConfig;
    use convoy_types::DatabaseDescriptor;
    use std::collections::HashMap;
    use std::time::Duration;

    fn domain_config(db: &str) -> DomainConfig {
        let mut databases = HashMap::new();
        databases.insert(
            Environment::Development,
            DatabaseDescriptor::new(db, "DB"),
        );
        DomainConfig {
            account_id: "a".repeat(32),
            zone_id: "b".repeat(32),
            databases,
            services: Vec::new(),
            features: None,
        }
    }

    struct Harness {
        orchestrator: Arc<MultiDomainOrchestrator>,
        runner: Arc<ScriptedRunner>,
        _tmp: tempfile::TempDir,
    }

    fn build(registry: DomainRegistry, databases: &[&str]) -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let orchestrator = OrchestratorBuilder::new(registry, Environment::Development)
            .runner(runner.clone())
            .provisioner(Arc::new(StaticProvisioner::with_databases(
                databases.iter().copied(),
            )))
            .deployer(Arc::new(NoOpDeployer))
            .database_config(DatabaseOrchestratorConfig {
                backup_dir: tmp.path().to_path_buf(),
                retry: RetryPolicy {
                    max_attempts: 1,
                    delay: Duration::from_millis(1),
                },
                ..DatabaseOrchestratorConfig::default()
            })
            .state_config(StateManagerConfig {
                enable_persistence: Some(false),
                ..StateManagerConfig::default()
            })
            .parallel_deployments(1)
            .build();
        Harness {
            orchestrator,
            runner,
            _tmp: tmp,
        }
    }

    #[tokio::test]
    async fn test_initialize_registers_all_domains_as_pending() {
        let registry = DomainRegistry::new()
            .with_domain("a.example.com", domain_config("a-db"))
            .with_domain("b.example.com", domain_config("b-db"));
        let hx = build(registry, &["a-db", "b-db"]);

        hx.orchestrator
            .initialize(&["a.example.com".into(), "b.example.com".into()])
            .await
            .unwrap();

        let state = hx.orchestrator.portfolio_state();
        assert_eq!(state.domains.len(), 2);
        assert!(state
            .domains
            .values()
            .all(|d| d.status == DomainStatus::Pending));
    }

    #[tokio::test]
    async fn test_initialize_aborts_on_unknown_domain() {
        let registry =
            DomainRegistry::new().with_domain("a.example.com", domain_config("a-db"));
        let hx = build(registry, &["a-db"]);

        let err = hx
            .orchestrator
            .initialize(&["a.example.com".into(), "missing.example.com".into()])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("missing.example.com"));
    }

    #[tokio::test]
    async fn test_portfolio_deploys_every_domain_and_streams_events() {
        let registry = DomainRegistry::new()
            .with_domain("a.example.com", domain_config("a-db"))
            .with_domain("b.example.com", domain_config("b-db"));
        let hx = build(registry, &["a-db", "b-db"]);
        // One migration command per domain; development takes no backup.
        hx.runner.push_ok("Applied 1 migration");
        hx.runner.push_ok("Applied 1 migration");

        let mut events = hx.orchestrator.subscribe();
        hx.orchestrator
            .initialize(&["a.example.com".into(), "b.example.com".into()])
            .await
            .unwrap();

        let summary = hx.orchestrator.deploy_portfolio().await.unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.deployments.len(), 2);

        let mut seen = Vec::new();
        while let Ok(envelope) = events.try_recv() {
            seen.push(envelope);
        }
        assert!(matches!(
            seen.first().map(|e| &e.event),
            Some(OrchestratorEvent::PortfolioInitialized { .. })
        ));
        assert!(matches!(
            seen.last().map(|e| &e.event),
            Some(OrchestratorEvent::PortfolioCompleted { .. })
        ));
        let completed = seen
            .iter()
            .filter(|e| matches!(e.event, OrchestratorEvent::DomainCompleted { .. }))
            .count();
        assert_eq!(completed, 2);

        // Migration milestones are mirrored too, tagged by component.
        let migrations: Vec<_> = seen
            .iter()
            .filter(|e| matches!(e.event, OrchestratorEvent::MigrationsApplied { .. }))
            .collect();
        assert_eq!(migrations.len(), 2);
        assert!(migrations.iter().all(|e| e.source == EventSource::Database));
        assert!(seen
            .iter()
            .filter(|e| matches!(e.event, OrchestratorEvent::DomainStarted { .. }))
            .all(|e| e.source == EventSource::Coordinator));
    }

    #[tokio::test]
    async fn test_staging_portfolio_streams_backup_event() {
        let mut databases = HashMap::new();
        databases.insert(
            Environment::Staging,
            DatabaseDescriptor::new("a-db", "DB"),
        );
        let registry = DomainRegistry::new().with_domain(
            "a.example.com",
            DomainConfig {
                account_id: "a".repeat(32),
                zone_id: "b".repeat(32),
                databases,
                services: Vec::new(),
                features: None,
            },
        );
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_ok("exported");
        runner.push_ok("Applied 1 migration");
        let orchestrator = OrchestratorBuilder::new(registry, Environment::Staging)
            .runner(runner.clone())
            .provisioner(Arc::new(StaticProvisioner::with_databases(["a-db"])))
            .deployer(Arc::new(NoOpDeployer))
            .state_config(StateManagerConfig {
                enable_persistence: Some(false),
                ..StateManagerConfig::default()
            })
            .database_config(DatabaseOrchestratorConfig {
                backup_dir: tmp.path().to_path_buf(),
                retry: RetryPolicy {
                    max_attempts: 1,
                    delay: Duration::from_millis(1),
                },
                ..DatabaseOrchestratorConfig::default()
            })
            .build();

        let mut events = orchestrator.subscribe();
        orchestrator
            .initialize(&["a.example.com".into()])
            .await
            .unwrap();
        let summary = orchestrator.deploy_portfolio().await.unwrap();
        assert_eq!(summary.successful, 1);

        let mut backup_events = 0;
        while let Ok(envelope) = events.try_recv() {
            if let OrchestratorEvent::BackupCreated { backup_id, databases, .. } = &envelope.event {
                assert!(backup_id.starts_with("backup-staging-"));
                assert_eq!(*databases, 1);
                assert_eq!(envelope.source, EventSource::Database);
                backup_events += 1;
            }
        }
        assert_eq!(backup_events, 1);
    }

    #[tokio::test]
    async fn test_first_failure_stops_new_launches() {
        let failing = |db: &str| DomainConfig {
            services: vec!["web".to_string()],
            ..domain_config(db)
        };
        let registry = DomainRegistry::new()
            .with_domain("a.example.com", failing("a-db"))
            .with_domain("b.example.com", failing("b-db"))
            .with_domain("c.example.com", failing("c-db"));
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        // Every domain's "web" service fails to deploy, so whichever
        // domain launches first fails and stops the rest.
        let orchestrator = OrchestratorBuilder::new(registry, Environment::Development)
            .runner(runner.clone())
            .provisioner(Arc::new(StaticProvisioner::with_databases([
                "a-db", "b-db", "c-db",
            ])))
            .deployer(Arc::new(FailingDeployer::new("web")))
            .state_config(StateManagerConfig {
                enable_persistence: Some(false),
                ..StateManagerConfig::default()
            })
            .database_config(DatabaseOrchestratorConfig {
                backup_dir: tmp.path().to_path_buf(),
                ..DatabaseOrchestratorConfig::default()
            })
            .parallel_deployments(1)
            .continue_on_error(false)
            .build();

        orchestrator
            .initialize(&[
                "a.example.com".into(),
                "b.example.com".into(),
                "c.example.com".into(),
            ])
            .await
            .unwrap();

        let summary = orchestrator.deploy_portfolio().await.unwrap();

        // With one domain in flight at a time, the failure stops the
        // remaining launches.
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.successful, 0);
    }

    #[tokio::test]
    async fn test_single_domain_deploy_with_hooks() {
        let registry =
            DomainRegistry::new().with_domain("a.example.com", domain_config("a-db"));
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let before = Arc::new(RecordingHook::new());
        let after = Arc::new(RecordingHook::new());
        let orchestrator = OrchestratorBuilder::new(registry, Environment::Development)
            .runner(runner.clone())
            .provisioner(Arc::new(StaticProvisioner::with_databases(["a-db"])))
            .hook(LifecycleEvent::BeforeDomain, before.clone())
            .hook(LifecycleEvent::AfterDomain, after.clone())
            .state_config(StateManagerConfig {
                enable_persistence: Some(false),
                ..StateManagerConfig::default()
            })
            .database_config(DatabaseOrchestratorConfig {
                backup_dir: tmp.path().to_path_buf(),
                ..DatabaseOrchestratorConfig::default()
            })
            .build();

        runner.push_ok("Applied 1 migration");

        let deployment = orchestrator
            .deploy_single_domain("a.example.com")
            .await
            .unwrap();

        assert!(deployment.succeeded());
        assert_eq!(before.calls().len(), 1);
        assert_eq!(after.calls().len(), 1);
        assert_eq!(before.calls()[0].1, "a.example.com");
    }

    #[tokio::test]
    async fn test_dry_run_portfolio_issues_no_commands() {
        let registry =
            DomainRegistry::new().with_domain("a.example.com", domain_config("a-db"));
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let orchestrator = OrchestratorBuilder::new(registry, Environment::Development)
            .runner(runner.clone())
            .provisioner(Arc::new(StaticProvisioner::with_databases(["a-db"])))
            .state_config(StateManagerConfig {
                enable_persistence: Some(false),
                ..StateManagerConfig::default()
            })
            .database_config(DatabaseOrchestratorConfig {
                backup_dir: tmp.path().to_path_buf(),
                ..DatabaseOrchestratorConfig::default()
            })
            .dry_run(true)
            .build();

        orchestrator
            .initialize(&["a.example.com".into()])
            .await
            .unwrap();
        let summary = orchestrator.deploy_portfolio().await.unwrap();

        assert_eq!(summary.successful, 1);
        assert_eq!(runner.invocation_count(), 0);
    }
}
