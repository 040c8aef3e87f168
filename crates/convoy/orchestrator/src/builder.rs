//! Builder wiring collaborators into the portfolio facade.

use std::sync::Arc;

use convoy_database::{
    ConfirmationGate, DatabaseOrchestrator, DatabaseOrchestratorConfig, DenyByDefault,
};
use convoy_platform::{
    AlwaysHealthy, CommandRunner, DatabaseProvisioner, HealthChecker, NoOpDeployer,
    ServiceDeployer, ShellRunner, StaticProvisioner,
};
use convoy_resilience::{CircuitBreaker, CircuitBreakerConfig};
use convoy_resolver::DomainRegistry;
use convoy_state::{StateManager, StateManagerConfig};
use convoy_types::Environment;

use crate::coordinator::DeploymentCoordinator;
use crate::hooks::{HookRegistry, LifecycleEvent, LifecycleHook};
use crate::portfolio::MultiDomainOrchestrator;

/// Assembles a [`MultiDomainOrchestrator`].
///
/// Only the registry and target environment are required. Collaborators
/// default to inert implementations: a no-op deployer, an always-healthy
/// checker, and a confirmation gate that declines destructive cleanups.
/// The command runner defaults to the real shell runner.
pub struct OrchestratorBuilder {
    registry: DomainRegistry,
    environment: Environment,
    runner: Option<Arc<dyn CommandRunner>>,
    provisioner: Option<Arc<dyn DatabaseProvisioner>>,
    deployer: Option<Arc<dyn ServiceDeployer>>,
    health: Option<Arc<dyn HealthChecker>>,
    gate: Option<Arc<dyn ConfirmationGate>>,
    hooks: HookRegistry,
    database: DatabaseOrchestratorConfig,
    breaker: CircuitBreakerConfig,
    state: StateManagerConfig,
    parallel_deployments: usize,
    continue_on_error: bool,
    dry_run: bool,
    event_capacity: usize,
}

impl OrchestratorBuilder {
    pub fn new(registry: DomainRegistry, environment: Environment) -> Self {
        Self {
            registry,
            environment,
            runner: None,
            provisioner: None,
            deployer: None,
            health: None,
            gate: None,
            hooks: HookRegistry::default(),
            database: DatabaseOrchestratorConfig::default(),
            breaker: CircuitBreakerConfig::default(),
            state: StateManagerConfig::default(),
            parallel_deployments: 3,
            continue_on_error: false,
            dry_run: false,
            event_capacity: 256,
        }
    }

    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn provisioner(mut self, provisioner: Arc<dyn DatabaseProvisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    pub fn deployer(mut self, deployer: Arc<dyn ServiceDeployer>) -> Self {
        self.deployer = Some(deployer);
        self
    }

    pub fn health_checker(mut self, health: Arc<dyn HealthChecker>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn confirmation_gate(mut self, gate: Arc<dyn ConfirmationGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn hook(mut self, event: LifecycleEvent, hook: Arc<dyn LifecycleHook>) -> Self {
        self.hooks.register(event, hook);
        self
    }

    pub fn database_config(mut self, config: DatabaseOrchestratorConfig) -> Self {
        self.database = config;
        self
    }

    pub fn breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = config;
        self
    }

    pub fn state_config(mut self, config: StateManagerConfig) -> Self {
        self.state = config;
        self
    }

    pub fn parallel_deployments(mut self, limit: usize) -> Self {
        self.parallel_deployments = limit;
        self
    }

    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Thread dry-run through every layer.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn build(self) -> Arc<MultiDomainOrchestrator> {
        let runner = self.runner.unwrap_or_else(|| Arc::new(ShellRunner::new()));
        let provisioner = self
            .provisioner
            .unwrap_or_else(|| Arc::new(StaticProvisioner::new()));
        let deployer = self.deployer.unwrap_or_else(|| Arc::new(NoOpDeployer));
        let health = self.health.unwrap_or_else(|| Arc::new(AlwaysHealthy));
        let gate = self.gate.unwrap_or_else(|| Arc::new(DenyByDefault));

        let mut database_config = self.database;
        database_config.dry_run = database_config.dry_run || self.dry_run;

        let state = Arc::new(StateManager::new(self.state));
        let breaker = Arc::new(CircuitBreaker::new(self.breaker));
        let database = Arc::new(DatabaseOrchestrator::with_gate(
            database_config,
            runner,
            provisioner.clone(),
            state.clone(),
            gate,
        ));
        let coordinator = Arc::new(DeploymentCoordinator::new(
            deployer,
            health,
            provisioner,
            database,
            breaker.clone(),
            state.clone(),
            Arc::new(self.hooks),
            self.environment,
            self.dry_run,
        ));

        Arc::new(MultiDomainOrchestrator::new(
            self.registry,
            coordinator,
            state,
            breaker,
            self.environment,
            self.parallel_deployments,
            self.continue_on_error,
            self.event_capacity,
        ))
    }
}
