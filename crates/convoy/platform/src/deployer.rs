//! Service deployment collaborator
//!
//! Pushing worker code and applying secrets is thin platform plumbing the
//! orchestration core treats as an external collaborator. The trait also
//! exposes the corresponding undo operations so the coordinator can replay
//! a rollback plan.

use async_trait::async_trait;
use convoy_types::{Domain, Environment};
use tracing::debug;

use crate::error::{PlatformError, Result};

/// Pushes code and secrets for a domain's services
#[async_trait]
pub trait ServiceDeployer: Send + Sync {
    /// Deploy one service of the domain into the environment.
    async fn deploy_service(
        &self,
        domain: &Domain,
        service: &str,
        environment: Environment,
    ) -> Result<()>;

    /// Apply the domain's secrets to one service.
    ///
    /// Returns the names of the secrets that were applied, so the caller
    /// can record undo steps.
    async fn apply_secrets(
        &self,
        domain: &Domain,
        service: &str,
        environment: Environment,
    ) -> Result<Vec<String>>;

    /// Remove a previously deployed service (rollback path).
    async fn remove_service(&self, service: &str, environment: Environment) -> Result<()>;

    /// Remove a previously applied secret (rollback path).
    async fn remove_secret(
        &self,
        service: &str,
        secret: &str,
        environment: Environment,
    ) -> Result<()>;
}

/// Deployer that performs no work
///
/// Default collaborator for dry runs and for portfolios that only manage
/// databases.
#[derive(Debug, Default)]
pub struct NoOpDeployer;

#[async_trait]
impl ServiceDeployer for NoOpDeployer {
    async fn deploy_service(
        &self,
        domain: &Domain,
        service: &str,
        environment: Environment,
    ) -> Result<()> {
        debug!(domain = %domain.name, service, %environment, "no-op deploy");
        Ok(())
    }

    async fn apply_secrets(
        &self,
        _domain: &Domain,
        _service: &str,
        _environment: Environment,
    ) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn remove_service(&self, _service: &str, _environment: Environment) -> Result<()> {
        Ok(())
    }

    async fn remove_secret(
        &self,
        _service: &str,
        _secret: &str,
        _environment: Environment,
    ) -> Result<()> {
        Ok(())
    }
}

/// Deployer that fails a named service, for failure-path tests
#[derive(Debug)]
pub struct FailingDeployer {
    fail_service: String,
}

impl FailingDeployer {
    pub fn new(fail_service: impl Into<String>) -> Self {
        Self {
            fail_service: fail_service.into(),
        }
    }
}

#[async_trait]
impl ServiceDeployer for FailingDeployer {
    async fn deploy_service(
        &self,
        _domain: &Domain,
        service: &str,
        _environment: Environment,
    ) -> Result<()> {
        if service == self.fail_service {
            return Err(PlatformError::DeployFailed {
                service: service.to_string(),
                reason: "simulated deploy failure".into(),
            });
        }
        Ok(())
    }

    async fn apply_secrets(
        &self,
        _domain: &Domain,
        _service: &str,
        _environment: Environment,
    ) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn remove_service(&self, _service: &str, _environment: Environment) -> Result<()> {
        Ok(())
    }

    async fn remove_secret(
        &self,
        _service: &str,
        _secret: &str,
        _environment: Environment,
    ) -> Result<()> {
        Ok(())
    }
}
