//! Post-deployment health checking collaborator

use async_trait::async_trait;
use convoy_types::{Domain, Environment};
use serde::{Deserialize, Serialize};

use crate::error::{PlatformError, Result};

/// Status object returned by a health check call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Did the check pass?
    pub healthy: bool,

    /// Status string reported by the service (e.g. "ok", "degraded")
    pub status: String,

    /// Additional fields from the health endpoint
    pub details: serde_json::Value,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            status: "ok".into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn unhealthy(status: impl Into<String>) -> Self {
        Self {
            healthy: false,
            status: status.into(),
            details: serde_json::Value::Null,
        }
    }
}

/// Verifies a deployed domain responds
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Probe the domain in the given environment.
    async fn check(&self, domain: &Domain, environment: Environment) -> Result<HealthStatus>;
}

/// Checker that always reports healthy
#[derive(Debug, Default)]
pub struct AlwaysHealthy;

#[async_trait]
impl HealthChecker for AlwaysHealthy {
    async fn check(&self, _domain: &Domain, _environment: Environment) -> Result<HealthStatus> {
        Ok(HealthStatus::healthy())
    }
}

/// Checker that fails a named domain, for failure-path tests
#[derive(Debug)]
pub struct FailingHealthChecker {
    fail_domain: String,
}

impl FailingHealthChecker {
    pub fn new(fail_domain: impl Into<String>) -> Self {
        Self {
            fail_domain: fail_domain.into(),
        }
    }
}

#[async_trait]
impl HealthChecker for FailingHealthChecker {
    async fn check(&self, domain: &Domain, _environment: Environment) -> Result<HealthStatus> {
        if domain.name == self.fail_domain {
            return Err(PlatformError::HealthCheck(format!(
                "{} did not respond",
                domain.name
            )));
        }
        Ok(HealthStatus::healthy())
    }
}
