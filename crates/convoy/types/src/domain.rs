//! Domain descriptors
//!
//! A Domain is the deployable unit of a portfolio: a named service group
//! with a cloud account/zone and per-environment database descriptors.
//! Domains are immutable once resolved for a run.

use crate::Environment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A resolved, validated domain ready for deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    /// Domain name (e.g. "orders.example.com")
    pub name: String,

    /// Cloud account identifier
    pub account_id: String,

    /// DNS zone identifier
    pub zone_id: String,

    /// Database descriptor per environment
    pub databases: HashMap<Environment, DatabaseDescriptor>,

    /// Services deployed under this domain
    pub services: Vec<String>,

    /// Feature flags for this domain
    pub features: DomainFeatures,
}

impl Domain {
    /// Database descriptor for the given environment, if configured.
    pub fn database(&self, environment: Environment) -> Option<&DatabaseDescriptor> {
        self.databases.get(&environment)
    }
}

/// A provisioned database as seen by one environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseDescriptor {
    /// Actual database name on the platform
    ///
    /// Commands are always built from this, never from `binding`.
    pub name: String,

    /// Logical name application code binds the database under
    pub binding: String,
}

impl DatabaseDescriptor {
    pub fn new(name: impl Into<String>, binding: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: binding.into(),
        }
    }
}

/// Feature flags controlling optional domain behavior
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainFeatures {
    /// Run schema migrations during deployment
    pub migrations: bool,

    /// Apply secrets during deployment
    pub secrets: bool,

    /// Verify health after deployment
    pub health_checks: bool,
}

impl DomainFeatures {
    /// Everything enabled; the default for resolved domains.
    pub fn full() -> Self {
        Self {
            migrations: true,
            secrets: true,
            health_checks: true,
        }
    }
}
