//! Registry of named domain configurations.

use std::collections::HashMap;

use convoy_types::{DatabaseDescriptor, Domain, DomainFeatures, Environment};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ResolverError, Result};

/// Raw domain configuration before normalization
///
/// Supplied either ahead of time under a registered name or inline with
/// a resolution request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Cloud account identifier
    pub account_id: String,

    /// DNS zone identifier
    pub zone_id: String,

    /// Database descriptor per environment
    #[serde(default)]
    pub databases: HashMap<Environment, DatabaseDescriptor>,

    /// Services deployed under this domain; defaults to one service
    /// named after the domain itself
    #[serde(default)]
    pub services: Vec<String>,

    /// Feature flags; everything enabled when absent
    #[serde(default)]
    pub features: Option<DomainFeatures>,
}

/// What to resolve: a registered name, or a name with inline configuration
#[derive(Debug, Clone)]
pub enum DomainSource {
    /// Look the name up in the registry
    Named(String),

    /// Use the supplied configuration under the given name
    Inline(String, DomainConfig),
}

/// Outcome of resolving one name in a batch
#[derive(Debug)]
pub struct DomainResolution {
    /// The requested name
    pub name: String,

    /// The resolved domain, or the per-name failure
    pub outcome: Result<Domain>,
}

/// Registry of named domain configurations
#[derive(Debug, Default)]
pub struct DomainRegistry {
    domains: HashMap<String, DomainConfig>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named configuration.
    pub fn with_domain(mut self, name: impl Into<String>, config: DomainConfig) -> Self {
        self.domains.insert(name.into(), config);
        self
    }

    /// Names of every registered domain.
    pub fn names(&self) -> Vec<String> {
        self.domains.keys().cloned().collect()
    }

    /// Resolve one source into a normalized domain.
    pub fn resolve_domain(&self, source: &DomainSource) -> Result<Domain> {
        match source {
            DomainSource::Named(name) => {
                let config = self
                    .domains
                    .get(name)
                    .ok_or_else(|| ResolverError::UnknownDomain(name.clone()))?;
                Self::normalize(name, config.clone())
            }
            DomainSource::Inline(name, config) => Self::normalize(name, config.clone()),
        }
    }

    /// Resolve every name independently.
    ///
    /// One name's failure is captured in its own entry so discovery of
    /// the other domains still completes.
    pub fn resolve_multiple_domains(&self, names: &[String]) -> Vec<DomainResolution> {
        names
            .iter()
            .map(|name| DomainResolution {
                name: name.clone(),
                outcome: self.resolve_domain(&DomainSource::Named(name.clone())),
            })
            .collect()
    }

    fn normalize(name: &str, config: DomainConfig) -> Result<Domain> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(ResolverError::InvalidConfig {
                name: "<empty>".into(),
                reason: "domain name is empty".into(),
            });
        }

        let services = if config.services.is_empty() {
            vec![name.clone()]
        } else {
            config.services
        };

        debug!(domain = %name, services = services.len(), "domain resolved");

        Ok(Domain {
            name,
            account_id: config.account_id,
            zone_id: config.zone_id,
            databases: config.databases,
            services,
            features: config.features.unwrap_or_else(DomainFeatures::full),
        })
    }
}
