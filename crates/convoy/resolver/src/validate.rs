//! Prerequisite validation for resolved domains.
//!
//! Expected validation failures are reported as issues, never as errors;
//! the caller decides whether an invalid domain aborts its deployment.

use convoy_platform::DatabaseProvisioner;
use convoy_types::{Domain, Environment};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of a prerequisite check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no issues were found
    pub valid: bool,

    /// Human-readable findings, one per problem
    pub issues: Vec<String>,
}

impl ValidationReport {
    fn from_issues(issues: Vec<String>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }
}

/// Check a domain's prerequisites for deployment into an environment.
///
/// Verifies identifier formats and that a database descriptor exists for
/// the target environment. When a provisioner is supplied, additionally
/// verifies the configured database actually exists on the platform.
pub async fn validate_domain_prerequisites(
    domain: &Domain,
    environment: Environment,
    provisioner: Option<&dyn DatabaseProvisioner>,
) -> ValidationReport {
    let mut issues = Vec::new();

    if !is_hex_id(&domain.account_id) {
        issues.push(format!(
            "account id '{}' is not a 32-character hex identifier",
            domain.account_id
        ));
    }
    if !is_hex_id(&domain.zone_id) {
        issues.push(format!(
            "zone id '{}' is not a 32-character hex identifier",
            domain.zone_id
        ));
    }

    match domain.database(environment) {
        None => {
            if domain.features.migrations {
                issues.push(format!(
                    "no database configured for environment '{}'",
                    environment
                ));
            }
        }
        Some(descriptor) => {
            if let Some(provisioner) = provisioner {
                match provisioner.database_exists(&descriptor.name).await {
                    Ok(true) => {}
                    Ok(false) => issues.push(format!(
                        "database '{}' does not exist on the platform",
                        descriptor.name
                    )),
                    // Reachability problems are a finding, not a crash.
                    Err(e) => issues.push(format!(
                        "could not verify database '{}': {}",
                        descriptor.name, e
                    )),
                }
            }
        }
    }

    debug!(
        domain = %domain.name,
        %environment,
        issues = issues.len(),
        "prerequisite validation finished"
    );

    ValidationReport::from_issues(issues)
}

fn is_hex_id(value: &str) -> bool {
    value.len() == 32
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_platform::StaticProvisioner;
    use convoy_types::{DatabaseDescriptor, DomainFeatures};
    use std::collections::HashMap;

    fn domain() -> Domain {
        let mut databases = HashMap::new();
        databases.insert(
            Environment::Production,
            DatabaseDescriptor::new("orders-db", "DB"),
        );
        Domain {
            name: "orders.example.com".into(),
            account_id: "0123456789abcdef0123456789abcdef".into(),
            zone_id: "fedcba9876543210fedcba9876543210".into(),
            databases,
            services: vec!["orders-api".into()],
            features: DomainFeatures::full(),
        }
    }

    #[tokio::test]
    async fn test_valid_domain_passes() {
        let provisioner = StaticProvisioner::with_databases(["orders-db"]);
        let report =
            validate_domain_prerequisites(&domain(), Environment::Production, Some(&provisioner))
                .await;
        assert!(report.valid, "unexpected issues: {:?}", report.issues);
    }

    #[tokio::test]
    async fn test_bad_account_id_reported() {
        let mut bad = domain();
        bad.account_id = "NOT-HEX".into();
        let report = validate_domain_prerequisites(&bad, Environment::Production, None).await;
        assert!(!report.valid);
        assert!(report.issues[0].contains("account id"));
    }

    #[tokio::test]
    async fn test_missing_database_descriptor_reported() {
        let report =
            validate_domain_prerequisites(&domain(), Environment::Staging, None).await;
        assert!(!report.valid);
        assert!(report.issues[0].contains("staging"));
    }

    #[tokio::test]
    async fn test_absent_platform_database_reported() {
        let provisioner = StaticProvisioner::new();
        let report =
            validate_domain_prerequisites(&domain(), Environment::Production, Some(&provisioner))
                .await;
        assert!(!report.valid);
        assert!(report.issues[0].contains("does not exist"));
    }
}
