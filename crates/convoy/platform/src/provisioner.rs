//! Database provisioning collaborator
//!
//! The engine only ever asks two questions of the provisioning layer:
//! does a database exist, and create one by name. Migrations never create
//! databases implicitly; existence is checked first and a missing database
//! is fatal for the caller.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Database lookup and creation
#[async_trait]
pub trait DatabaseProvisioner: Send + Sync {
    /// Does a database with this name exist on the platform?
    async fn database_exists(&self, name: &str) -> Result<bool>;

    /// Create a database and return its platform-assigned id.
    async fn create_database(&self, name: &str) -> Result<String>;
}

/// In-memory provisioner for tests and dry runs
#[derive(Debug, Default)]
pub struct StaticProvisioner {
    databases: Mutex<HashMap<String, String>>,
}

impl StaticProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisioner pre-seeded with existing database names.
    pub fn with_databases<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let databases = names
            .into_iter()
            .map(|name| (name.into(), Uuid::new_v4().to_string()))
            .collect();
        Self {
            databases: Mutex::new(databases),
        }
    }
}

#[async_trait]
impl DatabaseProvisioner for StaticProvisioner {
    async fn database_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .databases
            .lock()
            .expect("provisioner map poisoned")
            .contains_key(name))
    }

    async fn create_database(&self, name: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.databases
            .lock()
            .expect("provisioner map poisoned")
            .insert(name.to_string(), id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provisioner_lookup() {
        let provisioner = StaticProvisioner::with_databases(["orders-db"]);
        assert!(provisioner.database_exists("orders-db").await.unwrap());
        assert!(!provisioner.database_exists("missing-db").await.unwrap());

        provisioner.create_database("missing-db").await.unwrap();
        assert!(provisioner.database_exists("missing-db").await.unwrap());
    }
}
