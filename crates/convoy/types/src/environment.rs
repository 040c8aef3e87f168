//! Deployment environments and their compiled-in policy table
//!
//! Convoy targets three environments with different safety requirements:
//! - Development: local execution, no backup requirement
//! - Staging: remote execution, backed up before migrations
//! - Production: remote execution, backed up, destructive ops need confirmation

use serde::{Deserialize, Serialize};

/// Target environment for a deployment or database operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    ///
    /// Commands run against the local simulator; nothing here is
    /// production data and no backup is taken.
    #[default]
    Development,

    /// Pre-production staging
    ///
    /// Runs against the remote platform; backed up before schema changes.
    Staging,

    /// Production
    ///
    /// Runs against the remote platform; backed up before schema changes
    /// and destructive operations require explicit confirmation.
    Production,
}

impl Environment {
    /// All environments, in promotion order.
    pub fn all() -> [Environment; 3] {
        [
            Environment::Development,
            Environment::Staging,
            Environment::Production,
        ]
    }

    /// Does this environment execute against the remote platform?
    ///
    /// Only development runs locally. Database commands derive their
    /// `--local`/`--remote` flag from this, never from a naming convention.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Environment::Development)
    }

    /// Must a backup complete before migrations run here?
    pub fn requires_backup(&self) -> bool {
        matches!(self, Environment::Staging | Environment::Production)
    }

    /// Do destructive operations require explicit confirmation here?
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_flag_policy() {
        assert!(!Environment::Development.is_remote());
        assert!(Environment::Staging.is_remote());
        assert!(Environment::Production.is_remote());
    }

    #[test]
    fn test_backup_policy() {
        assert!(!Environment::Development.requires_backup());
        assert!(Environment::Staging.requires_backup());
        assert!(Environment::Production.requires_backup());
    }

    #[test]
    fn test_confirmation_policy() {
        assert!(Environment::Production.requires_confirmation());
        assert!(!Environment::Staging.requires_confirmation());
    }

    #[test]
    fn test_parse_round_trip() {
        for env in Environment::all() {
            let parsed: Environment = env.to_string().parse().unwrap();
            assert_eq!(parsed, env);
        }
        assert!("qa".parse::<Environment>().is_err());
    }
}
