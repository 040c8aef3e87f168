//! Platform collaborators for the Convoy orchestration engine.
//!
//! The orchestration core never talks to the cloud platform directly. It
//! consumes the narrow traits defined here: a command runner for the
//! platform CLI, a database provisioner, a service deployer and a health
//! checker. A real shell-backed runner ships alongside scripted and no-op
//! implementations the rest of the workspace uses in tests.

pub mod deployer;
pub mod error;
pub mod health;
pub mod provisioner;
pub mod runner;

pub use deployer::{FailingDeployer, NoOpDeployer, ServiceDeployer};
pub use error::{PlatformError, Result};
pub use health::{AlwaysHealthy, FailingHealthChecker, HealthChecker, HealthStatus};
pub use provisioner::{DatabaseProvisioner, StaticProvisioner};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ScriptedRunner, ShellRunner};
