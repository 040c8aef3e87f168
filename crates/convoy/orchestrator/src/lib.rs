//! Portfolio deployment orchestration for Convoy.
//!
//! This crate ties the engine together: a per-domain coordinator that
//! walks the deployment phase sequence with rollback, a lifecycle hook
//! registry, and the multi-domain facade that deploys a whole portfolio
//! with bounded concurrency and a broadcast event stream.

pub mod builder;
pub mod coordinator;
pub mod error;
pub mod hooks;
pub mod portfolio;

pub use builder::OrchestratorBuilder;
pub use coordinator::{DeploymentCoordinator, DomainDeployment};
pub use error::{OrchestratorError, Result};
pub use hooks::{HookRegistry, LifecycleEvent, LifecycleHook, RecordingHook};
pub use portfolio::{MultiDomainOrchestrator, PortfolioSummary};
