//! Domain resolution for the Convoy orchestration engine.
//!
//! Turns a domain name or inline configuration into a validated,
//! immutable [`convoy_types::Domain`] descriptor and checks deployment
//! prerequisites before any work starts.

mod error;
mod registry;
mod validate;

pub use error::{ResolverError, Result};
pub use registry::{DomainConfig, DomainRegistry, DomainResolution, DomainSource};
pub use validate::{validate_domain_prerequisites, ValidationReport};
