//! State management for Convoy orchestration runs.
//!
//! The [`StateManager`] is the single source of truth for "what is
//! happening and what happened" during a run: per-domain deployment
//! state, the append-only rollback plan, and the audit trail with
//! optional file persistence.

mod audit;
mod error;
mod manager;

pub use audit::AuditSink;
pub use error::{Result, StateError};
pub use manager::{StateManager, StateManagerConfig};
