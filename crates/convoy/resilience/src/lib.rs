//! Circuit breaker for the Convoy orchestration engine.
//!
//! Prevents repeated calls to a dependency that is currently failing and
//! automatically probes for recovery. Keys are logical service/operation
//! ids; state lives for the lifetime of one breaker instance and is not
//! persisted, so a process restart resets every circuit to closed.

mod breaker;
mod config;

pub use breaker::{CircuitBreaker, CircuitState, CircuitStatus};
pub use config::CircuitBreakerConfig;
