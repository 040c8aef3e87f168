//! Circuit breaker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Consecutive half-open successes before the circuit closes.
    pub success_threshold: u32,

    /// How long an open circuit blocks before allowing a probe.
    pub recovery_timeout: Duration,

    /// How long a closed circuit's failure history is kept before
    /// `cleanup` may drop the entry.
    pub monitoring_period: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
            monitoring_period: Duration::from_secs(600),
        }
    }
}
