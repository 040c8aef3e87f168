//! Per-key circuit breaker state machine.
//!
//! Tracks failures and successes per logical target, transitioning between
//! states:
//! - Closed: normal operation, calls allowed
//! - Open: too many failures, calls blocked
//! - Half-Open: probing whether the target recovered
//!
//! This component never raises errors; callers check [`CircuitBreaker::can_execute`]
//! and decide to skip or fail fast themselves.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CircuitBreakerConfig;

/// State of one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CircuitState {
    /// Circuit is closed, calls flow normally.
    #[default]
    Closed,

    /// Circuit is open, calls are blocked.
    Open,

    /// Circuit is testing whether the target has recovered.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Tracked record for one key.
#[derive(Debug, Clone, Default)]
struct CircuitEntry {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<DateTime<Utc>>,
    next_attempt: Option<DateTime<Utc>>,
}

/// Read-only snapshot of one circuit, for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitStatus {
    /// Key this circuit guards.
    pub key: String,

    /// Current state.
    pub state: CircuitState,

    /// Consecutive failures recorded.
    pub failure_count: u32,

    /// Consecutive half-open successes recorded.
    pub success_count: u32,

    /// Time of the most recent failure.
    pub last_failure: Option<DateTime<Utc>>,

    /// Earliest time an open circuit allows a probe.
    pub next_attempt: Option<DateTime<Utc>>,
}

/// Per-key circuit breaker guarding external calls.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: DashMap<String, CircuitEntry>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: DashMap::new(),
        }
    }

    /// Should a call to this key be attempted?
    ///
    /// Returns true for closed and half-open circuits. An open circuit
    /// whose recovery timeout has elapsed transitions to half-open here
    /// and the probe is allowed.
    pub fn can_execute(&self, key: &str) -> bool {
        let mut entry = self.circuits.entry(key.to_string()).or_default();

        match entry.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let due = entry
                    .next_attempt
                    .map(|at| Utc::now() >= at)
                    .unwrap_or(true);
                if due {
                    info!(key, "circuit transitioning to half-open after timeout");
                    entry.state = CircuitState::HalfOpen;
                    entry.success_count = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call against this key.
    pub fn record_success(&self, key: &str) {
        let mut entry = self.circuits.entry(key.to_string()).or_default();

        match entry.state {
            CircuitState::Closed => {
                entry.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                entry.success_count += 1;
                if entry.success_count >= self.config.success_threshold {
                    info!(
                        key,
                        successes = entry.success_count,
                        "circuit closing after successful recovery"
                    );
                    entry.state = CircuitState::Closed;
                    entry.failure_count = 0;
                    entry.success_count = 0;
                    entry.next_attempt = None;
                }
            }
            CircuitState::Open => {
                debug!(key, "success recorded while circuit open");
            }
        }
    }

    /// Record a failed call against this key.
    pub fn record_failure(&self, key: &str) {
        let mut entry = self.circuits.entry(key.to_string()).or_default();
        entry.failure_count += 1;
        entry.last_failure = Some(Utc::now());

        match entry.state {
            CircuitState::Closed => {
                if entry.failure_count >= self.config.failure_threshold {
                    warn!(
                        key,
                        failures = entry.failure_count,
                        "circuit opening due to failures"
                    );
                    self.open_entry(&mut entry);
                }
            }
            CircuitState::HalfOpen => {
                // Any failure while probing goes straight back to open.
                warn!(key, "circuit re-opening after half-open failure");
                self.open_entry(&mut entry);
            }
            CircuitState::Open => {}
        }
    }

    /// Read-only snapshot of one circuit. Never mutates state.
    pub fn status(&self, key: &str) -> Option<CircuitStatus> {
        self.circuits
            .get(key)
            .map(|entry| Self::snapshot(key, &entry))
    }

    /// Read-only snapshots of every tracked circuit.
    pub fn all_statuses(&self) -> Vec<CircuitStatus> {
        self.circuits
            .iter()
            .map(|item| Self::snapshot(item.key(), item.value()))
            .collect()
    }

    /// Force a circuit back to closed, zeroing all counters and timestamps.
    pub fn reset(&self, key: &str) {
        info!(key, "circuit reset to closed");
        self.circuits.insert(key.to_string(), CircuitEntry::default());
    }

    /// Force a circuit open (manual kill-switch).
    pub fn trip(&self, key: &str) {
        warn!(key, "circuit tripped open manually");
        let mut entry = self.circuits.entry(key.to_string()).or_default();
        self.open_entry(&mut entry);
    }

    /// Drop closed entries whose failure history has aged out.
    ///
    /// Bounds memory without discarding circuits that are currently open
    /// or half-open.
    pub fn cleanup(&self) {
        let cutoff = Utc::now()
            - ChronoDuration::from_std(self.config.monitoring_period)
                .unwrap_or_else(|_| ChronoDuration::seconds(600));

        self.circuits.retain(|key, entry| {
            if entry.state != CircuitState::Closed {
                return true;
            }
            let stale = entry.last_failure.map(|at| at < cutoff).unwrap_or(true);
            if stale {
                debug!(key, "dropping stale closed circuit");
            }
            !stale
        });
    }

    fn open_entry(&self, entry: &mut CircuitEntry) {
        entry.state = CircuitState::Open;
        entry.success_count = 0;
        entry.next_attempt = Some(
            Utc::now()
                + ChronoDuration::from_std(self.config.recovery_timeout)
                    .unwrap_or_else(|_| ChronoDuration::seconds(60)),
        );
    }

    fn snapshot(key: &str, entry: &CircuitEntry) -> CircuitStatus {
        CircuitStatus {
            key: key.to_string(),
            state: entry.state,
            failure_count: entry.failure_count,
            success_count: entry.success_count,
            last_failure: entry.last_failure,
            next_attempt: entry.next_attempt,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
