//! Fixed-delay retry around command execution.
//!
//! Transient command failures (non-zero exit, spawn error, timeout) are
//! retried up to a fixed attempt cap with a fixed inter-attempt delay,
//! not an exponential one. Only the final attempt's failure propagates.

use std::time::Duration;

use convoy_platform::{CommandOutput, CommandRunner, CommandSpec};
use tracing::warn;

use crate::error::{DatabaseError, Result};

/// Retry behavior for external commands.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Run a command under this policy, returning the first successful
    /// output or the final attempt's failure.
    pub async fn execute(
        &self,
        runner: &dyn CommandRunner,
        spec: &CommandSpec,
    ) -> Result<CommandOutput> {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match runner.run(spec).await {
                Ok(output) if output.success() => return Ok(output),
                Ok(output) => {
                    warn!(
                        command = %spec.display_line(),
                        attempt,
                        exit_code = output.exit_code,
                        "command attempt failed"
                    );
                    last_error = Some(DatabaseError::CommandFailed {
                        command: spec.display_line(),
                        exit_code: output.exit_code,
                        stderr: output.stderr,
                    });
                }
                Err(e) => {
                    warn!(
                        command = %spec.display_line(),
                        attempt,
                        error = %e,
                        "command attempt errored"
                    );
                    last_error = Some(DatabaseError::Execution(e));
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.delay).await;
            }
        }

        // max_attempts >= 1, so at least one failure was recorded.
        Err(last_error.unwrap_or_else(|| DatabaseError::CommandFailed {
            command: spec.display_line(),
            exit_code: -1,
            stderr: "no attempts were made".into(),
        }))
    }
}
