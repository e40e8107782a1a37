//! Explicit retry policy shared by all three sink adapters.
//!
//! Expressed as a value (max attempts + backoff function) consumed by a
//! generic combinator, rather than ad-hoc retry loops per sink.

use std::time::Duration;

use swarmlink_core::DispatchOutcome;

use crate::error::SyncError;

/// Retry schedule for one sink push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(4),
            cap: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following failure number `attempt` (1-based):
    /// `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base.saturating_mul(1u32 << exp);
        delay.min(self.cap)
    }

    /// Run `op` up to `max_attempts` times, sleeping the backoff delay
    /// between attempts. Non-retryable errors abort immediately.
    ///
    /// Blocking: sinks are invoked from `spawn_blocking` workers, so the
    /// sleep suspends only that worker.
    pub fn run<T>(
        &self,
        sink: &str,
        mut op: impl FnMut() -> Result<T, SyncError>,
    ) -> Result<T, SyncError> {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        sink,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "sink attempt failed, backing off",
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Collapse a sink result into the per-(event, sink) outcome that the
/// dispatcher logs.
pub fn outcome_from(result: Result<(), SyncError>) -> DispatchOutcome {
    match result {
        Ok(()) => DispatchOutcome::Success,
        Err(err) if err.is_retryable() => DispatchOutcome::RetryableFailure(err.to_string()),
        Err(err) => DispatchOutcome::FatalFailure(err.to_string()),
    }
}
