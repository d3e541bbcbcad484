//! Bounded exponential backoff for compensation attempts.

use std::sync::Arc;
use std::time::Duration;

use substrate::DurableRuntime;

use crate::dedup::Fingerprint;
use crate::error::Result;
use crate::registry::CompensationFn;

/// Backoff policy for compensation attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Factor applied to the delay after each failed attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the `attempt`-th failure (1-based):
    /// `min(max_delay, initial_delay * multiplier^(attempt - 1))`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(1_000) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

/// Terminal outcome of executing one compensation through the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The action reported success.
    Success {
        /// Attempts consumed, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed; the caller routes the step to the dead letter.
    Exhausted {
        /// Attempts consumed.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
    },
}

/// Runs `action` with bounded exponential backoff.
///
/// Each attempt is its own durable run (`compensate:<fingerprint>:attempt:<n>`)
/// and every delay goes through the substrate timer, so an interrupted retry
/// loop resumes at the recorded attempt count instead of starting over from
/// attempt 1. The action's own failures never escape: they either get
/// retried or folded into [`RetryOutcome::Exhausted`].
pub async fn execute<R: DurableRuntime>(
    runtime: &R,
    fingerprint: &Fingerprint,
    action: &Arc<CompensationFn>,
    payload: &[u8],
    policy: &RetryPolicy,
) -> Result<RetryOutcome> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let run_name = format!("compensate:{fingerprint}:attempt:{attempt}");
        let bound_action = Arc::clone(action);
        let bound_payload = payload.to_vec();
        let outcome = runtime
            .run_once(&run_name, move || bound_action(bound_payload))
            .await?;

        match outcome {
            Ok(()) => return Ok(RetryOutcome::Success { attempts: attempt }),
            Err(failure) => {
                if attempt >= max_attempts {
                    return Ok(RetryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: failure.to_string(),
                    });
                }

                let delay = policy.delay_for(attempt);
                tracing::debug!(
                    %fingerprint,
                    attempt,
                    ?delay,
                    error = %failure,
                    "compensation attempt failed, backing off"
                );
                runtime.sleep(delay).await?;
                attempt += 1;
            }
        }
    }
}
