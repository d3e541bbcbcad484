//! Coordinator configuration.

use crate::retry::RetryPolicy;

/// Configuration for one saga coordinator.
///
/// Passed explicitly at construction; there is no process-wide mutable
/// configuration anywhere in this crate.
#[derive(Debug, Clone, Default)]
pub struct SagaConfig {
    /// Backoff policy applied to every compensation.
    pub retry: RetryPolicy,
}

impl SagaConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
