use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;

/// A domain-level failure produced by a durable action.
///
/// Journaled the same way a success is: on replay the recorded failure is
/// returned without re-invoking the action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ActionFailure {
    message: String,
}

impl ActionFailure {
    /// Creates a failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ActionFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ActionFailure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// The journaled, domain-visible outcome of a durable action.
///
/// Distinct from the outer [`crate::SubstrateError`]: an `Err(ActionFailure)`
/// here is a recorded fact about the action, not an infrastructure fault.
pub type ActionResult<T> = std::result::Result<T, ActionFailure>;

/// Contract required from the hosting durable-execution platform.
///
/// One value of this trait is scoped to a single logical invocation: keyed
/// state is namespaced to that invocation and [`instance_key`] returns its
/// stable identifier. All implementations must be thread-safe (Send + Sync).
///
/// [`instance_key`]: DurableRuntime::instance_key
#[async_trait]
pub trait DurableRuntime: Send + Sync {
    /// Returns the stable identifier of the current invocation, used to
    /// namespace saga state.
    fn instance_key(&self) -> &str;

    /// Executes `action` and journals its outcome under `name`.
    ///
    /// On replay the journaled outcome is returned and the action is not
    /// re-invoked. Names must be unique per logical operation within the
    /// invocation; callers derive them deterministically.
    async fn run_once<T, F, Fut>(&self, name: &str, action: F) -> Result<ActionResult<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ActionResult<T>> + Send + 'static;

    /// Suspends the logical invocation for `duration`.
    ///
    /// The suspension survives process restarts; on resume, execution
    /// continues after the timer rather than from the top.
    async fn sleep(&self, duration: Duration) -> Result<()>;

    /// Reads a value from keyed state scoped to this invocation.
    async fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes a value to keyed state scoped to this invocation.
    async fn set_state(&self, key: &str, value: Vec<u8>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_failure_display_is_the_message() {
        let failure = ActionFailure::new("downstream unavailable");
        assert_eq!(failure.to_string(), "downstream unavailable");
        assert_eq!(failure.message(), "downstream unavailable");
    }

    #[test]
    fn action_failure_from_str_and_string() {
        let a: ActionFailure = "boom".into();
        let b: ActionFailure = String::from("boom").into();
        assert_eq!(a, b);
    }

    #[test]
    fn action_result_serialization_roundtrip() {
        let ok: ActionResult<u32> = Ok(7);
        let err: ActionResult<u32> = Err(ActionFailure::new("no"));

        for outcome in [ok, err] {
            let json = serde_json::to_string(&outcome).unwrap();
            let decoded: ActionResult<u32> = serde_json::from_str(&json).unwrap();
            assert_eq!(outcome, decoded);
        }
    }
}
