use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, SubstrateError};
use crate::runtime::{ActionResult, DurableRuntime};

#[derive(Default)]
struct Inner {
    journal: HashMap<String, serde_json::Value>,
    state: HashMap<String, Vec<u8>>,
    sleeps: Vec<Duration>,
    executions: HashMap<String, u32>,
}

/// In-memory durable runtime for testing and local development.
///
/// Journal, keyed state and timer history live behind shared storage, so
/// clones observe the same durable facts. Driving a fresh coordinator over
/// a clone of the runtime therefore models a resumed or replayed invocation:
/// journaled actions return their recorded outcomes, state reads see earlier
/// writes, and the timer is virtual (recorded, never actually slept).
#[derive(Clone)]
pub struct InMemoryRuntime {
    instance_key: Arc<str>,
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryRuntime {
    /// Creates a runtime with a random instance key.
    pub fn new() -> Self {
        Self::with_key(Uuid::new_v4().to_string())
    }

    /// Creates a runtime with a fixed instance key.
    pub fn with_key(instance_key: impl Into<String>) -> Self {
        let instance_key: String = instance_key.into();
        Self {
            instance_key: Arc::from(instance_key),
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Returns how many times the action under `name` actually executed,
    /// as opposed to being answered from the journal.
    pub async fn execution_count(&self, name: &str) -> u32 {
        self.inner
            .read()
            .await
            .executions
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Returns the durations requested from the durable timer, in order.
    pub async fn slept(&self) -> Vec<Duration> {
        self.inner.read().await.sleeps.clone()
    }

    /// Returns the number of journaled action outcomes.
    pub async fn journal_len(&self) -> usize {
        self.inner.read().await.journal.len()
    }
}

impl Default for InMemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableRuntime for InMemoryRuntime {
    fn instance_key(&self) -> &str {
        &self.instance_key
    }

    async fn run_once<T, F, Fut>(&self, name: &str, action: F) -> Result<ActionResult<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ActionResult<T>> + Send + 'static,
    {
        {
            let inner = self.inner.read().await;
            if let Some(journaled) = inner.journal.get(name) {
                tracing::debug!(name, "returning journaled outcome");
                let decoded =
                    serde_json::from_value(journaled.clone()).map_err(|source| {
                        SubstrateError::JournalDecode {
                            name: name.to_string(),
                            source,
                        }
                    })?;
                return Ok(decoded);
            }
        }

        // Lock released while the action runs; a saga instance has one
        // logical thread of control, so no competing writer for this name.
        let outcome = action().await;
        let journaled = serde_json::to_value(&outcome)?;

        let mut inner = self.inner.write().await;
        *inner.executions.entry(name.to_string()).or_insert(0) += 1;
        inner.journal.insert(name.to_string(), journaled);
        Ok(outcome)
    }

    async fn sleep(&self, duration: Duration) -> Result<()> {
        self.inner.write().await.sleeps.push(duration);
        Ok(())
    }

    async fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().await.state.get(key).cloned())
    }

    async fn set_state(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.inner.write().await.state.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ActionFailure;

    #[tokio::test]
    async fn run_once_executes_then_replays() {
        let runtime = InMemoryRuntime::new();

        let first = runtime
            .run_once("charge", || async { Ok(41u32) })
            .await
            .unwrap();
        assert_eq!(first, Ok(41));

        // Second call must come from the journal, not the new action.
        let second = runtime
            .run_once("charge", || async { Ok(99u32) })
            .await
            .unwrap();
        assert_eq!(second, Ok(41));
        assert_eq!(runtime.execution_count("charge").await, 1);
    }

    #[tokio::test]
    async fn run_once_journals_failures_too() {
        let runtime = InMemoryRuntime::new();

        let first: ActionResult<u32> = runtime
            .run_once("refund", || async { Err(ActionFailure::new("declined")) })
            .await
            .unwrap();
        assert_eq!(first, Err(ActionFailure::new("declined")));

        let second: ActionResult<u32> = runtime
            .run_once("refund", || async { Ok(1) })
            .await
            .unwrap();
        assert_eq!(second, Err(ActionFailure::new("declined")));
        assert_eq!(runtime.execution_count("refund").await, 1);
    }

    #[tokio::test]
    async fn distinct_names_journal_independently() {
        let runtime = InMemoryRuntime::new();

        runtime
            .run_once("a", || async { Ok(1u32) })
            .await
            .unwrap();
        runtime
            .run_once("b", || async { Ok(2u32) })
            .await
            .unwrap();

        assert_eq!(runtime.journal_len().await, 2);
        assert_eq!(runtime.execution_count("a").await, 1);
        assert_eq!(runtime.execution_count("b").await, 1);
    }

    #[tokio::test]
    async fn sleep_records_durations_without_blocking() {
        let runtime = InMemoryRuntime::new();

        runtime.sleep(Duration::from_millis(100)).await.unwrap();
        runtime.sleep(Duration::from_millis(200)).await.unwrap();

        assert_eq!(
            runtime.slept().await,
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn state_set_and_get() {
        let runtime = InMemoryRuntime::new();

        assert!(runtime.get_state("ledger").await.unwrap().is_none());
        runtime.set_state("ledger", b"v1".to_vec()).await.unwrap();
        assert_eq!(
            runtime.get_state("ledger").await.unwrap(),
            Some(b"v1".to_vec())
        );

        runtime.set_state("ledger", b"v2".to_vec()).await.unwrap();
        assert_eq!(
            runtime.get_state("ledger").await.unwrap(),
            Some(b"v2".to_vec())
        );
    }

    #[tokio::test]
    async fn clones_share_durable_facts() {
        let runtime = InMemoryRuntime::with_key("inv-1");
        let resumed = runtime.clone();

        runtime
            .run_once("step", || async { Ok("done".to_string()) })
            .await
            .unwrap();
        runtime.set_state("ledger", b"entries".to_vec()).await.unwrap();

        assert_eq!(resumed.instance_key(), "inv-1");
        let replayed = resumed
            .run_once("step", || async { Ok("never".to_string()) })
            .await
            .unwrap();
        assert_eq!(replayed, Ok("done".to_string()));
        assert_eq!(
            resumed.get_state("ledger").await.unwrap(),
            Some(b"entries".to_vec())
        );
    }

    #[tokio::test]
    async fn journal_decode_error_when_type_changes() {
        let runtime = InMemoryRuntime::new();

        runtime
            .run_once("step", || async { Ok("text".to_string()) })
            .await
            .unwrap();

        let result = runtime.run_once::<u32, _, _>("step", || async { Ok(1) }).await;
        assert!(matches!(
            result,
            Err(SubstrateError::JournalDecode { .. })
        ));
    }
}
