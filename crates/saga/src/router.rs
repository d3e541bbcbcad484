//! Routing of exhausted compensations to the dead-letter store.

use std::sync::Arc;

use substrate::{ActionFailure, DeadLetterEntry, DeadLetterStore, DurableRuntime};

use crate::dedup::Fingerprint;
use crate::error::{Result, SagaError};

/// Routes compensations that exhausted their retries to the shared
/// dead-letter store for manual operator intervention.
pub struct DeadLetterRouter<D> {
    store: Arc<D>,
}

impl<D: DeadLetterStore + 'static> DeadLetterRouter<D> {
    /// Creates a router over the shared store.
    pub fn new(store: Arc<D>) -> Self {
        Self { store }
    }

    /// Gets a reference to the underlying store.
    pub fn store(&self) -> &Arc<D> {
        &self.store
    }

    /// Durably records `entry`.
    ///
    /// The write is wrapped in the durable-run primitive so replay neither
    /// duplicates nor drops it. A failed write surfaces as
    /// [`SagaError::DeadLetter`]: the entry is the only record that manual
    /// cleanup is required, so it must not be lost silently.
    pub async fn route<R: DurableRuntime>(
        &self,
        runtime: &R,
        fingerprint: &Fingerprint,
        entry: DeadLetterEntry,
    ) -> Result<()> {
        let run_name = format!("deadletter:{fingerprint}");
        let step_name = entry.step_name.clone();
        let store = Arc::clone(&self.store);

        let outcome = runtime
            .run_once(&run_name, move || async move {
                store
                    .append(entry)
                    .await
                    .map_err(|e| ActionFailure::new(e.to_string()))
            })
            .await?;

        outcome.map_err(|failure| SagaError::DeadLetter {
            step: step_name,
            reason: failure.to_string(),
        })
    }
}
