use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::SagaId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;

/// A compensation that exhausted automated retries and now requires manual
/// operator intervention.
///
/// Created exactly once per exhausted step and never removed by the saga
/// subsystem; removal is an out-of-band operator action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    /// Identity of the saga instance the step belonged to.
    pub saga_id: SagaId,
    /// Name of the step whose compensation could not be completed.
    pub step_name: String,
    /// The payload the compensation was invoked with.
    pub payload: Vec<u8>,
    /// Message of the last attempt's failure.
    pub last_error: String,
    /// How many attempts were made before giving up.
    pub attempts: u32,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Shared append-only sink for exhausted compensations.
///
/// Written by many saga instances concurrently and never read back by the
/// coordinator. Backends must provide at-least-once durability and retrieval
/// by saga identity; ordering across instances is not required.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Appends an entry to the store.
    async fn append(&self, entry: DeadLetterEntry) -> Result<()>;

    /// Returns all entries recorded for one saga instance, oldest first.
    async fn entries_for(&self, saga_id: &SagaId) -> Result<Vec<DeadLetterEntry>>;
}

/// In-memory dead-letter store for testing.
#[derive(Clone, Default)]
pub struct InMemoryDeadLetterStore {
    entries: Arc<RwLock<Vec<DeadLetterEntry>>>,
}

impl InMemoryDeadLetterStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries across all sagas.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if no entries have been recorded.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Returns a copy of every entry in insertion order.
    pub async fn all(&self) -> Vec<DeadLetterEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn append(&self, entry: DeadLetterEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn entries_for(&self, saga_id: &SagaId) -> Result<Vec<DeadLetterEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| &e.saga_id == saga_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(saga_id: &SagaId, step_name: &str) -> DeadLetterEntry {
        DeadLetterEntry {
            saga_id: saga_id.clone(),
            step_name: step_name.to_string(),
            payload: b"payload".to_vec(),
            last_error: "downstream unavailable".to_string(),
            attempts: 3,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_and_query_by_saga() {
        let store = InMemoryDeadLetterStore::new();
        let saga_a = SagaId::new("orders", "k1");
        let saga_b = SagaId::new("orders", "k2");

        store.append(make_entry(&saga_a, "charge-card")).await.unwrap();
        store.append(make_entry(&saga_b, "reserve")).await.unwrap();
        store.append(make_entry(&saga_a, "ship")).await.unwrap();

        assert_eq!(store.len().await, 3);

        let for_a = store.entries_for(&saga_a).await.unwrap();
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].step_name, "charge-card");
        assert_eq!(for_a[1].step_name, "ship");
    }

    #[tokio::test]
    async fn empty_store_returns_no_entries() {
        let store = InMemoryDeadLetterStore::new();
        let saga = SagaId::new("orders", "k1");

        assert!(store.is_empty().await);
        assert!(store.entries_for(&saga).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn entry_serialization_roundtrip() {
        let entry = make_entry(&SagaId::new("orders", "k1"), "charge-card");
        let json = serde_json::to_string(&entry).unwrap();
        let decoded: DeadLetterEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, decoded);
    }
}
