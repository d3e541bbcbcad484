//! Ordered, append-only record of executed steps.

use common::SagaId;
use serde::{Deserialize, Serialize};
use substrate::DurableRuntime;

use crate::error::Result;

/// State key for a saga's ledger. The substrate's keyed state is already
/// scoped to the hosting invocation, so only the saga name appears here.
fn ledger_key(saga_id: &SagaId) -> String {
    format!("saga:{}:ledger", saga_id.name())
}

/// One executed step, as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Name of the step; unique within the saga instance.
    pub step_name: String,
    /// Opaque payload handed to the compensation on unwind.
    pub payload: Vec<u8>,
    /// Whether the step has a reversal at all.
    pub compensatable: bool,
    /// Unwind order key: strictly increasing and dense, starting at 1.
    pub sequence: u64,
}

/// Append-only record of executed steps for one saga instance.
///
/// Backed directly by the substrate's keyed state under the saga's ledger
/// key. Append is the only mutation and the descending view is a pure
/// projection: the ledger represents what happened, while compensation
/// status lives in the dedup guard's own store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepLedger {
    records: Vec<StepRecord>,
}

impl StepLedger {
    /// Loads the persisted ledger for `saga_id`, or an empty one if the
    /// saga has recorded no steps yet.
    pub async fn load<R: DurableRuntime>(runtime: &R, saga_id: &SagaId) -> Result<Self> {
        match runtime.get_state(&ledger_key(saga_id)).await? {
            Some(bytes) => {
                let records: Vec<StepRecord> = serde_json::from_slice(&bytes)?;
                Ok(Self { records })
            }
            None => Ok(Self::default()),
        }
    }

    /// Appends a step and persists the ledger, assigning the next dense
    /// sequence number. Returns the assigned sequence.
    pub async fn append<R: DurableRuntime>(
        &mut self,
        runtime: &R,
        saga_id: &SagaId,
        step_name: impl Into<String>,
        payload: Vec<u8>,
        compensatable: bool,
    ) -> Result<u64> {
        let sequence = self.next_sequence();
        self.records.push(StepRecord {
            step_name: step_name.into(),
            payload,
            compensatable,
            sequence,
        });

        let bytes = match serde_json::to_vec(&self.records) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.records.pop();
                return Err(e.into());
            }
        };
        if let Err(e) = runtime.set_state(&ledger_key(saga_id), bytes).await {
            self.records.pop();
            return Err(e.into());
        }

        Ok(sequence)
    }

    /// Records in reverse insertion order: the unwind order.
    pub fn all_descending(&self) -> impl Iterator<Item = &StepRecord> {
        self.records.iter().rev()
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Returns true if a step with this name was already recorded.
    pub fn contains(&self, step_name: &str) -> bool {
        self.records.iter().any(|r| r.step_name == step_name)
    }

    /// The sequence number the next appended step will receive.
    pub fn next_sequence(&self) -> u64 {
        self.records.len() as u64 + 1
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no steps have been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
