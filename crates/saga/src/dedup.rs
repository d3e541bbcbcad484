//! Duplicate-compensation suppression.
//!
//! Re-delivery of an unwind request (from replay of the hosting invocation
//! or at-least-once messaging) must never execute a compensation twice.
//! Each invocation gets a stable fingerprint; the guard persists "has run"
//! marks for successful fingerprints through the substrate's keyed state.

use common::SagaId;
use sha2::{Digest, Sha256};
use substrate::DurableRuntime;

use crate::error::Result;

/// Stable digest identifying one compensation invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Returns the lowercase hex rendering of the digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the fingerprint of a compensation invocation.
///
/// Each field is length-prefixed before hashing, so the encoding stays
/// unambiguous whatever the payload contains. Digest collisions are not
/// mitigated; SHA-256 carries that burden.
pub fn fingerprint(saga_id: &SagaId, step_name: &str, payload: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    for field in [
        saga_id.name().as_bytes(),
        saga_id.instance_key().as_bytes(),
        step_name.as_bytes(),
        payload,
    ] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field);
    }

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(hex, "{byte:02x}");
    }
    Fingerprint(hex)
}

/// Persistent "has this compensation already run" marks for one saga.
pub struct DedupGuard<'a, R> {
    runtime: &'a R,
    saga_id: &'a SagaId,
}

impl<'a, R: DurableRuntime> DedupGuard<'a, R> {
    /// Creates a guard over the saga's portion of the keyed state.
    pub fn new(runtime: &'a R, saga_id: &'a SagaId) -> Self {
        Self { runtime, saga_id }
    }

    /// Returns true if a compensation with this fingerprint already
    /// completed successfully.
    pub async fn has_run(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self
            .runtime
            .get_state(&self.mark_key(fingerprint))
            .await?
            .is_some())
    }

    /// Records that the compensation with this fingerprint completed.
    /// Called only after the action reports success.
    pub async fn mark_run(&self, fingerprint: &Fingerprint) -> Result<()> {
        self.runtime
            .set_state(&self.mark_key(fingerprint), vec![1])
            .await?;
        Ok(())
    }

    fn mark_key(&self, fingerprint: &Fingerprint) -> String {
        format!("saga:{}:dedup:{}", self.saga_id.name(), fingerprint)
    }
}
