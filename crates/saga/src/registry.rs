//! Name-to-compensation bindings for one saga instance.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures_core::future::BoxFuture;
use futures_util::FutureExt;
use substrate::ActionResult;

/// A compensation action: reverses one completed step given the payload
/// recorded for it in the ledger.
pub type CompensationFn = dyn Fn(Vec<u8>) -> BoxFuture<'static, ActionResult<()>> + Send + Sync;

/// Registry of compensation bindings, scoped to one saga instance.
///
/// Pure in-memory registration: rebuilt from code on every run and never
/// persisted, which is why handlers register unconditionally at the top.
/// A `BTreeMap` keeps any listing of bindings deterministic across runs;
/// a hash map's iteration order would differ between replays.
#[derive(Default)]
pub struct CompensationRegistry {
    bindings: BTreeMap<String, Arc<CompensationFn>>,
}

impl CompensationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `action` to `step_name`, replacing any previous binding.
    ///
    /// Replacement is the expected path on replay, where the handler
    /// registers the same bindings again.
    pub fn register<F, Fut>(&mut self, step_name: impl Into<String>, action: F)
    where
        F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult<()>> + Send + 'static,
    {
        self.bindings.insert(
            step_name.into(),
            Arc::new(move |payload| action(payload).boxed()),
        );
    }

    /// Looks up the binding for a step.
    pub fn get(&self, step_name: &str) -> Option<Arc<CompensationFn>> {
        self.bindings.get(step_name).cloned()
    }

    /// Returns true if a binding exists for the step.
    pub fn contains(&self, step_name: &str) -> bool {
        self.bindings.contains_key(step_name)
    }

    /// Registered step names, in deterministic (lexicographic) order.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Number of registered bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if no bindings are registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
