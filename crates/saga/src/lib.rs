//! Saga compensation coordinator for durable execution.
//!
//! Lets a multi-step workflow register a reversal action for every step it
//! completes and guarantees that, when the handler fails, those reversals
//! run in reverse completion order, exactly once, with bounded retry and a
//! dead-letter safety net for reversals that cannot complete automatically.
//!
//! The hosting durable-execution platform is consumed through the
//! `substrate` crate's contract. Everything with an external side effect
//! (compensation actions, dead-letter writes, backoff timers) routes through
//! the substrate's durable-run primitive and durable timer, so the unwind
//! itself is replay-safe: a process crash mid-compensation resumes at the
//! recorded position instead of repeating completed reversals.

pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod retry;
pub mod router;

pub use config::SagaConfig;
pub use coordinator::SagaCoordinator;
pub use dedup::{DedupGuard, Fingerprint, fingerprint};
pub use error::{Result, SagaError, UnwindError};
pub use ledger::{StepLedger, StepRecord};
pub use registry::{CompensationFn, CompensationRegistry};
pub use retry::{RetryOutcome, RetryPolicy};
pub use router::DeadLetterRouter;
