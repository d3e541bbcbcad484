//! Durable-execution substrate contract and storage backends.
//!
//! The saga coordinator does not implement journaling, replay or durable
//! timers itself; it consumes them from a hosting durable-execution
//! platform through the [`DurableRuntime`] trait. This crate defines that
//! contract, an [`InMemoryRuntime`] used by tests and local development,
//! and the shared dead-letter sink with in-memory and PostgreSQL backends.

pub mod deadletter;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod runtime;

pub use common::SagaId;
pub use deadletter::{DeadLetterEntry, DeadLetterStore, InMemoryDeadLetterStore};
pub use error::{Result, SubstrateError};
pub use memory::InMemoryRuntime;
pub use postgres::PostgresDeadLetterStore;
pub use runtime::{ActionFailure, ActionResult, DurableRuntime};
