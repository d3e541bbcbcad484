//! Saga error taxonomy.

use substrate::SubstrateError;
use thiserror::Error;

/// Errors that can occur during saga operations.
///
/// Transient compensation failures never appear here: they are absorbed by
/// the retry engine or converted into dead-letter entries. What remains are
/// conditions no retry can fix.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A compensatable step has no registered compensation. A programming
    /// error: retrying a missing function can never succeed, so it is
    /// reported immediately.
    #[error("No compensation registered for step '{0}'")]
    MissingCompensation(String),

    /// The forward path added a step name twice. Distinct logical
    /// occurrences of a step need distinct names.
    #[error("Step '{0}' was already added to this saga")]
    DuplicateStep(String),

    /// The dead-letter write for an exhausted step failed. Fatal: the entry
    /// is the only record that manual cleanup is required.
    #[error("Dead-letter write for step '{step}' failed: {reason}")]
    DeadLetter { step: String, reason: String },

    /// Substrate error.
    #[error("Substrate error: {0}")]
    Substrate(#[from] SubstrateError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

/// Error returned after an unwind, wrapping the error that triggered it.
///
/// The triggering error is preserved in every variant so callers always see
/// why compensation started alongside what, if anything, could not be
/// cleaned up.
#[derive(Debug, Error)]
pub enum UnwindError<E> {
    /// Every compensatable step was reversed (or had already been reversed).
    #[error("{trigger}")]
    Compensated { trigger: E },

    /// The unwind ran to completion but one or more steps exhausted their
    /// retries and were dead-lettered for manual cleanup.
    #[error("{trigger}; partial compensation: {n} step(s) dead-lettered", n = .dead_lettered.len())]
    Partial {
        trigger: E,
        dead_lettered: Vec<String>,
    },

    /// The unwind stopped on a coordinator-level fault.
    #[error("{trigger}; compensation aborted: {fault}")]
    Aborted { trigger: E, fault: SagaError },
}

impl<E> UnwindError<E> {
    /// Returns the error that triggered the unwind.
    pub fn trigger(&self) -> &E {
        match self {
            UnwindError::Compensated { trigger }
            | UnwindError::Partial { trigger, .. }
            | UnwindError::Aborted { trigger, .. } => trigger,
        }
    }

    /// Consumes the wrapper, returning the triggering error.
    pub fn into_trigger(self) -> E {
        match self {
            UnwindError::Compensated { trigger }
            | UnwindError::Partial { trigger, .. }
            | UnwindError::Aborted { trigger, .. } => trigger,
        }
    }

    /// Step names that were dead-lettered; empty unless partial.
    pub fn dead_lettered(&self) -> &[String] {
        match self {
            UnwindError::Partial { dead_lettered, .. } => dead_lettered,
            _ => &[],
        }
    }

    /// Returns true if one or more steps require manual cleanup.
    pub fn is_partial(&self) -> bool {
        matches!(self, UnwindError::Partial { .. })
    }

    /// Returns the coordinator fault, if the unwind aborted on one.
    pub fn fault(&self) -> Option<&SagaError> {
        match self {
            UnwindError::Aborted { fault, .. } => Some(fault),
            _ => None,
        }
    }
}
