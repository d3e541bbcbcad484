//! Saga coordinator: forward-path recording and LIFO unwinding.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::SagaId;
use substrate::{ActionResult, DeadLetterEntry, DeadLetterStore, DurableRuntime};

use crate::config::SagaConfig;
use crate::dedup::{self, DedupGuard};
use crate::error::{Result, SagaError, UnwindError};
use crate::ledger::StepLedger;
use crate::registry::CompensationRegistry;
use crate::retry::{self, RetryOutcome};
use crate::router::DeadLetterRouter;

/// Drives one saga instance: records completed steps on the forward path
/// and unwinds them in reverse order when the handler fails.
///
/// Intended use mirrors a scoped "run on exit" guard. Construct with
/// [`begin`] at the top of the handler, register every compensation
/// unconditionally (bindings are in-memory only and must be rebuilt on
/// every run), add steps as they complete, and pass the handler's outcome
/// through [`compensate_if_needed`] on the way out; it is a no-op on
/// success.
///
/// There is no internal parallelism: later steps may depend on earlier ones
/// still being in effect when their own compensation runs, so the unwind is
/// strictly sequential.
///
/// [`begin`]: SagaCoordinator::begin
/// [`compensate_if_needed`]: SagaCoordinator::compensate_if_needed
pub struct SagaCoordinator<R, D> {
    saga_id: SagaId,
    runtime: R,
    registry: CompensationRegistry,
    ledger: StepLedger,
    router: DeadLetterRouter<D>,
    config: SagaConfig,
}

impl<R, D> SagaCoordinator<R, D>
where
    R: DurableRuntime,
    D: DeadLetterStore + 'static,
{
    /// Begins (or resumes) the saga named `saga_name` for the current
    /// invocation, with the default configuration.
    ///
    /// Idempotent: beginning the same `(saga_name, instance_key)` pair
    /// again loads the same persisted ledger and has no other side effects.
    pub async fn begin(
        saga_name: impl Into<String>,
        runtime: R,
        dead_letters: Arc<D>,
    ) -> Result<Self> {
        Self::begin_with_config(saga_name, runtime, dead_letters, SagaConfig::default()).await
    }

    /// Begins (or resumes) the saga with an explicit configuration.
    pub async fn begin_with_config(
        saga_name: impl Into<String>,
        runtime: R,
        dead_letters: Arc<D>,
        config: SagaConfig,
    ) -> Result<Self> {
        let saga_id = SagaId::new(saga_name, runtime.instance_key());
        let ledger = StepLedger::load(&runtime, &saga_id).await?;
        tracing::debug!(saga = %saga_id, steps = ledger.len(), "saga began");

        Ok(Self {
            saga_id,
            runtime,
            registry: CompensationRegistry::new(),
            ledger,
            router: DeadLetterRouter::new(dead_letters),
            config,
        })
    }

    /// Binds a compensation to `step_name`, replacing any previous binding.
    ///
    /// Must be called before [`add_step`] references the name. Safe to call
    /// unconditionally on every run; replay re-registers the same bindings.
    ///
    /// [`add_step`]: SagaCoordinator::add_step
    pub fn register<F, Fut>(&mut self, step_name: impl Into<String>, action: F)
    where
        F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult<()>> + Send + 'static,
    {
        self.registry.register(step_name, action);
    }

    /// Records a completed forward step.
    ///
    /// Fails with [`SagaError::DuplicateStep`] if the name is already in
    /// the ledger (distinct logical occurrences need distinct names), and
    /// with [`SagaError::MissingCompensation`] if the step is marked
    /// compensatable but nothing was registered for it.
    #[tracing::instrument(skip(self, payload), fields(saga = %self.saga_id))]
    pub async fn add_step(
        &mut self,
        step_name: &str,
        payload: impl Into<Vec<u8>>,
        compensatable: bool,
    ) -> Result<()> {
        if self.ledger.contains(step_name) {
            return Err(SagaError::DuplicateStep(step_name.to_string()));
        }
        if compensatable && !self.registry.contains(step_name) {
            return Err(SagaError::MissingCompensation(step_name.to_string()));
        }

        let sequence = self
            .ledger
            .append(
                &self.runtime,
                &self.saga_id,
                step_name,
                payload.into(),
                compensatable,
            )
            .await?;

        metrics::counter!("saga_steps_added_total").increment(1);
        tracing::debug!(step = step_name, sequence, compensatable, "step recorded");
        Ok(())
    }

    /// Returns the identity of this saga instance.
    pub fn saga_id(&self) -> &SagaId {
        &self.saga_id
    }

    /// Returns the step ledger.
    pub fn ledger(&self) -> &StepLedger {
        &self.ledger
    }

    /// Unwinds the saga if `outcome` is an error; `Ok` passes through
    /// untouched, so this is safe to call on every exit path.
    ///
    /// On error the ledger is walked from highest to lowest sequence and
    /// every compensatable step is reversed through the retry engine,
    /// guarded by the dedup store. A step that exhausts its retries is
    /// dead-lettered and the walk continues: leaving earlier resources
    /// un-reversed is strictly worse than flagging one for manual cleanup.
    /// The triggering error is preserved in the returned [`UnwindError`],
    /// never replaced.
    #[tracing::instrument(skip(self, outcome), fields(saga = %self.saga_id))]
    pub async fn compensate_if_needed<T, E: Display>(
        &self,
        outcome: std::result::Result<T, E>,
    ) -> std::result::Result<T, UnwindError<E>> {
        let trigger = match outcome {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        tracing::warn!(error = %trigger, "handler failed, unwinding saga");
        metrics::counter!("saga_unwinds_total").increment(1);
        let started = Instant::now();

        let result = self.unwind().await;
        metrics::histogram!("saga_unwind_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(dead_lettered) if dead_lettered.is_empty() => {
                metrics::counter!("saga_unwinds_completed").increment(1);
                tracing::info!("saga fully compensated");
                Err(UnwindError::Compensated { trigger })
            }
            Ok(dead_lettered) => {
                metrics::counter!("saga_unwinds_partial").increment(1);
                tracing::warn!(
                    steps = ?dead_lettered,
                    "saga compensated, manual cleanup required"
                );
                Err(UnwindError::Partial {
                    trigger,
                    dead_lettered,
                })
            }
            Err(fault) => {
                metrics::counter!("saga_unwinds_aborted").increment(1);
                tracing::error!(error = %fault, "saga unwind aborted");
                Err(UnwindError::Aborted { trigger, fault })
            }
        }
    }

    /// Walks the ledger highest-to-lowest sequence, driving each
    /// compensatable step to a terminal outcome before moving to the next.
    /// Returns the names of dead-lettered steps.
    async fn unwind(&self) -> Result<Vec<String>> {
        // Missing bindings are programming errors. Find them before any
        // compensation runs rather than partway through the walk.
        for record in self.ledger.all_descending() {
            if record.compensatable && !self.registry.contains(&record.step_name) {
                return Err(SagaError::MissingCompensation(record.step_name.clone()));
            }
        }

        let guard = DedupGuard::new(&self.runtime, &self.saga_id);
        let mut dead_lettered = Vec::new();

        for record in self.ledger.all_descending() {
            if !record.compensatable {
                tracing::debug!(step = %record.step_name, "step not compensatable, skipping");
                continue;
            }

            let fp = dedup::fingerprint(&self.saga_id, &record.step_name, &record.payload);
            if guard.has_run(&fp).await? {
                tracing::debug!(step = %record.step_name, "already compensated, skipping");
                continue;
            }

            let Some(action) = self.registry.get(&record.step_name) else {
                // Unreachable: the pre-flight pass validated every binding.
                return Err(SagaError::MissingCompensation(record.step_name.clone()));
            };

            let outcome = retry::execute(
                &self.runtime,
                &fp,
                &action,
                &record.payload,
                &self.config.retry,
            )
            .await?;

            match outcome {
                RetryOutcome::Success { attempts } => {
                    guard.mark_run(&fp).await?;
                    metrics::counter!("saga_steps_compensated_total").increment(1);
                    tracing::info!(step = %record.step_name, attempts, "step compensated");
                }
                RetryOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    let entry = DeadLetterEntry {
                        saga_id: self.saga_id.clone(),
                        step_name: record.step_name.clone(),
                        payload: record.payload.clone(),
                        last_error,
                        attempts,
                        recorded_at: Utc::now(),
                    };
                    self.router.route(&self.runtime, &fp, entry).await?;
                    metrics::counter!("saga_steps_dead_lettered_total").increment(1);
                    tracing::warn!(
                        step = %record.step_name,
                        attempts,
                        "compensation exhausted, dead-lettered"
                    );
                    dead_lettered.push(record.step_name.clone());
                }
            }
        }

        Ok(dead_lettered)
    }
}
