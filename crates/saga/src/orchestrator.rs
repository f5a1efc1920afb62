//! Saga orchestrator: the core state machine.

use common::SagaId;

use crate::context::SagaContext;
use crate::error::{Result, SagaError};
use crate::record::SagaInstanceRecord;
use crate::registry::StepRegistry;
use crate::state::{SagaStatus, StepStatus};
use crate::step::StepOutcome;
use crate::store::SagaStore;

/// Drives saga instances through execution and compensation.
///
/// The orchestrator owns all saga and step persistence. Each
/// `execute_step` / `compensate_step` call is its own durability
/// boundary: the step record is updated before and after the step's
/// work, and the instance (including the possibly mutated context) is
/// persisted only on success.
///
/// Business failures come back as `Ok(false)`; the `Err` channel is
/// reserved for programming errors (unknown step, missing instance) and
/// storage faults.
pub struct SagaOrchestrator<S: SagaStore> {
    store: S,
    registry: StepRegistry,
}

impl<S: SagaStore> SagaOrchestrator<S> {
    /// Creates a new orchestrator over the given store and plan.
    pub fn new(store: S, registry: StepRegistry) -> Self {
        Self { store, registry }
    }

    /// The step registry driving this orchestrator.
    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Persists a new saga instance in `Started` and returns its id.
    ///
    /// An empty context is invalid input: a saga with nothing to act on
    /// is always a caller bug.
    #[tracing::instrument(skip_all)]
    pub async fn start_saga(&self, context: &SagaContext) -> Result<SagaId> {
        if context.is_empty() {
            return Err(SagaError::EmptyContext);
        }

        let instance = self.store.create_instance(context).await?;
        tracing::info!(saga_id = %instance.id, "saga started");
        Ok(instance.id)
    }

    /// Executes one step of the saga.
    ///
    /// Returns `Ok(true)` if the step completed, now or on a previous
    /// attempt (a `Completed` record short-circuits without
    /// re-executing), `Ok(false)` if the step failed or the instance
    /// status forbids execution. Unknown step names are a hard error.
    #[tracing::instrument(skip(self))]
    pub async fn execute_step(&self, saga_id: SagaId, step_name: &str) -> Result<bool> {
        let mut instance = self.load(saga_id).await?;

        if instance.status.forbids_execution() {
            tracing::warn!(
                %saga_id,
                status = %instance.status,
                step = step_name,
                "refusing to execute step for saga in this state"
            );
            return Ok(false);
        }

        let step = self
            .registry
            .resolve(step_name)
            .ok_or_else(|| SagaError::UnknownStep(step_name.to_string()))?;

        // Idempotency: a completed record means this step already ran.
        if self
            .store
            .find_step(saga_id, step_name, StepStatus::Completed)
            .await?
            .is_some()
        {
            tracing::info!(%saga_id, step = step_name, "step already completed, skipping");
            return Ok(true);
        }

        let mut record = self.store.get_or_create_step(saga_id, step_name).await?;
        record.status = StepStatus::Running;
        record.error_message = None;
        self.store.update_step(&record).await?;

        let mut context = instance.context.clone();
        let outcome = match step.execute(&mut context).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    %saga_id,
                    step = step_name,
                    error = %e,
                    "unexpected error executing step"
                );
                StepOutcome::failed(format!("unexpected error: {e}"))
            }
        };

        match outcome {
            StepOutcome::Completed => {
                record.status = StepStatus::Completed;
                self.store.update_step(&record).await?;

                instance.status = SagaStatus::Running;
                instance.current_step = Some(step_name.to_string());
                instance.context = context;
                self.store.update_instance(&instance).await?;

                tracing::info!(%saga_id, step = step_name, "step executed successfully");
                Ok(true)
            }
            StepOutcome::Failed(reason) => {
                record.status = StepStatus::Failed;
                record.error_message = Some(reason.clone());
                self.store.update_step(&record).await?;

                tracing::error!(%saga_id, step = step_name, %reason, "step failed");
                Ok(false)
            }
        }
    }

    /// Compensates one completed step of the saga.
    ///
    /// If no `Completed` record exists for the step it either never ran
    /// or was already compensated; both read as success, which is what
    /// makes compensation safely re-invocable.
    #[tracing::instrument(skip(self))]
    pub async fn compensate_step(&self, saga_id: SagaId, step_name: &str) -> Result<bool> {
        let Some(mut record) = self
            .store
            .find_step(saga_id, step_name, StepStatus::Completed)
            .await?
        else {
            tracing::debug!(
                %saga_id,
                step = step_name,
                "no completed record; already compensated or never ran"
            );
            return Ok(true);
        };

        let mut instance = self.load(saga_id).await?;
        let step = self
            .registry
            .resolve(step_name)
            .ok_or_else(|| SagaError::UnknownStep(step_name.to_string()))?;

        record.status = StepStatus::Compensating;
        self.store.update_step(&record).await?;

        let mut context = instance.context.clone();
        let outcome = match step.compensate(&mut context).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    %saga_id,
                    step = step_name,
                    error = %e,
                    "unexpected error compensating step"
                );
                StepOutcome::failed(format!("unexpected error: {e}"))
            }
        };

        match outcome {
            StepOutcome::Completed => {
                record.status = StepStatus::Compensated;
                self.store.update_step(&record).await?;

                instance.context = context;
                self.store.update_instance(&instance).await?;

                tracing::info!(%saga_id, step = step_name, "step compensated");
                Ok(true)
            }
            StepOutcome::Failed(reason) => {
                record.status = StepStatus::Failed;
                record.error_message = Some(reason.clone());
                self.store.update_step(&record).await?;

                tracing::error!(%saga_id, step = step_name, %reason, "step compensation failed");
                Ok(false)
            }
        }
    }

    /// Marks the saga failed and immediately compensates it.
    ///
    /// A no-op (with a warning) on an already completed saga.
    #[tracing::instrument(skip(self))]
    pub async fn fail_saga(&self, saga_id: SagaId) -> Result<()> {
        let mut instance = self.load(saga_id).await?;

        if instance.status == SagaStatus::Completed {
            tracing::warn!(%saga_id, "cannot fail a completed saga; ignoring");
            return Ok(());
        }

        instance.status = SagaStatus::Failed;
        self.store.update_instance(&instance).await?;
        metrics::counter!("saga_failed").increment(1);
        tracing::warn!(%saga_id, "saga failed, starting compensation");

        self.compensate_saga(saga_id).await
    }

    /// Compensates every completed step, most-recently-completed first.
    ///
    /// Runs sequentially and synchronously. If every compensation
    /// succeeds the instance becomes `Compensated`; if one fails the
    /// instance stays `Compensating` and
    /// [`SagaError::CompensationFailed`] surfaces the stuck step to the
    /// caller. Compensation is never retried automatically.
    #[tracing::instrument(skip(self))]
    pub async fn compensate_saga(&self, saga_id: SagaId) -> Result<()> {
        let mut instance = self.load(saga_id).await?;
        instance.status = SagaStatus::Compensating;
        self.store.update_instance(&instance).await?;

        let completed = self
            .store
            .steps_in_status(saga_id, StepStatus::Completed)
            .await?;

        for record in completed.iter().rev() {
            let compensated = self.compensate_step(saga_id, &record.step_name).await?;
            if !compensated {
                metrics::counter!("saga_compensation_stuck").increment(1);
                tracing::error!(
                    %saga_id,
                    step = %record.step_name,
                    "compensation stuck; operator intervention required"
                );
                return Err(SagaError::CompensationFailed {
                    saga_id,
                    step: record.step_name.clone(),
                });
            }
        }

        // Reload: each compensated step persisted context updates.
        let mut instance = self.load(saga_id).await?;
        instance.status = SagaStatus::Compensated;
        self.store.update_instance(&instance).await?;
        metrics::counter!("saga_compensated").increment(1);
        tracing::info!(%saga_id, "saga fully compensated");
        Ok(())
    }

    /// Marks the saga completed. Refuses on a failed instance.
    #[tracing::instrument(skip(self))]
    pub async fn complete_saga(&self, saga_id: SagaId) -> Result<()> {
        let mut instance = self.load(saga_id).await?;

        if instance.status == SagaStatus::Failed {
            return Err(SagaError::InvalidState {
                operation: "complete",
                status: instance.status,
            });
        }

        instance.status = SagaStatus::Completed;
        self.store.update_instance(&instance).await?;
        metrics::counter!("saga_completed").increment(1);
        tracing::info!(%saga_id, "saga completed");
        Ok(())
    }

    /// Returns the saga instance for status polling.
    pub async fn get_saga_instance(&self, saga_id: SagaId) -> Result<SagaInstanceRecord> {
        self.load(saga_id).await
    }

    async fn load(&self, saga_id: SagaId) -> Result<SagaInstanceRecord> {
        self.store
            .get_instance(saga_id)
            .await?
            .ok_or(SagaError::InstanceNotFound(saga_id))
    }
}
