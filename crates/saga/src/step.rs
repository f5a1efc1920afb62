//! Saga step contract.

use async_trait::async_trait;

use crate::context::SagaContext;
use crate::error::Result;

/// The outcome of executing or compensating a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step's effect was applied (or reversed).
    Completed,

    /// An expected business condition prevented the step (insufficient
    /// balance, inactive account, missing context key). Carries the
    /// diagnostic recorded on the step record.
    Failed(String),
}

impl StepOutcome {
    /// Builds a failed outcome from any displayable reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        StepOutcome::Failed(reason.into())
    }

    /// Returns true if the step completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed)
    }

    /// Returns the failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            StepOutcome::Completed => None,
            StepOutcome::Failed(reason) => Some(reason),
        }
    }
}

/// A single step of a saga: one locally transactional unit of work plus
/// its compensating inverse.
///
/// Steps read and write only the shared [`SagaContext`]; they never
/// touch another step's record. Expected business conditions come back
/// as [`StepOutcome::Failed`], never as errors: the `Err` channel is
/// reserved for infrastructure faults (lock timeouts, storage failures),
/// which the orchestrator converts into a failed step at its boundary.
#[async_trait]
pub trait SagaStep: Send + Sync {
    /// The registry name of this step.
    fn name(&self) -> &'static str;

    /// Applies the step's effect.
    async fn execute(&self, context: &mut SagaContext) -> Result<StepOutcome>;

    /// Reverses the step's effect. Invoked at most once per completed
    /// record, gated by the orchestrator.
    async fn compensate(&self, context: &mut SagaContext) -> Result<StepOutcome>;
}
