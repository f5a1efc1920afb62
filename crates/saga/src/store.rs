//! Saga persistence contract.

use async_trait::async_trait;
use common::SagaId;

use crate::context::SagaContext;
use crate::error::Result;
use crate::record::{SagaInstanceRecord, SagaStepRecord};
use crate::state::StepStatus;

/// Storage contract for saga instances and step records.
///
/// Saga and step records are owned exclusively by the orchestrator;
/// steps never write to them. Each orchestrator call against this store
/// is its own durability boundary, so a crash between steps leaves
/// exactly one step's work committed or not, never a half-applied step.
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Persists a new instance in `Started` with the given context and
    /// returns it.
    async fn create_instance(&self, context: &SagaContext) -> Result<SagaInstanceRecord>;

    /// Returns the instance, or `None` if it does not exist.
    async fn get_instance(&self, id: SagaId) -> Result<Option<SagaInstanceRecord>>;

    /// Overwrites the instance's mutable fields (status, context,
    /// current step).
    async fn update_instance(&self, record: &SagaInstanceRecord) -> Result<()>;

    /// Returns the existing record for (saga, step name), or inserts and
    /// returns a new `Pending` one.
    ///
    /// The get-or-create is atomic per (saga, step name); it is what
    /// guarantees at most one record, and so at most one `Running`
    /// record, per step of a saga.
    async fn get_or_create_step(
        &self,
        saga_id: SagaId,
        step_name: &str,
    ) -> Result<SagaStepRecord>;

    /// Returns the record for (saga, step name) currently in `status`,
    /// if any.
    async fn find_step(
        &self,
        saga_id: SagaId,
        step_name: &str,
        status: StepStatus,
    ) -> Result<Option<SagaStepRecord>>;

    /// Overwrites the step record's mutable fields.
    async fn update_step(&self, record: &SagaStepRecord) -> Result<()>;

    /// Returns every step record of the saga currently in `status`, in
    /// completion order (oldest first).
    async fn steps_in_status(
        &self,
        saga_id: SagaId,
        status: StepStatus,
    ) -> Result<Vec<SagaStepRecord>>;
}
