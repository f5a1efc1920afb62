//! Saga error types.

use common::SagaId;
use ledger::LedgerError;
use thiserror::Error;
use transfer::TransferError;

use crate::state::SagaStatus;

/// Errors that can occur during saga operations.
///
/// Expected business conditions (insufficient balance, inactive account)
/// are never represented here; steps report those through
/// [`crate::StepOutcome::Failed`]. These variants cover validation
/// failures, programming errors, and infrastructure faults.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A saga cannot be started from an empty context.
    #[error("Saga context cannot be empty")]
    EmptyContext,

    /// The saga instance does not exist.
    #[error("Saga instance not found: {0}")]
    InstanceNotFound(SagaId),

    /// The referenced step record does not exist.
    #[error("Saga step record not found: {0}")]
    StepRecordNotFound(uuid::Uuid),

    /// The step name is not registered. This is a configuration error,
    /// not a saga failure.
    #[error("Saga step not registered: {0}")]
    UnknownStep(String),

    /// The instance status forbids the requested transition.
    #[error("Cannot {operation} saga in {status} state")]
    InvalidState {
        operation: &'static str,
        status: SagaStatus,
    },

    /// A compensation step failed. The instance is left in
    /// `Compensating`; operator intervention is required.
    #[error("Compensation for saga {saga_id} stuck at step '{step}'")]
    CompensationFailed { saga_id: SagaId, step: String },

    /// The transfer request failed validation before any saga state was
    /// created.
    #[error("Invalid transfer request: {0}")]
    InvalidTransfer(String),

    /// A persisted status string could not be decoded.
    #[error("Invalid persisted status value: {0}")]
    InvalidStatus(String),

    /// Account ledger error.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Transfer store error.
    #[error("Transfer store error: {0}")]
    Transfer(#[from] TransferError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for saga operations.
pub type Result<T> = std::result::Result<T, SagaError>;
