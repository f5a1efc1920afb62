//! Step 3: mark the transfer succeeded.

use std::sync::Arc;

use async_trait::async_trait;
use common::TransferId;
use transfer::{TransferError, TransferStatus, TransferStore};

use crate::context::{keys, SagaContext};
use crate::error::Result;
use crate::step::{SagaStep, StepOutcome};

/// Flips the transfer record to [`TransferStatus::Success`].
///
/// Compensation always sets [`TransferStatus::Cancelled`] rather than
/// restoring the prior status: a compensated transfer reads as cancelled
/// in the audit trail no matter where it failed.
pub struct MarkTransferSucceededStep {
    transfers: Arc<dyn TransferStore>,
}

impl MarkTransferSucceededStep {
    /// Creates the step over the given transfer store.
    pub fn new(transfers: Arc<dyn TransferStore>) -> Self {
        Self { transfers }
    }
}

#[async_trait]
impl SagaStep for MarkTransferSucceededStep {
    fn name(&self) -> &'static str {
        super::MARK_TRANSFER_SUCCEEDED
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<StepOutcome> {
        let Some(transfer_id) = context.id(keys::TRANSFER_ID) else {
            return Ok(StepOutcome::failed("missing context key: transfer_id"));
        };
        let transfer_id = TransferId::from_uuid(transfer_id);

        let transfer = self
            .transfers
            .get(transfer_id)
            .await?
            .ok_or(TransferError::TransferNotFound(transfer_id))?;

        context.insert_text(keys::TRANSFER_STATUS_BEFORE, transfer.status.as_str());
        self.transfers
            .set_status(transfer_id, TransferStatus::Success)
            .await?;
        context.insert_text(keys::TRANSFER_STATUS_AFTER, TransferStatus::Success.as_str());

        tracing::info!(%transfer_id, "transfer marked succeeded");
        Ok(StepOutcome::Completed)
    }

    async fn compensate(&self, context: &mut SagaContext) -> Result<StepOutcome> {
        let Some(transfer_id) = context.id(keys::TRANSFER_ID) else {
            return Ok(StepOutcome::failed(
                "missing context key for compensation: transfer_id",
            ));
        };
        let transfer_id = TransferId::from_uuid(transfer_id);

        if let Some(original) = context.text(keys::TRANSFER_STATUS_BEFORE) {
            tracing::info!(%transfer_id, original, "cancelling transfer regardless of prior status");
        }

        self.transfers
            .set_status(transfer_id, TransferStatus::Cancelled)
            .await?;

        tracing::info!(%transfer_id, "transfer marked cancelled");
        Ok(StepOutcome::Completed)
    }
}
