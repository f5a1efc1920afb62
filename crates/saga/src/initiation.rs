//! Transfer initiation: the saga entry point.

use std::sync::Arc;

use common::{AccountId, Money, SagaId, TransferId};
use ledger::AccountStore;
use transfer::{TransferStatus, TransferStore};

use crate::context::{keys, SagaContext};
use crate::error::{Result, SagaError};
use crate::orchestrator::SagaOrchestrator;
use crate::state::SagaStatus;
use crate::store::SagaStore;

/// Per-transfer cap applied unless the service is configured otherwise.
pub const DEFAULT_MAX_TRANSFER_AMOUNT: Money = Money::from_dollars(1_000_000);

/// What the initiating caller gets back: the saga id plus its terminal
/// status, so "no net effect" is distinguishable from "succeeded".
/// A stuck compensation surfaces as
/// [`SagaError::CompensationFailed`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// The transfer record created for this request.
    pub transfer_id: TransferId,
    /// The saga instance that executed it.
    pub saga_id: SagaId,
    /// Terminal saga status: `Completed` or `Compensated`.
    pub status: SagaStatus,
}

/// Entry point for transfers: validates the request, creates the
/// transfer record, builds the saga context, and drives the saga through
/// the registry's plan.
pub struct TransferInitiationService<S: SagaStore> {
    orchestrator: SagaOrchestrator<S>,
    accounts: Arc<dyn AccountStore>,
    transfers: Arc<dyn TransferStore>,
    max_amount: Money,
}

impl<S: SagaStore> TransferInitiationService<S> {
    /// Creates the service with the default per-transfer cap.
    pub fn new(
        orchestrator: SagaOrchestrator<S>,
        accounts: Arc<dyn AccountStore>,
        transfers: Arc<dyn TransferStore>,
    ) -> Self {
        Self {
            orchestrator,
            accounts,
            transfers,
            max_amount: DEFAULT_MAX_TRANSFER_AMOUNT,
        }
    }

    /// Overrides the per-transfer maximum amount.
    pub fn with_max_amount(mut self, max_amount: Money) -> Self {
        self.max_amount = max_amount;
        self
    }

    /// The orchestrator driving this service's sagas.
    pub fn orchestrator(&self) -> &SagaOrchestrator<S> {
        &self.orchestrator
    }

    /// Initiates and drives a transfer saga to its terminal status.
    ///
    /// Validation failures are rejected before any saga state is
    /// created. A business failure mid-saga compensates the completed
    /// steps and comes back as a `Compensated` outcome; only a stuck
    /// compensation or an infrastructure fault is an error.
    #[tracing::instrument(skip(self))]
    pub async fn initiate_transfer(
        &self,
        source_account_id: AccountId,
        destination_account_id: AccountId,
        amount: Money,
        description: &str,
    ) -> Result<TransferOutcome> {
        metrics::counter!("saga_executions_total").increment(1);
        let started = std::time::Instant::now();

        self.validate_request(source_account_id, destination_account_id, amount)
            .await?;

        let transfer = self
            .transfers
            .create(source_account_id, destination_account_id, amount, description)
            .await?;

        let mut context = SagaContext::new();
        context.insert_id(keys::TRANSFER_ID, transfer.id);
        context.insert_id(keys::SOURCE_ACCOUNT_ID, source_account_id);
        context.insert_id(keys::DESTINATION_ACCOUNT_ID, destination_account_id);
        context.insert_amount(keys::AMOUNT, amount);
        context.insert_text(keys::DESCRIPTION, description);

        let saga_id = self.orchestrator.start_saga(&context).await?;
        self.transfers.set_saga_instance(transfer.id, saga_id).await?;
        tracing::info!(%saga_id, transfer_id = %transfer.id, "saga linked to transfer");

        let status = self.run_saga(saga_id).await?;

        metrics::histogram!("saga_duration_seconds").record(started.elapsed().as_secs_f64());
        Ok(TransferOutcome {
            transfer_id: transfer.id,
            saga_id,
            status,
        })
    }

    /// Drives the saga across the plan, in order.
    ///
    /// Public so that any worker can resume a saga it did not start:
    /// completed steps short-circuit through their idempotency markers.
    /// The first failing step fails the whole saga, compensates it, and
    /// cancels the transfer.
    #[tracing::instrument(skip(self))]
    pub async fn run_saga(&self, saga_id: SagaId) -> Result<SagaStatus> {
        let instance = self.orchestrator.get_saga_instance(saga_id).await?;
        if instance.status.forbids_execution() {
            tracing::warn!(%saga_id, status = %instance.status, "saga not resumable");
            return Ok(instance.status);
        }

        let plan: Vec<&'static str> = self.orchestrator.registry().plan().to_vec();
        for step_name in plan {
            let ok = self.orchestrator.execute_step(saga_id, step_name).await?;
            if !ok {
                tracing::warn!(%saga_id, step = step_name, "step failed, rolling back");
                self.orchestrator.fail_saga(saga_id).await?;
                self.cancel_transfer(saga_id).await?;
                return Ok(SagaStatus::Compensated);
            }
        }

        self.orchestrator.complete_saga(saga_id).await?;
        Ok(SagaStatus::Completed)
    }

    /// A compensated transfer always reads as cancelled, even when the
    /// status step never ran.
    async fn cancel_transfer(&self, saga_id: SagaId) -> Result<()> {
        let instance = self.orchestrator.get_saga_instance(saga_id).await?;
        if let Some(transfer_id) = instance.context.id(keys::TRANSFER_ID) {
            self.transfers
                .set_status(TransferId::from_uuid(transfer_id), TransferStatus::Cancelled)
                .await?;
        }
        Ok(())
    }

    async fn validate_request(
        &self,
        source_account_id: AccountId,
        destination_account_id: AccountId,
        amount: Money,
    ) -> Result<()> {
        if !amount.is_positive() {
            return Err(SagaError::InvalidTransfer(format!(
                "amount must be greater than zero, got {amount}"
            )));
        }
        if amount > self.max_amount {
            return Err(SagaError::InvalidTransfer(format!(
                "amount {amount} exceeds the maximum of {}",
                self.max_amount
            )));
        }
        if source_account_id == destination_account_id {
            return Err(SagaError::InvalidTransfer(
                "source and destination must be different accounts".to_string(),
            ));
        }

        let source = self
            .accounts
            .get_account(source_account_id)
            .await?
            .ok_or_else(|| {
                SagaError::InvalidTransfer(format!("source account {source_account_id} not found"))
            })?;
        if !source.is_active {
            return Err(SagaError::InvalidTransfer(format!(
                "source account {source_account_id} is not active"
            )));
        }

        let destination = self
            .accounts
            .get_account(destination_account_id)
            .await?
            .ok_or_else(|| {
                SagaError::InvalidTransfer(format!(
                    "destination account {destination_account_id} not found"
                ))
            })?;
        if !destination.is_active {
            return Err(SagaError::InvalidTransfer(format!(
                "destination account {destination_account_id} is not active"
            )));
        }

        Ok(())
    }
}
