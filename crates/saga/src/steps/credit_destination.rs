//! Step 2: credit the destination account.

use std::sync::Arc;

use async_trait::async_trait;
use common::AccountId;
use ledger::AccountStore;

use crate::context::{keys, SagaContext};
use crate::error::Result;
use crate::step::{SagaStep, StepOutcome};

/// Credits the transfer amount to the destination account.
///
/// The reversal of a credit can genuinely fail: if the destination
/// spends the money before compensation runs, there is nothing left to
/// take back. That failure is reported loudly, never swallowed; it is
/// the stuck-compensation condition the orchestrator surfaces to
/// operators.
pub struct CreditDestinationStep {
    accounts: Arc<dyn AccountStore>,
}

impl CreditDestinationStep {
    /// Creates the step over the given ledger.
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl SagaStep for CreditDestinationStep {
    fn name(&self) -> &'static str {
        super::CREDIT_DESTINATION
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<StepOutcome> {
        let Some(destination_id) = context.id(keys::DESTINATION_ACCOUNT_ID) else {
            return Ok(StepOutcome::failed(
                "missing context key: destination_account_id",
            ));
        };
        let Some(amount) = context.amount(keys::AMOUNT) else {
            return Ok(StepOutcome::failed("missing context key: amount"));
        };
        let destination_id = AccountId::from_uuid(destination_id);

        let mut lock = self.accounts.lock_for_update(destination_id).await?;
        let account = lock.account();
        context.insert_amount(keys::DESTINATION_BALANCE_BEFORE, account.balance);

        if !account.is_active {
            tracing::warn!(account_id = %destination_id, "destination account is inactive");
            return Ok(StepOutcome::failed(format!(
                "destination account {destination_id} is inactive"
            )));
        }

        let rows = lock.conditional_credit(amount).await?;
        if rows == 0 {
            return Ok(StepOutcome::failed(format!(
                "conditional credit of {amount} to account {destination_id} affected no rows"
            )));
        }

        context.insert_amount(keys::DESTINATION_BALANCE_AFTER, lock.account().balance);
        lock.commit().await?;

        tracing::info!(account_id = %destination_id, %amount, "destination account credited");
        Ok(StepOutcome::Completed)
    }

    async fn compensate(&self, context: &mut SagaContext) -> Result<StepOutcome> {
        let Some(destination_id) = context.id(keys::DESTINATION_ACCOUNT_ID) else {
            return Ok(StepOutcome::failed(
                "missing context key for compensation: destination_account_id",
            ));
        };
        let Some(amount) = context.amount(keys::AMOUNT) else {
            return Ok(StepOutcome::failed("missing context key for compensation: amount"));
        };
        let destination_id = AccountId::from_uuid(destination_id);

        let mut lock = self.accounts.lock_for_update(destination_id).await?;
        let available = lock.account().balance;

        if available < amount {
            tracing::error!(
                account_id = %destination_id,
                %available,
                required = %amount,
                "cannot reverse credit: destination balance insufficient"
            );
            return Ok(StepOutcome::failed(format!(
                "destination balance insufficient to reverse credit: \
                 available {available}, required {amount}"
            )));
        }

        let restored = available - amount;
        lock.set_balance(restored).await?;
        context.insert_amount(keys::DESTINATION_BALANCE_AFTER_REVERSAL, restored);
        lock.commit().await?;

        tracing::info!(account_id = %destination_id, %amount, "credit reversed");
        Ok(StepOutcome::Completed)
    }
}
