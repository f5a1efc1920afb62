//! Step 1: debit the source account.

use std::sync::Arc;

use async_trait::async_trait;
use common::AccountId;
use ledger::AccountStore;

use crate::context::{keys, SagaContext};
use crate::error::Result;
use crate::step::{SagaStep, StepOutcome};

/// Debits the transfer amount from the source account.
///
/// Holds the source row lock while deciding, then applies the debit
/// through a conditional mutation so the balance check and the write are
/// a single atomic unit even if a caller ever mutates without locking.
pub struct DebitSourceStep {
    accounts: Arc<dyn AccountStore>,
}

impl DebitSourceStep {
    /// Creates the step over the given ledger.
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl SagaStep for DebitSourceStep {
    fn name(&self) -> &'static str {
        super::DEBIT_SOURCE
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<StepOutcome> {
        let Some(source_id) = context.id(keys::SOURCE_ACCOUNT_ID) else {
            return Ok(StepOutcome::failed("missing context key: source_account_id"));
        };
        let Some(amount) = context.amount(keys::AMOUNT) else {
            return Ok(StepOutcome::failed("missing context key: amount"));
        };
        let source_id = AccountId::from_uuid(source_id);

        let mut lock = self.accounts.lock_for_update(source_id).await?;
        let account = lock.account();
        let observed = account.balance;
        context.insert_amount(keys::SOURCE_BALANCE_BEFORE, observed);

        if !account.is_active {
            tracing::warn!(account_id = %source_id, "source account is inactive");
            return Ok(StepOutcome::failed(format!(
                "source account {source_id} is inactive"
            )));
        }

        if observed < amount {
            tracing::warn!(
                account_id = %source_id,
                available = %observed,
                required = %amount,
                "insufficient balance for debit"
            );
            return Ok(StepOutcome::failed(format!(
                "insufficient balance: available {observed}, required {amount}"
            )));
        }

        let rows = lock.conditional_debit(amount).await?;
        if rows == 0 {
            return Ok(StepOutcome::failed(format!(
                "conditional debit of {amount} from account {source_id} affected no rows"
            )));
        }

        context.insert_amount(keys::SOURCE_BALANCE_AFTER, lock.account().balance);
        lock.commit().await?;

        tracing::info!(account_id = %source_id, %amount, "source account debited");
        Ok(StepOutcome::Completed)
    }

    async fn compensate(&self, context: &mut SagaContext) -> Result<StepOutcome> {
        let Some(source_id) = context.id(keys::SOURCE_ACCOUNT_ID) else {
            return Ok(StepOutcome::failed(
                "missing context key for compensation: source_account_id",
            ));
        };
        let Some(amount) = context.amount(keys::AMOUNT) else {
            return Ok(StepOutcome::failed("missing context key for compensation: amount"));
        };
        let source_id = AccountId::from_uuid(source_id);

        let mut lock = self.accounts.lock_for_update(source_id).await?;
        let restored = lock.account().balance + amount;
        lock.set_balance(restored).await?;
        context.insert_amount(keys::SOURCE_BALANCE_AFTER_REVERSAL, restored);
        lock.commit().await?;

        tracing::info!(account_id = %source_id, %amount, "debit reversed");
        Ok(StepOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, OwnerId};
    use ledger::InMemoryAccountStore;

    async fn step_with_account(
        balance_cents: i64,
    ) -> (DebitSourceStep, Arc<InMemoryAccountStore>, AccountId) {
        let store = Arc::new(InMemoryAccountStore::new());
        let account = store
            .create_account(OwnerId::new(), Money::from_cents(balance_cents))
            .await
            .unwrap();
        (DebitSourceStep::new(store.clone()), store, account.id)
    }

    fn context_for(source: AccountId, amount_cents: i64) -> SagaContext {
        let mut context = SagaContext::new();
        context.insert_id(keys::SOURCE_ACCOUNT_ID, source);
        context.insert_amount(keys::AMOUNT, Money::from_cents(amount_cents));
        context
    }

    #[tokio::test]
    async fn execute_debits_and_records_balances() {
        let (step, store, source) = step_with_account(10_000).await;
        let mut context = context_for(source, 4_000);

        let outcome = step.execute(&mut context).await.unwrap();

        assert!(outcome.is_completed());
        assert_eq!(
            context.amount(keys::SOURCE_BALANCE_BEFORE),
            Some(Money::from_cents(10_000))
        );
        assert_eq!(
            context.amount(keys::SOURCE_BALANCE_AFTER),
            Some(Money::from_cents(6_000))
        );
        let account = store.get_account(source).await.unwrap().unwrap();
        assert_eq!(account.balance, Money::from_cents(6_000));
    }

    #[tokio::test]
    async fn execute_fails_on_insufficient_balance_without_mutation() {
        let (step, store, source) = step_with_account(100).await;
        let mut context = context_for(source, 200);

        let outcome = step.execute(&mut context).await.unwrap();

        assert!(outcome.failure_reason().unwrap().contains("insufficient balance"));
        // Observed balance is recorded for diagnostics even on failure.
        assert_eq!(
            context.amount(keys::SOURCE_BALANCE_BEFORE),
            Some(Money::from_cents(100))
        );
        let account = store.get_account(source).await.unwrap().unwrap();
        assert_eq!(account.balance, Money::from_cents(100));
    }

    #[tokio::test]
    async fn execute_fails_on_inactive_account() {
        let (step, store, source) = step_with_account(10_000).await;
        store.deactivate(source).await.unwrap();
        let mut context = context_for(source, 100);

        let outcome = step.execute(&mut context).await.unwrap();

        assert!(outcome.failure_reason().unwrap().contains("inactive"));
        let account = store.get_account(source).await.unwrap().unwrap();
        assert_eq!(account.balance, Money::from_cents(10_000));
    }

    #[tokio::test]
    async fn execute_fails_on_missing_context_keys() {
        let (step, _, _) = step_with_account(10_000).await;
        let mut context = SagaContext::new();

        let outcome = step.execute(&mut context).await.unwrap();
        assert!(outcome.failure_reason().unwrap().contains("missing context key"));
    }

    #[tokio::test]
    async fn execute_propagates_unknown_account_as_error() {
        let (step, _, _) = step_with_account(10_000).await;
        let mut context = context_for(AccountId::new(), 100);

        let result = step.execute(&mut context).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn compensate_restores_the_debited_amount() {
        let (step, store, source) = step_with_account(10_000).await;
        let mut context = context_for(source, 4_000);

        step.execute(&mut context).await.unwrap();
        let outcome = step.compensate(&mut context).await.unwrap();

        assert!(outcome.is_completed());
        assert_eq!(
            context.amount(keys::SOURCE_BALANCE_AFTER_REVERSAL),
            Some(Money::from_cents(10_000))
        );
        let account = store.get_account(source).await.unwrap().unwrap();
        assert_eq!(account.balance, Money::from_cents(10_000));
    }

    #[tokio::test]
    async fn compensate_credits_even_an_inactive_account() {
        let (step, store, source) = step_with_account(10_000).await;
        let mut context = context_for(source, 4_000);

        step.execute(&mut context).await.unwrap();
        store.deactivate(source).await.unwrap();

        let outcome = step.compensate(&mut context).await.unwrap();
        assert!(outcome.is_completed());
        let account = store.get_account(source).await.unwrap().unwrap();
        assert_eq!(account.balance, Money::from_cents(10_000));
    }
}
