//! Integration tests for the transfer saga.

use std::sync::Arc;

use common::{AccountId, Money, OwnerId};
use ledger::{AccountStore, InMemoryAccountStore};
use saga::context::keys;
use saga::{
    InMemorySagaStore, SagaContext, SagaError, SagaOrchestrator, SagaStatus, StepRegistry,
    StepStatus, TransferInitiationService,
};
use transfer::{InMemoryTransferStore, TransferStatus, TransferStore};

type TestService = TransferInitiationService<InMemorySagaStore>;

struct TestHarness {
    accounts: Arc<InMemoryAccountStore>,
    transfers: Arc<InMemoryTransferStore>,
    saga_store: InMemorySagaStore,
    service: Arc<TestService>,
}

impl TestHarness {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("warn")
            .with_test_writer()
            .try_init();

        let accounts = Arc::new(InMemoryAccountStore::new());
        let transfers = Arc::new(InMemoryTransferStore::new());
        let saga_store = InMemorySagaStore::new();

        let registry = StepRegistry::transfer_plan(accounts.clone(), transfers.clone());
        let orchestrator = SagaOrchestrator::new(saga_store.clone(), registry);
        let service = Arc::new(TransferInitiationService::new(
            orchestrator,
            accounts.clone(),
            transfers.clone(),
        ));

        Self {
            accounts,
            transfers,
            saga_store,
            service,
        }
    }

    async fn account_with_balance(&self, cents: i64) -> AccountId {
        self.accounts
            .create_account(OwnerId::new(), Money::from_cents(cents))
            .await
            .unwrap()
            .id
    }

    async fn balance(&self, id: AccountId) -> Money {
        self.accounts.get_account(id).await.unwrap().unwrap().balance
    }
}

#[tokio::test]
async fn successful_transfer_moves_funds_and_completes_saga() {
    let h = TestHarness::new();
    let source = h.account_with_balance(10_000).await;
    let destination = h.account_with_balance(0).await;

    let outcome = h
        .service
        .initiate_transfer(source, destination, Money::from_cents(4_000), "rent")
        .await
        .unwrap();

    assert_eq!(outcome.status, SagaStatus::Completed);
    assert_eq!(h.balance(source).await, Money::from_cents(6_000));
    assert_eq!(h.balance(destination).await, Money::from_cents(4_000));

    let transfer = h.transfers.get(outcome.transfer_id).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Success);
    assert_eq!(transfer.saga_instance_id, Some(outcome.saga_id));

    let instance = h
        .service
        .orchestrator()
        .get_saga_instance(outcome.saga_id)
        .await
        .unwrap();
    assert_eq!(instance.status, SagaStatus::Completed);
    assert_eq!(
        instance.current_step.as_deref(),
        Some("mark_transfer_succeeded")
    );

    let records = h.saga_store.step_records(outcome.saga_id).await;
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == StepStatus::Completed));
}

#[tokio::test]
async fn successful_transfer_accumulates_balance_diagnostics_in_context() {
    let h = TestHarness::new();
    let source = h.account_with_balance(10_000).await;
    let destination = h.account_with_balance(500).await;

    let outcome = h
        .service
        .initiate_transfer(source, destination, Money::from_cents(1_000), "lunch")
        .await
        .unwrap();

    let context = h
        .service
        .orchestrator()
        .get_saga_instance(outcome.saga_id)
        .await
        .unwrap()
        .context;

    assert_eq!(
        context.amount(keys::SOURCE_BALANCE_BEFORE),
        Some(Money::from_cents(10_000))
    );
    assert_eq!(
        context.amount(keys::SOURCE_BALANCE_AFTER),
        Some(Money::from_cents(9_000))
    );
    assert_eq!(
        context.amount(keys::DESTINATION_BALANCE_BEFORE),
        Some(Money::from_cents(500))
    );
    assert_eq!(
        context.amount(keys::DESTINATION_BALANCE_AFTER),
        Some(Money::from_cents(1_500))
    );
    assert_eq!(context.text(keys::TRANSFER_STATUS_BEFORE), Some("Pending"));
    assert_eq!(context.text(keys::TRANSFER_STATUS_AFTER), Some("Success"));
}

#[tokio::test]
async fn insufficient_balance_compensates_with_no_net_effect() {
    let h = TestHarness::new();
    let source = h.account_with_balance(100).await;
    let destination = h.account_with_balance(50).await;

    let outcome = h
        .service
        .initiate_transfer(source, destination, Money::from_cents(200), "too much")
        .await
        .unwrap();

    assert_eq!(outcome.status, SagaStatus::Compensated);
    assert_eq!(h.balance(source).await, Money::from_cents(100));
    assert_eq!(h.balance(destination).await, Money::from_cents(50));

    let transfer = h.transfers.get(outcome.transfer_id).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Cancelled);

    let records = h.saga_store.step_records(outcome.saga_id).await;
    let debit = records
        .iter()
        .find(|r| r.step_name == "debit_source")
        .unwrap();
    assert_eq!(debit.status, StepStatus::Failed);
    assert!(debit
        .error_message
        .as_deref()
        .unwrap()
        .contains("insufficient balance"));
}

#[tokio::test]
async fn oversized_second_transfer_leaves_first_intact() {
    // Account A holds $100, account B holds $0. A 40-unit transfer
    // succeeds; a later oversized transfer leaves both untouched.
    let h = TestHarness::new();
    let a = h.account_with_balance(10_000).await;
    let b = h.account_with_balance(0).await;

    let first = h
        .service
        .initiate_transfer(a, b, Money::from_cents(4_000), "first")
        .await
        .unwrap();
    assert_eq!(first.status, SagaStatus::Completed);
    assert_eq!(h.balance(a).await, Money::from_cents(6_000));
    assert_eq!(h.balance(b).await, Money::from_cents(4_000));

    let second = h
        .service
        .initiate_transfer(a, b, Money::from_cents(100_000), "second")
        .await
        .unwrap();
    assert_eq!(second.status, SagaStatus::Compensated);
    assert_eq!(h.balance(a).await, Money::from_cents(6_000));
    assert_eq!(h.balance(b).await, Money::from_cents(4_000));

    let transfer = h.transfers.get(second.transfer_id).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Cancelled);
}

#[tokio::test]
async fn destination_failure_reverses_the_debit() {
    // The destination goes inactive after validation, so the saga fails
    // at the credit step and the already-applied debit must be reversed.
    let h = TestHarness::new();
    let source = h.account_with_balance(10_000).await;
    let destination = h.account_with_balance(0).await;

    let transfer = h
        .transfers
        .create(source, destination, Money::from_cents(4_000), "doomed")
        .await
        .unwrap();

    let mut context = SagaContext::new();
    context.insert_id(keys::TRANSFER_ID, transfer.id);
    context.insert_id(keys::SOURCE_ACCOUNT_ID, source);
    context.insert_id(keys::DESTINATION_ACCOUNT_ID, destination);
    context.insert_amount(keys::AMOUNT, Money::from_cents(4_000));

    let saga_id = h
        .service
        .orchestrator()
        .start_saga(&context)
        .await
        .unwrap();
    h.transfers.set_saga_instance(transfer.id, saga_id).await.unwrap();

    h.accounts.deactivate(destination).await.unwrap();

    let status = h.service.run_saga(saga_id).await.unwrap();

    assert_eq!(status, SagaStatus::Compensated);
    assert_eq!(h.balance(source).await, Money::from_cents(10_000));
    assert_eq!(h.balance(destination).await, Money::zero());

    let records = h.saga_store.step_records(saga_id).await;
    let debit = records
        .iter()
        .find(|r| r.step_name == "debit_source")
        .unwrap();
    assert_eq!(debit.status, StepStatus::Compensated);
    let credit = records
        .iter()
        .find(|r| r.step_name == "credit_destination")
        .unwrap();
    assert_eq!(credit.status, StepStatus::Failed);

    let cancelled = h.transfers.get(transfer.id).await.unwrap().unwrap();
    assert_eq!(cancelled.status, TransferStatus::Cancelled);
}

#[tokio::test]
async fn executing_a_completed_step_twice_debits_once() {
    let h = TestHarness::new();
    let source = h.account_with_balance(10_000).await;
    let destination = h.account_with_balance(0).await;

    let transfer = h
        .transfers
        .create(source, destination, Money::from_cents(4_000), "")
        .await
        .unwrap();

    let mut context = SagaContext::new();
    context.insert_id(keys::TRANSFER_ID, transfer.id);
    context.insert_id(keys::SOURCE_ACCOUNT_ID, source);
    context.insert_id(keys::DESTINATION_ACCOUNT_ID, destination);
    context.insert_amount(keys::AMOUNT, Money::from_cents(4_000));

    let orchestrator = h.service.orchestrator();
    let saga_id = orchestrator.start_saga(&context).await.unwrap();

    assert!(orchestrator.execute_step(saga_id, "debit_source").await.unwrap());
    assert!(orchestrator.execute_step(saga_id, "debit_source").await.unwrap());

    // Exactly one debit applied.
    assert_eq!(h.balance(source).await, Money::from_cents(6_000));
}

#[tokio::test]
async fn resuming_a_completed_saga_changes_nothing() {
    let h = TestHarness::new();
    let source = h.account_with_balance(10_000).await;
    let destination = h.account_with_balance(0).await;

    let outcome = h
        .service
        .initiate_transfer(source, destination, Money::from_cents(4_000), "once")
        .await
        .unwrap();
    assert_eq!(outcome.status, SagaStatus::Completed);

    // A second driver picks the saga up; every step short-circuits.
    let status = h.service.run_saga(outcome.saga_id).await.unwrap();

    assert_eq!(status, SagaStatus::Completed);
    assert_eq!(h.balance(source).await, Money::from_cents(6_000));
    assert_eq!(h.balance(destination).await, Money::from_cents(4_000));
}

#[tokio::test]
async fn concurrent_transfers_from_one_account_allow_exactly_one_winner() {
    // Two concurrent 60-unit transfers from an account holding 100:
    // exactly one completes, the other compensates, and the final
    // balance is 40, never negative.
    let h = TestHarness::new();
    let source = h.account_with_balance(10_000).await;
    let destination = h.account_with_balance(0).await;

    let amount = Money::from_cents(6_000);
    let s1 = h.service.clone();
    let s2 = h.service.clone();
    let t1 = tokio::spawn(async move {
        s1.initiate_transfer(source, destination, amount, "one").await
    });
    let t2 = tokio::spawn(async move {
        s2.initiate_transfer(source, destination, amount, "two").await
    });

    let o1 = t1.await.unwrap().unwrap();
    let o2 = t2.await.unwrap().unwrap();

    let statuses = [o1.status, o2.status];
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == SagaStatus::Completed)
            .count(),
        1,
        "exactly one transfer must complete, got {statuses:?}"
    );
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == SagaStatus::Compensated)
            .count(),
        1,
        "exactly one transfer must compensate, got {statuses:?}"
    );

    assert_eq!(h.balance(source).await, Money::from_cents(4_000));
    assert_eq!(h.balance(destination).await, Money::from_cents(6_000));
}

#[tokio::test]
async fn spent_destination_balance_leaves_saga_stuck_compensating() {
    let h = TestHarness::new();
    let source = h.account_with_balance(10_000).await;
    let destination = h.account_with_balance(0).await;

    let transfer = h
        .transfers
        .create(source, destination, Money::from_cents(4_000), "")
        .await
        .unwrap();

    let mut context = SagaContext::new();
    context.insert_id(keys::TRANSFER_ID, transfer.id);
    context.insert_id(keys::SOURCE_ACCOUNT_ID, source);
    context.insert_id(keys::DESTINATION_ACCOUNT_ID, destination);
    context.insert_amount(keys::AMOUNT, Money::from_cents(4_000));

    let orchestrator = h.service.orchestrator();
    let saga_id = orchestrator.start_saga(&context).await.unwrap();
    assert!(orchestrator.execute_step(saga_id, "debit_source").await.unwrap());
    assert!(orchestrator
        .execute_step(saga_id, "credit_destination")
        .await
        .unwrap());

    // The destination spends the credited funds before anything fails.
    h.accounts
        .set_balance(destination, Money::zero())
        .await
        .unwrap();

    let result = orchestrator.fail_saga(saga_id).await;
    assert!(matches!(
        result,
        Err(SagaError::CompensationFailed { ref step, .. }) if step == "credit_destination"
    ));

    // Stuck: instance stays Compensating, the source debit is not yet
    // restored, and the transfer is untouched. Operator territory.
    let instance = orchestrator.get_saga_instance(saga_id).await.unwrap();
    assert_eq!(instance.status, SagaStatus::Compensating);
    assert_eq!(h.balance(source).await, Money::from_cents(6_000));

    let records = h.saga_store.step_records(saga_id).await;
    let credit = records
        .iter()
        .find(|r| r.step_name == "credit_destination")
        .unwrap();
    assert_eq!(credit.status, StepStatus::Failed);
    let debit = records
        .iter()
        .find(|r| r.step_name == "debit_source")
        .unwrap();
    assert_eq!(debit.status, StepStatus::Completed);

    // No further execution is allowed on the stuck instance.
    assert!(!orchestrator.execute_step(saga_id, "debit_source").await.unwrap());
}

#[tokio::test]
async fn validation_rejects_before_any_saga_state_exists() {
    let h = TestHarness::new();
    let active = h.account_with_balance(10_000).await;
    let other = h.account_with_balance(0).await;
    let inactive = h.account_with_balance(10_000).await;
    h.accounts.deactivate(inactive).await.unwrap();

    // Non-positive amount.
    let result = h
        .service
        .initiate_transfer(active, other, Money::zero(), "")
        .await;
    assert!(matches!(result, Err(SagaError::InvalidTransfer(_))));

    // Same account on both sides.
    let result = h
        .service
        .initiate_transfer(active, active, Money::from_cents(100), "")
        .await;
    assert!(matches!(result, Err(SagaError::InvalidTransfer(_))));

    // Unknown source.
    let result = h
        .service
        .initiate_transfer(AccountId::new(), other, Money::from_cents(100), "")
        .await;
    assert!(matches!(result, Err(SagaError::InvalidTransfer(_))));

    // Inactive source.
    let result = h
        .service
        .initiate_transfer(inactive, other, Money::from_cents(100), "")
        .await;
    assert!(matches!(result, Err(SagaError::InvalidTransfer(_))));

    // Inactive destination.
    let result = h
        .service
        .initiate_transfer(active, inactive, Money::from_cents(100), "")
        .await;
    assert!(matches!(result, Err(SagaError::InvalidTransfer(_))));

    // Nothing was persisted by any of the rejections.
    assert_eq!(h.transfers.transfer_count(), 0);
    assert_eq!(h.saga_store.instance_count().await, 0);
    assert_eq!(h.balance(active).await, Money::from_cents(10_000));
}

#[tokio::test]
async fn per_transfer_maximum_is_enforced() {
    let h = TestHarness::new();
    let source = h.account_with_balance(10_000).await;
    let destination = h.account_with_balance(0).await;

    let registry = StepRegistry::transfer_plan(h.accounts.clone(), h.transfers.clone());
    let orchestrator = SagaOrchestrator::new(h.saga_store.clone(), registry);
    let capped = TransferInitiationService::new(
        orchestrator,
        h.accounts.clone(),
        h.transfers.clone(),
    )
    .with_max_amount(Money::from_cents(500));

    let result = capped
        .initiate_transfer(source, destination, Money::from_cents(1_000), "")
        .await;
    assert!(matches!(result, Err(SagaError::InvalidTransfer(_))));
    assert_eq!(h.balance(source).await, Money::from_cents(10_000));
}

#[tokio::test]
async fn independent_sagas_do_not_interfere() {
    let h = TestHarness::new();
    let a = h.account_with_balance(5_000).await;
    let b = h.account_with_balance(5_000).await;
    let c = h.account_with_balance(0).await;
    let d = h.account_with_balance(0).await;

    let o1 = h
        .service
        .initiate_transfer(a, c, Money::from_cents(1_000), "a to c")
        .await
        .unwrap();
    let o2 = h
        .service
        .initiate_transfer(b, d, Money::from_cents(2_000), "b to d")
        .await
        .unwrap();

    assert_eq!(o1.status, SagaStatus::Completed);
    assert_eq!(o2.status, SagaStatus::Completed);
    assert_ne!(o1.saga_id, o2.saga_id);
    assert_eq!(h.balance(a).await, Money::from_cents(4_000));
    assert_eq!(h.balance(b).await, Money::from_cents(3_000));
    assert_eq!(h.balance(c).await, Money::from_cents(1_000));
    assert_eq!(h.balance(d).await, Money::from_cents(2_000));
}
