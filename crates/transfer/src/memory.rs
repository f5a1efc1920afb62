//! In-memory transfer store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use common::{AccountId, Money, SagaId, TransferId};

use crate::store::TransferStore;
use crate::{Result, Transfer, TransferError, TransferStatus};

/// In-memory transfer store for testing.
///
/// Provides the same interface as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryTransferStore {
    transfers: Arc<RwLock<HashMap<TransferId, Transfer>>>,
}

impl InMemoryTransferStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of transfers in the store.
    pub fn transfer_count(&self) -> usize {
        self.transfers.read().unwrap().len()
    }
}

#[async_trait]
impl TransferStore for InMemoryTransferStore {
    async fn create(
        &self,
        source_account_id: AccountId,
        destination_account_id: AccountId,
        amount: Money,
        description: &str,
    ) -> Result<Transfer> {
        if !amount.is_positive() {
            return Err(TransferError::InvalidAmount(amount));
        }
        if source_account_id == destination_account_id {
            return Err(TransferError::SameAccount(source_account_id));
        }

        let transfer = Transfer {
            id: TransferId::new(),
            source_account_id,
            destination_account_id,
            amount,
            description: description.to_string(),
            status: TransferStatus::Pending,
            saga_instance_id: None,
            created_at: Utc::now(),
        };
        self.transfers
            .write()
            .unwrap()
            .insert(transfer.id, transfer.clone());

        tracing::debug!(transfer_id = %transfer.id, %amount, "transfer created");
        Ok(transfer)
    }

    async fn get(&self, id: TransferId) -> Result<Option<Transfer>> {
        Ok(self.transfers.read().unwrap().get(&id).cloned())
    }

    async fn set_saga_instance(&self, id: TransferId, saga_id: SagaId) -> Result<()> {
        let mut transfers = self.transfers.write().unwrap();
        let transfer = transfers
            .get_mut(&id)
            .ok_or(TransferError::TransferNotFound(id))?;
        transfer.saga_instance_id = Some(saga_id);
        Ok(())
    }

    async fn set_status(&self, id: TransferId, status: TransferStatus) -> Result<()> {
        let mut transfers = self.transfers.write().unwrap();
        let transfer = transfers
            .get_mut(&id)
            .ok_or(TransferError::TransferNotFound(id))?;
        transfer.status = status;
        Ok(())
    }

    async fn transfers_for_account(&self, account_id: AccountId) -> Result<Vec<Transfer>> {
        let transfers = self.transfers.read().unwrap();
        let mut matching: Vec<Transfer> = transfers
            .values()
            .filter(|t| {
                t.source_account_id == account_id || t.destination_account_id == account_id
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}
