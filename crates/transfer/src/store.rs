//! Transfer store contract.

use async_trait::async_trait;
use common::{AccountId, Money, SagaId, TransferId};

use crate::{Result, Transfer, TransferStatus};

/// Storage contract for transfer records.
#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Creates a new transfer in [`TransferStatus::Pending`].
    ///
    /// Rejects a non-positive amount and a transfer whose source equals
    /// its destination; these are validation errors raised before any
    /// saga state exists.
    async fn create(
        &self,
        source_account_id: AccountId,
        destination_account_id: AccountId,
        amount: Money,
        description: &str,
    ) -> Result<Transfer>;

    /// Returns the transfer, or `None` if it does not exist.
    async fn get(&self, id: TransferId) -> Result<Option<Transfer>>;

    /// Links the transfer to the saga instance executing it.
    async fn set_saga_instance(&self, id: TransferId, saga_id: SagaId) -> Result<()>;

    /// Sets the transfer status.
    async fn set_status(&self, id: TransferId, status: TransferStatus) -> Result<()>;

    /// Returns every transfer where the account appears as source or
    /// destination, newest first.
    async fn transfers_for_account(&self, account_id: AccountId) -> Result<Vec<Transfer>>;
}
