//! Account store contract.

use async_trait::async_trait;
use common::{AccountId, Money, OwnerId};

use crate::{Account, Result};

/// An exclusive lock on a single account row.
///
/// Acquired via [`AccountStore::lock_for_update`] and held until
/// [`AccountLock::commit`] or drop. Mutations applied through the lock
/// become durable on commit; dropping the lock without committing
/// abandons them. The in-memory implementation applies mutations in
/// place, so callers must always commit to get identical behavior
/// across backends.
#[async_trait]
pub trait AccountLock: Send {
    /// The account as observed under the lock. Mutations applied through
    /// this lock are reflected here.
    fn account(&self) -> &Account;

    /// Atomically applies `balance -= amount` if
    /// `balance >= amount AND is_active`, through the held lock.
    ///
    /// Returns the number of rows affected: 0 means the predicate failed
    /// (insufficient balance or inactive account) and must not be treated
    /// as success.
    async fn conditional_debit(&mut self, amount: Money) -> Result<u64>;

    /// Atomically applies `balance += amount` if `is_active`, through the
    /// held lock. Returns the number of rows affected.
    async fn conditional_credit(&mut self, amount: Money) -> Result<u64>;

    /// Unconditionally overwrites the balance.
    ///
    /// Only for callers that hold this lock and have independently
    /// verified the precondition for the new value.
    async fn set_balance(&mut self, balance: Money) -> Result<()>;

    /// Commits the mutations applied through this lock and releases it.
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Storage contract for accounts.
///
/// All implementations must be thread-safe; the conditional mutations
/// evaluate their predicate at apply time so they are race-free even
/// without a prior lock.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Creates a new active account with the given opening balance.
    ///
    /// Rejects a negative opening balance with
    /// [`crate::LedgerError::InvalidAmount`].
    async fn create_account(&self, owner_id: OwnerId, initial_balance: Money) -> Result<Account>;

    /// Returns the account, or `None` if it does not exist.
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>>;

    /// Marks the account inactive. Inactive accounts reject all
    /// conditional mutations.
    async fn deactivate(&self, id: AccountId) -> Result<()>;

    /// Acquires an exclusive lock on the account for the duration of the
    /// enclosing unit of work.
    ///
    /// Used before any read that will inform a subsequent mutation
    /// decision. Acquisition is bounded by a lock-wait timeout; expiry
    /// surfaces as [`crate::LedgerError::LockTimeout`].
    async fn lock_for_update(&self, id: AccountId) -> Result<Box<dyn AccountLock>>;

    /// Atomically applies `balance -= amount` if
    /// `balance >= amount AND is_active`. Returns rows affected
    /// (0 = insufficient or inactive).
    async fn conditional_debit(&self, id: AccountId, amount: Money) -> Result<u64>;

    /// Atomically applies `balance += amount` if `is_active`. Returns
    /// rows affected.
    async fn conditional_credit(&self, id: AccountId, amount: Money) -> Result<u64>;

    /// Unconditionally overwrites the balance. Only for callers that
    /// already hold a pessimistic lock and have verified the
    /// precondition independently.
    async fn set_balance(&self, id: AccountId, balance: Money) -> Result<()>;
}
