//! In-memory account store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{AccountId, Money, OwnerId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::store::{AccountLock, AccountStore};
use crate::{Account, LedgerError, Result};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// In-memory account store for testing.
///
/// Provides the same interface and locking semantics as the PostgreSQL
/// implementation: one exclusive lock per account row, bounded lock-wait,
/// and conditional mutations whose predicates are evaluated at apply time.
#[derive(Clone)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<AccountId, Arc<Mutex<Account>>>>>,
    lock_timeout: Duration,
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAccountStore {
    /// Creates a new empty store with the default lock-wait timeout.
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates a store with a specific lock-wait timeout.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            lock_timeout,
        }
    }

    /// Returns the number of accounts in the store.
    pub fn account_count(&self) -> usize {
        self.accounts.read().unwrap().len()
    }

    fn cell(&self, id: AccountId) -> Result<Arc<Mutex<Account>>> {
        self.accounts
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(id))
    }

    async fn acquire(&self, id: AccountId) -> Result<OwnedMutexGuard<Account>> {
        let cell = self.cell(id)?;
        tokio::time::timeout(self.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| LedgerError::LockTimeout(id))
    }
}

struct InMemoryAccountLock {
    guard: OwnedMutexGuard<Account>,
}

#[async_trait]
impl AccountLock for InMemoryAccountLock {
    fn account(&self) -> &Account {
        &self.guard
    }

    async fn conditional_debit(&mut self, amount: Money) -> Result<u64> {
        require_positive(amount)?;
        if self.guard.is_active && self.guard.balance >= amount {
            self.guard.balance -= amount;
            Ok(1)
        } else {
            Ok(0)
        }
    }

    async fn conditional_credit(&mut self, amount: Money) -> Result<u64> {
        require_positive(amount)?;
        if self.guard.is_active {
            self.guard.balance += amount;
            Ok(1)
        } else {
            Ok(0)
        }
    }

    async fn set_balance(&mut self, balance: Money) -> Result<()> {
        self.guard.balance = balance;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        // Mutations were applied in place; dropping the guard releases
        // the lock.
        Ok(())
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn create_account(&self, owner_id: OwnerId, initial_balance: Money) -> Result<Account> {
        if initial_balance.is_negative() {
            return Err(LedgerError::InvalidAmount(format!(
                "opening balance must not be negative, got {initial_balance}"
            )));
        }

        let account = Account::open(owner_id, initial_balance);
        self.accounts
            .write()
            .unwrap()
            .insert(account.id, Arc::new(Mutex::new(account.clone())));

        tracing::debug!(account_id = %account.id, %owner_id, "account created");
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let Some(cell) = self.accounts.read().unwrap().get(&id).cloned() else {
            return Ok(None);
        };
        let guard = tokio::time::timeout(self.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| LedgerError::LockTimeout(id))?;
        Ok(Some(guard.clone()))
    }

    async fn deactivate(&self, id: AccountId) -> Result<()> {
        let mut guard = self.acquire(id).await?;
        guard.is_active = false;
        Ok(())
    }

    async fn lock_for_update(&self, id: AccountId) -> Result<Box<dyn AccountLock>> {
        let guard = self.acquire(id).await?;
        Ok(Box::new(InMemoryAccountLock { guard }))
    }

    async fn conditional_debit(&self, id: AccountId, amount: Money) -> Result<u64> {
        require_positive(amount)?;
        let mut guard = self.acquire(id).await?;
        if guard.is_active && guard.balance >= amount {
            guard.balance -= amount;
            Ok(1)
        } else {
            Ok(0)
        }
    }

    async fn conditional_credit(&self, id: AccountId, amount: Money) -> Result<u64> {
        require_positive(amount)?;
        let mut guard = self.acquire(id).await?;
        if guard.is_active {
            guard.balance += amount;
            Ok(1)
        } else {
            Ok(0)
        }
    }

    async fn set_balance(&self, id: AccountId, balance: Money) -> Result<()> {
        let mut guard = self.acquire(id).await?;
        guard.balance = balance;
        Ok(())
    }
}

fn require_positive(amount: Money) -> Result<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount(format!(
            "mutation amount must be positive, got {amount}"
        )))
    }
}
