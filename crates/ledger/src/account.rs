//! Account record.

use chrono::{DateTime, Utc};
use common::{AccountId, Money, OwnerId};
use serde::{Deserialize, Serialize};

/// A balance-holding account.
///
/// Accounts are never deleted; deactivation is a status flag. The balance
/// is mutated exclusively through the ledger's locked and conditional
/// operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier.
    pub id: AccountId,

    /// The user owning this account.
    pub owner_id: OwnerId,

    /// Current balance. Non-negative for every committed state.
    pub balance: Money,

    /// Whether the account participates in transfers. Inactive accounts
    /// reject both debits and credits.
    pub is_active: bool,

    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new active account with the given opening balance.
    pub fn open(owner_id: OwnerId, initial_balance: Money) -> Self {
        Self {
            id: AccountId::new(),
            owner_id,
            balance: initial_balance,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
