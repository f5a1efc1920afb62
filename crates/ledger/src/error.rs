//! Ledger error types.

use common::AccountId;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The account does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// The per-account lock could not be acquired within the bounded
    /// lock-wait timeout. Callers must treat this as an unexpected
    /// infrastructure fault, not a business condition.
    #[error("Timed out acquiring lock on account {0}")]
    LockTimeout(AccountId),

    /// A mutation was requested with an amount outside its domain
    /// (e.g., a non-positive debit).
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
