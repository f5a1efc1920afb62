//! Transfer store error types.

use common::{AccountId, Money, TransferId};
use thiserror::Error;

/// Errors that can occur during transfer record operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The transfer does not exist.
    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    /// Transfers must move a strictly positive amount.
    #[error("Transfer amount must be positive, got {0}")]
    InvalidAmount(Money),

    /// Source and destination must be different accounts.
    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(AccountId),

    /// A persisted status string could not be decoded.
    #[error("Invalid transfer status: {0}")]
    InvalidStatus(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for transfer store operations.
pub type Result<T> = std::result::Result<T, TransferError>;
