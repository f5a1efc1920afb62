//! Transfer record and status.

use chrono::{DateTime, Utc};
use common::{AccountId, Money, SagaId, TransferId};
use serde::{Deserialize, Serialize};

/// The status of a transfer.
///
/// Status transitions:
/// ```text
/// Pending ──┬──► Success
///           └──► Cancelled
/// ```
///
/// `Cancelled` is the terminal state for every compensated transfer,
/// regardless of what the status was before compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TransferStatus {
    /// Transfer created, saga not yet finished.
    #[default]
    Pending,

    /// The transfer saga completed; funds have moved.
    Success,

    /// The transfer was compensated or abandoned; no net effect.
    Cancelled,
}

impl TransferStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "Pending",
            TransferStatus::Success => "Success",
            TransferStatus::Cancelled => "Cancelled",
        }
    }

    /// Parses a status from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(TransferStatus::Pending),
            "Success" => Some(TransferStatus::Success),
            "Cancelled" => Some(TransferStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transfer between two accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    /// Unique transfer identifier.
    pub id: TransferId,

    /// The account being debited.
    pub source_account_id: AccountId,

    /// The account being credited.
    pub destination_account_id: AccountId,

    /// Amount to move. Strictly positive, enforced at creation.
    pub amount: Money,

    /// Free-form description supplied by the caller.
    pub description: String,

    /// Current status, driven by saga steps.
    pub status: TransferStatus,

    /// The saga instance executing this transfer, once linked.
    pub saga_instance_id: Option<SagaId>,

    /// When the transfer was created.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_roundtrip() {
        for status in [
            TransferStatus::Pending,
            TransferStatus::Success,
            TransferStatus::Cancelled,
        ] {
            assert_eq!(TransferStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TransferStatus::parse("Refunded"), None);
    }

    #[test]
    fn default_status_is_pending() {
        assert_eq!(TransferStatus::default(), TransferStatus::Pending);
    }

    #[test]
    fn transfer_serialization_roundtrip() {
        let transfer = Transfer {
            id: TransferId::new(),
            source_account_id: AccountId::new(),
            destination_account_id: AccountId::new(),
            amount: Money::from_cents(4_000),
            description: "rent".to_string(),
            status: TransferStatus::Pending,
            saga_instance_id: Some(SagaId::new()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&transfer).unwrap();
        let deserialized: Transfer = serde_json::from_str(&json).unwrap();
        assert_eq!(transfer, deserialized);
    }
}
