//! Typed saga execution context.
//!
//! The context is the durable record of everything steps have read or
//! produced: a string-keyed, order-irrelevant mapping of a small typed
//! value union. Steps agree on keys by contract (each step owns the
//! fixed set of keys documented in [`keys`]), so a key never changes
//! meaning or type between writers.

use std::collections::BTreeMap;

use common::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context keys, grouped by the component that writes them.
pub mod keys {
    /// Transfer being executed. Written by the initiation service.
    pub const TRANSFER_ID: &str = "transfer_id";
    /// Account being debited. Written by the initiation service.
    pub const SOURCE_ACCOUNT_ID: &str = "source_account_id";
    /// Account being credited. Written by the initiation service.
    pub const DESTINATION_ACCOUNT_ID: &str = "destination_account_id";
    /// Amount to move. Written by the initiation service.
    pub const AMOUNT: &str = "amount";
    /// Caller-supplied description. Written by the initiation service.
    pub const DESCRIPTION: &str = "description";

    /// Source balance observed under lock, before the debit decision.
    /// Written by the debit step on every attempt, including failures,
    /// for diagnostics.
    pub const SOURCE_BALANCE_BEFORE: &str = "source_balance_before";
    /// Source balance after a successful debit. Written by the debit step.
    pub const SOURCE_BALANCE_AFTER: &str = "source_balance_after";
    /// Source balance after the debit was reversed. Written by the debit
    /// step's compensation.
    pub const SOURCE_BALANCE_AFTER_REVERSAL: &str = "source_balance_after_reversal";

    /// Destination balance observed under lock before the credit.
    /// Written by the credit step.
    pub const DESTINATION_BALANCE_BEFORE: &str = "destination_balance_before";
    /// Destination balance after a successful credit. Written by the
    /// credit step.
    pub const DESTINATION_BALANCE_AFTER: &str = "destination_balance_after";
    /// Destination balance after the credit was reversed. Written by the
    /// credit step's compensation.
    pub const DESTINATION_BALANCE_AFTER_REVERSAL: &str = "destination_balance_after_reversal";

    /// Transfer status before it was marked succeeded. Written by the
    /// mark-succeeded step.
    pub const TRANSFER_STATUS_BEFORE: &str = "transfer_status_before";
    /// Transfer status after the mark-succeeded step ran.
    pub const TRANSFER_STATUS_AFTER: &str = "transfer_status_after";
}

/// A single typed context value.
///
/// The union is deliberately small; a step that needs a richer payload
/// belongs in the step record's `step_data`, not the shared context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContextValue {
    /// A UUID-based identifier (account, transfer, saga).
    Id(Uuid),
    /// An exact money amount.
    Amount(Money),
    /// Free-form text.
    Text(String),
}

/// The shared saga context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SagaContext {
    entries: BTreeMap<String, ContextValue>,
}

impl SagaContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the context holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Inserts a value, replacing any previous value under the key.
    pub fn insert(&mut self, key: impl Into<String>, value: ContextValue) {
        self.entries.insert(key.into(), value);
    }

    /// Inserts an identifier value.
    pub fn insert_id(&mut self, key: impl Into<String>, id: impl Into<Uuid>) {
        self.insert(key, ContextValue::Id(id.into()));
    }

    /// Inserts a money value.
    pub fn insert_amount(&mut self, key: impl Into<String>, amount: Money) {
        self.insert(key, ContextValue::Amount(amount));
    }

    /// Inserts a text value.
    pub fn insert_text(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.insert(key, ContextValue::Text(text.into()));
    }

    /// Returns the raw value under the key, if present.
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.entries.get(key)
    }

    /// Returns the identifier under the key, or `None` if the key is
    /// absent or holds a different kind of value.
    pub fn id(&self, key: &str) -> Option<Uuid> {
        match self.entries.get(key) {
            Some(ContextValue::Id(id)) => Some(*id),
            _ => None,
        }
    }

    /// Returns the money amount under the key, or `None` if absent or of
    /// a different kind.
    pub fn amount(&self, key: &str) -> Option<Money> {
        match self.entries.get(key) {
            Some(ContextValue::Amount(amount)) => Some(*amount),
            _ => None,
        }
    }

    /// Returns the text under the key, or `None` if absent or of a
    /// different kind.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(ContextValue::Text(text)) => Some(text),
            _ => None,
        }
    }
}
