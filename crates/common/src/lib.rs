//! Shared types used across the transfer saga workspace.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{AccountId, OwnerId, SagaId, TransferId};
