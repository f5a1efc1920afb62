//! Durable saga instance and step records.

use chrono::{DateTime, Utc};
use common::SagaId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::SagaContext;
use crate::state::{SagaStatus, StepStatus};

/// The durable record of one saga instance.
///
/// Identity is immutable; status, context, and current step change as
/// the saga progresses. All execution state lives here and in the step
/// records, never in process memory, so any worker can resume the saga.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaInstanceRecord {
    /// Unique saga instance identifier.
    pub id: SagaId,

    /// Current status.
    pub status: SagaStatus,

    /// The shared context, persisted after every successful step or
    /// compensation.
    pub context: SagaContext,

    /// Name of the last step touched, if any.
    pub current_step: Option<String>,

    /// When the instance was created.
    pub created_at: DateTime<Utc>,
}

impl SagaInstanceRecord {
    /// Creates a new instance in [`SagaStatus::Started`] with the given
    /// context.
    pub fn new(context: SagaContext) -> Self {
        Self {
            id: SagaId::new(),
            status: SagaStatus::Started,
            context,
            current_step: None,
            created_at: Utc::now(),
        }
    }
}

/// The durable record of one step within a saga instance.
///
/// Zero-or-one record exists per (saga instance, step name); its
/// `Completed` status is the idempotency marker that prevents duplicate
/// effects when the saga driver retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStepRecord {
    /// Unique record identifier.
    pub id: Uuid,

    /// The saga instance this step belongs to.
    pub saga_instance_id: SagaId,

    /// The registry name of the step.
    pub step_name: String,

    /// Current status.
    pub status: StepStatus,

    /// Diagnostic for a failed execution or compensation.
    pub error_message: Option<String>,

    /// Optional step-local payload.
    pub step_data: Option<serde_json::Value>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl SagaStepRecord {
    /// Creates a new pending record for the given step.
    pub fn pending(saga_instance_id: SagaId, step_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            saga_instance_id,
            step_name: step_name.to_string(),
            status: StepStatus::Pending,
            error_message: None,
            step_data: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_instance_starts_in_started() {
        let record = SagaInstanceRecord::new(SagaContext::new());
        assert_eq!(record.status, SagaStatus::Started);
        assert!(record.current_step.is_none());
    }

    #[test]
    fn pending_step_record() {
        let saga_id = SagaId::new();
        let record = SagaStepRecord::pending(saga_id, "debit_source");
        assert_eq!(record.saga_instance_id, saga_id);
        assert_eq!(record.step_name, "debit_source");
        assert_eq!(record.status, StepStatus::Pending);
        assert!(record.error_message.is_none());
        assert!(record.step_data.is_none());
    }

    #[test]
    fn instance_record_serialization_roundtrip() {
        let mut context = SagaContext::new();
        context.insert_text("description", "lunch");
        let record = SagaInstanceRecord::new(context);

        let json = serde_json::to_string(&record).unwrap();
        let deserialized: SagaInstanceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, deserialized);
    }
}
