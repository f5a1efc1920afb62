//! Saga and step state machines.

use serde::{Deserialize, Serialize};

/// The status of a saga instance.
///
/// Status transitions:
/// ```text
/// Started ──► Running ──┬──► Completed
///                       └──► Failed ──► Compensating ──► Compensated
/// ```
///
/// A compensation failure leaves the instance in `Compensating`; that is
/// a human-actionable stuck state, never silently retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaStatus {
    /// Instance persisted, no step executed yet.
    #[default]
    Started,

    /// At least one step has completed; more may follow.
    Running,

    /// Every step in the plan completed (terminal state).
    Completed,

    /// A step failed; compensation is about to begin.
    Failed,

    /// Completed steps are being compensated. The instance stays here if
    /// a compensation fails.
    Compensating,

    /// Every completed step was compensated; no net effect remains
    /// (terminal state).
    Compensated,
}

impl SagaStatus {
    /// Returns true if `execute_step` must refuse to run for an instance
    /// in this status.
    pub fn forbids_execution(&self) -> bool {
        matches!(
            self,
            SagaStatus::Failed | SagaStatus::Compensating | SagaStatus::Compensated
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStatus::Completed | SagaStatus::Compensated)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Started => "Started",
            SagaStatus::Running => "Running",
            SagaStatus::Completed => "Completed",
            SagaStatus::Failed => "Failed",
            SagaStatus::Compensating => "Compensating",
            SagaStatus::Compensated => "Compensated",
        }
    }

    /// Parses a status from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Started" => Some(SagaStatus::Started),
            "Running" => Some(SagaStatus::Running),
            "Completed" => Some(SagaStatus::Completed),
            "Failed" => Some(SagaStatus::Failed),
            "Compensating" => Some(SagaStatus::Compensating),
            "Compensated" => Some(SagaStatus::Compensated),
            _ => None,
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of a single saga step record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StepStatus {
    /// Record created, execution not started.
    #[default]
    Pending,

    /// The step is executing. At most one record per (saga, step name)
    /// is ever in this state.
    Running,

    /// The step executed successfully. This record is the durable
    /// idempotency marker for the step.
    Completed,

    /// Execution or compensation failed; the error message carries the
    /// diagnostic.
    Failed,

    /// The step's compensation is executing.
    Compensating,

    /// The step's effect has been reversed.
    Compensated,
}

impl StepStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "Pending",
            StepStatus::Running => "Running",
            StepStatus::Completed => "Completed",
            StepStatus::Failed => "Failed",
            StepStatus::Compensating => "Compensating",
            StepStatus::Compensated => "Compensated",
        }
    }

    /// Parses a status from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(StepStatus::Pending),
            "Running" => Some(StepStatus::Running),
            "Completed" => Some(StepStatus::Completed),
            "Failed" => Some(StepStatus::Failed),
            "Compensating" => Some(StepStatus::Compensating),
            "Compensated" => Some(StepStatus::Compensated),
            _ => None,
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
