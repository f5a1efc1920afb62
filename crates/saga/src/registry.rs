//! Step registry: the fixed, ordered saga plan.

use std::collections::HashMap;
use std::sync::Arc;

use ledger::AccountStore;
use transfer::TransferStore;

use crate::step::SagaStep;
use crate::steps::{CreditDestinationStep, DebitSourceStep, MarkTransferSucceededStep};

/// Maps step names to implementations and defines the ordered plan.
///
/// Built once at process start and handed to the orchestrator by value;
/// resolution never goes through a container or reflection. An unknown
/// name at resolution time is a configuration error, not a saga failure.
#[derive(Default)]
pub struct StepRegistry {
    steps: HashMap<&'static str, Arc<dyn SagaStep>>,
    plan: Vec<&'static str>,
}

impl StepRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step to the plan.
    ///
    /// Registering a second step under an existing name replaces the
    /// implementation without extending the plan.
    pub fn register(&mut self, step: Arc<dyn SagaStep>) {
        let name = step.name();
        if self.steps.insert(name, step).is_none() {
            self.plan.push(name);
        }
    }

    /// Builds the transfer saga plan:
    /// debit source → credit destination → mark transfer succeeded.
    pub fn transfer_plan(
        accounts: Arc<dyn AccountStore>,
        transfers: Arc<dyn TransferStore>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DebitSourceStep::new(accounts.clone())));
        registry.register(Arc::new(CreditDestinationStep::new(accounts)));
        registry.register(Arc::new(MarkTransferSucceededStep::new(transfers)));
        registry
    }

    /// Resolves a step name to its implementation.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn SagaStep>> {
        self.steps.get(name).cloned()
    }

    /// The ordered list of step names making up the plan.
    pub fn plan(&self) -> &[&'static str] {
        &self.plan
    }

    /// Returns the number of registered steps.
    pub fn len(&self) -> usize {
        self.plan.len()
    }

    /// Returns true if no steps are registered.
    pub fn is_empty(&self) -> bool {
        self.plan.is_empty()
    }
}
