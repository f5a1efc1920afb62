//! In-memory saga store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::SagaId;
use tokio::sync::RwLock;

use crate::context::SagaContext;
use crate::error::{Result, SagaError};
use crate::record::{SagaInstanceRecord, SagaStepRecord};
use crate::state::StepStatus;
use crate::store::SagaStore;

#[derive(Default)]
struct SagaStoreState {
    instances: HashMap<SagaId, SagaInstanceRecord>,
    /// Step records in insertion order. Steps execute sequentially, so
    /// insertion order is completion order.
    steps: Vec<SagaStepRecord>,
}

/// In-memory saga store for testing.
///
/// Provides the same interface as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    state: Arc<RwLock<SagaStoreState>>,
}

impl InMemorySagaStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every step record of a saga, in insertion order.
    pub async fn step_records(&self, saga_id: SagaId) -> Vec<SagaStepRecord> {
        self.state
            .read()
            .await
            .steps
            .iter()
            .filter(|s| s.saga_instance_id == saga_id)
            .cloned()
            .collect()
    }

    /// Returns the number of saga instances stored.
    pub async fn instance_count(&self) -> usize {
        self.state.read().await.instances.len()
    }

    /// Clears all instances and step records.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.instances.clear();
        state.steps.clear();
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn create_instance(&self, context: &SagaContext) -> Result<SagaInstanceRecord> {
        let record = SagaInstanceRecord::new(context.clone());
        self.state
            .write()
            .await
            .instances
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_instance(&self, id: SagaId) -> Result<Option<SagaInstanceRecord>> {
        Ok(self.state.read().await.instances.get(&id).cloned())
    }

    async fn update_instance(&self, record: &SagaInstanceRecord) -> Result<()> {
        let mut state = self.state.write().await;
        let existing = state
            .instances
            .get_mut(&record.id)
            .ok_or(SagaError::InstanceNotFound(record.id))?;
        *existing = record.clone();
        Ok(())
    }

    async fn get_or_create_step(
        &self,
        saga_id: SagaId,
        step_name: &str,
    ) -> Result<SagaStepRecord> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .steps
            .iter()
            .find(|s| s.saga_instance_id == saga_id && s.step_name == step_name)
        {
            return Ok(existing.clone());
        }

        let record = SagaStepRecord::pending(saga_id, step_name);
        state.steps.push(record.clone());
        Ok(record)
    }

    async fn find_step(
        &self,
        saga_id: SagaId,
        step_name: &str,
        status: StepStatus,
    ) -> Result<Option<SagaStepRecord>> {
        Ok(self
            .state
            .read()
            .await
            .steps
            .iter()
            .find(|s| {
                s.saga_instance_id == saga_id && s.step_name == step_name && s.status == status
            })
            .cloned())
    }

    async fn update_step(&self, record: &SagaStepRecord) -> Result<()> {
        let mut state = self.state.write().await;
        let existing = state
            .steps
            .iter_mut()
            .find(|s| s.id == record.id)
            .ok_or(SagaError::StepRecordNotFound(record.id))?;
        *existing = record.clone();
        Ok(())
    }

    async fn steps_in_status(
        &self,
        saga_id: SagaId,
        status: StepStatus,
    ) -> Result<Vec<SagaStepRecord>> {
        Ok(self
            .state
            .read()
            .await
            .steps
            .iter()
            .filter(|s| s.saga_instance_id == saga_id && s.status == status)
            .cloned()
            .collect())
    }
}
