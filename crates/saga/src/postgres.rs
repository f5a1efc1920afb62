//! PostgreSQL-backed saga store.

use async_trait::async_trait;
use common::SagaId;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::context::SagaContext;
use crate::error::{Result, SagaError};
use crate::record::{SagaInstanceRecord, SagaStepRecord};
use crate::state::{SagaStatus, StepStatus};
use crate::store::SagaStore;

/// PostgreSQL-backed saga store.
///
/// The context is persisted as self-describing JSONB; statuses as their
/// string names. A unique constraint on (saga_instance_id, step_name)
/// makes `get_or_create_step` race-safe across workers.
#[derive(Clone)]
pub struct PostgresSagaStore {
    pool: PgPool,
}

impl PostgresSagaStore {
    /// Creates a new PostgreSQL saga store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_instance(row: &PgRow) -> Result<SagaInstanceRecord> {
        let status_str: String = row.try_get("status")?;
        let status = SagaStatus::parse(&status_str)
            .ok_or_else(|| SagaError::InvalidStatus(status_str))?;
        let context: SagaContext = serde_json::from_value(row.try_get("context")?)?;

        Ok(SagaInstanceRecord {
            id: SagaId::from_uuid(row.try_get::<Uuid, _>("id")?),
            status,
            context,
            current_step: row.try_get("current_step")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_step(row: &PgRow) -> Result<SagaStepRecord> {
        let status_str: String = row.try_get("status")?;
        let status = StepStatus::parse(&status_str)
            .ok_or_else(|| SagaError::InvalidStatus(status_str))?;

        Ok(SagaStepRecord {
            id: row.try_get("id")?,
            saga_instance_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_instance_id")?),
            step_name: row.try_get("step_name")?,
            status,
            error_message: row.try_get("error_message")?,
            step_data: row.try_get("step_data")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl SagaStore for PostgresSagaStore {
    async fn create_instance(&self, context: &SagaContext) -> Result<SagaInstanceRecord> {
        let record = SagaInstanceRecord::new(context.clone());

        sqlx::query(
            "INSERT INTO saga_instances (id, status, context, current_step, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.id.as_uuid())
        .bind(record.status.as_str())
        .bind(serde_json::to_value(&record.context)?)
        .bind(&record.current_step)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_instance(&self, id: SagaId) -> Result<Option<SagaInstanceRecord>> {
        let row = sqlx::query(
            "SELECT id, status, context, current_step, created_at \
             FROM saga_instances WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_instance).transpose()
    }

    async fn update_instance(&self, record: &SagaInstanceRecord) -> Result<()> {
        let rows = sqlx::query(
            "UPDATE saga_instances SET status = $2, context = $3, current_step = $4 \
             WHERE id = $1",
        )
        .bind(record.id.as_uuid())
        .bind(record.status.as_str())
        .bind(serde_json::to_value(&record.context)?)
        .bind(&record.current_step)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(SagaError::InstanceNotFound(record.id));
        }
        Ok(())
    }

    async fn get_or_create_step(
        &self,
        saga_id: SagaId,
        step_name: &str,
    ) -> Result<SagaStepRecord> {
        let record = SagaStepRecord::pending(saga_id, step_name);

        // The unique (saga_instance_id, step_name) constraint turns a
        // concurrent double-insert into a no-op for the loser.
        sqlx::query(
            "INSERT INTO saga_steps \
             (id, saga_instance_id, step_name, status, error_message, step_data, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (saga_instance_id, step_name) DO NOTHING",
        )
        .bind(record.id)
        .bind(record.saga_instance_id.as_uuid())
        .bind(&record.step_name)
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .bind(&record.step_data)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT id, saga_instance_id, step_name, status, error_message, step_data, created_at \
             FROM saga_steps WHERE saga_instance_id = $1 AND step_name = $2",
        )
        .bind(saga_id.as_uuid())
        .bind(step_name)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_step(&row)
    }

    async fn find_step(
        &self,
        saga_id: SagaId,
        step_name: &str,
        status: StepStatus,
    ) -> Result<Option<SagaStepRecord>> {
        let row = sqlx::query(
            "SELECT id, saga_instance_id, step_name, status, error_message, step_data, created_at \
             FROM saga_steps \
             WHERE saga_instance_id = $1 AND step_name = $2 AND status = $3",
        )
        .bind(saga_id.as_uuid())
        .bind(step_name)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_step).transpose()
    }

    async fn update_step(&self, record: &SagaStepRecord) -> Result<()> {
        let rows = sqlx::query(
            "UPDATE saga_steps SET status = $2, error_message = $3, step_data = $4 \
             WHERE id = $1",
        )
        .bind(record.id)
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .bind(&record.step_data)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(SagaError::StepRecordNotFound(record.id));
        }
        Ok(())
    }

    async fn steps_in_status(
        &self,
        saga_id: SagaId,
        status: StepStatus,
    ) -> Result<Vec<SagaStepRecord>> {
        let rows = sqlx::query(
            "SELECT id, saga_instance_id, step_name, status, error_message, step_data, created_at \
             FROM saga_steps \
             WHERE saga_instance_id = $1 AND status = $2 \
             ORDER BY seq ASC",
        )
        .bind(saga_id.as_uuid())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_step).collect()
    }
}
