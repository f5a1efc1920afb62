//! PostgreSQL-backed transfer store.

use async_trait::async_trait;
use common::{AccountId, Money, SagaId, TransferId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::store::TransferStore;
use crate::{Result, Transfer, TransferError, TransferStatus};

/// PostgreSQL-backed transfer store.
#[derive(Clone)]
pub struct PostgresTransferStore {
    pool: PgPool,
}

impl PostgresTransferStore {
    /// Creates a new PostgreSQL transfer store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_transfer(row: &PgRow) -> Result<Transfer> {
        let status_str: String = row.try_get("status")?;
        let status = TransferStatus::parse(&status_str)
            .ok_or_else(|| TransferError::InvalidStatus(status_str))?;

        Ok(Transfer {
            id: TransferId::from_uuid(row.try_get::<Uuid, _>("id")?),
            source_account_id: AccountId::from_uuid(row.try_get::<Uuid, _>("source_account_id")?),
            destination_account_id: AccountId::from_uuid(
                row.try_get::<Uuid, _>("destination_account_id")?,
            ),
            amount: Money::from_cents(row.try_get::<i64, _>("amount_cents")?),
            description: row.try_get("description")?,
            status,
            saga_instance_id: row
                .try_get::<Option<Uuid>, _>("saga_instance_id")?
                .map(SagaId::from_uuid),
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl TransferStore for PostgresTransferStore {
    async fn create(
        &self,
        source_account_id: AccountId,
        destination_account_id: AccountId,
        amount: Money,
        description: &str,
    ) -> Result<Transfer> {
        if !amount.is_positive() {
            return Err(TransferError::InvalidAmount(amount));
        }
        if source_account_id == destination_account_id {
            return Err(TransferError::SameAccount(source_account_id));
        }

        let transfer = Transfer {
            id: TransferId::new(),
            source_account_id,
            destination_account_id,
            amount,
            description: description.to_string(),
            status: TransferStatus::Pending,
            saga_instance_id: None,
            created_at: chrono::Utc::now(),
        };

        sqlx::query(
            "INSERT INTO transfers \
             (id, source_account_id, destination_account_id, amount_cents, \
              description, status, saga_instance_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(transfer.id.as_uuid())
        .bind(transfer.source_account_id.as_uuid())
        .bind(transfer.destination_account_id.as_uuid())
        .bind(transfer.amount.cents())
        .bind(&transfer.description)
        .bind(transfer.status.as_str())
        .bind(Option::<Uuid>::None)
        .bind(transfer.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(transfer_id = %transfer.id, %amount, "transfer created");
        Ok(transfer)
    }

    async fn get(&self, id: TransferId) -> Result<Option<Transfer>> {
        let row = sqlx::query(
            "SELECT id, source_account_id, destination_account_id, amount_cents, \
             description, status, saga_instance_id, created_at \
             FROM transfers WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_transfer).transpose()
    }

    async fn set_saga_instance(&self, id: TransferId, saga_id: SagaId) -> Result<()> {
        let rows = sqlx::query("UPDATE transfers SET saga_instance_id = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(saga_id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(TransferError::TransferNotFound(id));
        }
        Ok(())
    }

    async fn set_status(&self, id: TransferId, status: TransferStatus) -> Result<()> {
        let rows = sqlx::query("UPDATE transfers SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(TransferError::TransferNotFound(id));
        }
        Ok(())
    }

    async fn transfers_for_account(&self, account_id: AccountId) -> Result<Vec<Transfer>> {
        let rows = sqlx::query(
            "SELECT id, source_account_id, destination_account_id, amount_cents, \
             description, status, saga_instance_id, created_at \
             FROM transfers \
             WHERE source_account_id = $1 OR destination_account_id = $1 \
             ORDER BY created_at DESC",
        )
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_transfer).collect()
    }
}
