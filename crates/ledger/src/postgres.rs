//! PostgreSQL-backed account store.

use async_trait::async_trait;
use common::{AccountId, Money, OwnerId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::store::{AccountLock, AccountStore};
use crate::{Account, LedgerError, Result};

/// SQLSTATE raised by PostgreSQL when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Bounded wait applied to every row lock acquisition.
const LOCK_WAIT: &str = "5s";

/// PostgreSQL-backed account store.
///
/// `lock_for_update` opens a transaction and takes a `SELECT ... FOR
/// UPDATE` row lock; the lock is released when the returned guard commits
/// or is dropped (rollback). The conditional mutations are single
/// `UPDATE` statements whose predicates run inside the database.
#[derive(Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    /// Creates a new PostgreSQL account store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the workspace database migrations (accounts, transfers, and
    /// saga tables).
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_account(row: &PgRow) -> Result<Account> {
        Ok(Account {
            id: AccountId::from_uuid(row.try_get::<Uuid, _>("id")?),
            owner_id: OwnerId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
            balance: Money::from_cents(row.try_get::<i64, _>("balance_cents")?),
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

struct PostgresAccountLock {
    tx: Transaction<'static, Postgres>,
    account: Account,
}

#[async_trait]
impl AccountLock for PostgresAccountLock {
    fn account(&self) -> &Account {
        &self.account
    }

    async fn conditional_debit(&mut self, amount: Money) -> Result<u64> {
        require_positive(amount)?;
        let rows = sqlx::query(
            "UPDATE accounts SET balance_cents = balance_cents - $2 \
             WHERE id = $1 AND balance_cents >= $2 AND is_active",
        )
        .bind(self.account.id.as_uuid())
        .bind(amount.cents())
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows == 1 {
            self.account.balance -= amount;
        }
        Ok(rows)
    }

    async fn conditional_credit(&mut self, amount: Money) -> Result<u64> {
        require_positive(amount)?;
        let rows = sqlx::query(
            "UPDATE accounts SET balance_cents = balance_cents + $2 \
             WHERE id = $1 AND is_active",
        )
        .bind(self.account.id.as_uuid())
        .bind(amount.cents())
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows == 1 {
            self.account.balance += amount;
        }
        Ok(rows)
    }

    async fn set_balance(&mut self, balance: Money) -> Result<()> {
        sqlx::query("UPDATE accounts SET balance_cents = $2 WHERE id = $1")
            .bind(self.account.id.as_uuid())
            .bind(balance.cents())
            .execute(&mut *self.tx)
            .await?;
        self.account.balance = balance;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn create_account(&self, owner_id: OwnerId, initial_balance: Money) -> Result<Account> {
        if initial_balance.is_negative() {
            return Err(LedgerError::InvalidAmount(format!(
                "opening balance must not be negative, got {initial_balance}"
            )));
        }

        let account = Account::open(owner_id, initial_balance);
        sqlx::query(
            "INSERT INTO accounts (id, owner_id, balance_cents, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(account.id.as_uuid())
        .bind(account.owner_id.as_uuid())
        .bind(account.balance.cents())
        .bind(account.is_active)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(account_id = %account.id, %owner_id, "account created");
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT id, owner_id, balance_cents, is_active, created_at \
             FROM accounts WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    async fn deactivate(&self, id: AccountId) -> Result<()> {
        let rows = sqlx::query("UPDATE accounts SET is_active = FALSE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(LedgerError::AccountNotFound(id));
        }
        Ok(())
    }

    async fn lock_for_update(&self, id: AccountId) -> Result<Box<dyn AccountLock>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("SET LOCAL lock_timeout = '{LOCK_WAIT}'"))
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            "SELECT id, owner_id, balance_cents, is_active, created_at \
             FROM accounts WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_lock_error(e, id))?;

        let Some(row) = row else {
            return Err(LedgerError::AccountNotFound(id));
        };

        let account = Self::row_to_account(&row)?;
        Ok(Box::new(PostgresAccountLock { tx, account }))
    }

    async fn conditional_debit(&self, id: AccountId, amount: Money) -> Result<u64> {
        require_positive(amount)?;
        let rows = sqlx::query(
            "UPDATE accounts SET balance_cents = balance_cents - $2 \
             WHERE id = $1 AND balance_cents >= $2 AND is_active",
        )
        .bind(id.as_uuid())
        .bind(amount.cents())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows)
    }

    async fn conditional_credit(&self, id: AccountId, amount: Money) -> Result<u64> {
        require_positive(amount)?;
        let rows = sqlx::query(
            "UPDATE accounts SET balance_cents = balance_cents + $2 \
             WHERE id = $1 AND is_active",
        )
        .bind(id.as_uuid())
        .bind(amount.cents())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows)
    }

    async fn set_balance(&self, id: AccountId, balance: Money) -> Result<()> {
        let rows = sqlx::query("UPDATE accounts SET balance_cents = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(balance.cents())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(LedgerError::AccountNotFound(id));
        }
        Ok(())
    }
}

fn map_lock_error(error: sqlx::Error, id: AccountId) -> LedgerError {
    if let sqlx::Error::Database(ref db_err) = error
        && db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE)
    {
        return LedgerError::LockTimeout(id);
    }
    LedgerError::Database(error)
}

fn require_positive(amount: Money) -> Result<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount(format!(
            "mutation amount must be positive, got {amount}"
        )))
    }
}
