use async_trait::async_trait;
use common::{AggregateId, AggregateState, Version};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::store::{bounded, check_continuity};
use crate::{
    AccountSnapshot, CommandStackStore, CommandStoreError, CustomerSnapshot, Result, StoreConfig,
};

/// PostgreSQL-backed gateway.
///
/// Every save runs in one transaction that locks the target row before the
/// version check. The transaction owns its connection and rolls back when
/// dropped uncommitted, including when the operation times out.
#[derive(Clone)]
pub struct PostgresCommandStackStore {
    pool: PgPool,
    config: StoreConfig,
}

impl PostgresCommandStackStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_config(pool, StoreConfig::default())
    }

    pub fn with_config(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_customer(row: PgRow) -> Result<CustomerSnapshot> {
        Ok(CustomerSnapshot {
            id: AggregateId::from_uuid(row.try_get::<Uuid, _>("id")?),
            version: Version::new(row.try_get("version")?),
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            state: row.try_get::<String, _>("state")?.parse()?,
        })
    }

    fn row_to_account(row: PgRow) -> Result<AccountSnapshot> {
        Ok(AccountSnapshot {
            id: AggregateId::from_uuid(row.try_get::<Uuid, _>("id")?),
            version: Version::new(row.try_get("version")?),
            customer_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            currency: row.try_get("currency")?,
            state: row.try_get::<String, _>("state")?.parse()?,
        })
    }

    /// Maps a lost insert race onto a version conflict.
    fn insert_conflict(aggregate_id: AggregateId, version: Version) -> impl Fn(sqlx::Error) -> CommandStoreError {
        move |e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                metrics::counter!("command_store_conflicts_total").increment(1);
                return CommandStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected: version.previous(),
                    actual: version,
                };
            }
            CommandStoreError::Database(e)
        }
    }

    async fn locked_version(
        tx: &mut Transaction<'_, Postgres>,
        sql: &str,
        id: AggregateId,
    ) -> Result<Option<Version>> {
        let version: Option<i64> = sqlx::query_scalar(sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?;
        Ok(version.map(Version::new))
    }

    async fn write_customer(&self, snapshot: CustomerSnapshot) -> Result<CustomerSnapshot> {
        let mut tx = self.pool.begin().await?;

        let stored = Self::locked_version(
            &mut tx,
            "SELECT version FROM customers WHERE id = $1 FOR UPDATE",
            snapshot.id,
        )
        .await?;

        let saved = match stored {
            None => {
                let inserted = CustomerSnapshot {
                    state: AggregateState::Open,
                    ..snapshot
                };
                sqlx::query(
                    r#"
                    INSERT INTO customers (id, version, first_name, last_name, state)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(inserted.id.as_uuid())
                .bind(inserted.version.as_i64())
                .bind(&inserted.first_name)
                .bind(&inserted.last_name)
                .bind(inserted.state.as_str())
                .execute(&mut *tx)
                .await
                .map_err(Self::insert_conflict(inserted.id, inserted.version))?;
                inserted
            }
            Some(current) => {
                check_continuity(snapshot.id, current, snapshot.version)?;
                sqlx::query(
                    r#"
                    UPDATE customers
                    SET version = $2, first_name = $3, last_name = $4, state = $5, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(snapshot.id.as_uuid())
                .bind(snapshot.version.as_i64())
                .bind(&snapshot.first_name)
                .bind(&snapshot.last_name)
                .bind(snapshot.state.as_str())
                .execute(&mut *tx)
                .await?;
                snapshot
            }
        };

        tx.commit().await?;
        metrics::counter!("command_store_saves_total", "kind" => "Customer").increment(1);
        Ok(saved)
    }

    async fn write_account(&self, snapshot: AccountSnapshot) -> Result<AccountSnapshot> {
        let mut tx = self.pool.begin().await?;

        let stored = Self::locked_version(
            &mut tx,
            "SELECT version FROM accounts WHERE id = $1 FOR UPDATE",
            snapshot.id,
        )
        .await?;

        // Keeps the owner from disappearing until this transaction ends
        let owner = Self::locked_version(
            &mut tx,
            "SELECT version FROM customers WHERE id = $1 FOR SHARE",
            snapshot.customer_id,
        )
        .await?;
        if owner.is_none() {
            return Err(CommandStoreError::OwnerNotFound {
                account_id: snapshot.id,
                customer_id: snapshot.customer_id,
            });
        }

        let saved = match stored {
            None => {
                let inserted = AccountSnapshot {
                    state: AggregateState::Open,
                    ..snapshot
                };
                sqlx::query(
                    r#"
                    INSERT INTO accounts (id, version, customer_id, currency, state)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(inserted.id.as_uuid())
                .bind(inserted.version.as_i64())
                .bind(inserted.customer_id.as_uuid())
                .bind(&inserted.currency)
                .bind(inserted.state.as_str())
                .execute(&mut *tx)
                .await
                .map_err(Self::insert_conflict(inserted.id, inserted.version))?;
                inserted
            }
            Some(current) => {
                check_continuity(snapshot.id, current, snapshot.version)?;
                let row = sqlx::query(
                    r#"
                    UPDATE accounts
                    SET version = $2, state = $3, updated_at = NOW()
                    WHERE id = $1
                    RETURNING id, version, customer_id, currency, state
                    "#,
                )
                .bind(snapshot.id.as_uuid())
                .bind(snapshot.version.as_i64())
                .bind(snapshot.state.as_str())
                .fetch_one(&mut *tx)
                .await?;
                Self::row_to_account(row)?
            }
        };

        tx.commit().await?;
        metrics::counter!("command_store_saves_total", "kind" => "Account").increment(1);
        Ok(saved)
    }

    async fn read_customer(&self, id: AggregateId) -> Result<Option<CustomerSnapshot>> {
        let row = sqlx::query(
            "SELECT id, version, first_name, last_name, state FROM customers WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_customer).transpose()
    }

    async fn read_account(&self, id: AggregateId) -> Result<Option<AccountSnapshot>> {
        let row = sqlx::query(
            "SELECT id, version, customer_id, currency, state FROM accounts WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_account).transpose()
    }
}

#[async_trait]
impl CommandStackStore for PostgresCommandStackStore {
    #[tracing::instrument(skip(self, snapshot), fields(customer_id = %snapshot.id, version = %snapshot.version))]
    async fn save_customer(&self, snapshot: CustomerSnapshot) -> Result<CustomerSnapshot> {
        bounded(
            self.config.operation_timeout,
            "save_customer",
            self.write_customer(snapshot),
        )
        .await
    }

    #[tracing::instrument(skip(self, snapshot), fields(account_id = %snapshot.id, version = %snapshot.version))]
    async fn save_account(&self, snapshot: AccountSnapshot) -> Result<AccountSnapshot> {
        bounded(
            self.config.operation_timeout,
            "save_account",
            self.write_account(snapshot),
        )
        .await
    }

    async fn get_customer(&self, id: AggregateId) -> Result<Option<CustomerSnapshot>> {
        bounded(
            self.config.operation_timeout,
            "get_customer",
            self.read_customer(id),
        )
        .await
    }

    async fn get_account(&self, id: AggregateId) -> Result<Option<AccountSnapshot>> {
        bounded(
            self.config.operation_timeout,
            "get_account",
            self.read_account(id),
        )
        .await
    }
}
