use async_trait::async_trait;
use common::SagaId;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::deadletter::{DeadLetterEntry, DeadLetterStore};
use crate::error::Result;

/// PostgreSQL-backed dead-letter store.
///
/// One shared `dead_letters` table, appended to by many saga instances and
/// queried by operators during manual cleanup. The table is append-only from
/// this subsystem's perspective.
#[derive(Clone)]
pub struct PostgresDeadLetterStore {
    pool: PgPool,
}

impl PostgresDeadLetterStore {
    /// Creates a new PostgreSQL dead-letter store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `dead_letters` table and its lookup index if missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dead_letters (
                id BIGSERIAL PRIMARY KEY,
                saga_name TEXT NOT NULL,
                instance_key TEXT NOT NULL,
                step_name TEXT NOT NULL,
                payload BYTEA NOT NULL,
                last_error TEXT NOT NULL,
                attempts BIGINT NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_dead_letters_saga \
             ON dead_letters (saga_name, instance_key)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_entry(row: PgRow) -> Result<DeadLetterEntry> {
        let saga_name: String = row.try_get("saga_name")?;
        let instance_key: String = row.try_get("instance_key")?;
        let attempts: i64 = row.try_get("attempts")?;

        Ok(DeadLetterEntry {
            saga_id: SagaId::new(saga_name, instance_key),
            step_name: row.try_get("step_name")?,
            payload: row.try_get("payload")?,
            last_error: row.try_get("last_error")?,
            attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

#[async_trait]
impl DeadLetterStore for PostgresDeadLetterStore {
    async fn append(&self, entry: DeadLetterEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dead_letters
                (saga_name, instance_key, step_name, payload, last_error, attempts, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.saga_id.name())
        .bind(entry.saga_id.instance_key())
        .bind(&entry.step_name)
        .bind(&entry.payload)
        .bind(&entry.last_error)
        .bind(i64::from(entry.attempts))
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn entries_for(&self, saga_id: &SagaId) -> Result<Vec<DeadLetterEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT saga_name, instance_key, step_name, payload, last_error, attempts, recorded_at
            FROM dead_letters
            WHERE saga_name = $1 AND instance_key = $2
            ORDER BY id ASC
            "#,
        )
        .bind(saga_id.name())
        .bind(saga_id.instance_key())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }
}
