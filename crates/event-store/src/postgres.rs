use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, Commit, CommitAttempt, CommitId, EventEnvelope, EventStoreError, Result, Version,
    store::{CommitStream, EventStore},
};

const UNIQUE_STREAM_SEQUENCE: &str = "unique_stream_commit_sequence";

/// PostgreSQL-backed event log.
///
/// Each commit is one row; its events are stored as a JSON array so that a
/// commit is written and read back atomically.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
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

    fn row_to_commit(row: PgRow) -> Result<Commit> {
        let events: Vec<EventEnvelope> = serde_json::from_value(row.try_get("events")?)?;
        let headers: HashMap<String, serde_json::Value> =
            serde_json::from_value(row.try_get("headers")?)?;

        Ok(Commit {
            commit_id: CommitId::from_uuid(row.try_get::<Uuid, _>("commit_id")?),
            stream_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("stream_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            commit_sequence: Version::new(row.try_get("commit_sequence")?),
            checkpoint: row.try_get("checkpoint")?,
            committed_at: row.try_get("committed_at")?,
            events,
            headers,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[tracing::instrument(skip(self, attempt), fields(stream_id = %attempt.stream_id))]
    async fn commit(&self, attempt: CommitAttempt) -> Result<Commit> {
        attempt.validate()?;

        let stream_id = attempt.stream_id;
        let expected = attempt.expected_version;
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(commit_sequence) FROM commits WHERE stream_id = $1")
                .bind(stream_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
        let actual = Version::new(current.unwrap_or(0));

        if actual != expected {
            metrics::counter!("event_store_concurrency_conflicts_total").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                stream_id,
                expected,
                actual,
            });
        }

        let events_json = serde_json::to_value(&attempt.events)?;
        let headers_json = serde_json::to_value(&attempt.headers)?;
        let commit_sequence = attempt.resulting_version();
        let committed_at = Utc::now();

        let checkpoint: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO commits (commit_id, stream_id, aggregate_type, commit_sequence, committed_at, events, headers)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING checkpoint
            "#,
        )
        .bind(attempt.commit_id.as_uuid())
        .bind(stream_id.as_uuid())
        .bind(&attempt.aggregate_type)
        .bind(commit_sequence.as_i64())
        .bind(committed_at)
        .bind(events_json)
        .bind(headers_json)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            // A concurrent writer won the race for this sequence
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(UNIQUE_STREAM_SEQUENCE)
            {
                metrics::counter!("event_store_concurrency_conflicts_total").increment(1);
                return EventStoreError::ConcurrencyConflict {
                    stream_id,
                    expected,
                    actual: commit_sequence,
                };
            }
            EventStoreError::Database(e)
        })?;

        tx.commit().await?;
        metrics::counter!("event_store_commits_total").increment(1);

        Ok(attempt.into_commit(checkpoint, committed_at))
    }

    async fn get_commits(
        &self,
        stream_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<Commit>> {
        let rows = sqlx::query(
            r#"
            SELECT commit_id, stream_id, aggregate_type, commit_sequence, checkpoint, committed_at, events, headers
            FROM commits
            WHERE stream_id = $1 AND commit_sequence >= $2
            ORDER BY commit_sequence ASC
            "#,
        )
        .bind(stream_id.as_uuid())
        .bind(from_version.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_commit).collect()
    }

    async fn stream_all_commits(&self) -> Result<CommitStream> {
        use futures_util::StreamExt;

        let stream = sqlx::query(
            r#"
            SELECT commit_id, stream_id, aggregate_type, commit_sequence, checkpoint, committed_at, events, headers
            FROM commits
            ORDER BY checkpoint ASC
            "#,
        )
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => Self::row_to_commit(row),
            Err(e) => Err(EventStoreError::Database(e)),
        });

        Ok(Box::pin(stream))
    }

    async fn get_stream_version(&self, stream_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(commit_sequence) FROM commits WHERE stream_id = $1")
                .bind(stream_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }

    #[tracing::instrument(skip(self, commit), fields(stream_id = %commit.stream_id, commit_sequence = %commit.commit_sequence))]
    async fn retract(&self, commit: &Commit) -> Result<()> {
        let removed = sqlx::query(
            r#"
            DELETE FROM commits
            WHERE commit_id = $1
              AND commit_sequence = (SELECT MAX(commit_sequence) FROM commits WHERE stream_id = $2)
            "#,
        )
        .bind(commit.commit_id.as_uuid())
        .bind(commit.stream_id.as_uuid())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if removed == 0 {
            return Err(EventStoreError::NotStreamHead {
                stream_id: commit.stream_id,
                commit_sequence: commit.commit_sequence,
            });
        }

        metrics::counter!("event_store_commits_retracted_total").increment(1);
        Ok(())
    }
}
