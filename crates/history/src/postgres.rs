use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    EventId, HistoryError, HistoryRecord, Result, RunId, Version,
    store::{AppendOptions, HistoryStore, RecordStream, validate_records_for_append},
};

const SELECT_RECORDS: &str = "SELECT event_id, event_type, run_id, workflow_type, version, timestamp, payload FROM history_records";

/// PostgreSQL-backed history store.
///
/// Records are kept in one table; the `position` column preserves global
/// insertion order for [`HistoryStore::stream_all`], and a unique
/// `(run_id, version)` constraint rejects concurrent appends to a run.
#[derive(Clone)]
pub struct PostgresHistoryStore {
    pool: PgPool,
}

impl PostgresHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and applies the history schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::debug!("history schema is up to date");
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<HistoryRecord> {
        Ok(HistoryRecord {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            event_type: row.try_get("event_type")?,
            run_id: RunId::from_uuid(row.try_get::<Uuid, _>("run_id")?),
            workflow_type: row.try_get("workflow_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
        })
    }
}

#[async_trait]
impl HistoryStore for PostgresHistoryStore {
    #[tracing::instrument(skip(self, records, options), fields(count = records.len()))]
    async fn append(&self, records: Vec<HistoryRecord>, options: AppendOptions) -> Result<Version> {
        validate_records_for_append(&records)?;

        let first = &records[0];
        let run_id = first.run_id;

        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM history_records WHERE run_id = $1")
                .bind(run_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
        let current = Version::new(current.unwrap_or(0));

        if options.expected_version.is_some_and(|expected| expected != current)
            || first.version != current.next()
        {
            return Err(HistoryError::ConcurrencyConflict {
                run_id,
                expected: options.expected_version.unwrap_or(current),
                actual: current,
            });
        }

        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO history_records (event_id, event_type, run_id, workflow_type, version, timestamp, payload)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(record.event_id.as_uuid())
            .bind(&record.event_type)
            .bind(run_id.as_uuid())
            .bind(&record.workflow_type)
            .bind(record.version.as_i64())
            .bind(record.timestamp)
            .bind(&record.payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A writer that read the same version committed first.
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_run_version")
                {
                    return HistoryError::ConcurrencyConflict {
                        run_id,
                        expected: options.expected_version.unwrap_or(current),
                        actual: record.version,
                    };
                }
                HistoryError::Database(e)
            })?;
        }

        tx.commit().await?;

        let last_version = records.last().map(|r| r.version).unwrap_or(current);
        metrics::counter!("history_records_appended_total").increment(records.len() as u64);
        Ok(last_version)
    }

    async fn read_run(&self, run_id: RunId) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(&format!(
            "{SELECT_RECORDS} WHERE run_id = $1 ORDER BY version ASC"
        ))
        .bind(run_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn records_by_type(&self, event_type: &str) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(&format!(
            "{SELECT_RECORDS} WHERE event_type = $1 ORDER BY position ASC"
        ))
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn stream_all(&self) -> Result<RecordStream> {
        use futures_util::stream;

        let rows = sqlx::query(&format!("{SELECT_RECORDS} ORDER BY position ASC"))
            .fetch_all(&self.pool)
            .await?;
        let records: Vec<Result<HistoryRecord>> =
            rows.into_iter().map(Self::row_to_record).collect();
        Ok(Box::pin(stream::iter(records)))
    }

    async fn run_version(&self, run_id: RunId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM history_records WHERE run_id = $1")
                .bind(run_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }
}
