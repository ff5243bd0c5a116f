//! Job snapshot persistence.
//!
//! The runner persists the whole job state machine after every unit of
//! work, keyed by job type. One row per job type holds the latest snapshot
//! as JSONB, so a crashed or interrupted run resumes from the last
//! completed unit.

use sqlx::{PgPool, Pool, Postgres};
use tessera_core::error::AppError;
use tessera_core::job::SyncJob;
use tessera_core::job_store::JobStore;

/// PostgreSQL implementation of the job snapshot store.
#[derive(Clone)]
pub struct JobSnapshotRepository {
    pool: Pool<Postgres>,
}

impl JobSnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl JobStore for JobSnapshotRepository {
    async fn load(&self, job_type: &str) -> Result<Option<SyncJob>, AppError> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT snapshot FROM job_snapshots WHERE job_type = $1")
                .bind(job_type)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((snapshot,)) => Ok(Some(serde_json::from_value(snapshot)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, job_type: &str, job: &SyncJob) -> Result<(), AppError> {
        let snapshot = serde_json::to_value(job)?;

        sqlx::query(
            r#"
            INSERT INTO job_snapshots (job_type, snapshot, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (job_type)
            DO UPDATE SET
                snapshot = EXCLUDED.snapshot,
                updated_at = NOW()
            "#,
        )
        .bind(job_type)
        .bind(snapshot)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self, job_type: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM job_snapshots WHERE job_type = $1")
            .bind(job_type)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
