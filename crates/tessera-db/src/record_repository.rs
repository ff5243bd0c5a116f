//! Training record persistence.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use tessera_core::error::AppError;
use tessera_core::record::{RecordStatus, RecordStore, TrainingRecord};

/// PostgreSQL implementation of the training record store.
#[derive(Clone)]
pub struct RecordRepository {
    pool: Pool<Postgres>,
}

impl RecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// =============================================================================
// Helper Types for Database Mapping
// =============================================================================

/// Helper struct for deserializing record rows from the database.
#[derive(sqlx::FromRow)]
struct RecordRow {
    collection_id: Uuid,
    item_id: i64,
    store_id: Option<String>,
    file_id: Option<String>,
    status: String,
    content_hash: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
    retry_count: i32,
    last_synced: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RecordRow> for TrainingRecord {
    fn from(row: RecordRow) -> Self {
        Self {
            collection_id: row.collection_id,
            item_id: row.item_id,
            store_id: row.store_id,
            file_id: row.file_id,
            status: row.status.parse().unwrap_or(RecordStatus::Error),
            content_hash: row.content_hash,
            error_code: row.error_code,
            error_message: row.error_message,
            retry_count: row.retry_count.max(0) as u32,
            last_synced: row.last_synced,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// RecordStore Trait Implementation
// =============================================================================

impl RecordStore for RecordRepository {
    async fn get(
        &self,
        collection_id: Uuid,
        item_id: i64,
    ) -> Result<Option<TrainingRecord>, AppError> {
        let row: Option<RecordRow> = sqlx::query_as(
            "SELECT * FROM training_records WHERE collection_id = $1 AND item_id = $2",
        )
        .bind(collection_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn upsert(&self, record: &TrainingRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO training_records (
                collection_id,
                item_id,
                store_id,
                file_id,
                status,
                content_hash,
                error_code,
                error_message,
                retry_count,
                last_synced,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            ON CONFLICT (collection_id, item_id)
            DO UPDATE SET
                store_id = EXCLUDED.store_id,
                file_id = EXCLUDED.file_id,
                status = EXCLUDED.status,
                content_hash = EXCLUDED.content_hash,
                error_code = EXCLUDED.error_code,
                error_message = EXCLUDED.error_message,
                retry_count = EXCLUDED.retry_count,
                last_synced = EXCLUDED.last_synced,
                updated_at = NOW()
            "#,
        )
        .bind(record.collection_id)
        .bind(record.item_id)
        .bind(&record.store_id)
        .bind(&record.file_id)
        .bind(record.status.as_str())
        .bind(&record.content_hash)
        .bind(&record.error_code)
        .bind(&record.error_message)
        .bind(record.retry_count as i32)
        .bind(record.last_synced)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, collection_id: Uuid, item_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM training_records WHERE collection_id = $1 AND item_id = $2")
            .bind(collection_id)
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_for_collection(
        &self,
        collection_id: Uuid,
    ) -> Result<Vec<TrainingRecord>, AppError> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT * FROM training_records WHERE collection_id = $1 ORDER BY item_id ASC",
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
