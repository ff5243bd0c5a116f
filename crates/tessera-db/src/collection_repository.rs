//! Collection registry persistence.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use tessera_core::error::AppError;
use tessera_core::registry::{Collection, CollectionStore};

/// PostgreSQL implementation of the collection store.
#[derive(Clone)]
pub struct CollectionRepository {
    pool: Pool<Postgres>,
}

impl CollectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// =============================================================================
// Helper Types for Database Mapping
// =============================================================================

/// Helper struct for deserializing collection rows from the database.
#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: Uuid,
    name: String,
    provider: String,
    store_id: Option<String>,
    content_filter: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CollectionRow> for Collection {
    fn from(row: CollectionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            provider: row.provider.parse().unwrap_or_default(),
            store_id: row.store_id,
            content_filter: row.content_filter,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// CollectionStore Trait Implementation
// =============================================================================

impl CollectionStore for CollectionRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Collection>, AppError> {
        let row: Option<CollectionRow> =
            sqlx::query_as("SELECT * FROM collections WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Into::into))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Collection>, AppError> {
        let row: Option<CollectionRow> =
            sqlx::query_as("SELECT * FROM collections WHERE LOWER(name) = LOWER($1)")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Into::into))
    }

    async fn list(&self) -> Result<Vec<Collection>, AppError> {
        let rows: Vec<CollectionRow> =
            sqlx::query_as("SELECT * FROM collections ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn save(&self, collection: &Collection) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO collections (
                id, name, provider, store_id, content_filter, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (id)
            DO UPDATE SET
                name = EXCLUDED.name,
                provider = EXCLUDED.provider,
                store_id = EXCLUDED.store_id,
                content_filter = EXCLUDED.content_filter,
                updated_at = NOW()
            "#,
        )
        .bind(collection.id)
        .bind(&collection.name)
        .bind(collection.provider.to_string())
        .bind(&collection.store_id)
        .bind(&collection.content_filter)
        .bind(collection.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_store_id(&self, id: Uuid, store_id: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE collections
            SET store_id = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(store_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_store_id(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE collections
            SET store_id = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
