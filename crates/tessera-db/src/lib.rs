//! Tessera DB - PostgreSQL persistence layer.
//!
//! This crate implements the storage traits from `tessera-core` on top of
//! a PostgreSQL connection pool:
//!
//! - [`JobSnapshotRepository`] - single-row-per-job-type job snapshots
//! - [`CollectionRepository`] - collection registry persistence
//! - [`RecordRepository`] - per-item training record persistence

mod collection_repository;
mod job_snapshot;
mod record_repository;

pub use collection_repository::CollectionRepository;
pub use job_snapshot::JobSnapshotRepository;
pub use record_repository::RecordRepository;

use sqlx::PgPool;
use tessera_core::error::AppError;

/// Applies pending schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::Database(e.into()))?;
    Ok(())
}
