//! Persistence seam for the singleton job snapshot.

use std::future::Future;

use crate::error::AppError;
use crate::job::SyncJob;

/// Storage for one job snapshot per job type.
///
/// The runner loads, mutates, and saves the snapshot on every step; the
/// store only needs upsert semantics keyed by `job_type` (e.g. `"sync"`,
/// `"analysis"`). Implementations must not interpret the snapshot.
pub trait JobStore: Send + Sync {
    /// Load the snapshot for a job type, or `None` if never initialized.
    fn load(&self, job_type: &str) -> impl Future<Output = Result<Option<SyncJob>, AppError>> + Send;

    /// Upsert the snapshot for a job type.
    fn save(&self, job_type: &str, job: &SyncJob) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Remove the snapshot for a job type.
    fn clear(&self, job_type: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}
