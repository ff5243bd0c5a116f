//! Generic single-active-job state machine.
//!
//! The runner owns the singleton job snapshot for one job type and advances
//! it one item per call. Single-stepping bounds the wall-clock cost of any
//! invocation, which matters because both execution contexts (a request in
//! direct mode, a time-boxed trigger in cron mode) have a hard ceiling.
//! The snapshot is persisted after every unit so a crash mid-run leaves
//! consistent, resumable state.
//!
//! Instantiated once for training-data sync and once for content analysis;
//! the unit of work is injected through [`UnitProcessor`].

use std::future::Future;

use crate::error::AppError;
use crate::job::{ItemRef, JobKind, JobStatus, SyncJob};
use crate::job_store::JobStore;

/// Consecutive retryable failures before the circuit breaker trips.
///
/// Five in a row is a strong signal the endpoint itself is unreachable or
/// misconfigured, not that individual items are bad; failing the whole job
/// protects a large collection from being burned through a broken endpoint.
/// Only a successful unit resets the window; non-retryable failures neither
/// extend nor reset it.
pub const CIRCUIT_BREAKER_THRESHOLD: u32 = 5;

/// One unit of work performed per `process_next_unit` call.
pub trait UnitProcessor: Send + Sync {
    /// Key identifying this job family in the job store (e.g. `"sync"`).
    fn job_type(&self) -> &str;

    /// Process one item. Retryability of the returned error decides whether
    /// the item joins the retry sub-pass.
    fn process(&self, item: &ItemRef) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Drives the singleton job for one [`UnitProcessor`].
///
/// The "at most one active job per type" check at `initialize` is advisory:
/// it reads the persisted snapshot, not a lock, so two callers initializing
/// at the same instant can race. The domain (one interactive operator) does
/// not warrant paying for real mutual exclusion.
pub struct JobRunner<P, J> {
    processor: P,
    store: J,
}

impl<P, J> JobRunner<P, J>
where
    P: UnitProcessor,
    J: JobStore,
{
    pub fn new(processor: P, store: J) -> Self {
        Self { processor, store }
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Create a new job over a fixed item set.
    ///
    /// Fails with [`AppError::JobActive`] if a job of this type is already
    /// scheduled or running, and with [`AppError::NoItems`] on an empty
    /// item set. Stale terminal state (and any lingering cancel flag) is
    /// overwritten.
    pub async fn initialize(&self, items: Vec<ItemRef>, kind: JobKind) -> Result<SyncJob, AppError> {
        let job_type = self.processor.job_type();
        if let Some(existing) = self.store.load(job_type).await? {
            if existing.status.is_active() {
                return Err(AppError::JobActive(job_type.to_string()));
            }
        }
        if items.is_empty() {
            return Err(AppError::NoItems);
        }

        let job = SyncJob::new(items, kind);
        self.store.save(job_type, &job).await?;
        tracing::info!(
            job_type = job_type,
            kind = %kind,
            total = job.total,
            "job initialized"
        );
        Ok(job)
    }

    /// Advance the job by exactly one item.
    ///
    /// Safe to call repeatedly from a cron tick or a tight loop; calls
    /// against a terminal job are no-ops that report the current status.
    pub async fn process_next_unit(&self) -> Result<SyncJob, AppError> {
        let job_type = self.processor.job_type();
        let mut job = match self.store.load(job_type).await? {
            Some(job) => job,
            None => return Ok(SyncJob::idle()),
        };

        // Cancellation wins over everything, including a step already
        // dispatched by a trigger that raced the cancel call.
        if job.cancel_requested {
            if job.status != JobStatus::Idle {
                job.status = JobStatus::Idle;
                job.touch();
                self.store.save(job_type, &job).await?;
            }
            return Ok(job);
        }

        // A cron job sits scheduled until its first trigger lands here.
        if job.status == JobStatus::Scheduled {
            job.status = JobStatus::Running;
        }
        if job.status != JobStatus::Running {
            return Ok(job);
        }

        if job.pass_exhausted() {
            if !job.retrying && !job.retry_item_ids.is_empty() {
                job.enter_retry_pass();
                job.touch();
                self.store.save(job_type, &job).await?;
                tracing::info!(
                    job_type = job_type,
                    retry_items = job.total,
                    "primary pass complete, entering retry pass"
                );
                return Ok(job);
            }
            job.status = JobStatus::Completed;
            job.touch();
            self.store.save(job_type, &job).await?;
            tracing::info!(
                job_type = job_type,
                processed = job.processed,
                errors = job.errors,
                "job completed"
            );
            return Ok(job);
        }

        // next_item is Some here because the pass is not exhausted.
        let item = match job.next_item() {
            Some(item) => item.clone(),
            None => return Ok(job),
        };

        match self.processor.process(&item).await {
            Ok(()) => {
                job.consecutive_errors = 0;
            }
            Err(err) if err.is_retryable() => {
                job.errors += 1;
                job.consecutive_errors += 1;
                if !job.retrying {
                    job.queue_retry(item.id);
                }
                tracing::warn!(
                    job_type = job_type,
                    item_id = item.id,
                    error = %err,
                    consecutive = job.consecutive_errors,
                    "unit failed with retryable error"
                );
                if job.consecutive_errors >= CIRCUIT_BREAKER_THRESHOLD {
                    job.status = JobStatus::Failed;
                    job.touch();
                    self.store.save(job_type, &job).await?;
                    tracing::error!(
                        job_type = job_type,
                        consecutive = job.consecutive_errors,
                        "circuit breaker tripped, job failed"
                    );
                    return Ok(job);
                }
            }
            Err(err) => {
                // Increments the error tally only. The consecutive-failure
                // window is left as it stands; only a successful unit
                // resets it.
                job.errors += 1;
                tracing::warn!(
                    job_type = job_type,
                    item_id = item.id,
                    error = %err,
                    "unit failed with non-retryable error, skipping"
                );
            }
        }

        job.processed += 1;

        // A retry pass that just drained its last item completes in the
        // same step; a drained primary pass with no retry set does too.
        if job.pass_exhausted() && (job.retrying || job.retry_item_ids.is_empty()) {
            job.status = JobStatus::Completed;
            tracing::info!(
                job_type = job_type,
                processed = job.processed,
                errors = job.errors,
                "job completed"
            );
        }

        job.touch();
        self.store.save(job_type, &job).await?;
        Ok(job)
    }

    /// Request cancellation.
    ///
    /// Sets the flag and flips the status to idle immediately. The flag is
    /// deliberately not cleared here; it persists until the next
    /// `initialize` so an in-flight `process_next_unit` cannot miss it.
    pub async fn cancel(&self) -> Result<SyncJob, AppError> {
        cancel_job(&self.store, self.processor.job_type()).await
    }

    /// Read-only snapshot. A never-initialized job reads as idle and
    /// zeroed rather than failing.
    pub async fn status(&self) -> Result<SyncJob, AppError> {
        job_status(&self.store, self.processor.job_type()).await
    }

    /// Drive a direct-mode job to a terminal state in a tight loop.
    ///
    /// Returns the final snapshot. Each iteration is one unit of work, so
    /// cancellation from another task takes effect between items.
    pub async fn run_to_completion(&self) -> Result<SyncJob, AppError> {
        loop {
            let job = self.process_next_unit().await?;
            if job.status.is_terminal() {
                return Ok(job);
            }
        }
    }
}

/// Request cancellation of a job by type, without a processor in hand.
///
/// Sets the flag and flips the status to idle immediately. The flag is
/// deliberately not cleared here; it persists until the next `initialize`
/// so an in-flight `process_next_unit` cannot miss it.
pub async fn cancel_job<J: JobStore>(store: &J, job_type: &str) -> Result<SyncJob, AppError> {
    let mut job = match store.load(job_type).await? {
        Some(job) => job,
        None => return Ok(SyncJob::idle()),
    };
    job.cancel_requested = true;
    job.status = JobStatus::Idle;
    job.touch();
    store.save(job_type, &job).await?;
    tracing::info!(job_type = job_type, "job cancelled");
    Ok(job)
}

/// Read-only snapshot of a job by type. A never-initialized job reads as
/// idle and zeroed rather than failing.
pub async fn job_status<J: JobStore>(store: &J, job_type: &str) -> Result<SyncJob, AppError> {
    Ok(store.load(job_type).await?.unwrap_or_else(SyncJob::idle))
}
