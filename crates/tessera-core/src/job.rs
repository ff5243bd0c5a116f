//! Singleton job state for the synchronization engine.
//!
//! One job of each type exists at a time; its state is a persisted snapshot
//! mutated exclusively by the [`JobRunner`](crate::runner::JobRunner).
//!
//! # State machine
//!
//! ```text
//! idle → scheduled → running → completed
//!              ↘        ↓  ↘
//!               → running → failed (circuit breaker)
//!                       ↓
//!                     idle (cancel)
//! ```
//!
//! A job is not an audit log: completion, failure, and cancel all leave only
//! current-run state behind, and the next `initialize` overwrites it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Job Status
// =============================================================================

/// Status of the singleton job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// No job is active. Also the post-cancel state.
    Idle,
    /// Job created in cron mode, waiting for the first trigger.
    Scheduled,
    /// Job is actively processing items.
    Running,
    /// All items (and the retry sub-pass, if any) were processed.
    Completed,
    /// The consecutive-failure circuit breaker tripped.
    Failed,
}

impl JobStatus {
    /// Returns the string representation for storage and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Idle | JobStatus::Completed | JobStatus::Failed
        )
    }

    /// Returns true if a new job of the same type must not be created yet.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Scheduled | JobStatus::Running)
    }
}

/// Error type for parsing JobStatus from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseJobStatusError(String);

impl std::fmt::Display for ParseJobStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid job status: {}", self.0)
    }
}

impl std::error::Error for ParseJobStatusError {}

impl std::str::FromStr for JobStatus {
    type Err = ParseJobStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(JobStatus::Idle),
            "scheduled" => Ok(JobStatus::Scheduled),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(ParseJobStatusError(s.to_string())),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Job Kind
// =============================================================================

/// Execution mode of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Driven by a tight loop in the invoking process; starts `running`.
    Direct,
    /// Driven by a recurring external trigger; starts `scheduled`.
    Cron,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Direct => "direct",
            JobKind::Cron => "cron",
        }
    }

    /// The status a freshly initialized job of this kind starts in.
    pub fn initial_status(&self) -> JobStatus {
        match self {
            JobKind::Direct => JobStatus::Running,
            JobKind::Cron => JobStatus::Scheduled,
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = ParseJobStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(JobKind::Direct),
            "cron" => Ok(JobKind::Cron),
            _ => Err(ParseJobStatusError(s.to_string())),
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Item references
// =============================================================================

/// A reference to one content item, captured at job creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    /// Content item id within its source.
    pub id: i64,
    /// Item type within the source (e.g. "post", "page", "doc").
    pub item_type: String,
}

impl ItemRef {
    pub fn new(id: i64, item_type: impl Into<String>) -> Self {
        Self {
            id,
            item_type: item_type.into(),
        }
    }
}

// =============================================================================
// Sync Job snapshot
// =============================================================================

/// The persisted singleton job snapshot.
///
/// The item list is fixed at creation and processed in order; `processed`
/// indexes into `items`. Once the primary pass drains and retryable failures
/// were collected, the runner swaps `items` for the retry set and flips
/// `retrying`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    /// Current job status.
    pub status: JobStatus,

    /// Execution mode.
    pub kind: JobKind,

    /// Ordered item set, fixed at creation (replaced once by the retry set).
    pub items: Vec<ItemRef>,

    /// Number of items processed in the current pass.
    pub processed: u32,

    /// Number of items in the current pass.
    pub total: u32,

    /// Cumulative error count across both passes; never corrected downward.
    pub errors: u32,

    /// Sequential retryable failures; reset to zero on any success.
    pub consecutive_errors: u32,

    /// Item ids that failed with a retryable error during the primary pass,
    /// in the order the failures were recorded.
    pub retry_item_ids: Vec<i64>,

    /// True once the runner has switched to the retry sub-pass.
    pub retrying: bool,

    /// Set by `cancel()`; survives until the next `initialize()`.
    pub cancel_requested: bool,

    /// When the job was created.
    pub started_at: DateTime<Utc>,

    /// When the job was last persisted.
    pub updated_at: DateTime<Utc>,
}

impl SyncJob {
    /// Create a fresh job over a fixed item set.
    pub fn new(items: Vec<ItemRef>, kind: JobKind) -> Self {
        let now = Utc::now();
        let total = items.len() as u32;
        Self {
            status: kind.initial_status(),
            kind,
            items,
            processed: 0,
            total,
            errors: 0,
            consecutive_errors: 0,
            retry_item_ids: Vec::new(),
            retrying: false,
            cancel_requested: false,
            started_at: now,
            updated_at: now,
        }
    }

    /// The snapshot a never-initialized job reads as: idle and zeroed.
    pub fn idle() -> Self {
        let now = Utc::now();
        Self {
            status: JobStatus::Idle,
            kind: JobKind::Direct,
            items: Vec::new(),
            processed: 0,
            total: 0,
            errors: 0,
            consecutive_errors: 0,
            retry_item_ids: Vec::new(),
            retrying: false,
            cancel_requested: false,
            started_at: now,
            updated_at: now,
        }
    }

    /// Progress percentage. Pinned at 100 during the retry sub-pass so the
    /// user-visible bar never regresses after the primary pass finishes.
    pub fn percent(&self) -> u32 {
        if self.retrying || self.status == JobStatus::Completed {
            return 100;
        }
        if self.total == 0 {
            return 0;
        }
        ((self.processed as f64 / self.total as f64) * 100.0).round() as u32
    }

    /// The next unprocessed item of the current pass, if any.
    pub fn next_item(&self) -> Option<&ItemRef> {
        self.items.get(self.processed as usize)
    }

    /// True when the current pass has no items left.
    pub fn pass_exhausted(&self) -> bool {
        self.processed >= self.total
    }

    /// Queue an item for the retry sub-pass, deduplicated.
    pub fn queue_retry(&mut self, item_id: i64) {
        if !self.retry_item_ids.contains(&item_id) {
            self.retry_item_ids.push(item_id);
        }
    }

    /// Swap the item list for the retry set and restart counters.
    ///
    /// Retry items keep the order their failures were recorded in; item
    /// types are looked up from the original list.
    pub fn enter_retry_pass(&mut self) {
        let retry_items: Vec<ItemRef> = self
            .retry_item_ids
            .iter()
            .filter_map(|id| self.items.iter().find(|item| item.id == *id).cloned())
            .collect();
        self.total = retry_items.len() as u32;
        self.items = retry_items;
        self.processed = 0;
        self.retrying = true;
    }

    /// Stamp `updated_at` before persisting.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
