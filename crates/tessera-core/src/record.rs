//! Per-item sync state.
//!
//! One `TrainingRecord` exists per `(collection_id, item_id)` pair. The
//! record tracks the remote identifiers assigned on upload, the content hash
//! of the last-synced payload, and bounded error history. Items whose
//! `retry_count` reached [`MAX_RECORD_RETRIES`] are excluded from automatic
//! re-sync until an operator intervenes.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Items that failed this many times are excluded from automatic re-sync.
pub const MAX_RECORD_RETRIES: u32 = 3;

/// Persisted error messages are bounded to this many characters.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 200;

// =============================================================================
// Record Status
// =============================================================================

/// Sync state of one item within one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// First upload is in flight.
    Adding,
    /// First upload completed; `file_id` is set.
    Added,
    /// Re-upload of changed content is in flight.
    Updating,
    /// Re-upload completed; `file_id` is set.
    Updated,
    /// Local content drifted from the last-synced hash; queued for re-sync.
    Outdated,
    /// Last sync attempt failed; `retry_count` was incremented.
    Error,
}

impl RecordStatus {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Adding => "adding",
            RecordStatus::Added => "added",
            RecordStatus::Updating => "updating",
            RecordStatus::Updated => "updated",
            RecordStatus::Outdated => "outdated",
            RecordStatus::Error => "error",
        }
    }

    /// Returns true if the remote store holds a current copy of the item.
    pub fn is_synced(&self) -> bool {
        matches!(self, RecordStatus::Added | RecordStatus::Updated)
    }
}

/// Error type for parsing RecordStatus from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRecordStatusError(String);

impl std::fmt::Display for ParseRecordStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid record status: {}", self.0)
    }
}

impl std::error::Error for ParseRecordStatusError {}

impl std::str::FromStr for RecordStatus {
    type Err = ParseRecordStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adding" => Ok(RecordStatus::Adding),
            "added" => Ok(RecordStatus::Added),
            "updating" => Ok(RecordStatus::Updating),
            "updated" => Ok(RecordStatus::Updated),
            "outdated" => Ok(RecordStatus::Outdated),
            "error" => Ok(RecordStatus::Error),
            _ => Err(ParseRecordStatusError(s.to_string())),
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Training Record
// =============================================================================

/// Sync state for one `(collection, item)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRecord {
    /// Owning collection.
    pub collection_id: Uuid,

    /// Content item id within its source.
    pub item_id: i64,

    /// Remote store id the item was uploaded into. For single-layer
    /// providers this equals the store the file lives in; for two-layer
    /// providers it is the index the file is attached to.
    pub store_id: Option<String>,

    /// Remote file/document id assigned after upload. For single-layer
    /// providers this may equal the document's store-scoped name.
    pub file_id: Option<String>,

    /// Current sync status.
    pub status: RecordStatus,

    /// SHA-256 digest of the last-synced content.
    pub content_hash: Option<String>,

    /// Classification code of the last error, if any.
    pub error_code: Option<String>,

    /// Last error message, truncated to [`MAX_ERROR_MESSAGE_CHARS`].
    pub error_message: Option<String>,

    /// Failed sync attempts since the last success.
    pub retry_count: u32,

    /// When the item was last successfully synced.
    pub last_synced: Option<DateTime<Utc>>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl TrainingRecord {
    /// Create a record for an item about to be uploaded for the first time.
    pub fn new(collection_id: Uuid, item_id: i64) -> Self {
        let now = Utc::now();
        Self {
            collection_id,
            item_id,
            store_id: None,
            file_id: None,
            status: RecordStatus::Adding,
            content_hash: None,
            error_code: None,
            error_message: None,
            retry_count: 0,
            last_synced: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a successful sync: remote ids, hash, status, and a cleared
    /// error state.
    pub fn mark_synced(
        &mut self,
        store_id: impl Into<String>,
        file_id: impl Into<String>,
        content_hash: impl Into<String>,
    ) {
        self.status = if self.last_synced.is_some() {
            RecordStatus::Updated
        } else {
            RecordStatus::Added
        };
        self.store_id = Some(store_id.into());
        self.file_id = Some(file_id.into());
        self.content_hash = Some(content_hash.into());
        self.error_code = None;
        self.error_message = None;
        self.retry_count = 0;
        let now = Utc::now();
        self.last_synced = Some(now);
        self.updated_at = now;
    }

    /// Record a failed sync attempt. Increments `retry_count` on every
    /// transition into `Error`, per the record invariant.
    pub fn mark_error(&mut self, error: &AppError) {
        self.status = RecordStatus::Error;
        self.error_code = Some(error.error_code().to_string());
        self.error_message = Some(truncate_error_message(&error.to_string()));
        self.retry_count += 1;
        self.updated_at = Utc::now();
    }

    /// Flag the record as drifted from local content.
    pub fn mark_outdated(&mut self) {
        self.status = RecordStatus::Outdated;
        self.updated_at = Utc::now();
    }

    /// Returns true if automatic re-sync may still attempt this item.
    pub fn can_retry(&self) -> bool {
        self.retry_count < MAX_RECORD_RETRIES
    }
}

/// Truncate an error message to [`MAX_ERROR_MESSAGE_CHARS`] characters,
/// respecting char boundaries.
pub fn truncate_error_message(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_MESSAGE_CHARS {
        message.to_string()
    } else {
        message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
    }
}

// =============================================================================
// Record Store
// =============================================================================

/// Persistence seam for training records.
pub trait RecordStore: Send + Sync {
    /// Fetch the record for one `(collection, item)` pair.
    fn get(
        &self,
        collection_id: Uuid,
        item_id: i64,
    ) -> impl Future<Output = Result<Option<TrainingRecord>, AppError>> + Send;

    /// Insert or replace a record.
    fn upsert(
        &self,
        record: &TrainingRecord,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Delete the record for one pair. Used after the remote document was
    /// removed; the remote side is never deleted without the record going
    /// with it.
    fn delete(
        &self,
        collection_id: Uuid,
        item_id: i64,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// All records belonging to a collection.
    fn list_for_collection(
        &self,
        collection_id: Uuid,
    ) -> impl Future<Output = Result<Vec<TrainingRecord>, AppError>> + Send;
}
