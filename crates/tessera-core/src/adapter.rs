//! Provider-agnostic vector store interface.
//!
//! Two remote topologies exist in the wild: two-layer providers keep file
//! storage and search indexes as separate resources (a file is uploaded once
//! and attached to an index), while single-layer providers only have
//! documents living inside a named search store. This trait normalizes both
//! so the sync engine never learns the difference; each implementation
//! absorbs the asymmetry behind the same operations.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Normalized description of a remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreInfo {
    /// Remote store id.
    pub store_id: String,
    /// Store display name, when the provider reports one.
    pub name: Option<String>,
    /// Provider-reported lifecycle state (e.g. "active", "expired").
    pub status: String,
    /// Number of documents the store currently holds, when reported.
    pub document_count: Option<u64>,
    /// Bytes of storage used, when reported.
    pub usage_bytes: Option<u64>,
}

/// Mutable store fields accepted by `update_store`.
#[derive(Debug, Clone, Default)]
pub struct StoreUpdate {
    pub name: Option<String>,
}

/// A document payload ready for upload.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    /// Content item id, used to derive a stable remote display name.
    pub item_id: i64,
    /// Rendered document body.
    pub content: String,
    /// MIME type of `content` (e.g. `text/plain`, `text/markdown`).
    pub content_type: String,
}

/// Uniform contract over both remote topologies.
///
/// `store_id` is required by single-layer providers (the document only
/// exists inside a store) and may be empty for two-layer ones at upload
/// time (the attach happens in `add_to_store`). Long-running remote
/// operations are resolved internally by polling; callers only ever see a
/// settled result or a classified error.
pub trait VectorStoreAdapter: Send + Sync {
    /// Create a remote store and return its id.
    fn create_store(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Describe a remote store. Fails with a `not_found` classification if
    /// the store no longer exists.
    fn get_store_info(
        &self,
        store_id: &str,
    ) -> impl Future<Output = Result<StoreInfo, AppError>> + Send;

    /// Update mutable store fields.
    fn update_store(
        &self,
        store_id: &str,
        fields: StoreUpdate,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Delete a remote store and everything in it.
    fn delete_store(
        &self,
        store_id: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Upload a document and return the remote file id. Two-layer providers
    /// upload to file storage (ignoring `store_id`); single-layer providers
    /// upload directly into the named store.
    fn upload_document(
        &self,
        payload: &DocumentPayload,
        store_id: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Make an uploaded document searchable in the store. The real attach
    /// step for two-layer providers; a verification-only check for
    /// single-layer ones (the upload already placed the document).
    fn add_to_store(
        &self,
        store_id: &str,
        file_id: &str,
        skip_verification: bool,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Detach/remove a document from the store.
    fn remove_from_store(
        &self,
        store_id: &str,
        file_id: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Check whether a document is present and searchable.
    fn verify_exists(
        &self,
        file_id: &str,
        store_id: &str,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Delete the underlying file object. Distinct from `remove_from_store`
    /// only on two-layer providers; single-layer providers treat the two as
    /// the same operation.
    fn delete_file(
        &self,
        file_id: &str,
        store_id: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}
