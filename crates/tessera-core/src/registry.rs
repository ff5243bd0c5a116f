//! Collection registry: maps logical collections to remote stores and
//! supplies the item set a job processes.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::adapter::VectorStoreAdapter;
use crate::config::ProviderKind;
use crate::error::{AppError, ProviderErrorKind};
use crate::job::ItemRef;
use crate::record::RecordStore;

// =============================================================================
// Collection
// =============================================================================

/// A named grouping of content items synced to one remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    /// Stable collection identifier.
    pub id: Uuid,
    /// Human-readable name, unique per deployment.
    pub name: String,
    /// Remote index provider for this collection.
    pub provider: ProviderKind,
    /// Lazily-created remote store id; cached once created.
    pub store_id: Option<String>,
    /// Comma-separated item types to include; `None` includes everything.
    pub content_filter: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Collection {
    pub fn new(name: impl Into<String>, provider: ProviderKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            provider,
            store_id: None,
            content_filter: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Content items
// =============================================================================

/// A content item as supplied by the external content source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub title: String,
    pub body: String,
    /// MIME type of `body`.
    pub content_type: String,
    pub modified_at: DateTime<Utc>,
}

impl ContentItem {
    /// SHA-256 digest of the syncable content, used for drift detection.
    /// The modification time is deliberately excluded so that a touch
    /// without a content change does not force a re-upload.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.body.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.content_type.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// External collaborator producing the items of a collection.
pub trait ContentSource: Send + Sync {
    /// The current item id set matching a content filter, in a stable order.
    fn resolve_items(
        &self,
        content_filter: Option<&str>,
    ) -> impl Future<Output = Result<Vec<ItemRef>, AppError>> + Send;

    /// Fetch one item's content. `None` means the item no longer exists
    /// (deleted or unpublished since the job was created).
    fn fetch_item(
        &self,
        item: &ItemRef,
    ) -> impl Future<Output = Result<Option<ContentItem>, AppError>> + Send;
}

// =============================================================================
// Collection store
// =============================================================================

/// Persistence seam for collection records.
pub trait CollectionStore: Send + Sync {
    fn get(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Collection>, AppError>> + Send;

    fn get_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Collection>, AppError>> + Send;

    fn list(&self) -> impl Future<Output = Result<Vec<Collection>, AppError>> + Send;

    fn save(
        &self,
        collection: &Collection,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Cache a freshly created remote store id on the collection.
    fn save_store_id(
        &self,
        id: Uuid,
        store_id: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Drop a store id that was verified as stale.
    fn clear_store_id(&self, id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;
}

// =============================================================================
// Registry
// =============================================================================

/// Resolves a collection to a live remote store and manages its lifecycle.
pub struct CollectionRegistry<C, A> {
    collections: C,
    adapter: A,
}

impl<C, A> CollectionRegistry<C, A>
where
    C: CollectionStore,
    A: VectorStoreAdapter,
{
    pub fn new(collections: C, adapter: A) -> Self {
        Self {
            collections,
            adapter,
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn collections(&self) -> &C {
        &self.collections
    }

    /// Return a live remote store id for the collection, creating one if
    /// needed.
    ///
    /// A cached id is verified with a lightweight existence check before it
    /// is trusted. An id verified as missing is cleared from the collection
    /// record before a fresh store is created, never silently reused.
    pub async fn get_or_create_store(&self, collection_id: Uuid) -> Result<String, AppError> {
        let collection = self
            .collections
            .get(collection_id)
            .await?
            .ok_or_else(|| AppError::CollectionNotFound(collection_id.to_string()))?;

        if let Some(store_id) = &collection.store_id {
            match self.adapter.get_store_info(store_id).await {
                Ok(_) => return Ok(store_id.clone()),
                Err(err) if err.provider_kind() == Some(ProviderErrorKind::NotFound) => {
                    tracing::warn!(
                        collection = %collection.name,
                        store_id = %store_id,
                        "cached store no longer exists remotely, recreating"
                    );
                    self.collections.clear_store_id(collection_id).await?;
                }
                Err(err) => return Err(err),
            }
        }

        let store_id = self.adapter.create_store(&collection.name).await?;
        self.collections
            .save_store_id(collection_id, &store_id)
            .await?;
        tracing::info!(
            collection = %collection.name,
            store_id = %store_id,
            "created remote store"
        );
        Ok(store_id)
    }

    /// The current item set for a collection, resolved through the content
    /// source using the collection's filter.
    pub async fn resolve_items<S: ContentSource>(
        &self,
        collection_id: Uuid,
        source: &S,
    ) -> Result<Vec<ItemRef>, AppError> {
        let collection = self
            .collections
            .get(collection_id)
            .await?
            .ok_or_else(|| AppError::CollectionNotFound(collection_id.to_string()))?;
        source.resolve_items(collection.content_filter.as_deref()).await
    }

    /// Remove everything synced for a collection: the remote store (and all
    /// documents in it), the cached store id, and the training records.
    ///
    /// Records are deleted only after the remote side is gone, preserving
    /// the invariant that a remote document never outlives its record
    /// unnoticed.
    pub async fn clear_collection<R: RecordStore>(
        &self,
        collection_id: Uuid,
        records: &R,
    ) -> Result<usize, AppError> {
        let collection = self
            .collections
            .get(collection_id)
            .await?
            .ok_or_else(|| AppError::CollectionNotFound(collection_id.to_string()))?;

        if let Some(store_id) = &collection.store_id {
            match self.adapter.delete_store(store_id).await {
                Ok(()) => {}
                // Already gone remotely; clearing local state is still correct.
                Err(err) if err.provider_kind() == Some(ProviderErrorKind::NotFound) => {}
                Err(err) => return Err(err),
            }
            self.collections.clear_store_id(collection_id).await?;
        }

        let existing = records.list_for_collection(collection_id).await?;
        let removed = existing.len();
        for record in existing {
            records.delete(collection_id, record.item_id).await?;
        }

        tracing::info!(
            collection = %collection.name,
            records_removed = removed,
            "cleared collection"
        );
        Ok(removed)
    }
}
