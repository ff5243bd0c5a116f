//! Sync planning and the per-item unit of work.
//!
//! Delta detection is pure logic over content hashes; the processor wires
//! it to the content source, the record store, and the vector store
//! adapter. The adapter absorbs all provider asymmetry, so nothing in this
//! module knows whether the remote side is two-layer or single-layer.

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::adapter::{DocumentPayload, VectorStoreAdapter};
use crate::error::{AppError, ProviderErrorKind};
use crate::job::ItemRef;
use crate::record::{RecordStore, TrainingRecord};
use crate::registry::{CollectionRegistry, CollectionStore, ContentItem, ContentSource};
use crate::runner::UnitProcessor;

// =============================================================================
// Delta detection
// =============================================================================

/// Outcome of processing a single item during sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Content hash matches the record - nothing to do
    Unchanged,
    /// Content changed - document re-uploaded
    Updated,
    /// New item - first upload
    Created,
    /// Item no longer exists locally - remote document removed
    Removed,
}

/// Result of delta detection for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDecision {
    /// Whether the document must be (re-)uploaded
    pub needs_upload: bool,
    /// The outcome classification for this item
    pub outcome: SyncOutcome,
    /// Human-readable reason for the decision
    pub reason: &'static str,
}

/// Determines if an item needs re-upload based on content hash comparison.
///
/// # Arguments
/// * `existing_hash` - Outer `None`: no record exists. Inner `None`: a
///   record exists but carries no hash (interrupted first sync).
/// * `new_hash` - The hash computed from current content.
pub fn needs_resync(existing_hash: Option<Option<&str>>, new_hash: &str) -> SyncDecision {
    match existing_hash {
        Some(Some(hash)) if hash == new_hash => SyncDecision {
            needs_upload: false,
            outcome: SyncOutcome::Unchanged,
            reason: "content hash matches",
        },
        Some(Some(_)) => SyncDecision {
            needs_upload: true,
            outcome: SyncOutcome::Updated,
            reason: "content hash changed",
        },
        Some(None) => SyncDecision {
            needs_upload: true,
            outcome: SyncOutcome::Updated,
            reason: "record without hash",
        },
        None => SyncDecision {
            needs_upload: true,
            outcome: SyncOutcome::Created,
            reason: "new item",
        },
    }
}

// =============================================================================
// Sync plan
// =============================================================================

/// The item set a sync job will process, derived by diffing the resolved
/// collection items against existing training records.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// Resolved items with no record yet.
    pub additions: Vec<ItemRef>,
    /// Resolved items with an existing record; unchanged ones are skipped
    /// at process time via the hash comparison.
    pub candidates: Vec<ItemRef>,
    /// Item ids whose record exists but which the source no longer
    /// resolves; their remote documents are removed.
    pub removals: Vec<i64>,
    /// Item ids excluded because their record exhausted its retry budget.
    pub exhausted: Vec<i64>,
}

impl SyncPlan {
    /// Diff resolved items against existing records.
    ///
    /// Records with `retry_count` at the cap are excluded from automatic
    /// re-sync; they stay listed in `exhausted` for operator visibility.
    pub fn build(resolved: &[ItemRef], records: &[TrainingRecord]) -> Self {
        let mut plan = SyncPlan::default();
        for item in resolved {
            match records.iter().find(|r| r.item_id == item.id) {
                None => plan.additions.push(item.clone()),
                Some(record) if !record.can_retry() => plan.exhausted.push(item.id),
                Some(_) => plan.candidates.push(item.clone()),
            }
        }
        for record in records {
            if !resolved.iter().any(|item| item.id == record.item_id) {
                plan.removals.push(record.item_id);
            }
        }
        plan
    }

    /// The ordered item list for the job: additions, then candidates, then
    /// removals. Removed items carry an empty type as a marker; the
    /// processor routes them straight to the removal path without
    /// consulting the content source.
    pub fn job_items(&self) -> Vec<ItemRef> {
        let mut items = Vec::with_capacity(
            self.additions.len() + self.candidates.len() + self.removals.len(),
        );
        items.extend(self.additions.iter().cloned());
        items.extend(self.candidates.iter().cloned());
        items.extend(self.removals.iter().map(|id| ItemRef::new(*id, "")));
        items
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.candidates.is_empty() && self.removals.is_empty()
    }
}

// =============================================================================
// Sync processor
// =============================================================================

/// The unit of work for training-data sync jobs.
///
/// Per item: fetch content, compare hashes, upload and attach through the
/// adapter, and keep the training record in step with every transition.
/// The remote store id is resolved lazily and cached; a store that
/// disappears mid-run is recreated once and the item redone against it.
pub struct SyncProcessor<C, A, S, R> {
    registry: CollectionRegistry<C, A>,
    source: S,
    records: R,
    collection_id: Uuid,
    cached_store_id: Mutex<Option<String>>,
}

impl<C, A, S, R> SyncProcessor<C, A, S, R>
where
    C: CollectionStore,
    A: VectorStoreAdapter,
    S: ContentSource,
    R: RecordStore,
{
    pub fn new(
        registry: CollectionRegistry<C, A>,
        source: S,
        records: R,
        collection_id: Uuid,
    ) -> Self {
        Self {
            registry,
            source,
            records,
            collection_id,
            cached_store_id: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &CollectionRegistry<C, A> {
        &self.registry
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Build the sync plan for the current state of the collection.
    pub async fn plan(&self) -> Result<SyncPlan, AppError> {
        let resolved = self
            .registry
            .resolve_items(self.collection_id, &self.source)
            .await?;
        let records = self.records.list_for_collection(self.collection_id).await?;
        Ok(SyncPlan::build(&resolved, &records))
    }

    async fn store_id(&self) -> Result<String, AppError> {
        let mut cached = self.cached_store_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }
        let id = self.registry.get_or_create_store(self.collection_id).await?;
        *cached = Some(id.clone());
        Ok(id)
    }

    async fn invalidate_store(&self) {
        *self.cached_store_id.lock().await = None;
    }

    fn is_not_found(err: &AppError) -> bool {
        err.provider_kind() == Some(ProviderErrorKind::NotFound)
    }

    async fn upload_and_attach(
        &self,
        item: &ItemRef,
        content: &ContentItem,
    ) -> Result<(String, String), AppError> {
        let store_id = self.store_id().await?;
        match self.try_upload(&store_id, item, content).await {
            Ok(file_id) => Ok((store_id, file_id)),
            Err(err) if Self::is_not_found(&err) => {
                // The store disappeared under us. Recreate once and redo
                // the whole upload; a partial upload into the dead store
                // is unrecoverable anyway.
                tracing::warn!(
                    item_id = item.id,
                    "store vanished mid-sync, recreating and retrying once"
                );
                self.invalidate_store().await;
                let store_id = self.store_id().await?;
                let file_id = self.try_upload(&store_id, item, content).await?;
                Ok((store_id, file_id))
            }
            Err(err) => Err(err),
        }
    }

    async fn try_upload(
        &self,
        store_id: &str,
        item: &ItemRef,
        content: &ContentItem,
    ) -> Result<String, AppError> {
        let payload = DocumentPayload {
            item_id: item.id,
            content: format!("{}\n\n{}", content.title, content.body),
            content_type: content.content_type.clone(),
        };
        let adapter = self.registry.adapter();
        let file_id = adapter.upload_document(&payload, store_id).await?;
        adapter.add_to_store(store_id, &file_id, false).await?;
        Ok(file_id)
    }

    /// Best-effort removal of a remote document; an already-missing
    /// document is not an error.
    async fn remove_remote(&self, store_id: &str, file_id: &str) -> Result<(), AppError> {
        let adapter = self.registry.adapter();
        match adapter.remove_from_store(store_id, file_id).await {
            Ok(()) => {}
            Err(err) if Self::is_not_found(&err) => {}
            Err(err) => return Err(err),
        }
        match adapter.delete_file(file_id, store_id).await {
            Ok(()) => Ok(()),
            Err(err) if Self::is_not_found(&err) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn sync_item(
        &self,
        item: &ItemRef,
        record: Option<TrainingRecord>,
        content: ContentItem,
    ) -> Result<(), AppError> {
        let new_hash = content.content_hash();
        let existing_hash = record
            .as_ref()
            .map(|r| r.content_hash.as_deref());
        let decision = needs_resync(existing_hash, &new_hash);
        if !decision.needs_upload {
            tracing::debug!(item_id = item.id, reason = decision.reason, "skipping item");
            return Ok(());
        }
        tracing::debug!(
            item_id = item.id,
            outcome = ?decision.outcome,
            reason = decision.reason,
            "syncing item"
        );

        let mut record =
            record.unwrap_or_else(|| TrainingRecord::new(self.collection_id, item.id));
        let old_remote = record
            .store_id
            .clone()
            .zip(record.file_id.clone());

        match self.upload_and_attach(item, &content).await {
            Ok((store_id, file_id)) => {
                // Replace before delete would leave the old document
                // searchable alongside the new one, so drop it now that
                // the new upload is live.
                if let Some((old_store, old_file)) = old_remote {
                    if old_file != file_id {
                        self.remove_remote(&old_store, &old_file).await?;
                    }
                }
                record.mark_synced(store_id, file_id, new_hash);
                self.records.upsert(&record).await?;
                Ok(())
            }
            Err(err) => {
                record.mark_error(&err);
                self.records.upsert(&record).await?;
                Err(err)
            }
        }
    }

    async fn remove_item(
        &self,
        item: &ItemRef,
        record: Option<TrainingRecord>,
    ) -> Result<(), AppError> {
        let Some(record) = record else {
            // Nothing local, nothing remote to clean up.
            return Ok(());
        };
        if let (Some(store_id), Some(file_id)) = (&record.store_id, &record.file_id) {
            self.remove_remote(store_id, file_id).await?;
        }
        // The record goes only after the remote side is clean.
        self.records.delete(self.collection_id, item.id).await?;
        tracing::debug!(item_id = item.id, "removed item no longer in collection");
        Ok(())
    }
}

impl<C, A, S, R> UnitProcessor for SyncProcessor<C, A, S, R>
where
    C: CollectionStore,
    A: VectorStoreAdapter,
    S: ContentSource,
    R: RecordStore,
{
    fn job_type(&self) -> &str {
        "sync"
    }

    async fn process(&self, item: &ItemRef) -> Result<(), AppError> {
        let record = self.records.get(self.collection_id, item.id).await?;
        // The plan's removal classification is authoritative: a removed
        // item may still be fetchable (a published item excluded by a
        // narrowed content filter), so the marker decides, not the source.
        if item.item_type.is_empty() {
            return self.remove_item(item, record).await;
        }
        match self.source.fetch_item(item).await? {
            Some(content) => self.sync_item(item, record, content).await,
            None => self.remove_item(item, record).await,
        }
    }
}
