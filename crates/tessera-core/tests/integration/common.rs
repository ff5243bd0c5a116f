//! Test utilities and mock implementations for integration tests.
//!
//! Provides mock implementations of the core traits for testing the
//! `JobRunner`, `SyncProcessor`, and `CollectionRegistry` in isolation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tessera_core::adapter::{DocumentPayload, StoreInfo, StoreUpdate, VectorStoreAdapter};
use tessera_core::registry::{Collection, CollectionStore, ContentItem, ContentSource};
use tessera_core::runner::UnitProcessor;
use tessera_core::{
    AppError, ItemRef, JobStore, ProviderErrorKind, RecordStore, SyncJob, TrainingRecord,
};
use uuid::Uuid;

// =============================================================================
// MockJobStore
// =============================================================================

/// In-memory job snapshot store keyed by job type.
#[derive(Clone, Default)]
pub struct MockJobStore {
    jobs: Arc<Mutex<HashMap<String, SyncJob>>>,
    /// Number of save calls, for verifying persist-per-unit behavior.
    pub saves: Arc<Mutex<u32>>,
}

impl MockJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> u32 {
        *self.saves.lock().unwrap()
    }
}

impl JobStore for MockJobStore {
    async fn load(&self, job_type: &str) -> Result<Option<SyncJob>, AppError> {
        Ok(self.jobs.lock().unwrap().get(job_type).cloned())
    }

    async fn save(&self, job_type: &str, job: &SyncJob) -> Result<(), AppError> {
        *self.saves.lock().unwrap() += 1;
        self.jobs
            .lock()
            .unwrap()
            .insert(job_type.to_string(), job.clone());
        Ok(())
    }

    async fn clear(&self, job_type: &str) -> Result<(), AppError> {
        self.jobs.lock().unwrap().remove(job_type);
        Ok(())
    }
}

// =============================================================================
// ScriptedProcessor
// =============================================================================

/// Outcome script entry for one processing attempt.
#[derive(Clone, Copy, Debug)]
pub enum ScriptedOutcome {
    Success,
    /// Fails with a retryable classification (service_unavailable).
    Retryable,
    /// Fails with a non-retryable classification (bad_request).
    Fatal,
}

/// Unit processor whose per-item outcomes are scripted up front.
///
/// Unscripted attempts succeed. Every processed item id is recorded so
/// tests can assert ordering and attempt counts.
#[derive(Clone, Default)]
pub struct ScriptedProcessor {
    outcomes: Arc<Mutex<HashMap<i64, VecDeque<ScriptedOutcome>>>>,
    pub calls: Arc<Mutex<Vec<i64>>>,
}

impl ScriptedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcomes of successive attempts for one item.
    pub fn script(&self, item_id: i64, outcomes: &[ScriptedOutcome]) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(item_id, outcomes.iter().copied().collect());
    }

    pub fn calls(&self) -> Vec<i64> {
        self.calls.lock().unwrap().clone()
    }
}

impl UnitProcessor for ScriptedProcessor {
    fn job_type(&self) -> &str {
        "sync"
    }

    async fn process(&self, item: &ItemRef) -> Result<(), AppError> {
        self.calls.lock().unwrap().push(item.id);
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get_mut(&item.id)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(ScriptedOutcome::Success);
        match outcome {
            ScriptedOutcome::Success => Ok(()),
            ScriptedOutcome::Retryable => Err(AppError::provider(
                ProviderErrorKind::ServiceUnavailable,
                "service unavailable",
                503,
            )),
            ScriptedOutcome::Fatal => Err(AppError::provider(
                ProviderErrorKind::BadRequest,
                "malformed payload",
                400,
            )),
        }
    }
}

// =============================================================================
// MockRecordStore
// =============================================================================

/// In-memory training record store.
#[derive(Clone, Default)]
pub struct MockRecordStore {
    records: Arc<Mutex<HashMap<(Uuid, i64), TrainingRecord>>>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl RecordStore for MockRecordStore {
    async fn get(
        &self,
        collection_id: Uuid,
        item_id: i64,
    ) -> Result<Option<TrainingRecord>, AppError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(collection_id, item_id))
            .cloned())
    }

    async fn upsert(&self, record: &TrainingRecord) -> Result<(), AppError> {
        self.records
            .lock()
            .unwrap()
            .insert((record.collection_id, record.item_id), record.clone());
        Ok(())
    }

    async fn delete(&self, collection_id: Uuid, item_id: i64) -> Result<(), AppError> {
        self.records
            .lock()
            .unwrap()
            .remove(&(collection_id, item_id));
        Ok(())
    }

    async fn list_for_collection(
        &self,
        collection_id: Uuid,
    ) -> Result<Vec<TrainingRecord>, AppError> {
        let mut records: Vec<TrainingRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.collection_id == collection_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.item_id);
        Ok(records)
    }
}

// =============================================================================
// MockCollectionStore
// =============================================================================

/// In-memory collection store.
#[derive(Clone, Default)]
pub struct MockCollectionStore {
    collections: Arc<Mutex<HashMap<Uuid, Collection>>>,
}

impl MockCollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: Collection) {
        self.collections
            .lock()
            .unwrap()
            .insert(collection.id, collection);
    }

    pub fn store_id_of(&self, id: Uuid) -> Option<String> {
        self.collections
            .lock()
            .unwrap()
            .get(&id)
            .and_then(|c| c.store_id.clone())
    }

    pub fn set_filter(&self, id: Uuid, filter: Option<&str>) {
        if let Some(collection) = self.collections.lock().unwrap().get_mut(&id) {
            collection.content_filter = filter.map(str::to_string);
        }
    }
}

impl CollectionStore for MockCollectionStore {
    async fn get(&self, id: Uuid) -> Result<Option<Collection>, AppError> {
        Ok(self.collections.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Collection>, AppError> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Collection>, AppError> {
        let mut all: Vec<Collection> =
            self.collections.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn save(&self, collection: &Collection) -> Result<(), AppError> {
        self.collections
            .lock()
            .unwrap()
            .insert(collection.id, collection.clone());
        Ok(())
    }

    async fn save_store_id(&self, id: Uuid, store_id: &str) -> Result<(), AppError> {
        if let Some(collection) = self.collections.lock().unwrap().get_mut(&id) {
            collection.store_id = Some(store_id.to_string());
        }
        Ok(())
    }

    async fn clear_store_id(&self, id: Uuid) -> Result<(), AppError> {
        if let Some(collection) = self.collections.lock().unwrap().get_mut(&id) {
            collection.store_id = None;
        }
        Ok(())
    }
}

// =============================================================================
// MockContentSource
// =============================================================================

/// In-memory content source. Removing an item simulates deletion or
/// unpublishing on the host side. `resolve_items` honors the comma-separated
/// type filter; `fetch_item` does not, matching a real source where an item
/// excluded by a filter is still fetchable.
#[derive(Clone, Default)]
pub struct MockContentSource {
    items: Arc<Mutex<HashMap<i64, (String, ContentItem)>>>,
}

impl MockContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: i64, title: &str, body: &str) {
        self.insert_typed(id, "post", title, body);
    }

    pub fn insert_typed(&self, id: i64, item_type: &str, title: &str, body: &str) {
        self.items.lock().unwrap().insert(
            id,
            (
                item_type.to_string(),
                ContentItem {
                    title: title.to_string(),
                    body: body.to_string(),
                    content_type: "text/plain".to_string(),
                    modified_at: Utc::now(),
                },
            ),
        );
    }

    pub fn remove(&self, id: i64) {
        self.items.lock().unwrap().remove(&id);
    }
}

impl ContentSource for MockContentSource {
    async fn resolve_items(
        &self,
        content_filter: Option<&str>,
    ) -> Result<Vec<ItemRef>, AppError> {
        let types: Option<Vec<String>> = content_filter
            .map(|f| f.split(',').map(|t| t.trim().to_string()).collect());
        let mut refs: Vec<ItemRef> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (item_type, _))| {
                types.as_ref().is_none_or(|t| t.contains(item_type))
            })
            .map(|(id, (item_type, _))| ItemRef::new(*id, item_type.clone()))
            .collect();
        refs.sort_unstable_by_key(|item| item.id);
        Ok(refs)
    }

    async fn fetch_item(&self, item: &ItemRef) -> Result<Option<ContentItem>, AppError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .get(&item.id)
            .map(|(_, content)| content.clone()))
    }
}

// =============================================================================
// MockAdapter
// =============================================================================

#[derive(Default)]
struct AdapterState {
    /// store_id -> file_id -> document content
    stores: HashMap<String, HashMap<String, String>>,
    store_seq: u32,
    file_seq: u32,
    upload_calls: u32,
    /// Scripted failures consumed by the next upload calls.
    fail_next_uploads: VecDeque<ProviderErrorKind>,
}

/// In-memory vector store adapter.
///
/// Behaves like a single-layer provider (documents live inside a store),
/// which exercises the strictest contract: every operation requires a live
/// store. Stores can be deleted out from under callers to simulate a
/// remotely vanished store.
#[derive(Clone, Default)]
pub struct MockAdapter {
    state: Arc<Mutex<AdapterState>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next upload call to fail with the given classification.
    pub fn fail_next_upload(&self, kind: ProviderErrorKind) {
        self.state
            .lock()
            .unwrap()
            .fail_next_uploads
            .push_back(kind);
    }

    /// Delete a store behind the caller's back.
    pub fn vanish_store(&self, store_id: &str) {
        self.state.lock().unwrap().stores.remove(store_id);
    }

    pub fn store_count(&self) -> usize {
        self.state.lock().unwrap().stores.len()
    }

    pub fn file_count(&self, store_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .stores
            .get(store_id)
            .map_or(0, |files| files.len())
    }

    pub fn has_file(&self, store_id: &str, file_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .stores
            .get(store_id)
            .is_some_and(|files| files.contains_key(file_id))
    }

    pub fn upload_calls(&self) -> u32 {
        self.state.lock().unwrap().upload_calls
    }

    fn not_found(what: &str) -> AppError {
        AppError::provider(ProviderErrorKind::NotFound, format!("{} not found", what), 404)
    }
}

impl VectorStoreAdapter for MockAdapter {
    async fn create_store(&self, _name: &str) -> Result<String, AppError> {
        let mut state = self.state.lock().unwrap();
        state.store_seq += 1;
        let id = format!("vs_{}", state.store_seq);
        state.stores.insert(id.clone(), HashMap::new());
        Ok(id)
    }

    async fn get_store_info(&self, store_id: &str) -> Result<StoreInfo, AppError> {
        let state = self.state.lock().unwrap();
        let files = state
            .stores
            .get(store_id)
            .ok_or_else(|| Self::not_found("store"))?;
        Ok(StoreInfo {
            store_id: store_id.to_string(),
            name: None,
            status: "active".to_string(),
            document_count: Some(files.len() as u64),
            usage_bytes: Some(files.values().map(|c| c.len() as u64).sum()),
        })
    }

    async fn update_store(&self, store_id: &str, _fields: StoreUpdate) -> Result<(), AppError> {
        let state = self.state.lock().unwrap();
        if !state.stores.contains_key(store_id) {
            return Err(Self::not_found("store"));
        }
        Ok(())
    }

    async fn delete_store(&self, store_id: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state
            .stores
            .remove(store_id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found("store"))
    }

    async fn upload_document(
        &self,
        payload: &DocumentPayload,
        store_id: &str,
    ) -> Result<String, AppError> {
        let mut state = self.state.lock().unwrap();
        state.upload_calls += 1;
        if let Some(kind) = state.fail_next_uploads.pop_front() {
            return Err(AppError::provider(kind, "scripted upload failure", 503));
        }
        if !state.stores.contains_key(store_id) {
            return Err(Self::not_found("store"));
        }
        state.file_seq += 1;
        let file_id = format!("file_{}", state.file_seq);
        state
            .stores
            .get_mut(store_id)
            .unwrap()
            .insert(file_id.clone(), payload.content.clone());
        Ok(file_id)
    }

    async fn add_to_store(
        &self,
        store_id: &str,
        file_id: &str,
        _skip_verification: bool,
    ) -> Result<(), AppError> {
        let state = self.state.lock().unwrap();
        let files = state
            .stores
            .get(store_id)
            .ok_or_else(|| Self::not_found("store"))?;
        if files.contains_key(file_id) {
            Ok(())
        } else {
            Err(Self::not_found("file"))
        }
    }

    async fn remove_from_store(&self, store_id: &str, file_id: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let files = state
            .stores
            .get_mut(store_id)
            .ok_or_else(|| Self::not_found("store"))?;
        files
            .remove(file_id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found("file"))
    }

    async fn verify_exists(&self, file_id: &str, store_id: &str) -> Result<bool, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .stores
            .get(store_id)
            .is_some_and(|files| files.contains_key(file_id)))
    }

    async fn delete_file(&self, file_id: &str, store_id: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        // Single-layer semantics: the file and the store document are the
        // same resource, so a file already removed from the store is gone.
        match state.stores.get_mut(store_id) {
            Some(files) => {
                files.remove(file_id);
                Ok(())
            }
            None => Err(Self::not_found("store")),
        }
    }
}
