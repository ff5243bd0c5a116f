//! End-to-end sync tests: processor + registry + runner over in-memory
//! stores and the mock adapter.

use tessera_core::registry::{Collection, CollectionRegistry, ContentSource};
use tessera_core::runner::UnitProcessor;
use tessera_core::{
    ItemRef, JobKind, JobRunner, JobStatus, ProviderErrorKind, ProviderKind, RecordStatus,
    RecordStore, SyncProcessor,
};
use uuid::Uuid;

use super::common::{
    MockAdapter, MockCollectionStore, MockContentSource, MockJobStore, MockRecordStore,
};

struct Fixture {
    collection_id: Uuid,
    collections: MockCollectionStore,
    adapter: MockAdapter,
    source: MockContentSource,
    records: MockRecordStore,
}

impl Fixture {
    fn new() -> Self {
        let collections = MockCollectionStore::new();
        let collection = Collection::new("docs", ProviderKind::Gemini);
        let collection_id = collection.id;
        collections.insert(collection);
        Self {
            collection_id,
            collections,
            adapter: MockAdapter::new(),
            source: MockContentSource::new(),
            records: MockRecordStore::new(),
        }
    }

    fn registry(&self) -> CollectionRegistry<MockCollectionStore, MockAdapter> {
        CollectionRegistry::new(self.collections.clone(), self.adapter.clone())
    }

    fn processor(
        &self,
    ) -> SyncProcessor<MockCollectionStore, MockAdapter, MockContentSource, MockRecordStore> {
        SyncProcessor::new(
            self.registry(),
            self.source.clone(),
            self.records.clone(),
            self.collection_id,
        )
    }
}

fn item(id: i64) -> ItemRef {
    ItemRef::new(id, "post")
}

// =============================================================================
// Registry
// =============================================================================

#[tokio::test]
async fn test_get_or_create_store_creates_and_caches() {
    let fx = Fixture::new();
    let registry = fx.registry();

    let store_id = registry.get_or_create_store(fx.collection_id).await.unwrap();
    assert_eq!(fx.adapter.store_count(), 1);
    assert_eq!(fx.collections.store_id_of(fx.collection_id), Some(store_id.clone()));

    // Second call verifies and reuses the cached id.
    let again = registry.get_or_create_store(fx.collection_id).await.unwrap();
    assert_eq!(again, store_id);
    assert_eq!(fx.adapter.store_count(), 1);
}

#[tokio::test]
async fn test_get_or_create_store_recreates_stale_id() {
    let fx = Fixture::new();
    let registry = fx.registry();

    let first = registry.get_or_create_store(fx.collection_id).await.unwrap();
    fx.adapter.vanish_store(&first);

    let second = registry.get_or_create_store(fx.collection_id).await.unwrap();
    assert_ne!(second, first);
    assert_eq!(fx.collections.store_id_of(fx.collection_id), Some(second));
}

#[tokio::test]
async fn test_get_or_create_store_unknown_collection() {
    let fx = Fixture::new();
    let registry = fx.registry();
    let result = registry.get_or_create_store(Uuid::new_v4()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_clear_collection_removes_store_and_records() {
    let fx = Fixture::new();
    fx.source.insert(1, "One", "Body one");
    fx.source.insert(2, "Two", "Body two");
    let processor = fx.processor();
    processor.process(&item(1)).await.unwrap();
    processor.process(&item(2)).await.unwrap();
    assert_eq!(fx.records.len(), 2);
    assert_eq!(fx.adapter.store_count(), 1);

    let removed = fx
        .registry()
        .clear_collection(fx.collection_id, &fx.records)
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(fx.records.len(), 0);
    assert_eq!(fx.adapter.store_count(), 0);
    assert_eq!(fx.collections.store_id_of(fx.collection_id), None);
}

// =============================================================================
// Processor
// =============================================================================

#[tokio::test]
async fn test_new_item_is_uploaded_and_recorded() {
    let fx = Fixture::new();
    fx.source.insert(1, "Hello", "World");
    let processor = fx.processor();

    processor.process(&item(1)).await.unwrap();

    let record = fx.records.get(fx.collection_id, 1).await.unwrap().unwrap();
    assert_eq!(record.status, RecordStatus::Added);
    assert!(record.content_hash.is_some());
    let store_id = record.store_id.unwrap();
    let file_id = record.file_id.unwrap();
    assert!(fx.adapter.has_file(&store_id, &file_id));
}

#[tokio::test]
async fn test_unchanged_item_is_skipped() {
    let fx = Fixture::new();
    fx.source.insert(1, "Hello", "World");
    let processor = fx.processor();

    processor.process(&item(1)).await.unwrap();
    let uploads = fx.adapter.upload_calls();

    // Same content again: hash matches, no upload.
    processor.process(&item(1)).await.unwrap();
    assert_eq!(fx.adapter.upload_calls(), uploads);
}

#[tokio::test]
async fn test_changed_item_is_reuploaded_and_old_file_removed() {
    let fx = Fixture::new();
    fx.source.insert(1, "Hello", "World");
    let processor = fx.processor();
    processor.process(&item(1)).await.unwrap();
    let old = fx.records.get(fx.collection_id, 1).await.unwrap().unwrap();
    let old_file = old.file_id.clone().unwrap();
    let store_id = old.store_id.clone().unwrap();

    fx.source.insert(1, "Hello", "World, revised");
    processor.process(&item(1)).await.unwrap();

    let new = fx.records.get(fx.collection_id, 1).await.unwrap().unwrap();
    assert_eq!(new.status, RecordStatus::Updated);
    assert_ne!(new.content_hash, old.content_hash);
    let new_file = new.file_id.unwrap();
    assert_ne!(new_file, old_file);
    assert!(fx.adapter.has_file(&store_id, &new_file));
    assert!(!fx.adapter.has_file(&store_id, &old_file));
}

#[tokio::test]
async fn test_removed_item_deletes_remote_document_then_record() {
    let fx = Fixture::new();
    fx.source.insert(1, "Hello", "World");
    let processor = fx.processor();
    processor.process(&item(1)).await.unwrap();
    let record = fx.records.get(fx.collection_id, 1).await.unwrap().unwrap();
    let store_id = record.store_id.unwrap();
    let file_id = record.file_id.unwrap();

    fx.source.remove(1);
    processor.process(&item(1)).await.unwrap();

    assert!(!fx.adapter.has_file(&store_id, &file_id));
    assert!(fx.records.get(fx.collection_id, 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_item_excluded_by_narrowed_filter_is_removed() {
    let fx = Fixture::new();
    fx.source.insert_typed(9, "page", "Nine", "Body nine");
    let processor = fx.processor();
    processor.process(&ItemRef::new(9, "page")).await.unwrap();
    let record = fx.records.get(fx.collection_id, 9).await.unwrap().unwrap();
    let store_id = record.store_id.unwrap();
    let file_id = record.file_id.unwrap();

    // Narrow the collection to posts. The page is still published and
    // fetchable, but no longer part of the collection.
    fx.collections.set_filter(fx.collection_id, Some("post"));
    let processor = fx.processor();
    let fetched = fx.source.fetch_item(&ItemRef::new(9, "page")).await.unwrap();
    assert!(fetched.is_some());

    let plan = processor.plan().await.unwrap();
    assert_eq!(plan.removals, vec![9]);
    assert!(plan.additions.is_empty() && plan.candidates.is_empty());

    let runner = JobRunner::new(processor, MockJobStore::new());
    runner.initialize(plan.job_items(), JobKind::Direct).await.unwrap();
    let job = runner.run_to_completion().await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.errors, 0);

    assert!(fx.records.get(fx.collection_id, 9).await.unwrap().is_none());
    assert!(!fx.adapter.has_file(&store_id, &file_id));
}

#[tokio::test]
async fn test_removed_item_without_record_is_a_noop() {
    let fx = Fixture::new();
    let processor = fx.processor();
    processor.process(&item(99)).await.unwrap();
    assert_eq!(fx.records.len(), 0);
}

#[tokio::test]
async fn test_upload_failure_marks_record_error() {
    let fx = Fixture::new();
    fx.source.insert(1, "Hello", "World");
    fx.adapter.fail_next_upload(ProviderErrorKind::ServiceUnavailable);
    let processor = fx.processor();

    let result = processor.process(&item(1)).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().is_retryable());

    let record = fx.records.get(fx.collection_id, 1).await.unwrap().unwrap();
    assert_eq!(record.status, RecordStatus::Error);
    assert_eq!(record.error_code.as_deref(), Some("service_unavailable"));
    assert_eq!(record.retry_count, 1);
    assert!(record.file_id.is_none());
}

#[tokio::test]
async fn test_vanished_store_is_recreated_once_and_item_redone() {
    let fx = Fixture::new();
    fx.source.insert(1, "Hello", "World");
    let processor = fx.processor();
    processor.process(&item(1)).await.unwrap();
    let first_store = fx.records.get(fx.collection_id, 1).await.unwrap().unwrap().store_id.unwrap();

    // Kill the store remotely, then sync a changed item.
    fx.adapter.vanish_store(&first_store);
    fx.source.insert(1, "Hello", "World, revised");
    processor.process(&item(1)).await.unwrap();

    let record = fx.records.get(fx.collection_id, 1).await.unwrap().unwrap();
    let new_store = record.store_id.unwrap();
    assert_ne!(new_store, first_store);
    assert!(fx.adapter.has_file(&new_store, &record.file_id.unwrap()));
    assert_eq!(record.status, RecordStatus::Updated);
}

#[tokio::test]
async fn test_plan_reflects_source_and_records() {
    let fx = Fixture::new();
    fx.source.insert(1, "One", "Body");
    fx.source.insert(2, "Two", "Body");
    let processor = fx.processor();
    // Sync item 2 so it has a record, then drop it from the source.
    processor.process(&item(2)).await.unwrap();
    fx.source.remove(2);
    fx.source.insert(3, "Three", "Body");

    let plan = processor.plan().await.unwrap();
    assert_eq!(
        plan.additions.iter().map(|i| i.id).collect::<Vec<_>>(),
        vec![1, 3]
    );
    assert!(plan.candidates.is_empty());
    assert_eq!(plan.removals, vec![2]);
}

// =============================================================================
// Full job over the processor
// =============================================================================

#[tokio::test]
async fn test_full_sync_job_end_to_end() {
    let fx = Fixture::new();
    fx.source.insert(1, "One", "Body one");
    fx.source.insert(2, "Two", "Body two");
    fx.source.insert(3, "Three", "Body three");
    let processor = fx.processor();

    let plan = processor.plan().await.unwrap();
    let runner = JobRunner::new(processor, MockJobStore::new());
    runner.initialize(plan.job_items(), JobKind::Direct).await.unwrap();

    let job = runner.run_to_completion().await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.processed, 3);
    assert_eq!(job.errors, 0);
    assert_eq!(fx.records.len(), 3);
    for id in 1..=3 {
        let record = fx.records.get(fx.collection_id, id).await.unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Added);
    }
}

#[tokio::test]
async fn test_transient_failure_recovers_via_retry_pass() {
    let fx = Fixture::new();
    fx.source.insert(1, "One", "Body one");
    fx.source.insert(2, "Two", "Body two");
    // First upload attempt (item 1) fails transiently.
    fx.adapter.fail_next_upload(ProviderErrorKind::ServiceUnavailable);
    let processor = fx.processor();

    let plan = processor.plan().await.unwrap();
    let runner = JobRunner::new(processor, MockJobStore::new());
    runner.initialize(plan.job_items(), JobKind::Direct).await.unwrap();

    let job = runner.run_to_completion().await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.errors, 1);
    assert_eq!(job.retry_item_ids, vec![1]);

    // The retry pass healed the record.
    let record = fx.records.get(fx.collection_id, 1).await.unwrap().unwrap();
    assert_eq!(record.status, RecordStatus::Added);
    assert_eq!(record.retry_count, 0);
}
