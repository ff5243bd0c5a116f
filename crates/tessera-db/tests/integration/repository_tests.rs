//! Integration tests for the repository layer.
//!
//! These tests verify the collection, record, and job snapshot repositories
//! against a real PostgreSQL database. Each test runs in an isolated
//! container.

use tessera_core::ProviderKind;
use tessera_core::job::{ItemRef, JobKind, SyncJob};
use tessera_core::job_store::JobStore;
use tessera_core::record::{RecordStatus, RecordStore, TrainingRecord};
use tessera_core::registry::CollectionStore;
use tessera_db::{CollectionRepository, JobSnapshotRepository, RecordRepository};

use crate::integration::common::{sample_collection, setup_test_db};

// =============================================================================
// Collections
// =============================================================================

#[tokio::test]
async fn test_collection_save_and_get() {
    let (pool, _container) = setup_test_db().await;
    let repo = CollectionRepository::new(pool);

    let collection = sample_collection("docs", ProviderKind::Gemini);
    repo.save(&collection).await.expect("save should succeed");

    let retrieved = repo
        .get(collection.id)
        .await
        .expect("get should succeed")
        .expect("collection should exist");
    assert_eq!(retrieved.name, "docs");
    assert_eq!(retrieved.provider, ProviderKind::Gemini);
    assert_eq!(retrieved.content_filter.as_deref(), Some("post,page"));
    assert!(retrieved.store_id.is_none());
}

#[tokio::test]
async fn test_collection_lookup_by_name_is_case_insensitive() {
    let (pool, _container) = setup_test_db().await;
    let repo = CollectionRepository::new(pool);

    let collection = sample_collection("Support-Articles", ProviderKind::OpenAi);
    repo.save(&collection).await.expect("save should succeed");

    let retrieved = repo
        .get_by_name("support-articles")
        .await
        .expect("get_by_name should succeed")
        .expect("collection should exist");
    assert_eq!(retrieved.id, collection.id);

    let missing = repo
        .get_by_name("no-such-collection")
        .await
        .expect("get_by_name should succeed");
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_collection_store_id_lifecycle() {
    let (pool, _container) = setup_test_db().await;
    let repo = CollectionRepository::new(pool);

    let collection = sample_collection("docs", ProviderKind::OpenAi);
    repo.save(&collection).await.expect("save should succeed");

    repo.save_store_id(collection.id, "vs_1")
        .await
        .expect("save_store_id should succeed");
    let with_store = repo.get(collection.id).await.unwrap().unwrap();
    assert_eq!(with_store.store_id.as_deref(), Some("vs_1"));

    repo.clear_store_id(collection.id)
        .await
        .expect("clear_store_id should succeed");
    let cleared = repo.get(collection.id).await.unwrap().unwrap();
    assert!(cleared.store_id.is_none());
}

#[tokio::test]
async fn test_collection_list_sorted_by_name() {
    let (pool, _container) = setup_test_db().await;
    let repo = CollectionRepository::new(pool);

    for name in ["zeta", "alpha", "mid"] {
        repo.save(&sample_collection(name, ProviderKind::OpenAi))
            .await
            .expect("save should succeed");
    }

    let names: Vec<String> = repo
        .list()
        .await
        .expect("list should succeed")
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}

// =============================================================================
// Training records
// =============================================================================

#[tokio::test]
async fn test_record_upsert_and_get() {
    let (pool, _container) = setup_test_db().await;
    let collections = CollectionRepository::new(pool.clone());
    let records = RecordRepository::new(pool);

    let collection = sample_collection("docs", ProviderKind::OpenAi);
    collections.save(&collection).await.unwrap();

    let mut record = TrainingRecord::new(collection.id, 42);
    records.upsert(&record).await.expect("insert should succeed");

    record.mark_synced("vs_1", "file_1", "hash-abc");
    records.upsert(&record).await.expect("update should succeed");

    let retrieved = records
        .get(collection.id, 42)
        .await
        .expect("get should succeed")
        .expect("record should exist");
    assert_eq!(retrieved.status, RecordStatus::Added);
    assert_eq!(retrieved.file_id.as_deref(), Some("file_1"));
    assert_eq!(retrieved.content_hash.as_deref(), Some("hash-abc"));
    assert!(retrieved.last_synced.is_some());
}

#[tokio::test]
async fn test_record_delete_and_list() {
    let (pool, _container) = setup_test_db().await;
    let collections = CollectionRepository::new(pool.clone());
    let records = RecordRepository::new(pool);

    let collection = sample_collection("docs", ProviderKind::OpenAi);
    collections.save(&collection).await.unwrap();

    for item_id in [3, 1, 2] {
        records
            .upsert(&TrainingRecord::new(collection.id, item_id))
            .await
            .unwrap();
    }

    let listed = records.list_for_collection(collection.id).await.unwrap();
    let ids: Vec<i64> = listed.iter().map(|r| r.item_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    records.delete(collection.id, 2).await.unwrap();
    let remaining = records.list_for_collection(collection.id).await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(records.get(collection.id, 2).await.unwrap().is_none());
}

#[tokio::test]
async fn test_records_cascade_with_collection() {
    let (pool, _container) = setup_test_db().await;
    let collections = CollectionRepository::new(pool.clone());
    let records = RecordRepository::new(pool.clone());

    let collection = sample_collection("docs", ProviderKind::OpenAi);
    collections.save(&collection).await.unwrap();
    records
        .upsert(&TrainingRecord::new(collection.id, 1))
        .await
        .unwrap();

    sqlx::query("DELETE FROM collections WHERE id = $1")
        .bind(collection.id)
        .execute(&pool)
        .await
        .unwrap();

    assert!(records.get(collection.id, 1).await.unwrap().is_none());
}

// =============================================================================
// Job snapshots
// =============================================================================

#[tokio::test]
async fn test_job_snapshot_round_trip() {
    let (pool, _container) = setup_test_db().await;
    let repo = JobSnapshotRepository::new(pool);

    assert!(repo.load("sync").await.unwrap().is_none());

    let items = vec![
        ItemRef::new(101, "post"),
        ItemRef::new(102, "page"),
    ];
    let job = SyncJob::new(items, JobKind::Direct);
    repo.save("sync", &job).await.expect("save should succeed");

    let loaded = repo
        .load("sync")
        .await
        .expect("load should succeed")
        .expect("snapshot should exist");
    assert_eq!(loaded.status, job.status);
    assert_eq!(loaded.total, 2);
    assert_eq!(loaded.items, job.items);
}

#[tokio::test]
async fn test_job_snapshot_upsert_replaces() {
    let (pool, _container) = setup_test_db().await;
    let repo = JobSnapshotRepository::new(pool);

    let mut job = SyncJob::new(vec![ItemRef::new(1, "post")], JobKind::Cron);
    repo.save("sync", &job).await.unwrap();

    job.processed = 1;
    job.errors = 1;
    repo.save("sync", &job).await.unwrap();

    let loaded = repo.load("sync").await.unwrap().unwrap();
    assert_eq!(loaded.processed, 1);
    assert_eq!(loaded.errors, 1);
}

#[tokio::test]
async fn test_job_snapshot_types_are_independent() {
    let (pool, _container) = setup_test_db().await;
    let repo = JobSnapshotRepository::new(pool);

    let sync = SyncJob::new(vec![ItemRef::new(1, "post")], JobKind::Direct);
    let analysis = SyncJob::new(vec![ItemRef::new(2, "page")], JobKind::Cron);
    repo.save("sync", &sync).await.unwrap();
    repo.save("analysis", &analysis).await.unwrap();

    repo.clear("sync").await.unwrap();
    assert!(repo.load("sync").await.unwrap().is_none());
    assert!(repo.load("analysis").await.unwrap().is_some());
}
