//! services/reader/tests/store_tests.rs
//!
//! Device-store adapter behavior against a real SQLite file: page cache
//! keys and scale tags, the per-document eviction cap, and the quiz queue's
//! drain-once semantics.

mod common;

use bytes::Bytes;
use chrono::Utc;
use pretty_assertions::assert_eq;
use reader_lib::adapters::SqliteStore;
use story_reader_core::domain::QuizResult;
use story_reader_core::ports::{PageStore, QuizQueue};
use uuid::Uuid;

async fn open_store(dir: &tempfile::TempDir) -> SqliteStore {
    let url = format!("sqlite://{}/store.db?mode=rwc", dir.path().display());
    let store = SqliteStore::connect(&url).await.unwrap();
    store.run_migrations().await.unwrap();
    store
}

#[tokio::test]
async fn page_bytes_round_trip_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let document_id = Uuid::new_v4();

    store
        .store(document_id, 3, 155, Bytes::from_static(b"page-three"))
        .await
        .unwrap();

    let loaded = store.load(document_id, 3, 155).await.unwrap();
    assert_eq!(loaded, Some(Bytes::from_static(b"page-three")));
}

#[tokio::test]
async fn a_different_scale_tag_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let document_id = Uuid::new_v4();

    store
        .store(document_id, 0, 155, Bytes::from_static(b"windowed"))
        .await
        .unwrap();

    assert_eq!(store.load(document_id, 0, 210).await.unwrap(), None);
}

#[tokio::test]
async fn restoring_a_page_replaces_the_previous_entry() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let document_id = Uuid::new_v4();

    store
        .store(document_id, 0, 155, Bytes::from_static(b"old"))
        .await
        .unwrap();
    store
        .store(document_id, 0, 210, Bytes::from_static(b"new"))
        .await
        .unwrap();

    // The key is per page; the re-store at the new scale replaced the row.
    assert_eq!(store.load(document_id, 0, 155).await.unwrap(), None);
    assert_eq!(
        store.load(document_id, 0, 210).await.unwrap(),
        Some(Bytes::from_static(b"new"))
    );
}

#[tokio::test]
async fn documents_are_keyed_independently() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let story_a = Uuid::new_v4();
    let story_b = Uuid::new_v4();

    store
        .store(story_a, 0, 155, Bytes::from_static(b"story-a"))
        .await
        .unwrap();

    assert_eq!(store.load(story_b, 0, 155).await.unwrap(), None);
}

#[tokio::test]
async fn oldest_pages_are_evicted_past_the_per_document_cap() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let document_id = Uuid::new_v4();

    // 410 pages: ten more than the cap.
    for page in 0..410usize {
        store
            .store(document_id, page, 155, Bytes::from(vec![page as u8]))
            .await
            .unwrap();
    }

    // The newest entries survive; the oldest were evicted.
    assert!(store.load(document_id, 409, 155).await.unwrap().is_some());
    assert!(store.load(document_id, 0, 155).await.unwrap().is_none());
}

#[tokio::test]
async fn quiz_queue_drains_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let document_id = Uuid::new_v4();

    let result = QuizResult {
        document_id,
        score: 3,
        total: 5,
        recorded_at: Utc::now(),
    };
    store.enqueue(&result).await.unwrap();
    store.enqueue(&result).await.unwrap();

    let drained = store.take_pending().await.unwrap();
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].document_id, document_id);
    assert_eq!(drained[0].score, 3);
    assert_eq!(drained[0].total, 5);

    // Already drained: a second take finds nothing.
    assert_eq!(store.take_pending().await.unwrap().len(), 0);
}
