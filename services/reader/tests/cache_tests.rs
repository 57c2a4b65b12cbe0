//! services/reader/tests/cache_tests.rs
//!
//! Two-tier cache behavior: byte identity on hits, persistent-tier
//! promotion, write-through, and store-failure degradation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use common::{wait_until, RecordingStore};
use pretty_assertions::assert_eq;
use reader_lib::cache::PageCache;
use uuid::Uuid;

#[tokio::test]
async fn cached_bytes_are_returned_unchanged() {
    let store = Arc::new(RecordingStore::default());
    let cache = PageCache::new(Uuid::new_v4(), store);

    let original = Bytes::from_static(b"page-three-at-155");
    cache.put(3, 155, original.clone());

    let hit = cache.get(3, 155).await.expect("just written, must hit");
    assert_eq!(hit, original);
}

#[tokio::test]
async fn persistent_hit_is_promoted_into_memory() {
    let document_id = Uuid::new_v4();
    let store = Arc::new(RecordingStore::default());
    store.seed(document_id, 7, 155, Bytes::from_static(b"persisted"));

    let cache = PageCache::new(document_id, store.clone());

    let first = cache.get(7, 155).await.expect("store has the entry");
    assert_eq!(first, Bytes::from_static(b"persisted"));
    assert_eq!(store.loads(), 1);

    // Second lookup is served from memory without touching the store.
    let second = cache.get(7, 155).await.expect("promoted entry");
    assert_eq!(second, first);
    assert_eq!(store.loads(), 1);
}

#[tokio::test]
async fn scale_tag_mismatch_is_a_miss() {
    let document_id = Uuid::new_v4();
    let store = Arc::new(RecordingStore::default());
    store.seed(document_id, 2, 155, Bytes::from_static(b"windowed"));

    let cache = PageCache::new(document_id, store);
    assert!(cache.get(2, 210).await.is_none());
}

#[tokio::test]
async fn put_writes_through_to_the_store() {
    let document_id = Uuid::new_v4();
    let store = Arc::new(RecordingStore::default());
    let cache = PageCache::new(document_id, store.clone());

    cache.put(0, 115, Bytes::from_static(b"mobile-page"));

    let persisted = wait_until(Duration::from_secs(1), || {
        store.contains(document_id, 0, 115)
    })
    .await;
    assert!(persisted, "write-through never reached the store");
}

#[tokio::test]
async fn store_read_failure_degrades_to_a_miss() {
    let document_id = Uuid::new_v4();
    let store = Arc::new(RecordingStore::default());
    store.seed(document_id, 1, 155, Bytes::from_static(b"unreachable"));
    store.set_fail_loads(true);

    let cache = PageCache::new(document_id, store.clone());
    assert!(cache.get(1, 155).await.is_none());

    // Recovery: once the store answers again the entry is served.
    store.set_fail_loads(false);
    assert_eq!(
        cache.get(1, 155).await,
        Some(Bytes::from_static(b"unreachable"))
    );
}

#[tokio::test]
async fn documents_do_not_share_memory_entries() {
    let store = Arc::new(RecordingStore::default());
    let cache_a = PageCache::new(Uuid::new_v4(), store.clone());
    let cache_b = PageCache::new(Uuid::new_v4(), store.clone());

    cache_a.put(0, 155, Bytes::from_static(b"story-a"));

    // The other document's session-scoped cache misses both tiers.
    assert!(cache_b.get(0, 155).await.is_none());
}
