//! services/reader/src/cache.rs
//!
//! The two-tier page cache: a session-scoped in-memory map layered over the
//! persistent per-device store. The memory tier is scoped to one open
//! document by construction (a fresh `PageCache` is built per session), so
//! opening a new document can never serve another document's pages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use story_reader_core::ports::PageStore;
use tracing::warn;
use uuid::Uuid;

type MemoryKey = (usize, u16);

/// Two-tier lookup: memory first (synchronous), then the persistent store.
/// Persistent hits are promoted into memory; fresh pages are written through
/// to both tiers. Store failures are never fatal.
pub struct PageCache {
    document_id: Uuid,
    memory: Mutex<HashMap<MemoryKey, Bytes>>,
    store: Arc<dyn PageStore>,
}

impl PageCache {
    pub fn new(document_id: Uuid, store: Arc<dyn PageStore>) -> Self {
        Self {
            document_id,
            memory: Mutex::new(HashMap::new()),
            store,
        }
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    /// Looks up a page's encoded bytes. A persistent-tier hit is promoted
    /// into the memory tier before returning, so the next lookup for the
    /// same key is served without touching the store again.
    pub async fn get(&self, page: usize, scale_tag: u16) -> Option<Bytes> {
        let key = (page, scale_tag);
        if let Some(hit) = self.memory.lock().unwrap().get(&key).cloned() {
            return Some(hit);
        }

        match self.store.load(self.document_id, page, scale_tag).await {
            Ok(Some(bytes)) => {
                self.memory.lock().unwrap().insert(key, bytes.clone());
                Some(bytes)
            }
            Ok(None) => None,
            Err(e) => {
                // A store read failure is a cache miss, nothing more.
                warn!(page, "persistent cache read failed: {e}");
                None
            }
        }
    }

    /// Writes a freshly rasterized page: into memory immediately, and to the
    /// persistent store asynchronously. Persistence failures are logged and
    /// never surfaced to the caller.
    pub fn put(&self, page: usize, scale_tag: u16, bytes: Bytes) {
        self.memory
            .lock()
            .unwrap()
            .insert((page, scale_tag), bytes.clone());

        let store = self.store.clone();
        let document_id = self.document_id;
        tokio::spawn(async move {
            if let Err(e) = store.store(document_id, page, scale_tag, bytes).await {
                warn!(page, "persistent cache write failed: {e}");
            }
        });
    }
}
