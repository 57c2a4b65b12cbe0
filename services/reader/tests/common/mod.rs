//! services/reader/tests/common/mod.rs
//!
//! Shared test doubles for the engine integration tests: an instrumented
//! document source, an in-memory device store, a scriptable progress
//! backend, and a surface that captures what was presented.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reader_lib::engine::EngineOptions;
use reader_lib::feedback::FeedbackEvent;
use story_reader_core::domain::{
    DisplayMode, DocumentInfo, PageBitmap, QuizResult, ReadingProgress,
};
use story_reader_core::flip::LayoutMode;
use story_reader_core::ports::{
    DocumentSource, NarrationService, PageStore, PortError, PortResult, ProgressService,
    QuizQueue, RenderSurface,
};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

pub const PAGE_SIDE: u32 = 8;

/// Deterministic pixel buffer for one page: every byte carries the page
/// number, so cache hits can be checked for byte identity.
pub fn page_pixels(page: usize) -> Vec<u8> {
    vec![page as u8; (PAGE_SIDE * PAGE_SIDE * 4) as usize]
}

//=========================================================================================
// Document Source
//=========================================================================================

/// A `DocumentSource` that counts rasterizations per page and can be told
/// to stall on open or fail specific pages.
pub struct CountingSource {
    info: DocumentInfo,
    texts: Vec<Option<String>>,
    failing_pages: Mutex<HashSet<usize>>,
    info_delay: Option<Duration>,
    rasterize_delay: Option<Duration>,
    rasterize_calls: Mutex<HashMap<usize, usize>>,
}

impl CountingSource {
    pub fn new(page_count: usize) -> Self {
        Self::with_id(Uuid::new_v4(), page_count)
    }

    pub fn with_id(id: Uuid, page_count: usize) -> Self {
        Self {
            info: DocumentInfo {
                id,
                title: "The Counting Fox".to_string(),
                page_count,
                aspect_ratio: 0.75,
            },
            texts: vec![None; page_count],
            failing_pages: Mutex::new(HashSet::new()),
            info_delay: None,
            rasterize_delay: None,
            rasterize_calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_text(mut self, page: usize, text: &str) -> Self {
        self.texts[page] = Some(text.to_string());
        self
    }

    pub fn failing_page(self, page: usize) -> Self {
        self.failing_pages.lock().unwrap().insert(page);
        self
    }

    pub fn set_page_failing(&self, page: usize, failing: bool) {
        let mut failing_pages = self.failing_pages.lock().unwrap();
        if failing {
            failing_pages.insert(page);
        } else {
            failing_pages.remove(&page);
        }
    }

    pub fn with_info_delay(mut self, delay: Duration) -> Self {
        self.info_delay = Some(delay);
        self
    }

    pub fn with_rasterize_delay(mut self, delay: Duration) -> Self {
        self.rasterize_delay = Some(delay);
        self
    }

    pub fn document_id(&self) -> Uuid {
        self.info.id
    }

    pub fn rasterize_count(&self, page: usize) -> usize {
        self.rasterize_calls
            .lock()
            .unwrap()
            .get(&page)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_rasterize_count(&self) -> usize {
        self.rasterize_calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl DocumentSource for CountingSource {
    async fn info(&self) -> PortResult<DocumentInfo> {
        if let Some(delay) = self.info_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.info.clone())
    }

    async fn rasterize_page(&self, page: usize, _scale: f32) -> PortResult<PageBitmap> {
        *self
            .rasterize_calls
            .lock()
            .unwrap()
            .entry(page)
            .or_insert(0) += 1;
        if let Some(delay) = self.rasterize_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_pages.lock().unwrap().contains(&page) {
            return Err(PortError::Unexpected(format!(
                "page {page} is corrupt"
            )));
        }
        Ok(PageBitmap {
            width: PAGE_SIDE,
            height: PAGE_SIDE,
            pixels: Bytes::from(page_pixels(page)),
        })
    }

    async fn page_text(&self, page: usize) -> PortResult<Option<String>> {
        Ok(self.texts.get(page).cloned().flatten())
    }
}

//=========================================================================================
// Device Store
//=========================================================================================

/// An in-memory `PageStore` that records how often each tier operation ran.
#[derive(Default)]
pub struct RecordingStore {
    entries: Mutex<HashMap<(Uuid, usize, u16), Bytes>>,
    pub load_calls: AtomicUsize,
    pub store_calls: AtomicUsize,
    fail_loads: AtomicBool,
}

impl RecordingStore {
    pub fn seed(&self, document_id: Uuid, page: usize, scale_tag: u16, bytes: Bytes) {
        self.entries
            .lock()
            .unwrap()
            .insert((document_id, page, scale_tag), bytes);
    }

    pub fn contains(&self, document_id: Uuid, page: usize, scale_tag: u16) -> bool {
        self.entries
            .lock()
            .unwrap()
            .contains_key(&(document_id, page, scale_tag))
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn loads(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageStore for RecordingStore {
    async fn load(
        &self,
        document_id: Uuid,
        page: usize,
        scale_tag: u16,
    ) -> PortResult<Option<Bytes>> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("store offline".to_string()));
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&(document_id, page, scale_tag))
            .cloned())
    }

    async fn store(
        &self,
        document_id: Uuid,
        page: usize,
        scale_tag: u16,
        bytes: Bytes,
    ) -> PortResult<()> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert((document_id, page, scale_tag), bytes);
        Ok(())
    }
}

//=========================================================================================
// Progress Backend and Quiz Queue
//=========================================================================================

/// A scriptable `ProgressService` that records every push and quiz
/// submission it receives.
#[derive(Default)]
pub struct StubProgress {
    prior: Mutex<Option<ReadingProgress>>,
    fail_push: AtomicBool,
    pub pushes: Mutex<Vec<(usize, u64, bool)>>,
    pub quiz_submissions: Mutex<Vec<QuizResult>>,
}

impl StubProgress {
    pub fn with_prior(progress: ReadingProgress) -> Self {
        let stub = Self::default();
        *stub.prior.lock().unwrap() = Some(progress);
        stub
    }

    pub fn set_fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    pub fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }

    pub fn submission_count(&self) -> usize {
        self.quiz_submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl ProgressService for StubProgress {
    async fn fetch(&self, _token: &str, _document_id: Uuid) -> PortResult<Option<ReadingProgress>> {
        Ok(*self.prior.lock().unwrap())
    }

    async fn push(
        &self,
        _token: &str,
        _document_id: Uuid,
        last_page_reached: usize,
        additional_seconds: u64,
        is_completed: bool,
    ) -> PortResult<()> {
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("backend unreachable".to_string()));
        }
        self.pushes
            .lock()
            .unwrap()
            .push((last_page_reached, additional_seconds, is_completed));
        Ok(())
    }

    async fn submit_quiz(&self, _token: &str, result: &QuizResult) -> PortResult<()> {
        self.quiz_submissions.lock().unwrap().push(result.clone());
        Ok(())
    }
}

//=========================================================================================
// Narration
//=========================================================================================

/// A `NarrationService` whose backend is always down.
pub struct FailingNarrator;

#[async_trait]
impl NarrationService for FailingNarrator {
    async fn synthesize(&self, _text: &str) -> PortResult<Vec<u8>> {
        Err(PortError::Unexpected("synthesis backend offline".to_string()))
    }
}

/// A `NarrationService` that takes a while per sentence, for cancellation
/// tests.
pub struct SlowNarrator {
    pub delay: Duration,
}

#[async_trait]
impl NarrationService for SlowNarrator {
    async fn synthesize(&self, text: &str) -> PortResult<Vec<u8>> {
        tokio::time::sleep(self.delay).await;
        Ok(text.as_bytes().to_vec())
    }
}

/// A `QuizQueue` over a plain in-memory vector.
#[derive(Default)]
pub struct MemoryQueue {
    pending: Mutex<Vec<QuizResult>>,
}

impl MemoryQueue {
    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

#[async_trait]
impl QuizQueue for MemoryQueue {
    async fn enqueue(&self, result: &QuizResult) -> PortResult<()> {
        self.pending.lock().unwrap().push(result.clone());
        Ok(())
    }

    async fn take_pending(&self) -> PortResult<Vec<QuizResult>> {
        Ok(std::mem::take(&mut *self.pending.lock().unwrap()))
    }
}

//=========================================================================================
// Surface and Helpers
//=========================================================================================

/// A `RenderSurface` that keeps whatever was last presented.
#[derive(Default)]
pub struct TestSurface {
    pub presented: Option<PageBitmap>,
}

impl RenderSurface for TestSurface {
    fn present(&mut self, bitmap: &PageBitmap) {
        self.presented = Some(bitmap.clone());
    }
}

/// Engine options tuned for tests: heartbeat effectively disabled, a short
/// open budget, and the given render-window radius.
pub fn test_options(window_radius: usize) -> EngineOptions {
    EngineOptions {
        layout: LayoutMode::SinglePage,
        display_mode: DisplayMode::Windowed,
        window_radius,
        heartbeat_interval: Duration::from_secs(3600),
        open_timeout: Duration::from_secs(5),
        has_quiz: false,
    }
}

/// Drains everything currently sitting in the feedback channel.
pub fn drain_events(events: &mut UnboundedReceiver<FeedbackEvent>) -> Vec<FeedbackEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

/// Polls `condition` until it holds or the deadline passes. Background
/// write-through and window pre-rendering run on spawned tasks, so tests
/// observing their effects have to wait for them.
pub async fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let started = tokio::time::Instant::now();
    while started.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
