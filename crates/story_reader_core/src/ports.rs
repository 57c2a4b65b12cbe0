//! crates/story_reader_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the reader engine.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like the
//! device store, the progress backend, or the speech synthesizer.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::domain::{DocumentInfo, PageBitmap, QuizResult, ReadingProgress};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (device
/// store, network, decoders).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A paginated content source. Implementations exist for pre-rasterized
/// image sequences and for vector pages rendered on demand; the engine
/// treats both uniformly through this trait.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Document identity and shape. Called once when the session opens.
    async fn info(&self) -> PortResult<DocumentInfo>;

    /// Decode one page (0-based) at the given resolution multiplier.
    /// Must be safely callable multiple times for the same page.
    async fn rasterize_page(&self, page: usize, scale: f32) -> PortResult<PageBitmap>;

    /// Narration text for one page, if the document carries any.
    async fn page_text(&self, page: usize) -> PortResult<Option<String>>;
}

/// The persistent cache tier: a per-device key-value store that survives
/// reloads. Keys are derived from `(document, page, scale_tag)`.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Returns the stored bytes for this page, or `None` on a miss.
    /// An entry recorded at a different scale tag is a miss.
    async fn load(
        &self,
        document_id: Uuid,
        page: usize,
        scale_tag: u16,
    ) -> PortResult<Option<Bytes>>;

    async fn store(
        &self,
        document_id: Uuid,
        page: usize,
        scale_tag: u16,
        bytes: Bytes,
    ) -> PortResult<()>;
}

/// The remote progress-persistence endpoints.
#[async_trait]
pub trait ProgressService: Send + Sync {
    /// Fetch prior progress for an authenticated identity, if any exists.
    async fn fetch(&self, token: &str, document_id: Uuid) -> PortResult<Option<ReadingProgress>>;

    /// Persist one heartbeat. Fire-and-forget from the engine's perspective:
    /// failures are logged by the caller, never retried.
    async fn push(
        &self,
        token: &str,
        document_id: Uuid,
        last_page_reached: usize,
        additional_seconds: u64,
        is_completed: bool,
    ) -> PortResult<()>;

    /// Report a quiz outcome for an authenticated identity.
    async fn submit_quiz(&self, token: &str, result: &QuizResult) -> PortResult<()>;
}

/// Local queue for quiz results recorded while anonymous. Drained exactly
/// once when the identity authenticates.
#[async_trait]
pub trait QuizQueue: Send + Sync {
    async fn enqueue(&self, result: &QuizResult) -> PortResult<()>;

    /// Removes and returns everything currently queued, atomically, so that
    /// two concurrent flushes cannot both observe the same results.
    async fn take_pending(&self) -> PortResult<Vec<QuizResult>>;
}

/// Speech synthesis for narration.
#[async_trait]
pub trait NarrationService: Send + Sync {
    /// Generates audio data from a string of text.
    async fn synthesize(&self, text: &str) -> PortResult<Vec<u8>>;
}

/// A caller-supplied drawable surface. The engine draws decoded pages into
/// it; the UI shell owns displaying it. Presenting replaces the previous
/// contents wholesale, so a failed render simply never presents.
pub trait RenderSurface: Send {
    fn present(&mut self, bitmap: &PageBitmap);
}
