//! crates/story_reader_core/src/domain.rs
//!
//! Defines the pure, core data structures for the reader engine.
//! These structs are independent of any storage or transport format.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity and shape of one opened document. Immutable for the lifetime
/// of a reading session.
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub id: Uuid,
    pub title: String,
    pub page_count: usize,
    /// Width / height of page 1, used to size the viewport before any
    /// other page has been rasterized.
    pub aspect_ratio: f32,
}

/// The display mode the UI shell is currently in. Each mode maps to a
/// rasterization scale; changing mode invalidates memory-tier cache entries
/// through the scale tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Mobile,
    Windowed,
    Fullscreen,
}

impl DisplayMode {
    /// Resolution multiplier applied when rasterizing a page.
    pub fn scale(self) -> f32 {
        match self {
            DisplayMode::Mobile => 1.15,
            DisplayMode::Windowed => 1.55,
            DisplayMode::Fullscreen => 2.1,
        }
    }

    /// Integer tag used in cache keys. A cached page is only valid for the
    /// exact scale it was rendered at.
    pub fn scale_tag(self) -> u16 {
        (self.scale() * 100.0).round() as u16
    }
}

/// A decoded raster surface for one page at one scale.
#[derive(Debug, Clone)]
pub struct PageBitmap {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major, `width * height * 4` bytes.
    pub pixels: Bytes,
}

/// The per-user, per-document progress record held by the remote service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub last_page_reached: usize,
    pub is_completed: bool,
}

/// One heartbeat payload, produced by `ReadingSession::heartbeat_due`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub last_page_reached: usize,
    /// Whole seconds of active reading since the previous heartbeat,
    /// floor-rounded.
    pub additional_seconds: u64,
    pub is_completed: bool,
}

/// A quiz outcome tied to a document. Queued locally when the reader is
/// anonymous and replayed once on authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub document_id: Uuid,
    pub score: u32,
    pub total: u32,
    pub recorded_at: DateTime<Utc>,
}

/// Who is reading. Authenticated identities persist progress remotely;
/// anonymous identities only queue terminal events locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderIdentity {
    Anonymous,
    Authenticated { token: String },
}

impl ReaderIdentity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, ReaderIdentity::Authenticated { .. })
    }
}
