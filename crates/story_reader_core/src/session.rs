//! crates/story_reader_core/src/session.rs
//!
//! The reading session: one struct tying the reader identity's position,
//! accumulated active time and completion flag together, with a single
//! update entry point per event type so the invariants live in one place.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::HeartbeatPayload;
use crate::flip::FlipEvent;

/// How often the synchronizer wakes to consider a heartbeat.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// A heartbeat is skipped unless at least this much active time accumulated
/// since the last successful one. Filters out timer jitter.
pub const MIN_HEARTBEAT_SECS: u64 = 5;

/// Mutable reading state for one open document.
#[derive(Debug)]
pub struct ReadingSession {
    document_id: Uuid,
    current_page: usize,
    last_persisted_page: usize,
    /// Active seconds accumulated since the last successful heartbeat.
    active_seconds: f64,
    is_completed: bool,
    started_at: DateTime<Utc>,
}

impl ReadingSession {
    pub fn new(document_id: Uuid, starting_page: usize, already_completed: bool) -> Self {
        Self {
            document_id,
            current_page: starting_page,
            last_persisted_page: starting_page,
            active_seconds: 0.0,
            is_completed: already_completed,
            started_at: Utc::now(),
        }
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn last_persisted_page(&self) -> usize {
        self.last_persisted_page
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Applies a successful page transition.
    pub fn record_flip(&mut self, event: &FlipEvent) {
        self.current_page = event.to;
        if event.reached_end {
            self.is_completed = true;
        }
    }

    /// Adds active reading time observed by the engine's clock.
    pub fn accrue(&mut self, seconds: f64) {
        self.active_seconds += seconds;
    }

    /// Returns the payload for the next heartbeat, or `None` when not enough
    /// active time has accumulated. Does not mutate: the synchronizer calls
    /// `confirm_persisted` only after the push succeeded, so a failed push
    /// leaves the accumulated time in place for the next tick.
    pub fn heartbeat_due(&self) -> Option<HeartbeatPayload> {
        let whole_seconds = self.active_seconds.floor() as u64;
        if whole_seconds < MIN_HEARTBEAT_SECS {
            return None;
        }
        Some(HeartbeatPayload {
            last_page_reached: self.current_page,
            additional_seconds: whole_seconds,
            is_completed: self.is_completed,
        })
    }

    /// Acknowledges a successfully persisted heartbeat.
    pub fn confirm_persisted(&mut self, payload: &HeartbeatPayload) {
        self.active_seconds -= payload.additional_seconds as f64;
        if self.active_seconds < 0.0 {
            self.active_seconds = 0.0;
        }
        self.last_persisted_page = payload.last_page_reached;
    }
}
