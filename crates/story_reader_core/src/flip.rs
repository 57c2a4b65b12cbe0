//! crates/story_reader_core/src/flip.rs
//!
//! The flip/pagination engine: a small state machine owning the current
//! page index. Transitions are strictly ordered by caller input and each
//! successful one produces a `FlipEvent`; completion is reported exactly
//! once per session.

/// Page layout of the embedding reader surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// One page per view (narrow viewports).
    SinglePage,
    /// Two-page spread. The final spread begins two pages before the last,
    /// so "the end" is reached earlier.
    Spread,
}

impl LayoutMode {
    fn is_end(self, index: usize, page_count: usize) -> bool {
        match self {
            LayoutMode::SinglePage => index == page_count - 1,
            LayoutMode::Spread => index + 2 >= page_count,
        }
    }
}

/// Emitted for every successful transition. `reached_end` is true only the
/// first time the session arrives at the final page/spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlipEvent {
    pub from: usize,
    pub to: usize,
    pub reached_end: bool,
}

/// Owns `index ∈ [0, page_count)` and the completion-once guard.
#[derive(Debug)]
pub struct FlipEngine {
    page_count: usize,
    index: usize,
    layout: LayoutMode,
    finished: bool,
}

impl FlipEngine {
    /// `already_finished` carries a prior session's completion flag so that
    /// flipping around a finished book never re-triggers the celebration.
    pub fn new(page_count: usize, layout: LayoutMode, already_finished: bool) -> Self {
        Self {
            // A document always has at least one page.
            page_count: page_count.max(1),
            index: 0,
            layout,
            finished: already_finished,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn layout(&self) -> LayoutMode {
        self.layout
    }

    pub fn has_finished(&self) -> bool {
        self.finished
    }

    /// Whether the current index sits on the final page/spread.
    pub fn at_end(&self) -> bool {
        self.layout.is_end(self.index, self.page_count)
    }

    /// Advance one page, clamped. Returns `None` when already at the last page.
    pub fn next(&mut self) -> Option<FlipEvent> {
        self.transition((self.index + 1).min(self.page_count - 1))
    }

    /// Go back one page, clamped. Returns `None` when already at page 0.
    pub fn prev(&mut self) -> Option<FlipEvent> {
        self.transition(self.index.saturating_sub(1))
    }

    /// Jump straight to `target` (clamped to the valid range).
    pub fn jump_to(&mut self, target: usize) -> Option<FlipEvent> {
        self.transition(target.min(self.page_count - 1))
    }

    fn transition(&mut self, to: usize) -> Option<FlipEvent> {
        if to == self.index {
            return None;
        }
        let from = self.index;
        self.index = to;

        let reached_end = self.layout.is_end(to, self.page_count) && !self.finished;
        if reached_end {
            self.finished = true;
        }
        Some(FlipEvent {
            from,
            to,
            reached_end,
        })
    }
}
