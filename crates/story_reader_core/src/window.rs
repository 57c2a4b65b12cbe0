//! crates/story_reader_core/src/window.rs
//!
//! Render-window planning: which pages around the active one are eligible
//! for eager rasterization. Pages outside the window stay blank placeholders
//! until they enter it.

/// Default window radius: the active page plus three neighbors either side.
pub const DEFAULT_WINDOW_RADIUS: usize = 3;

/// An inclusive, clamped range of page indices eligible for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderWindow {
    pub first: usize,
    pub last: usize,
}

impl RenderWindow {
    pub fn around(active: usize, radius: usize, page_count: usize) -> Self {
        let last_page = page_count.saturating_sub(1);
        Self {
            first: active.saturating_sub(radius),
            last: (active + radius).min(last_page),
        }
    }

    pub fn contains(&self, page: usize) -> bool {
        page >= self.first && page <= self.last
    }

    pub fn pages(&self) -> impl Iterator<Item = usize> {
        self.first..=self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn window_around_the_middle_of_a_document() {
        // 10 pages, active 5, radius 3: pages 2..=8 eligible, 0/1/9 not.
        let window = RenderWindow::around(5, 3, 10);
        assert_eq!(window, RenderWindow { first: 2, last: 8 });

        let eligible: Vec<usize> = window.pages().collect();
        assert_eq!(eligible, vec![2, 3, 4, 5, 6, 7, 8]);
        assert!(!window.contains(0));
        assert!(!window.contains(1));
        assert!(!window.contains(9));
    }

    #[test]
    fn window_is_clamped_at_both_document_edges() {
        let window = RenderWindow::around(0, 3, 10);
        assert_eq!(window, RenderWindow { first: 0, last: 3 });

        let window = RenderWindow::around(9, 3, 10);
        assert_eq!(window, RenderWindow { first: 6, last: 9 });
    }

    #[test]
    fn window_covers_short_documents_entirely() {
        let window = RenderWindow::around(1, 3, 2);
        assert_eq!(window, RenderWindow { first: 0, last: 1 });
    }
}
