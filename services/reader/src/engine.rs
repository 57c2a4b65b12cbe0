//! services/reader/src/engine.rs
//!
//! The story engine: owns one reading session end to end. It opens the
//! document (under a timeout), wires the cache/scheduler/synchronizer/
//! feedback subsystems together, applies page transitions, and guarantees
//! teardown of everything it started when the session closes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use story_reader_core::domain::{DisplayMode, DocumentInfo, QuizResult, ReaderIdentity};
use story_reader_core::flip::{FlipEngine, FlipEvent, LayoutMode};
use story_reader_core::ports::{
    DocumentSource, NarrationService, PageStore, ProgressService, QuizQueue, RenderSurface,
};
use story_reader_core::session::ReadingSession;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::PageCache;
use crate::config::Config;
use crate::error::EngineError;
use crate::feedback::{AmbientFeedback, FeedbackEvent};
use crate::scheduler::RenderScheduler;
use crate::sync::ProgressSynchronizer;

/// The concrete ports one session runs against.
pub struct EngineServices {
    pub store: Arc<dyn PageStore>,
    pub progress: Arc<dyn ProgressService>,
    pub quiz_queue: Arc<dyn QuizQueue>,
    pub narrator: Option<Arc<dyn NarrationService>>,
}

/// Per-session tuning, usually derived from `Config`.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub layout: LayoutMode,
    pub display_mode: DisplayMode,
    pub window_radius: usize,
    pub heartbeat_interval: Duration,
    pub open_timeout: Duration,
    /// Whether the document has an associated quiz to prompt on completion.
    pub has_quiz: bool,
}

impl EngineOptions {
    pub fn from_config(
        config: &Config,
        layout: LayoutMode,
        display_mode: DisplayMode,
        has_quiz: bool,
    ) -> Self {
        Self {
            layout,
            display_mode,
            window_radius: config.window_radius,
            heartbeat_interval: config.heartbeat_interval,
            open_timeout: config.open_timeout,
            has_quiz,
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            layout: LayoutMode::SinglePage,
            display_mode: DisplayMode::Windowed,
            window_radius: story_reader_core::window::DEFAULT_WINDOW_RADIUS,
            heartbeat_interval: Duration::from_secs(story_reader_core::session::HEARTBEAT_INTERVAL_SECS),
            open_timeout: Duration::from_secs(20),
            has_quiz: false,
        }
    }
}

pub struct StoryEngine {
    info: DocumentInfo,
    source: Arc<dyn DocumentSource>,
    display_mode: Mutex<DisplayMode>,
    flip: Mutex<FlipEngine>,
    session: Arc<tokio::sync::Mutex<ReadingSession>>,
    scheduler: Arc<RenderScheduler>,
    feedback: Arc<AmbientFeedback>,
    sync: Arc<ProgressSynchronizer>,
    resume_target: Option<usize>,
    heartbeat_token: CancellationToken,
    // Held so the loop is tied to the session's lifetime; the token is what
    // actually stops it.
    _heartbeat_task: JoinHandle<()>,
}

impl StoryEngine {
    /// Opens a reading session. Fatal only when the document itself cannot
    /// be opened within the timeout budget; prior-progress fetch failures
    /// degrade to "start from the beginning".
    pub async fn open(
        source: Arc<dyn DocumentSource>,
        services: EngineServices,
        identity: ReaderIdentity,
        options: EngineOptions,
    ) -> Result<(Self, UnboundedReceiver<FeedbackEvent>), EngineError> {
        // --- 1. Open the document, bounded by the timeout budget ---
        let info = match tokio::time::timeout(options.open_timeout, source.info()).await {
            Err(_) => return Err(EngineError::DocumentOpenTimeout(options.open_timeout)),
            Ok(Err(e)) => return Err(EngineError::DocumentOpen(e.to_string())),
            Ok(Ok(info)) => info,
        };
        info!(
            document_id = %info.id,
            pages = info.page_count,
            "opened document '{}'",
            info.title
        );

        // --- 2. Fetch prior progress (authenticated identities only) ---
        let sync = Arc::new(ProgressSynchronizer::new(
            identity,
            info.id,
            services.progress,
            services.quiz_queue,
        ));
        let prior = sync.fetch_prior().await;
        let already_completed = prior.map(|p| p.is_completed).unwrap_or(false);
        let resume_target = prior
            .map(|p| p.last_page_reached)
            .filter(|&page| page > 0 && page < info.page_count);

        // --- 3. Build the session state and render plumbing ---
        let flip = FlipEngine::new(info.page_count, options.layout, already_completed);
        let session = Arc::new(tokio::sync::Mutex::new(ReadingSession::new(
            info.id,
            0,
            already_completed,
        )));
        let cache = Arc::new(PageCache::new(info.id, services.store));
        let scheduler = Arc::new(RenderScheduler::new(
            source.clone(),
            cache,
            info.page_count,
            options.window_radius,
        ));
        let (feedback, events) = AmbientFeedback::new(services.narrator, options.has_quiz);

        // --- 4. Start the heartbeat loop ---
        let heartbeat_token = CancellationToken::new();
        let heartbeat_task = sync.clone().spawn_heartbeat_loop(
            session.clone(),
            options.heartbeat_interval,
            heartbeat_token.clone(),
        );

        // --- 5. Pre-render the opening window ---
        scheduler.schedule_window(0, options.display_mode);

        Ok((
            Self {
                info,
                source,
                display_mode: Mutex::new(options.display_mode),
                flip: Mutex::new(flip),
                session,
                scheduler,
                feedback,
                sync,
                resume_target,
                heartbeat_token,
                _heartbeat_task: heartbeat_task,
            },
            events,
        ))
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    pub fn current_page(&self) -> usize {
        self.flip.lock().unwrap().index()
    }

    pub fn display_mode(&self) -> DisplayMode {
        *self.display_mode.lock().unwrap()
    }

    /// Prior progress to offer as a "continue reading?" affordance. Never
    /// applied automatically; the shell calls `resume()` if the user accepts.
    pub fn resume_target(&self) -> Option<usize> {
        self.resume_target
    }

    /// Mute/music/narration controls for the shell.
    pub fn feedback(&self) -> &Arc<AmbientFeedback> {
        &self.feedback
    }

    /// Flip forward one page. Returns the (possibly unchanged) active index.
    pub async fn next(&self) -> usize {
        self.apply_transition(|flip| flip.next(), true).await
    }

    /// Flip back one page.
    pub async fn prev(&self) -> usize {
        self.apply_transition(|flip| flip.prev(), true).await
    }

    /// Direct jump: no flip animation, so no flip sound, but completion
    /// semantics still apply.
    pub async fn jump_to(&self, target: usize) -> usize {
        self.apply_transition(|flip| flip.jump_to(target), false).await
    }

    /// Applies the resume affordance, if there is one.
    pub async fn resume(&self) -> Option<usize> {
        let target = self.resume_target?;
        Some(self.jump_to(target).await)
    }

    async fn apply_transition(
        &self,
        transition: impl FnOnce(&mut FlipEngine) -> Option<FlipEvent>,
        animated: bool,
    ) -> usize {
        let event = { transition(&mut self.flip.lock().unwrap()) };
        let Some(event) = event else {
            return self.current_page();
        };

        self.session.lock().await.record_flip(&event);
        self.feedback.on_transition(&event, animated);
        self.scheduler.schedule_window(event.to, self.display_mode());
        event.to
    }

    /// Draws one page into the caller's surface. Returns `Ok(false)` when
    /// the page is outside the render window (it stays a blank placeholder
    /// until it enters). A failed render leaves the surface untouched and
    /// does not abort the session.
    pub async fn render_page_into(
        &self,
        page: usize,
        surface: &mut dyn RenderSurface,
    ) -> Result<bool, EngineError> {
        if !self.scheduler.window_for(self.current_page()).contains(page) {
            return Ok(false);
        }
        self.scheduler
            .render_into(page, self.display_mode(), surface)
            .await
            .map(|_| true)
            .map_err(|e| EngineError::PageRender {
                page,
                reason: e.to_string(),
            })
    }

    /// Switches display mode (e.g. entering fullscreen). In-window pages are
    /// re-rendered at the new scale; out-of-window pages re-render lazily
    /// when they next enter the window.
    pub fn set_display_mode(&self, mode: DisplayMode) {
        *self.display_mode.lock().unwrap() = mode;
        self.scheduler.schedule_window(self.current_page(), mode);
    }

    /// Starts narrating the active page, if the document carries text for it.
    pub async fn narrate_current_page(&self) {
        let page = self.current_page();
        match self.source.page_text(page).await {
            Ok(Some(text)) => self.feedback.start_narration(text),
            Ok(None) => info!(page, "no narration text for this page"),
            Err(e) => {
                warn!(page, "failed to load narration text: {e}");
                self.feedback.report_narration_failure();
            }
        }
    }

    /// Reports a quiz outcome for this document, honoring the identity
    /// policy (remote when authenticated, queued locally when anonymous).
    pub async fn submit_quiz(&self, score: u32, total: u32) {
        self.sync
            .submit_quiz(QuizResult {
                document_id: self.info.id,
                score,
                total,
                recorded_at: Utc::now(),
            })
            .await;
    }

    /// Closes the session. The heartbeat loop is told to stop; a heartbeat
    /// already in flight may complete or fail silently. All audio/speech
    /// resources are released.
    pub async fn close(self) {
        self.heartbeat_token.cancel();
        self.feedback.dispose();
        info!(document_id = %self.info.id, "reading session closed");
    }
}

impl Drop for StoryEngine {
    fn drop(&mut self) {
        // Backstop for navigation-away paths that never call close().
        self.heartbeat_token.cancel();
        self.feedback.dispose();
    }
}
