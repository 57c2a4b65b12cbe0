//! services/reader/src/feedback.rs
//!
//! The ambient feedback controller: turns pagination and completion events
//! into sound/visual cues for the UI shell, and owns the narration and
//! background-music resources for one session. Everything started here is
//! guaranteed to stop when the session closes: `dispose()` cancels the
//! session token and runs on every exit path, including drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use story_reader_core::flip::FlipEvent;
use story_reader_core::ports::NarrationService;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Delay between the celebration and the quiz prompt, so the celebration
/// registers before the modal appears.
pub const QUIZ_PROMPT_DELAY: Duration = Duration::from_millis(1500);

/// Cues emitted to the UI shell. The shell owns actual playback and visuals;
/// the engine only decides when each cue fires.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackEvent {
    /// A page was flipped; play the short flip sound.
    PageTurn,
    /// The final page/spread was reached for the first time.
    Celebration { with_sound: bool },
    /// One-time completion notice.
    CompletionNotice,
    /// Present the document's quiz (fires `QUIZ_PROMPT_DELAY` after the
    /// celebration).
    QuizPrompt,
    /// One synthesized narration chunk, ready to play.
    NarrationAudio(Vec<u8>),
    /// Speech synthesis is unavailable; the narration toggle reverts to off.
    NarrationUnavailable,
    MusicStarted,
    MusicStopped,
}

struct NarrationHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

pub struct AmbientFeedback {
    events: UnboundedSender<FeedbackEvent>,
    muted: AtomicBool,
    music_on: AtomicBool,
    disposed: AtomicBool,
    has_quiz: bool,
    narrator: Option<Arc<dyn NarrationService>>,
    narration: Mutex<Option<NarrationHandle>>,
    /// Parent token for everything this controller spawns.
    session_token: CancellationToken,
}

impl AmbientFeedback {
    pub fn new(
        narrator: Option<Arc<dyn NarrationService>>,
        has_quiz: bool,
    ) -> (Arc<Self>, UnboundedReceiver<FeedbackEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Arc::new(Self {
            events,
            muted: AtomicBool::new(false),
            music_on: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            has_quiz,
            narrator,
            narration: Mutex::new(None),
            session_token: CancellationToken::new(),
        });
        (controller, receiver)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Reacts to a successful page transition. `animated` is false for
    /// direct jumps (resume, go-to-page), which skip the flip sound but
    /// still count for completion.
    pub fn on_transition(self: &Arc<Self>, event: &FlipEvent, animated: bool) {
        if animated && !self.is_muted() {
            self.emit(FeedbackEvent::PageTurn);
        }
        if event.reached_end {
            self.on_completion();
        }
    }

    /// Celebration, one-time notice, and (if the document has a quiz) a
    /// delayed quiz prompt. The flip engine guarantees this runs at most
    /// once per session.
    fn on_completion(self: &Arc<Self>) {
        self.emit(FeedbackEvent::Celebration {
            with_sound: !self.is_muted(),
        });
        self.emit(FeedbackEvent::CompletionNotice);

        if self.has_quiz {
            let controller = self.clone();
            let token = self.session_token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(QUIZ_PROMPT_DELAY) => {
                        controller.emit(FeedbackEvent::QuizPrompt);
                    }
                }
            });
        }
    }

    /// Flips background music on or off and returns the new state.
    pub fn toggle_music(&self) -> bool {
        let now_on = !self.music_on.load(Ordering::Relaxed);
        self.music_on.store(now_on, Ordering::Relaxed);
        self.emit(if now_on {
            FeedbackEvent::MusicStarted
        } else {
            FeedbackEvent::MusicStopped
        });
        now_on
    }

    /// Starts narrating the given page text, sentence by sentence. Any
    /// narration already running is cancelled first.
    pub fn start_narration(self: &Arc<Self>, text: String) {
        let Some(narrator) = self.narrator.clone() else {
            self.emit(FeedbackEvent::NarrationUnavailable);
            return;
        };

        self.stop_narration();

        let token = self.session_token.child_token();
        let events = self.events.clone();
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            for sentence in chunk_into_sentences(&text) {
                if task_token.is_cancelled() {
                    info!("narration cancelled");
                    return;
                }
                let audio = tokio::select! {
                    _ = task_token.cancelled() => return,
                    synthesized = narrator.synthesize(&sentence) => synthesized,
                };
                match audio {
                    Ok(audio) => {
                        if events.send(FeedbackEvent::NarrationAudio(audio)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        error!("speech synthesis failed: {e}");
                        let _ = events.send(FeedbackEvent::NarrationUnavailable);
                        return;
                    }
                }
            }
            info!("page narration finished");
        });

        *self.narration.lock().unwrap() = Some(NarrationHandle { token, task });
    }

    /// Surfaces a narration failure to the shell (toast + toggle reverts
    /// to off). Reading is unaffected.
    pub fn report_narration_failure(&self) {
        self.emit(FeedbackEvent::NarrationUnavailable);
    }

    /// Stops narration immediately. No orphaned playback: the synthesis
    /// task is cancelled and aborted.
    pub fn stop_narration(&self) {
        if let Some(handle) = self.narration.lock().unwrap().take() {
            handle.token.cancel();
            handle.task.abort();
        }
    }

    /// Tears down every resource this controller owns. Safe to call more
    /// than once; runs on drop as a backstop.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.session_token.cancel();
        self.stop_narration();
        if self.music_on.swap(false, Ordering::Relaxed) {
            let _ = self.events.send(FeedbackEvent::MusicStopped);
        }
    }

    fn emit(&self, event: FeedbackEvent) {
        // The shell dropping its receiver just means nobody is listening.
        let _ = self.events.send(event);
    }
}

impl Drop for AmbientFeedback {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A helper function to split narration text into sentences. Each sentence
/// keeps its own terminator so questions and exclamations are voiced as
/// such.
fn chunk_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '?' | '!') {
            let sentence = current.trim();
            if sentence.chars().any(char::is_alphanumeric) {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if tail.chars().any(char::is_alphanumeric) {
        sentences.push(format!("{tail}."));
    }
    sentences
}
