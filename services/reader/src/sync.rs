//! services/reader/src/sync.rs
//!
//! The progress synchronizer: periodically reconciles the local reading
//! session with the remote persistence endpoint. Authenticated identities
//! heartbeat to the backend; anonymous identities queue terminal events
//! (quiz results) locally until a login flushes them.

use std::sync::Arc;
use std::time::Duration;

use story_reader_core::domain::{QuizResult, ReaderIdentity, ReadingProgress};
use story_reader_core::ports::{ProgressService, QuizQueue};
use story_reader_core::session::ReadingSession;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

pub struct ProgressSynchronizer {
    identity: ReaderIdentity,
    document_id: Uuid,
    progress: Arc<dyn ProgressService>,
    queue: Arc<dyn QuizQueue>,
}

impl ProgressSynchronizer {
    pub fn new(
        identity: ReaderIdentity,
        document_id: Uuid,
        progress: Arc<dyn ProgressService>,
        queue: Arc<dyn QuizQueue>,
    ) -> Self {
        Self {
            identity,
            document_id,
            progress,
            queue,
        }
    }

    /// Fetches prior progress for this document, if the identity is
    /// authenticated and any exists. Failures are logged and treated as
    /// "no prior progress".
    pub async fn fetch_prior(&self) -> Option<ReadingProgress> {
        let ReaderIdentity::Authenticated { token } = &self.identity else {
            return None;
        };
        match self.progress.fetch(token, self.document_id).await {
            Ok(prior) => prior,
            Err(e) => {
                warn!("failed to fetch prior progress: {e}");
                None
            }
        }
    }

    /// Considers one heartbeat. Skipped when anonymous or when too little
    /// active time accumulated since the last successful push. A failed push
    /// is logged and swallowed; the session keeps its accumulated time so
    /// the next tick retries naturally.
    pub async fn heartbeat_tick(&self, session: &Mutex<ReadingSession>) {
        let ReaderIdentity::Authenticated { token } = &self.identity else {
            return;
        };

        let payload = { session.lock().await.heartbeat_due() };
        let Some(payload) = payload else {
            return;
        };

        let pushed = self
            .progress
            .push(
                token,
                self.document_id,
                payload.last_page_reached,
                payload.additional_seconds,
                payload.is_completed,
            )
            .await;

        match pushed {
            Ok(()) => session.lock().await.confirm_persisted(&payload),
            Err(e) => warn!("progress heartbeat failed: {e}"),
        }
    }

    /// Reports a quiz outcome: straight to the backend when authenticated,
    /// into the local device queue when anonymous.
    pub async fn submit_quiz(&self, result: QuizResult) {
        match &self.identity {
            ReaderIdentity::Authenticated { token } => {
                if let Err(e) = self.progress.submit_quiz(token, &result).await {
                    warn!("quiz submission failed: {e}");
                }
            }
            ReaderIdentity::Anonymous => {
                if let Err(e) = self.queue.enqueue(&result).await {
                    warn!("failed to queue quiz result locally: {e}");
                }
            }
        }
    }

    /// The long-running heartbeat task. Accrues wall-clock active time into
    /// the session on every tick and then considers a push. Cancelled via
    /// the token on session close; an in-flight push is allowed to finish
    /// or fail silently.
    pub fn spawn_heartbeat_loop(
        self: Arc<Self>,
        session: Arc<Mutex<ReadingSession>>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; consume it so the loop
            // waits a full interval before the first heartbeat.
            ticker.tick().await;
            let mut last_tick = tokio::time::Instant::now();

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("heartbeat loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let elapsed = last_tick.elapsed().as_secs_f64();
                        last_tick = tokio::time::Instant::now();
                        session.lock().await.accrue(elapsed);
                        self.heartbeat_tick(&session).await;
                    }
                }
            }
        })
    }
}

/// Drains quiz results queued while anonymous and replays them against the
/// backend. The queue hands its contents over atomically, so running this
/// twice after a single login cannot double-submit. Returns the number of
/// results synced.
pub async fn flush_queued_quizzes(
    progress: &dyn ProgressService,
    queue: &dyn QuizQueue,
    token: &str,
) -> usize {
    let pending = match queue.take_pending().await {
        Ok(pending) => pending,
        Err(e) => {
            warn!("failed to drain the local quiz queue: {e}");
            return 0;
        }
    };

    let mut synced = 0;
    for result in &pending {
        match progress.submit_quiz(token, result).await {
            Ok(()) => synced += 1,
            Err(e) => warn!(
                document_id = %result.document_id,
                "failed to replay a queued quiz result: {e}"
            ),
        }
    }
    if synced > 0 {
        info!("replayed {synced} queued quiz result(s)");
    }
    synced
}
