//! services/reader/src/bin/reader.rs
//!
//! A small terminal front-end for the story engine: opens a story manifest
//! and drives the reading session from stdin. Useful for exercising the
//! engine without a UI shell.

use async_openai::{
    config::OpenAIConfig,
    types::{SpeechModel, Voice},
    Client,
};
use reader_lib::{
    adapters::{HttpProgressService, ImageSequenceSource, OpenAiNarrationAdapter, SqliteStore},
    config::Config,
    engine::{EngineOptions, EngineServices, StoryEngine},
    error::EngineError,
    feedback::FeedbackEvent,
    sync::flush_queued_quizzes,
};
use std::sync::Arc;
use story_reader_core::domain::{DisplayMode, PageBitmap, ReaderIdentity};
use story_reader_core::flip::LayoutMode;
use story_reader_core::ports::{NarrationService, RenderSurface};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Reports what was drawn instead of displaying it.
struct TerminalSurface {
    rendered: Option<(u32, u32)>,
}

impl RenderSurface for TerminalSurface {
    fn present(&mut self, bitmap: &PageBitmap) {
        self.rendered = Some((bitmap.width, bitmap.height));
    }
}

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let manifest_path = std::env::args().nth(1).ok_or_else(|| {
        EngineError::Internal("usage: reader <story-manifest.json>".to_string())
    })?;

    // --- 2. Open the Device Store & Run Migrations ---
    info!("Opening the device store...");
    let store = Arc::new(SqliteStore::connect(&config.cache_database_url).await?);
    store.run_migrations().await?;

    // --- 3. Initialize Service Adapters ---
    let manifest_json = tokio::fs::read_to_string(&manifest_path).await?;
    let source = Arc::new(
        ImageSequenceSource::from_json(&manifest_json)
            .map_err(|e| EngineError::DocumentOpen(e.to_string()))?,
    );
    let has_quiz = source.has_quiz();

    let progress = Arc::new(HttpProgressService::new(&config.api_base_url));

    let narrator: Option<Arc<dyn NarrationService>> = match &config.openai_api_key {
        None => None,
        Some(key) => {
            let voice = match config.tts_voice.to_lowercase().as_str() {
                "alloy" => Voice::Alloy,
                "echo" => Voice::Echo,
                "fable" => Voice::Fable,
                "onyx" => Voice::Onyx,
                "nova" => Voice::Nova,
                "shimmer" => Voice::Shimmer,
                other => {
                    return Err(EngineError::Internal(format!(
                        "Invalid TTS voice specified in config: '{}'",
                        other
                    )))
                }
            };
            let client = Client::with_config(OpenAIConfig::new().with_api_key(key));
            Some(Arc::new(OpenAiNarrationAdapter::new(
                client,
                SpeechModel::Tts1,
                voice,
            )))
        }
    };

    let identity = match std::env::var("STORY_AUTH_TOKEN") {
        Ok(token) => ReaderIdentity::Authenticated { token },
        Err(_) => ReaderIdentity::Anonymous,
    };

    // A login means quiz results queued while anonymous can now be replayed.
    if let ReaderIdentity::Authenticated { token } = &identity {
        flush_queued_quizzes(progress.as_ref(), store.as_ref(), token).await;
    }

    // --- 4. Open the Reading Session ---
    let services = EngineServices {
        store: store.clone(),
        progress,
        quiz_queue: store,
        narrator,
    };
    let options =
        EngineOptions::from_config(&config, LayoutMode::SinglePage, DisplayMode::Windowed, has_quiz);
    let (engine, mut events) = StoryEngine::open(source, services, identity, options).await?;

    info!(
        "'{}' opened: {} pages (aspect {:.2})",
        engine.info().title,
        engine.info().page_count,
        engine.info().aspect_ratio
    );
    if let Some(page) = engine.resume_target() {
        info!("previous session reached page {page}; type 'r' to resume");
    }
    info!("commands: n(ext), p(rev), j <page>, r(esume), f(ullscreen), s(peak), m(usic), q(uit)");

    render_active_page(&engine).await;

    // --- 5. Drive the Reader from Stdin ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = events.recv() => match event {
                FeedbackEvent::NarrationAudio(audio) => info!("narration chunk: {} bytes", audio.len()),
                other => info!("cue: {other:?}"),
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => continue,
                    "q" => break,
                    "n" => { engine.next().await; }
                    "p" => { engine.prev().await; }
                    "r" => {
                        if engine.resume().await.is_none() {
                            info!("nothing to resume");
                        }
                    }
                    "f" => engine.set_display_mode(DisplayMode::Fullscreen),
                    "s" => engine.narrate_current_page().await,
                    "m" => { engine.feedback().toggle_music(); }
                    cmd => {
                        if let Some(raw) = cmd.strip_prefix("j ") {
                            match raw.trim().parse::<usize>() {
                                Ok(target) => { engine.jump_to(target).await; }
                                Err(_) => warn!("not a page number: '{raw}'"),
                            }
                        } else {
                            warn!("unknown command: '{cmd}'");
                        }
                    }
                }
                render_active_page(&engine).await;
            }
        }
    }

    // --- 6. Close the Session ---
    engine.close().await;
    Ok(())
}

async fn render_active_page(engine: &StoryEngine) {
    let page = engine.current_page();
    let mut surface = TerminalSurface { rendered: None };
    match engine.render_page_into(page, &mut surface).await {
        Ok(true) => {
            if let Some((width, height)) = surface.rendered {
                info!(
                    "page {}/{} rendered at {width}x{height}",
                    page + 1,
                    engine.info().page_count
                );
            }
        }
        Ok(false) => info!("page {page} is outside the render window"),
        Err(e) => warn!("{e}"),
    }
}
