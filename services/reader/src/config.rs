//! services/reader/src/config.rs
//!
//! Defines the engine's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The
//! `.env` file is used for local development.

use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub cache_database_url: String,
    pub log_level: Level,
    pub heartbeat_interval: Duration,
    pub open_timeout: Duration,
    pub window_radius: usize,
    pub openai_api_key: Option<String>,
    pub tts_voice: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for
    /// development, but this is skipped in test environments to ensure tests
    /// are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Backend and Store Settings ---
        let api_base_url = std::env::var("STORY_API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let cache_database_url = std::env::var("CACHE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://storybook-cache.db?mode=rwc".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Reader Tuning Knobs ---
        let heartbeat_interval = Duration::from_secs(parse_var("HEARTBEAT_SECS", 30)?);
        let open_timeout = Duration::from_secs(parse_var("OPEN_TIMEOUT_SECS", 20)?);
        let window_radius = parse_var("RENDER_WINDOW_RADIUS", 3)? as usize;

        // --- Load Narration Settings (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let tts_voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "alloy".to_string());

        Ok(Self {
            api_base_url,
            cache_database_url,
            log_level,
            heartbeat_interval,
            open_timeout,
            window_radius,
            openai_api_key,
            tts_voice,
        })
    }
}

fn parse_var(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
    }
}
