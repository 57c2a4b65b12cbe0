//! services/reader/src/lib.rs
//!
//! The storybook reader engine: progressive page rendering over a two-tier
//! cache, flip/pagination state, heartbeat-based progress synchronization,
//! and ambient feedback (sounds, narration, celebration) for one reading
//! session. The UI shell embeds this library and owns all visual chrome.

pub mod adapters;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod scheduler;
pub mod sync;

pub use engine::{EngineOptions, EngineServices, StoryEngine};
pub use error::EngineError;
pub use feedback::FeedbackEvent;
