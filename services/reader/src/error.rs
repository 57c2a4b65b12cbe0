//! services/reader/src/error.rs
//!
//! Defines the primary error type for the reader engine.
//!
//! Only document-open failures are fatal to a session; everything else is
//! contained to its subsystem and degrades gracefully (skip, log, continue).

use crate::config::ConfigError;
use story_reader_core::ports::PortError;

/// The primary error type for the `reader` engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying device-store library.
    #[error("Store Error: {0}")]
    Store(#[from] sqlx::Error),

    /// Represents a standard Input/Output error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document source was unreachable or corrupt. Fatal to the session.
    #[error("Document failed to open: {0}")]
    DocumentOpen(String),

    /// The document did not open within the timeout budget. Treated
    /// identically to `DocumentOpen`.
    #[error("Document open timed out after {0:?}")]
    DocumentOpenTimeout(std::time::Duration),

    /// A single page failed to rasterize. The session continues; the user
    /// may flip past it.
    #[error("Page {page} failed to render: {reason}")]
    PageRender { page: usize, reason: String },

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
