pub mod domain;
pub mod flip;
pub mod ports;
pub mod session;
pub mod window;

pub use domain::{
    DisplayMode, DocumentInfo, HeartbeatPayload, PageBitmap, QuizResult, ReaderIdentity,
    ReadingProgress,
};
pub use flip::{FlipEngine, FlipEvent, LayoutMode};
pub use ports::{
    DocumentSource, NarrationService, PageStore, PortError, PortResult, ProgressService, QuizQueue,
    RenderSurface,
};
pub use session::{ReadingSession, HEARTBEAT_INTERVAL_SECS, MIN_HEARTBEAT_SECS};
pub use window::{RenderWindow, DEFAULT_WINDOW_RADIUS};
