pub mod progress_http;
pub mod source_images;
pub mod source_vector;
pub mod store;
pub mod tts;

pub use progress_http::HttpProgressService;
pub use source_images::{ImageSequenceSource, ManifestPage, StoryManifest};
pub use source_vector::{VectorDocumentSource, VectorPage, VectorShape};
pub use store::SqliteStore;
pub use tts::OpenAiNarrationAdapter;
