//! services/reader/src/adapters/source_images.rs
//!
//! Document source for pre-rasterized stories: an ordered sequence of
//! per-page image locations (http URLs or local paths), decoded and resized
//! to the requested scale on demand. Implements the `DocumentSource` port.

use async_trait::async_trait;
use bytes::Bytes;
use image::imageops::FilterType;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use story_reader_core::domain::{DocumentInfo, PageBitmap};
use story_reader_core::ports::{DocumentSource, PortError, PortResult};
use tokio::sync::OnceCell;
use uuid::Uuid;

/// The published shape of one story: identity plus ordered page images,
/// each with optional narration text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryManifest {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub has_quiz: bool,
    pub pages: Vec<ManifestPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPage {
    pub image: String,
    #[serde(default)]
    pub text: Option<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct ImageSequenceSource {
    manifest: StoryManifest,
    client: Client,
    /// Native aspect ratio of page 1, computed once on open.
    aspect_ratio: OnceCell<f32>,
}

impl ImageSequenceSource {
    pub fn new(manifest: StoryManifest) -> Self {
        Self {
            manifest,
            client: Client::new(),
            aspect_ratio: OnceCell::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn has_quiz(&self) -> bool {
        self.manifest.has_quiz
    }

    async fn fetch_bytes(&self, location: &str) -> PortResult<Vec<u8>> {
        if location.starts_with("http://") || location.starts_with("https://") {
            let response = self
                .client
                .get(location)
                .send()
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .error_for_status()
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            Ok(bytes.to_vec())
        } else {
            tokio::fs::read(location)
                .await
                .map_err(|e| PortError::Unexpected(format!("failed to read '{location}': {e}")))
        }
    }

    async fn decode_page(&self, page: usize) -> PortResult<image::DynamicImage> {
        let entry = self
            .manifest
            .pages
            .get(page)
            .ok_or_else(|| PortError::NotFound(format!("page {page}")))?;
        let raw = self.fetch_bytes(&entry.image).await?;
        image::load_from_memory(&raw)
            .map_err(|e| PortError::Unexpected(format!("failed to decode page {page}: {e}")))
    }
}

//=========================================================================================
// `DocumentSource` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentSource for ImageSequenceSource {
    async fn info(&self) -> PortResult<DocumentInfo> {
        if self.manifest.pages.is_empty() {
            return Err(PortError::Unexpected(
                "story manifest has no pages".to_string(),
            ));
        }

        // Decoding page 1 up front gives the shell a correctly shaped
        // viewport before any other page loads.
        let aspect_ratio = self
            .aspect_ratio
            .get_or_try_init(|| async {
                let first = self.decode_page(0).await?;
                Ok::<f32, PortError>(first.width() as f32 / first.height().max(1) as f32)
            })
            .await?;

        Ok(DocumentInfo {
            id: self.manifest.id,
            title: self.manifest.title.clone(),
            page_count: self.manifest.pages.len(),
            aspect_ratio: *aspect_ratio,
        })
    }

    async fn rasterize_page(&self, page: usize, scale: f32) -> PortResult<PageBitmap> {
        let decoded = self.decode_page(page).await?;
        let width = ((decoded.width() as f32 * scale).round() as u32).max(1);
        let height = ((decoded.height() as f32 * scale).round() as u32).max(1);

        let resized = decoded
            .resize_exact(width, height, FilterType::CatmullRom)
            .to_rgba8();
        Ok(PageBitmap {
            width,
            height,
            pixels: Bytes::from(resized.into_raw()),
        })
    }

    async fn page_text(&self, page: usize) -> PortResult<Option<String>> {
        Ok(self
            .manifest
            .pages
            .get(page)
            .and_then(|entry| entry.text.clone()))
    }
}
