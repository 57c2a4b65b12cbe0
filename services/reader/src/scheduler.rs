//! services/reader/src/scheduler.rs
//!
//! The render scheduler: decides which pages to rasterize for the current
//! render window, serves repeats from the two-tier cache, and de-duplicates
//! concurrent rasterization requests per (page, scale) so rapid flipping
//! never starts a redundant decode.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use story_reader_core::domain::{DisplayMode, PageBitmap};
use story_reader_core::ports::{DocumentSource, RenderSurface};
use story_reader_core::window::RenderWindow;
use tracing::warn;

use crate::cache::PageCache;

/// A render failure for one page. Cloneable so overlapping callers awaiting
/// the same in-flight request all observe it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct RenderFailure(pub String);

type InFlight = Shared<BoxFuture<'static, Result<Bytes, RenderFailure>>>;

pub struct RenderScheduler {
    source: Arc<dyn DocumentSource>,
    cache: Arc<PageCache>,
    page_count: usize,
    radius: usize,
    in_flight: Mutex<HashMap<(usize, u16), InFlight>>,
}

impl RenderScheduler {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        cache: Arc<PageCache>,
        page_count: usize,
        radius: usize,
    ) -> Self {
        Self {
            source,
            cache,
            page_count,
            radius,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn window_for(&self, active: usize) -> RenderWindow {
        RenderWindow::around(active, self.radius, self.page_count)
    }

    /// Returns the encoded bytes for one page at the mode's scale: from the
    /// cache when possible, otherwise rasterized once no matter how many
    /// callers ask concurrently.
    pub async fn obtain_page(&self, page: usize, mode: DisplayMode) -> Result<Bytes, RenderFailure> {
        if page >= self.page_count {
            return Err(RenderFailure(format!(
                "page {page} out of range (document has {} pages)",
                self.page_count
            )));
        }

        let scale_tag = mode.scale_tag();
        if let Some(hit) = self.cache.get(page, scale_tag).await {
            return Ok(hit);
        }

        let key = (page, scale_tag);
        let request = {
            let mut in_flight = self.in_flight.lock().unwrap();
            match in_flight.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let source = self.source.clone();
                    let cache = self.cache.clone();
                    let scale = mode.scale();
                    let request: InFlight = async move {
                        let bitmap = source
                            .rasterize_page(page, scale)
                            .await
                            .map_err(|e| RenderFailure(e.to_string()))?;
                        let encoded = encode_bitmap(&bitmap)?;
                        cache.put(page, scale_tag, encoded.clone());
                        Ok(encoded)
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, request.clone());
                    request
                }
            }
        };

        let outcome = request.clone().await;
        // A retry may already have replaced this entry; only this exact
        // attempt is removed, never a newer one with its own waiters.
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if in_flight
                .get(&key)
                .is_some_and(|current| current.ptr_eq(&request))
            {
                in_flight.remove(&key);
            }
        }
        outcome
    }

    /// Draws one page into the caller's surface. On failure the surface is
    /// left in its prior state; nothing partial is ever presented.
    pub async fn render_into(
        &self,
        page: usize,
        mode: DisplayMode,
        surface: &mut dyn RenderSurface,
    ) -> Result<(), RenderFailure> {
        let encoded = self.obtain_page(page, mode).await?;
        let bitmap = decode_bitmap(&encoded)?;
        surface.present(&bitmap);
        Ok(())
    }

    /// Kicks off background rasterization for the window around `active`.
    /// The active page itself is the caller's to render eagerly; neighbors
    /// are fetched on spawned tasks and may complete in any order. Pages
    /// outside the window are not touched.
    pub fn schedule_window(self: &Arc<Self>, active: usize, mode: DisplayMode) {
        for page in self.window_for(active).pages() {
            if page == active {
                continue;
            }
            let scheduler = self.clone();
            tokio::spawn(async move {
                if let Err(e) = scheduler.obtain_page(page, mode).await {
                    // Wasted work at worst; the page renders as a blank
                    // placeholder until a later request succeeds.
                    warn!(page, "window pre-render failed: {e}");
                }
            });
        }
    }
}

/// Exports a drawn bitmap to PNG bytes for cache write-through.
pub fn encode_bitmap(bitmap: &PageBitmap) -> Result<Bytes, RenderFailure> {
    let image = image::RgbaImage::from_raw(bitmap.width, bitmap.height, bitmap.pixels.to_vec())
        .ok_or_else(|| RenderFailure("bitmap buffer does not match its dimensions".to_string()))?;
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| RenderFailure(e.to_string()))?;
    Ok(Bytes::from(out.into_inner()))
}

/// Decodes cached PNG bytes back into a drawable bitmap.
pub fn decode_bitmap(bytes: &Bytes) -> Result<PageBitmap, RenderFailure> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| RenderFailure(e.to_string()))?
        .to_rgba8();
    Ok(PageBitmap {
        width: image.width(),
        height: image.height(),
        pixels: Bytes::from(image.into_raw()),
    })
}
