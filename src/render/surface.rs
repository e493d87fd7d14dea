//! Isolated rendering surfaces.
//!
//! A surface is created per render call, loaded with one complete document,
//! measured, resized to the measured content, captured, and dropped. It never
//! sees the caller's styles and performs no network access of its own.

use super::layout::{self, Page};
use super::paint;
use crate::config::SurfaceWidth;
use crate::error::ConvertError;
use async_trait::async_trait;
use image::RgbaImage;

/// Measured content box in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentSize {
    pub width: f32,
    pub height: f32,
}

/// A single-use off-screen surface.
#[async_trait]
pub trait Surface: Send {
    /// Load a complete HTML document. Resolves once the surface is ready to
    /// be measured.
    async fn load(&mut self, document: &str) -> Result<(), ConvertError>;

    /// Size of the laid-out content, or `None` when the document produced
    /// no body to measure.
    fn content_size(&self) -> Option<ContentSize>;

    /// Resize the viewport before capture.
    fn resize(&mut self, size: ContentSize);

    /// Rasterise the viewport.
    async fn capture(
        &mut self,
        pixel_ratio: f32,
        background: &str,
    ) -> Result<RgbaImage, ConvertError>;
}

/// Creates fresh surfaces.
pub trait SurfaceFactory: Send + Sync {
    fn create(&self, width: SurfaceWidth) -> Box<dyn Surface>;
}

/// Built-in surface: html5ever layout, resvg rasterisation.
#[derive(Debug)]
pub struct LayoutSurface {
    width: SurfaceWidth,
    page: Option<Page>,
    viewport: Option<ContentSize>,
}

impl LayoutSurface {
    pub fn new(width: SurfaceWidth) -> Self {
        Self {
            width,
            page: None,
            viewport: None,
        }
    }

    /// The laid-out page, once loaded.
    pub fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }
}

#[async_trait]
impl Surface for LayoutSurface {
    async fn load(&mut self, document: &str) -> Result<(), ConvertError> {
        let document = document.to_string();
        let width = self.width;
        // Layout is CPU-bound; keep it off the async workers.
        self.page = tokio::task::spawn_blocking(move || layout::layout_document(&document, width))
            .await
            .map_err(|e| ConvertError::Internal(format!("Layout task panicked: {e}")))?;
        Ok(())
    }

    fn content_size(&self) -> Option<ContentSize> {
        self.page.as_ref().map(|p| ContentSize {
            width: p.width,
            height: p.height,
        })
    }

    fn resize(&mut self, size: ContentSize) {
        self.viewport = Some(size);
    }

    async fn capture(
        &mut self,
        pixel_ratio: f32,
        background: &str,
    ) -> Result<RgbaImage, ConvertError> {
        let page = self.page.clone().ok_or_else(|| ConvertError::Render {
            message: "surface captured before load".into(),
        })?;
        let viewport = self.viewport.unwrap_or(ContentSize {
            width: page.width,
            height: page.height,
        });
        let background = background.to_string();

        tokio::task::spawn_blocking(move || {
            paint::paint(
                &page,
                viewport.width,
                viewport.height,
                pixel_ratio,
                &background,
            )
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("Capture task panicked: {e}")))?
    }
}

/// Factory for [`LayoutSurface`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutSurfaceFactory;

impl SurfaceFactory for LayoutSurfaceFactory {
    fn create(&self, width: SurfaceWidth) -> Box<dyn Surface> {
        Box::new(LayoutSurface::new(width))
    }
}
