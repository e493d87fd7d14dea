//! Image rendering: HTML fragment → PNG data URL.
//!
//! ```text
//! fragment
//!  │
//!  ├─ 1. Compose   standalone document: CSP, reset, stylesheets, root padding
//!  ├─ 2. Inline    embed external stylesheets / images / fonts (optional)
//!  ├─ 3. Load      fresh isolated surface, bounded by load_timeout_ms
//!  ├─ 4. Measure   content size; no body → Ok(None)
//!  ├─ 5. Capture   resize to content, rasterise at pixel_ratio
//!  └─ 6. Encode    PNG → data URL
//! ```
//!
//! Every call gets its own surface; nothing is shared between renders.

pub mod document;
pub mod fonts;
pub mod layout;
pub mod math;
pub mod paint;
pub mod style;
pub mod surface;

pub use surface::{ContentSize, LayoutSurface, LayoutSurfaceFactory, Surface, SurfaceFactory};

use crate::config::{InlinerConfig, RenderOptions};
use crate::error::ConvertError;
use crate::inline::ResourceInliner;
use crate::pipeline::encode::encode_png;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Renders HTML on isolated surfaces.
#[derive(Clone)]
pub struct ImageRenderer {
    inliner: ResourceInliner,
    surfaces: Arc<dyn SurfaceFactory>,
}

impl std::fmt::Debug for ImageRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRenderer")
            .field("inliner", &self.inliner)
            .field("surfaces", &"<dyn SurfaceFactory>")
            .finish()
    }
}

impl ImageRenderer {
    /// A renderer using the built-in [`LayoutSurface`] and an HTTP-backed
    /// inliner.
    pub fn new(inliner: InlinerConfig) -> Result<Self, ConvertError> {
        Ok(Self::with_parts(
            ResourceInliner::new(inliner)?,
            Arc::new(LayoutSurfaceFactory),
        ))
    }

    pub fn with_parts(inliner: ResourceInliner, surfaces: Arc<dyn SurfaceFactory>) -> Self {
        Self { inliner, surfaces }
    }

    /// Render `html` to a PNG data URL.
    ///
    /// Resolves to `Ok(None)` when the surface produced no body to capture;
    /// callers treat that as a conversion failure.
    pub async fn render(
        &self,
        html: &str,
        options: &RenderOptions,
    ) -> Result<Option<String>, ConvertError> {
        // ── Step 1: Compose ──────────────────────────────────────────────
        let mut document = document::compose(html, options);

        // ── Step 2: Inline ───────────────────────────────────────────────
        if options.inline_resources {
            document = self.inliner.inline(&document).await?;
        }

        // ── Step 3: Load ─────────────────────────────────────────────────
        let mut surface = self.surfaces.create(options.width);
        let limit = Duration::from_millis(options.load_timeout_ms);
        tokio::time::timeout(limit, surface.load(&document))
            .await
            .map_err(|_| ConvertError::LoadTimeout {
                ms: options.load_timeout_ms,
            })??;

        // ── Step 4: Measure ──────────────────────────────────────────────
        let Some(size) = surface.content_size() else {
            warn!("Rendering surface produced no body; nothing to capture");
            return Ok(None);
        };
        debug!("Measured content {:.0}x{:.0}", size.width, size.height);

        // ── Step 5: Capture ──────────────────────────────────────────────
        surface.resize(size);
        let image = surface
            .capture(options.pixel_ratio, &options.background)
            .await?;

        // ── Step 6: Encode ───────────────────────────────────────────────
        let png = tokio::task::spawn_blocking(move || encode_png(image))
            .await
            .map_err(|e| ConvertError::Internal(format!("Encode task panicked: {e}")))??;
        Ok(Some(png))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Stylesheet, SurfaceWidth};
    use crate::file::decode_data_url;
    use crate::inline::{Fetch, Fetched};
    use async_trait::async_trait;
    use image::RgbaImage;
    use std::sync::Mutex;
    use url::Url;

    struct NoNetwork;

    #[async_trait]
    impl Fetch for NoNetwork {
        async fn fetch(&self, url: &Url, _: u64) -> Result<Fetched, crate::error::InlineError> {
            Err(crate::error::InlineError::Network {
                url: url.to_string(),
                reason: "offline".into(),
            })
        }
    }

    fn renderer() -> ImageRenderer {
        ImageRenderer::with_parts(
            ResourceInliner::with_fetcher(InlinerConfig::for_renderer(), Arc::new(NoNetwork)),
            Arc::new(LayoutSurfaceFactory),
        )
    }

    fn decode(url: &str) -> image::DynamicImage {
        let (_, bytes) = decode_data_url(url).unwrap();
        image::load_from_memory(&bytes).unwrap()
    }

    #[tokio::test]
    async fn output_is_resized_to_content_height() {
        let options = RenderOptions::builder()
            .width(SurfaceWidth::Fixed(200))
            .margin_px(10.0)
            .pixel_ratio(1.0)
            .build()
            .unwrap();
        let short = renderer().render("<p>a</p>", &options).await.unwrap().unwrap();
        let tall = renderer()
            .render("<p>a</p><p>b</p><p>c</p><p>d</p>", &options)
            .await
            .unwrap()
            .unwrap();

        let short = decode(&short);
        let tall = decode(&tall);
        assert_eq!(short.width(), 200);
        assert_eq!(tall.width(), 200);
        assert!(tall.height() > short.height());
    }

    #[tokio::test]
    async fn pixel_ratio_scales_output() {
        let base = RenderOptions::builder()
            .width(SurfaceWidth::Fixed(100))
            .pixel_ratio(1.0)
            .build()
            .unwrap();
        let double = RenderOptions {
            pixel_ratio: 2.0,
            ..base.clone()
        };
        let one = decode(&renderer().render("x", &base).await.unwrap().unwrap());
        let two = decode(&renderer().render("x", &double).await.unwrap().unwrap());
        assert_eq!(two.width(), one.width() * 2);
    }

    #[tokio::test]
    async fn unreachable_external_stylesheet_does_not_fail_render() {
        let options = RenderOptions::builder()
            .stylesheet(Stylesheet::External("https://down.test/x.css".into()))
            .build()
            .unwrap();
        let out = renderer().render("<p>ok</p>", &options).await.unwrap();
        assert!(out.is_some());
    }

    /// A surface that records what it was given and never finds a body.
    struct BodylessSurface(Arc<Mutex<Option<String>>>);

    #[async_trait]
    impl Surface for BodylessSurface {
        async fn load(&mut self, document: &str) -> Result<(), ConvertError> {
            *self.0.lock().unwrap() = Some(document.to_string());
            Ok(())
        }
        fn content_size(&self) -> Option<ContentSize> {
            None
        }
        fn resize(&mut self, _: ContentSize) {}
        async fn capture(&mut self, _: f32, _: &str) -> Result<RgbaImage, ConvertError> {
            panic!("must not capture without a body");
        }
    }

    struct BodylessFactory(Arc<Mutex<Option<String>>>);

    impl SurfaceFactory for BodylessFactory {
        fn create(&self, _: SurfaceWidth) -> Box<dyn Surface> {
            Box::new(BodylessSurface(self.0.clone()))
        }
    }

    #[tokio::test]
    async fn missing_body_resolves_to_none() {
        let seen = Arc::new(Mutex::new(None));
        let renderer = ImageRenderer::with_parts(
            ResourceInliner::with_fetcher(InlinerConfig::default(), Arc::new(NoNetwork)),
            Arc::new(BodylessFactory(seen.clone())),
        );
        let out = renderer
            .render("<b>x</b>", &RenderOptions::default())
            .await
            .unwrap();
        assert!(out.is_none());
        assert!(seen.lock().unwrap().as_deref().unwrap().contains("<b>x</b>"));
    }

    struct HangingSurface;

    #[async_trait]
    impl Surface for HangingSurface {
        async fn load(&mut self, _: &str) -> Result<(), ConvertError> {
            futures::future::pending::<()>().await;
            Ok(())
        }
        fn content_size(&self) -> Option<ContentSize> {
            None
        }
        fn resize(&mut self, _: ContentSize) {}
        async fn capture(&mut self, _: f32, _: &str) -> Result<RgbaImage, ConvertError> {
            unreachable!()
        }
    }

    struct HangingFactory;

    impl SurfaceFactory for HangingFactory {
        fn create(&self, _: SurfaceWidth) -> Box<dyn Surface> {
            Box::new(HangingSurface)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn load_timeout_is_enforced() {
        let renderer = ImageRenderer::with_parts(
            ResourceInliner::with_fetcher(InlinerConfig::default(), Arc::new(NoNetwork)),
            Arc::new(HangingFactory),
        );
        let options = RenderOptions::builder()
            .inline_resources(false)
            .load_timeout_ms(250)
            .build()
            .unwrap();
        let err = renderer.render("x", &options).await.unwrap_err();
        assert!(matches!(err, ConvertError::LoadTimeout { ms: 250 }));
    }
}
