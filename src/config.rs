//! Configuration types for upload conversion.
//!
//! Rendering behaviour is controlled per call through [`RenderOptions`], built
//! via its [`RenderOptionsBuilder`]. Component-level knobs live in
//! [`InlinerConfig`] and [`BridgeConfig`]; [`ServiceConfig`] bundles them for
//! the top-level [`crate::convert::ConversionService`].
//!
//! # Design choice: builder over constructor
//! Converters set only the two or three options they care about (a pixel
//! ratio, a stylesheet, a margin) and rely on documented defaults for the rest.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// One megabyte, for size limits.
pub const MB: u64 = 1024 * 1024;

// ── Render options ───────────────────────────────────────────────────────

/// Options for one HTML → PNG rendering.
///
/// Built via [`RenderOptions::builder()`] or using
/// [`RenderOptions::default()`]. Serializable so a content context can ship
/// them across the bridge unchanged.
///
/// # Example
/// ```rust
/// use upload_convert::{RenderOptions, Stylesheet, SurfaceWidth};
///
/// let options = RenderOptions::builder()
///     .width(SurfaceWidth::Content)
///     .pixel_ratio(3.0)
///     .stylesheet(Stylesheet::Inline("pre { margin: 0 }".into()))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    /// Width of the isolated surface. Default: 816 px (8.5 in at 96 dpi).
    pub width: SurfaceWidth,

    /// Padding around the content in CSS pixels. Default: 48 (0.5 in).
    pub margin_px: f32,

    /// Device pixel ratio used when capturing. Range: 0.5–4. Default: 2.
    ///
    /// The output image is `ceil(width × ratio)` by `ceil(height × ratio)`
    /// pixels.
    pub pixel_ratio: f32,

    /// Background color painted under the content. Default: `"white"`.
    pub background: String,

    /// Stylesheets applied in order after the reset styles.
    pub stylesheets: Vec<Stylesheet>,

    /// Inline external resources before the surface loads. Default: true.
    pub inline_resources: bool,

    /// How long the surface may take to load, in milliseconds. Default: 5000.
    pub load_timeout_ms: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: SurfaceWidth::default(),
            margin_px: 48.0,
            pixel_ratio: 2.0,
            background: "white".to_string(),
            stylesheets: Vec::new(),
            inline_resources: true,
            load_timeout_ms: 5000,
        }
    }
}

impl RenderOptions {
    /// Create a new builder for `RenderOptions`.
    pub fn builder() -> RenderOptionsBuilder {
        RenderOptionsBuilder {
            options: Self::default(),
        }
    }
}

/// Builder for [`RenderOptions`].
#[derive(Debug)]
pub struct RenderOptionsBuilder {
    options: RenderOptions,
}

impl RenderOptionsBuilder {
    pub fn width(mut self, width: SurfaceWidth) -> Self {
        self.options.width = width;
        self
    }

    pub fn margin_px(mut self, px: f32) -> Self {
        self.options.margin_px = px.max(0.0);
        self
    }

    pub fn pixel_ratio(mut self, ratio: f32) -> Self {
        self.options.pixel_ratio = ratio.clamp(0.5, 4.0);
        self
    }

    pub fn background(mut self, color: impl Into<String>) -> Self {
        self.options.background = color.into();
        self
    }

    pub fn stylesheet(mut self, sheet: Stylesheet) -> Self {
        self.options.stylesheets.push(sheet);
        self
    }

    pub fn stylesheets(mut self, sheets: impl IntoIterator<Item = Stylesheet>) -> Self {
        self.options.stylesheets.extend(sheets);
        self
    }

    pub fn inline_resources(mut self, v: bool) -> Self {
        self.options.inline_resources = v;
        self
    }

    pub fn load_timeout_ms(mut self, ms: u64) -> Self {
        self.options.load_timeout_ms = ms;
        self
    }

    /// Build the options, validating constraints.
    pub fn build(self) -> Result<RenderOptions, ConvertError> {
        let o = &self.options;
        if let SurfaceWidth::Fixed(px) = o.width {
            if px == 0 {
                return Err(ConvertError::InvalidConfig(
                    "Surface width must be ≥ 1px".into(),
                ));
            }
        }
        if !o.pixel_ratio.is_finite() {
            return Err(ConvertError::InvalidConfig(format!(
                "Pixel ratio must be finite, got {}",
                o.pixel_ratio
            )));
        }
        if o.load_timeout_ms == 0 {
            return Err(ConvertError::InvalidConfig(
                "Load timeout must be ≥ 1ms".into(),
            ));
        }
        Ok(self.options)
    }
}

/// Width of the isolated rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "px")]
pub enum SurfaceWidth {
    /// A fixed width in CSS pixels.
    Fixed(u32),
    /// Shrink to the widest line of content (`width: min-content`).
    Content,
}

impl Default for SurfaceWidth {
    fn default() -> Self {
        SurfaceWidth::Fixed(816)
    }
}

/// A stylesheet applied to the rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "source")]
pub enum Stylesheet {
    /// Literal CSS text.
    Inline(String),
    /// A stylesheet URL, fetched and inlined before rendering.
    External(String),
}

impl Stylesheet {
    /// Classify a stylesheet source: a string that parses as an absolute URL
    /// is external, anything else is CSS text.
    pub fn from_source(source: impl Into<String>) -> Self {
        let source = source.into();
        match Url::parse(source.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https" | "file" | "data") => {
                Stylesheet::External(source.trim().to_string())
            }
            _ => Stylesheet::Inline(source),
        }
    }
}

// ── Resource inliner ─────────────────────────────────────────────────────

/// Configuration for [`crate::inline::ResourceInliner`].
#[derive(Debug, Clone)]
pub struct InlinerConfig {
    /// Base URL against which relative references are resolved. Default: None.
    pub base_url: Option<Url>,

    /// Resources larger than this many bytes are skipped. Default: 5 MB.
    pub max_size: u64,

    /// Per-resource fetch timeout in milliseconds. Default: 5000.
    pub timeout_ms: u64,

    /// Maximum number of fetches in flight. Default: 5.
    pub max_concurrent: usize,

    /// Fail the whole inlining on the first resource failure. Default: false.
    ///
    /// When false, failed resources are logged and left as external
    /// references.
    pub strict: bool,

    /// Read `file:` references from the local filesystem. Default: false.
    ///
    /// Rendered documents may come from untrusted uploads; with this off a
    /// `file:` reference is an invalid URL and is never read.
    pub allow_file_urls: bool,
}

impl Default for InlinerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            max_size: 5 * MB,
            timeout_ms: 5000,
            max_concurrent: 5,
            strict: false,
            allow_file_urls: false,
        }
    }
}

impl InlinerConfig {
    /// Settings used by the image renderer: a 100 MB cap so large fonts and
    /// images in rendered documents still make it into the capture.
    pub fn for_renderer() -> Self {
        Self {
            max_size: 100 * MB,
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base: Url) -> Self {
        self.base_url = Some(base);
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_file_urls(mut self, allow: bool) -> Self {
        self.allow_file_urls = allow;
        self
    }
}

// ── Bridge ───────────────────────────────────────────────────────────────

/// Configuration for the cross-context bridge and its lifecycle manager.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Identifies the privileged context document. Used for the existence
    /// check before creation. Default: `offscreen/index.html`.
    pub document_url: String,

    /// Tear the context down after this much inactivity. Default: 30 s.
    pub idle_timeout: Duration,

    /// How long a freshly created context may take to signal readiness.
    /// Default: 10 s.
    pub ready_timeout: Duration,

    /// How long a single request may wait for its reply. Default: 60 s.
    pub request_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            document_url: "offscreen/index.html".to_string(),
            idle_timeout: Duration::from_secs(30),
            ready_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl BridgeConfig {
    /// Development settings: the context stays alive for an hour so it can be
    /// inspected between conversions.
    pub fn development() -> Self {
        Self {
            idle_timeout: Duration::from_secs(3600),
            ..Self::default()
        }
    }
}

// ── Service ──────────────────────────────────────────────────────────────

/// Configuration for a [`crate::convert::ConversionService`].
///
/// Built via [`ServiceConfig::builder()`] or using
/// [`ServiceConfig::default()`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Lifecycle and timeouts of the privileged rendering context.
    pub bridge: BridgeConfig,

    /// Inliner settings used by the rendering context.
    pub inliner: InlinerConfig,

    /// Number of files converted concurrently in a batch. Default: 4.
    pub batch_concurrency: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            inliner: InlinerConfig::for_renderer(),
            batch_concurrency: 4,
            download_timeout_secs: 120,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn bridge(mut self, bridge: BridgeConfig) -> Self {
        self.config.bridge = bridge;
        self
    }

    pub fn dev_mode(mut self, v: bool) -> Self {
        self.config.bridge.idle_timeout = if v {
            BridgeConfig::development().idle_timeout
        } else {
            BridgeConfig::default().idle_timeout
        };
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.bridge.idle_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.bridge.request_timeout = timeout;
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.config.bridge.ready_timeout = timeout;
        self
    }

    pub fn inliner(mut self, inliner: InlinerConfig) -> Self {
        self.config.inliner = inliner;
        self
    }

    pub fn strict_inlining(mut self, v: bool) -> Self {
        self.config.inliner.strict = v;
        self
    }

    pub fn batch_concurrency(mut self, n: usize) -> Self {
        self.config.batch_concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ConvertError> {
        let c = &self.config;
        if c.batch_concurrency == 0 {
            return Err(ConvertError::InvalidConfig(
                "Batch concurrency must be ≥ 1".into(),
            ));
        }
        if c.inliner.max_concurrent == 0 {
            return Err(ConvertError::InvalidConfig(
                "Inliner concurrency must be ≥ 1".into(),
            ));
        }
        if c.bridge.idle_timeout.is_zero() {
            return Err(ConvertError::InvalidConfig(
                "Idle timeout must be non-zero".into(),
            ));
        }
        if c.bridge.ready_timeout.is_zero() || c.bridge.request_timeout.is_zero() {
            return Err(ConvertError::InvalidConfig(
                "Ready and request timeouts must be non-zero".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylesheet_source_classification() {
        assert_eq!(
            Stylesheet::from_source("https://cdn.example/katex.min.css"),
            Stylesheet::External("https://cdn.example/katex.min.css".into())
        );
        assert_eq!(
            Stylesheet::from_source("body { padding: 2rem }"),
            Stylesheet::Inline("body { padding: 2rem }".into())
        );
    }

    #[test]
    fn pixel_ratio_is_clamped() {
        let o = RenderOptions::builder().pixel_ratio(10.0).build().unwrap();
        assert_eq!(o.pixel_ratio, 4.0);
    }

    #[test]
    fn zero_width_is_rejected() {
        let err = RenderOptions::builder()
            .width(SurfaceWidth::Fixed(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn dev_mode_extends_idle_timeout() {
        let c = ServiceConfig::builder().dev_mode(true).build().unwrap();
        assert_eq!(c.bridge.idle_timeout, Duration::from_secs(3600));
        let c = ServiceConfig::builder().dev_mode(false).build().unwrap();
        assert_eq!(c.bridge.idle_timeout, Duration::from_secs(30));
    }

    #[test]
    fn render_options_round_trip_through_json() {
        let o = RenderOptions::builder()
            .width(SurfaceWidth::Content)
            .stylesheet(Stylesheet::External("https://a/b.css".into()))
            .build()
            .unwrap();
        let json = serde_json::to_string(&o).unwrap();
        assert!(json.contains("\"pixelRatio\""));
        let back: RenderOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, o);
    }
}
