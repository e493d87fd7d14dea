//! # upload-convert
//!
//! Turn files an upload target does not accept into files it does.
//!
//! Upload targets (chat attachments, form uploads) usually take PDFs and
//! images only. This crate renders everything else (plain text, source code,
//! SVG, markdown with math) into a PNG, and passes accepted formats through
//! unchanged.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file / URL
//!  │
//!  ├─ 1. Input     load a local path or download a URL          (pipeline::input)
//!  ├─ 2. Registry  pick the converter claiming the extension    (registry)
//!  ├─ 3. Convert   build an HTML fragment                       (converters)
//!  ├─ 4. Bridge    hand it to the privileged rendering context  (bridge)
//!  │               created lazily, shared, torn down when idle
//!  ├─ 5. Inline    embed stylesheets, images and fonts          (inline)
//!  ├─ 6. Render    lay out and rasterise on an isolated surface (render)
//!  └─ 7. Encode    PNG data URL → `<basename>.png`              (pipeline::encode)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use upload_convert::{ConversionService, ServiceConfig, SourceFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ConversionService::new(ServiceConfig::default())?;
//!     let png = service.convert_input("README.md").await?;
//!     std::fs::write(png.name(), png.bytes())?;
//!
//!     // Accepted formats come back untouched.
//!     let pdf = SourceFile::new("scan.pdf", std::fs::read("scan.pdf")?);
//!     assert_eq!(service.convert(pdf.clone()).await?, pdf);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `upconv` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! upload-convert = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bridge;
pub mod config;
pub mod convert;
pub mod converters;
pub mod error;
pub mod file;
pub mod highlight;
pub mod inline;
pub mod markdown;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod render;
pub mod service;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use bridge::{Bridge, ContextHost, RenderingContextManager, TaskHost};
pub use config::{
    BridgeConfig, InlinerConfig, RenderOptions, RenderOptionsBuilder, ServiceConfig,
    ServiceConfigBuilder, Stylesheet, SurfaceWidth,
};
pub use convert::ConversionService;
pub use converters::{Converter, ConverterInfo};
pub use error::{BridgeError, ConvertError, FileError, InlineError};
pub use file::{SerializedFile, SourceFile};
pub use inline::ResourceInliner;
pub use output::{BatchOutput, BatchStats, FileResult};
pub use pipeline::input::load_source;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use registry::ConverterRegistry;
pub use render::ImageRenderer;
pub use service::{LocalRenderService, RenderService};
pub use stream::{convert_stream, FileStream};
