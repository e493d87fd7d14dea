//! Format converters: one strategy per family of extensions.
//!
//! | Converter | Extensions | Output |
//! |-----------|------------|--------|
//! | [`PassthroughConverter`] | `.pdf .jpg .jpeg .png .gif .webp …` | file unchanged |
//! | [`TextConverter`] | `.txt` | monospace block → PNG |
//! | [`CodeConverter`] | `.rs .py .ts …` | highlighted source → PNG at 3× |
//! | [`SvgConverter`] | `.svg` | SVG markup, no margin, content width → PNG |
//! | [`MarkdownConverter`] | `.md .markdown` | markdown + math → PNG |
//!
//! Every rendering converter names its output `<basename>.png`. A render
//! that yields no image is a [`ConvertError::RenderFailed`].

pub mod code;
pub mod markdown;
pub mod passthrough;
pub mod styles;
pub mod svg;
pub mod text;

pub use code::CodeConverter;
pub use markdown::MarkdownConverter;
pub use passthrough::PassthroughConverter;
pub use svg::SvgConverter;
pub use text::TextConverter;

use crate::error::ConvertError;
use crate::file::SourceFile;
use crate::service::RenderService;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Credit for a converter, shown in UIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            github: None,
        }
    }

    pub fn with_github(mut self, handle: impl Into<String>) -> Self {
        self.github = Some(handle.into());
        self
    }
}

/// Descriptor metadata for a converter, without its behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverterInfo {
    pub name: String,
    pub slug: String,
    pub description: String,
    /// Lower-case, dot-prefixed (`.md`).
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
}

impl ConverterInfo {
    /// A descriptor whose display name defaults to its slug.
    pub fn new(slug: impl Into<String>, extensions: &[&str]) -> Self {
        let slug = slug.into();
        Self {
            name: slug.clone(),
            slug,
            description: String::new(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            authors: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn author(mut self, author: Author) -> Self {
        self.authors.push(author);
        self
    }
}

/// Turns a source file into something the upload target accepts.
#[async_trait]
pub trait Converter: Send + Sync {
    fn info(&self) -> &ConverterInfo;

    async fn convert(&self, file: SourceFile) -> Result<SourceFile, ConvertError>;
}

/// Every rendering converter over one render service.
///
/// The passthrough converter is not included: the registry installs it
/// itself during [`crate::registry::ConverterRegistry::init`].
pub fn rendering(service: Arc<dyn RenderService>) -> Vec<Arc<dyn Converter>> {
    vec![
        Arc::new(CodeConverter::new(service.clone())),
        Arc::new(MarkdownConverter::new(service.clone())),
        Arc::new(SvgConverter::new(service.clone())),
        Arc::new(TextConverter::new(service)),
    ]
}

/// Wrap a render result as `<basename>.png`, or fail when nothing was drawn.
pub(crate) fn rendered_png(
    converter: &ConverterInfo,
    source: &SourceFile,
    data_url: Option<String>,
) -> Result<SourceFile, ConvertError> {
    let data_url = data_url.ok_or_else(|| ConvertError::RenderFailed {
        converter: converter.slug.clone(),
        filename: source.name().to_string(),
    })?;
    SourceFile::png_from_data_url(source.name(), &data_url)
}
