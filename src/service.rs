//! The rendering capability format converters are written against.
//!
//! Converters never touch a surface or a markdown parser directly; they ask
//! a [`RenderService`]. Inside the privileged rendering context that is a
//! [`LocalRenderService`]. Everywhere else it is the
//! [`crate::bridge::Bridge`], which forwards each call across the context
//! boundary.

use crate::config::{InlinerConfig, RenderOptions};
use crate::error::ConvertError;
use crate::markdown::MarkdownEngine;
use crate::render::ImageRenderer;
use async_trait::async_trait;

/// HTML rasterisation and markdown rendering.
#[async_trait]
pub trait RenderService: Send + Sync {
    /// Render an HTML fragment to a PNG data URL. `Ok(None)` means the
    /// surface produced nothing to capture.
    async fn html_to_image(
        &self,
        html: &str,
        options: &RenderOptions,
    ) -> Result<Option<String>, ConvertError>;

    /// Render markdown to a final HTML fragment.
    async fn markdown_to_html(&self, markdown: &str) -> Result<String, ConvertError>;
}

/// In-process rendering: [`ImageRenderer`] plus [`MarkdownEngine`].
#[derive(Debug, Clone)]
pub struct LocalRenderService {
    renderer: ImageRenderer,
    markdown: MarkdownEngine,
}

impl LocalRenderService {
    pub fn new(inliner: InlinerConfig) -> Result<Self, ConvertError> {
        Ok(Self::with_parts(
            ImageRenderer::new(inliner)?,
            MarkdownEngine::new(),
        ))
    }

    pub fn with_parts(renderer: ImageRenderer, markdown: MarkdownEngine) -> Self {
        Self { renderer, markdown }
    }
}

#[async_trait]
impl RenderService for LocalRenderService {
    async fn html_to_image(
        &self,
        html: &str,
        options: &RenderOptions,
    ) -> Result<Option<String>, ConvertError> {
        self.renderer.render(html, options).await
    }

    async fn markdown_to_html(&self, markdown: &str) -> Result<String, ConvertError> {
        let engine = self.markdown.clone();
        let markdown = markdown.to_string();
        // KaTeX and syntect are CPU-bound.
        tokio::task::spawn_blocking(move || engine.render(&markdown))
            .await
            .map_err(|e| ConvertError::Internal(format!("Markdown task panicked: {e}")))?
    }
}
