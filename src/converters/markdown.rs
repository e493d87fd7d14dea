//! Markdown → PNG.

use super::{rendered_png, styles, Converter, ConverterInfo};
use crate::config::{RenderOptions, Stylesheet};
use crate::error::ConvertError;
use crate::file::SourceFile;
use crate::highlight;
use crate::service::RenderService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Renders markdown (math, highlighted fences, diagrams) and rasterises it.
pub struct MarkdownConverter {
    info: ConverterInfo,
    service: Arc<dyn RenderService>,
    external: Vec<String>,
}

impl MarkdownConverter {
    pub fn new(service: Arc<dyn RenderService>) -> Self {
        Self {
            info: ConverterInfo::new("markdown", &[".md", ".markdown"])
                .named("Markdown")
                .described(
                    "Adds markdown file support with math (KaTeX), highlighted code and more.",
                ),
            service,
            external: vec![
                styles::KATEX_CSS_URL.to_string(),
                styles::GITHUB_MARKDOWN_CSS_URL.to_string(),
            ],
        }
    }

    /// Replace the external stylesheets fetched and inlined for every
    /// document. An empty list renders with local styles only.
    pub fn with_external_stylesheets(mut self, urls: Vec<String>) -> Self {
        self.external = urls;
        self
    }

    fn options(&self) -> Result<RenderOptions, ConvertError> {
        RenderOptions::builder()
            .background("#fff")
            .stylesheets(self.external.iter().cloned().map(Stylesheet::External))
            .stylesheet(Stylesheet::Inline(highlight::stylesheet().to_string()))
            .stylesheet(Stylesheet::Inline(styles::MARKDOWN_SPACING_CSS.into()))
            .inline_resources(!self.external.is_empty())
            .build()
    }
}

#[async_trait]
impl Converter for MarkdownConverter {
    fn info(&self) -> &ConverterInfo {
        &self.info
    }

    async fn convert(&self, file: SourceFile) -> Result<SourceFile, ConvertError> {
        info!("Rendering markdown '{}'", file.name());
        // Fully rendered, math included, before anything is rasterised.
        let html = self.service.markdown_to_html(&file.text()).await?;
        let url = self.service.html_to_image(&html, &self.options()?).await?;
        rendered_png(&self.info, &file, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::testing::RecordingService;

    #[tokio::test]
    async fn markdown_renders_heading_and_code_span() {
        let service = Arc::new(RecordingService::default());
        let out = MarkdownConverter::new(service.clone())
            .convert(SourceFile::new("Notes.MD", b"# Title\n\nsome `code` here".to_vec()))
            .await
            .unwrap();

        assert_eq!(out.name(), "Notes.png");
        let (html, options) = service.last();
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<code>code</code>"));
        assert_eq!(options.background, "#fff");
        assert!(options.inline_resources);
        assert!(options
            .stylesheets
            .contains(&Stylesheet::External(styles::KATEX_CSS_URL.into())));
    }

    #[tokio::test]
    async fn math_reaches_the_renderer_already_rendered() {
        let service = Arc::new(RecordingService::default());
        MarkdownConverter::new(service.clone())
            .convert(SourceFile::new("m.md", b"$$x^2$$".to_vec()))
            .await
            .unwrap();
        let (html, _) = service.last();
        assert!(html.contains("katex"));
        assert!(!html.contains("$$"));
    }

    #[tokio::test]
    async fn local_only_styles_skip_inlining() {
        let service = Arc::new(RecordingService::default());
        MarkdownConverter::new(service.clone())
            .with_external_stylesheets(Vec::new())
            .convert(SourceFile::new("a.md", b"x".to_vec()))
            .await
            .unwrap();
        let (_, options) = service.last();
        assert!(!options.inline_resources);
        assert!(options
            .stylesheets
            .iter()
            .all(|s| matches!(s, Stylesheet::Inline(_))));
    }
}
