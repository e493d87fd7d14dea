//! Plain text → PNG.

use super::{rendered_png, styles, Converter, ConverterInfo};
use crate::config::{RenderOptions, Stylesheet};
use crate::error::ConvertError;
use crate::file::SourceFile;
use crate::render::document::escape_text;
use crate::service::RenderService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Renders the file's text in a monospace block, whitespace preserved.
pub struct TextConverter {
    info: ConverterInfo,
    service: Arc<dyn RenderService>,
}

impl TextConverter {
    pub fn new(service: Arc<dyn RenderService>) -> Self {
        Self {
            info: ConverterInfo::new("text", &[".txt"])
                .named("Text")
                .described("Renders plain text files as an image of their contents."),
            service,
        }
    }

    fn options() -> Result<RenderOptions, ConvertError> {
        RenderOptions::builder()
            .stylesheet(Stylesheet::Inline(styles::TEXT_CSS.into()))
            .inline_resources(false)
            .build()
    }
}

#[async_trait]
impl Converter for TextConverter {
    fn info(&self) -> &ConverterInfo {
        &self.info
    }

    async fn convert(&self, file: SourceFile) -> Result<SourceFile, ConvertError> {
        info!("Rendering text file '{}'", file.name());
        let html = format!("<pre>{}</pre>", escape_text(&file.text()));
        let url = self.service.html_to_image(&html, &Self::options()?).await?;
        rendered_png(&self.info, &file, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::testing::RecordingService;
    use crate::file::PNG_MIME;

    #[tokio::test]
    async fn text_is_wrapped_in_pre_and_escaped() {
        let service = Arc::new(RecordingService::default());
        let converter = TextConverter::new(service.clone());
        let out = converter
            .convert(SourceFile::new("notes.txt", b"Hello\n<World> & co".to_vec()))
            .await
            .unwrap();

        assert_eq!(out.name(), "notes.png");
        assert_eq!(out.mime_type(), PNG_MIME);
        let (html, options) = service.last();
        assert_eq!(html, "<pre>Hello\n&lt;World&gt; &amp; co</pre>");
        assert!(!options.inline_resources);
    }

    #[tokio::test]
    async fn blank_render_is_an_error() {
        let converter = TextConverter::new(Arc::new(RecordingService::blank()));
        let err = converter
            .convert(SourceFile::new("a.txt", b"x".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::RenderFailed { ref converter, .. } if converter == "text"));
    }
}
