//! SVG → PNG.

use super::{rendered_png, Author, Converter, ConverterInfo};
use crate::config::{RenderOptions, SurfaceWidth};
use crate::error::ConvertError;
use crate::file::SourceFile;
use crate::service::RenderService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Renders SVG markup as-is: no margin, surface as wide as the drawing.
pub struct SvgConverter {
    info: ConverterInfo,
    service: Arc<dyn RenderService>,
}

impl SvgConverter {
    pub fn new(service: Arc<dyn RenderService>) -> Self {
        Self {
            info: ConverterInfo::new("svg", &[".svg"])
                .named("SVG")
                .described("Rasterises SVG drawings.")
                .author(Author::new("Newish0").with_github("github.com/Newish0")),
            service,
        }
    }

    fn options() -> Result<RenderOptions, ConvertError> {
        RenderOptions::builder()
            .margin_px(0.0)
            .width(SurfaceWidth::Content)
            .inline_resources(false)
            .build()
    }
}

#[async_trait]
impl Converter for SvgConverter {
    fn info(&self) -> &ConverterInfo {
        &self.info
    }

    async fn convert(&self, file: SourceFile) -> Result<SourceFile, ConvertError> {
        info!("Rendering SVG '{}'", file.name());
        let url = self
            .service
            .html_to_image(&file.text(), &Self::options()?)
            .await?;
        rendered_png(&self.info, &file, url)
    }
}
