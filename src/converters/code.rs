//! Source code → highlighted PNG.

use super::{rendered_png, styles, Converter, ConverterInfo};
use crate::config::{RenderOptions, Stylesheet};
use crate::error::ConvertError;
use crate::file::SourceFile;
use crate::highlight;
use crate::service::RenderService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Source extensions claimed by the code converter.
pub const EXTENSIONS: &[&str] = &[
    ".asm", ".bash", ".c", ".cc", ".clj", ".cljc", ".cljs", ".clojure", ".cpp", ".cs", ".css",
    ".dart", ".ejs", ".groovy", ".h", ".h++", ".hpp", ".java", ".js", ".json", ".jsx", ".kotlin",
    ".less", ".lua", ".m", ".mathml", ".mysql", ".perl", ".pgsql", ".php", ".php3", ".php4",
    ".php5", ".pl", ".plsql", ".pod", ".powershell", ".ps1", ".psm1", ".py", ".rb", ".rs",
    ".rss", ".ruby", ".sass", ".scala", ".scss", ".sh", ".shell", ".sql", ".swift", ".toml",
    ".ts", ".tsx", ".vb", ".vba", ".vbs", ".vue", ".xml", ".yaml", ".yml", ".zsh",
];

/// Small code needs more pixels to stay legible.
const PIXEL_RATIO: f32 = 3.0;

/// 0.1rem.
const MARGIN_PX: f32 = 1.6;

/// Highlights source files and renders them.
pub struct CodeConverter {
    info: ConverterInfo,
    service: Arc<dyn RenderService>,
}

impl CodeConverter {
    pub fn new(service: Arc<dyn RenderService>) -> Self {
        Self {
            info: ConverterInfo::new("code-syntax-highlighter", EXTENSIONS)
                .named("Code Syntax Highlighter")
                .described(
                    "Adds support for many programming languages with syntax highlighting.",
                ),
            service,
        }
    }

    fn options() -> Result<RenderOptions, ConvertError> {
        RenderOptions::builder()
            .pixel_ratio(PIXEL_RATIO)
            .margin_px(MARGIN_PX)
            .stylesheet(Stylesheet::Inline(highlight::stylesheet().to_string()))
            .stylesheet(Stylesheet::Inline(styles::CODE_CSS.into()))
            .inline_resources(false)
            .build()
    }
}

#[async_trait]
impl Converter for CodeConverter {
    fn info(&self) -> &ConverterInfo {
        &self.info
    }

    async fn convert(&self, file: SourceFile) -> Result<SourceFile, ConvertError> {
        let source = file.text();
        let extension = file.extension();
        let syntax = highlight::detect(extension.as_deref(), &source);
        info!("Highlighting '{}' as {}", file.name(), syntax.name);

        let spans = highlight::highlight(&source, syntax)?;
        let html = format!(
            "<pre><code class=\"{}code\">{spans}</code></pre>",
            highlight::CLASS_PREFIX
        );
        let url = self.service.html_to_image(&html, &Self::options()?).await?;
        rendered_png(&self.info, &file, url)
    }
}
