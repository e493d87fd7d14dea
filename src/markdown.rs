//! Markdown → HTML.
//!
//! comrak parses with raw HTML passthrough, autolinks and smart punctuation.
//! Before the tree is formatted every math node is rendered through KaTeX
//! and every fenced block is either highlighted or turned into a diagram
//! container, so the HTML handed to the renderer is final: no placeholders,
//! no scripts left to run.

use crate::error::ConvertError;
use crate::highlight;
use crate::render::document::escape_text;
use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};
use comrak::options::Options;
use comrak::{format_html, parse_document, Arena};
use katex::{OptsBuilder, OutputType};
use tracing::{debug, warn};

/// Fence languages emitted as diagram containers instead of code.
const DIAGRAM_LANGUAGES: &[&str] = &["mermaid", "plantuml"];

/// Renders markdown documents to self-contained HTML fragments.
#[derive(Debug, Clone)]
pub struct MarkdownEngine {
    math: bool,
    highlighting: bool,
}

impl Default for MarkdownEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownEngine {
    pub fn new() -> Self {
        Self {
            math: true,
            highlighting: true,
        }
    }

    /// Toggle `$…$` / `$$…$$` math.
    pub fn with_math(mut self, on: bool) -> Self {
        self.math = on;
        self
    }

    /// Toggle syntax highlighting of fenced code.
    pub fn with_highlighting(mut self, on: bool) -> Self {
        self.highlighting = on;
        self
    }

    fn options(&self) -> Options<'static> {
        let mut options = Options::default();

        let ext = &mut options.extension;
        ext.strikethrough = true;
        ext.table = true;
        ext.autolink = true;
        ext.tasklist = true;
        ext.footnotes = true;
        ext.math_dollars = self.math;

        options.parse.smart = true;
        options.render.r#unsafe = true;
        options
    }

    /// Render `markdown` to an HTML fragment wrapped in
    /// `<div class="markdown-body">`.
    pub fn render(&self, markdown: &str) -> Result<String, ConvertError> {
        let options = self.options();
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &options);

        let mut stats = RewriteStats::default();
        self.rewrite(root, &mut stats);
        debug!(
            "Markdown rewrite: {} math, {} highlighted, {} diagrams",
            stats.math, stats.highlighted, stats.diagrams
        );

        let mut html = String::new();
        format_html(root, &options, &mut html).map_err(|e| ConvertError::Markdown {
            message: e.to_string(),
        })?;
        Ok(format!("<div class=\"markdown-body\">\n{html}</div>\n"))
    }

    fn rewrite<'a>(&self, node: &'a AstNode<'a>, stats: &mut RewriteStats) {
        if !self.rewrite_math(node, stats) {
            self.rewrite_fence(node, stats);
        }

        let mut child = node.first_child();
        while let Some(next) = child {
            self.rewrite(next, stats);
            child = next.next_sibling();
        }
    }

    fn rewrite_math(&self, node: &AstNode<'_>, stats: &mut RewriteStats) -> bool {
        let math = {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::Math(m) => Some((m.literal.clone(), m.display_math)),
                _ => None,
            }
        };
        let Some((literal, display)) = math else {
            return false;
        };

        let html = match render_math(&literal, display) {
            Ok(html) => {
                stats.math += 1;
                html
            }
            Err(message) => {
                warn!("KaTeX could not render '{}': {}", literal, message);
                format!("<code class=\"math-error\">{}</code>", escape_text(&literal))
            }
        };

        let mut data = node.data.borrow_mut();
        data.value = if display {
            NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal: format!("<div class=\"math-display\">{html}</div>"),
            })
        } else {
            NodeValue::HtmlInline(html)
        };
        true
    }

    fn rewrite_fence(&self, node: &AstNode<'_>, stats: &mut RewriteStats) {
        let fence = {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::CodeBlock(block) => {
                    Some((block.info.trim().to_string(), block.literal.clone()))
                }
                _ => None,
            }
        };
        let Some((info, literal)) = fence else {
            return;
        };
        let lang = info
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        let replacement = if DIAGRAM_LANGUAGES.contains(&lang.as_str()) {
            stats.diagrams += 1;
            format!(
                "<div class=\"diagram diagram-{lang}\"><pre>{}</pre></div>\n",
                escape_text(&literal)
            )
        } else if self.highlighting {
            let Some(syntax) = highlight::by_token(&lang) else {
                // Unknown language: comrak's default escaped block.
                return;
            };
            match highlight::highlight(&literal, syntax) {
                Ok(spans) => {
                    stats.highlighted += 1;
                    format!(
                        "<pre><code class=\"language-{lang} {}code\">{spans}</code></pre>\n",
                        highlight::CLASS_PREFIX
                    )
                }
                Err(e) => {
                    warn!("{}", e);
                    return;
                }
            }
        } else {
            return;
        };

        node.data.borrow_mut().value = NodeValue::HtmlBlock(NodeHtmlBlock {
            block_type: 0,
            literal: replacement,
        });
    }
}

#[derive(Debug, Default)]
struct RewriteStats {
    math: usize,
    highlighted: usize,
    diagrams: usize,
}

/// KaTeX HTML plus MathML. The layout surface draws from the MathML half.
fn render_math(literal: &str, display: bool) -> Result<String, String> {
    let mut builder = OptsBuilder::default();
    builder.display_mode(display);
    builder.output_type(OutputType::HtmlAndMathml);
    let opts = builder.build().map_err(|e| e.to_string())?;
    katex::render_with_opts(literal, opts).map_err(|e| e.to_string())
}
