//! Stylesheets layered onto rendered documents.

/// Monospace block for plain text.
pub const TEXT_CSS: &str = "pre { margin: 0; font-family: monospace; }";

/// Source code: the block grows to its content and the font is scaled up
/// for legibility.
pub const CODE_CSS: &str = "pre { height: max-content; font-size: 1.2rem; margin: 0; }";

/// Breathing room around rendered markdown.
pub const MARKDOWN_SPACING_CSS: &str = "body { padding: 2rem; }";

/// KaTeX stylesheet matching the bundled KaTeX version.
pub const KATEX_CSS_URL: &str = "https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/katex.min.css";

/// GitHub-flavoured styling for `.markdown-body`.
pub const GITHUB_MARKDOWN_CSS_URL: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/github-markdown-css/4.0.0/github-markdown.min.css";
