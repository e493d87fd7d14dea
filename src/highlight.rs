//! Syntax highlighting for source files and fenced markdown blocks.
//!
//! Highlighting emits classed `<span>`s (`hl-` prefix) rather than inline
//! colours; the matching theme stylesheet is shipped alongside the markup
//! by whoever renders it.

use crate::error::ConvertError;
use once_cell::sync::Lazy;
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::warn;

/// Prefix for every highlight class.
pub const CLASS_PREFIX: &str = "hl-";

const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed {
    prefix: CLASS_PREFIX,
};

const THEME: &str = "InspiredGitHub";

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

static THEME_CSS: Lazy<String> = Lazy::new(|| {
    let themes = ThemeSet::load_defaults();
    let Some(theme) = themes.themes.get(THEME) else {
        warn!("Highlight theme '{}' missing; code renders unstyled", THEME);
        return String::new();
    };
    css_for_theme_with_class_style(theme, CLASS_STYLE).unwrap_or_else(|e| {
        warn!("Highlight theme CSS generation failed: {}", e);
        String::new()
    })
});

/// Extensions whose conventional language differs from what the bundled
/// grammars would pick, or which the grammars do not list at all.
const ALIASES: &[(&str, &str)] = &[
    ("m", "MATLAB"),
    ("clj", "Clojure"),
    ("cljc", "Clojure"),
    ("cljs", "Clojure"),
    ("clojure", "Clojure"),
    ("mysql", "SQL"),
    ("pgsql", "SQL"),
    ("plsql", "SQL"),
    ("shell", "Bourne Again Shell (bash)"),
    ("zsh", "Bourne Again Shell (bash)"),
    ("mathml", "XML"),
    ("rss", "XML"),
    ("ejs", "HTML"),
    ("vue", "HTML"),
    ("ruby", "Ruby"),
    ("perl", "Perl"),
    ("pod", "Perl"),
    ("php3", "PHP"),
    ("php4", "PHP"),
    ("php5", "PHP"),
    ("less", "CSS"),
    ("sass", "CSS"),
    ("scss", "CSS"),
    ("jsx", "JavaScript"),
    ("ts", "JavaScript"),
    ("tsx", "JavaScript"),
];

/// Theme stylesheet matching the classes [`highlight`] emits.
pub fn stylesheet() -> &'static str {
    THEME_CSS.as_str()
}

/// Pick a grammar for a source file.
///
/// Order: alias table, grammar extension list, first line (shebangs,
/// `<?xml`, modelines), plain text.
pub fn detect(extension: Option<&str>, source: &str) -> &'static SyntaxReference {
    let ext = extension
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty());

    if let Some(ext) = ext.as_deref() {
        let alias = ALIASES
            .iter()
            .find(|(from, _)| *from == ext)
            .and_then(|(_, name)| SYNTAXES.find_syntax_by_name(name));
        if let Some(syntax) = alias.or_else(|| SYNTAXES.find_syntax_by_extension(ext)) {
            return syntax;
        }
    }

    source
        .lines()
        .next()
        .and_then(|line| SYNTAXES.find_syntax_by_first_line(line))
        .unwrap_or_else(|| SYNTAXES.find_syntax_plain_text())
}

/// Grammar for a markdown fence info token (`rust`, `py`, `Python`, …).
pub fn by_token(token: &str) -> Option<&'static SyntaxReference> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    let lower = token.to_ascii_lowercase();
    SYNTAXES
        .find_syntax_by_token(&lower)
        .or_else(|| SYNTAXES.find_syntax_by_name(token))
        .or_else(|| {
            ALIASES
                .iter()
                .find(|(from, _)| *from == lower)
                .and_then(|(_, name)| SYNTAXES.find_syntax_by_name(name))
        })
}

/// Highlight `source` into classed span markup (no surrounding `<pre>`).
pub fn highlight(source: &str, syntax: &SyntaxReference) -> Result<String, ConvertError> {
    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAXES, CLASS_STYLE);

    let mut owned;
    let text = if source.ends_with('\n') {
        source
    } else {
        owned = source.to_string();
        owned.push('\n');
        owned.as_str()
    };

    for line in LinesWithEndings::from(text) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .map_err(|e| ConvertError::Highlight {
                language: syntax.name.clone(),
                message: e.to_string(),
            })?;
    }
    Ok(generator.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_extension_alias_and_first_line() {
        assert_eq!(detect(Some(".rs"), "fn main() {}").name, "Rust");
        assert_eq!(detect(Some(".m"), "x = 1;").name, "MATLAB");
        assert_eq!(detect(Some(".PY"), "").name, "Python");
        assert_eq!(detect(None, "#!/usr/bin/env python\nprint(1)").name, "Python");
        assert_eq!(detect(Some(".unknownlang"), "hello").name, "Plain Text");
    }

    #[test]
    fn highlight_emits_prefixed_classes() {
        let html = highlight("let x = 1;", detect(Some(".rs"), "")).unwrap();
        assert!(html.contains("class=\"hl-"));
        assert!(html.contains("let"));
        assert!(!html.contains("<pre"));
    }

    #[test]
    fn highlight_escapes_markup() {
        let html = highlight("<b>&</b>", detect(None, "<b>&</b>")).unwrap();
        assert!(html.contains("&lt;b&gt;"));
        assert!(html.contains("&amp;"));
    }

    #[test]
    fn stylesheet_targets_prefixed_classes() {
        assert!(stylesheet().contains(".hl-"));
    }

    #[test]
    fn fence_tokens_resolve() {
        assert_eq!(by_token("rust").map(|s| s.name.as_str()), Some("Rust"));
        assert_eq!(by_token("Python").map(|s| s.name.as_str()), Some("Python"));
        assert!(by_token("").is_none());
        assert!(by_token("definitely-not-a-language").is_none());
    }
}
