//! CSS scanning and substitution.
//!
//! Pure `&str → String` passes over stylesheet text. Stylesheets are walked
//! token by token with cssparser, so references inside comments or strings
//! are never picked up. The inliner decides what each reference resolves
//! to; these functions only find references and splice replacements in,
//! leaving anything unresolved untouched.

use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;

static RE_STYLE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</style").unwrap());

type CssError<'i> = ParseError<'i, ()>;

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    /// A `url()` value.
    Url { in_font_face: bool },
    /// A whole `@import` rule, with its media list.
    Import { media: String },
}

/// One reference and the byte range of the source it occupies.
#[derive(Debug, Clone, PartialEq)]
struct Reference {
    kind: Kind,
    target: String,
    span: Range<usize>,
}

fn scan(css: &str) -> Vec<Reference> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut found = Vec::new();
    walk(&mut parser, false, &mut found);
    found
}

fn walk<'i>(parser: &mut Parser<'i, '_>, in_font_face: bool, found: &mut Vec<Reference>) {
    // Set by `@font-face`; the next `{}` block is its body.
    let mut font_face_next = false;
    loop {
        let start = parser.position();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::UnquotedUrl(url) => found.push(Reference {
                kind: Kind::Url { in_font_face },
                target: url.trim().to_string(),
                span: start.byte_index()..parser.position().byte_index(),
            }),
            Token::Function(name) if name.eq_ignore_ascii_case("url") => {
                let argument = parser
                    .parse_nested_block(|nested| Ok::<_, CssError<'i>>(url_argument(nested)))
                    .ok()
                    .flatten();
                if let Some(target) = argument {
                    found.push(Reference {
                        kind: Kind::Url { in_font_face },
                        target,
                        span: start.byte_index()..parser.position().byte_index(),
                    });
                }
            }
            Token::AtKeyword(name) if name.eq_ignore_ascii_case("import") => {
                if let Some((target, media)) = import_rule(parser) {
                    found.push(Reference {
                        kind: Kind::Import { media },
                        target,
                        span: start.byte_index()..parser.position().byte_index(),
                    });
                }
            }
            Token::AtKeyword(name) => font_face_next = name.eq_ignore_ascii_case("font-face"),
            Token::Semicolon => font_face_next = false,
            Token::CurlyBracketBlock => {
                let font_face = in_font_face || std::mem::take(&mut font_face_next);
                let _ = parser.parse_nested_block(|nested| {
                    walk(nested, font_face, found);
                    Ok::<_, CssError<'i>>(())
                });
            }
            Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock => {
                let _ = parser.parse_nested_block(|nested| {
                    walk(nested, in_font_face, found);
                    Ok::<_, CssError<'i>>(())
                });
            }
            _ => {}
        }
    }
}

/// The argument of a `url("…")` function, once its `(` is consumed.
fn url_argument(parser: &mut Parser<'_, '_>) -> Option<String> {
    let mut argument = None;
    while let Ok(token) = parser.next() {
        match token {
            Token::QuotedString(s) | Token::UnquotedUrl(s) | Token::Ident(s) => {
                argument = Some(s.trim().to_string())
            }
            _ => return None,
        }
    }
    argument
}

/// Target and media list of an `@import` rule, once `@import` is consumed.
/// Leaves the parser after the closing `;`.
fn import_rule<'i>(parser: &mut Parser<'i, '_>) -> Option<(String, String)> {
    parser
        .parse_until_after(
            Delimiter::Semicolon,
            |p| -> Result<(String, String), CssError<'i>> {
                let token = p.next()?.clone();
                let target = match token {
                    Token::QuotedString(s) | Token::UnquotedUrl(s) => s.trim().to_string(),
                    Token::Function(name) if name.eq_ignore_ascii_case("url") => p
                        .parse_nested_block(|nested| Ok::<_, CssError<'i>>(url_argument(nested)))?
                        .ok_or_else(|| invalid(p))?,
                    _ => return Err(invalid(p)),
                };
                p.skip_whitespace();
                let media_start = p.position();
                while p.next().is_ok() {}
                let media = p.slice_from(media_start).trim().to_string();
                Ok((target, media))
            },
        )
        .ok()
}

fn invalid<'i>(parser: &Parser<'i, '_>) -> CssError<'i> {
    parser.new_custom_error(())
}

/// Apply `edits` to `css`. Edits are disjoint and in source order.
fn splice(css: &str, edits: Vec<(Range<usize>, String)>) -> String {
    let mut out = String::with_capacity(css.len());
    let mut last = 0;
    for (span, replacement) in edits {
        if span.start < last || span.end > css.len() {
            continue;
        }
        out.push_str(&css[last..span.start]);
        out.push_str(&replacement);
        last = span.end;
    }
    out.push_str(&css[last..]);
    out
}

fn distinct(references: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = Vec::new();
    for r in references {
        if is_external(&r) && !seen.contains(&r) {
            seen.push(r);
        }
    }
    seen
}

/// Whether a reference needs fetching. Data URLs and fragment references are
/// already self-contained.
pub(crate) fn is_external(reference: &str) -> bool {
    let r = reference.trim();
    let is_data = r.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:"));
    !(r.is_empty() || r.starts_with('#') || is_data)
}

/// Distinct external `url()` references, in order of first appearance.
/// `@import` targets are not included.
pub(crate) fn url_references(css: &str) -> Vec<String> {
    distinct(
        scan(css)
            .into_iter()
            .filter(|r| matches!(r.kind, Kind::Url { .. }))
            .map(|r| r.target),
    )
}

/// Distinct external `url()` references inside `@font-face` blocks only.
pub(crate) fn font_face_references(css: &str) -> Vec<String> {
    distinct(
        scan(css)
            .into_iter()
            .filter(|r| r.kind == Kind::Url { in_font_face: true })
            .map(|r| r.target),
    )
}

/// Distinct external `@import` targets, in order.
pub(crate) fn import_references(css: &str) -> Vec<String> {
    distinct(
        scan(css)
            .into_iter()
            .filter(|r| matches!(r.kind, Kind::Import { .. }))
            .map(|r| r.target),
    )
}

fn replace_url_references(
    css: &str,
    resolved: &HashMap<String, String>,
    font_face_only: bool,
) -> String {
    let edits = scan(css)
        .into_iter()
        .filter_map(|r| match r.kind {
            Kind::Url { in_font_face } if in_font_face || !font_face_only => resolved
                .get(&r.target)
                .map(|data| (r.span, format!("url(\"{data}\")"))),
            _ => None,
        })
        .collect();
    splice(css, edits)
}

/// Replace `url()` arguments found in `resolved` with their data URLs.
pub(crate) fn replace_urls(css: &str, resolved: &HashMap<String, String>) -> String {
    replace_url_references(css, resolved, false)
}

/// Replace `url()` arguments only inside `@font-face` blocks.
pub(crate) fn replace_font_face_urls(css: &str, resolved: &HashMap<String, String>) -> String {
    replace_url_references(css, resolved, true)
}

/// Replace `@import` rules found in `resolved` with the imported CSS text.
/// Media-qualified imports are wrapped in the matching `@media` block.
pub(crate) fn replace_imports(css: &str, resolved: &HashMap<String, String>) -> String {
    let edits = scan(css)
        .into_iter()
        .filter_map(|r| {
            let Kind::Import { media } = r.kind else {
                return None;
            };
            let body = resolved.get(&r.target)?;
            let replacement = if media.is_empty() {
                body.clone()
            } else {
                format!("@media {media} {{\n{body}\n}}")
            };
            Some((r.span, replacement))
        })
        .collect();
    splice(css, edits)
}

/// Make CSS safe to place inside a `<style>` element.
pub(crate) fn escape_style_text(css: &str) -> String {
    RE_STYLE_CLOSE.replace_all(css, "<\\/style").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_all_url_forms_once() {
        let css = r#"a{background:url(a.png)} b{background:url("b.png")} c{background:url( 'a.png' )}
            d{background:url(data:image/png;base64,AAAA)} e{mask:url(#m)}"#;
        assert_eq!(url_references(css), vec!["a.png", "b.png"]);
    }

    #[test]
    fn references_in_comments_and_strings_are_ignored() {
        assert!(url_references("/* url(x.png) */").is_empty());
        assert!(url_references(r#"a::after{content:"url(y.png)"}"#).is_empty());
        assert!(import_references("/* @import 'z.css'; */ p{}").is_empty());
    }

    #[test]
    fn import_forms_and_media() {
        let css = "@import url(base.css);\n@import \"print.css\" print;\nbody{}";
        assert_eq!(import_references(css), vec!["base.css", "print.css"]);
        assert!(url_references(css).is_empty());

        let mut resolved = HashMap::new();
        resolved.insert("base.css".to_string(), "p{margin:0}".to_string());
        resolved.insert("print.css".to_string(), "p{color:#000}".to_string());
        let out = replace_imports(css, &resolved);
        assert!(out.starts_with("p{margin:0}"));
        assert!(out.contains("@media print {\np{color:#000}\n}"));
        assert!(out.contains("body{}"));
    }

    #[test]
    fn unresolved_references_are_left_alone() {
        let css = "a{background:url(missing.png)}";
        assert_eq!(replace_urls(css, &HashMap::new()), css);
    }

    #[test]
    fn font_face_only_touches_font_blocks() {
        let css = "@font-face{font-family:X;src:url(x.woff2)} body{background:url(bg.png)}";
        assert_eq!(font_face_references(css), vec!["x.woff2"]);

        let mut resolved = HashMap::new();
        resolved.insert("x.woff2".to_string(), "data:font/woff2;base64,AA==".to_string());
        resolved.insert("bg.png".to_string(), "data:image/png;base64,AA==".to_string());
        let out = replace_font_face_urls(css, &resolved);
        assert!(out.contains("url(\"data:font/woff2;base64,AA==\")"));
        assert!(out.contains("url(bg.png)"));
    }

    #[test]
    fn nested_blocks_are_scanned() {
        let css = "@media screen { .a { background: url(n.png) } } .b { background: image-set(url(s.png) 1x) }";
        assert_eq!(url_references(css), vec!["n.png", "s.png"]);
    }

    #[test]
    fn style_close_tag_is_escaped() {
        assert_eq!(escape_style_text("a{content:'</STYLE>'}"), "a{content:'<\\/style>'}");
    }
}
