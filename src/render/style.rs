//! A small CSS subset for the layout surface.
//!
//! Stylesheets are tokenized with cssparser. Selectors: the last compound of
//! each selector (`tag`, `.class`, `#id`, `tag.a.b`, `*`). Rules with
//! pseudo-classes or attribute selectors are dropped rather than
//! over-applied. `@media` blocks other than print-only ones and `@supports`
//! blocks are flattened; every other at-rule is skipped.

use cssparser::{Delimiter, ParseError, Parser, ParserInput, ToCss, Token};

/// Root font size in CSS pixels.
pub const ROOT_FONT_SIZE: f32 = 16.0;

type CssError<'i> = ParseError<'i, ()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Inline,
    ListItem,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

/// Resolved style of one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
    pub serif: bool,
    pub underline: bool,
    pub preformatted: bool,
    pub color: String,
    pub background: Option<String>,
    pub margin: Edges,
    pub padding: Edges,
}

impl ComputedStyle {
    /// Initial values for the document root.
    pub fn root() -> Self {
        Self {
            display: Display::Block,
            font_size: ROOT_FONT_SIZE,
            bold: false,
            italic: false,
            monospace: false,
            serif: false,
            underline: false,
            preformatted: false,
            color: "black".to_string(),
            background: None,
            margin: Edges::default(),
            padding: Edges::default(),
        }
    }

    /// Inherited properties of `parent`, everything else reset.
    fn inherit(parent: &ComputedStyle) -> Self {
        Self {
            display: Display::Inline,
            background: None,
            margin: Edges::default(),
            padding: Edges::default(),
            ..parent.clone()
        }
    }
}

// ── User-agent defaults ──────────────────────────────────────────────────

fn ua_declarations(tag: &str) -> &'static [(&'static str, &'static str)] {
    match tag {
        "head" | "script" | "style" | "title" | "meta" | "link" | "template" | "noscript"
        | "base" => &[("display", "none")],
        "body" => &[("display", "block"), ("margin", "8px")],
        "p" => &[("display", "block"), ("margin", "1em 0")],
        "h1" => &[("display", "block"), ("font-size", "2em"), ("font-weight", "bold"), ("margin", "0.67em 0")],
        "h2" => &[("display", "block"), ("font-size", "1.5em"), ("font-weight", "bold"), ("margin", "0.83em 0")],
        "h3" => &[("display", "block"), ("font-size", "1.17em"), ("font-weight", "bold"), ("margin", "1em 0")],
        "h4" => &[("display", "block"), ("font-weight", "bold"), ("margin", "1.33em 0")],
        "h5" => &[("display", "block"), ("font-size", "0.83em"), ("font-weight", "bold"), ("margin", "1.67em 0")],
        "h6" => &[("display", "block"), ("font-size", "0.67em"), ("font-weight", "bold"), ("margin", "2.33em 0")],
        "pre" => &[("display", "block"), ("font-family", "monospace"), ("white-space", "pre"), ("margin", "1em 0")],
        "ul" | "ol" | "menu" => &[("display", "block"), ("margin", "1em 0"), ("padding-left", "40px")],
        "li" => &[("display", "list-item")],
        "blockquote" | "figure" => &[("display", "block"), ("margin", "1em 40px")],
        "dd" => &[("display", "block"), ("margin-left", "40px")],
        "hr" => &[("display", "block"), ("margin", "0.5em 0")],
        "th" => &[("font-weight", "bold")],
        "html" | "div" | "section" | "article" | "header" | "footer" | "main" | "nav"
        | "aside" | "table" | "thead" | "tbody" | "tfoot" | "tr" | "caption" | "figcaption"
        | "dl" | "dt" | "details" | "summary" | "form" | "fieldset" | "address" | "center" => {
            &[("display", "block")]
        }
        "code" | "kbd" | "samp" | "tt" => &[("font-family", "monospace")],
        "strong" | "b" => &[("font-weight", "bold")],
        "em" | "i" | "cite" | "var" | "dfn" => &[("font-style", "italic")],
        "a" => &[("color", "#0969da"), ("text-decoration", "underline")],
        "u" | "ins" => &[("text-decoration", "underline")],
        "small" | "sub" | "sup" => &[("font-size", "0.83em")],
        _ => &[],
    }
}

// ── Rules ────────────────────────────────────────────────────────────────

/// A compound selector: optional tag, optional id, classes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(selector: &str) -> Option<Self> {
        let last = selector
            .rsplit(|c: char| c.is_whitespace() || matches!(c, '>' | '+' | '~'))
            .find(|s| !s.is_empty())?;
        if last.contains([':', '[', '(']) {
            return None;
        }

        let mut compound = Compound {
            tag: None,
            id: None,
            classes: Vec::new(),
        };
        let mut rest = last;
        let head_end = rest.find(['.', '#']).unwrap_or(rest.len());
        let head = &rest[..head_end];
        if !head.is_empty() && head != "*" {
            if !head.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return None;
            }
            compound.tag = Some(head.to_ascii_lowercase());
        }
        rest = &rest[head_end..];

        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['.', '#']).unwrap_or(body.len());
            let name = &body[..end];
            if name.is_empty() {
                return None;
            }
            match marker {
                '.' => compound.classes.push(name.to_string()),
                _ => compound.id = Some(name.to_string()),
            }
            rest = &body[end..];
        }
        Some(compound)
    }

    fn specificity(&self) -> (u32, u32, u32) {
        (
            self.id.is_some() as u32,
            self.classes.len() as u32,
            self.tag.is_some() as u32,
        )
    }

    fn matches(&self, tag: &str, id: Option<&str>, classes: &[&str]) -> bool {
        self.tag.as_deref().is_none_or(|t| t == tag)
            && self.id.as_deref().is_none_or(|i| Some(i) == id)
            && self.classes.iter().all(|c| classes.contains(&c.as_str()))
    }
}

#[derive(Debug, Clone)]
struct Rule {
    selector: Compound,
    order: usize,
    declarations: Vec<(String, String)>,
}

/// Parsed author stylesheet.
#[derive(Debug, Clone, Default)]
pub struct StyleRules {
    rules: Vec<Rule>,
}

impl StyleRules {
    pub fn parse(css: &str) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rules = Vec::new();
        rule_list(&mut parser, &mut rules);
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Cascade user-agent, author and inline declarations for one element.
    pub fn compute(
        &self,
        tag: &str,
        id: Option<&str>,
        classes: &[&str],
        inline_style: Option<&str>,
        parent: &ComputedStyle,
    ) -> ComputedStyle {
        let mut matched: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.selector.matches(tag, id, classes))
            .collect();
        matched.sort_by_key(|r| (r.selector.specificity(), r.order));

        let inline = inline_style.map(parse_declarations).unwrap_or_default();
        let declarations: Vec<(&str, &str)> = ua_declarations(tag)
            .iter()
            .copied()
            .chain(
                matched
                    .iter()
                    .flat_map(|r| r.declarations.iter().map(|(p, v)| (p.as_str(), v.as_str()))),
            )
            .chain(inline.iter().map(|(p, v)| (p.as_str(), v.as_str())))
            .collect();

        let mut style = ComputedStyle::inherit(parent);
        // font-size first so em lengths in the same block resolve against it.
        for (prop, value) in &declarations {
            if *prop == "font-size" {
                if let Some(size) = font_size(value, parent.font_size) {
                    style.font_size = size;
                }
            }
        }
        for (prop, value) in &declarations {
            apply(&mut style, prop, value);
        }
        style
    }
}

fn rule_list(parser: &mut Parser<'_, '_>, rules: &mut Vec<Rule>) {
    loop {
        parser.skip_whitespace();
        if parser.is_exhausted() {
            break;
        }
        let at_keyword = parser.try_parse(|p| match p.next()? {
            Token::AtKeyword(name) => Ok(name.to_ascii_lowercase()),
            _ => Err(p.new_error_for_next_token::<()>()),
        });
        match at_keyword {
            Ok(name) => at_rule(parser, &name, rules),
            Err(_) => style_rule(parser, rules),
        }
    }
}

fn at_rule<'i>(parser: &mut Parser<'i, '_>, name: &str, rules: &mut Vec<Rule>) {
    let prelude = parser
        .parse_until_before(Delimiter::CurlyBracketBlock | Delimiter::Semicolon, |p| {
            Ok::<_, CssError<'i>>(serialize_tokens(p))
        })
        .unwrap_or_default()
        .to_ascii_lowercase();

    // Block-less at-rules (`@charset`, `@import`) end at ';'.
    if !matches!(parser.next(), Ok(Token::CurlyBracketBlock)) {
        return;
    }
    let flatten = match name {
        "media" => !(prelude.contains("print") && !prelude.contains("screen")),
        "supports" => true,
        _ => false,
    };
    if flatten {
        let _ = parser.parse_nested_block(|p| {
            rule_list(p, rules);
            Ok::<_, CssError<'i>>(())
        });
    }
}

fn style_rule<'i>(parser: &mut Parser<'i, '_>, rules: &mut Vec<Rule>) {
    let prelude = parser
        .parse_until_before(Delimiter::CurlyBracketBlock, |p| {
            Ok::<_, CssError<'i>>(serialize_tokens(p))
        })
        .unwrap_or_default();
    if parser.expect_curly_bracket_block().is_err() {
        return;
    }
    let declarations = parser
        .parse_nested_block(|p| Ok::<_, CssError<'i>>(declaration_list(p)))
        .unwrap_or_default();

    for selector in prelude.split(',') {
        if let Some(selector) = Compound::parse(selector.trim()) {
            rules.push(Rule {
                selector,
                order: rules.len(),
                declarations: declarations.clone(),
            });
        }
    }
}

/// Remaining tokens re-serialized, comments dropped. Nested blocks
/// serialize as their opening token only.
fn serialize_tokens(parser: &mut Parser<'_, '_>) -> String {
    let mut out = String::new();
    while let Ok(token) = parser.next_including_whitespace() {
        let _ = token.to_css(&mut out);
    }
    out
}

fn declaration_list<'i>(parser: &mut Parser<'i, '_>) -> Vec<(String, String)> {
    let mut declarations = Vec::new();
    while !parser.is_exhausted() {
        let declaration = parser.parse_until_after(
            Delimiter::Semicolon,
            |p| -> Result<(String, String), CssError<'i>> {
                let property = p.expect_ident()?.to_ascii_lowercase();
                p.expect_colon()?;
                p.skip_whitespace();
                let start = p.position();
                let mut end = start;
                loop {
                    let opens_block = match p.next() {
                        // `!important` closes the value.
                        Ok(Token::Delim('!')) | Err(_) => break,
                        Ok(token) => matches!(
                            token,
                            Token::Function(_)
                                | Token::ParenthesisBlock
                                | Token::SquareBracketBlock
                                | Token::CurlyBracketBlock
                        ),
                    };
                    if opens_block {
                        p.parse_nested_block(|nested| {
                            while nested.next().is_ok() {}
                            Ok::<_, CssError<'i>>(())
                        })?;
                    }
                    end = p.position();
                }
                Ok((property, p.slice(start..end).trim().to_string()))
            },
        );
        if let Ok((property, value)) = declaration {
            if !property.is_empty() && !value.is_empty() {
                declarations.push((property, value));
            }
        }
    }
    declarations
}

fn parse_declarations(style: &str) -> Vec<(String, String)> {
    let mut input = ParserInput::new(style);
    let mut parser = Parser::new(&mut input);
    declaration_list(&mut parser)
}

// ── Values ───────────────────────────────────────────────────────────────

fn apply(style: &mut ComputedStyle, prop: &str, value: &str) {
    let lower = value.to_ascii_lowercase();
    let fs = style.font_size;
    match prop {
        "display" => {
            style.display = match lower.as_str() {
                "none" => Display::None,
                "list-item" => Display::ListItem,
                "inline" | "inline-block" | "inline-flex" | "inline-grid" | "table-cell"
                | "contents" => Display::Inline,
                _ => Display::Block,
            }
        }
        "font-weight" => {
            style.bold = match lower.as_str() {
                "bold" | "bolder" => true,
                "normal" | "lighter" => false,
                n => n.parse::<u32>().map(|w| w >= 600).unwrap_or(style.bold),
            }
        }
        "font-style" => style.italic = lower == "italic" || lower == "oblique",
        "font-family" => {
            if ["mono", "courier", "consolas", "menlo", "monaco"]
                .iter()
                .any(|m| lower.contains(m))
            {
                style.monospace = true;
                style.serif = false;
            } else if ["sans", "arial", "helvetica", "system-ui", "apple"]
                .iter()
                .any(|m| lower.contains(m))
            {
                style.monospace = false;
                style.serif = false;
            } else if ["serif", "times", "georgia", "cambria"]
                .iter()
                .any(|m| lower.contains(m))
            {
                style.monospace = false;
                style.serif = true;
            }
        }
        "font" => {
            for token in lower.split_whitespace() {
                if token == "bold" {
                    style.bold = true;
                } else if token == "italic" {
                    style.italic = true;
                }
            }
            if lower.contains("mono") {
                style.monospace = true;
            }
        }
        "white-space" => {
            style.preformatted = matches!(lower.as_str(), "pre" | "pre-wrap" | "break-spaces")
        }
        "text-decoration" | "text-decoration-line" => {
            style.underline = lower.contains("underline")
        }
        "color" => style.color = value.to_string(),
        "background" | "background-color" => {
            style.background = match lower.as_str() {
                "none" | "transparent" | "initial" | "inherit" => None,
                v if v.contains("url(") || v.contains("gradient") => None,
                _ => value.split_whitespace().next().map(|c| c.to_string()),
            }
        }
        "margin" => {
            if let Some(e) = edges(&lower, fs) {
                style.margin = e;
            }
        }
        "padding" => {
            if let Some(e) = edges(&lower, fs) {
                style.padding = e;
            }
        }
        "margin-top" => set(&mut style.margin.top, &lower, fs),
        "margin-right" => set(&mut style.margin.right, &lower, fs),
        "margin-bottom" => set(&mut style.margin.bottom, &lower, fs),
        "margin-left" => set(&mut style.margin.left, &lower, fs),
        "padding-top" => set(&mut style.padding.top, &lower, fs),
        "padding-right" => set(&mut style.padding.right, &lower, fs),
        "padding-bottom" => set(&mut style.padding.bottom, &lower, fs),
        "padding-left" => set(&mut style.padding.left, &lower, fs),
        _ => {}
    }
}

fn set(slot: &mut f32, value: &str, font_size: f32) {
    if let Some(v) = length(value, font_size) {
        *slot = v;
    }
}

/// `1`–`4` value box shorthand.
fn edges(value: &str, font_size: f32) -> Option<Edges> {
    let v: Vec<f32> = value
        .split_whitespace()
        .map(|t| length(t, font_size))
        .collect::<Option<_>>()?;
    let (top, right, bottom, left) = match v.as_slice() {
        [a] => (*a, *a, *a, *a),
        [a, b] => (*a, *b, *a, *b),
        [a, b, c] => (*a, *b, *c, *b),
        [a, b, c, d, ..] => (*a, *b, *c, *d),
        [] => return None,
    };
    Some(Edges {
        top,
        right,
        bottom,
        left,
    })
}

/// A length in CSS pixels. `auto` and percentages resolve to zero.
pub fn length(value: &str, font_size: f32) -> Option<f32> {
    let v = value.trim();
    if v == "0" || v == "auto" {
        return Some(0.0);
    }
    let (num, unit) = split_number(v)?;
    Some(match unit {
        "px" | "" => num,
        "rem" => num * ROOT_FONT_SIZE,
        "em" => num * font_size,
        "pt" => num * 4.0 / 3.0,
        "%" => 0.0,
        _ => return None,
    })
}

fn font_size(value: &str, parent: f32) -> Option<f32> {
    let v = value.trim().to_ascii_lowercase();
    let keyword = match v.as_str() {
        "xx-small" => Some(9.0),
        "x-small" => Some(10.0),
        "small" => Some(13.0),
        "medium" => Some(16.0),
        "large" => Some(18.0),
        "x-large" => Some(24.0),
        "xx-large" => Some(32.0),
        "smaller" => Some(parent / 1.2),
        "larger" => Some(parent * 1.2),
        _ => None,
    };
    if keyword.is_some() {
        return keyword;
    }
    let (num, unit) = split_number(&v)?;
    let size = match unit {
        "px" => num,
        "rem" => num * ROOT_FONT_SIZE,
        "em" => num * parent,
        "%" => num * parent / 100.0,
        "pt" => num * 4.0 / 3.0,
        _ => return None,
    };
    (size > 0.0).then_some(size)
}

fn split_number(v: &str) -> Option<(f32, &str)> {
    let end = v
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(v.len());
    let num = v[..end].parse::<f32>().ok()?;
    Some((num, &v[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_get_ua_size_and_weight() {
        let rules = StyleRules::default();
        let h1 = rules.compute("h1", None, &[], None, &ComputedStyle::root());
        assert_eq!(h1.display, Display::Block);
        assert_eq!(h1.font_size, 32.0);
        assert!(h1.bold);
    }

    #[test]
    fn class_rules_beat_tag_rules_regardless_of_order() {
        let rules = StyleRules::parse(".hl-keyword { color: #a71d5d } span { color: red }");
        let s = rules.compute("span", None, &["hl-keyword"], None, &ComputedStyle::root());
        assert_eq!(s.color, "#a71d5d");
    }

    #[test]
    fn compound_and_descendant_selectors_match_last_compound() {
        let rules = StyleRules::parse(".code .hl-storage.hl-type { font-weight: bold }");
        let s = rules.compute("span", None, &["hl-storage", "hl-type"], None, &ComputedStyle::root());
        assert!(s.bold);
        let s = rules.compute("span", None, &["hl-storage"], None, &ComputedStyle::root());
        assert!(!s.bold);
    }

    #[test]
    fn pseudo_class_rules_are_dropped() {
        let rules = StyleRules::parse("a:hover { color: red } a { color: blue }");
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn media_blocks_flatten_and_print_is_skipped() {
        let rules = StyleRules::parse(
            "@media (min-width: 10px) { p { color: green } } @media print { p { color: red } } @font-face { src: url(x) }",
        );
        let p = rules.compute("p", None, &[], None, &ComputedStyle::root());
        assert_eq!(p.color, "green");
    }

    #[test]
    fn inline_style_wins_and_em_uses_own_font_size() {
        let rules = StyleRules::parse("div { padding: 1px }");
        let s = rules.compute(
            "div",
            Some("render-root"),
            &[],
            Some("font-size: 20px; padding: 1em 2px"),
            &ComputedStyle::root(),
        );
        assert_eq!(s.padding.top, 20.0);
        assert_eq!(s.padding.right, 2.0);
    }

    #[test]
    fn inheritance_keeps_font_but_not_box() {
        let rules = StyleRules::default();
        let pre = rules.compute("pre", None, &[], Some("background: #f6f8fa"), &ComputedStyle::root());
        let span = rules.compute("span", None, &[], None, &pre);
        assert!(span.monospace && span.preformatted);
        assert_eq!(span.background, None);
        assert_eq!(span.margin, Edges::default());
    }

    #[test]
    fn braces_in_strings_and_comments_do_not_end_rules() {
        let rules = StyleRules::parse(
            r#"/* p { color: blue } */ a::after { content: "}" } p /* c */ { color: red }"#,
        );
        assert_eq!(rules.len(), 1);
        let p = rules.compute("p", None, &[], None, &ComputedStyle::root());
        assert_eq!(p.color, "red");
    }

    #[test]
    fn important_is_stripped_and_bad_declarations_are_skipped() {
        let rules = StyleRules::parse("p { color: green !important; : nothing; margin: 2px }");
        let p = rules.compute("p", None, &[], None, &ComputedStyle::root());
        assert_eq!(p.color, "green");
        assert_eq!(p.margin.top, 2.0);
    }

    #[test]
    fn semicolons_inside_functions_stay_in_the_value() {
        let decls = parse_declarations(r#"background: url("a;b.png") #fff; color: red"#);
        assert_eq!(decls[0], ("background".into(), r#"url("a;b.png") #fff"#.into()));
        assert_eq!(decls[1], ("color".into(), "red".into()));
    }

    #[test]
    fn serif_families_are_told_apart_from_sans() {
        let rules = StyleRules::parse(
            ".a { font-family: Georgia, serif } .b { font-family: 'Helvetica Neue', sans-serif }",
        );
        let a = rules.compute("p", None, &["a"], None, &ComputedStyle::root());
        let b = rules.compute("p", None, &["b"], None, &a);
        assert!(a.serif && !a.monospace);
        assert!(!b.serif && !b.monospace);
    }
}
