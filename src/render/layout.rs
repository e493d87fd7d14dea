//! Block and inline layout of an HTML document into positioned items.
//!
//! The document is parsed with html5ever into an `RcDom`, styled through
//! [`StyleRules`], and flowed into lines. Runs are measured by shaping them
//! against the fonts the painter uses (see [`fonts`](super::fonts)). KaTeX
//! output is laid out from its MathML (see [`math`](super::math)) and placed
//! as one inline box.
//!
//! `RcDom` is `!Send`: [`layout_document`] must run start to finish on one
//! thread and returns a plain [`Page`].

use super::fonts::{self, Typeface};
use super::math::{self, MathBox};
use super::style::{ComputedStyle, Display, StyleRules};
use crate::config::SurfaceWidth;
use crate::file::{data_url, decode_data_url};
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use std::collections::HashMap;
use std::io::Cursor;
use tracing::debug;

/// Line box height as a multiple of the font size.
const LINE_HEIGHT: f32 = 1.4;

/// Intrinsic size of an `<svg>` without width, height or viewBox.
const DEFAULT_SVG_SIZE: (f32, f32) = (300.0, 150.0);

const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Font properties of one text run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStyle {
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
    pub serif: bool,
    pub underline: bool,
    pub color: String,
}

impl From<&ComputedStyle> for RunStyle {
    fn from(s: &ComputedStyle) -> Self {
        Self {
            font_size: s.font_size,
            bold: s.bold,
            italic: s.italic,
            monospace: s.monospace,
            serif: s.serif,
            underline: s.underline,
            color: s.color.clone(),
        }
    }
}

impl RunStyle {
    pub fn typeface(&self) -> Typeface {
        if self.monospace {
            Typeface::Mono
        } else if self.serif {
            Typeface::Serif
        } else {
            Typeface::Sans
        }
    }

    /// Shaped advance of `text` in CSS pixels.
    pub fn measure(&self, text: &str) -> f32 {
        fonts::advance_em(text, self.typeface(), self.bold, self.italic) * self.font_size
    }
}

/// A positioned, paintable item. Coordinates are CSS pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: String,
    },
    Text {
        x: f32,
        baseline: f32,
        text: String,
        style: RunStyle,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        href: String,
    },
}

/// Laid-out document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub width: f32,
    pub height: f32,
    pub items: Vec<Item>,
}

impl Page {
    /// Text of each line, top to bottom. Runs sharing a baseline are joined
    /// with a space.
    pub fn text_lines(&self) -> Vec<String> {
        let mut lines: Vec<(f32, String)> = Vec::new();
        for item in &self.items {
            if let Item::Text { baseline, text, .. } = item {
                match lines.iter_mut().find(|(b, _)| (b - baseline).abs() < 0.5) {
                    Some((_, line)) => {
                        line.push(' ');
                        line.push_str(text);
                    }
                    None => lines.push((*baseline, text.clone())),
                }
            }
        }
        lines.sort_by(|a, b| a.0.total_cmp(&b.0));
        lines.into_iter().map(|(_, l)| l).collect()
    }
}

/// Parse and lay out `html`. `None` when the document has no `<body>`
/// (e.g. a frameset document).
pub fn layout_document(html: &str, width: SurfaceWidth) -> Option<Page> {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
    let html_el = child_element(&dom.document, "html")?;
    let body = child_element(&html_el, "body")?;

    let mut css = String::new();
    collect_styles(&dom.document, &mut css);
    let rules = StyleRules::parse(&css);
    debug!("Layout: {} style rule(s)", rules.len());

    let bound = match width {
        SurfaceWidth::Fixed(px) => Some(px as f32),
        SurfaceWidth::Content => None,
    };
    let mut flow = Flow::new(&rules, bound);
    let html_style = flow.style_of(&html_el, &ComputedStyle::root())?;
    let body_style = flow.style_of(&body, &html_style)?;
    flow.block(&body, &body_style, 0.0, bound.unwrap_or(f32::INFINITY), None);
    Some(flow.finish())
}

// ── DOM helpers ──────────────────────────────────────────────────────────

struct ElementInfo {
    tag: String,
    attrs: HashMap<String, String>,
}

impl ElementInfo {
    fn of(handle: &Handle) -> Option<Self> {
        let NodeData::Element { name, attrs, .. } = &handle.data else {
            return None;
        };
        let attrs = attrs
            .borrow()
            .iter()
            .map(|a| (a.name.local.to_ascii_lowercase().to_string(), a.value.to_string()))
            .collect();
        Some(Self {
            tag: name.local.to_ascii_lowercase().to_string(),
            attrs,
        })
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }
}

fn child_element(parent: &Handle, tag: &str) -> Option<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .find(|c| matches!(&c.data, NodeData::Element { name, .. } if &*name.local == tag))
        .cloned()
}

fn text_content(handle: &Handle, out: &mut String) {
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            _ => text_content(child, out),
        }
    }
}

/// Concatenate every `<style>` outside embedded SVG.
fn collect_styles(handle: &Handle, css: &mut String) {
    for child in handle.children.borrow().iter() {
        if let NodeData::Element { name, .. } = &child.data {
            match &*name.local {
                "style" => {
                    text_content(child, css);
                    css.push('\n');
                }
                "svg" => {}
                _ => collect_styles(child, css),
            }
        }
    }
}

fn descendant(handle: &Handle, tag: &str) -> Option<Handle> {
    handle.children.borrow().iter().find_map(|c| match &c.data {
        NodeData::Element { name, .. } if &*name.local == tag => Some(c.clone()),
        _ => descendant(c, tag),
    })
}

fn serialize_node(handle: &Handle) -> Option<String> {
    let mut out = Vec::new();
    serialize(
        &mut out,
        &SerializableHandle::from(handle.clone()),
        SerializeOpts {
            traversal_scope: TraversalScope::IncludeNode,
            ..SerializeOpts::default()
        },
    )
    .ok()?;
    String::from_utf8(out).ok()
}

fn number(v: &str) -> Option<f32> {
    v.trim()
        .trim_end_matches("px")
        .parse::<f32>()
        .ok()
        .filter(|n| *n > 0.0)
}

/// Intrinsic size of an `<svg>` element from its attributes.
fn svg_size(el: &ElementInfo) -> (f32, f32) {
    let view_box: Option<(f32, f32)> = el.attr("viewbox").and_then(|vb| {
        let parts: Vec<f32> = vb
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        match parts.as_slice() {
            [_, _, w, h] if *w > 0.0 && *h > 0.0 => Some((*w, *h)),
            _ => None,
        }
    });
    let w = el.attr("width").and_then(number);
    let h = el.attr("height").and_then(number);
    match (w, h, view_box) {
        (Some(w), Some(h), _) => (w, h),
        (Some(w), None, Some((vw, vh))) => (w, w * vh / vw),
        (None, Some(h), Some((vw, vh))) => (h * vw / vh, h),
        (None, None, Some(vb)) => vb,
        (Some(w), None, None) => (w, DEFAULT_SVG_SIZE.1),
        (None, Some(h), None) => (DEFAULT_SVG_SIZE.0, h),
        (None, None, None) => DEFAULT_SVG_SIZE,
    }
}

/// Intrinsic size of an embedded image payload.
fn image_size(mime: Option<&str>, bytes: &[u8]) -> Option<(f32, f32)> {
    if mime.is_some_and(|m| m.starts_with("image/svg")) {
        let tree = resvg::usvg::Tree::from_data(bytes, &resvg::usvg::Options::default()).ok()?;
        let size = tree.size();
        return Some((size.width(), size.height()));
    }
    let (w, h) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    Some((w as f32, h as f32))
}

// ── Flow ─────────────────────────────────────────────────────────────────

enum Pending {
    Text {
        x: f32,
        text: String,
        style: RunStyle,
        width: f32,
    },
    Image {
        x: f32,
        width: f32,
        height: f32,
        href: String,
    },
    Math {
        x: f32,
        formula: MathBox,
    },
}

struct Flow<'a> {
    rules: &'a StyleRules,
    bound: Option<f32>,
    items: Vec<Item>,
    y: f32,
    pending_margin: f32,
    line: Vec<Pending>,
    pen: f32,
    line_left: f32,
    line_right: f32,
    max_right: f32,
    space_pending: bool,
}

impl<'a> Flow<'a> {
    fn new(rules: &'a StyleRules, bound: Option<f32>) -> Self {
        Self {
            rules,
            bound,
            items: Vec::new(),
            y: 0.0,
            pending_margin: 0.0,
            line: Vec::new(),
            pen: 0.0,
            line_left: 0.0,
            line_right: bound.unwrap_or(f32::INFINITY),
            max_right: 0.0,
            space_pending: false,
        }
    }

    fn style_of(&self, handle: &Handle, parent: &ComputedStyle) -> Option<ComputedStyle> {
        let el = ElementInfo::of(handle)?;
        Some(self.rules.compute(
            &el.tag,
            el.attr("id"),
            &el.classes(),
            el.attr("style"),
            parent,
        ))
    }

    fn reset_line(&mut self, left: f32, right: f32) {
        self.line_left = left;
        self.line_right = right;
        self.pen = left;
    }

    fn block(
        &mut self,
        handle: &Handle,
        style: &ComputedStyle,
        left: f32,
        right: f32,
        marker: Option<String>,
    ) {
        self.flush_line();
        self.y += self.pending_margin.max(style.margin.top);
        self.pending_margin = 0.0;
        self.space_pending = false;

        let background_at = self.items.len();
        let top = self.y;
        let outer_left = left + style.margin.left;
        let outer_right = right - style.margin.right;
        let inner_left = outer_left + style.padding.left;
        let inner_right = outer_right - style.padding.right;

        self.y += style.padding.top;
        self.reset_line(inner_left, inner_right);
        let outer_max = self.max_right;
        self.max_right = inner_left;

        if let Some(marker) = marker {
            let run = RunStyle::from(style);
            let text = format!("{marker} ");
            let width = run.measure(&text);
            self.line.push(Pending::Text {
                x: inner_left - width,
                text: marker,
                style: run,
                width: 0.0,
            });
        }

        self.children(handle, style, inner_left, inner_right);
        self.flush_line();
        self.y += style.padding.bottom;

        if let Some(color) = &style.background {
            self.items.insert(
                background_at,
                Item::Rect {
                    x: outer_left,
                    y: top,
                    width: outer_right - outer_left,
                    height: self.y - top,
                    color: color.clone(),
                },
            );
        }
        self.pending_margin = style.margin.bottom;

        let extent = if self.max_right > inner_left {
            self.max_right + style.padding.right + style.margin.right
        } else {
            inner_left
        };
        self.max_right = outer_max.max(extent);
    }

    fn children(&mut self, handle: &Handle, style: &ComputedStyle, left: f32, right: f32) {
        let parent = ElementInfo::of(handle);
        let ordered = parent.as_ref().is_some_and(|p| p.tag == "ol");
        let mut ordinal: i64 = parent
            .as_ref()
            .and_then(|p| p.attr("start"))
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1);

        for child in handle.children.borrow().iter() {
            match &child.data {
                NodeData::Text { contents } => self.text(&contents.borrow(), style),
                NodeData::Element { .. } => {
                    let (Some(el), Some(cs)) = (ElementInfo::of(child), self.style_of(child, style))
                    else {
                        continue;
                    };
                    // KaTeX output: lay out the MathML half, skip the HTML half.
                    if cs.display != Display::None && el.classes().contains(&"katex") {
                        if let Some(formula) = descendant(child, "math") {
                            self.math(&formula, &cs);
                            continue;
                        }
                    }
                    match (cs.display, el.tag.as_str()) {
                        (Display::None, _) => {}
                        (_, "math") => self.math(child, &cs),
                        (_, "br") => self.line_break(&cs),
                        (_, "img") => self.image(&el, &cs),
                        (_, "svg") => self.inline_svg(child, &el),
                        (_, "hr") => self.rule(&cs, left, right),
                        (Display::Block, _) => {
                            self.block(child, &cs, left, right, None);
                            self.reset_line(left, right);
                        }
                        (Display::ListItem, _) => {
                            let marker = if ordered {
                                format!("{ordinal}.")
                            } else {
                                "•".to_string()
                            };
                            ordinal += 1;
                            self.block(child, &cs, left, right, Some(marker));
                            self.reset_line(left, right);
                        }
                        (Display::Inline, _) => self.children(child, &cs, left, right),
                    }
                }
                _ => {}
            }
        }
    }

    fn text(&mut self, raw: &str, style: &ComputedStyle) {
        if style.preformatted {
            let expanded = raw.replace('\t', "    ");
            let mut parts = expanded.split('\n').peekable();
            while let Some(part) = parts.next() {
                let part = part.trim_end_matches('\r');
                if !part.is_empty() {
                    self.push_word(part, style, false, false);
                }
                if parts.peek().is_some() {
                    self.line_break(style);
                }
            }
            return;
        }

        let leading = raw.starts_with(char::is_whitespace);
        let mut any = false;
        for (i, word) in raw.split_whitespace().enumerate() {
            let space = (i > 0 || leading || self.space_pending) && !self.line.is_empty();
            self.push_word(word, style, space, true);
            any = true;
        }
        if !raw.is_empty() {
            self.space_pending = !any || raw.ends_with(char::is_whitespace);
        }
    }

    fn push_word(&mut self, word: &str, style: &ComputedStyle, space: bool, wrap: bool) {
        let run = RunStyle::from(style);
        let mut space_width = if space { run.measure(" ") } else { 0.0 };
        let width = run.measure(word);
        if wrap && !self.line.is_empty() && self.pen + space_width + width > self.line_right {
            self.flush_line();
            space_width = 0.0;
        }
        self.space_pending = false;

        if let Some(Pending::Text {
            text,
            style: last,
            width: w,
            ..
        }) = self.line.last_mut()
        {
            if *last == run && *w > 0.0 {
                if space_width > 0.0 {
                    text.push(' ');
                }
                text.push_str(word);
                *w += space_width + width;
                self.pen += space_width + width;
                return;
            }
        }

        self.pen += space_width;
        self.line.push(Pending::Text {
            x: self.pen,
            text: word.to_string(),
            style: run,
            width,
        });
        self.pen += width;
    }

    fn line_break(&mut self, style: &ComputedStyle) {
        if self.line.is_empty() {
            self.y += self.pending_margin + style.font_size * LINE_HEIGHT;
            self.pending_margin = 0.0;
        } else {
            self.flush_line();
        }
        self.space_pending = false;
    }

    fn place_box(&mut self, width: f32, height: f32, href: String) {
        let (mut width, mut height) = (width, height);
        let available = self.line_right - self.line_left;
        if available.is_finite() && width > available && available > 0.0 {
            height *= available / width;
            width = available;
        }
        if !self.line.is_empty() && self.pen + width > self.line_right {
            self.flush_line();
        }
        self.line.push(Pending::Image {
            x: self.pen,
            width,
            height,
            href,
        });
        self.pen += width;
        self.space_pending = false;
    }

    fn math(&mut self, handle: &Handle, style: &ComputedStyle) {
        let formula = math::layout_math(handle, style.font_size, &style.color);
        if formula.items.is_empty() {
            return;
        }
        let mut space = if self.space_pending && !self.line.is_empty() {
            RunStyle::from(style).measure(" ")
        } else {
            0.0
        };
        if !self.line.is_empty() && self.pen + space + formula.width > self.line_right {
            self.flush_line();
            space = 0.0;
        }
        self.pen += space;
        let width = formula.width;
        self.line.push(Pending::Math {
            x: self.pen,
            formula,
        });
        self.pen += width;
        self.space_pending = false;
    }

    fn image(&mut self, el: &ElementInfo, style: &ComputedStyle) {
        let decoded = el
            .attr("src")
            .filter(|s| s.starts_with("data:"))
            .and_then(|s| decode_data_url(s).ok().map(|d| (s, d)));
        let intrinsic = decoded
            .as_ref()
            .and_then(|(_, (mime, bytes))| image_size(mime.as_deref(), bytes));

        let (Some((src, _)), Some((iw, ih))) = (decoded.as_ref(), intrinsic) else {
            // Unloadable image: fall back to its alt text.
            if let Some(alt) = el.attr("alt").filter(|a| !a.trim().is_empty()) {
                let mut alt_style = style.clone();
                alt_style.italic = true;
                self.text(alt, &alt_style);
            }
            return;
        };

        let w = el.attr("width").and_then(number);
        let h = el.attr("height").and_then(number);
        let (width, height) = match (w, h) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w * ih / iw.max(1.0)),
            (None, Some(h)) => (h * iw / ih.max(1.0), h),
            (None, None) => (iw, ih),
        };
        self.place_box(width, height, src.to_string());
    }

    fn inline_svg(&mut self, handle: &Handle, el: &ElementInfo) {
        let Some(mut markup) = serialize_node(handle) else {
            return;
        };
        if !el.attrs.contains_key("xmlns") {
            markup = markup.replacen("<svg", &format!("<svg xmlns=\"{SVG_NS}\""), 1);
        }
        let (width, height) = svg_size(el);
        self.place_box(width, height, data_url("image/svg+xml", markup.as_bytes()));
    }

    fn rule(&mut self, style: &ComputedStyle, left: f32, right: f32) {
        self.flush_line();
        self.y += self.pending_margin.max(style.margin.top);
        self.items.push(Item::Rect {
            x: left,
            y: self.y,
            width: right - left,
            height: 1.0,
            color: style.background.clone().unwrap_or_else(|| "#d0d7de".into()),
        });
        self.y += 1.0;
        self.pending_margin = style.margin.bottom;
        self.reset_line(left, right);
    }

    fn flush_line(&mut self) {
        if self.line.is_empty() {
            self.pen = self.line_left;
            return;
        }
        self.y += self.pending_margin;
        self.pending_margin = 0.0;

        let mut ascent: f32 = 0.0;
        let mut descent: f32 = 0.0;
        for run in &self.line {
            match run {
                Pending::Text { style, .. } => {
                    let half_leading = style.font_size * (LINE_HEIGHT - 1.0) / 2.0;
                    ascent = ascent.max(half_leading + style.font_size * 0.8);
                    descent = descent.max(half_leading + style.font_size * 0.2);
                }
                Pending::Image { height, .. } => ascent = ascent.max(*height),
                Pending::Math { formula, .. } => {
                    ascent = ascent.max(formula.ascent);
                    descent = descent.max(formula.descent);
                }
            }
        }
        let baseline = self.y + ascent;

        for run in self.line.drain(..) {
            match run {
                Pending::Text {
                    x,
                    text,
                    style,
                    width,
                } => {
                    self.max_right = self.max_right.max(x + width);
                    self.items.push(Item::Text {
                        x,
                        baseline,
                        text,
                        style,
                    });
                }
                Pending::Image {
                    x,
                    width,
                    height,
                    href,
                } => {
                    self.max_right = self.max_right.max(x + width);
                    self.items.push(Item::Image {
                        x,
                        y: baseline - height,
                        width,
                        height,
                        href,
                    });
                }
                Pending::Math { x, formula } => {
                    self.max_right = self.max_right.max(x + formula.width);
                    self.items.extend(
                        formula
                            .items
                            .into_iter()
                            .map(|item| math::shifted(item, x, baseline)),
                    );
                }
            }
        }
        self.y = baseline + descent;
        self.pen = self.line_left;
    }

    fn finish(mut self) -> Page {
        self.flush_line();
        let height = (self.y + self.pending_margin).ceil().max(1.0);
        let width = match self.bound {
            Some(w) => w,
            None => self.max_right.ceil().max(1.0),
        };
        for item in &mut self.items {
            if let Item::Rect { x, width: w, .. } = item {
                if !w.is_finite() {
                    *w = (width - *x).max(0.0);
                }
            }
        }
        Page {
            width,
            height,
            items: self.items,
        }
    }
}
