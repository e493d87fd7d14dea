//! Presentation MathML layout.
//!
//! KaTeX emits MathML next to its HTML rendering. The HTML half only looks
//! right with KaTeX's own stylesheet and fonts; the MathML half carries the
//! structure (fractions, scripts, radicals, tables), so that is what the
//! surface lays out.
//!
//! A [`MathBox`] is positioned relative to its own baseline: `x` from its
//! left edge, `y` growing downward, so anything above the baseline has a
//! negative `y`.

use super::layout::{Item, RunStyle};
use super::style;
use markup5ever_rcdom::{Handle, NodeData};

/// Glyph extent above and below the baseline, in ems.
const ASCENT: f32 = 0.8;
const DESCENT: f32 = 0.2;

/// Height of the math axis above the baseline, in ems. Fraction bars and
/// large operators centre on it.
const AXIS: f32 = 0.25;

const SCRIPT_SCALE: f32 = 0.7;
const MIN_FONT_SIZE: f32 = 6.0;
const LARGE_OPERATOR_SCALE: f32 = 1.6;

const RELATION_SPACE: f32 = 5.0 / 18.0;
const BINARY_SPACE: f32 = 4.0 / 18.0;
const PUNCTUATION_SPACE: f32 = 3.0 / 18.0;

const LARGE_OPERATORS: &[char] = &[
    '∑', '∏', '∐', '∫', '∬', '∭', '∮', '⋃', '⋂', '⋁', '⋀', '⨁', '⨂', '⨀',
];
const RELATIONS: &[char] = &[
    '=', '<', '>', '≤', '≥', '≠', '≈', '≡', '∼', '≃', '≅', '∝', '→', '←', '↔', '⇒', '⇐', '⇔',
    '↦', '∈', '∉', '∋', '⊂', '⊃', '⊆', '⊇', '∣', '∥', '⊥', '≪', '≫', ':',
];
const BINARY_OPERATORS: &[char] = &[
    '+', '−', '-', '×', '÷', '±', '∓', '·', '⋅', '∘', '∗', '∪', '∩', '∧', '∨', '⊕', '⊗', '⊖', '∖',
];
const PUNCTUATION: &[char] = &[',', ';'];

/// Laid-out math, relative to its baseline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MathBox {
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
    pub items: Vec<Item>,
}

impl MathBox {
    /// Move `other`'s items into this box, offset by `(dx, dy)`.
    fn place(&mut self, other: MathBox, dx: f32, dy: f32) {
        self.items
            .extend(other.items.into_iter().map(|item| shifted(item, dx, dy)));
    }
}

/// `item` translated by `(dx, dy)`.
pub(crate) fn shifted(item: Item, dx: f32, dy: f32) -> Item {
    match item {
        Item::Rect {
            x,
            y,
            width,
            height,
            color,
        } => Item::Rect {
            x: x + dx,
            y: y + dy,
            width,
            height,
            color,
        },
        Item::Text {
            x,
            baseline,
            text,
            style,
        } => Item::Text {
            x: x + dx,
            baseline: baseline + dy,
            text,
            style,
        },
        Item::Image {
            x,
            y,
            width,
            height,
            href,
        } => Item::Image {
            x: x + dx,
            y: y + dy,
            width,
            height,
            href,
        },
    }
}

#[derive(Debug, Clone)]
struct Context {
    size: f32,
    color: String,
    display: bool,
    script: bool,
}

impl Context {
    fn scripted(&self) -> Self {
        Self {
            size: (self.size * SCRIPT_SCALE).max(MIN_FONT_SIZE),
            color: self.color.clone(),
            display: false,
            script: true,
        }
    }

    /// Numerators and denominators: one style step down.
    fn fraction_part(&self) -> Self {
        if self.display {
            Self {
                display: false,
                ..self.clone()
            }
        } else {
            self.scripted()
        }
    }

    fn sized(&self, size: f32) -> Self {
        Self {
            size,
            ..self.clone()
        }
    }
}

/// Lay out a `<math>` element at `font_size`.
pub fn layout_math(math: &Handle, font_size: f32, color: &str) -> MathBox {
    let context = Context {
        size: font_size,
        color: color.to_string(),
        display: attr(math, "display").is_some_and(|d| d == "block"),
        script: false,
    };
    row(math, &context)
}

// ── DOM helpers ──────────────────────────────────────────────────────────

fn tag(handle: &Handle) -> Option<String> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.to_ascii_lowercase().to_string()),
        _ => None,
    }
}

fn attr(handle: &Handle, name: &str) -> Option<String> {
    let NodeData::Element { attrs, .. } = &handle.data else {
        return None;
    };
    attrs
        .borrow()
        .iter()
        .find(|a| (*a.name.local).eq_ignore_ascii_case(name))
        .map(|a| a.value.trim().to_string())
}

fn elements(handle: &Handle) -> Vec<Handle> {
    handle
        .children
        .borrow()
        .iter()
        .filter(|c| matches!(c.data, NodeData::Element { .. }))
        .cloned()
        .collect()
}

fn text_of(handle: &Handle) -> String {
    let mut out = String::new();
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            _ => out.push_str(&text_of(child)),
        }
    }
    out
}

/// A MathML length in CSS pixels. `mu` is 1/18 em.
fn length(value: &str, size: f32) -> Option<f32> {
    let v = value.trim();
    let named = match v {
        "veryverythinmathspace" => Some(1.0),
        "verythinmathspace" => Some(2.0),
        "thinmathspace" => Some(3.0),
        "mediummathspace" => Some(4.0),
        "thickmathspace" => Some(5.0),
        "verythickmathspace" => Some(6.0),
        "veryverythickmathspace" => Some(7.0),
        _ => None,
    };
    if let Some(mu) = named {
        return Some(mu / 18.0 * size);
    }
    if let Some(mu) = v.strip_suffix("mu") {
        return mu.trim().parse::<f32>().ok().map(|n| n / 18.0 * size);
    }
    if let Some(ex) = v.strip_suffix("ex") {
        return ex.trim().parse::<f32>().ok().map(|n| n * 0.43 * size);
    }
    style::length(v, size)
}

/// `(bold, italic, monospace)` for a token's `mathvariant`.
fn variant(handle: &Handle, default_italic: bool) -> (bool, bool, bool) {
    match attr(handle, "mathvariant").as_deref() {
        Some("bold") => (true, false, false),
        Some("bold-italic") => (true, true, false),
        Some("italic") => (false, true, false),
        Some("monospace") => (false, false, true),
        Some(_) => (false, false, false),
        None => (false, default_italic, false),
    }
}

// ── Boxes ────────────────────────────────────────────────────────────────

fn node(handle: &Handle, context: &Context) -> MathBox {
    let Some(tag) = tag(handle) else {
        return MathBox::default();
    };
    let context = &restyled(handle, context);
    match tag.as_str() {
        "mi" => {
            let text = text_of(handle);
            let text = text.trim();
            let (bold, italic, mono) = variant(handle, text.chars().count() == 1);
            glyphs(text, context, bold, italic, mono)
        }
        "mn" | "mtext" | "ms" => {
            let (bold, italic, mono) = variant(handle, false);
            let text = text_of(handle);
            let text = if tag == "mtext" { text.as_str() } else { text.trim() };
            glyphs(text, context, bold, italic, mono)
        }
        "mo" => operator(handle, context, false),
        "mspace" => MathBox {
            width: attr(handle, "width")
                .and_then(|w| length(&w, context.size))
                .unwrap_or(0.0),
            ..MathBox::default()
        },
        "mfrac" => fraction(handle, context),
        "msqrt" => radical(row(handle, context), None, context),
        "mroot" => {
            let parts = elements(handle);
            let base = parts.first().map(|b| node(b, context)).unwrap_or_default();
            let index = parts.get(1).map(|i| node(i, &context.scripted().scripted()));
            radical(base, index, context)
        }
        "msub" | "msup" | "msubsup" => scripts(handle, &tag, context),
        "munder" | "mover" | "munderover" => limits(handle, &tag, context),
        "mtable" => table(handle, context),
        "mphantom" => MathBox {
            items: Vec::new(),
            ..row(handle, context)
        },
        "semantics" => elements(handle)
            .iter()
            .find(|c| !matches!(self::tag(c).as_deref(), Some("annotation" | "annotation-xml")))
            .map(|c| node(c, context))
            .unwrap_or_default(),
        "annotation" | "annotation-xml" | "none" | "mprescripts" => MathBox::default(),
        _ => row(handle, context),
    }
}

/// `mathcolor` and `displaystyle` apply to any element and its subtree.
fn restyled(handle: &Handle, context: &Context) -> Context {
    let mut context = context.clone();
    if let Some(color) = attr(handle, "mathcolor").filter(|c| !c.is_empty()) {
        context.color = color;
    }
    match attr(handle, "displaystyle").as_deref() {
        Some("true") => context.display = true,
        Some("false") => context.display = false,
        _ => {}
    }
    context
}

/// Children side by side on a shared baseline.
fn row(handle: &Handle, context: &Context) -> MathBox {
    let mut out = MathBox::default();
    for (i, child) in elements(handle).iter().enumerate() {
        let b = match tag(child).as_deref() {
            Some("mo") => operator(child, &restyled(child, context), i == 0),
            _ => node(child, context),
        };
        out.ascent = out.ascent.max(b.ascent);
        out.descent = out.descent.max(b.descent);
        let dx = out.width;
        out.width += b.width;
        out.place(b, dx, 0.0);
    }
    out
}

fn glyphs(text: &str, context: &Context, bold: bool, italic: bool, monospace: bool) -> MathBox {
    if text.is_empty() {
        return MathBox::default();
    }
    let style = RunStyle {
        font_size: context.size,
        bold,
        italic,
        monospace,
        serif: !monospace,
        underline: false,
        color: context.color.clone(),
    };
    MathBox {
        width: style.measure(text),
        ascent: context.size * ASCENT,
        descent: context.size * DESCENT,
        items: vec![Item::Text {
            x: 0.0,
            baseline: 0.0,
            text: text.to_string(),
            style,
        }],
    }
}

/// An operator with its surrounding space. A binary operator opening a
/// row is unary and gets none; so does everything inside scripts.
fn operator(handle: &Handle, context: &Context, leading: bool) -> MathBox {
    let text = text_of(handle);
    let text = text.trim();
    let (bold, italic, mono) = variant(handle, false);
    let size = context.size;

    let mut chars = text.chars();
    let single = match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    };
    let fence = attr(handle, "fence").is_some_and(|f| f == "true");
    let (mut lspace, mut rspace) = match single {
        _ if context.script || fence => (0.0, 0.0),
        Some(c) if RELATIONS.contains(&c) => (RELATION_SPACE, RELATION_SPACE),
        Some(c) if BINARY_OPERATORS.contains(&c) && !leading => (BINARY_SPACE, BINARY_SPACE),
        Some(c) if PUNCTUATION.contains(&c) => (0.0, PUNCTUATION_SPACE),
        _ => (0.0, 0.0),
    };
    lspace *= size;
    rspace *= size;
    if let Some(l) = attr(handle, "lspace").and_then(|v| length(&v, size)) {
        lspace = l;
    }
    if let Some(r) = attr(handle, "rspace").and_then(|v| length(&v, size)) {
        rspace = r;
    }

    let large = context.display
        && (single.is_some_and(|c| LARGE_OPERATORS.contains(&c))
            || attr(handle, "largeop").is_some_and(|l| l == "true"));
    let glyph_size = if large { size * LARGE_OPERATOR_SCALE } else { size };
    let glyph = glyphs(text, &context.sized(glyph_size), bold, italic, mono);

    // Large operators centre on the axis instead of sitting on the baseline.
    let dy = if large {
        glyph_size * (ASCENT - DESCENT) / 2.0 - size * AXIS
    } else {
        0.0
    };
    let mut out = MathBox {
        width: lspace + glyph.width + rspace,
        ascent: glyph.ascent - dy,
        descent: glyph.descent + dy,
        items: Vec::new(),
    };
    out.place(glyph, lspace, dy);
    out
}

fn fraction(handle: &Handle, context: &Context) -> MathBox {
    let parts = elements(handle);
    let part = context.fraction_part();
    let numerator = parts.first().map(|n| node(n, &part)).unwrap_or_default();
    let denominator = parts.get(1).map(|d| node(d, &part)).unwrap_or_default();

    let size = context.size;
    let thickness = match attr(handle, "linethickness").and_then(|t| length(&t, size)) {
        Some(t) if t <= 0.0 => 0.0,
        _ => (0.06 * size).max(1.0),
    };
    let axis = AXIS * size;
    let gap = 0.15 * size;
    let pad = 0.12 * size;

    let width = numerator.width.max(denominator.width) + 2.0 * pad;
    let bar_top = -axis - thickness / 2.0;
    let bar_bottom = -axis + thickness / 2.0;
    let numerator_baseline = bar_top - gap - numerator.descent;
    let denominator_baseline = bar_bottom + gap + denominator.ascent;

    let mut out = MathBox {
        width,
        ascent: numerator.ascent - numerator_baseline,
        descent: (denominator_baseline + denominator.descent).max(0.0),
        items: Vec::new(),
    };
    if thickness > 0.0 {
        out.items.push(Item::Rect {
            x: pad / 2.0,
            y: bar_top,
            width: width - pad,
            height: thickness,
            color: context.color.clone(),
        });
    }
    let nx = (width - numerator.width) / 2.0;
    let dx = (width - denominator.width) / 2.0;
    out.place(numerator, nx, numerator_baseline);
    out.place(denominator, dx, denominator_baseline);
    out
}

fn radical(inner: MathBox, index: Option<MathBox>, context: &Context) -> MathBox {
    let size = context.size;
    let gap = 0.1 * size;
    let rule = (0.05 * size).max(1.0);

    // The sign spans the radicand plus the gap above it.
    let span = inner.ascent + inner.descent + gap;
    let sign_size = size.max(span / (ASCENT + DESCENT));
    let sign = glyphs("√", &context.sized(sign_size), false, false, false);
    let sign_baseline = inner.descent - sign.descent;

    let index_shift = index
        .as_ref()
        .map_or(0.0, |i| (i.width - 0.4 * sign.width).max(0.0));
    let inner_x = index_shift + sign.width;
    let rule_top = -(inner.ascent + gap) - rule;
    let rule_width = inner.width + 0.05 * size;

    let mut out = MathBox {
        width: inner_x + rule_width,
        ascent: (-rule_top).max(sign.ascent - sign_baseline),
        descent: inner.descent.max(sign_baseline + sign.descent),
        items: vec![Item::Rect {
            x: inner_x,
            y: rule_top,
            width: rule_width,
            height: rule,
            color: context.color.clone(),
        }],
    };
    if let Some(index) = index {
        let index_baseline = sign_baseline - 0.5 * sign.ascent;
        out.ascent = out.ascent.max(index.ascent - index_baseline);
        out.place(index, 0.0, index_baseline);
    }
    out.place(sign, index_shift, sign_baseline);
    out.place(inner, inner_x, 0.0);
    out
}

fn scripts(handle: &Handle, tag: &str, context: &Context) -> MathBox {
    let parts = elements(handle);
    let base = parts.first().map(|b| node(b, context)).unwrap_or_default();
    let script = context.scripted();
    let (sub, sup) = match tag {
        "msub" => (parts.get(1), None),
        "msup" => (None, parts.get(1)),
        _ => (parts.get(1), parts.get(2)),
    };
    attach(
        base,
        sub.map(|s| node(s, &script)),
        sup.map(|s| node(s, &script)),
        context,
    )
}

/// Scripts to the right of `base`: superscript raised, subscript lowered,
/// kept apart when both are present.
fn attach(base: MathBox, sub: Option<MathBox>, sup: Option<MathBox>, context: &Context) -> MathBox {
    let size = context.size;
    let up = (base.ascent - 0.25 * size).max(0.45 * size);
    let mut down = base.descent.max(0.2 * size);
    if let (Some(sup), Some(sub)) = (&sup, &sub) {
        let clearance = (down - sub.ascent) - (-up + sup.descent);
        if clearance < 0.1 * size {
            down += 0.1 * size - clearance;
        }
    }

    let x = base.width;
    let mut out = MathBox {
        width: base.width,
        ascent: base.ascent,
        descent: base.descent,
        items: Vec::new(),
    };
    out.place(base, 0.0, 0.0);

    let mut script_width: f32 = 0.0;
    if let Some(sup) = sup {
        out.ascent = out.ascent.max(up + sup.ascent);
        script_width = script_width.max(sup.width);
        out.place(sup, x, -up);
    }
    if let Some(sub) = sub {
        out.descent = out.descent.max(down + sub.descent);
        script_width = script_width.max(sub.width);
        out.place(sub, x, down);
    }
    if script_width > 0.0 {
        out.width += script_width + 0.05 * size;
    }
    out
}

/// Over- and underscripts. Stacked, except for movable limits outside
/// display style, which attach like ordinary scripts.
fn limits(handle: &Handle, tag: &str, context: &Context) -> MathBox {
    let parts = elements(handle);
    let base_el = parts.first();
    let (under_el, over_el) = match tag {
        "munder" => (parts.get(1), None),
        "mover" => (None, parts.get(1)),
        _ => (parts.get(1), parts.get(2)),
    };
    let accent = attr(handle, "accent").is_some_and(|a| a == "true");
    let accent_under = attr(handle, "accentunder").is_some_and(|a| a == "true");

    let movable = base_el
        .and_then(|b| attr(b, "movablelimits"))
        .is_some_and(|m| m == "true");
    if movable && !context.display {
        let script = context.scripted();
        let base = base_el.map(|b| node(b, context)).unwrap_or_default();
        return attach(
            base,
            under_el.map(|u| node(u, &script)),
            over_el.map(|o| node(o, &script)),
            context,
        );
    }

    let size = context.size;
    let base = base_el.map(|b| node(b, context)).unwrap_or_default();
    let over_context = if accent { context.clone() } else { context.scripted() };
    let under_context = if accent_under { context.clone() } else { context.scripted() };
    let over = over_el.map(|o| node(o, &over_context));
    let under = under_el.map(|u| node(u, &under_context));

    let width = [
        Some(base.width),
        over.as_ref().map(|o| o.width),
        under.as_ref().map(|u| u.width),
    ]
    .into_iter()
    .flatten()
    .fold(0.0f32, f32::max);

    let mut out = MathBox {
        width,
        ascent: base.ascent,
        descent: base.descent,
        items: Vec::new(),
    };
    let base_ascent = base.ascent;
    let base_descent = base.descent;
    let base_x = (width - base.width) / 2.0;
    out.place(base, base_x, 0.0);

    if let Some(over) = over {
        let gap = if accent { 0.05 * size } else { 0.15 * size };
        let baseline = -(base_ascent + gap + over.descent);
        out.ascent = out.ascent.max(over.ascent - baseline);
        let ox = (width - over.width) / 2.0;
        out.place(over, ox, baseline);
    }
    if let Some(under) = under {
        let gap = if accent_under { 0.05 * size } else { 0.15 * size };
        let baseline = base_descent + gap + under.ascent;
        out.descent = out.descent.max(baseline + under.descent);
        let ux = (width - under.width) / 2.0;
        out.place(under, ux, baseline);
    }
    out
}

/// A grid of cells centred on the axis.
fn table(handle: &Handle, context: &Context) -> MathBox {
    let size = context.size;
    let rows: Vec<Vec<MathBox>> = elements(handle)
        .iter()
        .filter(|r| matches!(tag(r).as_deref(), Some("mtr" | "mlabeledtr")))
        .map(|r| elements(r).iter().map(|cell| row(cell, context)).collect())
        .collect();
    if rows.is_empty() {
        return MathBox::default();
    }

    let align: Vec<String> = attr(handle, "columnalign")
        .map(|a| a.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    let column_gap = attr(handle, "columnspacing")
        .and_then(|s| s.split_whitespace().next().and_then(|v| length(v, size)))
        .unwrap_or(size);
    let row_gap = attr(handle, "rowspacing")
        .and_then(|s| s.split_whitespace().next().and_then(|v| length(v, size)))
        .unwrap_or(0.3 * size);

    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0.0f32; columns];
    for cells in &rows {
        for (j, cell) in cells.iter().enumerate() {
            widths[j] = widths[j].max(cell.width);
        }
    }
    let metrics: Vec<(f32, f32)> = rows
        .iter()
        .map(|cells| {
            cells.iter().fold((size * ASCENT, size * DESCENT), |(a, d), c| {
                (a.max(c.ascent), d.max(c.descent))
            })
        })
        .collect();
    let height = metrics.iter().map(|(a, d)| a + d).sum::<f32>()
        + row_gap * (rows.len().saturating_sub(1)) as f32;
    let top = -(AXIS * size + height / 2.0);

    let mut out = MathBox {
        width: widths.iter().sum::<f32>() + column_gap * columns.saturating_sub(1) as f32,
        ascent: -top,
        descent: (top + height).max(0.0),
        items: Vec::new(),
    };

    let mut y = top;
    for (cells, (ascent, descent)) in rows.into_iter().zip(metrics) {
        let baseline = y + ascent;
        let mut x = 0.0;
        for (j, cell) in cells.into_iter().enumerate() {
            let slack = widths[j] - cell.width;
            let offset = match align.get(j).or(align.last()).map(String::as_str) {
                Some("left") => 0.0,
                Some("right") => slack,
                _ => slack / 2.0,
            };
            out.place(cell, x + offset, baseline);
            x += widths[j] + column_gap;
        }
        y = baseline + descent + row_gap;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use html5ever::tendril::TendrilSink;
    use html5ever::{parse_document, ParseOpts};
    use markup5ever_rcdom::RcDom;

    fn find(handle: &Handle, name: &str) -> Option<Handle> {
        if tag(handle).as_deref() == Some(name) {
            return Some(handle.clone());
        }
        handle.children.borrow().iter().find_map(|c| find(c, name))
    }

    fn math(markup: &str) -> MathBox {
        let dom = parse_document(RcDom::default(), ParseOpts::default())
            .one(format!("<html><body>{markup}</body></html>"));
        let el = find(&dom.document, "math").expect("math element");
        layout_math(&el, 20.0, "black")
    }

    fn texts(b: &MathBox) -> Vec<(String, f32, f32)> {
        b.items
            .iter()
            .filter_map(|i| match i {
                Item::Text {
                    x, baseline, text, ..
                } => Some((text.clone(), *x, *baseline)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn fraction_stacks_numerator_over_bar_over_denominator() {
        let b = math("<math><mfrac><mi>a</mi><mi>b</mi></mfrac></math>");
        let t = texts(&b);
        assert_eq!(t.len(), 2);
        let (a, b_) = (&t[0], &t[1]);
        assert_eq!((a.0.as_str(), b_.0.as_str()), ("a", "b"));

        let bar = b
            .items
            .iter()
            .find_map(|i| match i {
                Item::Rect { y, height, .. } => Some((*y, *height)),
                _ => None,
            })
            .expect("fraction bar");
        assert!(a.2 < bar.0, "numerator baseline {} above bar {}", a.2, bar.0);
        assert!(b_.2 > bar.0 + bar.1, "denominator baseline {} below bar", b_.2);
        assert!(b.ascent > 0.0 && b.descent > 0.0);
    }

    #[test]
    fn zero_thickness_fraction_has_no_bar() {
        let b = math(r#"<math><mfrac linethickness="0px"><mn>1</mn><mn>2</mn></mfrac></math>"#);
        assert!(!b.items.iter().any(|i| matches!(i, Item::Rect { .. })));
        assert_eq!(texts(&b).len(), 2);
    }

    #[test]
    fn superscript_is_raised_and_smaller() {
        let b = math("<math><msup><mi>x</mi><mn>2</mn></msup></math>");
        let items: Vec<_> = b
            .items
            .iter()
            .filter_map(|i| match i {
                Item::Text {
                    baseline, style, ..
                } => Some((*baseline, style.font_size)),
                _ => None,
            })
            .collect();
        assert_eq!(items[0], (0.0, 20.0));
        assert!(items[1].0 < 0.0);
        assert!(items[1].1 < 20.0);
    }

    #[test]
    fn relations_get_space_and_leading_minus_does_not() {
        let spaced = math("<math><mi>a</mi><mo>=</mo><mi>b</mi></math>");
        let tight = math("<math><mi>a</mi><mi>=</mi><mi>b</mi></math>");
        assert!(spaced.width > tight.width);

        let t = texts(&math("<math><mo>−</mo><mn>1</mn></math>"));
        assert_eq!(t[0].1, 0.0);
    }

    #[test]
    fn identifiers_are_italic_only_when_single_letter() {
        let b = math("<math><mi>x</mi><mi>sin</mi></math>");
        let italic: Vec<bool> = b
            .items
            .iter()
            .filter_map(|i| match i {
                Item::Text { style, .. } => Some(style.italic),
                _ => None,
            })
            .collect();
        assert_eq!(italic, vec![true, false]);
    }

    #[test]
    fn annotations_are_not_laid_out() {
        let b = math(
            r#"<math><semantics><mrow><mi>y</mi></mrow><annotation encoding="application/x-tex">y</annotation></semantics></math>"#,
        );
        assert_eq!(texts(&b).len(), 1);
    }

    #[test]
    fn square_root_draws_sign_and_overline() {
        let b = math("<math><msqrt><mi>x</mi></msqrt></math>");
        let t = texts(&b);
        assert_eq!(t[0].0, "√");
        assert_eq!(t[1].0, "x");
        assert!(t[1].1 > t[0].1);
        assert!(b.items.iter().any(|i| matches!(i, Item::Rect { .. })));
    }

    #[test]
    fn table_rows_stack_and_columns_align() {
        let b = math(
            "<math><mtable><mtr><mtd><mn>1</mn></mtd><mtd><mn>2</mn></mtd></mtr>\
             <mtr><mtd><mn>3</mn></mtd><mtd><mn>4</mn></mtd></mtr></mtable></math>",
        );
        let t = texts(&b);
        assert_eq!(t.len(), 4);
        assert_eq!(t[0].2, t[1].2);
        assert!(t[2].2 > t[0].2);
        assert!(t[1].1 > t[0].1);
        assert!((t[0].1 - t[2].1).abs() < 0.01);
    }

    #[test]
    fn display_sums_stack_their_limits() {
        let b = math(
            r#"<math display="block"><munderover><mo>∑</mo><mrow><mi>i</mi></mrow><mi>n</mi></munderover></math>"#,
        );
        let t = texts(&b);
        let sum = t.iter().find(|(s, ..)| s == "∑").expect("sum");
        let under = t.iter().find(|(s, ..)| s == "i").expect("lower limit");
        let over = t.iter().find(|(s, ..)| s == "n").expect("upper limit");
        assert!(over.2 < sum.2 && sum.2 < under.2);
    }
}
