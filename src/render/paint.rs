//! Rasterise a laid-out [`Page`] into RGBA pixels.
//!
//! The page is emitted as one SVG document (a background rect, text runs and
//! `<image>` elements for embedded pictures) and rendered by resvg at the
//! requested device pixel ratio. Colors pass through as CSS strings and are
//! parsed by usvg.

use super::fonts::FONTDB;
use super::layout::{Item, Page};
use crate::error::ConvertError;
use image::RgbaImage;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg;
use std::fmt::Write as _;
use tracing::debug;

/// Longest edge of a capture in device pixels. Larger captures are scaled
/// down to fit.
pub const MAX_CAPTURE_PX: f32 = 16_384.0;

/// Paint `page` onto a `width × height` CSS-pixel canvas at `pixel_ratio`.
pub fn paint(
    page: &Page,
    width: f32,
    height: f32,
    pixel_ratio: f32,
    background: &str,
) -> Result<RgbaImage, ConvertError> {
    let width = width.max(1.0);
    let height = height.max(1.0);
    let longest = width.max(height) * pixel_ratio;
    let ratio = if longest > MAX_CAPTURE_PX {
        pixel_ratio * MAX_CAPTURE_PX / longest
    } else {
        pixel_ratio
    };
    let px_w = (width * ratio).ceil() as u32;
    let px_h = (height * ratio).ceil() as u32;

    let svg = to_svg(page, width, height, background);
    let options = usvg::Options {
        fontdb: FONTDB.clone(),
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(&svg, &options).map_err(|e| ConvertError::Render {
        message: format!("capture document rejected: {e}"),
    })?;

    let mut pixmap = Pixmap::new(px_w.max(1), px_h.max(1)).ok_or_else(|| ConvertError::Render {
        message: format!("cannot allocate {px_w}x{px_h} capture"),
    })?;
    resvg::render(&tree, Transform::from_scale(ratio, ratio), &mut pixmap.as_mut());
    debug!("Captured {}x{} px at ratio {:.2}", px_w, px_h, ratio);

    let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = image::Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Ok(out)
}

/// The SVG document painted for `page`.
pub fn to_svg(page: &Page, width: f32, height: f32, background: &str) -> String {
    let mut svg = String::with_capacity(256 + page.items.len() * 96);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    let background = if background.trim().is_empty() {
        "white"
    } else {
        background
    };
    let _ = write!(
        svg,
        r#"<rect x="0" y="0" width="{width}" height="{height}" fill="{}"/>"#,
        escape(background)
    );

    for item in &page.items {
        match item {
            Item::Rect {
                x,
                y,
                width,
                height,
                color,
            } => {
                let _ = write!(
                    svg,
                    r#"<rect x="{x}" y="{y}" width="{width}" height="{height}" fill="{}"/>"#,
                    escape(color)
                );
            }
            Item::Text {
                x,
                baseline,
                text,
                style,
            } => {
                let family = style.typeface().families();
                let _ = write!(
                    svg,
                    r#"<text x="{x}" y="{baseline}" font-size="{}" font-family="{family}" fill="{}""#,
                    style.font_size,
                    escape(&style.color)
                );
                if style.bold {
                    svg.push_str(r#" font-weight="bold""#);
                }
                if style.italic {
                    svg.push_str(r#" font-style="italic""#);
                }
                if style.underline {
                    svg.push_str(r#" text-decoration="underline""#);
                }
                let _ = write!(svg, r#" xml:space="preserve">{}</text>"#, escape(text));
            }
            Item::Image {
                x,
                y,
                width,
                height,
                href,
            } => {
                let _ = write!(
                    svg,
                    r#"<image x="{x}" y="{y}" width="{width}" height="{height}" preserveAspectRatio="none" xlink:href="{}"/>"#,
                    escape(href)
                );
            }
        }
    }
    svg.push_str("</svg>");
    svg
}

/// XML-escape text and attribute values, dropping characters XML forbids.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::layout::RunStyle;

    fn text_page() -> Page {
        Page {
            width: 50.0,
            height: 20.0,
            items: vec![Item::Text {
                x: 2.0,
                baseline: 14.0,
                text: "a<b & \"c\"\u{1}".into(),
                style: RunStyle {
                    font_size: 12.0,
                    bold: true,
                    italic: false,
                    monospace: true,
                    serif: false,
                    underline: false,
                    color: "#333".into(),
                },
            }],
        }
    }

    #[test]
    fn svg_escapes_text() {
        let svg = to_svg(&text_page(), 50.0, 20.0, "white");
        assert!(svg.contains("a&lt;b &amp; &quot;c&quot;</text>"));
        assert!(svg.contains(r#"font-weight="bold""#));
        assert!(svg.contains("monospace"));
    }

    #[test]
    fn capture_size_follows_pixel_ratio_and_background() {
        let page = Page {
            width: 10.0,
            height: 5.0,
            items: vec![],
        };
        let img = paint(&page, 10.0, 5.0, 2.0, "white").unwrap();
        assert_eq!(img.dimensions(), (20, 10));
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);

        let img = paint(&page, 10.0, 5.0, 1.0, "#ff0000").unwrap();
        assert_eq!(img.get_pixel(3, 3).0, [255, 0, 0, 255]);
    }

    #[test]
    fn rect_items_are_painted() {
        let page = Page {
            width: 10.0,
            height: 10.0,
            items: vec![Item::Rect {
                x: 0.0,
                y: 5.0,
                width: 10.0,
                height: 5.0,
                color: "black".into(),
            }],
        };
        let img = paint(&page, 10.0, 10.0, 1.0, "white").unwrap();
        assert_eq!(img.get_pixel(5, 1).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(5, 8).0, [0, 0, 0, 255]);
    }

    #[test]
    fn oversized_capture_is_scaled_down() {
        let page = Page::default();
        let img = paint(&page, 20_000.0, 10.0, 2.0, "white").unwrap();
        assert!(img.width() as f32 <= MAX_CAPTURE_PX);
    }
}
