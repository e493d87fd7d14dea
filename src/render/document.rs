//! Composition of the isolated document a surface loads.

use crate::config::{RenderOptions, Stylesheet, SurfaceWidth};
use crate::inline::css::escape_style_text;

/// Id of the element wrapping the rendered fragment.
pub const ROOT_ID: &str = "render-root";

/// Nothing may load from the network once the document is on the surface;
/// inlined `data:` resources are the only external content allowed.
const CONTENT_SECURITY_POLICY: &str =
    "default-src 'none'; img-src data:; style-src 'unsafe-inline'; font-src data:";

/// Wrap an HTML fragment in a standalone document: CSP, reset styles, the
/// requested stylesheets, and a padded root container.
pub fn compose(fragment: &str, options: &RenderOptions) -> String {
    let mut head = String::new();
    head.push_str(&format!(
        "<style>html,body{{margin:0;padding:0;background:{}}}</style>\n",
        attribute_safe(&options.background)
    ));
    for sheet in &options.stylesheets {
        match sheet {
            Stylesheet::Inline(css) => {
                head.push_str("<style>");
                head.push_str(&escape_style_text(css));
                head.push_str("</style>\n");
            }
            Stylesheet::External(url) => {
                head.push_str(&format!(
                    "<link rel=\"stylesheet\" href=\"{}\">\n",
                    attribute_safe(url)
                ));
            }
        }
    }

    let width = match options.width {
        SurfaceWidth::Fixed(px) => format!("{px}px"),
        SurfaceWidth::Content => "min-content".to_string(),
    };

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
<meta http-equiv=\"Content-Security-Policy\" content=\"{CONTENT_SECURITY_POLICY}\">\n\
{head}</head>\n<body>\n<div id=\"{ROOT_ID}\" style=\"padding:{margin}px;width:{width};box-sizing:border-box\">{fragment}</div>\n</body>\n</html>\n",
        margin = options.margin_px,
    )
}

/// Escape text for use as HTML element content.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn attribute_safe(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_carries_csp_reset_and_stylesheets_in_order() {
        let options = RenderOptions::builder()
            .margin_px(0.0)
            .stylesheet(Stylesheet::Inline("p{color:red}".into()))
            .stylesheet(Stylesheet::External("https://cdn.test/a.css".into()))
            .build()
            .unwrap();
        let doc = compose("<p>x</p>", &options);

        assert!(doc.contains("Content-Security-Policy"));
        let reset = doc.find("html,body{margin:0").unwrap();
        let inline = doc.find("<style>p{color:red}</style>").unwrap();
        let link = doc.find(r#"<link rel="stylesheet" href="https://cdn.test/a.css">"#).unwrap();
        assert!(reset < inline && inline < link);
        assert!(doc.contains(r#"<div id="render-root" style="padding:0px;width:816px"#));
        assert!(doc.contains("<p>x</p></div>"));
    }

    #[test]
    fn escape_text_neutralises_markup() {
        assert_eq!(escape_text("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(escape_text("plain\nlines"), "plain\nlines");
    }

    #[test]
    fn content_width_uses_min_content() {
        let options = RenderOptions::builder()
            .width(SurfaceWidth::Content)
            .build()
            .unwrap();
        assert!(compose("", &options).contains("width:min-content"));
    }
}
