//! Resource inlining: make an HTML document self-contained.
//!
//! ```text
//! html ─ collect ──┬─ <link rel=stylesheet> → fetch → @import / url() ─┐
//!                  ├─ <img src>             → fetch → data URL        ─┼─ rewrite ─ html'
//!                  └─ <style> @font-face    → fetch → data URL        ─┘
//! ```
//!
//! Two streaming passes over the markup with `lol_html`: the first collects
//! references in document order, the second splices results back in by the
//! same position. The three resource classes and every resource within a
//! class are fetched concurrently; a shared semaphore caps fetches in flight.
//!
//! Failures are skipped with a warning unless [`InlinerConfig::strict`] is
//! set, in which case the first failure aborts with
//! [`InlineError::Processing`].

pub mod css;
pub mod fetch;

pub use fetch::{Fetch, Fetched, HttpFetcher};

use crate::config::InlinerConfig;
use crate::error::InlineError;
use crate::file::data_url;
use futures::future::{join3, join_all, BoxFuture, FutureExt};
use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

/// `@import` chains deeper than this are left as references.
const MAX_IMPORT_DEPTH: usize = 8;

/// References found in the first pass, in document order per class.
#[derive(Debug, Default)]
struct Collected {
    stylesheets: Vec<String>,
    images: Vec<String>,
    styles: Vec<String>,
}

/// Substitutions computed for each collected reference, by position.
#[derive(Debug, Default)]
struct Resolved {
    stylesheets: Vec<Option<String>>,
    images: Vec<Option<String>>,
    styles: Vec<Option<String>>,
}

/// Embeds external stylesheets, images and fonts as data URLs.
///
/// Cheap to clone; clones share the fetch semaphore.
#[derive(Clone)]
pub struct ResourceInliner {
    config: InlinerConfig,
    fetcher: Arc<dyn Fetch>,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for ResourceInliner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceInliner")
            .field("config", &self.config)
            .field("fetcher", &"<dyn Fetch>")
            .finish()
    }
}

impl ResourceInliner {
    /// An inliner backed by [`HttpFetcher`].
    pub fn new(config: InlinerConfig) -> Result<Self, InlineError> {
        let fetcher = HttpFetcher::new(Duration::from_millis(config.timeout_ms))?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    pub fn with_fetcher(config: InlinerConfig, fetcher: Arc<dyn Fetch>) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            config,
            fetcher,
            permits,
        }
    }

    pub fn config(&self) -> &InlinerConfig {
        &self.config
    }

    /// Return a copy of `html` with every reachable external resource
    /// embedded.
    pub async fn inline(&self, html: &str) -> Result<String, InlineError> {
        let collected = collect(html)?;
        debug!(
            "Inlining {} stylesheet(s), {} image(s), {} style block(s)",
            collected.stylesheets.len(),
            collected.images.len(),
            collected.styles.len()
        );

        let base = self.config.base_url.as_ref();
        let (stylesheets, images, styles) = join3(
            join_all(
                collected
                    .stylesheets
                    .iter()
                    .map(|href| self.inline_stylesheet(href, base)),
            ),
            join_all(collected.images.iter().map(|src| self.inline_image(src, base))),
            join_all(
                collected
                    .styles
                    .iter()
                    .map(|text| self.inline_font_faces(text, base)),
            ),
        )
        .await;

        let resolved = Resolved {
            stylesheets: stylesheets
                .into_iter()
                .map(|r| self.settle(r))
                .collect::<Result<_, _>>()?,
            images: images
                .into_iter()
                .map(|r| self.settle(r))
                .collect::<Result<_, _>>()?,
            styles: styles
                .into_iter()
                .map(|r| self.settle(r))
                .collect::<Result<_, _>>()?,
        };

        rewrite(html, resolved)
    }

    /// Apply the failure policy to one resource outcome.
    fn settle(&self, outcome: Result<Option<String>, InlineError>) -> Result<Option<String>, InlineError> {
        match outcome {
            Ok(v) => Ok(v),
            Err(e) if self.config.strict => Err(match e {
                InlineError::Processing { .. } => e,
                other => InlineError::Processing {
                    url: resource_of(&other),
                    reason: other.to_string(),
                },
            }),
            Err(e) => {
                warn!("Skipping resource [{}]: {}", e.code(), e);
                Ok(None)
            }
        }
    }

    async fn inline_stylesheet(
        &self,
        href: &str,
        base: Option<&Url>,
    ) -> Result<Option<String>, InlineError> {
        let url = self.resolve(href, base)?;
        let Some((_, body)) = self.fetch(&url).await? else {
            return Ok(None);
        };
        let text = stylesheet_text(&url, body)?;
        let css = self.process_css(text, Some(url), 0).await?;
        Ok(Some(css))
    }

    async fn inline_image(
        &self,
        src: &str,
        base: Option<&Url>,
    ) -> Result<Option<String>, InlineError> {
        let url = self.resolve(src, base)?;
        Ok(self
            .fetch(&url)
            .await?
            .map(|(mime, body)| data_url(&mime, &body)))
    }

    async fn inline_font_faces(
        &self,
        text: &str,
        base: Option<&Url>,
    ) -> Result<Option<String>, InlineError> {
        let references = css::font_face_references(text);
        if references.is_empty() {
            return Ok(None);
        }
        let resolved = self.resolve_urls(&references, base).await?;
        Ok(Some(css::replace_font_face_urls(text, &resolved)))
    }

    /// Resolve this sheet's own `url()` references against `base`, then
    /// splice in `@import`ed sheets, each already resolved against its own
    /// URL. Imported text is never rescanned with this sheet's base.
    fn process_css<'a>(
        &'a self,
        text: String,
        base: Option<Url>,
        depth: usize,
    ) -> BoxFuture<'a, Result<String, InlineError>> {
        async move {
            let mut text = text;

            let urls = css::url_references(&text);
            if !urls.is_empty() {
                let resolved = self.resolve_urls(&urls, base.as_ref()).await?;
                text = css::replace_urls(&text, &resolved);
            }

            let imports = css::import_references(&text);
            if !imports.is_empty() {
                if depth >= MAX_IMPORT_DEPTH {
                    warn!("@import depth limit reached; leaving {} import(s)", imports.len());
                } else {
                    let outcomes = join_all(
                        imports
                            .iter()
                            .map(|r| self.import_stylesheet(r, base.as_ref(), depth)),
                    )
                    .await;
                    let mut resolved = HashMap::new();
                    for (reference, outcome) in imports.into_iter().zip(outcomes) {
                        if let Some(css) = self.settle(outcome)? {
                            resolved.insert(reference, css);
                        }
                    }
                    text = css::replace_imports(&text, &resolved);
                }
            }
            Ok(text)
        }
        .boxed()
    }

    async fn import_stylesheet(
        &self,
        reference: &str,
        base: Option<&Url>,
        depth: usize,
    ) -> Result<Option<String>, InlineError> {
        let url = self.resolve(reference, base)?;
        let Some((_, body)) = self.fetch(&url).await? else {
            return Ok(None);
        };
        let text = stylesheet_text(&url, body)?;
        self.process_css(text, Some(url), depth + 1).await.map(Some)
    }

    /// Fetch each reference as a data URL. Skipped references are absent
    /// from the map.
    async fn resolve_urls(
        &self,
        references: &[String],
        base: Option<&Url>,
    ) -> Result<HashMap<String, String>, InlineError> {
        let outcomes = join_all(references.iter().map(|r| async move {
            let url = self.resolve(r, base)?;
            Ok(self
                .fetch(&url)
                .await?
                .map(|(mime, body)| data_url(&mime, &body)))
        }))
        .await;

        let mut resolved = HashMap::new();
        for (reference, outcome) in references.iter().zip(outcomes) {
            if let Some(data) = self.settle(outcome)? {
                resolved.insert(reference.clone(), data);
            }
        }
        Ok(resolved)
    }

    /// Resolve a reference, refusing `file:` URLs unless they are enabled.
    fn resolve(&self, reference: &str, base: Option<&Url>) -> Result<Url, InlineError> {
        let url = resolve(reference, base)?;
        if url.scheme() == "file" && !self.config.allow_file_urls {
            return Err(InlineError::InvalidUrl {
                url: url.to_string(),
            });
        }
        Ok(url)
    }

    /// One bounded fetch. `Ok(None)` when the resource is over the size cap.
    async fn fetch(&self, url: &Url) -> Result<Option<(String, Vec<u8>)>, InlineError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| InlineError::Processing {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let limit = Duration::from_millis(self.config.timeout_ms);
        let fetched = tokio::time::timeout(limit, self.fetcher.fetch(url, self.config.max_size))
            .await
            .map_err(|_| InlineError::Timeout {
                url: url.to_string(),
                ms: self.config.timeout_ms,
            })??;

        match fetched {
            Fetched::TooLarge { size } => {
                warn!(
                    "Skipping '{}': {} bytes exceeds the {} byte limit",
                    url, size, self.config.max_size
                );
                Ok(None)
            }
            Fetched::Resource { content_type, body } => {
                let mime = content_type
                    .as_deref()
                    .and_then(|ct| ct.split(';').next())
                    .map(|ct| ct.trim().to_string())
                    .filter(|ct| !ct.is_empty())
                    .unwrap_or_else(|| {
                        mime_guess::from_path(url.path())
                            .first_or_octet_stream()
                            .to_string()
                    });
                Ok(Some((mime, body)))
            }
        }
    }
}

/// Resolve a reference against the base URL. Absolute `http(s)`, `file` and
/// protocol-relative URLs need no base. A relative reference against a
/// `file:` base is a `file:` URL.
fn resolve(reference: &str, base: Option<&Url>) -> Result<Url, InlineError> {
    let reference = reference.trim();
    let invalid = || InlineError::InvalidUrl {
        url: reference.to_string(),
    };
    match Url::parse(reference) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "file") => Ok(url),
        Ok(_) => Err(invalid()),
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base.join(reference).map_err(|_| invalid()),
            None if reference.starts_with("//") => {
                Url::parse(&format!("https:{reference}")).map_err(|_| invalid())
            }
            None => Err(invalid()),
        },
        Err(_) => Err(invalid()),
    }
}

fn stylesheet_text(url: &Url, body: Vec<u8>) -> Result<String, InlineError> {
    String::from_utf8(body).map_err(|e| InlineError::Processing {
        url: url.to_string(),
        reason: format!("stylesheet is not UTF-8: {e}"),
    })
}

fn resource_of(e: &InlineError) -> String {
    match e {
        InlineError::Parse(_) => String::new(),
        InlineError::InvalidUrl { url }
        | InlineError::Timeout { url, .. }
        | InlineError::Network { url, .. }
        | InlineError::Processing { url, .. } => url.clone(),
    }
}

fn is_stylesheet_link(el: &lol_html::html_content::Element<'_, '_>) -> bool {
    let rel = el.get_attribute("rel").unwrap_or_default();
    rel.split_ascii_whitespace()
        .any(|t| t.eq_ignore_ascii_case("stylesheet"))
        && el.get_attribute("href").is_some_and(|h| css::is_external(&h))
}

fn has_external_src(el: &lol_html::html_content::Element<'_, '_>) -> bool {
    el.get_attribute("src").is_some_and(|s| css::is_external(&s))
}

// ── Passes ───────────────────────────────────────────────────────────────

fn collect(html: &str) -> Result<Collected, InlineError> {
    let collected = Rc::new(RefCell::new(Collected::default()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("link[href]", {
                    let collected = Rc::clone(&collected);
                    move |el| {
                        if is_stylesheet_link(el) {
                            if let Some(href) = el.get_attribute("href") {
                                collected.borrow_mut().stylesheets.push(href);
                            }
                        }
                        Ok(())
                    }
                }),
                element!("img[src]", {
                    let collected = Rc::clone(&collected);
                    move |el| {
                        if has_external_src(el) {
                            if let Some(src) = el.get_attribute("src") {
                                collected.borrow_mut().images.push(src);
                            }
                        }
                        Ok(())
                    }
                }),
                element!("style", {
                    let collected = Rc::clone(&collected);
                    move |_| {
                        collected.borrow_mut().styles.push(String::new());
                        Ok(())
                    }
                }),
                text!("style", {
                    let collected = Rc::clone(&collected);
                    move |t| {
                        if let Some(current) = collected.borrow_mut().styles.last_mut() {
                            current.push_str(t.as_str());
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::new()
        },
    )
    .map_err(|e| InlineError::Parse(e.to_string()))?;

    Ok(Rc::try_unwrap(collected)
        .map(|cell| cell.into_inner())
        .unwrap_or_else(|rc| std::mem::take(&mut *rc.borrow_mut())))
}

fn rewrite(html: &str, resolved: Resolved) -> Result<String, InlineError> {
    let resolved = Rc::new(RefCell::new(resolved));
    let cursor = Rc::new(RefCell::new((0usize, 0usize, 0usize)));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("link[href]", {
                    let resolved = Rc::clone(&resolved);
                    let cursor = Rc::clone(&cursor);
                    move |el| {
                        if !is_stylesheet_link(el) {
                            return Ok(());
                        }
                        let idx = {
                            let mut c = cursor.borrow_mut();
                            c.0 += 1;
                            c.0 - 1
                        };
                        let css = resolved
                            .borrow_mut()
                            .stylesheets
                            .get_mut(idx)
                            .and_then(Option::take);
                        if let Some(css) = css {
                            let mut style = String::from("<style");
                            if let Some(media) = el.get_attribute("media") {
                                style.push_str(&format!(" media=\"{}\"", media.replace('"', "&quot;")));
                            }
                            style.push('>');
                            style.push_str(&css::escape_style_text(&css));
                            style.push_str("</style>");
                            el.replace(&style, ContentType::Html);
                        }
                        Ok(())
                    }
                }),
                element!("img[src]", {
                    let resolved = Rc::clone(&resolved);
                    let cursor = Rc::clone(&cursor);
                    move |el| {
                        if !has_external_src(el) {
                            return Ok(());
                        }
                        let idx = {
                            let mut c = cursor.borrow_mut();
                            c.1 += 1;
                            c.1 - 1
                        };
                        let data = resolved
                            .borrow_mut()
                            .images
                            .get_mut(idx)
                            .and_then(Option::take);
                        if let Some(data) = data {
                            el.set_attribute("src", &data)?;
                            el.remove_attribute("srcset");
                        }
                        Ok(())
                    }
                }),
                element!("style", {
                    let resolved = Rc::clone(&resolved);
                    let cursor = Rc::clone(&cursor);
                    move |el| {
                        let idx = {
                            let mut c = cursor.borrow_mut();
                            c.2 += 1;
                            c.2 - 1
                        };
                        let text = resolved
                            .borrow_mut()
                            .styles
                            .get_mut(idx)
                            .and_then(Option::take);
                        if let Some(text) = text {
                            el.set_inner_content(&css::escape_style_text(&text), ContentType::Html);
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::new()
        },
    )
    .map_err(|e| InlineError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves resources from a map; anything else is a network error.
    #[derive(Default)]
    struct MapFetcher {
        resources: HashMap<String, Fetched>,
        delay: Option<Duration>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        requested: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn with(mut self, url: &str, content_type: &str, body: &str) -> Self {
            self.resources.insert(
                url.to_string(),
                Fetched::Resource {
                    content_type: Some(content_type.to_string()),
                    body: body.as_bytes().to_vec(),
                },
            );
            self
        }

        fn too_large(mut self, url: &str, size: u64) -> Self {
            self.resources
                .insert(url.to_string(), Fetched::TooLarge { size });
            self
        }
    }

    #[async_trait]
    impl Fetch for MapFetcher {
        async fn fetch(&self, url: &Url, _max_size: u64) -> Result<Fetched, InlineError> {
            self.requested.lock().unwrap().push(url.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.resources
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| InlineError::Network {
                    url: url.to_string(),
                    reason: "connection refused".into(),
                })
        }
    }

    fn inliner(fetcher: MapFetcher, config: InlinerConfig) -> (ResourceInliner, Arc<MapFetcher>) {
        let fetcher = Arc::new(fetcher);
        let inliner = ResourceInliner::with_fetcher(
            config.with_base_url(Url::parse("https://site.test/page/").unwrap()),
            fetcher.clone(),
        );
        (inliner, fetcher)
    }

    #[tokio::test]
    async fn reachable_stylesheet_is_embedded_and_unreachable_is_skipped() {
        let (inliner, _) = inliner(
            MapFetcher::default().with("https://site.test/page/ok.css", "text/css", "h1{color:red}"),
            InlinerConfig::default(),
        );
        let html = r#"<html><head><link rel="stylesheet" href="ok.css"><link rel="stylesheet" href="https://down.test/x.css"></head><body></body></html>"#;

        let out = inliner.inline(html).await.unwrap();
        assert!(out.contains("<style>h1{color:red}</style>"), "got: {out}");
        assert!(out.contains(r#"href="https://down.test/x.css""#), "got: {out}");
        assert!(!out.contains(r#"href="ok.css""#));
    }

    #[tokio::test]
    async fn strict_mode_fails_on_first_unreachable_resource() {
        let (inliner, _) = inliner(
            MapFetcher::default(),
            InlinerConfig::default().with_strict(true),
        );
        let err = inliner
            .inline(r#"<link rel="stylesheet" href="https://down.test/x.css">"#)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PROCESSING_ERROR");
        assert!(err.to_string().contains("down.test"));
    }

    #[tokio::test]
    async fn oversized_image_is_left_alone() {
        let (inliner, _) = inliner(
            MapFetcher::default()
                .too_large("https://site.test/big.png", 50_000_000)
                .with("https://site.test/small.png", "image/png", "PNG"),
            InlinerConfig::default(),
        );
        let html = r#"<img src="/big.png"><img src="/small.png">"#;

        let out = inliner.inline(html).await.unwrap();
        assert!(out.contains(r#"src="/big.png""#), "got: {out}");
        assert!(out.contains(r#"src="data:image/png;base64,UE5H""#), "got: {out}");
    }

    #[tokio::test]
    async fn imports_and_urls_in_fetched_css_are_resolved_recursively() {
        let (inliner, _) = inliner(
            MapFetcher::default()
                .with(
                    "https://site.test/css/main.css",
                    "text/css",
                    "@import 'base.css';\nbody{background:url(../img/bg.png)}",
                )
                .with("https://site.test/css/base.css", "text/css", "p{margin:0}")
                .with("https://site.test/img/bg.png", "image/png", "BG"),
            InlinerConfig::default(),
        );
        let html = r#"<link rel="stylesheet" href="/css/main.css">"#;

        let out = inliner.inline(html).await.unwrap();
        assert!(out.contains("p{margin:0}"), "got: {out}");
        assert!(out.contains("url(\"data:image/png;base64,Qkc=\")"), "got: {out}");
        assert!(!out.contains("@import"));
    }

    #[tokio::test]
    async fn font_face_urls_in_style_elements_are_embedded() {
        let (inliner, _) = inliner(
            MapFetcher::default().with("https://site.test/f.woff2", "font/woff2", "F"),
            InlinerConfig::default(),
        );
        let html = "<style>@font-face{font-family:F;src:url('/f.woff2')} body{margin:0}</style>";

        let out = inliner.inline(html).await.unwrap();
        assert!(out.contains("url(\"data:font/woff2;base64,Rg==\")"), "got: {out}");
        assert!(out.contains("body{margin:0}"));
    }

    #[tokio::test]
    async fn fetches_are_capped_by_the_semaphore() {
        let fetcher = (0..8).fold(
            MapFetcher {
                delay: Some(Duration::from_millis(20)),
                ..MapFetcher::default()
            },
            |f, i| f.with(&format!("https://site.test/{i}.png"), "image/png", "x"),
        );
        let config = InlinerConfig {
            max_concurrent: 2,
            ..InlinerConfig::default()
        };
        let (inliner, fetcher) = inliner(fetcher, config);
        let html: String = (0..8).map(|i| format!(r#"<img src="/{i}.png">"#)).collect();

        let out = inliner.inline(&html).await.unwrap();
        assert_eq!(out.matches("data:image/png").count(), 8);
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_resource_times_out_and_is_skipped() {
        let fetcher = MapFetcher {
            delay: Some(Duration::from_secs(30)),
            ..MapFetcher::default()
        }
        .with("https://site.test/slow.png", "image/png", "x");
        let (inliner, _) = inliner(fetcher, InlinerConfig::default());

        let out = inliner.inline(r#"<img src="/slow.png">"#).await.unwrap();
        assert!(out.contains(r#"src="/slow.png""#));
    }

    #[tokio::test]
    async fn relative_reference_without_base_is_invalid() {
        let inliner =
            ResourceInliner::with_fetcher(InlinerConfig::default().with_strict(true), Arc::new(MapFetcher::default()));
        let err = inliner.inline(r#"<img src="rel.png">"#).await.unwrap_err();
        assert!(err.to_string().contains("rel.png"));
    }

    #[tokio::test]
    async fn data_urls_are_not_fetched() {
        let (inliner, fetcher) = inliner(MapFetcher::default(), InlinerConfig::default());
        let html = r#"<img src="data:image/png;base64,AAAA">"#;
        let out = inliner.inline(html).await.unwrap();
        assert_eq!(out, html);
        assert!(fetcher.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn imported_sheet_urls_keep_their_own_base() {
        let (inliner, fetcher) = inliner(
            MapFetcher::default()
                .with(
                    "https://site.test/css/main.css",
                    "text/css",
                    "@import 'sub/base.css';\nbody{background:url(img/bg.png)}",
                )
                .with(
                    "https://site.test/css/sub/base.css",
                    "text/css",
                    "p{background:url(dot.png)}",
                )
                .with("https://site.test/css/img/bg.png", "image/png", "BG")
                .with("https://site.test/css/dot.png", "image/png", "WRONG"),
            InlinerConfig::default(),
        );
        let out = inliner
            .inline(r#"<link rel="stylesheet" href="/css/main.css">"#)
            .await
            .unwrap();

        assert!(out.contains("url(\"data:image/png;base64,Qkc=\")"), "got: {out}");
        assert!(out.contains("p{background:url(dot.png)}"), "got: {out}");
        let requested = fetcher.requested.lock().unwrap();
        assert!(requested.contains(&"https://site.test/css/sub/dot.png".to_string()));
        assert!(!requested.contains(&"https://site.test/css/dot.png".to_string()));
    }

    #[tokio::test]
    async fn file_urls_are_refused_unless_enabled() {
        use std::io::Write;

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"SECRET").unwrap();
        let url = Url::from_file_path(tmp.path()).unwrap();
        let html = format!(r#"<img src="{url}">"#);

        let (inliner, fetcher) = inliner(MapFetcher::default(), InlinerConfig::default());
        let out = inliner.inline(&html).await.unwrap();
        assert_eq!(out, html);
        assert!(fetcher.requested.lock().unwrap().is_empty());

        let strict = ResourceInliner::with_fetcher(
            InlinerConfig::default()
                .with_strict(true)
                .with_base_url(Url::parse("file:///etc/").unwrap()),
            Arc::new(MapFetcher::default()),
        );
        let err = strict.inline(r#"<img src="passwd">"#).await.unwrap_err();
        assert!(err.to_string().contains("file:///etc/passwd"), "{err}");

        let enabled = ResourceInliner::new(InlinerConfig::default().with_file_urls(true)).unwrap();
        let out = enabled.inline(&html).await.unwrap();
        assert!(out.contains("base64,U0VDUkVU"), "got: {out}");
    }
}
