//! Resource fetching for the inliner.
//!
//! The inliner only sees the [`Fetch`] trait so tests and embedders can
//! serve resources from memory. [`HttpFetcher`] is the production
//! implementation: `http(s)` through reqwest, `file:` through tokio's fs. The
//! inliner only hands `file:` URLs over when `allow_file_urls` is set.

use crate::error::InlineError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Outcome of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// The resource body and its declared content type.
    Resource {
        content_type: Option<String>,
        body: Vec<u8>,
    },
    /// The resource exceeds the size cap and was not downloaded in full.
    TooLarge { size: u64 },
}

/// Source of external resources.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url`, reporting [`Fetched::TooLarge`] instead of the body when
    /// the resource is larger than `max_size` bytes.
    async fn fetch(&self, url: &Url, max_size: u64) -> Result<Fetched, InlineError>;
}

/// Fetches `http`, `https` and `file` URLs.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_ms: u64,
}

impl HttpFetcher {
    /// Build a fetcher whose client aborts any request after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, InlineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InlineError::Network {
                url: String::new(),
                reason: format!("HTTP client build failed: {e}"),
            })?;
        Ok(Self {
            client,
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    async fn fetch_http(&self, url: &Url, max_size: u64) -> Result<Fetched, InlineError> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                InlineError::Timeout {
                    url: url.to_string(),
                    ms: self.timeout_ms,
                }
            } else {
                InlineError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(InlineError::Network {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        // Reject on the declared length before downloading the body.
        if let Some(len) = response.content_length() {
            if len > max_size {
                return Ok(Fetched::TooLarge { size: len });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let body = response.bytes().await.map_err(|e| InlineError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if body.len() as u64 > max_size {
            return Ok(Fetched::TooLarge {
                size: body.len() as u64,
            });
        }

        debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(Fetched::Resource {
            content_type,
            body: body.to_vec(),
        })
    }

    async fn fetch_file(&self, url: &Url, max_size: u64) -> Result<Fetched, InlineError> {
        let path = url.to_file_path().map_err(|_| InlineError::InvalidUrl {
            url: url.to_string(),
        })?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| InlineError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if meta.len() > max_size {
            return Ok(Fetched::TooLarge { size: meta.len() });
        }
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| InlineError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Fetched::Resource {
            content_type: None,
            body,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &Url, max_size: u64) -> Result<Fetched, InlineError> {
        match url.scheme() {
            "http" | "https" => self.fetch_http(url, max_size).await,
            "file" => self.fetch_file(url, max_size).await,
            _ => Err(InlineError::InvalidUrl {
                url: url.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn file_urls_respect_size_cap() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 64]).unwrap();
        let url = Url::from_file_path(tmp.path()).unwrap();
        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();

        let small = fetcher.fetch(&url, 32).await.unwrap();
        assert_eq!(small, Fetched::TooLarge { size: 64 });

        let full = fetcher.fetch(&url, 1024).await.unwrap();
        assert!(matches!(full, Fetched::Resource { ref body, .. } if body.len() == 64));
    }

    #[tokio::test]
    async fn unsupported_scheme_is_invalid_url() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        let url = Url::parse("ftp://example.com/a.css").unwrap();
        let err = fetcher.fetch(&url, 1024).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_URL");
    }
}
