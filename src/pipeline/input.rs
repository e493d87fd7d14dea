//! Source loading: turn a user-supplied path or URL into a [`SourceFile`].
//!
//! Local files keep their file name; downloads take the last URL path
//! segment, falling back to a name derived from the response's
//! `Content-Type` so the registry can still pick a converter.

use crate::error::ConvertError;
use crate::file::SourceFile;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const FALLBACK_STEM: &str = "download";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load `input` from disk or, for http(s) URLs, from the network.
pub async fn load_source(input: &str, timeout_secs: u64) -> Result<SourceFile, ConvertError> {
    if is_url(input) {
        download(input, timeout_secs).await
    } else {
        load_local(Path::new(input)).await
    }
}

async fn load_local(path: &Path) -> Result<SourceFile, ConvertError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConvertError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => ConvertError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ConvertError::FileNotFound {
            path: PathBuf::from(path),
        })?;
    debug!("Loaded '{}' ({} bytes)", path.display(), bytes.len());
    Ok(SourceFile::new(name, bytes))
}

async fn download(url: &str, timeout_secs: u64) -> Result<SourceFile, ConvertError> {
    info!("Downloading source from: {}", url);

    let failed = |reason: String| ConvertError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ConvertError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
    let name = filename_for(url, content_type.as_deref());

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    info!("Downloaded '{}' ({} bytes)", name, bytes.len());

    Ok(match content_type {
        Some(mime) if !mime.is_empty() => SourceFile::with_mime_type(name, mime, bytes.to_vec()),
        _ => SourceFile::new(name, bytes.to_vec()),
    })
}

/// Last URL path segment if it has an extension, otherwise a name built
/// from the content type.
fn filename_for(url: &str, content_type: Option<&str>) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(last) = parsed.path_segments().and_then(|mut s| s.next_back()) {
            if !last.is_empty() && last.contains('.') {
                return last.to_string();
            }
        }
    }

    let extension = content_type
        .and_then(mime_guess::get_mime_extensions_str)
        .and_then(|exts| exts.first());
    match extension {
        Some(ext) => format!("{FALLBACK_STEM}.{ext}"),
        None => FALLBACK_STEM.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/a.md"));
        assert!(is_url("http://example.com/a.md"));
        assert!(!is_url("/tmp/a.md"));
        assert!(!is_url("a.md"));
        assert!(!is_url(""));
    }

    #[test]
    fn download_names_prefer_the_url_path() {
        assert_eq!(
            filename_for("https://example.com/docs/README.md?raw=1", Some("text/plain")),
            "README.md"
        );
        assert_eq!(filename_for("https://example.com/", None), "download");
    }

    #[test]
    fn download_names_fall_back_to_content_type() {
        let name = filename_for("https://example.com/raw", Some("image/png"));
        assert_eq!(name, "download.png");
    }

    #[tokio::test]
    async fn local_files_keep_their_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"Hello")
            .unwrap();

        let file = load_source(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(file.name(), "notes.txt");
        assert_eq!(file.bytes(), b"Hello");
        assert_eq!(file.mime_type(), "text/plain");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_source("/definitely/not/here.md", 5).await.unwrap_err();
        assert!(matches!(err, ConvertError::FileNotFound { .. }));
    }
}
