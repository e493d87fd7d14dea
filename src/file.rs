//! In-memory files and their transport form.
//!
//! [`SourceFile`] is what converters consume and produce. [`SerializedFile`]
//! is the shape a file takes when it crosses the bridge between execution
//! contexts: raw bytes become a base64 data URL.

use crate::error::ConvertError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// MIME type of every converted image.
pub const PNG_MIME: &str = "image/png";

const FALLBACK_MIME: &str = "application/octet-stream";

/// A named blob of bytes with a MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl SourceFile {
    /// Create a file, guessing its MIME type from the name.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_raw()
            .unwrap_or(FALLBACK_MIME)
            .to_string();
        Self {
            name,
            mime_type,
            bytes: bytes.into(),
        }
    }

    /// Create a file with an explicit MIME type.
    pub fn with_mime_type(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Wrap a PNG data URL produced by the renderer as `<basename>.png`.
    pub fn png_from_data_url(source_name: &str, data_url: &str) -> Result<Self, ConvertError> {
        let (_, bytes) = decode_data_url(data_url)?;
        Ok(Self::with_mime_type(png_name(source_name), PNG_MIME, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Lower-case extension including the dot, e.g. `".md"`.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }

    /// File contents as text. Invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Contents as a `data:` URL.
    pub fn to_data_url(&self) -> String {
        data_url(&self.mime_type, &self.bytes)
    }
}

/// Transport-safe file representation.
///
/// Either `data_url` and `filename` are present and `error` is absent, or
/// `error` is present and every other field is absent. The constructors are
/// the only way to build one in-process; [`SerializedFile::into_file`]
/// rejects anything else arriving over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedFile {
    data_url: Option<String>,
    filename: Option<String>,
    mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SerializedFile {
    pub fn from_file(file: &SourceFile) -> Self {
        Self {
            data_url: Some(file.to_data_url()),
            filename: Some(file.name.clone()),
            mime_type: Some(file.mime_type.clone()),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            data_url: None,
            filename: None,
            mime_type: None,
            error: Some(message.into()),
        }
    }

    /// Serialize the outcome of a conversion.
    pub fn from_result(result: Result<SourceFile, ConvertError>) -> Self {
        match result {
            Ok(file) => Self::from_file(&file),
            Err(e) => Self::failure(e.to_string()),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Turn the transport form back into a file.
    ///
    /// A carried error, a missing field, or a mix of both is a
    /// [`ConvertError::Deserialize`].
    pub fn into_file(self) -> Result<SourceFile, ConvertError> {
        let filename = self.filename.unwrap_or_default();
        if let Some(error) = self.error {
            return Err(ConvertError::Deserialize {
                filename,
                reason: error,
            });
        }
        let data_url = match self.data_url {
            Some(url) if !filename.is_empty() => url,
            _ => {
                return Err(ConvertError::Deserialize {
                    filename,
                    reason: "missing data URL or filename".into(),
                })
            }
        };
        let (url_mime, bytes) = decode_data_url(&data_url)?;
        let mime_type = self
            .mime_type
            .filter(|m| !m.is_empty())
            .or(url_mime)
            .unwrap_or_else(|| FALLBACK_MIME.to_string());
        Ok(SourceFile::with_mime_type(filename, mime_type, bytes))
    }
}

// ── Name helpers ─────────────────────────────────────────────────────────

/// Case-insensitive extension: the final `.`-delimited suffix, lower-cased,
/// with its dot. `None` when the name has no dot.
pub fn extension_of(filename: &str) -> Option<String> {
    let idx = filename.rfind('.')?;
    let ext = &filename[idx..];
    if ext.len() < 2 {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Output name for a converted file: the last extension replaced by `.png`.
pub fn png_name(filename: &str) -> String {
    let base = match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    };
    format!("{base}.png")
}

// ── Data URLs ────────────────────────────────────────────────────────────

/// Encode bytes as a base64 `data:` URL.
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Decode a `data:` URL into its MIME type (if any) and payload.
///
/// Non-base64 payloads are returned verbatim.
pub fn decode_data_url(url: &str) -> Result<(Option<String>, Vec<u8>), ConvertError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ConvertError::InvalidDataUrl {
            reason: "missing 'data:' prefix".into(),
        })?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ConvertError::InvalidDataUrl {
            reason: "missing ',' separator".into(),
        })?;

    let mut params = header.split(';');
    let mime = params
        .next()
        .filter(|m| !m.is_empty())
        .map(|m| m.to_string());
    let is_base64 = params.any(|p| p.eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| ConvertError::InvalidDataUrl {
                reason: e.to_string(),
            })?
    } else {
        payload.as_bytes().to_vec()
    };
    Ok((mime, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_final_suffix_lowercased() {
        assert_eq!(extension_of("Notes.MD").as_deref(), Some(".md"));
        assert_eq!(extension_of("archive.tar.GZ").as_deref(), Some(".gz"));
        assert_eq!(extension_of("Makefile"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[test]
    fn png_name_replaces_last_extension() {
        assert_eq!(png_name("Notes.MD"), "Notes.png");
        assert_eq!(png_name("main.test.ts"), "main.test.png");
        assert_eq!(png_name("README"), "README.png");
    }

    #[test]
    fn mime_type_is_guessed_from_name() {
        let f = SourceFile::new("photo.png", vec![1, 2, 3]);
        assert_eq!(f.mime_type(), "image/png");
        let f = SourceFile::new("blob.unknownext", vec![]);
        assert_eq!(f.mime_type(), "application/octet-stream");
    }

    #[test]
    fn serialized_file_success_carries_no_error() {
        let f = SourceFile::new("a.txt", b"hi".to_vec());
        let s = SerializedFile::from_file(&f);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["filename"], "a.txt");
        assert_eq!(json["mimeType"], "text/plain");
        assert!(json.get("error").is_none());
        assert_eq!(s.into_file().unwrap(), f);
    }

    #[test]
    fn serialized_failure_has_only_error() {
        let s = SerializedFile::failure("boom");
        let json = serde_json::to_value(&s).unwrap();
        assert!(json["dataUrl"].is_null());
        assert!(json["filename"].is_null());
        assert!(json["mimeType"].is_null());
        assert_eq!(json["error"], "boom");
        assert!(matches!(
            s.into_file(),
            Err(ConvertError::Deserialize { .. })
        ));
    }

    #[test]
    fn mixed_wire_payload_is_rejected() {
        let s: SerializedFile = serde_json::from_str(
            r#"{"dataUrl":"data:text/plain;base64,aGk=","filename":"a.txt","mimeType":"text/plain","error":"late failure"}"#,
        )
        .unwrap();
        assert!(s.into_file().is_err());
    }

    #[test]
    fn decode_rejects_non_data_urls() {
        assert!(decode_data_url("https://example.com/a.png").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
    }

    #[test]
    fn decode_plain_payload() {
        let (mime, bytes) = decode_data_url("data:image/svg+xml;utf8,<svg/>").unwrap();
        assert_eq!(mime.as_deref(), Some("image/svg+xml"));
        assert_eq!(bytes, b"<svg/>");
    }
}
