//! Error types for the upload-convert library.
//!
//! Four error types reflect four distinct failure domains:
//!
//! * [`ConvertError`]: **Fatal for one file**: the file cannot be turned
//!   into an acceptable upload (unsupported extension, render failure, bad
//!   data URL). Returned as `Err(ConvertError)` from the top-level
//!   `convert*` functions and from [`crate::registry::ConverterRegistry`].
//!
//! * [`FileError`]: **Non-fatal**: one file in a batch failed but the
//!   others are fine. Stored inside [`crate::output::FileResult`] so callers
//!   can inspect partial success rather than losing the whole batch.
//!
//! * [`InlineError`]: a resource referenced by an HTML document could not
//!   be inlined. Only surfaces when the inliner runs in strict mode; by
//!   default the resource is skipped with a warning.
//!
//! * [`BridgeError`]: the privileged rendering context could not be
//!   created, never signalled readiness, went away, or answered with a
//!   failure. `Clone` because one creation failure is delivered to every
//!   caller waiting on it.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the upload-convert library.
///
/// Batch-level failures use [`FileError`] and are stored in
/// [`crate::output::FileResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Registry errors ───────────────────────────────────────────────────
    /// No registered converter claims the file's extension.
    #[error("Unsupported file type: '{extension}'\nRun `upconv --list` to see supported extensions.")]
    UnsupportedFileType { extension: String },

    /// Two converters (or a converter and the built-in passthrough set)
    /// claim the same extension.
    #[error("Failed to load module {module}. Conflicting extension {extension}")]
    ExtensionConflict { module: String, extension: String },

    /// Two converters were registered under the same slug.
    #[error("Failed to load module {slug}. A module with this slug is already loaded")]
    DuplicateSlug { slug: String },

    /// A converter descriptor is malformed (empty slug, extension without dot, …).
    #[error("Invalid module descriptor '{module}': {reason}")]
    InvalidDescriptor { module: String, reason: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The renderer produced no image for the file.
    #[error("Converter '{converter}' produced no image for '{filename}'")]
    RenderFailed { converter: String, filename: String },

    /// The document could not be rendered at all (layout, rasterisation, encode).
    #[error("Rendering failed: {message}")]
    Render { message: String },

    /// The isolated surface did not finish loading in time.
    #[error("Rendering surface did not finish loading within {ms}ms")]
    LoadTimeout { ms: u64 },

    /// Markdown could not be rendered to HTML.
    #[error("Markdown rendering failed: {message}")]
    Markdown { message: String },

    /// Syntax highlighting failed for the given language.
    #[error("Highlighting '{language}' failed: {message}")]
    Highlight { language: String, message: String },

    /// A data URL was malformed or not base64.
    #[error("Invalid data URL: {reason}")]
    InvalidDataUrl { reason: String },

    /// A serialized file could not be turned back into a file.
    #[error("Cannot deserialize file '{filename}': {reason}")]
    Deserialize { filename: String, reason: String },

    /// A resource referenced by the document could not be inlined.
    #[error(transparent)]
    Inline(#[from] InlineError),

    /// The privileged rendering context failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Input file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output image.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single file in a batch.
///
/// Stored alongside [`crate::output::FileResult`] when a file fails.
/// The batch continues regardless.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// Source could not be loaded from disk or network.
    #[error("{input}: could not be loaded: {detail}")]
    LoadFailed { input: String, detail: String },

    /// No converter claims the extension.
    #[error("{filename}: unsupported file type '{extension}'")]
    Unsupported { filename: String, extension: String },

    /// A converter ran but failed.
    #[error("{filename}: conversion failed: {detail}")]
    ConversionFailed { filename: String, detail: String },
}

/// Why a resource could not be inlined.
///
/// Each variant maps to a stable machine-readable [`code`](Self::code).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InlineError {
    /// The HTML or CSS could not be parsed.
    #[error("Failed to parse document: {0}")]
    Parse(String),

    /// A resource reference does not resolve to a fetchable URL.
    #[error("Invalid resource URL '{url}'")]
    InvalidUrl { url: String },

    /// Fetching the resource exceeded the per-resource timeout.
    #[error("Timed out after {ms}ms fetching '{url}'")]
    Timeout { url: String, ms: u64 },

    /// The resource could not be fetched.
    #[error("Network error fetching '{url}': {reason}")]
    Network { url: String, reason: String },

    /// The resource was fetched but could not be embedded.
    #[error("Failed to process '{url}': {reason}")]
    Processing { url: String, reason: String },
}

impl InlineError {
    /// Stable error code, independent of the message wording.
    pub fn code(&self) -> &'static str {
        match self {
            InlineError::Parse(_) => "PARSE_ERROR",
            InlineError::InvalidUrl { .. } => "INVALID_URL",
            InlineError::Timeout { .. } => "TIMEOUT",
            InlineError::Network { .. } => "NETWORK_ERROR",
            InlineError::Processing { .. } => "PROCESSING_ERROR",
        }
    }
}

/// Failures of the cross-context bridge.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The host refused to create the rendering context.
    #[error("Failed to create rendering context: {0}")]
    ContextCreationFailed(String),

    /// The context was created but never signalled readiness.
    #[error("Rendering context did not become ready within {ms}ms")]
    ContextInitializationTimeout { ms: u64 },

    /// The context went away while a request was pending.
    #[error("Rendering context closed before replying")]
    ContextClosed,

    /// The context accepted a request but never answered it.
    #[error("Request '{action}' timed out after {ms}ms")]
    RequestTimeout { action: String, ms: u64 },

    /// The context answered with a failure.
    #[error("Request '{action}' failed in rendering context: {message}")]
    Remote { action: String, message: String },

    /// The context answered with a reply of the wrong kind.
    #[error("Unexpected reply to '{action}'")]
    UnexpectedReply { action: String },

    /// A lifecycle operation was requested in a state that forbids it.
    #[error("Cannot {action} while rendering context is {state}")]
    IllegalTransition {
        state: &'static str,
        action: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_display_names_module_and_extension() {
        let e = ConvertError::ExtensionConflict {
            module: "plantuml".into(),
            extension: ".puml".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("plantuml"), "got: {msg}");
        assert!(msg.contains(".puml"), "got: {msg}");
    }

    #[test]
    fn unsupported_display() {
        let e = ConvertError::UnsupportedFileType {
            extension: ".exe".into(),
        };
        assert!(e.to_string().contains(".exe"));
    }

    #[test]
    fn inline_error_codes_are_stable() {
        assert_eq!(InlineError::Parse("x".into()).code(), "PARSE_ERROR");
        assert_eq!(
            InlineError::InvalidUrl { url: "::".into() }.code(),
            "INVALID_URL"
        );
        assert_eq!(
            InlineError::Timeout {
                url: "https://a".into(),
                ms: 5
            }
            .code(),
            "TIMEOUT"
        );
        assert_eq!(
            InlineError::Network {
                url: "https://a".into(),
                reason: "refused".into()
            }
            .code(),
            "NETWORK_ERROR"
        );
        assert_eq!(
            InlineError::Processing {
                url: "https://a".into(),
                reason: "utf-8".into()
            }
            .code(),
            "PROCESSING_ERROR"
        );
    }

    #[test]
    fn bridge_error_converts_transparently() {
        let e: ConvertError = BridgeError::ContextInitializationTimeout { ms: 10_000 }.into();
        assert!(e.to_string().contains("10000ms"));
    }

    #[test]
    fn illegal_transition_display() {
        let e = BridgeError::IllegalTransition {
            state: "creating",
            action: "tear down",
        };
        assert_eq!(
            e.to_string(),
            "Cannot tear down while rendering context is creating"
        );
    }
}
