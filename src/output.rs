//! Batch conversion results.
//!
//! One [`FileResult`] per input, success or failure, so a single bad file
//! never hides the others. [`BatchOutput`] adds aggregate [`BatchStats`].

use crate::error::{ConvertError, FileError};
use crate::file::SourceFile;
use serde::{Deserialize, Serialize};

/// Outcome of converting one input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    /// 0-based position of the input in the batch.
    pub index: usize,
    /// Path or URL as given.
    pub input: String,
    /// Name of the produced file.
    pub output_name: Option<String>,
    pub mime_type: Option<String>,
    /// Size of the produced file in bytes.
    pub bytes: usize,
    pub duration_ms: u64,
    pub error: Option<FileError>,
    /// The produced file. Not part of the JSON report.
    #[serde(skip)]
    pub file: Option<SourceFile>,
}

impl FileResult {
    pub fn success(index: usize, input: impl Into<String>, file: SourceFile, duration_ms: u64) -> Self {
        Self {
            index,
            input: input.into(),
            output_name: Some(file.name().to_string()),
            mime_type: Some(file.mime_type().to_string()),
            bytes: file.bytes().len(),
            duration_ms,
            error: None,
            file: Some(file),
        }
    }

    pub fn failure(index: usize, input: impl Into<String>, error: FileError, duration_ms: u64) -> Self {
        Self {
            index,
            input: input.into(),
            output_name: None,
            mime_type: None,
            bytes: 0,
            duration_ms,
            error: Some(error),
            file: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Classify a fatal per-file error for the batch report.
///
/// `filename` is `None` when the source never loaded.
pub fn file_error(input: &str, filename: Option<&str>, error: &ConvertError) -> FileError {
    match (filename, error) {
        (None, e) => FileError::LoadFailed {
            input: input.to_string(),
            detail: e.to_string(),
        },
        (Some(name), ConvertError::UnsupportedFileType { extension }) => FileError::Unsupported {
            filename: name.to_string(),
            extension: extension.clone(),
        },
        (Some(name), e) => FileError::ConversionFailed {
            filename: name.to_string(),
            detail: e.to_string(),
        },
    }
}

/// Aggregate counts for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub total_files: usize,
    pub converted: usize,
    pub failed: usize,
    /// Sum of produced file sizes.
    pub total_bytes: usize,
    pub total_duration_ms: u64,
}

/// Every file's outcome, in input order, plus stats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutput {
    pub files: Vec<FileResult>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// Sort `files` into input order and compute stats.
    pub fn from_results(mut files: Vec<FileResult>, total_duration_ms: u64) -> Self {
        files.sort_by_key(|f| f.index);
        let converted = files.iter().filter(|f| f.is_ok()).count();
        let stats = BatchStats {
            total_files: files.len(),
            converted,
            failed: files.len() - converted,
            total_bytes: files.iter().map(|f| f.bytes).sum(),
            total_duration_ms,
        };
        Self { files, stats }
    }

    pub fn successes(&self) -> impl Iterator<Item = &FileResult> {
        self.files.iter().filter(|f| f.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileResult> {
        self.files.iter().filter(|f| !f.is_ok())
    }
}
