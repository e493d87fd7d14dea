//! Files the upload target already accepts.

use super::{Converter, ConverterInfo};
use crate::error::ConvertError;
use crate::file::SourceFile;
use async_trait::async_trait;
use tracing::debug;

/// Extensions the upload target accepts natively.
pub const BUILTIN_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".jfif", ".pjpeg", ".pjp", ".png", ".gif", ".webp",
];

/// Slug of the passthrough converter.
pub const SLUG: &str = "bypass";

/// Returns the file untouched.
#[derive(Debug, Clone)]
pub struct PassthroughConverter {
    info: ConverterInfo,
}

impl Default for PassthroughConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl PassthroughConverter {
    pub fn new() -> Self {
        Self {
            info: ConverterInfo::new(SLUG, BUILTIN_EXTENSIONS)
                .named("Upload Target Defaults")
                .described("The file types the upload target supports natively."),
        }
    }
}

#[async_trait]
impl Converter for PassthroughConverter {
    fn info(&self) -> &ConverterInfo {
        &self.info
    }

    async fn convert(&self, file: SourceFile) -> Result<SourceFile, ConvertError> {
        debug!("Passing '{}' through unchanged", file.name());
        Ok(file)
    }
}
