//! Progress-callback trait for per-file conversion events.
//!
//! Pass an [`Arc<dyn ConversionProgressCallback>`] to
//! [`crate::convert::ConversionService::convert_batch`] or
//! [`crate::stream::convert_stream`] to receive events as each file is
//! converted. Callers can forward them to a channel, a progress bar or a log
//! without the library knowing how.
//!
//! # Example
//!
//! ```rust
//! use upload_convert::ConversionProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counting(AtomicUsize);
//!
//! impl ConversionProgressCallback for Counting {
//!     fn on_file_complete(&self, _index: usize, _total: usize, output: &str, _bytes: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("wrote {output}");
//!     }
//! }
//! ```

use std::sync::Arc;

/// Called by batch conversion as it processes each file.
///
/// Files are converted concurrently, so the per-file methods may be called
/// from several tasks at once and out of input order. All methods default to
/// no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any file is loaded.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a file starts loading.
    ///
    /// # Arguments
    /// * `index`: 0-based position of the input in the batch
    /// * `input`: path or URL as given
    fn on_file_start(&self, index: usize, total_files: usize, input: &str) {
        let _ = (index, total_files, input);
    }

    /// Called when a file converted successfully.
    ///
    /// # Arguments
    /// * `output`: name of the produced file
    /// * `bytes`: size of the produced file
    fn on_file_complete(&self, index: usize, total_files: usize, output: &str, bytes: usize) {
        let _ = (index, total_files, output, bytes);
    }

    /// Called when a file could not be loaded or converted.
    fn on_file_error(&self, index: usize, total_files: usize, error: &str) {
        let _ = (index, total_files, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// Ignores every event. Used when no callback is supplied.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// The supplied callback, or a no-op.
pub(crate) fn or_noop(callback: Option<ProgressCallback>) -> ProgressCallback {
    callback.unwrap_or_else(|| Arc::new(NoopProgressCallback))
}
