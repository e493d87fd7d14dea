//! Streaming batch conversion: emit files as they complete.
//!
//! Unlike [`crate::convert::ConversionService::convert_batch`], which
//! returns once every file is done, [`convert_stream`] yields each
//! [`FileResult`] as soon as it is ready. Files are converted concurrently
//! (up to `batch_concurrency`) and arrive in completion order; sort by
//! `index` if input order matters.

use crate::convert::ConversionService;
use crate::output::FileResult;
use crate::progress::{self, ProgressCallback};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-file results borrowing the service.
pub type FileStream<'a> = Pin<Box<dyn Stream<Item = FileResult> + Send + 'a>>;

/// Convert `inputs`, streaming results as they complete.
///
/// Batch-level progress events (`on_batch_start`, `on_batch_complete`) are
/// left to the caller; per-file events are reported here.
///
/// # Example
/// ```rust,no_run
/// use upload_convert::{convert_stream, ConversionService, ServiceConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let service = ConversionService::new(ServiceConfig::default())?;
/// let inputs = vec!["README.md".to_string(), "main.rs".to_string()];
/// let mut results = convert_stream(&service, &inputs, None);
/// while let Some(file) = results.next().await {
///     match file.error {
///         None => println!("{} → {:?}", file.input, file.output_name),
///         Some(e) => eprintln!("{e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn convert_stream<'a>(
    service: &'a ConversionService,
    inputs: &'a [String],
    progress: Option<ProgressCallback>,
) -> FileStream<'a> {
    let total = inputs.len();
    let concurrency = service.config().batch_concurrency.max(1);
    let progress = progress::or_noop(progress);
    info!(
        "Streaming conversion of {} file(s), {} at a time",
        total, concurrency
    );

    let s = stream::iter(inputs.iter().enumerate().map(move |(index, input)| {
        let progress = progress.clone();
        async move {
            service
                .convert_entry(index, total, input, &progress)
                .await
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testing::recording;
    use crate::bridge::Bridge;
    use crate::config::{BridgeConfig, ServiceConfig};
    use crate::progress::testing::RecordingCallback;
    use std::sync::Arc;

    #[tokio::test]
    async fn every_input_yields_one_result() {
        let dir = tempfile::tempdir().unwrap();
        let inputs: Vec<String> = ["a.txt", "b.md", "c.rs"]
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                std::fs::write(&path, "x").unwrap();
                path.display().to_string()
            })
            .collect();

        let bridge = Arc::new(Bridge::new(recording(), BridgeConfig::default()));
        let config = ServiceConfig::builder().batch_concurrency(2).build().unwrap();
        let service = ConversionService::with_bridge(bridge, config).unwrap();
        let recorder = Arc::new(RecordingCallback::default());

        let mut results: Vec<FileResult> = convert_stream(&service, &inputs, Some(recorder.clone()))
            .collect()
            .await;
        results.sort_by_key(|r| r.index);

        let names: Vec<_> = results
            .iter()
            .map(|r| r.output_name.clone().unwrap())
            .collect();
        assert_eq!(names, ["a.png", "b.png", "c.png"]);
        let done = recorder
            .events()
            .iter()
            .filter(|e| e.starts_with("done"))
            .count();
        assert_eq!(done, 3);
    }

    #[tokio::test]
    async fn empty_batch_is_an_empty_stream() {
        let bridge = Arc::new(Bridge::new(recording(), BridgeConfig::default()));
        let service = ConversionService::with_bridge(bridge, ServiceConfig::default()).unwrap();
        let inputs: Vec<String> = Vec::new();
        assert_eq!(convert_stream(&service, &inputs, None).count().await, 0);
    }
}
