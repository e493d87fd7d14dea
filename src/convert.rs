//! The produced conversion interface.
//!
//! [`ConversionService`] is what a host application talks to. It owns the
//! content-side registry and the [`Bridge`] the rendering converters use, so
//! a caller only ever hands in files and gets files back. Passthrough files
//! never touch the bridge; the privileged context is created on the first
//! file that actually needs rendering.

use crate::bridge::Bridge;
use crate::config::ServiceConfig;
use crate::converters::ConverterInfo;
use crate::error::{BridgeError, ConvertError};
use crate::file::{SerializedFile, SourceFile};
use crate::output::{file_error, BatchOutput, FileResult};
use crate::pipeline::input;
use crate::progress::{self, ProgressCallback};
use crate::registry::ConverterRegistry;
use crate::stream::convert_stream;
use futures::StreamExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Converts uploads into files the upload target accepts.
///
/// # Example
///
/// ```rust,no_run
/// use upload_convert::{ConversionService, ServiceConfig, SourceFile};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let service = ConversionService::new(ServiceConfig::default())?;
/// let png = service
///     .convert(SourceFile::new("notes.md", "# Hello".as_bytes().to_vec()))
///     .await?;
/// assert_eq!(png.name(), "notes.png");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConversionService {
    registry: ConverterRegistry,
    bridge: Arc<Bridge>,
    config: ServiceConfig,
}

impl ConversionService {
    /// A service whose privileged context runs as a local task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: ServiceConfig) -> Result<Self, ConvertError> {
        let bridge = Arc::new(Bridge::local(&config));
        Self::with_bridge(bridge, config)
    }

    /// A service rendering through an existing bridge.
    pub fn with_bridge(bridge: Arc<Bridge>, config: ServiceConfig) -> Result<Self, ConvertError> {
        let registry = ConverterRegistry::with_rendering(bridge.clone())?;
        debug!("Conversion service ready: {:?}", registry);
        Ok(Self {
            registry,
            bridge,
            config,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    /// Convert one file with the converter claiming its extension.
    pub async fn convert(&self, file: SourceFile) -> Result<SourceFile, ConvertError> {
        let start = Instant::now();
        let name = file.name().to_string();
        let out = self.registry.convert(file).await?;
        info!(
            "Converted '{}' → '{}' in {}ms",
            name,
            out.name(),
            start.elapsed().as_millis()
        );
        Ok(out)
    }

    /// Convert a file in its transport form.
    ///
    /// Never fails: any error, including a malformed input, comes back as a
    /// serialized error.
    pub async fn convert_serialized(&self, file: SerializedFile) -> SerializedFile {
        let result = match file.into_file() {
            Ok(file) => self.convert(file).await,
            Err(e) => Err(e),
        };
        if let Err(ref e) = result {
            warn!("Serialized conversion failed: {}", e);
        }
        SerializedFile::from_result(result)
    }

    /// Run the whole conversion inside the privileged context.
    ///
    /// Files the passthrough set claims are returned as-is without creating
    /// a context.
    pub async fn convert_remote(&self, file: SourceFile) -> Result<SourceFile, ConvertError> {
        if self
            .registry
            .converter_for(file.name())
            .is_some_and(|c| c.info().slug == crate::converters::passthrough::SLUG)
        {
            return Ok(file);
        }

        let reply = self
            .bridge
            .file_to_image(SerializedFile::from_file(&file))
            .await?;
        if let Some(message) = reply.error() {
            return Err(BridgeError::Remote {
                action: "fileToImage".into(),
                message: message.to_string(),
            }
            .into());
        }
        reply.into_file()
    }

    /// Load `input` (path or http(s) URL) and convert it.
    pub async fn convert_input(&self, input: &str) -> Result<SourceFile, ConvertError> {
        let file = input::load_source(input, self.config.download_timeout_secs).await?;
        self.convert(file).await
    }

    /// Extensions the service accepts, sorted.
    pub fn supported_extensions(&self, exclude_builtins: bool, include_dot: bool) -> Vec<String> {
        self.registry
            .supported_extensions(exclude_builtins, include_dot)
    }

    /// Descriptors of every loaded converter, for display.
    pub fn converter_infos(&self) -> Vec<ConverterInfo> {
        self.registry.converter_infos()
    }

    /// Load and convert one batch entry, reporting progress.
    pub(crate) async fn convert_entry(
        &self,
        index: usize,
        total: usize,
        input: &str,
        progress: &ProgressCallback,
    ) -> FileResult {
        let start = Instant::now();
        progress.on_file_start(index, total, input);

        let outcome = match input::load_source(input, self.config.download_timeout_secs).await {
            Err(e) => Err(file_error(input, None, &e)),
            Ok(file) => {
                let name = file.name().to_string();
                self.convert(file)
                    .await
                    .map_err(|e| file_error(input, Some(&name), &e))
            }
        };

        let elapsed = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(file) => {
                progress.on_file_complete(index, total, file.name(), file.bytes().len());
                FileResult::success(index, input, file, elapsed)
            }
            Err(error) => {
                warn!("{}", error);
                progress.on_file_error(index, total, &error.to_string());
                FileResult::failure(index, input, error, elapsed)
            }
        }
    }

    /// Convert every input, at most `batch_concurrency` at a time.
    ///
    /// Per-file failures are recorded in the output; the batch itself never
    /// fails.
    pub async fn convert_batch(
        &self,
        inputs: &[String],
        progress: Option<ProgressCallback>,
    ) -> BatchOutput {
        let start = Instant::now();
        let progress = progress::or_noop(progress);
        progress.on_batch_start(inputs.len());

        let results: Vec<FileResult> = convert_stream(self, inputs, Some(progress.clone()))
            .collect()
            .await;
        let output = BatchOutput::from_results(results, start.elapsed().as_millis() as u64);

        progress.on_batch_complete(output.stats.total_files, output.stats.converted);
        info!(
            "Batch complete: {}/{} files in {}ms",
            output.stats.converted, output.stats.total_files, output.stats.total_duration_ms
        );
        output
    }

    /// Convert a batch and write every produced file into `dir`.
    ///
    /// Files are written atomically (temp file + rename). Inputs that map to
    /// the same output name (`a.md`, `a.txt`) get numbered names instead of
    /// overwriting each other. A file that cannot be written is recorded as
    /// failed.
    pub async fn convert_to_dir(
        &self,
        inputs: &[String],
        dir: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
    ) -> Result<BatchOutput, ConvertError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ConvertError::OutputWriteFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;

        let mut output = self.convert_batch(inputs, progress).await;
        let mut taken = HashSet::new();
        for result in output.files.iter_mut() {
            let Some(file) = result.file.take() else {
                continue;
            };
            let name = unique_name(file.name(), &mut taken);
            let file = if name == file.name() {
                file
            } else {
                debug!("Output name '{}' already used; writing '{}'", file.name(), name);
                let mime_type = file.mime_type().to_string();
                SourceFile::with_mime_type(name, mime_type, file.into_bytes())
            };

            let path = dir.join(file.name());
            *result = match write_atomic(&path, file.bytes()).await {
                Ok(()) => FileResult::success(
                    result.index,
                    result.input.clone(),
                    file,
                    result.duration_ms,
                ),
                Err(e) => {
                    warn!("{}", e);
                    FileResult::failure(
                        result.index,
                        result.input.clone(),
                        file_error(&result.input, Some(file.name()), &e),
                        result.duration_ms,
                    )
                }
            };
        }
        Ok(BatchOutput::from_results(
            output.files,
            output.stats.total_duration_ms,
        ))
    }

    /// Tear the privileged context down now instead of waiting for the idle
    /// timer.
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        self.bridge.teardown().await
    }
}

/// `name`, or `stem (n).ext` for the first `n` not yet taken. Names compare
/// case-insensitively so case-folding filesystems cannot merge them.
fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let mut candidate = name.to_string();
    let mut n = 1;
    while !taken.insert(candidate.to_lowercase()) {
        candidate = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        n += 1;
    }
    candidate
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    let failed = |source| ConvertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = PathBuf::from(path);
    tmp.as_mut_os_string().push(".tmp");
    tokio::fs::write(&tmp, bytes).await.map_err(failed)?;
    tokio::fs::rename(&tmp, path).await.map_err(failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testing::recording;
    use crate::config::BridgeConfig;
    use crate::error::FileError;
    use crate::progress::testing::RecordingCallback;

    fn service() -> (ConversionService, Arc<crate::bridge::TaskHost>) {
        let host = recording();
        let bridge = Arc::new(Bridge::new(host.clone(), BridgeConfig::default()));
        let service = ConversionService::with_bridge(bridge, ServiceConfig::default()).unwrap();
        (service, host)
    }

    #[tokio::test]
    async fn passthrough_never_creates_a_context() {
        let (service, host) = service();
        let jpg = SourceFile::new("photo.JPG", vec![0xFF, 0xD8, 0xFF]);

        let out = service.convert(jpg.clone()).await.unwrap();
        assert_eq!(out, jpg);
        let out = service.convert_remote(jpg.clone()).await.unwrap();
        assert_eq!(out, jpg);
        assert_eq!(host.stats().created, 0);
    }

    #[tokio::test]
    async fn text_renders_through_the_context() {
        let (service, host) = service();
        let out = service
            .convert(SourceFile::new("hello.txt", b"Hello\nWorld".to_vec()))
            .await
            .unwrap();
        assert_eq!(out.name(), "hello.png");
        assert_eq!(out.mime_type(), "image/png");
        assert_eq!(host.stats().created, 1);
    }

    #[tokio::test]
    async fn serialized_conversion_reports_errors_in_band() {
        let (service, _) = service();
        let exe = SerializedFile::from_file(&SourceFile::new("setup.exe", b"MZ".to_vec()));
        let out = service.convert_serialized(exe).await;
        assert!(out.error().unwrap().contains(".exe"));

        let bad = SerializedFile::failure("upstream broke");
        assert!(service.convert_serialized(bad).await.is_error());
    }

    #[tokio::test]
    async fn remote_conversion_runs_in_the_context() {
        let (service, _) = service();
        let out = service
            .convert_remote(SourceFile::new("a.md", b"# A".to_vec()))
            .await
            .unwrap();
        assert_eq!(out.name(), "a.png");

        let err = service
            .convert_remote(SourceFile::new("a.exe", b"MZ".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Bridge(BridgeError::Remote { .. })));
    }

    #[tokio::test]
    async fn batch_keeps_going_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("a.txt");
        let exe = dir.path().join("b.exe");
        std::fs::write(&txt, "hi").unwrap();
        std::fs::write(&exe, "MZ").unwrap();
        let inputs = vec![
            txt.display().to_string(),
            exe.display().to_string(),
            dir.path().join("missing.md").display().to_string(),
        ];

        let (service, _) = service();
        let recorder = Arc::new(RecordingCallback::default());
        let out = service.convert_batch(&inputs, Some(recorder.clone())).await;

        assert_eq!(out.stats.converted, 1);
        assert_eq!(out.stats.failed, 2);
        assert_eq!(out.files[0].output_name.as_deref(), Some("a.png"));
        assert!(matches!(out.files[1].error, Some(FileError::Unsupported { .. })));
        assert!(matches!(out.files[2].error, Some(FileError::LoadFailed { .. })));

        let events = recorder.events();
        assert_eq!(events.first().map(String::as_str), Some("start 3"));
        assert_eq!(events.last().map(String::as_str), Some("complete 1/3"));
    }

    #[tokio::test]
    async fn converted_files_land_in_the_output_dir() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let input = src.path().join("Notes.MD");
        std::fs::write(&input, "# Title").unwrap();

        let (service, _) = service();
        let out = service
            .convert_to_dir(&[input.display().to_string()], dst.path().join("out"), None)
            .await
            .unwrap();

        assert_eq!(out.stats.converted, 1);
        let written = dst.path().join("out").join("Notes.png");
        assert!(written.exists());
        assert!(!dst.path().join("out").join("Notes.png.tmp").exists());
    }

    #[tokio::test]
    async fn colliding_output_names_are_numbered_not_overwritten() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let md = src.path().join("a.md");
        let txt = src.path().join("a.txt");
        let upper = src.path().join("A.MD");
        std::fs::write(&md, "# from markdown").unwrap();
        std::fs::write(&txt, "from text").unwrap();
        std::fs::write(&upper, "# upper case").unwrap();
        let inputs: Vec<String> = [&md, &txt, &upper]
            .iter()
            .map(|p| p.display().to_string())
            .collect();

        let (service, _) = service();
        let out = service.convert_to_dir(&inputs, dst.path(), None).await.unwrap();

        assert_eq!(out.stats.converted, 3);
        let names: Vec<_> = out
            .files
            .iter()
            .map(|f| f.output_name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["a.png", "a (1).png", "A (2).png"]);
        for name in &names {
            assert!(dst.path().join(name).exists(), "{name} missing");
        }
        let first = std::fs::read(dst.path().join("a.png")).unwrap();
        assert_eq!(first, out.files[0].file.as_ref().unwrap().bytes());
    }

    #[test]
    fn unique_names_keep_the_extension() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name("x.png", &mut taken), "x.png");
        assert_eq!(unique_name("X.PNG", &mut taken), "X (1).PNG");
        assert_eq!(unique_name("x.png", &mut taken), "x (2).png");
        assert_eq!(unique_name(".hidden", &mut taken), ".hidden");
        assert_eq!(unique_name(".hidden", &mut taken), ".hidden (1)");
    }

    #[tokio::test]
    async fn shutdown_closes_the_context() {
        let (service, host) = service();
        service
            .convert(SourceFile::new("a.txt", b"x".to_vec()))
            .await
            .unwrap();
        service.shutdown().await.unwrap();
        assert!(!service.bridge().is_ready().await);
        assert_eq!(host.stats().closed, 1);
    }
}
