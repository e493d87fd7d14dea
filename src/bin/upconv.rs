//! CLI binary for upload-convert.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig`, converts every input into the output directory and
//! prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use upload_convert::{
    BatchOutput, ConversionProgressCallback, ConversionService, ProgressCallback, ServiceConfig,
};
use url::Url;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per file. Files finish out of order,
/// so start times are tracked per input index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    inputs: Mutex<HashMap<usize, String>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            inputs: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn finish_file(&self, index: usize) -> (String, f64) {
        let elapsed = self
            .start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&index)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let input = self
            .inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&index)
            .unwrap_or_default();
        (input, elapsed)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_files} file(s)…"))
        ));
    }

    fn on_file_start(&self, index: usize, _total: usize, input: &str) {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index, Instant::now());
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index, input.to_string());
        self.bar.set_message(input.to_string());
    }

    fn on_file_complete(&self, index: usize, _total: usize, output: &str, bytes: usize) {
        let (input, elapsed) = self.finish_file(index);
        self.bar.println(format!(
            "  {} {}  →  {}  {}  {}",
            green("✓"),
            input,
            bold(output),
            dim(&format!("{:>8} bytes", bytes)),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, _total: usize, error: &str) {
        let (_, elapsed) = self.finish_file(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Multi-line errors carry a hint on the following lines.
        let first_line = error.lines().next().unwrap_or(error);
        let msg = if first_line.chars().count() > 100 {
            format!("{}…", first_line.chars().take(99).collect::<String>())
        } else {
            first_line.to_string()
        };
        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} file(s) converted",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} file(s) converted  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a markdown file to notes.png in the current directory
  upconv notes.md

  # Convert several files into ./out
  upconv -o out README.md main.rs diagram.svg log.txt

  # Convert a remote file
  upconv https://example.com/docs/guide.md

  # What can be converted?
  upconv --list

  # Machine-readable report
  upconv --json *.md > report.json

CONVERTERS:
  Upload Target Defaults   .pdf .jpg .jpeg .png .gif .webp …  copied unchanged
  Text                     .txt                               monospace block
  Code Syntax Highlighter  .rs .py .ts .go …                  highlighted source
  SVG                      .svg                               rasterised as-is
  Markdown                 .md .markdown                      math, code, diagrams

ENVIRONMENT VARIABLES:
  UPCONV_OUTPUT_DIR        Default output directory
  UPCONV_CONCURRENCY       Files converted at once
  UPCONV_DEV               Keep the rendering context alive for an hour
  RUST_LOG                 Override log filtering (e.g. upload_convert=debug)
"#;

/// Convert uploads into images an upload target accepts.
#[derive(Parser, Debug)]
#[command(
    name = "upconv",
    version,
    about = "Convert text, code, SVG and markdown files into PNG images",
    long_about = "Convert files an upload target does not accept (text, source code, SVG, \
markdown with math) into PNG images. Files the target already accepts (PDF, JPEG, PNG, GIF, \
WebP) are copied unchanged.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present = "list")]
    inputs: Vec<String>,

    /// Write converted files into this directory.
    #[arg(short, long, env = "UPCONV_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// List supported extensions and converters, then exit.
    #[arg(long)]
    list: bool,

    /// With --list: omit the extensions accepted unchanged.
    #[arg(long, requires = "list")]
    exclude_builtins: bool,

    /// Print a JSON report (or JSON listing) on stdout.
    #[arg(long, env = "UPCONV_JSON")]
    json: bool,

    /// Development mode: keep the rendering context alive for an hour.
    #[arg(long, env = "UPCONV_DEV")]
    dev: bool,

    /// Number of files converted concurrently.
    #[arg(short, long, env = "UPCONV_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Tear the rendering context down after this many idle seconds.
    #[arg(long, env = "UPCONV_IDLE_TIMEOUT", conflicts_with = "dev")]
    idle_timeout: Option<u64>,

    /// Seconds a single render may take before it is abandoned.
    #[arg(long, env = "UPCONV_REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    /// Base URL for relative resource references in rendered documents.
    #[arg(long, env = "UPCONV_BASE_URL")]
    base_url: Option<Url>,

    /// Let rendered documents inline local `file:` resources.
    #[arg(long, env = "UPCONV_ALLOW_FILE_URLS")]
    allow_file_urls: bool,

    /// Fail a render when any referenced resource cannot be inlined.
    #[arg(long, env = "UPCONV_STRICT_INLINING")]
    strict_inlining: bool,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "UPCONV_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "UPCONV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "UPCONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "UPCONV_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let service = ConversionService::new(config).context("Failed to load converters")?;

    // ── List mode ────────────────────────────────────────────────────────
    if cli.list {
        print_listing(&service, &cli)?;
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let output = service
        .convert_to_dir(&cli.inputs, &cli.output_dir, progress)
        .await
        .context("Conversion failed")?;

    if let Err(e) = service.shutdown().await {
        tracing::warn!("Rendering context did not shut down cleanly: {e}");
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        print_summary(&output, &cli);
    }

    if output.stats.failed > 0 {
        anyhow::bail!(
            "{} of {} file(s) could not be converted",
            output.stats.failed,
            output.stats.total_files
        );
    }
    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .dev_mode(cli.dev)
        .batch_concurrency(cli.concurrency)
        .request_timeout(Duration::from_secs(cli.request_timeout))
        .strict_inlining(cli.strict_inlining)
        .download_timeout_secs(cli.download_timeout);

    if let Some(secs) = cli.idle_timeout {
        builder = builder.idle_timeout(Duration::from_secs(secs));
    }

    let mut config = builder.build().context("Invalid configuration")?;
    config.inliner.base_url = cli.base_url.clone();
    config.inliner.allow_file_urls = cli.allow_file_urls;
    Ok(config)
}

fn print_listing(service: &ConversionService, cli: &Cli) -> Result<()> {
    let extensions = service.supported_extensions(cli.exclude_builtins, true);
    if cli.json {
        let listing = serde_json::json!({
            "extensions": extensions,
            "converters": service.converter_infos(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&listing).context("Failed to serialise listing")?
        );
        return Ok(());
    }

    for info in service.converter_infos() {
        if cli.exclude_builtins && info.slug == upload_convert::converters::passthrough::SLUG {
            continue;
        }
        println!("{}  {}", bold(&info.name), dim(&format!("({})", info.slug)));
        if !info.description.is_empty() {
            println!("  {}", info.description);
        }
        println!("  {}", info.extensions.join(" "));
    }
    println!();
    println!("{} extensions: {}", extensions.len(), extensions.join(", "));
    Ok(())
}

fn print_summary(output: &BatchOutput, cli: &Cli) {
    for file in &output.files {
        match (&file.output_name, &file.error) {
            (Some(name), None) => eprintln!(
                "{} {}  →  {}",
                green("✓"),
                file.input,
                cli.output_dir.join(name).display()
            ),
            (_, Some(e)) => eprintln!("{} {}", red("✗"), e),
            (None, None) => {}
        }
    }
    eprintln!(
        "Converted {}/{} files in {}ms",
        output.stats.converted, output.stats.total_files, output.stats.total_duration_ms
    );
}
