//! CLI binary for docmerge.
//!
//! A thin shim over the library crate that maps CLI flags to `MergeConfig`
//! and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docmerge::{
    merge, merge_to_file, merge_to_store, FsObjectStore, MergeConfig, MergeError,
    MergeProgressCallback, MergeStats, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-source
/// log lines using [indicatif]. Designed to work correctly when sources
/// complete out-of-order (they usually do).
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Per-source wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Count of sources that errored out.
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total_sources: usize) -> Arc<Self> {
        let bar = ProgressBar::new(total_sources as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} sources  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Merging");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }
}

impl MergeProgressCallback for CliProgressCallback {
    fn on_source_start(&self, index: usize, _total: usize, url: &str) {
        self.start_times
            .lock()
            .unwrap()
            .insert(index, Instant::now());
        self.bar.set_message(short_url(url));
    }

    fn on_source_complete(&self, index: usize, total: usize, page_count: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} Source {:>2}/{:<2}  {:<8}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{page_count:>3} pages")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_source_error(&self, index: usize, total: usize, error: &str) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Source {:>2}/{:<2}  {}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_merge_complete(&self, total_sources: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} sources fetched and normalized",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} sources ok  ({} failed)",
                red("✘"),
                bold(&success_count.to_string()),
                total_sources,
                red(&failed.to_string()),
            );
        }
    }
}

/// Trim a URL to its last path segment for the progress-bar message.
fn short_url(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge two documents into a local file
  docmerge -o dossier.pdf https://files.example.com/contract.pdf https://files.example.com/id.jpg

  # Merge to stdout (pipe into another tool)
  docmerge --quiet https://files.example.com/a.pdf https://files.example.com/b.pdf > merged.pdf

  # Persist into an object-store directory under a correlation id
  docmerge --store-dir /var/store --lead-id LEAD123 https://files.example.com/a.pdf

  # Many sources, wider fetch fan-out, machine-readable stats
  docmerge -c 16 --json -o out.pdf $(cat urls.txt)

  # Give up as soon as any source fails
  docmerge --fail-fast -o out.pdf https://files.example.com/a.pdf https://files.example.com/b.png

SUPPORTED SOURCE FORMATS:
  Detected by content sniffing (URL extensions are ignored):
  PDF, JPEG, PNG, GIF, BMP, TIFF, WEBP

  Images become a single PDF page sized exactly to their pixel dimensions.
  The merge is all-or-nothing: if any source fails, nothing is written and
  every failing source is listed with its index, URL, and error kind.

ENVIRONMENT VARIABLES:
  DOCMERGE_CONCURRENCY    Concurrent fetch pipelines (default 8)
  DOCMERGE_TIMEOUT        Per-fetch timeout in seconds (default 30)
  RUST_LOG                Tracing filter (e.g. docmerge=debug)
"#;

/// Merge remotely hosted PDF and image files into a single PDF.
#[derive(Parser, Debug)]
#[command(
    name = "docmerge",
    version,
    about = "Merge remotely hosted PDF and image files into a single PDF",
    long_about = "Fetch an ordered list of PDF/image URLs concurrently, normalize \
images into single PDF pages, and concatenate everything into one document in \
the order given. All-or-nothing: a single failing source fails the whole merge \
with a per-source error report.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source URLs (PDF or image), merged in the order given.
    #[arg(required = true)]
    sources: Vec<String>,

    /// Write the merged PDF to this file instead of stdout.
    #[arg(short, long, env = "DOCMERGE_OUTPUT")]
    output: Option<PathBuf>,

    /// Persist the merged PDF into this object-store root directory.
    #[arg(long, env = "DOCMERGE_STORE_DIR", conflicts_with = "output")]
    store_dir: Option<PathBuf>,

    /// Correlation identifier used in logs and store keys.
    #[arg(long, env = "DOCMERGE_LEAD_ID")]
    lead_id: Option<String>,

    /// Number of concurrent fetch pipelines.
    #[arg(short, long, env = "DOCMERGE_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Per-fetch timeout in seconds.
    #[arg(long, env = "DOCMERGE_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Maximum redirects followed per fetch.
    #[arg(long, env = "DOCMERGE_MAX_REDIRECTS", default_value_t = 5)]
    max_redirects: usize,

    /// Abort on the first source failure instead of gathering all failures.
    #[arg(long, env = "DOCMERGE_FAIL_FAST")]
    fail_fast: bool,

    /// Print merge stats as JSON to stdout (requires -o or --store-dir,
    /// since bare stdout carries the PDF bytes).
    #[arg(long, env = "DOCMERGE_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "DOCMERGE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCMERGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCMERGE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let writing_pdf_to_stdout = cli.output.is_none() && cli.store_dir.is_none();
    if cli.json && writing_pdf_to_stdout {
        anyhow::bail!("--json needs -o/--output or --store-dir; bare stdout carries the PDF bytes");
    }
    let show_progress = !cli.quiet && !cli.no_progress && !writing_pdf_to_stdout;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new(cli.sources.len());
        Some(cb as Arc<dyn MergeProgressCallback>)
    } else {
        None
    };

    let mut builder = MergeConfig::builder()
        .concurrency(cli.concurrency)
        .fetch_timeout_secs(cli.timeout)
        .max_redirects(cli.max_redirects)
        .fail_fast(cli.fail_fast);
    if let Some(ref lead_id) = cli.lead_id {
        builder = builder.correlation_id(lead_id.clone());
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Run merge ────────────────────────────────────────────────────────
    if let Some(ref store_dir) = cli.store_dir {
        let store = FsObjectStore::new(store_dir.clone());
        let key = store_key(cli.lead_id.as_deref());
        let (location, stats) = merge_to_store(&cli.sources, &store, &key, &config)
            .await
            .map_err(report_failures)?;

        if cli.json {
            print_json(&stats)?;
        }
        if !cli.quiet {
            print_summary(&stats, &location);
        }
    } else if let Some(ref output_path) = cli.output {
        let stats = merge_to_file(&cli.sources, output_path, &config)
            .await
            .map_err(report_failures)?;

        if cli.json {
            print_json(&stats)?;
        }
        if !cli.quiet {
            print_summary(&stats, &output_path.display().to_string());
        }
    } else {
        // PDF bytes on stdout.
        let output = merge(&cli.sources, &config).await.map_err(report_failures)?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(&output.pdf)
            .context("Failed to write to stdout")?;
        if !cli.quiet {
            eprintln!(
                "{} pages, {} bytes in {}ms",
                output.stats.total_pages, output.stats.byte_size, output.stats.total_duration_ms
            );
        }
    }

    Ok(())
}

/// Storage key for a merged document: `{lead}/merged/merged_document_{ts}.pdf`.
fn store_key(lead_id: Option<&str>) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!(
        "{}/merged/merged_document_{timestamp}.pdf",
        lead_id.unwrap_or("adhoc")
    )
}

/// Turn a failed merge into an anyhow error after printing the per-source
/// failure table.
fn report_failures(e: MergeError) -> anyhow::Error {
    if let MergeError::SourcesFailed { ref failures, .. } = e {
        for f in failures {
            eprintln!(
                "  {} [{}] {}  {}",
                red("✗"),
                f.index,
                f.url,
                dim(&f.message)
            );
        }
    }
    anyhow::Error::new(e).context("Merge failed")
}

fn print_json(stats: &MergeStats) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(stats).context("Failed to serialise stats")?
    );
    Ok(())
}

fn print_summary(stats: &MergeStats, destination: &str) {
    eprintln!(
        "{}  {} pages from {} sources  {}ms  →  {}",
        green("✔"),
        stats.total_pages,
        stats.total_sources,
        stats.total_duration_ms,
        bold(destination),
    );
    eprintln!(
        "   {}  {}",
        dim(&format!("{} bytes", stats.byte_size)),
        cyan(&format!(
            "fetch {}ms / assemble {}ms",
            stats.pipeline_duration_ms, stats.assemble_duration_ms
        )),
    );
}
