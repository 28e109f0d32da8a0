//! CLI binary for csv2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and reports results.

use anyhow::{Context, Result};
use clap::Parser;
use csv2pdf::{
    convert, convert_stream, inspect, ConversionConfig, ConversionProgressCallback, Delimiter,
    FileError, FileResult, Orientation, ProgressCallback,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the batch, one log line per file.
/// Files may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    inputs: Vec<String>,
}

impl CliProgressCallback {
    fn new(inputs: &[String]) -> Arc<Self> {
        let bar = ProgressBar::new(inputs.len() as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            inputs: inputs.to_vec(),
        })
    }

    fn name(&self, index: usize) -> &str {
        self.inputs.get(index).map(String::as_str).unwrap_or("?")
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_file_start(&self, _index: usize, _total: usize, input: String) {
        self.bar.set_message(input);
    }

    fn on_file_complete(&self, index: usize, _total: usize, pages: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            self.name(index),
            dim(&format!("{pages} pages")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, _total: usize, error: String) {
        let first_line = error.lines().next().unwrap_or_default();
        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            self.name(index),
            red(first_line)
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(success_count);
        if failed == 0 {
            eprintln!("{} {} files converted", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                red("✘"),
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one file (writes people.pdf next to the current directory)
  csv2pdf people.csv

  # Choose the output file and a title
  csv2pdf people.csv -o report.pdf --title "Staff list"

  # Semicolon-separated export, portrait pages
  csv2pdf --delimiter semicolon --orientation portrait export.csv

  # Convert a batch into a directory
  csv2pdf a.csv b.csv c.csv -o out/

  # Convert from URL
  csv2pdf https://example.com/data/orders.csv

  # Show what the loader sees, without rendering
  csv2pdf --inspect-only --json data.csv

ENVIRONMENT VARIABLES:
  Every flag can also be set through CSV2PDF_<FLAG>, e.g. CSV2PDF_TITLE.
  RUST_LOG overrides the log filter.
"#;

/// Convert CSV files and URLs into paginated PDF tables.
#[derive(Parser, Debug)]
#[command(
    name = "csv2pdf",
    version,
    about = "Convert CSV files and URLs into paginated PDF tables",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local CSV file paths or HTTP/HTTPS URLs.
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<String>,

    /// Output PDF file (single input) or directory (existing, or ending in `/`).
    #[arg(short, long, env = "CSV2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Field separator: auto, comma, semicolon, tab, pipe, or one character.
    #[arg(short, long, env = "CSV2PDF_DELIMITER", default_value = "auto")]
    delimiter: Delimiter,

    /// Title drawn at the top of the first page.
    #[arg(short, long, env = "CSV2PDF_TITLE", default_value = csv2pdf::DEFAULT_TITLE)]
    title: String,

    /// Page orientation: landscape or portrait.
    #[arg(long, env = "CSV2PDF_ORIENTATION", default_value = "landscape")]
    orientation: Orientation,

    /// Keep at most this many data rows (capped at 5000).
    #[arg(long, env = "CSV2PDF_MAX_ROWS", default_value_t = csv2pdf::MAX_ROWS)]
    max_rows: usize,

    /// Reject uploads larger than this many MiB.
    #[arg(long, env = "CSV2PDF_MAX_UPLOAD_MB", default_value_t = 16)]
    max_upload_mb: u64,

    /// Leave PDF content streams uncompressed.
    #[arg(long, env = "CSV2PDF_NO_COMPRESS")]
    no_compress: bool,

    /// Number of files converted at once.
    #[arg(short, long, env = "CSV2PDF_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "CSV2PDF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print what the loader sees, no PDF is written.
    #[arg(long)]
    inspect_only: bool,

    /// Print results as JSON on stdout.
    #[arg(long, env = "CSV2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "CSV2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CSV2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CSV2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new(&cli.inputs) as ProgressCallback)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    if cli.inspect_only {
        return run_inspect(&cli, &config).await;
    }

    if cli.inputs.len() == 1 {
        run_single(&cli, &config).await
    } else {
        run_batch(&cli, &config).await
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .delimiter(cli.delimiter)
        .title(cli.title.clone())
        .orientation(cli.orientation)
        .max_rows(cli.max_rows)
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024))
        .compress(!cli.no_compress)
        .concurrency(cli.concurrency)
        .download_timeout_secs(cli.download_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn run_inspect(cli: &Cli, config: &ConversionConfig) -> Result<()> {
    let mut summaries = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let summary = inspect(input, config)
            .await
            .with_context(|| format!("Failed to inspect '{input}'"))?;
        if !cli.json {
            println!("File:       {}", input);
            println!("Columns:    {}", summary.columns.join(", "));
            println!("Rows:       {}", summary.row_count);
            println!("Encoding:   {}", summary.encoding);
            println!("Delimiter:  {}", summary.delimiter);
            if summary.truncated {
                println!("Truncated:  yes");
            }
        }
        summaries.push(summary);
    }
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summaries).context("Failed to serialise summaries")?
        );
    }
    Ok(())
}

async fn run_single(cli: &Cli, config: &ConversionConfig) -> Result<()> {
    let input = &cli.inputs[0];
    let output = convert(input, config)
        .await
        .with_context(|| format!("Conversion of '{input}' failed"))?;

    let path = single_output_path(cli.output.as_deref(), &output.filename);
    output
        .save(&path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        let s = &output.stats;
        eprintln!(
            "{}  {} rows × {} columns  {} pages  {}ms  →  {}",
            green("✔"),
            s.rows,
            s.columns,
            s.pages,
            s.total_duration_ms,
            bold(&path.display().to_string()),
        );
        if s.truncated {
            eprintln!("   {}", dim(&format!("only the first {} rows were kept", s.rows)));
        }
    }
    Ok(())
}

/// Where a single conversion lands: `-o` as given, or inside it when it is
/// an existing directory or ends with a path separator.
fn single_output_path(output: Option<&Path>, filename: &str) -> PathBuf {
    match output {
        Some(target) if names_directory(target) => target.join(filename),
        Some(target) => target.to_path_buf(),
        None => PathBuf::from(filename),
    }
}

fn names_directory(path: &Path) -> bool {
    let raw = path.as_os_str().to_string_lossy();
    path.is_dir() || raw.ends_with('/') || raw.ends_with(std::path::MAIN_SEPARATOR)
}

async fn run_batch(cli: &Cli, config: &ConversionConfig) -> Result<()> {
    let out_dir = cli.output.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut results: Vec<Result<FileResult, FileError>> =
        convert_stream(cli.inputs.clone(), Some(out_dir), config)
            .collect()
            .await;
    results.sort_by_key(|r| match r {
        Ok(f) => f.index,
        Err(e) => e.index,
    });
    let failed = results.iter().filter(|r| r.is_err()).count();

    if cli.json {
        let json: Vec<serde_json::Value> = results
            .iter()
            .map(|r| match r {
                Ok(f) => serde_json::json!({ "ok": f }),
                Err(e) => serde_json::json!({ "error": e }),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json).context("Failed to serialise results")?
        );
    } else if !cli.quiet && config.progress_callback.is_none() {
        for r in &results {
            match r {
                Ok(f) => eprintln!(
                    "{} {}  {} pages  →  {}",
                    green("✓"),
                    f.input,
                    f.stats.pages,
                    f.output_path.as_deref().unwrap_or(&f.output_filename)
                ),
                Err(e) => eprintln!("{} {}", red("✗"), e),
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} files failed", results.len());
    }
    Ok(())
}
