//! # csv2pdf
//!
//! Convert uploaded CSV files into paginated, printable PDF tables.
//!
//! Real-world CSVs arrive in whatever encoding and delimiter the exporting
//! tool felt like. The loader tries UTF-8 first, then falls back through
//! Latin-1, UTF-16 and Windows-1252, sniffing the delimiter when none is
//! given. The renderer lays the table out on A4 pages with proportional
//! column widths, wrapped cells and the header repeated on every page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! CSV
//!  │
//!  ├─ 1. Input   read local file or download from URL; extension + size checks
//!  ├─ 2. Load    decode (fallback ladder), sniff delimiter, cap at 5000 rows
//!  ├─ 3. Layout  column widths, word wrap, pagination
//!  ├─ 4. Render  PDF content streams via lopdf (CPU-bound, spawn_blocking)
//!  └─ 5. Output  PDF bytes + filename + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use csv2pdf::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().title("Orders").build()?;
//!     let output = convert("orders.csv", &config).await?;
//!     std::fs::write(&output.filename, output.bytes())?;
//!     eprintln!("{} rows on {} pages", output.stats.rows, output.stats.pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `csv2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! csv2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, Delimiter, Orientation, DEFAULT_TITLE};
pub use convert::{convert, convert_from_bytes, convert_sync, convert_to_file, convert_upload, inspect};
pub use error::{Csv2PdfError, FileError};
pub use output::{ConversionOutput, ConversionStats, FileResult, PDF_MIME_TYPE};
pub use pipeline::input::RawUpload;
pub use pipeline::load::{load, load_with_limit, LoadReport, MAX_ROWS};
pub use pipeline::render::{render, RenderOptions, RenderedDocument};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, FileStream};
pub use table::{Cell, Table, TableSummary};
