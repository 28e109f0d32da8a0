//! Single-file conversion entry points.
//!
//! Every entry point funnels into [`convert_upload`], which applies the
//! request checks in a fixed order: extension, size, load, empty-table,
//! render. Use [`crate::stream::convert_stream`] for batches.

use crate::config::ConversionConfig;
use crate::error::Csv2PdfError;
use crate::output::{ConversionOutput, ConversionStats, PDF_MIME_TYPE};
use crate::pipeline::input::{self, RawUpload};
use crate::pipeline::load;
use crate::pipeline::render::{self, RenderOptions};
use crate::table::TableSummary;
use std::io::Cursor;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Convert a CSV file or URL to a PDF.
///
/// This is the primary entry point for the library. Progress callbacks see
/// it as a batch of one.
///
/// # Errors
/// - [`Csv2PdfError::NotACsv`] when the name does not end in `.csv`
/// - [`Csv2PdfError::UploadTooLarge`] past `config.max_upload_bytes`
/// - [`Csv2PdfError::Parse`] when no encoding yields a table
/// - [`Csv2PdfError::EmptyTable`] for a header with no data rows
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Csv2PdfError> {
    let input_str = input_str.as_ref();
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_batch_start(1);
        cb.on_file_start(0, 1, input_str.to_string());
    }

    let result = convert_input(input_str, config).await;

    if let Some(cb) = cb {
        match &result {
            Ok(out) => cb.on_file_complete(0, 1, out.stats.pages),
            Err(e) => cb.on_file_error(0, 1, e.to_string()),
        }
        cb.on_batch_complete(1, usize::from(result.is_ok()));
    }
    result
}

/// [`convert`] without progress events; shared with the batch stream.
pub(crate) async fn convert_input(
    input_str: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Csv2PdfError> {
    info!("Starting conversion: {}", input_str);
    let upload =
        input::resolve_input(input_str, config.download_timeout_secs, config.max_upload_bytes)
            .await?;
    convert_upload_blocking(upload, config).await
}

/// Convert CSV bytes held in memory.
///
/// `filename` is the client-side name; it must end in `.csv` and decides
/// the output filename.
///
/// # Example
/// ```rust,no_run
/// use csv2pdf::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("people.csv")?;
/// let output = convert_from_bytes(bytes, "people.csv", &ConversionConfig::default()).await?;
/// std::fs::write(&output.filename, output.bytes())?;
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: impl Into<Vec<u8>>,
    filename: impl Into<String>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Csv2PdfError> {
    convert_upload_blocking(RawUpload::new(filename, bytes.into()), config).await
}

async fn convert_upload_blocking(
    upload: RawUpload,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Csv2PdfError> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || convert_upload(upload, &config))
        .await
        .map_err(|e| Csv2PdfError::Internal(format!("Conversion task panicked: {}", e)))?
}

/// Run the whole request pipeline on one upload, synchronously.
pub fn convert_upload(
    upload: RawUpload,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Csv2PdfError> {
    let result = convert_upload_inner(&upload, config);
    match &result {
        Err(e) if e.is_input_error() => warn!("Rejected '{}': {}", upload.filename, e),
        Err(e) => error!("Conversion of '{}' failed: {}", upload.filename, e),
        Ok(_) => {}
    }
    result
}

fn convert_upload_inner(
    upload: &RawUpload,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Csv2PdfError> {
    let total_start = Instant::now();

    input::validate_filename(&upload.filename)?;
    input::check_size(upload.size(), config.max_upload_bytes)?;

    let load_start = Instant::now();
    let report = load::load_with_limit(
        &mut Cursor::new(&upload.content),
        config.delimiter,
        config.max_rows,
    )?;
    let load_duration_ms = load_start.elapsed().as_millis() as u64;

    if report.table.is_empty() {
        return Err(Csv2PdfError::EmptyTable);
    }
    let summary = report.summary();
    debug!(
        "Loaded {} rows x {} columns ({}, delimiter {})",
        summary.row_count,
        summary.columns.len(),
        summary.encoding,
        summary.delimiter
    );

    let render_start = Instant::now();
    let document = render::render(report.table, &RenderOptions::from_config(config))?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    let stats = ConversionStats {
        rows: summary.row_count,
        columns: summary.columns.len(),
        pages: document.page_count(),
        pdf_bytes: document.len(),
        encoding: summary.encoding.clone(),
        delimiter: summary.delimiter.clone(),
        truncated: summary.truncated,
        load_duration_ms,
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Converted '{}': {} rows, {} pages in {}ms",
        upload.filename, stats.rows, stats.pages, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        document,
        filename: input::pdf_filename(&upload.filename),
        mime_type: PDF_MIME_TYPE,
        summary,
        stats,
    })
}

/// Convert a CSV and write the PDF directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Csv2PdfError> {
    let output = convert(input_str, config).await?;
    output.save(output_path).await?;
    Ok(output.stats)
}

pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Csv2PdfError> {
    let write_err = |e| Csv2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Csv2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Csv2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Load a CSV and describe it without rendering.
///
/// Applies the same extension and size checks as [`convert`]; a header-only
/// file is reported with `row_count == 0` instead of failing.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<TableSummary, Csv2PdfError> {
    let upload = input::resolve_input(
        input_str.as_ref(),
        config.download_timeout_secs,
        config.max_upload_bytes,
    )
    .await?;
    input::validate_filename(&upload.filename)?;
    input::check_size(upload.size(), config.max_upload_bytes)?;

    let delimiter = config.delimiter;
    let max_rows = config.max_rows;
    let report = tokio::task::spawn_blocking(move || {
        load::load_bytes(&upload.content, delimiter, max_rows)
    })
    .await
    .map_err(|e| Csv2PdfError::Internal(format!("Load task panicked: {}", e)))??;
    Ok(report.summary())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Delimiter;
    use crate::error::{MSG_EMPTY, MSG_NOT_CSV};

    fn upload(name: &str, body: &[u8]) -> RawUpload {
        RawUpload::new(name, body.to_vec())
    }

    #[test]
    fn converts_simple_upload() {
        let out = convert_upload(upload("people.csv", b"a,b\n1,2\n3,4\n"), &ConversionConfig::default())
            .unwrap();
        assert_eq!(out.filename, "people.pdf");
        assert_eq!(out.mime_type, PDF_MIME_TYPE);
        assert!(out.bytes().starts_with(b"%PDF-"));
        assert_eq!(out.stats.rows, 2);
        assert_eq!(out.stats.columns, 2);
        assert_eq!(out.stats.pages, 1);
        assert_eq!(out.stats.pdf_bytes, out.bytes().len());
        assert!(!out.stats.truncated);
    }

    #[test]
    fn extension_checked_before_anything_else() {
        let config = ConversionConfig::builder().max_upload_bytes(1).build().unwrap();
        let err = convert_upload(upload("big.txt", b"a,b\n1,2\n"), &config).unwrap_err();
        assert!(matches!(err, Csv2PdfError::NotACsv { .. }));
        assert_eq!(err.user_message(), MSG_NOT_CSV);
    }

    #[test]
    fn size_checked_before_parsing() {
        let config = ConversionConfig::builder().max_upload_bytes(4).build().unwrap();
        let err = convert_upload(upload("x.csv", b"\x00\x00garbage"), &config).unwrap_err();
        assert!(matches!(err, Csv2PdfError::UploadTooLarge { .. }));
    }

    #[test]
    fn header_only_is_empty() {
        let err = convert_upload(upload("h.csv", b"a,b\n"), &ConversionConfig::default())
            .unwrap_err();
        assert!(matches!(err, Csv2PdfError::EmptyTable));
        assert_eq!(err.user_message(), MSG_EMPTY);
    }

    #[test]
    fn empty_file_fails() {
        let err = convert_upload(upload("e.csv", b""), &ConversionConfig::default()).unwrap_err();
        assert!(matches!(err, Csv2PdfError::Parse { .. }));
    }

    #[test]
    fn explicit_delimiter_is_used() {
        let config = ConversionConfig::builder()
            .delimiter(Delimiter::Char(b';'))
            .build()
            .unwrap();
        let out = convert_upload(upload("s.csv", b"a;b\n1;2\n"), &config).unwrap();
        assert_eq!(out.summary.columns, vec!["a", "b"]);
        assert_eq!(out.stats.delimiter, ";");
    }

    #[test]
    fn row_cap_is_reported() {
        let mut body = String::from("n\n");
        for i in 0..30 {
            body.push_str(&format!("{i}\n"));
        }
        let config = ConversionConfig::builder().max_rows(10).build().unwrap();
        let out = convert_upload(upload("n.csv", body.as_bytes()), &config).unwrap();
        assert_eq!(out.stats.rows, 10);
        assert!(out.stats.truncated);
    }

    #[tokio::test]
    async fn from_bytes_runs_off_the_runtime() {
        let out = convert_from_bytes(b"x\n1\n".to_vec(), "x.csv", &ConversionConfig::default())
            .await
            .unwrap();
        assert_eq!(out.filename, "x.pdf");
    }

    #[tokio::test]
    async fn to_file_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.csv");
        std::fs::write(&src, b"a,b\n1,2\n").unwrap();
        let dst = dir.path().join("nested/out.pdf");

        let stats = convert_to_file(src.to_str().unwrap(), &dst, &ConversionConfig::default())
            .await
            .unwrap();
        let written = std::fs::read(&dst).unwrap();
        assert_eq!(written.len(), stats.pdf_bytes);
        assert!(!dst.with_extension("pdf.tmp").exists());
    }

    #[tokio::test]
    async fn save_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("a/b/out.pdf");
        std::fs::create_dir_all(dst.parent().unwrap()).unwrap();
        std::fs::write(&dst, b"stale").unwrap();

        let out = convert_from_bytes(b"k\nv\n".to_vec(), "k.csv", &ConversionConfig::default())
            .await
            .unwrap();
        out.save(&dst).await.unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), out.bytes());
        assert!(!dst.with_extension("pdf.tmp").exists());
    }

    #[tokio::test]
    async fn inspect_reports_header_only_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("h.csv");
        std::fs::write(&src, b"a;b;c\n").unwrap();
        let summary = inspect(src.to_str().unwrap(), &ConversionConfig::default())
            .await
            .unwrap();
        assert_eq!(summary.columns, vec!["a", "b", "c"]);
        assert_eq!(summary.row_count, 0);
    }
}
