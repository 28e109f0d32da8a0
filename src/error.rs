//! Error types for the csv2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Csv2PdfError`] — **Fatal**: a single conversion cannot proceed
//!   (wrong extension, undecodable CSV, empty table, layout failure).
//!   Returned as `Err(Csv2PdfError)` from the top-level `convert*` functions.
//!
//! * [`FileError`] — **Non-fatal**: one file of a batch failed but the other
//!   files are fine. Yielded by [`crate::stream::convert_stream`] so callers
//!   can report per-file failures instead of losing the whole batch.

use std::path::PathBuf;
use thiserror::Error;

/// Message shown to end users when the file is not a `.csv`.
pub const MSG_NOT_CSV: &str = "Only .csv files are allowed.";

/// Message shown to end users when the CSV has no data rows.
pub const MSG_EMPTY: &str = "Your CSV appears to be empty.";

/// Message shown to end users for every other failure.
pub const MSG_GENERIC: &str =
    "Sorry, something went wrong while converting your file. Make sure it is a valid CSV.";

/// All fatal errors returned by the csv2pdf library.
#[derive(Debug, Error)]
pub enum Csv2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("CSV file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file name does not end in `.csv`.
    #[error("'{filename}' is not a .csv file")]
    NotACsv { filename: String },

    /// The upload is bigger than the configured limit.
    #[error("Upload is {size} bytes, limit is {limit} bytes\nRaise --max-upload-mb or split the file.")]
    UploadTooLarge { size: u64, limit: u64 },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// No encoding/delimiter combination produced a table.
    #[error("Could not parse CSV: {detail}")]
    Parse { detail: String },

    /// The CSV parsed but holds zero data rows.
    #[error("CSV has a header but no data rows")]
    EmptyTable,

    /// The document could not be laid out or serialised.
    #[error("PDF rendering failed: {detail}")]
    Render { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Csv2PdfError {
    /// The short message an end user should see for this error.
    ///
    /// Only the extension and empty-table cases get a specific message; all
    /// other failures collapse to [`MSG_GENERIC`] so internal detail never
    /// leaks into the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            Csv2PdfError::NotACsv { .. } => MSG_NOT_CSV,
            Csv2PdfError::EmptyTable => MSG_EMPTY,
            _ => MSG_GENERIC,
        }
    }

    /// `true` for errors caused by the uploaded content itself rather than
    /// by the environment (network, disk, configuration).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Csv2PdfError::NotACsv { .. }
                | Csv2PdfError::UploadTooLarge { .. }
                | Csv2PdfError::Parse { .. }
                | Csv2PdfError::EmptyTable
        )
    }
}

/// A non-fatal error for one file of a batch.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("{input}: {detail}")]
pub struct FileError {
    /// The input path or URL as given by the caller.
    pub input: String,
    /// Position of the input in the batch (0-indexed).
    pub index: usize,
    /// Human-readable description of the underlying [`Csv2PdfError`].
    pub detail: String,
    /// The end-user message for the underlying error.
    pub user_message: String,
}

impl FileError {
    pub fn new(input: impl Into<String>, index: usize, err: &Csv2PdfError) -> Self {
        Self {
            input: input.into(),
            index,
            detail: err.to_string(),
            user_message: err.user_message().to_string(),
        }
    }
}
