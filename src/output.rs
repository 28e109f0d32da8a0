//! Result types returned by the conversion entry points.

use crate::convert::write_atomic;
use crate::error::Csv2PdfError;
use crate::pipeline::render::RenderedDocument;
use crate::table::TableSummary;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// MIME type of every produced document.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A converted document ready to hand back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// The PDF itself.
    #[serde(skip)]
    pub document: RenderedDocument,
    /// Download name: the upload's stem with a `.pdf` extension.
    pub filename: String,
    /// Always [`PDF_MIME_TYPE`].
    pub mime_type: &'static str,
    pub summary: TableSummary,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    pub fn bytes(&self) -> &[u8] {
        self.document.as_bytes()
    }

    /// Write the PDF to `path` via a temp file and rename, creating parent
    /// directories as needed. A reader never sees a half-written file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), Csv2PdfError> {
        write_atomic(path.as_ref(), self.bytes()).await
    }
}

/// Counters and timings for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub rows: usize,
    pub columns: usize,
    pub pages: usize,
    pub pdf_bytes: usize,
    pub encoding: String,
    pub delimiter: String,
    /// Rows past the cap were dropped.
    pub truncated: bool,
    pub load_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// One successfully converted file of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    /// Position of the input in the batch (0-indexed).
    pub index: usize,
    /// The input path or URL as given.
    pub input: String,
    /// Name the PDF was (or would be) saved under.
    pub output_filename: String,
    /// Where the PDF was written, when the batch had an output directory.
    pub output_path: Option<String>,
    pub stats: ConversionStats,
}
