//! Tabular loader: raw CSV bytes → [`Table`].
//!
//! ## Encoding fallback ladder
//!
//! Uploaded CSVs arrive in whatever encoding the exporting spreadsheet chose.
//! Rather than guessing with a statistical detector, the loader tries a fixed
//! sequence of strict decoders and keeps the first one that yields a
//! well-formed table:
//!
//! ```text
//! UTF-8 ──decode error──▶ Latin-1
//!   │                       │
//!   └──malformed──┬─────────┘ (malformed)
//!                 ▼
//!   UTF-8 → UTF-16 → Windows-1252 → Latin-1   (first success wins)
//! ```
//!
//! The same input and delimiter hint always take the same path, which makes
//! "why did my file load like this" questions answerable from the logs.

use crate::config::Delimiter;
use crate::error::Csv2PdfError;
use crate::table::{Cell, Table, TableSummary};
use csv::ReaderBuilder;
use encoding_rs::{UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, info, warn};

/// Hard ceiling on loaded data rows. The header row does not count.
pub const MAX_ROWS: usize = 5000;

/// Delimiters considered by [`sniff_delimiter`], in tie-break order.
pub const SNIFF_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Lines sampled by [`sniff_delimiter`].
const SNIFF_LINES: usize = 10;

/// A text encoding the loader knows how to decode strictly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    Utf8,
    Utf16,
    Windows1252,
    Latin1,
}

impl TextEncoding {
    /// Order in which encodings are retried after a malformed first attempt.
    pub const FALLBACK_LADDER: [TextEncoding; 4] = [
        TextEncoding::Utf8,
        TextEncoding::Utf16,
        TextEncoding::Windows1252,
        TextEncoding::Latin1,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16 => "utf-16",
            TextEncoding::Windows1252 => "windows-1252",
            TextEncoding::Latin1 => "latin-1",
        }
    }

    /// Decode `bytes`, or `None` if they are not valid in this encoding.
    ///
    /// UTF-8 drops a leading BOM. UTF-16 honours a BOM in either byte order
    /// and assumes little-endian without one. Latin-1 never fails.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            TextEncoding::Utf8 => {
                let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                UTF_8.decode_without_bom_handling_and_without_replacement(body)
            }
            TextEncoding::Utf16 => {
                if let Some(body) = bytes.strip_prefix(b"\xFF\xFE") {
                    UTF_16LE.decode_without_bom_handling_and_without_replacement(body)
                } else if let Some(body) = bytes.strip_prefix(b"\xFE\xFF") {
                    UTF_16BE.decode_without_bom_handling_and_without_replacement(body)
                } else {
                    UTF_16LE.decode_without_bom_handling_and_without_replacement(bytes)
                }
            }
            TextEncoding::Windows1252 => {
                WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes)
            }
            TextEncoding::Latin1 => Some(encoding_rs::mem::decode_latin1(bytes)),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A loaded table plus how it was obtained.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub table: Table,
    pub encoding: TextEncoding,
    /// The delimiter actually used (resolved when the hint was `Auto`).
    pub delimiter: u8,
    /// `true` when rows past the cap were dropped.
    pub truncated: bool,
}

impl LoadReport {
    pub fn summary(&self) -> TableSummary {
        TableSummary {
            columns: self.table.columns().to_vec(),
            row_count: self.table.row_count(),
            encoding: self.encoding.label().to_string(),
            delimiter: Delimiter::Char(self.delimiter).to_string(),
            truncated: self.truncated,
        }
    }
}

/// Why one decode+parse attempt failed.
#[derive(Debug)]
enum AttemptError {
    /// The bytes are not valid in the attempted encoding.
    Decode,
    /// The text decoded but is not a well-formed delimited table.
    Malformed(String),
}

/// Load a table with the default row cap.
///
/// The stream is rewound first, so a partially consumed reader is fine.
pub fn load<R: Read + Seek>(source: &mut R, delimiter: Delimiter) -> Result<Table, Csv2PdfError> {
    load_with_limit(source, delimiter, MAX_ROWS).map(|report| report.table)
}

/// Load a table, keeping at most `max_rows` data rows (never more than
/// [`MAX_ROWS`]).
pub fn load_with_limit<R: Read + Seek>(
    source: &mut R,
    delimiter: Delimiter,
    max_rows: usize,
) -> Result<LoadReport, Csv2PdfError> {
    source
        .seek(SeekFrom::Start(0))
        .map_err(|e| Csv2PdfError::Internal(format!("rewind failed: {e}")))?;
    let mut bytes = Vec::new();
    source
        .read_to_end(&mut bytes)
        .map_err(|e| Csv2PdfError::Internal(format!("read failed: {e}")))?;
    load_bytes(&bytes, delimiter, max_rows)
}

/// Run the encoding fallback ladder over an in-memory buffer.
///
/// Every attempt starts again from the first byte of `bytes`.
pub fn load_bytes(
    bytes: &[u8],
    delimiter: Delimiter,
    max_rows: usize,
) -> Result<LoadReport, Csv2PdfError> {
    let cap = max_rows.min(MAX_ROWS);

    let original = match attempt(bytes, TextEncoding::Utf8, delimiter, cap) {
        Ok(report) => return Ok(finish(report)),
        Err(AttemptError::Decode) => {
            debug!("Input is not valid UTF-8, retrying as latin-1");
            match attempt(bytes, TextEncoding::Latin1, delimiter, cap) {
                Ok(report) => return Ok(finish(report)),
                Err(AttemptError::Malformed(detail)) => detail,
                // latin-1 decodes every byte sequence
                Err(AttemptError::Decode) => "input could not be decoded".to_string(),
            }
        }
        Err(AttemptError::Malformed(detail)) => detail,
    };

    warn!("CSV is malformed ({}), trying fallback encodings", original);
    for encoding in TextEncoding::FALLBACK_LADDER {
        match attempt(bytes, encoding, delimiter, cap) {
            Ok(report) => return Ok(finish(report)),
            Err(AttemptError::Decode) => debug!("{encoding}: not decodable"),
            Err(AttemptError::Malformed(detail)) => debug!("{encoding}: {detail}"),
        }
    }

    Err(Csv2PdfError::Parse { detail: original })
}

fn finish(report: LoadReport) -> LoadReport {
    info!(
        "Loaded {} rows × {} columns ({}, delimiter {:?})",
        report.table.row_count(),
        report.table.column_count(),
        report.encoding,
        report.delimiter as char
    );
    if report.truncated {
        info!(
            "Row cap reached; rows after {} were dropped",
            report.table.row_count()
        );
    }
    report
}

fn attempt(
    bytes: &[u8],
    encoding: TextEncoding,
    delimiter: Delimiter,
    cap: usize,
) -> Result<LoadReport, AttemptError> {
    let text = encoding.decode(bytes).ok_or(AttemptError::Decode)?;
    let delimiter = delimiter
        .as_byte()
        .unwrap_or_else(|| sniff_delimiter(&text));
    let (table, truncated) = parse_text(&text, delimiter, cap).map_err(AttemptError::Malformed)?;
    Ok(LoadReport {
        table,
        encoding,
        delimiter,
        truncated,
    })
}

/// Parse decoded text into a table of at most `cap` rows.
///
/// Returns the table and whether further records were left unread.
fn parse_text(text: &str, delimiter: u8, cap: usize) -> Result<(Table, bool), String> {
    if text.contains('\0') {
        return Err("text contains NUL characters".to_string());
    }
    if text.trim().is_empty() {
        return Err("no columns to parse from file".to_string());
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| format!("failed to read header row: {e}"))?
        .clone();
    if headers.is_empty() {
        return Err("header row is empty".to_string());
    }

    let mut table = Table::new(headers.iter().map(str::to_string).collect());
    let mut truncated = false;

    for result in reader.records() {
        if table.row_count() == cap {
            truncated = true;
            break;
        }
        let record = result.map_err(|e| format!("malformed record: {e}"))?;
        let cells = record.iter().map(Cell::from_field).collect();
        if let Err(row) = table.push_row(cells) {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(format!(
                "expected {} fields in line {}, saw {}",
                headers.len(),
                line,
                row.len()
            ));
        }
    }

    Ok((table, truncated))
}

/// Pick the most plausible delimiter from the first lines of `text`.
///
/// Each candidate is scored by how often it appears per line (outside
/// quotes) and how consistent that count is across lines:
/// `mean / (1 + stddev)`. Text where no candidate appears at all is treated
/// as a single comma-separated column.
pub fn sniff_delimiter(text: &str) -> u8 {
    let sample: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    if sample.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0.0f64;

    for &candidate in &SNIFF_CANDIDATES {
        let counts: Vec<f64> = sample
            .iter()
            .map(|line| count_unquoted(line, candidate) as f64)
            .collect();
        let n = counts.len() as f64;
        let mean = counts.iter().sum::<f64>() / n;
        let variance = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
        let score = mean / (1.0 + variance.sqrt());

        if score > best_score {
            best_score = score;
            best = candidate;
        }
    }

    debug!("Sniffed delimiter {:?} (score {:.2})", best as char, best_score);
    best
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for &b in line.as_bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if b == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}
