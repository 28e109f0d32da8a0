//! Configuration types for CSV-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. A config is passed into every call;
//! nothing is read from ambient global state, so two concurrent conversions
//! with different titles or delimiters never see each other's settings.

use crate::error::Csv2PdfError;
use crate::pipeline::load::MAX_ROWS;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Title used when the caller supplies a blank one.
pub const DEFAULT_TITLE: &str = "CSV to PDF";

/// Default upload limit: 16 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Configuration for a CSV-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use csv2pdf::{ConversionConfig, Delimiter, Orientation};
///
/// let config = ConversionConfig::builder()
///     .delimiter(Delimiter::Char(b';'))
///     .title("Quarterly sales")
///     .orientation(Orientation::Portrait)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Field separator, or [`Delimiter::Auto`] to sniff it. Default: Auto.
    pub delimiter: Delimiter,

    /// Title printed centred above the table. Blank means [`DEFAULT_TITLE`].
    pub title: String,

    /// Page orientation. Default: landscape.
    ///
    /// Landscape is the default because CSV exports are usually wider than
    /// they are long per row; portrait leaves ~555pt of usable width, which
    /// fits only about thirteen columns at the 40pt floor.
    pub orientation: Orientation,

    /// Maximum number of data rows loaded. Range: 1–5000. Default: 5000.
    ///
    /// Rows past the cap are dropped silently (the stats record that it
    /// happened). The cap can be lowered but never raised above
    /// [`MAX_ROWS`].
    pub max_rows: usize,

    /// Largest accepted upload in bytes. Default: 16 MiB.
    pub max_upload_bytes: u64,

    /// Flate-compress page content streams. Default: true.
    pub compress: bool,

    /// Number of files converted at once by [`crate::stream::convert_stream`]. Default: 4.
    ///
    /// Each conversion is CPU-bound and runs on the blocking pool, so values
    /// well above the core count only add memory pressure.
    pub concurrency: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-file progress events for batch conversions.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::Auto,
            title: DEFAULT_TITLE.to_string(),
            orientation: Orientation::default(),
            max_rows: MAX_ROWS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            compress: true,
            concurrency: 4,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("delimiter", &self.delimiter)
            .field("title", &self.title)
            .field("orientation", &self.orientation)
            .field("max_rows", &self.max_rows)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("compress", &self.compress)
            .field("concurrency", &self.concurrency)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The title with surrounding whitespace removed, or [`DEFAULT_TITLE`]
    /// when nothing is left.
    pub fn effective_title(&self) -> &str {
        let t = self.title.trim();
        if t.is_empty() {
            DEFAULT_TITLE
        } else {
            t
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn delimiter(mut self, delimiter: Delimiter) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.config.orientation = orientation;
        self
    }

    pub fn max_rows(mut self, n: usize) -> Self {
        self.config.max_rows = n.clamp(1, MAX_ROWS);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn compress(mut self, v: bool) -> Self {
        self.config.compress = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Csv2PdfError> {
        let c = &self.config;
        if c.max_rows == 0 || c.max_rows > MAX_ROWS {
            return Err(Csv2PdfError::InvalidConfig(format!(
                "max_rows must be 1–{MAX_ROWS}, got {}",
                c.max_rows
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(Csv2PdfError::InvalidConfig(
                "max_upload_bytes must be > 0".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(Csv2PdfError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if let Delimiter::Char(b) = c.delimiter {
            if !b.is_ascii() || b == b'"' || b == b'\n' || b == b'\r' {
                return Err(Csv2PdfError::InvalidConfig(format!(
                    "Delimiter {:?} cannot separate fields",
                    b as char
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Field separator for the CSV loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Delimiter {
    /// Infer from content: comma, semicolon, tab or pipe. (default)
    #[default]
    Auto,
    /// A single ASCII byte.
    Char(u8),
}

impl Delimiter {
    /// The delimiter byte, or `None` for [`Delimiter::Auto`].
    pub fn as_byte(&self) -> Option<u8> {
        match self {
            Delimiter::Auto => None,
            Delimiter::Char(b) => Some(*b),
        }
    }
}

impl FromStr for Delimiter {
    type Err = Csv2PdfError;

    /// Accepts `auto`, the empty string (also auto), the names `comma`,
    /// `semicolon`, `tab` and `pipe`, the escape `\t`, or any single ASCII
    /// character.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "auto" => return Ok(Delimiter::Auto),
            "comma" => return Ok(Delimiter::Char(b',')),
            "semicolon" => return Ok(Delimiter::Char(b';')),
            "tab" | "\\t" => return Ok(Delimiter::Char(b'\t')),
            "pipe" => return Ok(Delimiter::Char(b'|')),
            _ => {}
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii() => Ok(Delimiter::Char(c as u8)),
            _ => Err(Csv2PdfError::InvalidConfig(format!(
                "Delimiter must be 'auto' or a single ASCII character, got {s:?}"
            ))),
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delimiter::Auto => f.write_str("auto"),
            Delimiter::Char(b'\t') => f.write_str("tab"),
            Delimiter::Char(b) => write!(f, "{}", *b as char),
        }
    }
}

/// Page orientation of the rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// A4 turned sideways, 841.89 × 595.28 pt. (default)
    #[default]
    Landscape,
    /// A4 upright, 595.28 × 841.89 pt.
    Portrait,
}

impl FromStr for Orientation {
    type Err = Csv2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "landscape" => Ok(Orientation::Landscape),
            "portrait" => Ok(Orientation::Portrait),
            other => Err(Csv2PdfError::InvalidConfig(format!(
                "Orientation must be 'landscape' or 'portrait', got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Landscape => f.write_str("landscape"),
            Orientation::Portrait => f.write_str("portrait"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.delimiter, Delimiter::Auto);
        assert_eq!(c.orientation, Orientation::Landscape);
        assert_eq!(c.max_rows, 5000);
        assert_eq!(c.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(c.effective_title(), "CSV to PDF");
    }

    #[test]
    fn blank_title_falls_back() {
        let c = ConversionConfig::builder().title("   ").build().unwrap();
        assert_eq!(c.effective_title(), DEFAULT_TITLE);
        let c = ConversionConfig::builder().title("  Report ").build().unwrap();
        assert_eq!(c.effective_title(), "Report");
    }

    #[test]
    fn max_rows_is_clamped_to_cap() {
        let c = ConversionConfig::builder().max_rows(10_000).build().unwrap();
        assert_eq!(c.max_rows, MAX_ROWS);
        let c = ConversionConfig::builder().max_rows(0).build().unwrap();
        assert_eq!(c.max_rows, 1);
    }

    #[test]
    fn quote_is_rejected_as_delimiter() {
        let err = ConversionConfig::builder()
            .delimiter(Delimiter::Char(b'"'))
            .build()
            .unwrap_err();
        assert!(matches!(err, Csv2PdfError::InvalidConfig(_)));
    }

    #[test]
    fn delimiter_from_str() {
        assert_eq!("auto".parse::<Delimiter>().unwrap(), Delimiter::Auto);
        assert_eq!("".parse::<Delimiter>().unwrap(), Delimiter::Auto);
        assert_eq!(",".parse::<Delimiter>().unwrap(), Delimiter::Char(b','));
        assert_eq!(";".parse::<Delimiter>().unwrap(), Delimiter::Char(b';'));
        assert_eq!("\t".parse::<Delimiter>().unwrap(), Delimiter::Char(b'\t'));
        assert_eq!("\\t".parse::<Delimiter>().unwrap(), Delimiter::Char(b'\t'));
        assert_eq!("TAB".parse::<Delimiter>().unwrap(), Delimiter::Char(b'\t'));
        assert_eq!("|".parse::<Delimiter>().unwrap(), Delimiter::Char(b'|'));
        assert!(";;".parse::<Delimiter>().is_err());
        assert!("§".parse::<Delimiter>().is_err());
    }

    #[test]
    fn delimiter_display_round_trips() {
        for d in [
            Delimiter::Auto,
            Delimiter::Char(b','),
            Delimiter::Char(b'\t'),
            Delimiter::Char(b'|'),
        ] {
            assert_eq!(d.to_string().parse::<Delimiter>().unwrap(), d);
        }
    }

    #[test]
    fn orientation_from_str() {
        assert_eq!("Landscape".parse::<Orientation>().unwrap(), Orientation::Landscape);
        assert_eq!("portrait".parse::<Orientation>().unwrap(), Orientation::Portrait);
        assert!("sideways".parse::<Orientation>().is_err());
    }
}
