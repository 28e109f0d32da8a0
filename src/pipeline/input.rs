//! Input resolution: turn a user-supplied path or URL into an in-memory upload.
//!
//! A CSV is read whole before parsing (the loader has to retry the same
//! bytes under several encodings), so both local files and downloads end up
//! as a [`RawUpload`]: the original filename plus the raw bytes. Filename
//! and size checks live here too because they run before any decoding.

use crate::error::Csv2PdfError;
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Suffix accepted for uploads, compared case-insensitively.
pub const CSV_SUFFIX: &str = ".csv";

const DEFAULT_DOWNLOAD_NAME: &str = "download.csv";

static CONTENT_DISPOSITION_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename\*?\s*=\s*(?:UTF-8'')?"?([^";]+)"?"#)
        .expect("static regex is valid")
});

/// An uploaded file: its client-side name and unparsed bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawUpload {
    pub filename: String,
    pub content: Vec<u8>,
}

impl RawUpload {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local file or download a URL.
///
/// The name is checked first, then the size: a local file by its metadata,
/// a download by `Content-Length` and again while the body streams in.
/// Nothing past `max_bytes` is buffered.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
    max_bytes: u64,
) -> Result<RawUpload, Csv2PdfError> {
    if is_url(input) {
        download_url(input, timeout_secs, max_bytes).await
    } else {
        read_local(input, max_bytes).await
    }
}

/// Reject filenames that do not end in `.csv` (any case).
///
/// A bare `.csv` counts: only the suffix is checked.
pub fn validate_filename(filename: &str) -> Result<(), Csv2PdfError> {
    if filename.to_ascii_lowercase().ends_with(CSV_SUFFIX) {
        Ok(())
    } else {
        Err(Csv2PdfError::NotACsv {
            filename: filename.to_string(),
        })
    }
}

/// Reject uploads larger than `limit` bytes.
pub fn check_size(size: u64, limit: u64) -> Result<(), Csv2PdfError> {
    if size > limit {
        return Err(Csv2PdfError::UploadTooLarge { size, limit });
    }
    Ok(())
}

/// Output filename for an upload: same stem, `.pdf` extension.
///
/// Any directory part of the client-side name is dropped.
pub fn pdf_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("table");
    format!("{stem}.pdf")
}

async fn read_local(path_str: &str, max_bytes: u64) -> Result<RawUpload, Csv2PdfError> {
    let path = PathBuf::from(path_str);
    let open_err = |e: std::io::Error| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Csv2PdfError::PermissionDenied { path: path.clone() },
        _ => Csv2PdfError::FileNotFound { path: path.clone() },
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());
    validate_filename(&filename)?;

    let metadata = tokio::fs::metadata(&path).await.map_err(open_err)?;
    check_size(metadata.len(), max_bytes)?;
    let content = tokio::fs::read(&path).await.map_err(open_err)?;
    debug!("Read {} bytes from {}", content.len(), path.display());
    Ok(RawUpload { filename, content })
}

async fn download_url(
    url: &str,
    timeout_secs: u64,
    max_bytes: u64,
) -> Result<RawUpload, Csv2PdfError> {
    info!("Downloading CSV from: {}", url);

    let failed = |reason: String| Csv2PdfError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Csv2PdfError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let disposition = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let filename = extract_filename(url, disposition.as_deref());
    validate_filename(&filename)?;
    if let Some(len) = response.content_length() {
        check_size(len, max_bytes)?;
    }

    let mut content = Vec::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| failed(e.to_string()))?;
        content.extend_from_slice(&chunk);
        check_size(content.len() as u64, max_bytes)?;
    }
    info!("Downloaded {} bytes as '{}'", content.len(), filename);

    Ok(RawUpload { filename, content })
}

/// Pick a filename from `Content-Disposition`, then the URL path.
fn extract_filename(url: &str, content_disposition: Option<&str>) -> String {
    if let Some(name) = content_disposition
        .and_then(|h| CONTENT_DISPOSITION_FILENAME.captures(h))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|n| !n.is_empty())
    {
        return name.to_string();
    }

    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(last) = parsed.path_segments().and_then(|mut s| s.next_back()) {
            if !last.is_empty() && last.contains('.') {
                return last.to_string();
            }
        }
    }

    DEFAULT_DOWNLOAD_NAME.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/data.csv"));
        assert!(is_url("http://example.com/data.csv"));
        assert!(!is_url("/tmp/data.csv"));
        assert!(!is_url("data.csv"));
        assert!(!is_url(""));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(validate_filename("data.csv").is_ok());
        assert!(validate_filename("DATA.CSV").is_ok());
        assert!(validate_filename("dir/report.Csv").is_ok());
        assert!(validate_filename(".csv").is_ok());
        assert!(validate_filename(".CSV").is_ok());
        for bad in ["data.txt", "data", "csv", "data.csv.gz", ""] {
            assert!(
                matches!(validate_filename(bad), Err(Csv2PdfError::NotACsv { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert!(check_size(10, 10).is_ok());
        assert!(matches!(
            check_size(11, 10),
            Err(Csv2PdfError::UploadTooLarge { size: 11, limit: 10 })
        ));
    }

    #[test]
    fn pdf_filename_swaps_extension() {
        assert_eq!(pdf_filename("sales.csv"), "sales.pdf");
        assert_eq!(pdf_filename("Q1.report.CSV"), "Q1.report.pdf");
        assert_eq!(pdf_filename("/tmp/up/x.csv"), "x.pdf");
        assert_eq!(pdf_filename(".csv"), ".csv.pdf");
    }

    #[test]
    fn filename_from_content_disposition() {
        let url = "https://example.com/export?id=4";
        assert_eq!(
            extract_filename(url, Some(r#"attachment; filename="orders.csv""#)),
            "orders.csv"
        );
        assert_eq!(
            extract_filename(url, Some("attachment; filename*=UTF-8''na%C3%AFve.csv")),
            "na%C3%AFve.csv"
        );
        assert_eq!(extract_filename(url, Some("inline")), DEFAULT_DOWNLOAD_NAME);
        assert_eq!(extract_filename(url, None), DEFAULT_DOWNLOAD_NAME);
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(
            extract_filename("https://example.com/files/people.csv?x=1", None),
            "people.csv"
        );
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = resolve_input("/definitely/not/here.csv", 5, 1024).await.unwrap_err();
        assert!(matches!(err, Csv2PdfError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_keeps_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, b"a,b\n1,2\n").unwrap();
        let upload = resolve_input(path.to_str().unwrap(), 5, 1024).await.unwrap();
        assert_eq!(upload.filename, "people.csv");
        assert_eq!(upload.content, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn oversized_local_file_is_rejected_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.csv");
        std::fs::File::create(&path).unwrap().set_len(64 << 20).unwrap();

        let err = resolve_input(path.to_str().unwrap(), 5, 1024).await.unwrap_err();
        assert!(matches!(
            err,
            Csv2PdfError::UploadTooLarge { size, limit: 1024 } if size == 64 << 20
        ));
    }

    #[tokio::test]
    async fn local_name_is_checked_before_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.txt");
        std::fs::File::create(&path).unwrap().set_len(4096).unwrap();

        let err = resolve_input(path.to_str().unwrap(), 5, 1024).await.unwrap_err();
        assert!(matches!(err, Csv2PdfError::NotACsv { .. }));
    }
}
