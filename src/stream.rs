//! Batch conversion API: emit one result per file as each completes.
//!
//! Unlike the single-file [`crate::convert::convert`], [`convert_stream`]
//! takes many inputs and yields a `Result<FileResult, FileError>` per file,
//! so one bad upload never aborts the rest. Files run concurrently (up to
//! `config.concurrency`) and arrive in completion order; sort by `index` if
//! order matters.

use crate::config::ConversionConfig;
use crate::convert::convert_input;
use crate::error::{Csv2PdfError, FileError};
use crate::output::FileResult;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of per-file results.
pub type FileStream = Pin<Box<dyn Stream<Item = Result<FileResult, FileError>> + Send>>;

/// Convert every input, streaming results as they are ready.
///
/// With `output_dir` set, each PDF is written there (atomically) under the
/// name derived from its upload. When two uploads derive the same name, the
/// later one gets a numeric suffix (`x.pdf`, `x-1.pdf`, ...); otherwise the PDF is dropped after
/// conversion and only stats are reported. Progress callbacks fire for the
/// batch and for each file; `on_batch_complete` fires once the stream has
/// been drained.
pub fn convert_stream(
    inputs: Vec<String>,
    output_dir: Option<PathBuf>,
    config: &ConversionConfig,
) -> FileStream {
    let total = inputs.len();
    info!("Starting batch conversion of {} files", total);

    let cb = config.progress_callback.clone();
    if let Some(ref cb) = cb {
        cb.on_batch_start(total);
    }

    let concurrency = config.concurrency.max(1);
    let config = config.clone();
    let output_dir = output_dir.map(|dir| Arc::new(OutputDir::new(dir)));

    let results = stream::iter(inputs.into_iter().enumerate().map(move |(index, input)| {
        let cfg = config.clone();
        let output_dir = output_dir.clone();
        async move {
            let cb = cfg.progress_callback.clone();
            if let Some(ref cb) = cb {
                cb.on_file_start(index, total, input.clone());
            }

            let result = convert_file(index, &input, output_dir.as_deref(), &cfg).await;
            match &result {
                Ok(r) => {
                    if let Some(ref cb) = cb {
                        cb.on_file_complete(index, total, r.stats.pages);
                    }
                }
                Err(e) => {
                    warn!("File #{} ({}) failed: {}", index, input, e.detail);
                    if let Some(ref cb) = cb {
                        cb.on_file_error(index, total, e.detail.clone());
                    }
                }
            }
            result
        }
    }))
    .buffer_unordered(concurrency);

    let finished = Arc::new(AtomicUsize::new(0));
    let done = Arc::clone(&finished);
    let tail = stream::once(async move {
        if let Some(cb) = cb {
            cb.on_batch_complete(total, done.load(Ordering::SeqCst));
        }
    })
    .filter_map(|_| async { None::<Result<FileResult, FileError>> });

    let counted = results.inspect(move |r| {
        if r.is_ok() {
            finished.fetch_add(1, Ordering::SeqCst);
        }
    });

    Box::pin(counted.chain(tail))
}

/// Batch output directory plus the file names already handed out in it.
struct OutputDir {
    path: PathBuf,
    claimed: Mutex<HashSet<String>>,
}

impl OutputDir {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Reserve `filename`, or the first free `stem-N.pdf` if it is taken.
    fn claim(&self, filename: &str) -> String {
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        if claimed.insert(filename.to_string()) {
            return filename.to_string();
        }
        let stem = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut n = 1;
        loop {
            let candidate = format!("{stem}-{n}.pdf");
            if claimed.insert(candidate.clone()) {
                warn!("'{}' already written in this batch, using '{}'", filename, candidate);
                return candidate;
            }
            n += 1;
        }
    }
}

async fn convert_file(
    index: usize,
    input: &str,
    output_dir: Option<&OutputDir>,
    config: &ConversionConfig,
) -> Result<FileResult, FileError> {
    let fail = |e: Csv2PdfError| FileError::new(input, index, &e);

    let output = convert_input(input, config).await.map_err(fail)?;
    let (output_filename, output_path) = match output_dir {
        Some(dir) => {
            let name = dir.claim(&output.filename);
            let path = dir.path.join(&name);
            output.save(&path).await.map_err(fail)?;
            (name, Some(path.to_string_lossy().into_owned()))
        }
        None => (output.filename.clone(), None),
    };

    Ok(FileResult {
        index,
        input: input.to_string(),
        output_filename,
        output_path,
        stats: output.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ConversionProgressCallback;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_batch_start(&self, total: usize) {
            self.events.lock().unwrap().push(format!("start {total}"));
        }
        fn on_file_error(&self, index: usize, _total: usize, _error: String) {
            self.events.lock().unwrap().push(format!("error {index}"));
        }
        fn on_batch_complete(&self, total: usize, ok: usize) {
            self.events.lock().unwrap().push(format!("done {ok}/{total}"));
        }
    }

    #[tokio::test]
    async fn batch_reports_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.csv");
        let empty = dir.path().join("empty.csv");
        std::fs::write(&good, b"a,b\n1,2\n").unwrap();
        std::fs::write(&empty, b"a,b\n").unwrap();

        let out_dir = dir.path().join("out");
        let recorder = Arc::new(Recorder::default());
        let config = ConversionConfig::builder()
            .concurrency(2)
            .progress_callback(recorder.clone())
            .build()
            .unwrap();

        let inputs = vec![
            good.to_string_lossy().into_owned(),
            empty.to_string_lossy().into_owned(),
            "notes.txt".to_string(),
        ];
        let mut results: Vec<_> = convert_stream(inputs, Some(out_dir.clone()), &config)
            .collect()
            .await;
        results.sort_by_key(|r| match r {
            Ok(f) => f.index,
            Err(e) => e.index,
        });

        assert_eq!(results.len(), 3);
        let ok = results[0].as_ref().unwrap();
        assert_eq!(ok.output_filename, "good.pdf");
        assert!(out_dir.join("good.pdf").exists());
        assert!(results[1].is_err());
        assert!(results[2].is_err());

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.first().map(String::as_str), Some("start 3"));
        assert_eq!(events.last().map(String::as_str), Some("done 1/3"));
        assert_eq!(events.iter().filter(|e| e.starts_with("error")).count(), 2);
    }

    #[tokio::test]
    async fn same_stem_from_different_dirs_gets_distinct_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut inputs = Vec::new();
        for sub in ["a", "b", "c"] {
            let d = dir.path().join(sub);
            std::fs::create_dir(&d).unwrap();
            let src = d.join("x.csv");
            std::fs::write(&src, format!("col\n{sub}\n")).unwrap();
            inputs.push(src.to_string_lossy().into_owned());
        }

        let out_dir = dir.path().join("out");
        let config = ConversionConfig::builder().concurrency(3).build().unwrap();
        let results: Vec<FileResult> = convert_stream(inputs, Some(out_dir.clone()), &config)
            .map(|r| r.unwrap())
            .collect()
            .await;

        let mut names: Vec<&str> = results.iter().map(|r| r.output_filename.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["x-1.pdf", "x-2.pdf", "x.pdf"]);
        for name in names {
            assert!(out_dir.join(name).exists(), "{name} missing");
        }
        assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 3);
    }

    #[test]
    fn claim_skips_names_already_taken() {
        let dir = OutputDir::new(PathBuf::from("out"));
        assert_eq!(dir.claim("x-1.pdf"), "x-1.pdf");
        assert_eq!(dir.claim("x.pdf"), "x.pdf");
        assert_eq!(dir.claim("x.pdf"), "x-2.pdf");
    }

    #[tokio::test]
    async fn empty_batch_yields_nothing() {
        let results: Vec<_> = convert_stream(vec![], None, &ConversionConfig::default())
            .collect()
            .await;
        assert!(results.is_empty());
    }
}
