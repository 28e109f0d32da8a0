//! Progress-callback trait for per-file conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events while [`crate::stream::convert_stream`] works through a batch, or
//! while a single [`crate::convert::convert`] call runs (a batch of one).
//!
//! # Example
//!
//! ```rust
//! use csv2pdf::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, pages: usize) {
//!         let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("[{done}/{total}] file #{index}: {pages} pages");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the converter as it processes each file.
///
/// All methods have default no-op implementations. In a batch the per-file
/// methods may be called concurrently from different tasks, so shared state
/// needs `Mutex` or atomics.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any file is read.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when work on a file begins.
    ///
    /// * `index` — 0-based position in the batch
    /// * `input` — the path or URL as given
    fn on_file_start(&self, index: usize, total_files: usize, input: String) {
        let _ = (index, total_files, input);
    }

    /// Called when a file has been converted.
    ///
    /// * `pages` — page count of the produced PDF
    fn on_file_complete(&self, index: usize, total_files: usize, pages: usize) {
        let _ = (index, total_files, pages);
    }

    /// Called when a file failed; `error` is the detailed message.
    ///
    /// Takes an owned `String` so implementations can move it into a
    /// spawned task.
    fn on_file_error(&self, index: usize, total_files: usize, error: String) {
        let _ = (index, total_files, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        batch_total: AtomicUsize,
        successes: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_files: usize) {
            self.batch_total.store(total_files, Ordering::SeqCst);
        }

        fn on_file_start(&self, _index: usize, _total: usize, _input: String) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _index: usize, _total: usize, _pages: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_error(&self, _index: usize, _total: usize, _error: String) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, success_count: usize) {
            self.successes.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_file_start(0, 2, "a.csv".into());
        cb.on_file_complete(0, 2, 3);
        cb.on_file_error(1, 2, "empty".into());
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_batch_start(3);
        tracker.on_file_start(0, 3, "a.csv".into());
        tracker.on_file_complete(0, 3, 1);
        tracker.on_file_start(1, 3, "b.csv".into());
        tracker.on_file_complete(1, 3, 4);
        tracker.on_file_start(2, 3, "c.txt".into());
        tracker.on_file_error(2, 3, "not a csv".into());
        tracker.on_batch_complete(3, 2);

        assert_eq!(tracker.batch_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.successes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(1);
        cb.on_file_complete(0, 1, 7);
    }
}
