//! Progress-callback trait for per-source extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the run works through its inputs.
//!
//! Inputs are processed one at a time, in order, so events for a run always
//! arrive as `start → (source_start → complete|error)* → run_complete` and
//! `index` increases monotonically.
//!
//! # Example
//!
//! ```rust
//! use edgequake_catalog::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     variants: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_source_complete(&self, index: usize, total: usize, source: &str, variants: usize) {
//!         self.variants.fetch_add(variants, Ordering::SeqCst);
//!         eprintln!("[{}/{}] {} → {} variants", index + 1, total, source, variants);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { variants: AtomicUsize::new(0) });
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction run as it processes each input.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 0-based.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once, after input validation, before the first source.
    fn on_run_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before the adapter is asked to extract a source.
    fn on_source_start(&self, index: usize, total: usize, source: &str) {
        let _ = (index, total, source);
    }

    /// Called when a source was merged into the aggregate.
    ///
    /// * `variants` — number of variants the source contributed
    fn on_source_complete(&self, index: usize, total: usize, source: &str, variants: usize) {
        let _ = (index, total, source, variants);
    }

    /// Called when a source failed and was skipped.
    fn on_source_error(&self, index: usize, total: usize, source: &str, error: &str) {
        let _ = (index, total, source, error);
    }

    /// Called once after every source has been attempted.
    fn on_run_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ExtractionProgressCallback for Recorder {
        fn on_run_start(&self, total: usize) {
            self.events.lock().unwrap().push(format!("start {total}"));
        }

        fn on_source_start(&self, index: usize, _total: usize, source: &str) {
            self.events.lock().unwrap().push(format!("begin {index} {source}"));
        }

        fn on_source_error(&self, index: usize, _total: usize, _source: &str, error: &str) {
            self.events.lock().unwrap().push(format!("error {index} {error}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_source_start(0, 2, "a.pdf");
        cb.on_source_complete(0, 2, "a.pdf", 12);
        cb.on_source_error(1, 2, "b.pdf", "boom");
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Recorder::default();
        rec.on_run_start(1);
        rec.on_source_start(0, 1, "https://acme.test");
        rec.on_source_complete(0, 1, "https://acme.test", 3);
        rec.on_source_error(0, 1, "https://acme.test", "timeout");
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["start 1", "begin 0 https://acme.test", "error 0 timeout"]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(10);
        cb.on_run_complete(10, 10);
    }
}
