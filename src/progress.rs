//! Progress-callback trait for the download and render stages.
//!
//! Inject an [`Arc<dyn HarvestProgress>`] into
//! [`crate::download::Downloader::progress`] or
//! [`crate::pipeline::Harvester::render_all`] to observe the run. Events are
//! informational only; nothing in the pipeline depends on them.
//!
//! # Example
//!
//! ```rust
//! use pdf_harvest::HarvestProgress;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl HarvestProgress for Counter {
//!     fn on_document_complete(&self, name: &str, pages: usize) {
//!         let done = self.0.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}: {name} ({pages} pages)");
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::pipeline::RenderReport;

/// Called by the pipeline as documents move through it.
///
/// Render events arrive from several workers at once; implementations must
/// synchronise their own state. Every method defaults to a no-op.
pub trait HarvestProgress: Send + Sync {
    /// Called after each download batch finishes.
    ///
    /// # Arguments
    /// * `done`  - URLs finished so far (success or failure)
    /// * `total` - URLs in the whole run
    fn on_download_batch(&self, done: usize, total: usize) {
        let _ = (done, total);
    }

    /// Called once before any document is rendered.
    fn on_render_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// A document was rendered and its pages recorded.
    fn on_document_complete(&self, name: &str, pages: usize) {
        let _ = (name, pages);
    }

    /// A document already had pages and was left alone.
    fn on_document_skipped(&self, name: &str) {
        let _ = name;
    }

    /// A document could not be rendered; it will be retried on the next run.
    fn on_document_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }

    /// Called once after every document has been attempted.
    fn on_render_complete(&self, report: &RenderReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl HarvestProgress for NoopProgress {}

/// Convenience alias for a shared progress sink.
pub type ProgressSink = Arc<dyn HarvestProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        completes: AtomicUsize,
        skips: AtomicUsize,
        errors: AtomicUsize,
    }

    impl HarvestProgress for Tracking {
        fn on_document_complete(&self, _name: &str, _pages: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_skipped(&self, _name: &str) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_error(&self, _name: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_progress_does_not_panic() {
        let p = NoopProgress;
        p.on_download_batch(4, 10);
        p.on_render_start(3);
        p.on_document_complete("a.pdf", 3);
        p.on_document_skipped("b.pdf");
        p.on_document_error("c.pdf", "corrupt");
        p.on_render_complete(&RenderReport::default());
    }

    #[test]
    fn dyn_progress_receives_events() {
        let tracking = Arc::new(Tracking::default());
        let sink: ProgressSink = tracking.clone();
        sink.on_document_complete("a.pdf", 2);
        sink.on_document_skipped("b.pdf");
        sink.on_document_error("c.pdf", "boom");
        sink.on_document_complete("d.pdf", 1);

        assert_eq!(tracking.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracking.skips.load(Ordering::SeqCst), 1);
        assert_eq!(tracking.errors.load(Ordering::SeqCst), 1);
    }
}
