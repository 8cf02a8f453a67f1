//! Progress-callback trait for per-source merge events.
//!
//! Inject an [`Arc<dyn MergeProgressCallback>`] via
//! [`crate::config::MergeConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline processes each source.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a Tokio broadcast channel, a WebSocket, a database record,
//! or a terminal progress bar — without the library knowing anything about how
//! the host application communicates. The trait is `Send + Sync` because
//! source pipelines run concurrently.

use std::sync::Arc;

/// Called by the merge pipeline as it processes each source.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_source_start`, `on_source_complete`, and `on_source_error` may be
/// called concurrently from different tasks. Implementations must protect
/// shared mutable state with appropriate synchronisation primitives
/// (e.g. `Mutex`, `AtomicUsize`).
pub trait MergeProgressCallback: Send + Sync {
    /// Called once before any source is fetched.
    ///
    /// # Arguments
    /// * `total_sources` — number of sources that will be processed
    fn on_merge_start(&self, total_sources: usize) {
        let _ = total_sources;
    }

    /// Called just before a source's fetch is dispatched.
    ///
    /// # Arguments
    /// * `index`         — zero-based position in the input list
    /// * `total_sources` — total sources in the request
    /// * `url`           — the source URL
    fn on_source_start(&self, index: usize, total_sources: usize, url: &str) {
        let _ = (index, total_sources, url);
    }

    /// Called when a source has been fetched and normalized successfully.
    ///
    /// # Arguments
    /// * `index`         — zero-based position in the input list
    /// * `total_sources` — total sources
    /// * `page_count`    — pages the source contributes to the output
    fn on_source_complete(&self, index: usize, total_sources: usize, page_count: usize) {
        let _ = (index, total_sources, page_count);
    }

    /// Called when a source's pipeline fails.
    ///
    /// # Arguments
    /// * `index`         — zero-based position in the input list
    /// * `total_sources` — total sources
    /// * `error`         — human-readable error description
    fn on_source_error(&self, index: usize, total_sources: usize, error: &str) {
        let _ = (index, total_sources, error);
    }

    /// Called once after every source has been attempted (or, under
    /// fail-fast, after the merge gave up).
    ///
    /// # Arguments
    /// * `total_sources` — total sources in the request
    /// * `success_count` — sources that normalized without error
    fn on_merge_complete(&self, total_sources: usize, success_count: usize) {
        let _ = (total_sources, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl MergeProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::MergeConfig`].
pub type ProgressCallback = Arc<dyn MergeProgressCallback>;
