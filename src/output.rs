//! Result types handed back to the caller.
//!
//! [`MergeOutput`] wraps the assembled PDF bytes together with
//! [`MergeStats`] (page count, byte size, phase timings). Failures carry
//! [`SourceFailure`] entries — one per failed source, serde-serializable —
//! so an HTTP layer can build a diagnostic response listing every bad input
//! without reaching into library internals.

use crate::error::{SourceError, SourceErrorKind};
use serde::{Deserialize, Serialize};

/// The result of a successful merge.
pub struct MergeOutput {
    /// The assembled PDF document.
    pub pdf: Vec<u8>,
    /// Counts and timings for the run.
    pub stats: MergeStats,
}

impl MergeOutput {
    /// Page count of the assembled document.
    pub fn page_count(&self) -> usize {
        self.stats.total_pages
    }
}

impl std::fmt::Debug for MergeOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeOutput")
            .field("pdf", &format_args!("<{} bytes>", self.pdf.len()))
            .field("stats", &self.stats)
            .finish()
    }
}

/// Counts and timings for one merge run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeStats {
    /// Number of sources in the request.
    pub total_sources: usize,
    /// Pages in the assembled output — the sum of every source's page count.
    pub total_pages: usize,
    /// Per-source page counts, in input order.
    pub pages_per_source: Vec<usize>,
    /// Size of the assembled PDF in bytes.
    pub byte_size: usize,
    /// Wall-clock time spent fetching and normalizing (the concurrent
    /// fan-out phase, bounded by the slowest source).
    pub pipeline_duration_ms: u64,
    /// Wall-clock time spent concatenating pages into the output document.
    pub assemble_duration_ms: u64,
    /// Total wall-clock time for the merge call.
    pub total_duration_ms: u64,
}

/// One failed source, as reported in
/// [`MergeError::SourcesFailed`](crate::MergeError::SourcesFailed).
///
/// `index` is the source's position in the caller's input list, so the
/// caller can fix exactly the inputs that failed and resubmit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFailure {
    /// Zero-based position in the input source list.
    pub index: usize,
    /// The source URL as supplied by the caller.
    pub url: String,
    /// Machine-readable error classification.
    pub kind: SourceErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl SourceFailure {
    /// Build a failure entry from a per-source error.
    pub fn from_error(index: usize, error: &SourceError) -> Self {
        Self {
            index,
            url: error.url().to_string(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
