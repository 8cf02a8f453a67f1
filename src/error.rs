//! Error types for the docmerge library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`MergeError`] — **Fatal**: the merge cannot produce output at all
//!   (empty source list, every-source aggregate failure, store fault).
//!   Returned as `Err(MergeError)` from the top-level `merge*` functions.
//!
//! * [`SourceError`] — **Per-source**: one input URL failed somewhere in its
//!   fetch → detect → normalize pipeline. These are captured locally, never
//!   propagated mid-pipeline, and aggregated into
//!   [`MergeError::SourcesFailed`] so the caller sees *every* bad input in
//!   one round trip instead of fixing them one resubmission at a time.
//!
//! The merge is all-or-nothing: a single [`SourceError`] fails the whole
//! request. A partially merged business document is worse than an explicit
//! failure.

use crate::output::SourceFailure;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docmerge library.
///
/// Per-source failures use [`SourceError`] and are aggregated into
/// [`MergeError::SourcesFailed`] rather than surfacing individually.
#[derive(Debug, Error)]
pub enum MergeError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The caller supplied no sources. Rejected before any fetch dispatch.
    #[error("no sources to merge: the source list is empty")]
    EmptySources,

    /// At least one source failed its pipeline; the merge is abandoned.
    ///
    /// Carries one entry per failed source (index, URL, error kind, message)
    /// so an API layer can enumerate every bad input without re-deriving
    /// internals.
    #[error("{failed}/{total} sources failed during merge")]
    SourcesFailed {
        failed: usize,
        total: usize,
        failures: Vec<SourceFailure>,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The object store rejected the merged artifact.
    #[error("object store error: {0}")]
    Store(#[from] crate::store::StoreError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (assembly fault, task panic). Never
    /// accompanied by partial output.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MergeError {
    /// The per-source failure list, if this error carries one.
    pub fn failures(&self) -> &[SourceFailure] {
        match self {
            MergeError::SourcesFailed { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// A failure local to one source's fetch → detect → normalize pipeline.
///
/// Captured per source and folded into [`MergeError::SourcesFailed`]; a
/// failing source never aborts sibling pipelines.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum SourceError {
    /// The URL is not a well-formed absolute URL. No network call was made.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// The fetch did not complete within the configured per-fetch timeout.
    #[error("timeout after {secs}s fetching {url}")]
    Timeout { url: String, secs: u64 },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// Transport-level failure (DNS, connection refused, TLS, redirect
    /// limit exceeded).
    #[error("network error fetching {url}: {detail}")]
    Network { url: String, detail: String },

    /// The server answered 2xx with a zero-byte body. An empty response is
    /// never treated as an empty valid document.
    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    /// The fetched bytes match no recognized PDF or image signature.
    #[error("unsupported format from {url}: first bytes {magic:02x?}")]
    UnsupportedFormat { url: String, magic: Vec<u8> },

    /// The bytes carried a PDF signature but could not be parsed.
    #[error("corrupt PDF from {url}: {detail}")]
    PdfParse { url: String, detail: String },

    /// The bytes carried an image signature but could not be decoded.
    #[error("image decode failed for {url}: {detail}")]
    ImageDecode { url: String, detail: String },
}

impl SourceError {
    /// Stable machine-readable kind for diagnostics and API responses.
    pub fn kind(&self) -> SourceErrorKind {
        match self {
            SourceError::InvalidUrl { .. } => SourceErrorKind::InvalidUrl,
            SourceError::Timeout { .. } => SourceErrorKind::Timeout,
            SourceError::HttpStatus { .. } => SourceErrorKind::HttpError,
            SourceError::Network { .. } => SourceErrorKind::NetworkError,
            SourceError::EmptyBody { .. } => SourceErrorKind::EmptyBody,
            SourceError::UnsupportedFormat { .. } => SourceErrorKind::UnsupportedFormat,
            SourceError::PdfParse { .. } => SourceErrorKind::PdfParseError,
            SourceError::ImageDecode { .. } => SourceErrorKind::ImageDecodeError,
        }
    }

    /// The source URL this error refers to.
    pub fn url(&self) -> &str {
        match self {
            SourceError::InvalidUrl { url }
            | SourceError::Timeout { url, .. }
            | SourceError::HttpStatus { url, .. }
            | SourceError::Network { url, .. }
            | SourceError::EmptyBody { url }
            | SourceError::UnsupportedFormat { url, .. }
            | SourceError::PdfParse { url, .. }
            | SourceError::ImageDecode { url, .. } => url,
        }
    }
}

/// Machine-readable classification of a [`SourceError`].
///
/// Serialized in snake_case (`"http_error"`, `"unsupported_format"`, …) for
/// failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    InvalidUrl,
    Timeout,
    HttpError,
    NetworkError,
    EmptyBody,
    UnsupportedFormat,
    PdfParseError,
    ImageDecodeError,
}
