//! # docmerge
//!
//! Merge remotely hosted PDF and image files into a single PDF document.
//!
//! ## Why this crate?
//!
//! Document workflows routinely hold a dossier as a pile of presigned
//! storage URLs — scanned IDs as JPEGs, generated contracts as PDFs — and
//! need them delivered as one ordered PDF. This crate fetches every source
//! concurrently, normalizes each into PDF pages (images become a page sized
//! exactly to their pixel dimensions), and concatenates the pages strictly
//! in the caller's order. The merge is all-or-nothing: if any source fails,
//! the whole request fails with a per-source error report, because a
//! silently incomplete legal or billing document is worse than an explicit
//! error.
//!
//! ## Pipeline Overview
//!
//! ```text
//! sources (ordered URLs)
//!  │
//!  ├─ 1. Fetch      concurrent GETs, bounded in-flight count, per-fetch timeout
//!  ├─ 2. Detect     magic-byte sniffing → PDF | image | unsupported
//!  ├─ 3. Normalize  PDF: validating parse · image: one-page PDF (spawn_blocking)
//!  ├─ 4. Decide     any failure → error listing every failed source
//!  ├─ 5. Assemble   page concatenation in input order (spawn_blocking)
//!  └─ 6. Output     PDF bytes + stats, file, or object store
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docmerge::{merge, MergeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sources = [
//!         "https://storage.example.com/contract.pdf",
//!         "https://storage.example.com/id-scan.jpg",
//!     ];
//!     let config = MergeConfig::default();
//!     let output = merge(&sources, &config).await?;
//!     std::fs::write("dossier.pdf", &output.pdf)?;
//!     eprintln!("{} pages, {} bytes", output.stats.total_pages, output.stats.byte_size);
//!     Ok(())
//! }
//! ```
//!
//! ## Failure reporting
//!
//! A failed merge returns [`MergeError::SourcesFailed`] carrying one
//! [`SourceFailure`] per bad input — index, URL, machine-readable kind, and
//! message — so callers can fix every input in one pass:
//!
//! ```rust,no_run
//! # use docmerge::{merge, MergeConfig, MergeError};
//! # async fn example() {
//! match merge(&["https://example.com/gone.pdf"], &MergeConfig::default()).await {
//!     Err(MergeError::SourcesFailed { failures, .. }) => {
//!         for f in failures {
//!             eprintln!("source {} ({}): {:?} — {}", f.index, f.url, f.kind, f.message);
//!         }
//!     }
//!     _ => {}
//! }
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docmerge` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! docmerge = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{MergeConfig, MergeConfigBuilder};
pub use error::{MergeError, SourceError, SourceErrorKind};
pub use merge::{merge, merge_sync, merge_to_file, merge_to_store};
pub use output::{MergeOutput, MergeStats, SourceFailure};
pub use pipeline::detect::{ImageKind, SourceKind};
pub use progress::{MergeProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{FsObjectStore, ObjectStore, StoreError};
