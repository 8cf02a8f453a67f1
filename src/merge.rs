//! Merge entry points: concurrent fan-out, ordered fan-in, all-or-nothing.
//!
//! ## Pipeline shape
//!
//! Every source runs its own fetch → detect → normalize pipeline,
//! concurrently with its siblings but capped at `config.concurrency`
//! in-flight pipelines. Each pipeline future carries its source index, so
//! after the fan-in barrier the outcomes are sorted back into caller order —
//! network completion order never leaks into page order.
//!
//! ## All-or-nothing
//!
//! A failure in any source's pipeline is recorded against that source and
//! never aborts its siblings (unless `fail_fast` is set); once every
//! pipeline has settled, a single failed source fails the whole merge with
//! the complete failure list. Silently dropping a page from a business
//! document is worse than an explicit error, so there is no best-effort
//! partial merge.
//!
//! Cancellation is cooperative: dropping the future returned by [`merge`]
//! cancels all in-flight fetches, and no partial output exists anywhere.

use crate::config::MergeConfig;
use crate::error::{MergeError, SourceError};
use crate::output::{MergeOutput, MergeStats, SourceFailure};
use crate::pipeline::{assemble, detect, fetch, normalize};
use futures::stream::{self, StreamExt};
use lopdf::Document;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Merge the documents behind `sources` into one PDF, in list order.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `sources` — ordered list of absolute HTTP/HTTPS URLs (PDF or image)
/// * `config`  — merge configuration
///
/// # Errors
/// * [`MergeError::EmptySources`] — `sources` is empty; nothing dispatched
/// * [`MergeError::SourcesFailed`] — ≥ 1 source failed; carries every
///   per-source failure so the caller can fix all inputs in one pass
/// * [`MergeError::Internal`] — unexpected fault; no partial output
pub async fn merge<S: AsRef<str>>(
    sources: &[S],
    config: &MergeConfig,
) -> Result<MergeOutput, MergeError> {
    let total_start = Instant::now();
    let urls: Vec<String> = sources.iter().map(|s| s.as_ref().to_string()).collect();

    // Reject before any client construction or dispatch.
    if urls.is_empty() {
        return Err(MergeError::EmptySources);
    }

    let total = urls.len();
    info!(
        correlation_id = config.log_id(),
        sources = total,
        "starting merge"
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_merge_start(total);
    }

    let client = fetch::build_client(config)?;

    // ── Fan-out: per-source pipelines, bounded concurrency ───────────────
    let pipeline_start = Instant::now();
    let mut pipelines = stream::iter(urls.iter().enumerate().map(|(index, url)| {
        let client = client.clone();
        let url = url.clone();
        let timeout_secs = config.fetch_timeout_secs;
        let cb = config.progress_callback.clone();
        async move {
            if let Some(ref cb) = cb {
                cb.on_source_start(index, total, &url);
            }
            let outcome = process_source(&client, &url, timeout_secs).await;
            if let Some(ref cb) = cb {
                match &outcome {
                    Ok(doc) => cb.on_source_complete(index, total, doc.get_pages().len()),
                    Err(e) => cb.on_source_error(index, total, &e.to_string()),
                }
            }
            (index, outcome)
        }
    }))
    .buffer_unordered(config.concurrency);

    let mut outcomes: Vec<(usize, Result<Document, SourceError>)> = Vec::with_capacity(total);
    while let Some(outcome) = pipelines.next().await {
        let failed = outcome.1.is_err();
        outcomes.push(outcome);
        if failed && config.fail_fast {
            // Dropping the stream cancels every in-flight fetch; the
            // failure report covers what was observed up to this point.
            debug!("fail-fast: abandoning remaining source pipelines");
            break;
        }
    }
    drop(pipelines);
    let pipeline_duration_ms = pipeline_start.elapsed().as_millis() as u64;

    // ── Fan-in: restore caller order, then decide ────────────────────────
    outcomes.sort_by_key(|(index, _)| *index);

    let mut documents: Vec<Document> = Vec::with_capacity(total);
    let mut pages_per_source: Vec<usize> = Vec::with_capacity(total);
    let mut failures: Vec<SourceFailure> = Vec::new();
    for (index, outcome) in outcomes {
        match outcome {
            Ok(doc) => {
                pages_per_source.push(doc.get_pages().len());
                documents.push(doc);
            }
            Err(e) => {
                warn!(
                    correlation_id = config.log_id(),
                    index,
                    url = e.url(),
                    error = %e,
                    "source failed"
                );
                failures.push(SourceFailure::from_error(index, &e));
            }
        }
    }

    let success_count = documents.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_merge_complete(total, success_count);
    }

    if !failures.is_empty() {
        warn!(
            correlation_id = config.log_id(),
            failed = failures.len(),
            total,
            "merge failed"
        );
        return Err(MergeError::SourcesFailed {
            failed: failures.len(),
            total,
            failures,
        });
    }

    // ── Assemble in input order ──────────────────────────────────────────
    let assemble_start = Instant::now();
    let assembled = tokio::task::spawn_blocking(move || assemble::concatenate(documents))
        .await
        .map_err(|e| MergeError::Internal(format!("assembly task panicked: {e}")))??;
    let assemble_duration_ms = assemble_start.elapsed().as_millis() as u64;

    let stats = MergeStats {
        total_sources: total,
        total_pages: assembled.page_count,
        pages_per_source,
        byte_size: assembled.bytes.len(),
        pipeline_duration_ms,
        assemble_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        correlation_id = config.log_id(),
        sources = total,
        pages = stats.total_pages,
        bytes = stats.byte_size,
        duration_ms = stats.total_duration_ms,
        "merge complete"
    );

    Ok(MergeOutput {
        pdf: assembled.bytes,
        stats,
    })
}

/// One source's fetch → detect → normalize pipeline.
///
/// Always resolves to a per-source result — errors are captured here, never
/// propagated, so a bad source cannot abort its siblings.
async fn process_source(
    client: &reqwest::Client,
    url: &str,
    timeout_secs: u64,
) -> Result<Document, SourceError> {
    let bytes = fetch::fetch_source(client, url, timeout_secs).await?;
    let kind = detect::detect(&bytes);
    debug!(url, ?kind, bytes = bytes.len(), "source classified");

    // Decode and document construction are CPU-bound; keep them off the
    // async workers.
    let url_owned = url.to_string();
    tokio::task::spawn_blocking(move || normalize::normalize(&bytes, kind, &url_owned))
        .await
        .unwrap_or_else(|e| {
            Err(match kind {
                detect::SourceKind::Pdf => SourceError::PdfParse {
                    url: url.to_string(),
                    detail: format!("normalization task panicked: {e}"),
                },
                _ => SourceError::ImageDecode {
                    url: url.to_string(),
                    detail: format!("normalization task panicked: {e}"),
                },
            })
        })
}

/// Merge and write the output directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn merge_to_file<S: AsRef<str>>(
    sources: &[S],
    output_path: impl AsRef<Path>,
    config: &MergeConfig,
) -> Result<MergeStats, MergeError> {
    let output = merge(sources, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MergeError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &output.pdf)
        .await
        .map_err(|e| MergeError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| MergeError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output.stats)
}

/// Merge and persist the output through an object store.
///
/// Returns the location reported by the store (e.g. the stored key) plus
/// the merge stats.
pub async fn merge_to_store<S: AsRef<str>>(
    sources: &[S],
    store: &dyn crate::store::ObjectStore,
    key: &str,
    config: &MergeConfig,
) -> Result<(String, MergeStats), MergeError> {
    let output = merge(sources, config).await?;
    let location = store.put(key, &output.pdf).await?;
    info!(
        correlation_id = config.log_id(),
        key,
        location = %location,
        "merged document stored"
    );
    Ok((location, output.stats))
}

/// Synchronous wrapper around [`merge`].
///
/// Creates a temporary tokio runtime internally.
pub fn merge_sync<S: AsRef<str>>(
    sources: &[S],
    config: &MergeConfig,
) -> Result<MergeOutput, MergeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MergeError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(merge(sources, config))
}
