//! Resource fetching: one GET per source with typed error classification.
//!
//! ## Why no retries here?
//!
//! This stage performs exactly one request and reports exactly what
//! happened (`InvalidUrl`, `Timeout`, `HttpStatus`, `Network`, `EmptyBody`).
//! Retry policy belongs to callers above the merge engine; keeping the
//! fetcher single-shot keeps the whole pipeline deterministic and trivially
//! testable against a mock server.
//!
//! Malformed URLs are rejected with `Url::parse` before any network call so
//! a typo'd source fails instantly rather than consuming a fetch slot.

use crate::config::MergeConfig;
use crate::error::{MergeError, SourceError};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Build the HTTP client shared by all source pipelines of one merge call.
///
/// Redirects are capped at `config.max_redirects` (loops fail the source as
/// a network error) and the per-request timeout covers the full fetch.
pub(crate) fn build_client(config: &MergeConfig) -> Result<reqwest::Client, MergeError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.fetch_timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .user_agent(concat!("docmerge/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| MergeError::Internal(format!("failed to build HTTP client: {e}")))
}

/// Fetch one source's raw bytes.
///
/// A zero-byte 2xx body is an error: an empty payload can never merge into
/// a page, and treating it as an empty document would silently shrink the
/// output.
pub async fn fetch_source(
    client: &reqwest::Client,
    url: &str,
    timeout_secs: u64,
) -> Result<Vec<u8>, SourceError> {
    // Validate before any network call.
    let parsed = Url::parse(url).map_err(|_| SourceError::InvalidUrl {
        url: url.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SourceError::InvalidUrl {
            url: url.to_string(),
        });
    }

    debug!(url, "fetching source");

    let response = client
        .get(parsed)
        .send()
        .await
        .map_err(|e| classify_send_error(url, timeout_secs, e))?;

    let status = response.status();
    if !status.is_success() {
        warn!(url, status = status.as_u16(), "source fetch returned error status");
        return Err(SourceError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            SourceError::Timeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            SourceError::Network {
                url: url.to_string(),
                detail: e.to_string(),
            }
        }
    })?;

    if bytes.is_empty() {
        return Err(SourceError::EmptyBody {
            url: url.to_string(),
        });
    }

    debug!(url, bytes = bytes.len(), "source fetched");
    Ok(bytes.to_vec())
}

/// Map a reqwest send error onto the source-error taxonomy.
fn classify_send_error(url: &str, timeout_secs: u64, e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout {
            url: url.to_string(),
            secs: timeout_secs,
        }
    } else if e.is_redirect() {
        SourceError::Network {
            url: url.to_string(),
            detail: "redirect limit exceeded".to_string(),
        }
    } else {
        SourceError::Network {
            url: url.to_string(),
            detail: e.to_string(),
        }
    }
}
