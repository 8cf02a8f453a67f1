//! Configuration for a merge request.
//!
//! All merge behaviour is controlled through [`MergeConfig`], built via its
//! [`MergeConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share configs across tasks, log them, and diff two runs to understand
//! why their outputs differ.
//!
//! # Design choice: builder over constructor
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest. The core never reads environment
//! variables or files — deployment wiring resolves values and passes them
//! in here.

use crate::error::MergeError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Configuration for a merge request.
///
/// Built via [`MergeConfig::builder()`] or using
/// [`MergeConfig::default()`].
///
/// # Example
/// ```rust
/// use docmerge::MergeConfig;
///
/// let config = MergeConfig::builder()
///     .concurrency(8)
///     .fetch_timeout_secs(30)
///     .max_redirects(5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct MergeConfig {
    /// Number of source pipelines in flight at once. Default: 8.
    ///
    /// Fetches are network-bound; running 8 at once typically cuts
    /// wall-clock time close to 8× over sequential fetching. The cap also
    /// bounds peak memory: each in-flight pipeline holds one source's bytes
    /// plus its parsed document. Raise it for many small files on a wide
    /// connection; lower it when sources are large scans.
    pub concurrency: usize,

    /// Per-fetch timeout in seconds. Default: 30.
    ///
    /// Applies independently to each source, so one slow host cannot stall
    /// siblings — but the slowest source still bounds overall merge latency
    /// because assembly waits for every pipeline.
    pub fetch_timeout_secs: u64,

    /// TCP/TLS connect timeout in seconds. Default: 10.
    pub connect_timeout_secs: u64,

    /// Maximum redirects followed per fetch. Default: 5.
    ///
    /// Presigned URLs occasionally bounce through one storage redirect;
    /// anything deeper is a misconfigured or looping host and fails the
    /// source with a network error.
    pub max_redirects: usize,

    /// Stop consuming source pipelines on the first failure. Default: false.
    ///
    /// The default gathers *all* per-source failures before returning, so a
    /// caller with three bad URLs learns about all three in one round trip.
    /// Fail-fast trades that completeness for latency: in-flight fetches are
    /// cancelled as soon as one source fails, and the failure report covers
    /// only what was observed up to that point. The merge is all-or-nothing
    /// either way.
    pub fail_fast: bool,

    /// Opaque caller-supplied identifier attached to log events. Default: none.
    ///
    /// Used purely for tracing a request through logs (the upstream system
    /// calls this a `lead_id`); it never influences merge behaviour.
    pub correlation_id: Option<String>,

    /// Progress callback invoked per source. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            fetch_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_redirects: 5,
            fail_fast: false,
            correlation_id: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for MergeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeConfig")
            .field("concurrency", &self.concurrency)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_redirects", &self.max_redirects)
            .field("fail_fast", &self.fail_fast)
            .field("correlation_id", &self.correlation_id)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl MergeConfig {
    /// Create a new builder for `MergeConfig`.
    pub fn builder() -> MergeConfigBuilder {
        MergeConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`MergeConfig`].
#[derive(Debug)]
pub struct MergeConfigBuilder {
    config: MergeConfig,
}

impl MergeConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs.max(1);
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs.max(1);
        self
    }

    pub fn max_redirects(mut self, n: usize) -> Self {
        self.config.max_redirects = n;
        self
    }

    pub fn fail_fast(mut self, v: bool) -> Self {
        self.config.fail_fast = v;
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.config.correlation_id = Some(id.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<MergeConfig, MergeError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(MergeError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.fetch_timeout_secs == 0 {
            return Err(MergeError::InvalidConfig(
                "Per-fetch timeout must be ≥ 1s".into(),
            ));
        }
        if c.max_redirects > 20 {
            return Err(MergeError::InvalidConfig(format!(
                "Redirect limit must be ≤ 20, got {}",
                c.max_redirects
            )));
        }
        Ok(self.config)
    }
}

impl MergeConfig {
    /// Correlation id for log fields, `"-"` when none was supplied.
    pub(crate) fn log_id(&self) -> &str {
        self.correlation_id.as_deref().unwrap_or("-")
    }
}
