//! Object-store collaborator for persisting merged documents.
//!
//! The core consumes storage through the single-method [`ObjectStore`]
//! contract (`put(key, bytes) -> location`). Deployment variants differ only
//! in which store instance they construct — the original service's staging
//! and production buckets are two instances of the same store type pointed
//! at different roots, never a code branch inside the merge pipeline.
//!
//! [`FsObjectStore`] is the bundled filesystem implementation; remote
//! backends (S3-compatible stores and the like) implement the same trait in
//! the deployment layer.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from an object store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is empty or escapes the store root.
    #[error("invalid storage key: {key}")]
    InvalidKey { key: String },

    /// The backend failed to persist the object.
    #[error("failed to store object at '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Write-only storage contract consumed by the merge layer.
///
/// `async-trait` keeps the trait object-safe so callers can hold a
/// `Box<dyn ObjectStore>` chosen at startup.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Persist `bytes` under `key`, returning the stored object's location.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StoreError>;
}

/// Filesystem-backed store: objects live under a root directory, keys map
/// to relative paths.
///
/// Writes are atomic (temp file in the target directory, then rename), so a
/// crash mid-write never leaves a partial object at the final key.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`. The directory is created on first
    /// `put` if missing.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|segment| segment == ".." || segment.is_empty())
        {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let path = self.resolve(key)?;
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        tokio::fs::create_dir_all(&parent).await.map_err(io_err)?;

        // Atomic persist: write into a temp file in the same directory,
        // then rename over the final key.
        let bytes = bytes.to_vec();
        let final_path = path.clone();
        let location = tokio::task::spawn_blocking(move || -> Result<String, std::io::Error> {
            let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
            std::io::Write::write_all(&mut tmp, &bytes)?;
            tmp.persist(&final_path).map_err(|e| e.error)?;
            Ok(final_path.display().to_string())
        })
        .await
        .map_err(|e| {
            io_err(std::io::Error::other(format!("store task panicked: {e}")))
        })?
        .map_err(io_err)?;

        debug!(key, location = %location, "object stored");
        Ok(location)
    }
}
