//! Known-files index: track URL to existing files on disk
//!
//! Entries are discovered by a pre-scan of the download directory and appended by
//! workers as they write outputs. Paths may be stale by the time they are read; callers
//! must check existence before acting on them.

use crate::error::Result;
use crate::tagging::MetadataEmbedder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use walkdir::WalkDir;

/// Shared, append-only map of track URL to candidate file paths
#[derive(Clone, Debug, Default)]
pub struct KnownFiles {
    inner: Arc<RwLock<HashMap<String, Vec<PathBuf>>>>,
}

impl KnownFiles {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the paths known for `url`, in registration order
    pub async fn lookup(&self, url: &str) -> Vec<PathBuf> {
        self.inner
            .read()
            .await
            .get(url)
            .cloned()
            .unwrap_or_default()
    }

    /// Record that `path` holds the track `url`; registering the same path twice is a no-op
    pub async fn register(&self, url: &str, path: PathBuf) {
        let mut map = self.inner.write().await;
        let paths = map.entry(url.to_string()).or_default();
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    /// Number of distinct track URLs in the index
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the index has no entries
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Walk `dir` for files with extension `ext` and index them by their embedded track URL
    ///
    /// Files without a readable URL are ignored.
    pub async fn scan(&self, dir: &Path, ext: &str, embedder: &dyn MetadataEmbedder) -> Result<usize> {
        let root = dir.to_path_buf();
        let wanted = ext.to_ascii_lowercase();
        let candidates = tokio::task::spawn_blocking(move || {
            WalkDir::new(&root)
                .follow_links(false)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| {
                    path.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case(&wanted))
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| std::io::Error::other(format!("directory scan panicked: {e}")))?;

        let mut indexed = 0;
        for path in candidates {
            match embedder.read_track_url(&path).await {
                Ok(Some(url)) => {
                    self.register(&url, path).await;
                    indexed += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(path = ?path, error = %e, "could not read tags during scan");
                }
            }
        }

        tracing::info!(dir = ?dir, files = indexed, "scanned for existing tracks");
        Ok(indexed)
    }
}
