//! Archive of already-downloaded track URLs
//!
//! The archive is a flat text file with one URL per line. It is loaded once before a
//! batch and saved once after the batch barrier; additions made during a cancelled
//! batch are simply never persisted.

use crate::error::Result;
use std::collections::HashSet;
use std::path::Path;

/// Set of track identifiers that were successfully written in earlier runs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Archive {
    entries: HashSet<String>,
}

impl Archive {
    /// Create an empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an archive; a missing file yields an empty archive
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = ?path, "archive does not exist yet, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        let entries: HashSet<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        tracing::debug!(path = ?path, entries = entries.len(), "loaded archive");
        Ok(Self { entries })
    }

    /// Whether `id` has been archived
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains(id)
    }

    /// Add `id`; returns false if it was already present
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        self.entries.insert(id.into())
    }

    /// Number of archived identifiers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist the archive by writing a sibling temp file and renaming it over `path`
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut sorted: Vec<&str> = self.entries.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        let mut contents = sorted.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        tracing::debug!(path = ?path, entries = self.entries.len(), "saved archive");
        Ok(())
    }
}
