//! Tracking files: persisted track lists that let an interrupted batch resume

use crate::error::{Error, Result};
use crate::types::Track;
use crate::utils::sanitize_component;
use std::path::{Path, PathBuf};

/// File extension of tracking files
pub const TRACKING_FILE_EXTENSION: &str = "trackingfile";

/// A batch persisted to disk
#[derive(Clone, Debug)]
pub struct TrackingFile {
    path: PathBuf,
    tracks: Vec<Track>,
}

impl TrackingFile {
    /// Write a tracking file for `tracks` into `dir`, named after the first track
    pub async fn create(dir: &Path, tracks: Vec<Track>) -> Result<Self> {
        let first = tracks
            .first()
            .ok_or_else(|| Error::InvalidReference("cannot track an empty batch".to_string()))?;
        let stem = match sanitize_component(&first.display_name(), false) {
            name if name.is_empty() => first.info.id.clone(),
            name => name,
        };
        let path = dir.join(format!("{stem}.{TRACKING_FILE_EXTENSION}"));

        let file = Self { path, tracks };
        tokio::fs::create_dir_all(dir).await?;
        file.save().await?;
        tracing::debug!(path = ?file.path, tracks = file.tracks.len(), "created tracking file");
        Ok(file)
    }

    /// Load a tracking file
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        let tracks: Vec<Track> = serde_json::from_str(&json)?;
        Ok(Self {
            path: path.to_path_buf(),
            tracks,
        })
    }

    /// Whether `path` looks like a tracking file
    pub fn is_tracking_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == TRACKING_FILE_EXTENSION)
    }

    /// Write the current track list
    pub async fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.tracks)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Delete the file; it is already gone if removal reports NotFound
    pub async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!(path = ?self.path, "removed tracking file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Location on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tracks in the file
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Take ownership of the tracks
    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }
}
