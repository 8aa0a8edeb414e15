//! Failure aggregation and result manifests

use crate::error::{Error, Result};
use crate::types::{DownloadOutcome, Track};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One failed track
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Track identifier
    pub url: String,
    /// Track display name
    pub display_name: String,
    /// Error category, see [`Error::kind`]
    pub kind: String,
    /// Error message
    pub message: String,
}

impl FailureRecord {
    /// `<url> - <Kind>: <message>`
    pub fn log_line(&self) -> String {
        format!("{} - {}: {}", self.url, self.kind, self.message)
    }
}

/// Concurrent append-only list of per-track failures
#[derive(Clone, Debug, Default)]
pub struct ErrorReport {
    records: Arc<Mutex<Vec<FailureRecord>>>,
}

impl ErrorReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FailureRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a failure for `track`
    pub fn record(&self, track: &Track, error: &Error) -> FailureRecord {
        let record = FailureRecord {
            url: track.url().to_string(),
            display_name: track.display_name(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        };
        self.lock().push(record.clone());
        record
    }

    /// Copy of every failure recorded so far
    pub fn entries(&self) -> Vec<FailureRecord> {
        self.lock().clone()
    }

    /// Number of failures
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no failures were recorded
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop all records, used when a new batch starts
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Write one line per failure to `path`
    pub async fn write_log(&self, path: &Path) -> Result<()> {
        let mut contents = String::new();
        for record in self.entries() {
            contents.push_str(&record.log_line());
            contents.push('\n');
        }
        create_parent(path).await?;
        tokio::fs::write(path, contents).await?;
        tracing::info!(path = ?path, failures = self.len(), "wrote error log");
        Ok(())
    }
}

/// Serialize every outcome (track plus output path, null on failure) as a JSON array
pub async fn write_manifest(path: &Path, outcomes: &[DownloadOutcome]) -> Result<()> {
    let json = serde_json::to_string_pretty(outcomes)?;
    create_parent(path).await?;
    tokio::fs::write(path, json).await?;
    tracing::info!(path = ?path, tracks = outcomes.len(), "wrote results manifest");
    Ok(())
}

/// Read a manifest written by [`write_manifest`]
pub async fn read_manifest(path: &Path) -> Result<Vec<DownloadOutcome>> {
    let json = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&json)?)
}

pub(crate) async fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DownloadError;
    use crate::types::TrackInfo;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn track(id: &str) -> Track {
        Track::new(TrackInfo {
            url: format!("https://open.spotify.com/track/{id}"),
            id: id.into(),
            title: format!("Song {id}"),
            artists: vec!["Artist".into()],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_record_and_write_log() {
        let dir = TempDir::new().unwrap();
        let report = ErrorReport::new();
        let error = Error::from(DownloadError::NoAudioMatch {
            track: "Artist - Song b".into(),
        });
        report.record(&track("b"), &error);

        assert_eq!(report.len(), 1);
        let entry = &report.entries()[0];
        assert_eq!(entry.url, "https://open.spotify.com/track/b");
        assert_eq!(entry.kind, "ResolutionError");

        let log = dir.path().join("logs/errors.txt");
        report.write_log(&log).await.unwrap();
        let contents = tokio::fs::read_to_string(&log).await.unwrap();
        assert_eq!(
            contents,
            "https://open.spotify.com/track/b - ResolutionError: no audio source found for Artist - Song b\n"
        );
    }

    #[test]
    fn test_concurrent_records_are_all_kept() {
        let report = ErrorReport::new();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let report = report.clone();
                std::thread::spawn(move || {
                    report.record(&track(&i.to_string()), &Error::NotFound("x".into()));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(report.len(), 16);
    }

    #[tokio::test]
    async fn test_manifest_contains_failures_as_null() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        let outcomes = vec![
            DownloadOutcome {
                track: track("a"),
                path: Some(PathBuf::from("/music/a.mp3")),
            },
            DownloadOutcome {
                track: track("b"),
                path: None,
            },
        ];

        write_manifest(&path, &outcomes).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(raw[0]["path"], "/music/a.mp3");
        assert!(raw[1]["path"].is_null());
        assert_eq!(raw[1]["track"]["title"], "Song b");

        assert_eq!(read_manifest(&path).await.unwrap(), outcomes);
    }
}
