//! Existing-file handling -- duplicate lookup, forced removal and metadata reconciliation.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;
use crate::known_files::KnownFiles;
use crate::post_processing::remove_if_exists;
use crate::types::{Phase, Track};

use super::context::TrackContext;
use super::pipeline::embed_and_register;

/// Known files for `url` that still exist and are not the canonical `output`.
///
/// The index may be stale, so every candidate is checked on disk.
pub(super) async fn duplicate_candidates(
    known_files: &KnownFiles,
    url: &str,
    output: &Path,
) -> Vec<PathBuf> {
    let mut existing = Vec::new();
    for path in known_files.lookup(url).await {
        if path != output && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            existing.push(path);
        }
    }
    existing
}

/// Delete duplicates; failures are logged and never fail the track.
pub(super) async fn remove_duplicates(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match remove_if_exists(path).await {
            Ok(()) => {
                tracing::info!(path = ?path, "removed duplicate");
                removed += 1;
            }
            Err(e) => tracing::warn!(path = ?path, error = %e, "failed to remove duplicate"),
        }
    }
    removed
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

/// The most recently modified of `paths`, if any can be read.
async fn newest(paths: &[PathBuf]) -> Option<PathBuf> {
    let mut best: Option<(SystemTime, &PathBuf)> = None;
    for path in paths {
        if let Some(time) = modified(path).await
            && best.is_none_or(|(current, _)| time > current)
        {
            best = Some((time, path));
        }
    }
    best.map(|(_, path)| path.clone())
}

/// Keep one existing file for the track at the canonical path and refresh its tags.
///
/// The newest duplicate wins, falling back to the canonical file itself. Every
/// other duplicate is deleted without confirmation, and a canonical file that
/// loses to a newer duplicate is replaced by it.
pub(super) async fn reconcile_existing(
    ctx: &TrackContext,
    track: &mut Track,
    output: &Path,
    duplicates: Vec<PathBuf>,
) -> Result<PathBuf> {
    let chosen = newest(&duplicates)
        .await
        .unwrap_or_else(|| output.to_path_buf());

    let others: Vec<PathBuf> = duplicates.into_iter().filter(|p| *p != chosen).collect();
    remove_duplicates(&others).await;

    if chosen != output {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&chosen, output).await?;
        tracing::info!(from = ?chosen, to = ?output, "moved existing file");
    }

    embed_and_register(ctx, track, output).await?;
    track.replace_output_path(output.to_path_buf());
    ctx.item.notify_phase(Phase::Complete);
    tracing::info!(track = %track.url(), path = ?output, "updated metadata for {}", track.display_name());
    Ok(output.to_path_buf())
}
