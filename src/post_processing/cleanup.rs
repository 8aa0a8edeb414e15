//! Removal of intermediate files

use crate::error::PostProcessError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Delete intermediate files left behind by a post-processing step
///
/// Failures are logged and returned but never fail the track.
pub(crate) async fn remove_intermediates(files: &[PathBuf]) -> Vec<PostProcessError> {
    let mut failures = Vec::new();
    for file in files {
        if let Err(e) = remove_if_exists(file).await {
            let failure = PostProcessError::CleanupFailed {
                path: file.clone(),
                reason: e.to_string(),
            };
            warn!(?file, error = %e, "failed to delete intermediate file");
            failures.push(failure);
        }
    }
    failures
}

/// Remove a file, treating "already gone" as success
pub(crate) async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!(?path, "deleted file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
