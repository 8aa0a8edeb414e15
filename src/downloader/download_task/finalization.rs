//! Batch finalization -- persist results once every track has finished.

use crate::playlist::write_m3u;
use crate::report::write_manifest;
use crate::types::DownloadOutcome;

use super::super::Downloader;

impl Downloader {
    /// Write the archive, manifest, playlist and error log, then publish the summary.
    ///
    /// Runs after the batch barrier only. A failed write is logged and does not
    /// prevent the remaining outputs from being written.
    pub(crate) async fn finalize_batch(&self, outcomes: &[DownloadOutcome]) {
        let persistence = &self.config.persistence;

        if let Some(path) = &persistence.archive {
            let mut archive = self.archive.lock().await;
            let added = outcomes
                .iter()
                .filter(|outcome| outcome.is_success())
                .filter(|outcome| archive.add(outcome.track.url()))
                .count();
            match archive.save(path).await {
                Ok(()) => tracing::info!(path = ?path, added, total = archive.len(), "saved archive"),
                Err(e) => tracing::error!(path = ?path, error = %e, "failed to save archive"),
            }
        }

        if let Some(path) = &persistence.save_file
            && let Err(e) = write_manifest(path, outcomes).await
        {
            tracing::error!(path = ?path, error = %e, "failed to write results manifest");
        }

        if let Some(path) = &persistence.m3u
            && let Err(e) = write_m3u(path, outcomes).await
        {
            tracing::error!(path = ?path, error = %e, "failed to write playlist");
        }

        if let Some(path) = &persistence.error_log
            && !self.errors.is_empty()
            && let Err(e) = self.errors.write_log(path).await
        {
            tracing::error!(path = ?path, error = %e, "failed to write error log");
        }

        if self.config.processing.print_errors {
            for record in self.errors.entries() {
                tracing::error!(track = %record.url, kind = %record.kind, "{}", record.message);
            }
        }

        let summary = self.progress.finish();
        tracing::info!(
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.errors,
            total = summary.total,
            manifest = ?persistence.save_file,
            "batch finished"
        );
    }
}
