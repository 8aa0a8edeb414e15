//! Startup and shutdown coordination.

use crate::archive::Archive;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::known_files::KnownFiles;
use crate::post_processing::PostProcessor;
use crate::progress::ProgressTracker;
use crate::report::ErrorReport;
use crate::resolver::ResolverPipeline;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{Components, Downloader, Services};

async fn create_dir(path: &Path, what: &str) -> Result<()> {
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create {what} '{}': {}", path.display(), e),
        ))
    })
}

impl Downloader {
    /// Create a downloader from explicit collaborators
    ///
    /// This performs every setup step that must succeed before a batch is scheduled:
    /// - Rejects an empty audio provider list
    /// - Verifies the transcoder can run
    /// - Creates the download and temp directories
    /// - Loads the archive, if configured
    /// - Scans the download directory for existing tracks, if enabled
    pub async fn with_components(config: Config, components: Components) -> Result<Self> {
        let Components {
            metadata,
            audio,
            lyrics,
            transcoder,
            embedder,
            detector,
        } = components;

        if audio.is_empty() {
            return Err(Error::Setup("no audio providers configured".to_string()));
        }
        transcoder.check_available().await?;

        create_dir(&config.download.download_dir, "download directory").await?;
        create_dir(&config.download.temp_dir, "temp directory").await?;

        let archive = match &config.persistence.archive {
            Some(path) => {
                let archive = Archive::load(path).await?;
                tracing::info!(path = ?path, entries = archive.len(), "loaded archive");
                archive
            }
            None => Archive::new(),
        };

        let known_files = KnownFiles::new();
        if config.processing.scan_for_songs {
            known_files
                .scan(
                    &config.download.download_dir,
                    &config.download.format,
                    embedder.as_ref(),
                )
                .await?;
        }

        let detector = if config.processing.sponsor_block {
            detector
        } else {
            None
        };

        let services = Services {
            resolver: ResolverPipeline::new(metadata),
            audio,
            lyrics,
            post_processor: PostProcessor::new(Arc::clone(&transcoder), detector),
            transcoder,
            embedder,
        };

        Ok(Self {
            config: Arc::new(config),
            services: Arc::new(services),
            progress: ProgressTracker::new(),
            known_files,
            errors: ErrorReport::new(),
            archive: Arc::new(tokio::sync::Mutex::new(archive)),
            cancel: CancellationToken::new(),
        })
    }

    /// Stop the current batch
    ///
    /// Workers stop taking tracks and in-flight tracks are abandoned. The batch
    /// returns [`Error::Cancelled`] without writing the archive or any report, and
    /// this downloader accepts no further batches.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("cancelling batch");
        }
        self.cancel.cancel();
    }

    /// Whether [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
