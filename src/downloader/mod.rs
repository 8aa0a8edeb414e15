//! Download orchestrator split into focused submodules.
//!
//! The [`Downloader`] struct and its methods are organized by concern:
//! - [`lifecycle`] - Setup of collaborators and directories, cancellation
//! - [`queue_processor`] - Bounded worker pool consuming the track queue
//! - [`download_task`] - The per-track pipeline and batch finalization

mod download_task;
mod lifecycle;
mod queue_processor;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::archive::Archive;
use crate::audio::{AudioSourceResolver, YtDlpResolver};
use crate::catalog::{MetadataProvider, SpotifyProvider};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::known_files::KnownFiles;
use crate::lyrics::{LrclibProvider, LyricsProvider};
use crate::post_processing::{PostProcessor, SegmentDetector, SponsorBlockDetector};
use crate::progress::ProgressTracker;
use crate::report::ErrorReport;
use crate::resolver::ResolverPipeline;
use crate::tagging::{LoftyEmbedder, MetadataEmbedder};
use crate::tracking::TrackingFile;
use crate::transcode::{FfmpegTranscoder, Transcoder};
use crate::types::{DownloadOutcome, Event, Track};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// External collaborators used by the downloader
///
/// Provider lists are ordered by priority; the first provider with a result wins.
pub struct Components {
    /// Track metadata source
    pub metadata: Arc<dyn MetadataProvider>,
    /// Audio source resolvers in priority order
    pub audio: Vec<Arc<dyn AudioSourceResolver>>,
    /// Lyrics providers in priority order
    pub lyrics: Vec<Arc<dyn LyricsProvider>>,
    /// Audio encoder
    pub transcoder: Arc<dyn Transcoder>,
    /// Tag writer
    pub embedder: Arc<dyn MetadataEmbedder>,
    /// Named-segment detector, used when segment removal is enabled
    pub detector: Option<Arc<dyn SegmentDetector>>,
}

impl Components {
    /// Build the production collaborators named in `config`
    ///
    /// Unknown provider names are configuration errors. A missing yt-dlp binary
    /// leaves the audio list empty, which setup then rejects.
    pub fn from_config(config: &Config) -> Result<Self> {
        let providers = &config.providers;

        let mut audio: Vec<Arc<dyn AudioSourceResolver>> = Vec::new();
        for name in &providers.audio_providers {
            match name.as_str() {
                "youtube" => {
                    let resolver = match &config.tools.yt_dlp_path {
                        Some(path) => Some(YtDlpResolver::new(path.clone())?),
                        None if config.tools.search_path => YtDlpResolver::from_path()?,
                        None => None,
                    };
                    match resolver {
                        Some(resolver) => audio.push(Arc::new(resolver)),
                        None => tracing::warn!("yt-dlp not found, youtube provider disabled"),
                    }
                }
                other => {
                    return Err(Error::config(
                        "audio_providers",
                        format!("unknown audio provider '{other}'"),
                    ));
                }
            }
        }

        let mut lyrics: Vec<Arc<dyn LyricsProvider>> = Vec::new();
        for name in &providers.lyrics_providers {
            match name.as_str() {
                "lrclib" => lyrics.push(Arc::new(LrclibProvider::new(
                    providers.lrclib_url.clone(),
                    config.retry.clone(),
                ))),
                other => {
                    return Err(Error::config(
                        "lyrics_providers",
                        format!("unknown lyrics provider '{other}'"),
                    ));
                }
            }
        }

        let detector: Option<Arc<dyn SegmentDetector>> = if config.processing.sponsor_block {
            Some(Arc::new(SponsorBlockDetector::new(
                providers.sponsor_block_url.clone(),
                config.processing.sponsor_block_categories.clone(),
                config.retry.clone(),
            )))
        } else {
            None
        };

        Ok(Self {
            metadata: Arc::new(SpotifyProvider::from_config(providers, &config.retry)?),
            audio,
            lyrics,
            transcoder: Arc::new(FfmpegTranscoder::from_config(&config.tools)?),
            embedder: Arc::new(LoftyEmbedder::new()),
            detector,
        })
    }
}

/// Collaborators shared by every unit of work
pub(crate) struct Services {
    pub(crate) resolver: ResolverPipeline,
    pub(crate) audio: Vec<Arc<dyn AudioSourceResolver>>,
    pub(crate) lyrics: Vec<Arc<dyn LyricsProvider>>,
    pub(crate) transcoder: Arc<dyn Transcoder>,
    pub(crate) embedder: Arc<dyn MetadataEmbedder>,
    pub(crate) post_processor: PostProcessor,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Downloader {
    /// Configuration (wrapped in Arc for sharing across workers)
    pub(crate) config: Arc<Config>,
    /// Collaborators
    pub(crate) services: Arc<Services>,
    /// Per-item phases and aggregate counters
    pub(crate) progress: ProgressTracker,
    /// Track URL to files on disk, appended by workers
    pub(crate) known_files: KnownFiles,
    /// Failures of the current batch
    pub(crate) errors: ErrorReport,
    /// Previously downloaded track URLs; written once after each batch
    pub(crate) archive: Arc<tokio::sync::Mutex<Archive>>,
    /// Stops the worker pool; once cancelled the downloader accepts no new batches
    pub(crate) cancel: CancellationToken,
}

impl Downloader {
    /// Create a downloader with the production collaborators named in `config`
    ///
    /// Fails with a setup error when ffmpeg is missing or too old, or when no audio
    /// provider is usable.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let components = Components::from_config(&config)?;
        Self::with_components(config, components).await
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.progress.subscribe()
    }

    /// Progress tracker for the current batch
    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Failures recorded during the current batch
    pub fn errors(&self) -> &ErrorReport {
        &self.errors
    }

    /// Known-files index
    pub fn known_files(&self) -> &KnownFiles {
        &self.known_files
    }

    /// Reference resolver backed by this downloader's metadata provider
    pub fn resolver(&self) -> &ResolverPipeline {
        &self.services.resolver
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether `url` is recorded in the archive
    pub async fn is_archived(&self, url: &str) -> bool {
        self.archive.lock().await.contains(url)
    }

    /// Download every track, returning one outcome per scheduled track in input order
    ///
    /// Tracks already in the archive are dropped before scheduling and do not appear
    /// in the result. Per-track failures are recorded in [`errors`](Self::errors) and
    /// yield an outcome without a path. Archive, manifest, playlist and error log are
    /// written once, after every track has finished.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the batch was interrupted; nothing is
    /// persisted in that case.
    pub async fn download_all(&self, tracks: Vec<Track>) -> Result<Vec<DownloadOutcome>> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let tracks = {
            let archive = self.archive.lock().await;
            let before = tracks.len();
            let tracks: Vec<Track> = tracks
                .into_iter()
                .filter(|track| !archive.contains(track.url()))
                .collect();
            if tracks.len() < before {
                tracing::info!(skipped = before - tracks.len(), "skipping archived tracks");
            }
            tracks
        };

        self.errors.clear();
        self.progress.set_total(tracks.len());
        let jobs = tracks
            .into_iter()
            .map(|track| {
                let item = self.progress.new_item(&track);
                (track, item)
            })
            .collect();

        let outcomes = self.process_queue(jobs).await.ok_or(Error::Cancelled)?;
        self.finalize_batch(&outcomes).await;
        Ok(outcomes)
    }

    /// Resume the batch stored in a tracking file
    ///
    /// The file is removed when every track finished without a failure and kept
    /// otherwise so the batch can be resumed again.
    pub async fn download_tracking_file(&self, path: &Path) -> Result<Vec<DownloadOutcome>> {
        let file = TrackingFile::load(path).await?;
        tracing::info!(path = ?path, tracks = file.tracks().len(), "resuming tracking file");

        let outcomes = self.download_all(file.tracks().to_vec()).await?;
        if self.errors.is_empty() {
            file.remove().await?;
        } else {
            tracing::info!(path = ?path, failed = self.errors.len(), "keeping tracking file");
        }
        Ok(outcomes)
    }
}
