//! # trackdl
//!
//! Concurrent music downloader library: resolve references into tracks, match each
//! track to an audio source, transcode, tag and write it to disk.
//!
//! ## Design Philosophy
//!
//! trackdl is designed to be:
//! - **Failure-isolated** - One track's error never aborts the rest of the batch
//! - **Bounded** - A fixed pool of workers processes tracks; excess tracks wait their turn
//! - **Pluggable** - Metadata, audio, lyrics, transcoding and tagging are traits
//! - **Event-driven** - Consumers subscribe to progress events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use trackdl::{Config, Downloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let downloader = Downloader::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let resolution = downloader
//!         .resolver()
//!         .resolve_all(&["https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"])
//!         .await;
//!     let outcomes = downloader.download_all(resolution.tracks).await?;
//!     println!("{} written", outcomes.iter().filter(|o| o.is_success()).count());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive of previously downloaded tracks
pub mod archive;
/// Audio source resolvers
pub mod audio;
/// Track metadata providers
pub mod catalog;
/// Configuration types
pub mod config;
/// Download orchestrator (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Index of tracks already on disk
pub mod known_files;
/// Lyrics providers
pub mod lyrics;
/// M3U playlist export
pub mod playlist;
/// Post-processing pipeline
pub mod post_processing;
/// Per-track and aggregate progress
pub mod progress;
/// Failure aggregation and result manifests
pub mod report;
/// Reference parsing and resolution
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Metadata embedding
pub mod tagging;
/// Tracking files for resumable batches
pub mod tracking;
/// Audio transcoding
pub mod transcode;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use archive::Archive;
pub use config::{Bitrate, Config, Overwrite};
pub use downloader::{Components, Downloader};
pub use error::{DownloadError, Error, PostProcessError, Result};
pub use known_files::KnownFiles;
pub use progress::{ItemHandle, ProgressSnapshot, ProgressTracker};
pub use report::{ErrorReport, FailureRecord};
pub use resolver::{Reference, Resolution, ResolverPipeline};
pub use tracking::TrackingFile;
pub use types::{DownloadOutcome, Event, Phase, Track, TrackInfo};

/// Cancel the downloader's batch when a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use trackdl::{Config, Downloader, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = Downloader::new(Config::default()).await?;
///     tokio::spawn(cancel_on_signal(downloader.clone()));
///     Ok(())
/// }
/// ```
pub async fn cancel_on_signal(downloader: Downloader) {
    wait_for_signal().await;
    downloader.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
