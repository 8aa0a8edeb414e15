//! Traits and types for audio source resolvers

use crate::error::Result;
use crate::progress::ProgressCallback;
use crate::types::TrackInfo;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Raw audio retrieved from a source
#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct AudioMeta {
    /// Source-assigned unique id; temp files are named after it
    pub id: String,
    /// Container extension of the raw file ("webm", "m4a", ...)
    pub ext: String,
    /// Average bitrate in kbps, when the source reports one
    pub average_bitrate: Option<f64>,
    /// Where the raw audio was written
    pub path: PathBuf,
}

/// A service that can find and download audio for a track
///
/// Resolvers are tried in configured priority order; the first one whose
/// [`search`](AudioSourceResolver::search) returns a source wins.
#[async_trait]
pub trait AudioSourceResolver: Send + Sync {
    /// Find a source for `track`, returning an opaque source reference
    async fn search(&self, track: &TrackInfo) -> Result<Option<String>>;

    /// Download the raw audio for `source` into `temp_dir`
    ///
    /// The file must be named after the source's unique id so concurrent fetches of
    /// different tracks never share a path.
    async fn fetch(
        &self,
        source: &str,
        temp_dir: &Path,
        progress: ProgressCallback,
    ) -> Result<AudioMeta>;

    /// Whether this resolver understands a previously resolved `source`
    fn can_fetch(&self, source: &str) -> bool;

    /// Resolver name for logs
    fn name(&self) -> &'static str;
}
