//! Metadata embedding
//!
//! The [`MetadataEmbedder`] trait writes a track's tags into an encoded file and
//! reads back the track URL stored there, which the known-files scan uses to map
//! files on disk to tracks. [`LoftyEmbedder`] implements it with `lofty`.

mod lofty_embedder;

pub use lofty_embedder::LoftyEmbedder;

use crate::error::Result;
use crate::types::Track;
use async_trait::async_trait;
use std::path::Path;

/// Writes tags into encoded audio files
#[async_trait]
pub trait MetadataEmbedder: Send + Sync {
    /// Write `track`'s metadata into `file`
    ///
    /// Malformed or unsupported files fail with
    /// [`DownloadError::MetadataEmbed`](crate::error::DownloadError::MetadataEmbed).
    async fn embed(&self, file: &Path, track: &Track) -> Result<()>;

    /// Track URL previously embedded into `file`, if any
    async fn read_track_url(&self, file: &Path) -> Result<Option<String>>;

    /// Embedder name for logs
    fn name(&self) -> &'static str;
}
