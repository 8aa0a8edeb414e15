//! Traits and types for track metadata providers

use crate::error::Result;
use crate::types::TrackInfo;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One page of a paginated listing
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Token for the next page; None when the listing is exhausted
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// A page with no successor
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// An album as listed on an artist's discography
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumSummary {
    /// Provider album id
    pub id: String,
    /// Album name
    pub name: String,
    /// Relationship to the artist ("album", "single", "compilation", "appears_on")
    pub album_group: Option<String>,
    /// Release type ("album", "single", "compilation")
    pub album_type: Option<String>,
}

impl AlbumSummary {
    /// Compilations the artist merely appears on
    pub fn is_foreign_compilation(&self) -> bool {
        self.album_group.as_deref() == Some("appears_on")
            && self.album_type.as_deref() == Some("compilation")
    }
}

/// Source of track metadata
///
/// Listings are paginated: pass `None` for the first page and the returned
/// [`Page::next`] token for each following page until it is `None`.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Look up a single track by provider id
    async fn lookup_track(&self, id: &str) -> Result<TrackInfo>;

    /// Search for tracks, best match first
    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<TrackInfo>>;

    /// One page of an album's tracks, with album-level metadata filled in
    async fn album_tracks(&self, album_id: &str, page: Option<&str>) -> Result<Page<TrackInfo>>;

    /// One page of a playlist's tracks
    async fn playlist_tracks(&self, playlist_id: &str, page: Option<&str>)
    -> Result<Page<TrackInfo>>;

    /// One page of an artist's albums
    async fn artist_albums(&self, artist_id: &str, page: Option<&str>)
    -> Result<Page<AlbumSummary>>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}
