//! Resolver pipeline: references in, tracks out
//!
//! Each [`Reference`] is expanded into [`Track`]s through the [`MetadataProvider`].
//! Paginated listings are followed until the provider stops returning a next-page
//! token. Artist references are expanded album by album, dropping repeated albums
//! and tracks (compared by normalized name), compilations the artist only appears
//! on, and tracks the artist is not credited on.

mod reference;

pub use reference::{Reference, unique_references};

use crate::catalog::{AlbumSummary, MetadataProvider, Page};
use crate::error::{Error, Result};
use crate::tracking::TrackingFile;
use crate::types::{Track, TrackInfo};
use crate::utils::normalize_name;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tracks resolved from a set of inputs, plus the inputs that failed
#[derive(Debug, Default)]
pub struct Resolution {
    /// Resolved tracks, deduplicated by URL, in input order
    pub tracks: Vec<Track>,
    /// Inputs that could not be resolved, with the reason
    pub failures: Vec<(String, Error)>,
}

/// Expands references into tracks
#[derive(Clone)]
pub struct ResolverPipeline {
    provider: Arc<dyn MetadataProvider>,
}

impl ResolverPipeline {
    /// Create a pipeline over `provider`
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self { provider }
    }

    /// Resolve every input, logging and collecting failures instead of aborting
    pub async fn resolve_all<S: AsRef<str>>(&self, inputs: &[S]) -> Resolution {
        let mut resolution = Resolution::default();
        let mut seen = HashSet::new();

        for input in unique_references(inputs) {
            let reference = Reference::parse(&input);
            match self.resolve(&reference).await {
                Ok(tracks) => {
                    info!(reference = %reference, tracks = tracks.len(), "resolved");
                    resolution.tracks.extend(
                        tracks
                            .into_iter()
                            .filter(|track| seen.insert(track.url().to_string())),
                    );
                }
                Err(e) => {
                    warn!(reference = %reference, error = %e, "failed to resolve");
                    resolution.failures.push((input, e));
                }
            }
        }
        resolution
    }

    /// Resolve a single reference
    pub async fn resolve(&self, reference: &Reference) -> Result<Vec<Track>> {
        match reference {
            Reference::Track(id) => Ok(vec![Track::new(self.provider.lookup_track(id).await?)]),
            Reference::Search(query) => {
                let info = self
                    .provider
                    .search_tracks(query, 1)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::NotFound(format!("no results for \"{query}\"")))?;
                Ok(vec![Track::new(info)])
            }
            Reference::Album(id) => Ok(into_tracks(self.album_tracks(id).await?)),
            Reference::Playlist(id) => Ok(into_tracks(self.playlist_tracks(id).await?)),
            Reference::Artist(id) => self.artist_tracks(id).await,
            Reference::TrackingFile(path) => Ok(TrackingFile::load(path).await?.into_tracks()),
        }
    }

    /// Fill in the metadata of a placeholder track from its URL
    pub async fn refresh(&self, track: &mut Track) -> Result<()> {
        let id = match Reference::parse(track.url()) {
            Reference::Track(id) => id,
            _ if !track.info.id.is_empty() => track.info.id.clone(),
            _ => return Err(Error::InvalidReference(track.url().to_string())),
        };
        let info = self.provider.lookup_track(&id).await?;
        debug!(track = %info.url, "refreshed placeholder");
        track.fill_info(info);
        Ok(())
    }

    async fn album_tracks(&self, album_id: &str) -> Result<Vec<TrackInfo>> {
        let mut items = Vec::new();
        let mut page: Option<String> = None;
        loop {
            let Page { items: batch, next } =
                self.provider.album_tracks(album_id, page.as_deref()).await?;
            items.extend(batch);
            match next {
                Some(token) if page.as_deref() != Some(token.as_str()) => page = Some(token),
                _ => return Ok(items),
            }
        }
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<TrackInfo>> {
        let mut items = Vec::new();
        let mut page: Option<String> = None;
        loop {
            let Page { items: batch, next } =
                self.provider.playlist_tracks(playlist_id, page.as_deref()).await?;
            items.extend(batch);
            match next {
                Some(token) if page.as_deref() != Some(token.as_str()) => page = Some(token),
                _ => return Ok(items),
            }
        }
    }

    async fn artist_albums(&self, artist_id: &str) -> Result<Vec<AlbumSummary>> {
        let mut albums = Vec::new();
        let mut page: Option<String> = None;
        loop {
            let Page { items: batch, next } =
                self.provider.artist_albums(artist_id, page.as_deref()).await?;
            albums.extend(batch);
            match next {
                Some(token) if page.as_deref() != Some(token.as_str()) => page = Some(token),
                _ => return Ok(albums),
            }
        }
    }

    async fn artist_tracks(&self, artist_id: &str) -> Result<Vec<Track>> {
        let mut seen_albums = HashSet::new();
        let mut seen_tracks = HashSet::new();
        let mut tracks = Vec::new();

        for album in self.artist_albums(artist_id).await? {
            if album.is_foreign_compilation() {
                debug!(album = %album.name, "skipping compilation appearance");
                continue;
            }
            if !seen_albums.insert(normalize_name(&album.name)) {
                continue;
            }
            for info in self.album_tracks(&album.id).await? {
                if !info.artist_ids.iter().any(|id| id == artist_id) {
                    continue;
                }
                if seen_tracks.insert(normalize_name(&info.title)) {
                    tracks.push(Track::new(info));
                }
            }
        }
        Ok(tracks)
    }
}

fn into_tracks(infos: Vec<TrackInfo>) -> Vec<Track> {
    infos.into_iter().map(Track::new).collect()
}
