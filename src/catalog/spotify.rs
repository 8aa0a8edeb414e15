//! Spotify Web API metadata provider
//!
//! Uses the client-credentials flow, so only public catalog data (tracks, albums,
//! playlists, artists) is reachable.

use super::traits::{AlbumSummary, MetadataProvider, Page};
use crate::config::{ProviderConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::TrackInfo;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use urlencoding::encode;

const PROVIDER: &str = "spotify";
const ALBUM_PAGE_SIZE: u32 = 50;
const PLAYLIST_PAGE_SIZE: u32 = 100;
const ARTIST_ALBUM_PAGE_SIZE: u32 = 50;
/// Refresh tokens this long before Spotify says they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    id: Option<String>,
    name: String,
    #[serde(default)]
    genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    url: String,
    width: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiExternalIds {
    isrc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPaging<T> {
    items: Vec<T>,
    next: Option<String>,
    #[serde(default)]
    offset: u32,
    #[serde(default)]
    limit: u32,
}

impl<T> ApiPaging<T> {
    fn next_token(&self) -> Option<String> {
        self.next
            .as_ref()
            .map(|_| (self.offset + self.limit.max(self.items.len() as u32)).to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ApiAlbum {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtist>,
    #[serde(default)]
    images: Vec<ApiImage>,
    release_date: Option<String>,
    total_tracks: Option<u32>,
    #[serde(default)]
    genres: Vec<String>,
    album_type: Option<String>,
    album_group: Option<String>,
    tracks: Option<ApiPaging<ApiTrack>>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtist>,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    disc_number: u32,
    #[serde(default)]
    track_number: u32,
    album: Option<ApiAlbum>,
    external_ids: Option<ApiExternalIds>,
    #[serde(default)]
    is_local: bool,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylistItem {
    track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiSearch {
    tracks: ApiPaging<ApiTrack>,
}

/// Album-level fields copied onto every track of the album
#[derive(Clone, Debug, Default)]
struct AlbumContext {
    name: String,
    artist: String,
    cover_url: Option<String>,
    release_date: Option<String>,
    total_tracks: u32,
    genres: Vec<String>,
}

impl AlbumContext {
    fn from_album(album: &ApiAlbum) -> Self {
        Self {
            name: album.name.clone(),
            artist: album
                .artists
                .first()
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            cover_url: largest_image(&album.images),
            release_date: album.release_date.clone(),
            total_tracks: album.total_tracks.unwrap_or_default(),
            genres: album.genres.clone(),
        }
    }
}

fn largest_image(images: &[ApiImage]) -> Option<String> {
    images
        .iter()
        .max_by_key(|image| image.width.unwrap_or_default())
        .map(|image| image.url.clone())
}

/// Spotify Web API client
pub struct SpotifyProvider {
    client: reqwest::Client,
    api_url: String,
    auth_url: String,
    client_id: String,
    client_secret: String,
    retry: RetryConfig,
    token: Mutex<Option<(String, Instant)>>,
    artist_genres: Mutex<HashMap<String, Vec<String>>>,
    albums: Mutex<HashMap<String, AlbumContext>>,
}

impl SpotifyProvider {
    /// Create a provider with explicit credentials and endpoints
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        api_url: impl Into<String>,
        auth_url: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            auth_url: auth_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            retry,
            token: Mutex::new(None),
            artist_genres: Mutex::new(HashMap::new()),
            albums: Mutex::new(HashMap::new()),
        }
    }

    /// Create a provider from configuration; credentials are required
    pub fn from_config(providers: &ProviderConfig, retry: &RetryConfig) -> Result<Self> {
        let (Some(id), Some(secret)) = (
            providers.spotify_client_id.as_deref(),
            providers.spotify_client_secret.as_deref(),
        ) else {
            return Err(Error::Setup(
                "Spotify credentials are required (spotify_client_id / spotify_client_secret)"
                    .to_string(),
            ));
        };
        Ok(Self::new(
            id,
            secret,
            providers.spotify_api_url.as_str(),
            providers.spotify_auth_url.as_str(),
            retry.clone(),
        ))
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some((token, expires_at)) = cached.as_ref()
            && Instant::now() < *expires_at
        {
            return Ok(token.clone());
        }

        let url = format!("{}/api/token", self.auth_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Provider {
                provider: PROVIDER,
                message: format!("authentication failed with HTTP {}", response.status()),
            });
        }
        let body: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some((body.access_token.clone(), Instant::now() + lifetime));
        tracing::debug!(expires_in = body.expires_in, "obtained Spotify access token");
        Ok(body.access_token)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = &format!("{}{}", self.api_url, path);
        with_retry(&self.retry, move || async move {
            let token = self.access_token().await?;
            let response = self
                .client
                .get(url)
                .bearer_auth(&token)
                .query(query)
                .send()
                .await?;
            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(Error::NotFound(format!("{PROVIDER} resource {path}")));
            }
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.token.lock().await.take();
            }
            if !status.is_success() {
                return Err(Error::Http {
                    status: status.as_u16(),
                    url: url.clone(),
                });
            }
            Ok(response.json::<T>().await?)
        })
        .await
    }

    async fn genres_for_artist(&self, artist_id: &str) -> Vec<String> {
        if let Some(genres) = self.artist_genres.lock().await.get(artist_id) {
            return genres.clone();
        }
        let genres = match self
            .get_json::<ApiArtist>(&format!("/artists/{}", encode(artist_id)), &[])
            .await
        {
            Ok(artist) => artist.genres,
            Err(e) => {
                tracing::debug!(artist = artist_id, error = %e, "could not fetch artist genres");
                Vec::new()
            }
        };
        self.artist_genres
            .lock()
            .await
            .insert(artist_id.to_string(), genres.clone());
        genres
    }

    async fn album_context(&self, album_id: &str) -> Result<(AlbumContext, Option<ApiPaging<ApiTrack>>)> {
        let album: ApiAlbum = self.get_json(&format!("/albums/{}", encode(album_id)), &[]).await?;
        let context = AlbumContext::from_album(&album);
        self.albums
            .lock()
            .await
            .insert(album_id.to_string(), context.clone());
        Ok((context, album.tracks))
    }

    async fn to_track_info(&self, track: ApiTrack, album: Option<AlbumContext>) -> Option<TrackInfo> {
        if track.is_local {
            return None;
        }
        let id = track.id?;
        let album = match album {
            Some(album) => album,
            None => track
                .album
                .as_ref()
                .map(AlbumContext::from_album)
                .unwrap_or_default(),
        };

        let mut genres = album.genres.clone();
        if genres.is_empty()
            && let Some(artist_id) = track.artists.first().and_then(|a| a.id.as_deref())
        {
            genres = self.genres_for_artist(artist_id).await;
        }

        Some(TrackInfo {
            url: format!("https://open.spotify.com/track/{id}"),
            id,
            title: track.name,
            artists: track.artists.iter().map(|a| a.name.clone()).collect(),
            artist_ids: track.artists.iter().filter_map(|a| a.id.clone()).collect(),
            album: album.name,
            album_artist: album.artist,
            duration: track.duration_ms as f64 / 1000.0,
            disc_number: track.disc_number,
            track_number: track.track_number,
            tracks_count: album.total_tracks,
            genres,
            cover_url: album.cover_url,
            release_date: album.release_date,
            isrc: track.external_ids.and_then(|ids| ids.isrc),
        })
    }

    async fn convert_page(&self, page: ApiPaging<ApiTrack>, album: Option<&AlbumContext>) -> Page<TrackInfo> {
        let next = page.next_token();
        let mut items = Vec::with_capacity(page.items.len());
        for track in page.items {
            if let Some(info) = self.to_track_info(track, album.cloned()).await {
                items.push(info);
            }
        }
        Page { items, next }
    }
}

#[async_trait]
impl MetadataProvider for SpotifyProvider {
    async fn lookup_track(&self, id: &str) -> Result<TrackInfo> {
        let track: ApiTrack = self.get_json(&format!("/tracks/{}", encode(id)), &[]).await?;
        self.to_track_info(track, None)
            .await
            .ok_or_else(|| Error::NotFound(format!("track {id} is a local file")))
    }

    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<TrackInfo>> {
        let result: ApiSearch = self
            .get_json(
                "/search",
                &[
                    ("q", query.to_string()),
                    ("type", "track".to_string()),
                    ("limit", limit.clamp(1, 50).to_string()),
                ],
            )
            .await?;
        Ok(self.convert_page(result.tracks, None).await.items)
    }

    async fn album_tracks(&self, album_id: &str, page: Option<&str>) -> Result<Page<TrackInfo>> {
        match page {
            None => {
                let (context, tracks) = self.album_context(album_id).await?;
                let Some(tracks) = tracks else {
                    return Ok(Page::last(Vec::new()));
                };
                Ok(self.convert_page(tracks, Some(&context)).await)
            }
            Some(offset) => {
                let cached = self.albums.lock().await.get(album_id).cloned();
                let context = match cached {
                    Some(context) => context,
                    None => self.album_context(album_id).await?.0,
                };
                let tracks: ApiPaging<ApiTrack> = self
                    .get_json(
                        &format!("/albums/{}/tracks", encode(album_id)),
                        &[
                            ("offset", offset.to_string()),
                            ("limit", ALBUM_PAGE_SIZE.to_string()),
                        ],
                    )
                    .await?;
                Ok(self.convert_page(tracks, Some(&context)).await)
            }
        }
    }

    async fn playlist_tracks(&self, playlist_id: &str, page: Option<&str>) -> Result<Page<TrackInfo>> {
        let items: ApiPaging<ApiPlaylistItem> = self
            .get_json(
                &format!("/playlists/{}/tracks", encode(playlist_id)),
                &[
                    ("offset", page.unwrap_or("0").to_string()),
                    ("limit", PLAYLIST_PAGE_SIZE.to_string()),
                ],
            )
            .await?;
        let next = items.next_token();
        let mut tracks = Vec::with_capacity(items.items.len());
        for item in items.items {
            if let Some(track) = item.track
                && let Some(info) = self.to_track_info(track, None).await
            {
                tracks.push(info);
            }
        }
        Ok(Page { items: tracks, next })
    }

    async fn artist_albums(&self, artist_id: &str, page: Option<&str>) -> Result<Page<AlbumSummary>> {
        let albums: ApiPaging<ApiAlbum> = self
            .get_json(
                &format!("/artists/{}/albums", encode(artist_id)),
                &[
                    ("include_groups", "album,single,compilation,appears_on".to_string()),
                    ("offset", page.unwrap_or("0").to_string()),
                    ("limit", ARTIST_ALBUM_PAGE_SIZE.to_string()),
                ],
            )
            .await?;
        let next = albums.next_token();
        let items = albums
            .items
            .into_iter()
            .map(|album| AlbumSummary {
                id: album.id,
                name: album.name,
                album_group: album.album_group,
                album_type: album.album_type,
            })
            .collect();
        Ok(Page { items, next })
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}
