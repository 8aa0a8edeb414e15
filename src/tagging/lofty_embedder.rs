//! Tag writing with `lofty`

use super::MetadataEmbedder;
use crate::error::{DownloadError, Error, Result};
use crate::types::Track;
use async_trait::async_trait;
use lofty::{Accessor, ItemKey, Picture, PictureType, Probe, Tag, TagExt, TaggedFileExt};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Embedder backed by `lofty`, fetching cover art over HTTP
#[derive(Clone, Debug, Default)]
pub struct LoftyEmbedder {
    client: reqwest::Client,
}

impl LoftyEmbedder {
    /// Create an embedder with its own HTTP client for cover art
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch_cover(&self, url: &str) -> Option<Vec<u8>> {
        let response = match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(url, status = %response.status(), "cover art request failed");
                return None;
            }
            Err(e) => {
                warn!(url, error = %e, "cover art request failed");
                return None;
            }
        };
        match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!(url, error = %e, "failed to read cover art");
                None
            }
        }
    }
}

fn embed_error(path: &Path, reason: impl ToString) -> Error {
    DownloadError::MetadataEmbed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
    .into()
}

/// Write every known field of `track` into the file's primary tag
fn write_tags(path: &Path, track: &Track, cover: Option<&[u8]>) -> Result<()> {
    let mut tagged_file = Probe::open(path)
        .and_then(|probe| probe.read())
        .map_err(|e| embed_error(path, e))?;

    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .tag_mut(tag_type)
        .ok_or_else(|| embed_error(path, "file does not support tags"))?;

    let info = &track.info;
    tag.set_title(info.title.clone());
    if !info.artists.is_empty() {
        tag.set_artist(info.artists.join(", "));
    }
    if !info.album.is_empty() {
        tag.set_album(info.album.clone());
    }
    if !info.album_artist.is_empty() {
        tag.insert_text(ItemKey::AlbumArtist, info.album_artist.clone());
    }
    if let Some(genre) = info.genres.first() {
        tag.set_genre(genre.clone());
    }
    if info.track_number > 0 {
        tag.set_track(info.track_number);
    }
    if info.tracks_count > 0 {
        tag.set_track_total(info.tracks_count);
    }
    if info.disc_number > 0 {
        tag.set_disk(info.disc_number);
    }
    if let Some(year) = info.year() {
        tag.set_year(year);
    }
    if let Some(lyrics) = track.lyrics() {
        tag.insert_text(ItemKey::Lyrics, lyrics.to_string());
    }
    tag.set_comment(info.url.clone());

    if let Some(bytes) = cover {
        match Picture::from_reader(&mut &bytes[..]) {
            Ok(mut picture) => {
                picture.set_pic_type(PictureType::CoverFront);
                tag.remove_picture_type(PictureType::CoverFront);
                tag.push_picture(picture);
            }
            Err(e) => warn!(path = ?path, error = %e, "ignoring unreadable cover art"),
        }
    }

    tag.save_to_path(path).map_err(|e| embed_error(path, e))?;
    Ok(())
}

fn read_url(path: &Path) -> Result<Option<String>> {
    let tagged_file = Probe::open(path)
        .and_then(|probe| probe.read())
        .map_err(|e| embed_error(path, e))?;

    let url = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
        .and_then(|tag| tag.get_string(&ItemKey::Comment))
        .map(str::trim)
        .filter(|comment| comment.starts_with("http"))
        .map(str::to_string);
    Ok(url)
}

async fn blocking<T, F>(path: PathBuf, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Path) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&path))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("tag task panicked: {e}"))))?
}

#[async_trait]
impl MetadataEmbedder for LoftyEmbedder {
    async fn embed(&self, file: &Path, track: &Track) -> Result<()> {
        let cover = match &track.info.cover_url {
            Some(url) => self.fetch_cover(url).await,
            None => None,
        };
        let track = track.clone();
        blocking(file.to_path_buf(), move |path| {
            write_tags(path, &track, cover.as_deref())
        })
        .await?;
        debug!(path = ?file, "embedded metadata");
        Ok(())
    }

    async fn read_track_url(&self, file: &Path) -> Result<Option<String>> {
        blocking(file.to_path_buf(), read_url).await
    }

    fn name(&self) -> &'static str {
        "lofty"
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrackInfo;
    use tempfile::TempDir;

    /// A one-second 8 kHz mono PCM WAV file
    fn write_wav(path: &Path) {
        let samples = 8000u32;
        let data_len = samples * 2;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&8000u32.to_le_bytes());
        bytes.extend_from_slice(&16000u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(bytes.len() + data_len as usize, 0);
        std::fs::write(path, bytes).unwrap();
    }

    fn track() -> Track {
        let mut track = Track::new(TrackInfo {
            url: "https://open.spotify.com/track/abc".into(),
            title: "Song".into(),
            artists: vec!["A".into(), "B".into()],
            album: "Album".into(),
            album_artist: "A".into(),
            track_number: 3,
            tracks_count: 10,
            disc_number: 1,
            genres: vec!["rock".into()],
            release_date: Some("2021-04-02".into()),
            ..Default::default()
        });
        track.set_lyrics("la la".into()).unwrap();
        track
    }

    #[tokio::test]
    async fn test_embed_then_read_url() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("song.wav");
        write_wav(&file);

        let embedder = LoftyEmbedder::new();
        embedder.embed(&file, &track()).await.unwrap();

        assert_eq!(
            embedder.read_track_url(&file).await.unwrap().as_deref(),
            Some("https://open.spotify.com/track/abc")
        );

        let tagged = Probe::open(&file).unwrap().read().unwrap();
        let tag = tagged.primary_tag().unwrap();
        assert_eq!(tag.title().as_deref(), Some("Song"));
        assert_eq!(tag.artist().as_deref(), Some("A, B"));
        assert_eq!(tag.track(), Some(3));
        assert_eq!(tag.year(), Some(2021));
    }

    #[tokio::test]
    async fn test_untagged_file_has_no_url() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.wav");
        write_wav(&file);

        assert_eq!(LoftyEmbedder::new().read_track_url(&file).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_embed_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("broken.flac");
        std::fs::write(&file, b"definitely not flac").unwrap();

        let err = LoftyEmbedder::new().embed(&file, &track()).await.unwrap_err();
        assert_eq!(err.kind(), "MetadataEmbedError");
    }
}
