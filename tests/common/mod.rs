//! Common test utilities for trackdl integration tests
//!
//! Metadata and lyrics come from real providers pointed at a wiremock server. Audio
//! fetching and encoding are faked so no external binaries are needed; the fake encoder
//! writes a real WAV file so tags are written by the real embedder.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use trackdl::audio::{AudioMeta, AudioSourceResolver};
use trackdl::catalog::SpotifyProvider;
use trackdl::config::RetryConfig;
use trackdl::lyrics::{LrclibProvider, LyricsProvider};
use trackdl::post_processing::Segment;
use trackdl::progress::ProgressCallback;
use trackdl::tagging::LoftyEmbedder;
use trackdl::transcode::{ConvertRequest, TranscodeOutcome, Transcoder};
use trackdl::{Components, Config, Downloader, TrackInfo};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Single-attempt retry policy so failing endpoints fail fast
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 1,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        backoff_multiplier: 1.0,
        jitter: false,
    }
}

/// Spotify API track object for `id`
pub fn track_json(id: &str, name: &str, number: u32) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "artists": [{"id": "art1", "name": "Artist"}],
        "duration_ms": 180_000,
        "disc_number": 1,
        "track_number": number,
        "album": {
            "id": "alb1",
            "name": "Album",
            "artists": [{"id": "art1", "name": "Artist"}],
            "images": [],
            "release_date": "2020-05-01",
            "total_tracks": 2
        }
    })
}

/// A wiremock server answering the Spotify token, artist and lyrics endpoints
pub async fn start_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok", "expires_in": 3600})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artists/art1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "art1", "name": "Artist", "genres": ["pop"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"plainLyrics": "first line\nsecond line", "instrumental": false}
        ])))
        .mount(&server)
        .await;
    server
}

/// Serve `tracks` as the single page of playlist `id`
pub async fn mount_playlist(server: &MockServer, id: &str, tracks: &[serde_json::Value]) {
    let items: Vec<_> = tracks.iter().map(|t| json!({ "track": t })).collect();
    Mock::given(method("GET"))
        .and(path(format!("/playlists/{id}/tracks")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": items,
            "next": null,
            "offset": 0,
            "limit": 100
        })))
        .mount(server)
        .await;
}

/// Serve a single track lookup
pub async fn mount_track(server: &MockServer, track: serde_json::Value) {
    let id = track["id"].as_str().unwrap_or_default().to_string();
    Mock::given(method("GET"))
        .and(path(format!("/tracks/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(track))
        .mount(server)
        .await;
}

/// Config rooted in `root` writing WAV files
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = root.join("music");
    config.download.temp_dir = root.join("tmp");
    config.download.errors_dir = root.join("errors");
    config.download.format = "wav".to_string();
    config.download.threads = 2;
    config.retry = fast_retry();
    config
}

/// Audio resolver that matches every track and "downloads" a small raw file
#[derive(Default)]
pub struct FakeAudio {
    fetches: AtomicUsize,
}

impl FakeAudio {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSourceResolver for FakeAudio {
    async fn search(&self, track: &TrackInfo) -> trackdl::Result<Option<String>> {
        Ok(Some(format!("fake:{}", track.id)))
    }

    async fn fetch(
        &self,
        source: &str,
        temp_dir: &Path,
        progress: ProgressCallback,
    ) -> trackdl::Result<AudioMeta> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let id = source.trim_start_matches("fake:").to_string();
        let path = temp_dir.join(format!("{id}.raw"));
        tokio::fs::write(&path, b"raw audio").await?;
        progress(100.0);
        Ok(AudioMeta {
            id,
            ext: "raw".to_string(),
            average_bitrate: Some(128.0),
            path,
        })
    }

    fn can_fetch(&self, source: &str) -> bool {
        source.starts_with("fake:")
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Encoder that writes a silent WAV file to the requested output
pub struct WavTranscoder;

#[async_trait]
impl Transcoder for WavTranscoder {
    async fn check_available(&self) -> trackdl::Result<()> {
        Ok(())
    }

    async fn convert(
        &self,
        request: &ConvertRequest,
        progress: ProgressCallback,
    ) -> trackdl::Result<TranscodeOutcome> {
        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&request.output, silent_wav()).await?;
        progress(100.0);
        Ok(TranscodeOutcome::ok())
    }

    async fn remove_segments(
        &self,
        _file: &Path,
        _segments: &[Segment],
    ) -> trackdl::Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "wav"
    }
}

/// A one-second 8 kHz mono PCM WAV file
pub fn silent_wav() -> Vec<u8> {
    let data_len = 16_000u32;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&8000u32.to_le_bytes());
    bytes.extend_from_slice(&16000u32.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(bytes.len() + data_len as usize, 0);
    bytes
}

/// Downloader with real Spotify, LRCLIB and tag-writing collaborators
pub async fn create_downloader(
    config: Config,
    server: &MockServer,
    audio: Arc<FakeAudio>,
) -> Downloader {
    let components = Components {
        metadata: Arc::new(SpotifyProvider::new(
            "id",
            "secret",
            server.uri(),
            server.uri(),
            fast_retry(),
        )),
        audio: vec![audio as Arc<dyn AudioSourceResolver>],
        lyrics: vec![Arc::new(LrclibProvider::new(server.uri(), fast_retry())) as Arc<dyn LyricsProvider>],
        transcoder: Arc::new(WavTranscoder),
        embedder: Arc::new(LoftyEmbedder::new()),
        detector: None,
    };
    Downloader::with_components(config, components)
        .await
        .expect("failed to create downloader")
}
