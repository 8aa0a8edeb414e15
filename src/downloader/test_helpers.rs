//! Shared test helpers: mock collaborators and downloader construction.

use crate::audio::{AudioMeta, AudioSourceResolver};
use crate::catalog::{AlbumSummary, MetadataProvider, Page};
use crate::config::Config;
use crate::downloader::{Components, Downloader};
use crate::error::{DownloadError, Error, PostProcessError, Result};
use crate::lyrics::LyricsProvider;
use crate::post_processing::{Segment, SegmentDetector};
use crate::progress::ProgressCallback;
use crate::tagging::MetadataEmbedder;
use crate::transcode::{ConvertRequest, TranscodeOutcome, Transcoder};
use crate::types::{Track, TrackInfo};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Provider metadata for a resolvable track
pub(crate) fn track_info(id: &str, title: &str, artist: &str) -> TrackInfo {
    TrackInfo {
        url: format!("https://open.spotify.com/track/{id}"),
        id: id.to_string(),
        title: title.to_string(),
        artists: vec![artist.to_string()],
        artist_ids: vec![format!("{}-id", artist.to_lowercase())],
        album: "Album".to_string(),
        album_artist: artist.to_string(),
        duration: 180.0,
        disc_number: 1,
        track_number: 1,
        tracks_count: 1,
        ..Default::default()
    }
}

/// A fully resolved track
pub(crate) fn track(id: &str, title: &str) -> Track {
    Track::new(track_info(id, title, "Artist"))
}

fn pages<T: Clone>(all: &[Vec<T>], page: Option<&str>) -> Result<Page<T>> {
    let index: usize = page.map(|p| p.parse().unwrap()).unwrap_or(0);
    let items = all.get(index).cloned().unwrap_or_default();
    let next = (index + 1 < all.len()).then(|| (index + 1).to_string());
    Ok(Page { items, next })
}

/// In-memory metadata provider
#[derive(Default)]
pub(crate) struct MockMetadata {
    tracks: HashMap<String, TrackInfo>,
    albums: HashMap<String, Vec<Vec<TrackInfo>>>,
    playlists: HashMap<String, Vec<Vec<TrackInfo>>>,
    artists: HashMap<String, Vec<Vec<AlbumSummary>>>,
    search: Vec<TrackInfo>,
    lookups: AtomicUsize,
}

impl MockMetadata {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_track(mut self, info: TrackInfo) -> Self {
        self.tracks.insert(info.id.clone(), info);
        self
    }

    pub(crate) fn with_album(mut self, id: &str, pages: Vec<Vec<TrackInfo>>) -> Self {
        self.albums.insert(id.to_string(), pages);
        self
    }

    pub(crate) fn with_playlist(mut self, id: &str, pages: Vec<Vec<TrackInfo>>) -> Self {
        self.playlists.insert(id.to_string(), pages);
        self
    }

    pub(crate) fn with_artist(mut self, id: &str, pages: Vec<Vec<AlbumSummary>>) -> Self {
        self.artists.insert(id.to_string(), pages);
        self
    }

    pub(crate) fn with_search(mut self, results: Vec<TrackInfo>) -> Self {
        self.search = results;
        self
    }

    pub(crate) fn lookup_calls(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for MockMetadata {
    async fn lookup_track(&self, id: &str) -> Result<TrackInfo> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.tracks
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("track {id}")))
    }

    async fn search_tracks(&self, _query: &str, limit: usize) -> Result<Vec<TrackInfo>> {
        Ok(self.search.iter().take(limit).cloned().collect())
    }

    async fn album_tracks(&self, album_id: &str, page: Option<&str>) -> Result<Page<TrackInfo>> {
        let all = self
            .albums
            .get(album_id)
            .ok_or_else(|| Error::NotFound(format!("album {album_id}")))?;
        pages(all, page)
    }

    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        page: Option<&str>,
    ) -> Result<Page<TrackInfo>> {
        let all = self
            .playlists
            .get(playlist_id)
            .ok_or_else(|| Error::NotFound(format!("playlist {playlist_id}")))?;
        pages(all, page)
    }

    async fn artist_albums(
        &self,
        artist_id: &str,
        page: Option<&str>,
    ) -> Result<Page<AlbumSummary>> {
        let all = self
            .artists
            .get(artist_id)
            .ok_or_else(|| Error::NotFound(format!("artist {artist_id}")))?;
        pages(all, page)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Audio resolver that writes a small raw file per track
///
/// Sources are `mock:<track id>`; raw files are `<temp>/<track id>.raw`.
#[derive(Default)]
pub(crate) struct MockAudio {
    prefix: Option<&'static str>,
    no_match: HashSet<String>,
    locked_temp: HashSet<String>,
    fail_fetch: HashSet<String>,
    delay: Duration,
    searches: AtomicUsize,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockAudio {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// No source is found for the track with this id
    pub(crate) fn no_match(mut self, id: &str) -> Self {
        self.no_match.insert(id.to_string());
        self
    }

    /// Fetching the track with this id fails
    pub(crate) fn fail_fetch(mut self, id: &str) -> Self {
        self.fail_fetch.insert(id.to_string());
        self
    }

    /// Sources are `<prefix>:<track id>` instead of `mock:<track id>`
    pub(crate) fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// The raw file of the track with this id is a directory, so it cannot be removed
    pub(crate) fn locked_temp(mut self, id: &str) -> Self {
        self.locked_temp.insert(id.to_string());
        self
    }

    fn prefix(&self) -> &'static str {
        self.prefix.unwrap_or("mock")
    }

    /// Each fetch takes this long
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn search_calls(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Highest number of fetches that ran at the same time
    pub(crate) fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSourceResolver for MockAudio {
    async fn search(&self, track: &TrackInfo) -> Result<Option<String>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.no_match.contains(&track.id) {
            return Ok(None);
        }
        Ok(Some(format!("{}:{}", self.prefix(), track.id)))
    }

    async fn fetch(
        &self,
        source: &str,
        temp_dir: &Path,
        progress: ProgressCallback,
    ) -> Result<AudioMeta> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let id = source
            .strip_prefix(self.prefix())
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(source)
            .to_string();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        progress(50.0);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_fetch.contains(&id) {
            return Err(Error::ExternalTool(format!("source {id} unavailable")));
        }

        let path = temp_dir.join(format!("{id}.raw"));
        if self.locked_temp.contains(&id) {
            tokio::fs::create_dir_all(path.join("in-use")).await?;
        } else {
            tokio::fs::write(&path, format!("raw:{id}")).await?;
        }
        progress(100.0);
        Ok(AudioMeta {
            id,
            ext: "raw".to_string(),
            average_bitrate: Some(160.0),
            path,
        })
    }

    fn can_fetch(&self, source: &str) -> bool {
        source
            .strip_prefix(self.prefix())
            .is_some_and(|rest| rest.starts_with(':'))
    }

    fn name(&self) -> &'static str {
        "mock-audio"
    }
}

/// Lyrics provider returning a fixed answer
pub(crate) struct MockLyrics(pub(crate) Option<String>);

#[async_trait]
impl LyricsProvider for MockLyrics {
    async fn get_lyrics(&self, _title: &str, _artists: &[String]) -> Result<Option<String>> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "mock-lyrics"
    }
}

/// Transcoder that copies input to output with an `encoded:` prefix
#[derive(Default)]
pub(crate) struct MockTranscoder {
    fail_convert: bool,
    fail_segments: bool,
    unavailable: bool,
    converts: AtomicUsize,
    segment_removals: AtomicUsize,
    bitrates: Mutex<Vec<Option<String>>>,
}

impl MockTranscoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_convert(mut self) -> Self {
        self.fail_convert = true;
        self
    }

    pub(crate) fn fail_segment_removal(mut self) -> Self {
        self.fail_segments = true;
        self
    }

    /// `check_available` fails, as with a missing binary
    pub(crate) fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub(crate) fn convert_calls(&self) -> usize {
        self.converts.load(Ordering::SeqCst)
    }

    pub(crate) fn segment_calls(&self) -> usize {
        self.segment_removals.load(Ordering::SeqCst)
    }

    /// Bitrate argument of every conversion
    pub(crate) fn bitrates(&self) -> Vec<Option<String>> {
        self.bitrates.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    async fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(Error::Setup("mock transcoder missing".to_string()));
        }
        Ok(())
    }

    async fn convert(
        &self,
        request: &ConvertRequest,
        progress: ProgressCallback,
    ) -> Result<TranscodeOutcome> {
        self.converts.fetch_add(1, Ordering::SeqCst);
        self.bitrates.lock().unwrap().push(request.bitrate.clone());

        if self.fail_convert {
            tokio::fs::write(&request.output, b"partial").await?;
            let mut diagnostics = BTreeMap::new();
            diagnostics.insert("return_code".to_string(), "1".to_string());
            diagnostics.insert("stderr".to_string(), "Invalid data found".to_string());
            return Ok(TranscodeOutcome::failed(diagnostics));
        }

        // A locked temp path is a directory with nothing to read
        let raw = if request.input.is_dir() {
            String::new()
        } else {
            tokio::fs::read_to_string(&request.input).await?
        };
        tokio::fs::write(&request.output, format!("encoded:{raw}")).await?;
        progress(100.0);
        Ok(TranscodeOutcome::ok())
    }

    async fn remove_segments(&self, file: &Path, _segments: &[Segment]) -> Result<Vec<PathBuf>> {
        self.segment_removals.fetch_add(1, Ordering::SeqCst);
        if self.fail_segments {
            return Err(PostProcessError::SegmentRemoval {
                path: file.to_path_buf(),
                reason: "filter failed".to_string(),
            }
            .into());
        }

        let stem = file.file_stem().unwrap().to_string_lossy().to_string();
        let ext = file.extension().unwrap().to_string_lossy().to_string();
        let uncut = file.with_file_name(format!("{stem}.uncut.{ext}"));
        tokio::fs::copy(file, &uncut).await?;
        Ok(vec![uncut])
    }

    fn name(&self) -> &'static str {
        "mock-transcoder"
    }
}

/// Embedder that records tags in memory instead of writing them
#[derive(Default)]
pub(crate) struct MockEmbedder {
    tags: Mutex<HashMap<PathBuf, String>>,
    fail: bool,
    embeds: AtomicUsize,
}

impl MockEmbedder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every embed fails
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Pretend `path` carries the track URL `url`
    pub(crate) fn tag_file(&self, path: &Path, url: &str) {
        self.tags
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), url.to_string());
    }

    /// URL embedded into `path`, if any
    pub(crate) fn tagged_url(&self, path: &Path) -> Option<String> {
        self.tags.lock().unwrap().get(path).cloned()
    }

    pub(crate) fn embed_calls(&self) -> usize {
        self.embeds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataEmbedder for MockEmbedder {
    async fn embed(&self, file: &Path, track: &Track) -> Result<()> {
        self.embeds.fetch_add(1, Ordering::SeqCst);
        if self.fail || !file.exists() {
            return Err(DownloadError::MetadataEmbed {
                path: file.to_path_buf(),
                reason: "unsupported file".to_string(),
            }
            .into());
        }
        self.tag_file(file, track.url());
        Ok(())
    }

    async fn read_track_url(&self, file: &Path) -> Result<Option<String>> {
        Ok(self.tagged_url(file))
    }

    fn name(&self) -> &'static str {
        "mock-embedder"
    }
}

/// Segment detector returning a fixed answer
pub(crate) struct MockSegments(Option<Vec<Segment>>);

impl MockSegments {
    pub(crate) fn found(segments: Vec<Segment>) -> Self {
        Self(Some(segments))
    }

    pub(crate) fn failing() -> Self {
        Self(None)
    }
}

#[async_trait]
impl SegmentDetector for MockSegments {
    async fn detect(&self, _source_id: &str) -> Result<Vec<Segment>> {
        self.0.clone().ok_or_else(|| Error::Http {
            status: 503,
            url: "mock://segments".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "mock-segments"
    }
}

/// Mocks shared between a downloader and the test inspecting it
pub(crate) struct Mocks {
    pub(crate) metadata: Arc<MockMetadata>,
    pub(crate) audio: Arc<MockAudio>,
    pub(crate) lyrics: Arc<MockLyrics>,
    pub(crate) transcoder: Arc<MockTranscoder>,
    pub(crate) embedder: Arc<MockEmbedder>,
    pub(crate) detector: Option<Arc<MockSegments>>,
}

impl Default for Mocks {
    fn default() -> Self {
        Self {
            metadata: Arc::new(MockMetadata::new()),
            audio: Arc::new(MockAudio::new()),
            lyrics: Arc::new(MockLyrics(Some("la la la".to_string()))),
            transcoder: Arc::new(MockTranscoder::new()),
            embedder: Arc::new(MockEmbedder::new()),
            detector: None,
        }
    }
}

impl Mocks {
    pub(crate) fn components(&self) -> Components {
        Components {
            metadata: self.metadata.clone(),
            audio: vec![self.audio.clone() as Arc<dyn AudioSourceResolver>],
            lyrics: vec![self.lyrics.clone() as Arc<dyn LyricsProvider>],
            transcoder: self.transcoder.clone(),
            embedder: self.embedder.clone(),
            detector: self
                .detector
                .clone()
                .map(|d| d as Arc<dyn SegmentDetector>),
        }
    }
}

/// Config rooted in a temp directory, with two workers
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = root.join("music");
    config.download.temp_dir = root.join("tmp");
    config.download.errors_dir = root.join("errors");
    config.download.threads = 2;
    config
}

/// Build a downloader over `mocks`
pub(crate) async fn create_test_downloader(config: Config, mocks: &Mocks) -> Downloader {
    Downloader::with_components(config, mocks.components())
        .await
        .unwrap()
}
