//! Core types for trackdl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Item identifier assigned by the progress tracker, unique within a batch
pub type ItemId = usize;

/// Provider metadata for a single track
///
/// Everything here is fixed once the track has been resolved; fields that are
/// discovered while downloading live on [`Track`] as write-once cells.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackInfo {
    /// Stable external URL; the identifier used by the archive and known-files index
    pub url: String,
    /// Provider-specific track id
    pub id: String,
    /// Track title
    pub title: String,
    /// Artist names, primary first
    pub artists: Vec<String>,
    /// Provider ids of the credited artists, same order as `artists`
    pub artist_ids: Vec<String>,
    /// Album name
    pub album: String,
    /// Album artist (usually the album's primary artist)
    pub album_artist: String,
    /// Duration in seconds
    pub duration: f64,
    /// Disc number (1-based)
    pub disc_number: u32,
    /// Track number on its disc (1-based)
    pub track_number: u32,
    /// Number of tracks on the album
    pub tracks_count: u32,
    /// Genres, most relevant first
    pub genres: Vec<String>,
    /// Cover art URL
    pub cover_url: Option<String>,
    /// Release date as reported by the provider ("2020", "2020-05" or "2020-05-17")
    pub release_date: Option<String>,
    /// International Standard Recording Code
    pub isrc: Option<String>,
}

impl TrackInfo {
    /// Release year parsed from `release_date`
    pub fn year(&self) -> Option<u32> {
        self.release_date
            .as_deref()
            .and_then(|date| date.split('-').next())
            .and_then(|year| year.parse().ok())
    }

    /// Primary artist, if any
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(String::as_str)
    }
}

/// A value that may be assigned at most once
///
/// Assigning the same value again is accepted; assigning a different value fails
/// with [`Error::AlreadySet`]. Reconciliation of existing files is the only code
/// path allowed to replace a value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriteOnce<T>(Option<T>);

impl<T: PartialEq> WriteOnce<T> {
    /// Current value
    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    /// Whether a value has been assigned
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Assign the value, failing if a different one is already present
    pub fn set(&mut self, field: &'static str, value: T) -> Result<()> {
        match &self.0 {
            Some(existing) if *existing != value => Err(Error::AlreadySet { field }),
            Some(_) => Ok(()),
            None => {
                self.0 = Some(value);
                Ok(())
            }
        }
    }

    pub(crate) fn replace(&mut self, value: T) -> Option<T> {
        self.0.replace(value)
    }
}

/// A track moving through the download pipeline
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Provider metadata
    #[serde(flatten)]
    pub info: TrackInfo,

    #[serde(default)]
    lyrics: WriteOnce<String>,

    #[serde(default)]
    audio_source: WriteOnce<String>,

    #[serde(default)]
    output_path: WriteOnce<PathBuf>,
}

impl Track {
    /// Create a track from resolved provider metadata
    pub fn new(info: TrackInfo) -> Self {
        Self {
            info,
            ..Default::default()
        }
    }

    /// Create a placeholder that only knows its URL; it is re-resolved before download
    pub fn placeholder(url: impl Into<String>) -> Self {
        Self::new(TrackInfo {
            url: url.into(),
            ..Default::default()
        })
    }

    /// Whether this track still needs its metadata resolved
    pub fn is_placeholder(&self) -> bool {
        self.info.title.is_empty() || self.info.artists.is_empty()
    }

    /// Identifier used by the archive, known-files index and failure records
    pub fn url(&self) -> &str {
        &self.info.url
    }

    /// "Artists - Title", or the URL for placeholders
    pub fn display_name(&self) -> String {
        if self.is_placeholder() {
            return self.info.url.clone();
        }
        format!("{} - {}", self.info.artists.join(", "), self.info.title)
    }

    /// Lyrics, once resolved
    pub fn lyrics(&self) -> Option<&str> {
        self.lyrics.get().map(String::as_str)
    }

    /// Audio source reference, once resolved
    pub fn audio_source(&self) -> Option<&str> {
        self.audio_source.get().map(String::as_str)
    }

    /// Output path, once written
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.get().map(PathBuf::as_path)
    }

    /// Record resolved lyrics
    pub fn set_lyrics(&mut self, lyrics: String) -> Result<()> {
        self.lyrics.set("lyrics", lyrics)
    }

    /// Record the resolved audio source
    pub fn set_audio_source(&mut self, source: String) -> Result<()> {
        self.audio_source.set("audio_source", source)
    }

    /// Record the written output path
    pub fn set_output_path(&mut self, path: PathBuf) -> Result<()> {
        self.output_path.set("output_path", path)
    }

    pub(crate) fn replace_audio_source(&mut self, source: String) {
        self.audio_source.replace(source);
    }

    pub(crate) fn replace_output_path(&mut self, path: PathBuf) {
        self.output_path.replace(path);
    }

    /// Replace the metadata of a placeholder, keeping anything already resolved
    pub(crate) fn fill_info(&mut self, info: TrackInfo) {
        self.info = info;
    }
}

/// Per-track pipeline phase
///
/// Transitions only move forward; `Errored` is reachable from every non-terminal phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Waiting for a worker
    Queued,
    /// Resolving metadata, lyrics and existing files
    Searching,
    /// Fetching raw audio
    Downloading,
    /// Transcoding and post-processing
    Converting,
    /// Writing tags
    Embedding,
    /// Output written
    Complete,
    /// Existing output kept, nothing downloaded
    Skipped,
    /// Failed; see the error report
    Errored,
}

impl Phase {
    fn rank(self) -> u8 {
        match self {
            Phase::Queued => 0,
            Phase::Searching => 1,
            Phase::Downloading => 2,
            Phase::Converting => 3,
            Phase::Embedding => 4,
            Phase::Complete | Phase::Skipped => 5,
            Phase::Errored => 6,
        }
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Skipped | Phase::Errored)
    }

    /// Whether the phase counts towards the worker concurrency bound
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Downloading | Phase::Converting)
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Phase::Errored => true,
            Phase::Skipped => matches!(self, Phase::Queued | Phase::Searching),
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Queued => "Queued",
            Phase::Searching => "Searching",
            Phase::Downloading => "Downloading",
            Phase::Converting => "Converting",
            Phase::Embedding => "Embedding",
            Phase::Complete => "Done",
            Phase::Skipped => "Skipped",
            Phase::Errored => "Error",
        };
        f.write_str(name)
    }
}

/// Event emitted during a batch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch of `total` tracks was scheduled
    BatchStarted {
        /// Number of tracks scheduled
        total: usize,
    },

    /// A track moved to a new phase
    PhaseChanged {
        /// Item id
        item: ItemId,
        /// Track display name
        name: String,
        /// New phase
        phase: Phase,
    },

    /// Sub-phase progress for downloading/converting
    Progress {
        /// Item id
        item: ItemId,
        /// Percentage (0 to 100)
        percent: u8,
    },

    /// A track failed
    ItemFailed {
        /// Item id
        item: ItemId,
        /// Track display name
        name: String,
        /// Error summary
        error: String,
    },

    /// All scheduled tracks reached a terminal phase
    BatchFinished {
        /// Tracks written
        completed: usize,
        /// Tracks skipped because output already existed
        skipped: usize,
        /// Tracks that failed
        errors: usize,
        /// Tracks scheduled
        total: usize,
    },
}

/// Result of processing one track: the track and its output path (None on skip or failure)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    /// The track, including anything resolved while downloading
    pub track: Track,
    /// Where the output was written
    pub path: Option<PathBuf>,
}

impl DownloadOutcome {
    /// Whether an output file was produced
    pub fn is_success(&self) -> bool {
        self.path.is_some()
    }
}
