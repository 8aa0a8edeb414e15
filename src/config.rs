//! Configuration types for trackdl

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, path::Path, path::PathBuf, time::Duration};

/// Output formats the ffmpeg transcoder knows how to produce
pub const SUPPORTED_FORMATS: &[&str] = &["mp3", "flac", "ogg", "opus", "m4a", "wav"];

/// Download behavior configuration (directories, naming, concurrency, overwrite policy)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory output files are written to (default: ".")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Output file name template, relative to `download_dir`
    /// (default: "{artists} - {title}.{output-ext}")
    #[serde(default = "default_output_template")]
    pub output_template: String,

    /// Target audio format (default: "mp3")
    #[serde(default = "default_format")]
    pub format: String,

    /// Target bitrate policy (default: auto)
    #[serde(default)]
    pub bitrate: Bitrate,

    /// Number of tracks processed concurrently (default: 4)
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// What to do when a track's output already exists
    #[serde(default)]
    pub overwrite: Overwrite,

    /// Restrict file names to an ASCII-safe character set
    #[serde(default)]
    pub restrict: bool,

    /// Directory for raw audio fetched before transcoding (default: system temp + "trackdl")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Directory transcode diagnostic reports are written to (default: "./errors")
    #[serde(default = "default_errors_dir")]
    pub errors_dir: PathBuf,

    /// Extra arguments passed to ffmpeg verbatim
    #[serde(default)]
    pub ffmpeg_args: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            output_template: default_output_template(),
            format: default_format(),
            bitrate: Bitrate::default(),
            threads: default_threads(),
            overwrite: Overwrite::default(),
            restrict: false,
            temp_dir: default_temp_dir(),
            errors_dir: default_errors_dir(),
            ffmpeg_args: Vec::new(),
        }
    }
}

/// Metadata, audio and lyrics provider selection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Audio source resolvers in priority order (default: ["youtube"])
    #[serde(default = "default_audio_providers")]
    pub audio_providers: Vec<String>,

    /// Lyrics providers in priority order (default: ["lrclib"])
    #[serde(default = "default_lyrics_providers")]
    pub lyrics_providers: Vec<String>,

    /// Spotify application client id
    #[serde(default)]
    pub spotify_client_id: Option<String>,

    /// Spotify application client secret
    #[serde(default)]
    pub spotify_client_secret: Option<String>,

    /// Spotify Web API base URL
    #[serde(default = "default_spotify_api_url")]
    pub spotify_api_url: String,

    /// Spotify accounts (token) base URL
    #[serde(default = "default_spotify_auth_url")]
    pub spotify_auth_url: String,

    /// LRCLIB base URL
    #[serde(default = "default_lrclib_url")]
    pub lrclib_url: String,

    /// SponsorBlock base URL
    #[serde(default = "default_sponsor_block_url")]
    pub sponsor_block_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            audio_providers: default_audio_providers(),
            lyrics_providers: default_lyrics_providers(),
            spotify_client_id: None,
            spotify_client_secret: None,
            spotify_api_url: default_spotify_api_url(),
            spotify_auth_url: default_spotify_auth_url(),
            lrclib_url: default_lrclib_url(),
            sponsor_block_url: default_sponsor_block_url(),
        }
    }
}

/// External tool paths (ffmpeg, yt-dlp)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub yt_dlp_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Accept ffmpeg builds older than the supported minimum
    #[serde(default)]
    pub ignore_ffmpeg_version: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            yt_dlp_path: None,
            search_path: true,
            ignore_ffmpeg_version: false,
        }
    }
}

/// Post-processing and reporting behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Remove sponsor segments from downloaded audio
    #[serde(default)]
    pub sponsor_block: bool,

    /// Segment categories to remove (default: ["sponsor", "music_offtopic"])
    #[serde(default = "default_sponsor_block_categories")]
    pub sponsor_block_categories: Vec<String>,

    /// Pre-scan `download_dir` for files belonging to tracks (default: false)
    #[serde(default)]
    pub scan_for_songs: bool,

    /// Log every recorded failure after the batch
    #[serde(default)]
    pub print_errors: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            sponsor_block: false,
            sponsor_block_categories: default_sponsor_block_categories(),
            scan_for_songs: false,
            print_errors: false,
        }
    }
}

/// Files written once per batch
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Archive of completed track URLs (disabled if None)
    #[serde(default)]
    pub archive: Option<PathBuf>,

    /// Results manifest (disabled if None)
    #[serde(default)]
    pub save_file: Option<PathBuf>,

    /// M3U playlist of successful tracks (disabled if None)
    #[serde(default)]
    pub m3u: Option<PathBuf>,

    /// Plain-text failure log (disabled if None)
    #[serde(default)]
    pub error_log: Option<PathBuf>,

    /// Write a tracking file before each batch and remove it on full success
    #[serde(default)]
    pub tracking_files: bool,
}

/// Retry configuration for transient provider failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for the downloader
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings (directories, naming, concurrency)
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Provider selection and credentials
    #[serde(flatten)]
    pub providers: ProviderConfig,

    /// External tool paths
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Post-processing and reporting
    #[serde(flatten)]
    pub processing: ProcessingConfig,

    /// Batch output files
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Retry policy for provider requests
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    ///
    /// Missing keys take their defaults. The loaded config is validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {e}", path.display()),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&contents).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {e}", path.display()),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the downloader cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.threads == 0 {
            return Err(Error::config("threads", "must be at least 1"));
        }
        if self.providers.audio_providers.is_empty() {
            return Err(Error::config(
                "audio_providers",
                "at least one audio provider is required",
            ));
        }
        if !SUPPORTED_FORMATS.contains(&self.download.format.as_str()) {
            return Err(Error::config(
                "format",
                format!(
                    "unsupported format '{}', expected one of {}",
                    self.download.format,
                    SUPPORTED_FORMATS.join(", ")
                ),
            ));
        }
        if self.download.output_template.trim().is_empty() {
            return Err(Error::config("output_template", "must not be empty"));
        }
        Ok(())
    }

    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Temporary directory
    pub fn temp_dir(&self) -> &PathBuf {
        &self.download.temp_dir
    }
}

/// Bitrate policy for transcoding
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Bitrate {
    /// Derive from the source's average bitrate
    #[default]
    Auto,
    /// Omit the bitrate argument entirely
    Disable,
    /// Pass the value through unchanged (e.g. "192k")
    Fixed(String),
}

impl Bitrate {
    /// Resolve the ffmpeg `-b:a` value for a source with the given average bitrate (kbps)
    pub fn resolve(&self, source_abr: Option<f64>) -> Option<String> {
        match self {
            Bitrate::Disable => None,
            Bitrate::Auto => source_abr.map(|abr| format!("{}k", abr.round() as u64)),
            Bitrate::Fixed(value) => Some(value.clone()),
        }
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bitrate::Auto => f.write_str("auto"),
            Bitrate::Disable => f.write_str("disable"),
            Bitrate::Fixed(value) => f.write_str(value),
        }
    }
}

impl std::str::FromStr for Bitrate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "auto" => Ok(Bitrate::Auto),
            "disable" => Ok(Bitrate::Disable),
            value if value.trim_end_matches(['k', 'K']).parse::<u32>().is_ok() => {
                Ok(Bitrate::Fixed(value.to_string()))
            }
            other => Err(Error::config(
                "bitrate",
                format!("invalid bitrate '{other}', expected auto, disable or e.g. 192k"),
            )),
        }
    }
}

impl Serialize for Bitrate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Bitrate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Policy for tracks whose output (or a duplicate of it) already exists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overwrite {
    /// Leave existing files alone and skip the track (default)
    #[default]
    Skip,
    /// Delete duplicates and download again
    Force,
    /// Keep the newest existing file, move it to the canonical path and refresh its tags
    Metadata,
}

impl std::str::FromStr for Overwrite {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skip" => Ok(Overwrite::Skip),
            "force" => Ok(Overwrite::Force),
            "metadata" => Ok(Overwrite::Metadata),
            other => Err(Error::config(
                "overwrite",
                format!("invalid overwrite policy '{other}', expected skip, force or metadata"),
            )),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_template() -> String {
    "{artists} - {title}.{output-ext}".to_string()
}

fn default_format() -> String {
    "mp3".to_string()
}

fn default_threads() -> usize {
    4
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("trackdl")
}

fn default_errors_dir() -> PathBuf {
    PathBuf::from("./errors")
}

fn default_audio_providers() -> Vec<String> {
    vec!["youtube".to_string()]
}

fn default_lyrics_providers() -> Vec<String> {
    vec!["lrclib".to_string()]
}

fn default_spotify_api_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_spotify_auth_url() -> String {
    "https://accounts.spotify.com".to_string()
}

fn default_lrclib_url() -> String {
    "https://lrclib.net".to_string()
}

fn default_sponsor_block_url() -> String {
    "https://sponsor.ajay.app".to_string()
}

fn default_sponsor_block_categories() -> Vec<String> {
    vec!["sponsor".to_string(), "music_offtopic".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (as whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
