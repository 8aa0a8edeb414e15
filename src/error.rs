//! Error types for trackdl
//!
//! This module provides the error taxonomy used across the library:
//! - Setup errors that abort a batch before anything is scheduled
//! - Per-track download errors (resolution, fetch, transcode, cleanup, tagging, encoding)
//! - Post-processing errors (segment removal, intermediate cleanup)
//! - Provider, network and I/O errors raised by collaborators
//!
//! Per-track errors are caught at the unit-of-work boundary by the downloader and
//! recorded in the [`ErrorReport`](crate::report::ErrorReport); they never abort a batch.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for trackdl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for trackdl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "threads")
        key: Option<String>,
    },

    /// Fatal setup failure (no audio providers, transcoder missing or too old)
    #[error("setup error: {0}")]
    Setup(String),

    /// Per-track download failure
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Post-processing failure (segment removal, intermediate cleanup)
    #[error(transparent)]
    PostProcess(#[from] PostProcessError),

    /// A metadata, lyrics or segment provider returned an error
    #[error("{provider} error: {message}")]
    Provider {
        /// Name of the provider that failed
        provider: &'static str,
        /// Provider-specific failure description
        message: String,
    },

    /// HTTP request completed with a non-success status
    #[error("HTTP {status} from {url}")]
    Http {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A reference could not be interpreted
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Requested item does not exist at the provider
    #[error("not found: {0}")]
    NotFound(String),

    /// External tool execution failed (ffmpeg, yt-dlp)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// A write-once field on a track was assigned a second, different value
    #[error("{field} is already set on this track")]
    AlreadySet {
        /// Name of the field
        field: &'static str,
    },

    /// The batch was interrupted before all tracks finished
    #[error("batch cancelled")]
    Cancelled,
}

/// Per-track download errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// No configured audio source resolver found a match
    #[error("no audio source found for {track}")]
    NoAudioMatch {
        /// Display name of the track
        track: String,
    },

    /// Retrieving raw audio from the source failed
    #[error("failed to fetch audio for {track}: {reason}")]
    FetchFailed {
        /// Display name of the track
        track: String,
        /// The reason the fetch failed
        reason: String,
    },

    /// Transcoding failed; diagnostics were written to `report`
    #[error("failed to convert {track}, see {}", report.display())]
    TranscodeFailed {
        /// Display name of the track
        track: String,
        /// Diagnostic report written to the errors directory
        report: PathBuf,
    },

    /// The temporary raw file could not be removed (likely shared with another track)
    #[error("could not remove temp file {}: {reason}, possible duplicate track", path.display())]
    TempFileCollision {
        /// The temporary file path
        path: PathBuf,
        /// The underlying removal failure
        reason: String,
    },

    /// Writing tags into the encoded file failed
    #[error("failed to embed metadata into {}: {reason}", path.display())]
    MetadataEmbed {
        /// The file that could not be tagged
        path: PathBuf,
        /// The reason embedding failed
        reason: String,
    },

    /// Text could not be represented in the platform encoding
    #[error("{reason} ({hint})")]
    Encoding {
        /// What could not be encoded
        reason: String,
        /// Remediation hint for the user
        hint: &'static str,
    },
}

/// Post-processing errors
#[derive(Debug, Error)]
pub enum PostProcessError {
    /// Segment removal filter failed on the transcoded file
    #[error("failed to remove segments from {}: {reason}", path.display())]
    SegmentRemoval {
        /// The file being filtered
        path: PathBuf,
        /// The reason the filter failed
        reason: String,
    },

    /// Cleanup failed (non-fatal, usually logged as warning)
    #[error("cleanup failed for {}: {reason}", path.display())]
    CleanupFailed {
        /// The file that could not be removed
        path: PathBuf,
        /// The reason cleanup failed
        reason: String,
    },
}

/// Remediation hint attached to [`DownloadError::Encoding`]
pub const ENCODING_HINT: &str =
    "use a UTF-8 locale (e.g. LANG=C.UTF-8) or enable `restrict` to keep file names ASCII";

impl Error {
    /// Short, stable name for the error category, used in failure records and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config { .. } => "ConfigError",
            Error::Setup(_) => "SetupError",
            Error::Download(e) => match e {
                DownloadError::NoAudioMatch { .. } => "ResolutionError",
                DownloadError::FetchFailed { .. } => "FetchError",
                DownloadError::TranscodeFailed { .. } => "TranscodeError",
                DownloadError::TempFileCollision { .. } => "CleanupError",
                DownloadError::MetadataEmbed { .. } => "MetadataEmbedError",
                DownloadError::Encoding { .. } => "EncodingError",
            },
            Error::PostProcess(e) => match e {
                PostProcessError::SegmentRemoval { .. } => "SegmentRemovalError",
                PostProcessError::CleanupFailed { .. } => "CleanupWarning",
            },
            Error::Provider { .. } => "ProviderError",
            Error::Http { .. } => "HttpError",
            Error::Network(_) => "NetworkError",
            Error::Io(_) => "IoError",
            Error::Serialization(_) => "SerializationError",
            Error::InvalidReference(_) => "InvalidReference",
            Error::NotFound(_) => "NotFound",
            Error::ExternalTool(_) => "ExternalToolError",
            Error::AlreadySet { .. } => "AlreadySet",
            Error::Cancelled => "Cancelled",
        }
    }

    /// Whether this error must abort before any scheduling happens
    pub fn is_setup(&self) -> bool {
        matches!(self, Error::Setup(_) | Error::Config { .. })
    }

    /// Shorthand for a configuration error on a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
