//! Traits and types for audio transcoding

use crate::error::Result;
use crate::post_processing::Segment;
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single conversion job
#[derive(Clone, Debug, PartialEq)]
pub struct ConvertRequest {
    /// Raw audio file
    pub input: PathBuf,
    /// Encoded output file
    pub output: PathBuf,
    /// Target format ("mp3", "flac", ...)
    pub format: String,
    /// Bitrate argument, or None to let the encoder choose
    pub bitrate: Option<String>,
    /// Extra arguments passed to the encoder verbatim
    pub extra_args: Vec<String>,
    /// Expected duration in seconds, used to compute progress
    pub duration: f64,
}

/// Result of a conversion
#[must_use]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TranscodeOutcome {
    /// Whether the output was produced
    pub success: bool,
    /// Diagnostic fields on failure (return code, arguments, stderr)
    pub diagnostics: Option<BTreeMap<String, String>>,
}

impl TranscodeOutcome {
    /// A successful conversion
    pub fn ok() -> Self {
        Self {
            success: true,
            diagnostics: None,
        }
    }

    /// A failed conversion with diagnostics
    pub fn failed(diagnostics: BTreeMap<String, String>) -> Self {
        Self {
            success: false,
            diagnostics: Some(diagnostics),
        }
    }
}

/// Audio encoder
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Verify the encoder can run; failures here are setup errors
    async fn check_available(&self) -> Result<()>;

    /// Convert `request.input` into `request.output`
    ///
    /// A conversion that runs but fails returns `Ok` with `success == false`;
    /// `Err` is reserved for failing to run the encoder at all.
    async fn convert(&self, request: &ConvertRequest, progress: ProgressCallback)
    -> Result<TranscodeOutcome>;

    /// Cut `segments` out of `file` in place, returning intermediate files to delete
    async fn remove_segments(&self, file: &std::path::Path, segments: &[Segment])
    -> Result<Vec<PathBuf>>;

    /// Transcoder name for logs
    fn name(&self) -> &'static str;
}
