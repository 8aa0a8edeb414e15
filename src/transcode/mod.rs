//! Audio transcoding
//!
//! The [`Transcoder`] trait converts raw audio into the configured output format and
//! cuts unwanted segments. [`FfmpegTranscoder`] drives an external `ffmpeg` binary.

mod ffmpeg;
mod traits;

pub use ffmpeg::{FfmpegTranscoder, build_convert_args, codec_for, parse_version, segment_filter};
pub use traits::{ConvertRequest, TranscodeOutcome, Transcoder};
