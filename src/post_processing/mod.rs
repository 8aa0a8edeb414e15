//! Post-processing of transcoded files
//!
//! When segment removal is enabled, the detector is asked for named segments of the
//! audio source. If any are found the transcoder cuts them out, and the intermediate
//! files it leaves behind are deleted.
//!
//! Detection failures are logged and skip the step; a failed cut fails the track.

use crate::audio::AudioMeta;
use crate::error::Result;
use crate::transcode::Transcoder;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod cleanup;
mod segments;

pub(crate) use cleanup::{remove_if_exists, remove_intermediates};
pub use segments::{Segment, SegmentDetector, SponsorBlockDetector};

/// Post-processing executor
pub struct PostProcessor {
    transcoder: Arc<dyn Transcoder>,
    detector: Option<Arc<dyn SegmentDetector>>,
}

impl PostProcessor {
    /// Create an executor; pass `None` as detector to disable segment removal
    pub fn new(transcoder: Arc<dyn Transcoder>, detector: Option<Arc<dyn SegmentDetector>>) -> Self {
        Self {
            transcoder,
            detector,
        }
    }

    /// Whether segment removal will run
    pub fn is_enabled(&self) -> bool {
        self.detector.is_some()
    }

    /// Remove named segments from `file`, which was encoded from `audio`
    ///
    /// Returns the number of segments removed.
    pub async fn run(&self, file: &Path, audio: &AudioMeta) -> Result<usize> {
        let Some(detector) = &self.detector else {
            return Ok(0);
        };

        let segments = match detector.detect(&audio.id).await {
            Ok(segments) => segments,
            Err(e) => {
                warn!(
                    detector = detector.name(),
                    source = %audio.id,
                    error = %e,
                    "segment detection failed, keeping audio uncut"
                );
                return Ok(0);
            }
        };
        if segments.is_empty() {
            debug!(source = %audio.id, "no segments to remove");
            return Ok(0);
        }

        let intermediates = self.transcoder.remove_segments(file, &segments).await?;
        remove_intermediates(&intermediates).await;

        info!(path = ?file, segments = segments.len(), "removed segments");
        Ok(segments.len())
    }
}
