//! Named-segment detection (SponsorBlock)

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A time range to cut from the audio
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start in seconds
    pub start: f64,
    /// End in seconds
    pub end: f64,
    /// Segment category ("sponsor", "music_offtopic", ...)
    pub category: String,
}

/// Finds named segments for an audio source
#[async_trait]
pub trait SegmentDetector: Send + Sync {
    /// Segments for the source with unique id `source_id`; empty when none are known
    async fn detect(&self, source_id: &str) -> Result<Vec<Segment>>;

    /// Detector name for logs
    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct ApiSegment {
    segment: (f64, f64),
    category: String,
}

/// Client for the SponsorBlock segment database
pub struct SponsorBlockDetector {
    client: reqwest::Client,
    base_url: String,
    categories: Vec<String>,
    retry: RetryConfig,
}

impl SponsorBlockDetector {
    /// Create a detector for `categories` against `base_url`
    pub fn new(base_url: impl Into<String>, categories: Vec<String>, retry: RetryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            categories,
            retry,
        }
    }
}

#[async_trait]
impl SegmentDetector for SponsorBlockDetector {
    async fn detect(&self, source_id: &str) -> Result<Vec<Segment>> {
        let url = &format!("{}/api/skipSegments", self.base_url);
        let query = &[
            ("videoID", source_id.to_string()),
            ("categories", serde_json::to_string(&self.categories)?),
        ];

        let segments: Vec<ApiSegment> = with_retry(&self.retry, move || async move {
            let response = self.client.get(url).query(query).send().await?;
            let status = response.status();
            // 404 means the video has no submitted segments
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(Vec::new());
            }
            if !status.is_success() {
                return Err(Error::Http {
                    status: status.as_u16(),
                    url: url.clone(),
                });
            }
            Ok(response.json::<Vec<ApiSegment>>().await?)
        })
        .await?;

        Ok(segments
            .into_iter()
            .filter(|s| s.segment.1 > s.segment.0)
            .map(|s| Segment {
                start: s.segment.0,
                end: s.segment.1,
                category: s.category,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "sponsorblock"
    }
}
