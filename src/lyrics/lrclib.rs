//! LRCLIB lyrics provider

use super::LyricsProvider;
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LrclibRecord {
    plain_lyrics: Option<String>,
    #[serde(default)]
    instrumental: bool,
}

/// Client for the public LRCLIB search API
pub struct LrclibProvider {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl LrclibProvider {
    /// Create a provider against `base_url` (e.g. `https://lrclib.net`)
    pub fn new(base_url: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        }
    }
}

#[async_trait]
impl LyricsProvider for LrclibProvider {
    async fn get_lyrics(&self, title: &str, artists: &[String]) -> Result<Option<String>> {
        let url = &format!("{}/api/search", self.base_url);
        let artist = artists.first().cloned().unwrap_or_default();
        let query = &[("track_name", title.to_string()), ("artist_name", artist)];

        let records: Vec<LrclibRecord> = with_retry(&self.retry, move || async move {
            let response = self.client.get(url).query(query).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::Http {
                    status: status.as_u16(),
                    url: url.clone(),
                });
            }
            Ok(response.json::<Vec<LrclibRecord>>().await?)
        })
        .await?;

        Ok(records
            .into_iter()
            .filter(|record| !record.instrumental)
            .filter_map(|record| record.plain_lyrics)
            .find(|lyrics| !lyrics.trim().is_empty()))
    }

    fn name(&self) -> &'static str {
        "lrclib"
    }
}
