//! Lyrics providers
//!
//! Providers are consulted in configured order and the first non-empty result is used.
//! Missing lyrics are never an error for the track.

mod lrclib;

pub use lrclib::LrclibProvider;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A source of song lyrics
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Lyrics for the song, or None when the provider has nothing
    async fn get_lyrics(&self, title: &str, artists: &[String]) -> Result<Option<String>>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

/// Ask each provider in turn; provider errors are logged and treated as a miss
pub async fn first_lyrics(
    providers: &[Arc<dyn LyricsProvider>],
    title: &str,
    artists: &[String],
) -> Option<String> {
    for provider in providers {
        match provider.get_lyrics(title, artists).await {
            Ok(Some(lyrics)) if !lyrics.trim().is_empty() => return Some(lyrics),
            Ok(_) => {
                tracing::debug!(provider = provider.name(), title, "no lyrics");
            }
            Err(e) => {
                tracing::debug!(provider = provider.name(), title, error = %e, "lyrics lookup failed");
            }
        }
    }
    None
}
