//! Audio source resolvers
//!
//! An [`AudioSourceResolver`] finds a downloadable source for a track and fetches its
//! raw audio. The downloader holds an ordered list of resolvers and uses the first
//! match. [`YtDlpResolver`] searches YouTube through the `yt-dlp` binary.

mod traits;
mod ytdlp;

pub use traits::{AudioMeta, AudioSourceResolver};
pub use ytdlp::YtDlpResolver;
