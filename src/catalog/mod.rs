//! Track metadata providers
//!
//! The [`MetadataProvider`] trait is the seam between the resolver pipeline and a
//! catalog service. [`SpotifyProvider`] talks to the Spotify Web API.

mod spotify;
mod traits;

pub use spotify::SpotifyProvider;
pub use traits::{AlbumSummary, MetadataProvider, Page};
