//! Parsing of user-supplied references

use crate::tracking::TRACKING_FILE_EXTENSION;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// A user-supplied input that resolves to one or more tracks
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reference {
    /// A single track by provider id
    Track(String),
    /// Every track of an album
    Album(String),
    /// Every track of a playlist
    Playlist(String),
    /// Every track credited to an artist
    Artist(String),
    /// Free-text search; resolves to the best match
    Search(String),
    /// A previously written tracking file
    TrackingFile(PathBuf),
}

impl Reference {
    /// Interpret `input`; anything that is not a recognized link becomes a search
    pub fn parse(input: &str) -> Self {
        let input = input.trim();

        if input.ends_with(&format!(".{TRACKING_FILE_EXTENSION}")) {
            return Reference::TrackingFile(PathBuf::from(input));
        }
        if let Some(rest) = input.strip_prefix("spotify:")
            && let Some(reference) = parse_uri(rest)
        {
            return reference;
        }
        if let Ok(url) = Url::parse(input)
            && url.host_str() == Some("open.spotify.com")
            && let Some(reference) = parse_url(&url)
        {
            return reference;
        }
        Reference::Search(input.to_string())
    }

    fn from_kind(kind: &str, id: &str) -> Option<Self> {
        if id.is_empty() {
            return None;
        }
        let id = id.to_string();
        match kind {
            "track" => Some(Reference::Track(id)),
            "album" => Some(Reference::Album(id)),
            "playlist" => Some(Reference::Playlist(id)),
            "artist" => Some(Reference::Artist(id)),
            _ => None,
        }
    }
}

/// `track:<id>`, `album:<id>`, `user:<name>:playlist:<id>`, ...
fn parse_uri(rest: &str) -> Option<Reference> {
    let parts: Vec<&str> = rest.split(':').collect();
    match parts.as_slice() {
        [kind, id] => Reference::from_kind(kind, id),
        ["user", _, "playlist", id] => Reference::from_kind("playlist", id),
        _ => None,
    }
}

/// `/track/<id>`, `/intl-de/album/<id>`, `/user/<name>/playlist/<id>`, ...
fn parse_url(url: &Url) -> Option<Reference> {
    let mut segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    if segments.first().is_some_and(|s| s.starts_with("intl-")) {
        segments.remove(0);
    }
    match segments.as_slice() {
        [kind, id] => Reference::from_kind(kind, id),
        ["user", _, "playlist", id] => Reference::from_kind("playlist", id),
        _ => None,
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Track(id) => write!(f, "track {id}"),
            Reference::Album(id) => write!(f, "album {id}"),
            Reference::Playlist(id) => write!(f, "playlist {id}"),
            Reference::Artist(id) => write!(f, "artist {id}"),
            Reference::Search(query) => write!(f, "search \"{query}\""),
            Reference::TrackingFile(path) => write!(f, "tracking file {}", path.display()),
        }
    }
}

/// Trim inputs, drop empty ones and remove duplicates, keeping first occurrences
pub fn unique_references<S: AsRef<str>>(inputs: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    inputs
        .iter()
        .map(|input| input.as_ref().trim())
        .filter(|input| !input.is_empty())
        .filter(|input| seen.insert(input.to_string()))
        .map(str::to_string)
        .collect()
}
