//! Utility functions for output naming and duration handling

use crate::error::{DownloadError, ENCODING_HINT, Result};
use crate::types::Track;
use std::path::{Path, PathBuf};

/// Build the canonical output path for a track
///
/// Template variables: `{title}`, `{artists}`, `{artist}`, `{album}`, `{album-artist}`,
/// `{genre}`, `{disc-number}`, `{track-number}`, `{year}`, `{output-ext}`. Each substituted
/// value is sanitized so it cannot introduce path separators; separators written in the
/// template itself create subdirectories.
///
/// # Examples
///
/// ```
/// use trackdl::types::{Track, TrackInfo};
/// use trackdl::utils::build_output_path;
/// use std::path::Path;
///
/// let track = Track::new(TrackInfo {
///     title: "Song".into(),
///     artists: vec!["A".into(), "B".into()],
///     ..Default::default()
/// });
/// let path = build_output_path(Path::new("/music"), "{artists} - {title}.{output-ext}", &track, "mp3", false);
/// assert_eq!(path, Path::new("/music/A, B - Song.mp3"));
/// ```
pub fn build_output_path(
    download_dir: &Path,
    template: &str,
    track: &Track,
    ext: &str,
    restrict: bool,
) -> PathBuf {
    let info = &track.info;
    let year = info.year().map(|y| y.to_string()).unwrap_or_default();
    let values: [(&str, String); 10] = [
        ("{title}", info.title.clone()),
        ("{artists}", info.artists.join(", ")),
        ("{artist}", info.primary_artist().unwrap_or_default().to_string()),
        ("{album}", info.album.clone()),
        ("{album-artist}", info.album_artist.clone()),
        ("{genre}", info.genres.first().cloned().unwrap_or_default()),
        ("{disc-number}", info.disc_number.to_string()),
        ("{track-number}", format!("{:02}", info.track_number)),
        ("{year}", year),
        ("{output-ext}", ext.to_string()),
    ];

    // Single pass over the template so substituted values are never expanded again
    let mut relative = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        relative.push_str(&rest[..start]);
        let tail = &rest[start..];
        let known = tail.find('}').and_then(|end| {
            values
                .iter()
                .find(|(key, _)| *key == &tail[..=end])
                .map(|(_, value)| (end, value))
        });
        match known {
            Some((end, value)) => {
                relative.push_str(&sanitize_component(value, restrict));
                rest = &tail[end + 1..];
            }
            None => {
                relative.push('{');
                rest = &tail[1..];
            }
        }
    }
    relative.push_str(rest);

    let mut path = download_dir.to_path_buf();
    for component in relative.split(['/', '\\']).filter(|c| !c.is_empty()) {
        path.push(component.trim());
    }
    path
}

/// Make a single template value safe for use inside a file name
pub fn sanitize_component(value: &str, restrict: bool) -> String {
    let without_separators = value.replace(['/', '\\'], "-");
    let clean = sanitize_filename::sanitize(without_separators.trim());
    if restrict {
        restrict_ascii(&clean)
    } else {
        clean
    }
}

/// Reduce a name to `[A-Za-z0-9._-]`, turning whitespace into `_`
pub fn restrict_ascii(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        let mapped = match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        };
        if let Some(c) = mapped {
            if c == '_' && out.ends_with('_') {
                continue;
            }
            out.push(c);
        }
    }
    out.trim_matches('_').to_string()
}

/// Lowercase alphanumerics only; used to compare album and track names
pub fn normalize_name(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Format seconds as `S`, `M:SS` or `H:MM:SS`
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else if minutes > 0 {
        format!("{minutes}:{secs:02}")
    } else {
        secs.to_string()
    }
}

/// Parse `H:MM:SS`, `M:SS` or `S` into seconds
pub fn parse_duration(value: &str) -> Option<u64> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    parts.iter().try_fold(0u64, |total, part| {
        let n: u64 = part.trim().parse().ok()?;
        Some(total * 60 + n)
    })
}

/// Convert a path to UTF-8, failing with an actionable encoding error
pub(crate) fn path_to_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        DownloadError::Encoding {
            reason: format!("path {} is not valid UTF-8", path.display()),
            hint: ENCODING_HINT,
        }
        .into()
    })
}
