//! M3U playlist export

use crate::error::Result;
use crate::report::create_parent;
use crate::types::DownloadOutcome;
use std::fmt::Write as _;
use std::path::Path;

/// Render an extended M3U playlist for the successful outcomes, in order
///
/// Outputs inside the playlist's directory are written relative to it.
pub fn render_m3u(playlist_dir: Option<&Path>, outcomes: &[DownloadOutcome]) -> String {
    let mut out = String::from("#EXTM3U\n");
    for outcome in outcomes {
        let Some(path) = outcome.path.as_deref() else {
            continue;
        };
        let entry = playlist_dir
            .and_then(|dir| path.strip_prefix(dir).ok())
            .unwrap_or(path);
        let info = &outcome.track.info;
        // write! to a String cannot fail
        let _ = writeln!(
            out,
            "#EXTINF:{},{}",
            info.duration.round() as i64,
            outcome.track.display_name()
        );
        let _ = writeln!(out, "{}", entry.display());
    }
    out
}

/// Write the playlist to `path`, returning the number of entries
pub async fn write_m3u(path: &Path, outcomes: &[DownloadOutcome]) -> Result<usize> {
    let playlist_dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let contents = render_m3u(playlist_dir, outcomes);
    create_parent(path).await?;
    tokio::fs::write(path, contents).await?;

    let entries = outcomes.iter().filter(|o| o.is_success()).count();
    tracing::info!(path = ?path, entries, "wrote playlist");
    Ok(entries)
}
