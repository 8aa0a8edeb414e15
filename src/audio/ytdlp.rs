//! yt-dlp backed audio source resolver

use super::traits::{AudioMeta, AudioSourceResolver};
use crate::error::{Error, Result};
use crate::progress::ProgressCallback;
use crate::types::TrackInfo;
use crate::utils::{normalize_name, path_to_str};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Number of search results compared against the track
const SEARCH_RESULTS: usize = 5;
/// Candidates further than this from the track duration are ignored
const MAX_DURATION_DELTA: f64 = 30.0;
/// Share of the track's words that must appear in a candidate
const MIN_TOKEN_OVERLAP: f64 = 0.5;
/// Marks the line yt-dlp prints after moving the finished file into place
const PRINT_MARKER: &str = "trackdl-done";

#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: String,
    #[serde(default)]
    title: String,
    duration: Option<f64>,
    channel: Option<String>,
    uploader: Option<String>,
}

/// yt-dlp resolver searching YouTube
///
/// # Examples
///
/// ```no_run
/// use trackdl::audio::{AudioSourceResolver, YtDlpResolver};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let resolver = YtDlpResolver::from_path()?.expect("yt-dlp not found in PATH");
/// assert_eq!(resolver.name(), "youtube");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct YtDlpResolver {
    binary_path: PathBuf,
    progress_pattern: Regex,
}

impl YtDlpResolver {
    /// Create a resolver with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Result<Self> {
        let progress_pattern = Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%")
            .map_err(|e| Error::Setup(format!("invalid progress pattern: {e}")))?;
        Ok(Self {
            binary_path,
            progress_pattern,
        })
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Result<Option<Self>> {
        match which::which("yt-dlp") {
            Ok(path) => Self::new(path).map(Some),
            Err(_) => Ok(None),
        }
    }

    fn parse_progress(&self, line: &str) -> Option<f64> {
        self.progress_pattern
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

/// Search query sent to YouTube for a track
pub(crate) fn search_query(track: &TrackInfo) -> String {
    format!("{} - {}", track.artists.join(", "), track.title)
}

fn tokens(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(normalize_name)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Score a candidate against the track; None if it is not an acceptable match
fn score_candidate(track: &TrackInfo, entry: &SearchEntry) -> Option<f64> {
    let delta = match entry.duration {
        Some(duration) if track.duration > 0.0 => (duration - track.duration).abs(),
        _ => MAX_DURATION_DELTA / 2.0,
    };
    if delta > MAX_DURATION_DELTA {
        return None;
    }

    let wanted = tokens(&format!("{} {}", track.title, track.artists.join(" ")));
    if wanted.is_empty() {
        return None;
    }
    let haystack = tokens(&format!(
        "{} {} {}",
        entry.title,
        entry.channel.as_deref().unwrap_or_default(),
        entry.uploader.as_deref().unwrap_or_default()
    ));
    let overlap = wanted.intersection(&haystack).count() as f64 / wanted.len() as f64;
    if overlap < MIN_TOKEN_OVERLAP {
        return None;
    }

    Some(overlap * 100.0 - delta)
}

/// Pick the best search entry for a track
fn best_match(track: &TrackInfo, entries: &[SearchEntry]) -> Option<String> {
    entries
        .iter()
        .filter_map(|entry| score_candidate(track, entry).map(|score| (score, entry)))
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, entry)| format!("https://www.youtube.com/watch?v={}", entry.id))
}

fn fetch_args(source: &str, temp_dir: &Path) -> Result<Vec<String>> {
    let template = temp_dir.join("%(id)s.%(ext)s");
    Ok(vec![
        "-f".into(),
        "bestaudio".into(),
        "--no-playlist".into(),
        "--newline".into(),
        "--progress".into(),
        "--no-simulate".into(),
        "--print".into(),
        format!("after_move:{PRINT_MARKER}\t%(id)s\t%(ext)s\t%(abr)s\t%(filepath)s"),
        "-o".into(),
        path_to_str(&template)?.to_string(),
        source.to_string(),
    ])
}

fn parse_done_line(line: &str) -> Option<AudioMeta> {
    let mut fields = line.split('\t');
    if fields.next()? != PRINT_MARKER {
        return None;
    }
    let id = fields.next()?.to_string();
    let ext = fields.next()?.to_string();
    let average_bitrate = fields.next()?.parse().ok();
    let path = PathBuf::from(fields.next()?);
    Some(AudioMeta {
        id,
        ext,
        average_bitrate,
        path,
    })
}

#[async_trait]
impl AudioSourceResolver for YtDlpResolver {
    async fn search(&self, track: &TrackInfo) -> Result<Option<String>> {
        let query = format!("ytsearch{SEARCH_RESULTS}:{}", search_query(track));
        let output = Command::new(&self.binary_path)
            .args(["--dump-json", "--flat-playlist", "--no-warnings"])
            .arg(&query)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to execute yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ExternalTool(format!(
                "yt-dlp search failed: {}",
                stderr.trim()
            )));
        }

        let entries: Vec<SearchEntry> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        tracing::debug!(query = %query, candidates = entries.len(), "youtube search");
        Ok(best_match(track, &entries))
    }

    async fn fetch(
        &self,
        source: &str,
        temp_dir: &Path,
        progress: ProgressCallback,
    ) -> Result<AudioMeta> {
        let mut child = Command::new(&self.binary_path)
            .args(fetch_args(source, temp_dir)?)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("failed to execute yt-dlp: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp stderr unavailable".into()))?;

        let read_stdout = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut done = None;
            while let Some(line) = lines.next_line().await? {
                if let Some(meta) = parse_done_line(&line) {
                    done = Some(meta);
                } else if let Some(percent) = self.parse_progress(&line) {
                    progress(percent);
                }
            }
            Ok::<_, std::io::Error>(done)
        };
        let read_stderr = async {
            let mut lines = BufReader::new(stderr).lines();
            let mut last_error = String::new();
            while let Some(line) = lines.next_line().await? {
                if let Some(percent) = self.parse_progress(&line) {
                    progress(percent);
                } else if !line.trim().is_empty() {
                    last_error = line;
                }
            }
            Ok::<_, std::io::Error>(last_error)
        };

        let (done, last_error) = tokio::try_join!(read_stdout, read_stderr)?;
        let status = child.wait().await?;

        match done {
            Some(meta) if status.success() => Ok(meta),
            _ => Err(Error::ExternalTool(format!(
                "yt-dlp exited with {status}: {}",
                last_error.trim()
            ))),
        }
    }

    fn can_fetch(&self, source: &str) -> bool {
        source.contains("youtube.com/") || source.contains("youtu.be/")
    }

    fn name(&self) -> &'static str {
        "youtube"
    }
}
