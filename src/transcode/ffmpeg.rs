//! ffmpeg backed transcoder

use super::traits::{ConvertRequest, TranscodeOutcome, Transcoder};
use crate::config::ToolsConfig;
use crate::error::{Error, PostProcessError, Result};
use crate::post_processing::Segment;
use crate::progress::ProgressCallback;
use crate::utils::path_to_str;
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Oldest ffmpeg major version known to handle every supported codec
const MIN_MAJOR_VERSION: u32 = 4;

/// Encoder used for each output format
pub fn codec_for(format: &str) -> Option<&'static str> {
    match format {
        "mp3" => Some("libmp3lame"),
        "flac" => Some("flac"),
        "ogg" => Some("libvorbis"),
        "opus" => Some("libopus"),
        "m4a" => Some("aac"),
        "wav" => Some("pcm_s16le"),
        _ => None,
    }
}

/// Parse `ffmpeg -version` output into (major, minor)
///
/// Returns None for git snapshot builds, which carry no release number.
pub fn parse_version(output: &str) -> Option<(u32, u32)> {
    let pattern = Regex::new(r"ffmpeg version [^\d\s]*(\d+)\.(\d+)").ok()?;
    let caps = pattern.captures(output)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    Some((major, minor))
}

/// Arguments for one conversion
pub fn build_convert_args(request: &ConvertRequest) -> Result<Vec<String>> {
    let codec = codec_for(&request.format).ok_or_else(|| Error::Config {
        message: format!("unsupported format '{}'", request.format),
        key: Some("format".into()),
    })?;

    let mut args: Vec<String> = vec![
        "-nostdin".into(),
        "-hide_banner".into(),
        "-y".into(),
        "-i".into(),
        path_to_str(&request.input)?.to_string(),
        "-vn".into(),
        "-c:a".into(),
        codec.into(),
    ];
    if let Some(bitrate) = &request.bitrate {
        args.push("-b:a".into());
        args.push(bitrate.clone());
    }
    args.extend(request.extra_args.iter().cloned());
    args.extend([
        "-progress".into(),
        "pipe:1".into(),
        "-nostats".into(),
        path_to_str(&request.output)?.to_string(),
    ]);
    Ok(args)
}

/// `aselect` filter dropping every segment
pub fn segment_filter(segments: &[Segment]) -> String {
    let ranges: Vec<String> = segments
        .iter()
        .map(|s| format!("between(t,{:.3},{:.3})", s.start, s.end))
        .collect();
    format!("aselect='not({})',asetpts=N/SR/TB", ranges.join("+"))
}

/// Percent complete from an `out_time_us=` / `out_time_ms=` progress line
fn parse_progress_line(line: &str, duration: f64) -> Option<f64> {
    let value = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))?;
    let micros: f64 = value.trim().parse().ok()?;
    if duration <= 0.0 {
        return None;
    }
    Some((micros / 1_000_000.0 / duration * 100.0).clamp(0.0, 100.0))
}

fn sibling(file: &Path, tag: &str) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = file
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    file.with_file_name(format!("{stem}.{tag}{ext}"))
}

/// ffmpeg transcoder
#[derive(Debug)]
pub struct FfmpegTranscoder {
    binary_path: PathBuf,
    ignore_version: bool,
}

impl FfmpegTranscoder {
    /// Create a transcoder with an explicit binary path
    pub fn new(binary_path: PathBuf, ignore_version: bool) -> Self {
        Self {
            binary_path,
            ignore_version,
        }
    }

    /// Attempt to find ffmpeg in PATH
    pub fn from_path(ignore_version: bool) -> Option<Self> {
        which::which("ffmpeg")
            .ok()
            .map(|path| Self::new(path, ignore_version))
    }

    /// Use the configured path, falling back to PATH discovery when allowed
    pub fn from_config(tools: &ToolsConfig) -> Result<Self> {
        if let Some(path) = &tools.ffmpeg_path {
            return Ok(Self::new(path.clone(), tools.ignore_ffmpeg_version));
        }
        if tools.search_path
            && let Some(found) = Self::from_path(tools.ignore_ffmpeg_version)
        {
            return Ok(found);
        }
        Err(Error::Setup(
            "ffmpeg is not installed; install it or set ffmpeg_path".to_string(),
        ))
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn check_available(&self) -> Result<()> {
        let output = Command::new(&self.binary_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| {
                Error::Setup(format!(
                    "failed to run {}: {e}",
                    self.binary_path.display()
                ))
            })?;
        if !output.status.success() {
            return Err(Error::Setup(format!(
                "{} -version exited with {}",
                self.binary_path.display(),
                output.status
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        match parse_version(&text) {
            Some((major, minor)) if major < MIN_MAJOR_VERSION && !self.ignore_version => {
                Err(Error::Setup(format!(
                    "ffmpeg {major}.{minor} is too old, version {MIN_MAJOR_VERSION} or newer is required"
                )))
            }
            Some((major, minor)) => {
                tracing::debug!(major, minor, "found ffmpeg");
                Ok(())
            }
            None => {
                tracing::debug!("ffmpeg version could not be determined, assuming a snapshot build");
                Ok(())
            }
        }
    }

    async fn convert(
        &self,
        request: &ConvertRequest,
        progress: ProgressCallback,
    ) -> Result<TranscodeOutcome> {
        let args = build_convert_args(request)?;
        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("failed to execute ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("ffmpeg stdout unavailable".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::ExternalTool("ffmpeg stderr unavailable".into()))?;

        let read_progress = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(percent) = parse_progress_line(&line, request.duration) {
                    progress(percent);
                }
            }
            Ok::<_, std::io::Error>(())
        };
        let read_stderr = async {
            let mut buf = String::new();
            stderr.read_to_string(&mut buf).await?;
            Ok::<_, std::io::Error>(buf)
        };

        let ((), stderr_text) = tokio::try_join!(read_progress, read_stderr)?;
        let status = child.wait().await?;

        if status.success() {
            progress(100.0);
            return Ok(TranscodeOutcome::ok());
        }

        let mut diagnostics = BTreeMap::new();
        diagnostics.insert(
            "return_code".to_string(),
            status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "terminated by signal".to_string()),
        );
        diagnostics.insert("arguments".to_string(), args.join(" "));
        diagnostics.insert("stderr".to_string(), stderr_text);
        Ok(TranscodeOutcome::failed(diagnostics))
    }

    async fn remove_segments(&self, file: &Path, segments: &[Segment]) -> Result<Vec<PathBuf>> {
        if segments.is_empty() {
            return Ok(Vec::new());
        }

        let cut = sibling(file, "cut");
        let uncut = sibling(file, "uncut");
        let codec = file
            .extension()
            .and_then(|e| e.to_str())
            .and_then(codec_for)
            .unwrap_or("copy");
        let filter = segment_filter(segments);

        let output = Command::new(&self.binary_path)
            .args(["-nostdin", "-hide_banner", "-y", "-i"])
            .arg(file)
            .args(["-af", filter.as_str(), "-c:a", codec])
            .arg(&cut)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to execute ffmpeg: {e}")))?;

        if !output.status.success() {
            if let Err(e) = tokio::fs::remove_file(&cut).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = ?cut, error = %e, "failed to remove partial output");
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PostProcessError::SegmentRemoval {
                path: file.to_path_buf(),
                reason: stderr.lines().last().unwrap_or("ffmpeg failed").to_string(),
            }
            .into());
        }

        tokio::fs::rename(file, &uncut).await?;
        tokio::fs::rename(&cut, file).await?;
        tracing::debug!(path = ?file, segments = segments.len(), "removed segments");
        Ok(vec![uncut])
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
