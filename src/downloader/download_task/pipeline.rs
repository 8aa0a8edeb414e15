//! Track pipeline -- audio source lookup, fetch, transcode, post-process and tagging.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::{AudioMeta, AudioSourceResolver};
use crate::error::{DownloadError, Error, Result};
use crate::post_processing::remove_if_exists;
use crate::report::create_parent;
use crate::transcode::ConvertRequest;
use crate::types::{Phase, Track};

use super::context::TrackContext;

/// Pick the resolver and source for `track`.
///
/// A source already recorded on the track is reused when a resolver can fetch it;
/// otherwise resolvers are searched in priority order and the first match wins.
async fn resolve_source(
    ctx: &TrackContext,
    track: &mut Track,
) -> Result<(Arc<dyn AudioSourceResolver>, String)> {
    if let Some(source) = track.audio_source() {
        if let Some(resolver) = ctx.services.audio.iter().find(|r| r.can_fetch(source)) {
            return Ok((Arc::clone(resolver), source.to_string()));
        }
        tracing::debug!(track = %track.url(), %source, "no resolver can fetch recorded source, searching");
    }

    for resolver in &ctx.services.audio {
        match resolver.search(&track.info).await {
            Ok(Some(source)) => {
                tracing::debug!(resolver = resolver.name(), track = %track.url(), %source, "found audio source");
                // A recorded source no resolver can fetch is superseded by the new match
                track.replace_audio_source(source.clone());
                return Ok((Arc::clone(resolver), source));
            }
            Ok(None) => {
                tracing::debug!(resolver = resolver.name(), track = %track.url(), "no match");
            }
            Err(e) => {
                tracing::warn!(resolver = resolver.name(), track = %track.url(), error = %e, "audio search failed");
            }
        }
    }

    Err(DownloadError::NoAudioMatch {
        track: track.display_name(),
    }
    .into())
}

/// Write a transcode diagnostic report into the errors directory.
async fn write_transcode_report(
    errors_dir: &Path,
    source_id: &str,
    track: &Track,
    diagnostics: &BTreeMap<String, String>,
) -> Result<PathBuf> {
    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
    let path = errors_dir.join(format!("transcode_error_{timestamp}_{source_id}.txt"));

    let mut report = format!("### track:\n{}\n\n", track.display_name());
    for (key, value) in diagnostics {
        report.push_str(&format!("### {key}:\n{value}\n\n"));
    }

    create_parent(&path).await?;
    tokio::fs::write(&path, report).await?;
    Ok(path)
}

/// Transcode `audio` into `output`, persisting diagnostics on failure.
async fn convert(ctx: &TrackContext, track: &Track, audio: &AudioMeta, output: &Path) -> Result<()> {
    let download = &ctx.config.download;
    let request = ConvertRequest {
        input: audio.path.clone(),
        output: output.to_path_buf(),
        format: download.format.clone(),
        bitrate: download.bitrate.resolve(audio.average_bitrate),
        extra_args: download.ffmpeg_args.clone(),
        duration: track.info.duration,
    };

    create_parent(output).await?;
    let outcome = ctx
        .services
        .transcoder
        .convert(&request, ctx.item.callback())
        .await?;
    if outcome.success {
        return Ok(());
    }

    let diagnostics = outcome.diagnostics.unwrap_or_default();
    let report = write_transcode_report(&download.errors_dir, &audio.id, track, &diagnostics).await?;
    if let Err(e) = remove_if_exists(output).await {
        tracing::warn!(path = ?output, error = %e, "failed to remove partial output");
    }
    if let Err(e) = remove_if_exists(&audio.path).await {
        tracing::warn!(path = ?audio.path, error = %e, "failed to remove temp file");
    }
    Err(DownloadError::TranscodeFailed {
        track: track.display_name(),
        report,
    }
    .into())
}

/// Find a source, fetch it, convert it, drop the temp file and post-process the output.
pub(super) async fn download_audio(ctx: &TrackContext, track: &mut Track, output: &Path) -> Result<()> {
    let (resolver, source) = resolve_source(ctx, track).await?;

    ctx.item.notify_phase(Phase::Downloading);
    let audio = resolver
        .fetch(&source, &ctx.config.download.temp_dir, ctx.item.callback())
        .await
        .map_err(|e| match e {
            Error::Download(_) => e,
            other => DownloadError::FetchFailed {
                track: track.display_name(),
                reason: other.to_string(),
            }
            .into(),
        })?;
    tracing::debug!(track = %track.url(), path = ?audio.path, "fetched raw audio");

    ctx.item.notify_phase(Phase::Converting);
    convert(ctx, track, &audio, output).await?;

    // Temp files are named after the source id; failing to remove one means
    // another track is likely using the same file.
    remove_if_exists(&audio.path)
        .await
        .map_err(|e| DownloadError::TempFileCollision {
            path: audio.path.clone(),
            reason: e.to_string(),
        })?;

    ctx.services.post_processor.run(output, &audio).await?;
    Ok(())
}

/// Embed tags and register the file in the known-files index.
pub(super) async fn embed_and_register(ctx: &TrackContext, track: &Track, output: &Path) -> Result<()> {
    ctx.item.notify_phase(Phase::Embedding);
    ctx.services.embedder.embed(output, track).await?;
    ctx.known_files
        .register(track.url(), output.to_path_buf())
        .await;
    Ok(())
}
