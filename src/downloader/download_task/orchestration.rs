//! Track task orchestration -- top-level lifecycle for a single track.

use std::path::PathBuf;

use crate::config::Overwrite;
use crate::error::Result;
use crate::lyrics::first_lyrics;
use crate::types::{DownloadOutcome, Phase, Track};
use crate::utils::build_output_path;

use super::context::TrackContext;
use super::pipeline::{download_audio, embed_and_register};
use super::reconcile::{duplicate_candidates, reconcile_existing, remove_duplicates};

/// Run one track through the pipeline.
///
/// Never fails: errors are recorded in the error report, the item is marked
/// errored and the outcome carries no path.
pub(crate) async fn run_track(ctx: TrackContext, mut track: Track) -> DownloadOutcome {
    match process(&ctx, &mut track).await {
        Ok(path) => DownloadOutcome { track, path },
        Err(e) => {
            ctx.fail(&track, &e);
            DownloadOutcome { track, path: None }
        }
    }
}

/// Phases:
/// 1. Re-resolve placeholder metadata
/// 2. Resolve lyrics
/// 3. Compute the output path and look for existing files
/// 4. Apply the overwrite policy
/// 5. Download, convert and post-process
/// 6. Embed metadata and register the output
async fn process(ctx: &TrackContext, track: &mut Track) -> Result<Option<PathBuf>> {
    ctx.item.notify_phase(Phase::Searching);

    // Phase 1: placeholders from tracking files only know their URL
    if track.is_placeholder() {
        ctx.services.resolver.refresh(track).await?;
        ctx.item.rename(track.display_name());
    }

    // Phase 2: lyrics are optional
    if track.lyrics().is_none()
        && let Some(lyrics) =
            first_lyrics(&ctx.services.lyrics, &track.info.title, &track.info.artists).await
    {
        track.set_lyrics(lyrics)?;
    }

    // Phase 3: canonical path and duplicates that still exist elsewhere
    let download = &ctx.config.download;
    let output = build_output_path(
        &download.download_dir,
        &download.output_template,
        track,
        &download.format,
        download.restrict,
    );
    let duplicates = duplicate_candidates(&ctx.known_files, track.url(), &output).await;
    let output_exists = tokio::fs::try_exists(&output).await.unwrap_or(false);

    // Phase 4: overwrite policy
    if output_exists || !duplicates.is_empty() {
        match download.overwrite {
            Overwrite::Skip => {
                tracing::info!(
                    track = %track.url(),
                    path = ?output,
                    duplicates = duplicates.len(),
                    "{} already exists, skipping",
                    track.display_name()
                );
                ctx.item.notify_phase(Phase::Skipped);
                return Ok(None);
            }
            Overwrite::Force => {
                tracing::info!(track = %track.url(), path = ?output, "overwriting existing file");
                remove_duplicates(&duplicates).await;
            }
            Overwrite::Metadata => {
                return reconcile_existing(ctx, track, &output, duplicates)
                    .await
                    .map(Some);
            }
        }
    }

    // Phase 5: audio source, fetch, transcode, post-process
    download_audio(ctx, track, &output).await?;

    // Phase 6: tags, index, done
    embed_and_register(ctx, track, &output).await?;
    track.set_output_path(output.clone())?;
    ctx.item.notify_phase(Phase::Complete);
    tracing::info!(track = %track.url(), path = ?output, "downloaded {}", track.display_name());
    Ok(Some(output))
}
