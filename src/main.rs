use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use trackdl::{
    Bitrate, Config, DownloadOutcome, Downloader, Event, Overwrite, Phase, Reference, TrackingFile,
};

#[derive(Parser, Debug)]
#[command(name = "trackdl", version, about = "Download tracks, albums and playlists as tagged audio files")]
struct Args {
    /// Track, album, playlist or artist URLs/URIs, search queries, or tracking files
    #[arg(required = true)]
    references: Vec<String>,

    /// JSON config file; flags override its values
    #[arg(long, env = "TRACKDL_CONFIG")]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Output file name template, e.g. "{artist}/{album}/{title}.{output-ext}"
    #[arg(long)]
    output_template: Option<String>,

    /// Number of tracks processed concurrently
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Policy for existing files: skip, force or metadata
    #[arg(long)]
    overwrite: Option<Overwrite>,

    /// Archive file of completed track URLs
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Output format (mp3, flac, ogg, opus, m4a, wav)
    #[arg(short = 'f', long)]
    format: Option<String>,

    /// Bitrate: auto, disable, or a value such as 192k
    #[arg(long)]
    bitrate: Option<Bitrate>,

    /// Remove sponsor segments using SponsorBlock
    #[arg(long)]
    sponsor_block: bool,

    /// Restrict file names to ASCII-safe characters
    #[arg(long)]
    restrict: bool,

    /// Write a JSON manifest of the batch results
    #[arg(long)]
    save_file: Option<PathBuf>,

    /// Write an M3U playlist of the downloaded files
    #[arg(long)]
    m3u: Option<PathBuf>,

    /// Write failures to a plain-text log
    #[arg(long)]
    error_log: Option<PathBuf>,

    /// Index existing files in the output directory before downloading
    #[arg(long)]
    scan_for_songs: bool,

    /// Print every failure after the batch
    #[arg(long)]
    print_errors: bool,

    /// Path to the ffmpeg executable
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Accept ffmpeg builds older than the supported minimum
    #[arg(long)]
    ignore_ffmpeg_version: bool,

    /// Log filter (e.g. "debug" or "trackdl=trace"); defaults to RUST_LOG, then "info"
    #[arg(long)]
    log_level: Option<String>,

    /// Spotify application client id
    #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    /// Spotify application client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,
}

impl Args {
    /// Layer flags on top of the file (or default) config
    fn into_config(self) -> trackdl::Result<(Config, Vec<String>)> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        let download = &mut config.download;
        if let Some(output) = self.output {
            download.download_dir = output;
        }
        if let Some(template) = self.output_template {
            download.output_template = template;
        }
        if let Some(threads) = self.threads {
            download.threads = threads;
        }
        if let Some(overwrite) = self.overwrite {
            download.overwrite = overwrite;
        }
        if let Some(format) = self.format {
            download.format = format;
        }
        if let Some(bitrate) = self.bitrate {
            download.bitrate = bitrate;
        }
        download.restrict |= self.restrict;

        let processing = &mut config.processing;
        processing.sponsor_block |= self.sponsor_block;
        processing.scan_for_songs |= self.scan_for_songs;
        processing.print_errors |= self.print_errors;

        let persistence = &mut config.persistence;
        if self.archive.is_some() {
            persistence.archive = self.archive;
        }
        if self.save_file.is_some() {
            persistence.save_file = self.save_file;
        }
        if self.m3u.is_some() {
            persistence.m3u = self.m3u;
        }
        if self.error_log.is_some() {
            persistence.error_log = self.error_log;
        }

        if self.ffmpeg.is_some() {
            config.tools.ffmpeg_path = self.ffmpeg;
        }
        config.tools.ignore_ffmpeg_version |= self.ignore_ffmpeg_version;

        if self.client_id.is_some() {
            config.providers.spotify_client_id = self.client_id;
        }
        if self.client_secret.is_some() {
            config.providers.spotify_client_secret = self.client_secret;
        }

        config.validate()?;
        Ok((config, self.references))
    }
}

fn configure_logging(level: Option<&str>) {
    let env_filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Log per-track terminal phases as they happen
fn spawn_event_printer(downloader: &Downloader) {
    let mut events = downloader.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::BatchStarted { total } => tracing::info!("Downloading {total} track(s)"),
                Event::PhaseChanged {
                    name,
                    phase: phase @ (Phase::Complete | Phase::Skipped),
                    ..
                } => tracing::info!("{phase}: {name}"),
                Event::ItemFailed { name, error, .. } => {
                    tracing::warn!("Failed: {name} ({error})")
                }
                _ => {}
            }
        }
    });
}

/// Separate tracking files, which are resumed in place, from references to resolve
fn split_tracking_files(references: Vec<String>) -> (Vec<PathBuf>, Vec<String>) {
    let mut tracking = Vec::new();
    let mut rest = Vec::new();
    for reference in references {
        match Reference::parse(&reference) {
            Reference::TrackingFile(path) => tracking.push(path),
            _ => rest.push(reference),
        }
    }
    (tracking, rest)
}

/// Log the outcome of one batch; a cancelled batch is not an error
fn report_batch(downloader: &Downloader, result: trackdl::Result<Vec<DownloadOutcome>>) -> trackdl::Result<()> {
    match result {
        Ok(outcomes) => {
            let written = outcomes.iter().filter(|o| o.is_success()).count();
            tracing::info!(
                written,
                failed = downloader.errors().len(),
                "Finished {} track(s)",
                outcomes.len()
            );
            Ok(())
        }
        Err(trackdl::Error::Cancelled) => {
            tracing::warn!("Batch cancelled");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn run(config: Config, references: Vec<String>) -> trackdl::Result<()> {
    let downloader = Downloader::new(config).await?;
    tokio::spawn(trackdl::cancel_on_signal(downloader.clone()));
    spawn_event_printer(&downloader);

    // Tracking files are resumed as their own batch and removed once it succeeds
    let (tracking_files, references) = split_tracking_files(references);
    for path in tracking_files {
        if downloader.is_cancelled() {
            return Ok(());
        }
        let result = downloader.download_tracking_file(&path).await;
        if let Err(e) = report_batch(&downloader, result) {
            tracing::warn!(path = ?path, error = %e, "could not resume tracking file");
        }
    }
    if references.is_empty() || downloader.is_cancelled() {
        return Ok(());
    }

    let resolution = downloader.resolver().resolve_all(&references).await;
    for (reference, error) in &resolution.failures {
        tracing::warn!(reference = %reference, error = %error, "could not resolve reference");
    }
    if resolution.tracks.is_empty() {
        tracing::info!("Nothing to download");
        return Ok(());
    }

    let result = if downloader.config().persistence.tracking_files {
        let file =
            TrackingFile::create(downloader.config().download_dir(), resolution.tracks).await?;
        downloader.download_tracking_file(file.path()).await
    } else {
        downloader.download_all(resolution.tracks).await
    };
    report_batch(&downloader, result)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    configure_logging(args.log_level.as_deref());

    let (config, references) = match args.into_config() {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config, references).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "trackdl",
            "-o",
            "music",
            "-t",
            "8",
            "--overwrite",
            "metadata",
            "-f",
            "flac",
            "--bitrate",
            "disable",
            "--sponsor-block",
            "--archive",
            "archive.txt",
            "https://open.spotify.com/track/1",
            "some search",
        ])
        .unwrap();

        let (config, references) = args.into_config().unwrap();
        assert_eq!(config.download.download_dir, PathBuf::from("music"));
        assert_eq!(config.download.threads, 8);
        assert_eq!(config.download.overwrite, Overwrite::Metadata);
        assert_eq!(config.download.format, "flac");
        assert_eq!(config.download.bitrate, Bitrate::Disable);
        assert!(config.processing.sponsor_block);
        assert_eq!(config.persistence.archive, Some(PathBuf::from("archive.txt")));
        assert_eq!(references.len(), 2);
    }

    #[test]
    fn test_flags_layer_over_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"format": "opus", "threads": 2, "scan_for_songs": true}"#)
            .unwrap();

        let args = Args::try_parse_from([
            "trackdl",
            "--config",
            path.to_str().unwrap(),
            "--threads",
            "6",
            "x",
        ])
        .unwrap();
        let (config, _) = args.into_config().unwrap();

        assert_eq!(config.download.format, "opus");
        assert_eq!(config.download.threads, 6);
        assert!(config.processing.scan_for_songs);
    }

    #[test]
    fn test_tracking_files_are_resumed_separately() {
        let (tracking, rest) = split_tracking_files(vec![
            "saved/Artist - Song.trackingfile".to_string(),
            "https://open.spotify.com/album/abc".to_string(),
            "some search".to_string(),
        ]);

        assert_eq!(tracking, vec![PathBuf::from("saved/Artist - Song.trackingfile")]);
        assert_eq!(rest, vec!["https://open.spotify.com/album/abc", "some search"]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Args::try_parse_from(["trackdl", "--overwrite", "sometimes", "x"]).is_err());
        assert!(Args::try_parse_from(["trackdl", "--bitrate", "loud", "x"]).is_err());
        assert!(Args::try_parse_from(["trackdl"]).is_err());

        let args = Args::try_parse_from(["trackdl", "-t", "0", "x"]).unwrap();
        assert!(args.into_config().is_err());
    }
}
