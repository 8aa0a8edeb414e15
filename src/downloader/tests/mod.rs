//! Orchestrator scenario tests.

use super::test_helpers::*;
use super::*;
use crate::config::{Bitrate, Overwrite};
use crate::types::Phase;
use std::time::Duration;
use tempfile::{TempDir, tempdir};

mod lifecycle;

/// Write `contents` at `path`, creating parent directories
fn write_file(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// Canonical output path of `track` under the default template
fn canonical(config: &Config, track: &Track) -> std::path::PathBuf {
    crate::utils::build_output_path(
        &config.download.download_dir,
        &config.download.output_template,
        track,
        &config.download.format,
        config.download.restrict,
    )
}
