//! Track task context -- shared state for a single unit of work.

use std::sync::Arc;

use crate::config::Config;
use crate::error::Error;
use crate::known_files::KnownFiles;
use crate::progress::ItemHandle;
use crate::report::ErrorReport;
use crate::types::Track;

use super::super::Services;

/// Everything one unit of work needs, reducing parameter passing between steps.
#[derive(Clone)]
pub(crate) struct TrackContext {
    pub(crate) item: ItemHandle,
    pub(crate) config: Arc<Config>,
    pub(crate) services: Arc<Services>,
    pub(crate) known_files: KnownFiles,
    pub(crate) errors: ErrorReport,
}

impl TrackContext {
    /// Record a failure for `track` and move its item to `Errored`.
    pub(crate) fn fail(&self, track: &Track, error: &Error) {
        let record = self.errors.record(track, error);
        tracing::error!(
            track = %record.url,
            kind = %record.kind,
            "{}: {}",
            record.display_name,
            record.message
        );
        self.item
            .notify_error(&format!("{}: {}", record.kind, record.message));
    }
}
