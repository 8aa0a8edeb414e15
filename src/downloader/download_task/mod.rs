//! Download task execution -- the per-track pipeline and batch finalization.
//!
//! Split into focused submodules:
//! - [`context`] - Shared state handed to each unit of work, failure recording
//! - [`orchestration`] - Top-level per-track lifecycle and overwrite policy
//! - [`reconcile`] - Duplicate detection and existing-file reconciliation
//! - [`pipeline`] - Source lookup, fetch, transcode and post-processing
//! - [`finalization`] - Archive, manifest, playlist and error log after the batch

mod context;
mod finalization;
mod orchestration;
mod pipeline;
mod reconcile;

pub(crate) use context::TrackContext;
pub(crate) use orchestration::run_track;
