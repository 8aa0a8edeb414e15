//! Queue processor -- a fixed pool of workers draining the track queue.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::error::Error;
use crate::progress::ItemHandle;
use crate::types::{DownloadOutcome, Track};

use super::Downloader;
use super::download_task::{TrackContext, run_track};

/// A scheduled track and its position in the input
struct Job {
    index: usize,
    track: Track,
    item: ItemHandle,
}

type SharedQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

impl Downloader {
    /// Run every job through the per-track pipeline on `threads` workers
    ///
    /// Each worker takes one track, runs it to completion and only then takes the
    /// next, so no more than `threads` pipelines are ever in flight. Every pipeline
    /// runs in its own task; a panic fails that track and nothing else.
    ///
    /// Returns outcomes in input order, or `None` if the batch was cancelled.
    pub(super) async fn process_queue(
        &self,
        jobs: Vec<(Track, ItemHandle)>,
    ) -> Option<Vec<DownloadOutcome>> {
        let total = jobs.len();
        if total == 0 {
            return Some(Vec::new());
        }

        let (tx, rx) = mpsc::channel(total);
        for (index, (track, item)) in jobs.into_iter().enumerate() {
            // Capacity equals the job count, so this never waits
            if tx.send(Job { index, track, item }).await.is_err() {
                return None;
            }
        }
        drop(tx);

        let queue: SharedQueue = Arc::new(Mutex::new(rx));
        let workers = self.config.download.threads.clamp(1, total);
        tracing::debug!(tracks = total, workers, "starting workers");

        let handles: Vec<_> = (0..workers)
            .map(|worker| tokio::spawn(self.clone().worker(worker, Arc::clone(&queue))))
            .collect();

        let mut slots: Vec<Option<DownloadOutcome>> = vec![None; total];
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(results) => {
                    for (index, outcome) in results {
                        slots[index] = Some(outcome);
                    }
                }
                Err(e) => tracing::error!(error = %e, "worker task failed"),
            }
        }

        if self.cancel.is_cancelled() {
            tracing::warn!("batch cancelled, discarding results");
            return None;
        }
        slots.into_iter().collect()
    }

    async fn worker(self, worker: usize, queue: SharedQueue) -> Vec<(usize, DownloadOutcome)> {
        let mut results = Vec::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                job = async { queue.lock().await.recv().await } => job,
            };
            let Some(Job { index, track, item }) = next else {
                break;
            };

            let ctx = TrackContext {
                item,
                config: Arc::clone(&self.config),
                services: Arc::clone(&self.services),
                known_files: self.known_files.clone(),
                errors: self.errors.clone(),
            };
            let fallback = track.clone();
            let task = tokio::spawn(run_track(ctx.clone(), track));
            let abort = task.abort_handle();

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    abort.abort();
                    break;
                }
                joined = task => match joined {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(worker, track = %fallback.url(), error = %e, "track task failed");
                        ctx.fail(&fallback, &Error::ExternalTool(format!("track task failed: {e}")));
                        DownloadOutcome {
                            track: fallback,
                            path: None,
                        }
                    }
                },
            };
            results.push((index, outcome));
        }
        results
    }
}
