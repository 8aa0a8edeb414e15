//! Progress tracking for a batch of tracks
//!
//! [`ProgressTracker`] holds the aggregate counters and the phase of every in-flight
//! item behind one mutex, so concurrent updates from workers are serialized and
//! [`ProgressTracker::snapshot`] always sees a consistent view. Every accepted
//! transition is also published as an [`Event`] on a broadcast channel.

use crate::types::{Event, ItemId, Phase, Track};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Callback collaborators use to report sub-phase progress (0.0 to 100.0)
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Capacity of the event channel; slow subscribers miss old events rather than block workers
const EVENT_CHANNEL_CAPACITY: usize = 1000;

#[derive(Debug)]
struct ItemState {
    name: String,
    phase: Phase,
    percent: u8,
}

#[derive(Debug, Default)]
struct TrackerState {
    total: usize,
    completed: usize,
    skipped: usize,
    errors: usize,
    active: usize,
    peak_active: usize,
    next_id: ItemId,
    items: HashMap<ItemId, ItemState>,
}

/// Consistent view of the aggregate counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Tracks scheduled in this batch
    pub total: usize,
    /// Tracks written
    pub completed: usize,
    /// Tracks skipped
    pub skipped: usize,
    /// Tracks failed
    pub errors: usize,
    /// Tracks currently downloading or converting
    pub active: usize,
    /// Highest value `active` reached during the batch
    pub peak_active: usize,
}

impl ProgressSnapshot {
    /// Tracks that reached a terminal phase
    pub fn done(&self) -> usize {
        self.completed + self.skipped + self.errors
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] errors={} active={}",
            self.done(),
            self.total,
            self.errors,
            self.active
        )
    }
}

/// Thread-safe progress state shared by every worker
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    state: Arc<Mutex<TrackerState>>,
    events: broadcast::Sender<Event>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    /// Create a tracker with no items
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(TrackerState::default())),
            events,
        }
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.events.send(event).ok();
    }

    /// Start a new batch of `total` tracks, clearing the previous batch's counters
    pub fn set_total(&self, total: usize) {
        {
            let mut state = self.lock();
            let next_id = state.next_id;
            *state = TrackerState {
                total,
                next_id,
                ..Default::default()
            };
        }
        self.emit(Event::BatchStarted { total });
    }

    /// Register a track and return its handle; the item starts in [`Phase::Queued`]
    pub fn new_item(&self, track: &Track) -> ItemHandle {
        let id = {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.items.insert(
                id,
                ItemState {
                    name: track.display_name(),
                    phase: Phase::Queued,
                    percent: 0,
                },
            );
            id
        };
        ItemHandle {
            id,
            tracker: self.clone(),
        }
    }

    /// Consistent copy of the aggregate counters
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.lock();
        ProgressSnapshot {
            total: state.total,
            completed: state.completed,
            skipped: state.skipped,
            errors: state.errors,
            active: state.active,
            peak_active: state.peak_active,
        }
    }

    /// Current phase of an item
    pub fn phase(&self, id: ItemId) -> Option<Phase> {
        self.lock().items.get(&id).map(|item| item.phase)
    }

    /// Publish the end-of-batch summary
    pub fn finish(&self) -> ProgressSnapshot {
        let snapshot = self.snapshot();
        self.emit(Event::BatchFinished {
            completed: snapshot.completed,
            skipped: snapshot.skipped,
            errors: snapshot.errors,
            total: snapshot.total,
        });
        snapshot
    }

    fn transition(&self, id: ItemId, next: Phase) -> Option<String> {
        let mut state = self.lock();
        let item = state.items.get_mut(&id)?;
        let current = item.phase;
        if current == next || !current.can_transition_to(next) {
            if current != next {
                tracing::debug!(item = id, from = %current, to = %next, "ignoring backwards phase change");
            }
            return None;
        }
        item.phase = next;
        item.percent = 0;
        let name = item.name.clone();

        if current.is_active() && !next.is_active() {
            state.active = state.active.saturating_sub(1);
        }
        if !current.is_active() && next.is_active() {
            state.active += 1;
            state.peak_active = state.peak_active.max(state.active);
        }
        match next {
            Phase::Complete => state.completed += 1,
            Phase::Skipped => state.skipped += 1,
            Phase::Errored => state.errors += 1,
            _ => {}
        }
        Some(name)
    }
}

/// Per-item view handed to the unit of work processing one track
#[derive(Clone, Debug)]
pub struct ItemHandle {
    id: ItemId,
    tracker: ProgressTracker,
}

impl ItemHandle {
    /// Item id within the tracker
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Move to `phase`; backwards or post-terminal transitions are ignored
    pub fn notify_phase(&self, phase: Phase) -> bool {
        match self.tracker.transition(self.id, phase) {
            Some(name) => {
                self.tracker.emit(Event::PhaseChanged {
                    item: self.id,
                    name,
                    phase,
                });
                true
            }
            None => false,
        }
    }

    /// Update the sub-phase percentage, clamped to 0..=100
    pub fn notify_progress(&self, percent: f64) {
        let percent = percent.clamp(0.0, 100.0).round() as u8;
        let changed = {
            let mut state = self.tracker.lock();
            match state.items.get_mut(&self.id) {
                Some(item) if !item.phase.is_terminal() && item.percent != percent => {
                    item.percent = percent;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.tracker.emit(Event::Progress {
                item: self.id,
                percent,
            });
        }
    }

    /// Mark the item as errored with a summary of the failure
    pub fn notify_error(&self, details: &str) {
        if let Some(name) = self.tracker.transition(self.id, Phase::Errored) {
            self.tracker.emit(Event::PhaseChanged {
                item: self.id,
                name: name.clone(),
                phase: Phase::Errored,
            });
            self.tracker.emit(Event::ItemFailed {
                item: self.id,
                name,
                error: details.to_string(),
            });
        }
    }

    /// Update the display name once a placeholder has been resolved
    pub fn rename(&self, name: String) {
        if let Some(item) = self.tracker.lock().items.get_mut(&self.id) {
            item.name = name;
        }
    }

    /// Callback that forwards percentages to [`ItemHandle::notify_progress`]
    pub fn callback(&self) -> ProgressCallback {
        let handle = self.clone();
        Arc::new(move |percent| handle.notify_progress(percent))
    }

    /// Current percentage of the sub-phase
    pub fn percent(&self) -> u8 {
        self.tracker
            .lock()
            .items
            .get(&self.id)
            .map(|item| item.percent)
            .unwrap_or_default()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrackInfo;

    fn track(name: &str) -> Track {
        Track::new(TrackInfo {
            url: format!("https://open.spotify.com/track/{name}"),
            title: name.into(),
            artists: vec!["Artist".into()],
            ..Default::default()
        })
    }

    #[test]
    fn test_phases_only_move_forward() {
        let tracker = ProgressTracker::new();
        tracker.set_total(1);
        let item = tracker.new_item(&track("a"));

        assert!(item.notify_phase(Phase::Searching));
        assert!(item.notify_phase(Phase::Converting));
        assert!(!item.notify_phase(Phase::Downloading));
        assert!(item.notify_phase(Phase::Complete));
        assert!(!item.notify_phase(Phase::Errored));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.errors, 0);
        assert_eq!(snapshot.active, 0);
        assert_eq!(tracker.phase(item.id()), Some(Phase::Complete));
    }

    #[test]
    fn test_error_counted_once() {
        let tracker = ProgressTracker::new();
        tracker.set_total(1);
        let item = tracker.new_item(&track("a"));
        item.notify_phase(Phase::Downloading);
        item.notify_error("boom");
        item.notify_error("boom again");

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.active, 0);
        assert_eq!(snapshot.to_string(), "[1/1] errors=1 active=0");
    }

    #[test]
    fn test_progress_is_clamped() {
        let tracker = ProgressTracker::new();
        let item = tracker.new_item(&track("a"));
        item.notify_phase(Phase::Downloading);
        item.notify_progress(150.0);
        assert_eq!(item.percent(), 100);
        item.notify_progress(-3.0);
        assert_eq!(item.percent(), 0);
    }

    #[test]
    fn test_callback_forwards_progress() {
        let tracker = ProgressTracker::new();
        let item = tracker.new_item(&track("a"));
        item.notify_phase(Phase::Downloading);
        let callback = item.callback();
        callback(42.4);
        assert_eq!(item.percent(), 42);
    }

    #[test]
    fn test_peak_active_tracks_concurrency() {
        let tracker = ProgressTracker::new();
        tracker.set_total(3);
        let items: Vec<_> = ["a", "b", "c"].iter().map(|n| tracker.new_item(&track(n))).collect();

        items[0].notify_phase(Phase::Downloading);
        items[1].notify_phase(Phase::Downloading);
        items[0].notify_phase(Phase::Complete);
        items[2].notify_phase(Phase::Converting);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.active, 2);
        assert_eq!(snapshot.peak_active, 2);
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let tracker = ProgressTracker::new();
        let mut rx = tracker.subscribe();

        tracker.set_total(1);
        let item = tracker.new_item(&track("a"));
        item.notify_phase(Phase::Searching);
        item.notify_error("no audio");
        tracker.finish();

        assert_eq!(rx.recv().await.unwrap(), Event::BatchStarted { total: 1 });
        assert!(matches!(
            rx.recv().await.unwrap(),
            Event::PhaseChanged { phase: Phase::Searching, .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            Event::PhaseChanged { phase: Phase::Errored, .. }
        ));
        match rx.recv().await.unwrap() {
            Event::ItemFailed { name, error, .. } => {
                assert_eq!(name, "Artist - a");
                assert_eq!(error, "no audio");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::BatchFinished {
                completed: 0,
                skipped: 0,
                errors: 1,
                total: 1
            }
        );
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let tracker = ProgressTracker::new();
        tracker.set_total(64);
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    let item = tracker.new_item(&track(&i.to_string()));
                    item.notify_phase(Phase::Downloading);
                    if i % 2 == 0 {
                        item.notify_phase(Phase::Complete);
                    } else {
                        item.notify_error("failed");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.completed, 32);
        assert_eq!(snapshot.errors, 32);
        assert_eq!(snapshot.done(), 64);
    }
}
