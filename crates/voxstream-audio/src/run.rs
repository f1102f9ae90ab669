//! Run bookkeeping shared by the playback backends.
//!
//! Every `play` call opens a new run. Opening a run or calling `stop`
//! cancels the previous one, whose task notices through a `watch` channel
//! even while it is suspended on an empty feeder.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use voxstream_core::{AudioChunk, ChunkFeeder};

/// What a run task got from its feeder.
pub(crate) enum Pulled {
    Chunk(AudioChunk),
    /// The feeder terminated; everything was handed over.
    Drained,
    /// The run was replaced or stopped.
    Cancelled,
}

#[derive(Debug)]
pub(crate) struct RunControl {
    current: watch::Sender<u64>,
    active: AtomicU64,
    next: AtomicU64,
}

impl Default for RunControl {
    fn default() -> Self {
        Self {
            current: watch::Sender::new(0),
            active: AtomicU64::new(0),
            next: AtomicU64::new(0),
        }
    }
}

impl RunControl {
    /// Open a run, cancelling any previous one.
    pub(crate) fn begin(&self) -> (u64, watch::Receiver<u64>) {
        let run = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.active.store(run, Ordering::SeqCst);
        self.current.send_replace(run);
        (run, self.current.subscribe())
    }

    /// Cancel the active run, if any.
    pub(crate) fn stop(&self) {
        self.active.store(0, Ordering::SeqCst);
        self.current.send_replace(0);
    }

    /// Mark `run` finished unless a newer run has already replaced it.
    pub(crate) fn finish(&self, run: u64) {
        let _ = self
            .active
            .compare_exchange(run, 0, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub(crate) fn is_current(&self, run: u64) -> bool {
        self.active.load(Ordering::SeqCst) == run
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) != 0
    }
}

/// Pull the next chunk unless the run is cancelled first.
pub(crate) async fn pull(feeder: &mut ChunkFeeder, cancel: &mut watch::Receiver<u64>) -> Pulled {
    tokio::select! {
        next = feeder.next_chunk() => next.map_or(Pulled::Drained, Pulled::Chunk),
        _ = cancel.changed() => Pulled::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_run_replaces_older() {
        let runs = RunControl::default();
        let (first, mut first_rx) = runs.begin();
        let (second, _rx) = runs.begin();

        assert!(first_rx.has_changed().unwrap());
        assert!(!runs.is_current(first));

        runs.finish(first);
        assert!(runs.is_current(second));
        assert!(runs.is_active());

        runs.finish(second);
        assert!(!runs.is_active());
    }

    #[test]
    fn stop_cancels_the_active_run() {
        let runs = RunControl::default();
        let (run, mut rx) = runs.begin();
        runs.stop();
        assert!(rx.has_changed().unwrap());
        assert!(!runs.is_current(run));
        assert!(!runs.is_active());
    }
}
