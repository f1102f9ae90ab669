//! Headless playback: drains feeders without an output device.
//!
//! Used by servers without a sound card, by `voxstream replay`, and by tests.
//! With [`Pacing::Realtime`] each chunk holds the run for as long as it
//! would take to play, so buffering and underrun behave as with a device.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::runtime::Handle;
use voxstream_core::{ChunkFeeder, PlaybackCallbacks, PlaybackError, PlaybackService};

use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::pcm::{chunk_samples, play_duration};
use crate::run::{Pulled, RunControl, pull};

/// How fast a headless run consumes its feeder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Pull chunks as fast as they arrive.
    #[default]
    Immediate,
    /// Hold each chunk for its playing time.
    Realtime,
}

/// Counters accumulated across all runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStats {
    pub runs: u64,
    pub chunks: u64,
    pub samples: u64,
    pub cancelled: u64,
}

#[derive(Debug, Default)]
struct Counters {
    runs: AtomicU64,
    chunks: AtomicU64,
    samples: AtomicU64,
    cancelled: AtomicU64,
}

/// [`PlaybackService`] that consumes audio without playing it.
#[derive(Debug)]
pub struct HeadlessPlayback {
    config: AudioConfig,
    pacing: Pacing,
    runtime: Handle,
    runs: Arc<RunControl>,
    counters: Arc<Counters>,
}

impl HeadlessPlayback {
    /// Create a backend bound to the current tokio runtime.
    pub fn new(config: AudioConfig, pacing: Pacing) -> Result<Self, AudioError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| AudioError::NoRuntime(e.to_string()))?;
        Ok(Self {
            config,
            pacing,
            runtime,
            runs: Arc::new(RunControl::default()),
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            runs: self.counters.runs.load(Ordering::SeqCst),
            chunks: self.counters.chunks.load(Ordering::SeqCst),
            samples: self.counters.samples.load(Ordering::SeqCst),
            cancelled: self.counters.cancelled.load(Ordering::SeqCst),
        }
    }
}

impl PlaybackService for HeadlessPlayback {
    fn play(
        &self,
        mut feeder: ChunkFeeder,
        callbacks: PlaybackCallbacks,
    ) -> Result<(), PlaybackError> {
        let (run, mut cancel) = self.runs.begin();
        let runs = Arc::clone(&self.runs);
        let counters = Arc::clone(&self.counters);
        let config = self.config;
        let pacing = self.pacing;
        counters.runs.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            run,
            generation = feeder.generation(),
            lease = feeder.lease(),
            ?pacing,
            "Headless run started"
        );

        self.runtime.spawn(async move {
            let cancelled = loop {
                let chunk = match pull(&mut feeder, &mut cancel).await {
                    Pulled::Chunk(chunk) => chunk,
                    Pulled::Drained => break false,
                    Pulled::Cancelled => break true,
                };

                let samples = chunk_samples(&chunk);
                counters.chunks.fetch_add(1, Ordering::SeqCst);
                counters.samples.fetch_add(
                    u64::try_from(samples.len()).unwrap_or(u64::MAX),
                    Ordering::SeqCst,
                );

                if pacing == Pacing::Realtime {
                    let hold = play_duration(samples.len(), config.sample_rate, config.channels);
                    tokio::select! {
                        () = tokio::time::sleep(hold) => {}
                        _ = cancel.changed() => break true,
                    }
                }
            };

            if cancelled {
                counters.cancelled.fetch_add(1, Ordering::SeqCst);
            }
            tracing::debug!(run, delivered = feeder.delivered(), cancelled, "Headless run finished");
            runs.finish(run);
            callbacks.complete();
        });

        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.runs.is_active()
    }

    fn stop(&self) {
        self.runs.stop();
    }
}
