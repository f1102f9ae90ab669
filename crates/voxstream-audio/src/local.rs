//! Local speaker output through rodio.

use std::sync::Arc;

use tokio::runtime::Handle;
use voxstream_core::{ChunkFeeder, PlaybackCallbacks, PlaybackError, PlaybackService};

use crate::audio_thread::AudioThreadHandle;
use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::pcm::chunk_samples;
use crate::run::{Pulled, RunControl, pull};

/// [`PlaybackService`] that plays PCM16 chunks on the default output device.
///
/// A tokio task pulls from the feeder and forwards samples to the audio
/// thread. Once the feeder terminates, a drain watcher fires the completion
/// callback after the device has played the last sample.
#[derive(Debug)]
pub struct LocalPlayback {
    config: AudioConfig,
    runtime: Handle,
    audio: Arc<AudioThreadHandle>,
    runs: Arc<RunControl>,
}

impl LocalPlayback {
    /// Open the default output device. Must be called within a tokio runtime.
    pub fn new(config: AudioConfig) -> Result<Self, AudioError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| AudioError::NoRuntime(e.to_string()))?;
        let audio = AudioThreadHandle::spawn()?;
        Ok(Self {
            config,
            runtime,
            audio: Arc::new(audio),
            runs: Arc::new(RunControl::default()),
        })
    }
}

impl PlaybackService for LocalPlayback {
    fn play(
        &self,
        mut feeder: ChunkFeeder,
        callbacks: PlaybackCallbacks,
    ) -> Result<(), PlaybackError> {
        let (run, mut cancel) = self.runs.begin();
        if let Err(e) = self.audio.begin(run, self.config.volume) {
            self.runs.finish(run);
            return Err(e.into());
        }

        let audio = Arc::clone(&self.audio);
        let runs = Arc::clone(&self.runs);
        let AudioConfig {
            sample_rate,
            channels,
            ..
        } = self.config;

        tracing::debug!(
            run,
            generation = feeder.generation(),
            lease = feeder.lease(),
            "Local playback run started");

        self.runtime.spawn(async move {
            loop {
                match pull(&mut feeder, &mut cancel).await {
                    Pulled::Chunk(chunk) => {
                        let samples = chunk_samples(&chunk);
                        if samples.is_empty() {
                            continue;
                        }
                        if let Err(e) = audio.append(run, samples, sample_rate, channels) {
                            runs.finish(run);
                            callbacks.fail(e.into());
                            return;
                        }
                    }
                    Pulled::Cancelled => {
                        tracing::debug!(run, "Local playback run cancelled");
                        runs.finish(run);
                        callbacks.complete();
                        return;
                    }
                    Pulled::Drained => break,
                }
            }

            let drained_runs = Arc::clone(&runs);
            let on_drained = Box::new(move || {
                drained_runs.finish(run);
                callbacks.complete();
            });
            if let Err(on_drained) = audio.finish(run, on_drained) {
                tracing::warn!(run, "Audio thread gone before drain; completing immediately");
                on_drained();
            }
        });

        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.runs.is_active() || self.audio.is_playing()
    }

    fn stop(&self) {
        self.runs.stop();
        self.audio.stop();
    }
}
