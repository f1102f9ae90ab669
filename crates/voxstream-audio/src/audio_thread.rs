//! Dedicated audio output thread: isolates `!Send` rodio resources from the
//! async runtime.
//!
//! `rodio::OutputStream` is `!Send` on some platforms. Rather than using
//! `unsafe impl Send/Sync`, the stream is confined to a single OS thread and
//! driven through `AudioCommand`s. [`AudioThreadHandle`] is the
//! `Send + Sync` proxy the playback backend holds.
//!
//! Every sink belongs to a run. Commands tagged with a run other than the
//! current one are ignored, so a cancelled run can never append to, or
//! finish, its successor's sink.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use rodio::{OutputStream, OutputStreamHandle, Sink};

use crate::error::AudioError;

/// Invoked once the run's sink has drained or been stopped.
pub type SinkDrainedCallback = Box<dyn FnOnce() + Send + 'static>;

// ── Commands ───────────────────────────────────────────────────────

enum AudioCommand {
    /// Replace the current sink with a fresh one for `run`.
    Begin {
        run: u64,
        volume: f32,
        reply: mpsc::Sender<Result<(), AudioError>>,
    },

    /// Queue samples onto the sink of `run`.
    Append {
        run: u64,
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    },

    /// Fire `on_drained` once the sink of `run` empties.
    Finish {
        run: u64,
        on_drained: SinkDrainedCallback,
    },

    /// Stop the current sink immediately.
    Stop,

    IsPlaying { reply: mpsc::Sender<bool> },

    Shutdown,
}

// ── Handle (Send + Sync proxy) ─────────────────────────────────────

/// `Send + Sync` handle to the dedicated audio output thread.
///
/// All methods take `&self`. `begin` and `is_playing` block until the thread
/// replies; the rest are fire-and-forget.
pub struct AudioThreadHandle {
    cmd_tx: mpsc::Sender<AudioCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for AudioThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioThreadHandle").finish_non_exhaustive()
    }
}

impl AudioThreadHandle {
    /// Spawn the audio thread and open the default output device on it.
    pub fn spawn() -> Result<Self, AudioError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), AudioError>>();

        let thread = thread::Builder::new()
            .name("voxstream-audio".into())
            .spawn(move || Self::run(&cmd_rx, &init_tx))
            .map_err(|e| {
                AudioError::OutputStreamError(format!("failed to spawn audio thread: {e}"))
            })?;

        init_rx.recv().map_err(|_| AudioError::AudioThreadDied)??;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    pub fn begin(&self, run: u64, volume: f32) -> Result<(), AudioError> {
        let (reply, rx) = mpsc::channel();
        self.cmd_tx
            .send(AudioCommand::Begin { run, volume, reply })
            .map_err(|_| AudioError::AudioThreadDied)?;
        rx.recv().map_err(|_| AudioError::AudioThreadDied)?
    }

    pub fn append(
        &self,
        run: u64,
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<(), AudioError> {
        self.cmd_tx
            .send(AudioCommand::Append {
                run,
                samples,
                sample_rate,
                channels,
            })
            .map_err(|_| AudioError::AudioThreadDied)
    }

    /// Hand back `on_drained` if the thread is gone, so the caller can still
    /// fire its completion.
    pub fn finish(
        &self,
        run: u64,
        on_drained: SinkDrainedCallback,
    ) -> Result<(), SinkDrainedCallback> {
        match self.cmd_tx.send(AudioCommand::Finish { run, on_drained }) {
            Err(mpsc::SendError(AudioCommand::Finish { on_drained, .. })) => Err(on_drained),
            _ => Ok(()),
        }
    }

    pub fn stop(&self) {
        let _ = self.cmd_tx.send(AudioCommand::Stop);
    }

    pub fn is_playing(&self) -> bool {
        let (reply, rx) = mpsc::channel();
        if self.cmd_tx.send(AudioCommand::IsPlaying { reply }).is_err() {
            return false;
        }
        rx.recv().unwrap_or(false)
    }

    // ── Audio thread event loop ────────────────────────────────────

    fn run(cmd_rx: &mpsc::Receiver<AudioCommand>, init_tx: &mpsc::Sender<Result<(), AudioError>>) {
        let (_stream, stream_handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                let _ = init_tx.send(Err(AudioError::OutputStreamError(e.to_string())));
                return;
            }
        };
        tracing::info!("Audio playback initialized on default output device");

        if init_tx.send(Ok(())).is_err() {
            return;
        }

        let mut output = Output {
            handle: stream_handle,
            sink: None,
        };

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                AudioCommand::Begin { run, volume, reply } => {
                    let _ = reply.send(output.begin(run, volume));
                }
                AudioCommand::Append {
                    run,
                    samples,
                    sample_rate,
                    channels,
                } => output.append(run, samples, sample_rate, channels),
                AudioCommand::Finish { run, on_drained } => output.finish(run, on_drained),
                AudioCommand::Stop => output.stop(),
                AudioCommand::IsPlaying { reply } => {
                    let _ = reply.send(output.is_playing());
                }
                AudioCommand::Shutdown => break,
            }
        }

        output.stop();
        tracing::debug!("Audio thread shutting down");
    }
}

impl Drop for AudioThreadHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

// ── Thread-confined output state ───────────────────────────────────

struct Output {
    handle: OutputStreamHandle,
    sink: Option<(u64, Arc<Sink>)>,
}

impl Output {
    fn begin(&mut self, run: u64, volume: f32) -> Result<(), AudioError> {
        self.stop();
        let sink =
            Sink::try_new(&self.handle).map_err(|e| AudioError::OutputStreamError(e.to_string()))?;
        sink.set_volume(volume.clamp(0.0, 1.0));
        self.sink = Some((run, Arc::new(sink)));
        tracing::debug!(run, "Playback sink created");
        Ok(())
    }

    fn current(&self, run: u64) -> Option<&Arc<Sink>> {
        self.sink
            .as_ref()
            .filter(|(current, _)| *current == run)
            .map(|(_, sink)| sink)
    }

    fn append(&self, run: u64, samples: Vec<f32>, sample_rate: u32, channels: u16) {
        match self.current(run) {
            Some(sink) => {
                sink.append(rodio::buffer::SamplesBuffer::new(channels, sample_rate, samples));
            }
            None => tracing::trace!(run, "Dropping samples for a replaced run"),
        }
    }

    /// Spawn a watcher that blocks until the sink drains or is stopped.
    fn finish(&self, run: u64, on_drained: SinkDrainedCallback) {
        let Some(sink) = self.current(run).cloned() else {
            // Already replaced or stopped; nothing left to wait for.
            on_drained();
            return;
        };

        // `sleep_until_end` also returns when `stop()` drops the sink's
        // sources, so the callback fires in either case.
        thread::spawn(move || {
            sink.sleep_until_end();
            tracing::debug!(run, "Playback sink drained");
            on_drained();
        });
    }

    fn stop(&mut self) {
        if let Some((run, sink)) = self.sink.take() {
            sink.stop();
            tracing::debug!(run, "Audio playback stopped");
        }
    }

    fn is_playing(&self) -> bool {
        self.sink.as_ref().is_some_and(|(_, sink)| !sink.empty())
    }
}
