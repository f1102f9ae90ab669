//! Ports: trait abstractions for the engine's external collaborators.
//!
//! | Port | Direction | Implementations |
//! |---|---|---|
//! | [`PlaybackService`] | engine → audio output | `HeadlessPlayback`, `LocalPlayback` (voxstream-audio) |
//! | [`AckSink`] | engine → remote peer | [`ChannelSink`], [`NoopAckSink`] |
//! | [`ErrorSink`] | engine → remote peer / UI | [`ChannelSink`], [`NoopErrorSink`] |
//! | [`TranscriptSink`] | engine → UI | [`NoopTranscriptSink`], adapter-specific |
//!
//! All traits are object-safe and take `&self`; implementations use interior
//! mutability. None of the methods may block: the engine calls them from the
//! task that handles inbound messages.

use tokio::sync::mpsc;

use crate::chunk::CorrelationId;
use crate::error::PlaybackError;
use crate::feeder::ChunkFeeder;
use crate::messages::OutboundMessage;

// ── Playback service ───────────────────────────────────────────────

type CompleteFn = Box<dyn FnOnce() + Send + 'static>;
type ErrorFn = Box<dyn FnOnce(PlaybackError) + Send + 'static>;

/// Completion callbacks handed to the playback backend with each feeder.
///
/// Both methods consume `self`, so a backend can fire exactly one of them,
/// exactly once.
pub struct PlaybackCallbacks {
    on_complete: CompleteFn,
    on_error: ErrorFn,
}

impl PlaybackCallbacks {
    pub fn new(
        on_complete: impl FnOnce() + Send + 'static,
        on_error: impl FnOnce(PlaybackError) + Send + 'static,
    ) -> Self {
        Self {
            on_complete: Box::new(on_complete),
            on_error: Box::new(on_error),
        }
    }

    /// Everything handed to the device has finished playing.
    pub fn complete(self) {
        (self.on_complete)();
    }

    /// Playback failed; the backend has stopped consuming the feeder.
    pub fn fail(self, error: PlaybackError) {
        (self.on_error)(error);
    }
}

impl std::fmt::Debug for PlaybackCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackCallbacks").finish_non_exhaustive()
    }
}

/// Audio output that consumes a [`ChunkFeeder`].
///
/// The backend pulls chunks until the feeder returns `None`, lets the device
/// drain, then calls [`PlaybackCallbacks::complete`]. On failure it calls
/// [`PlaybackCallbacks::fail`] instead, never both.
pub trait PlaybackService: Send + Sync {
    /// Begin consuming `feeder`. Must return promptly; the actual consumption
    /// runs on a task or thread owned by the backend.
    ///
    /// An `Err` means nothing was started and no callback will fire.
    fn play(&self, feeder: ChunkFeeder, callbacks: PlaybackCallbacks)
    -> Result<(), PlaybackError>;

    /// Whether the backend is actively consuming a feeder.
    fn is_playing(&self) -> bool;

    /// Abandon the current feeder and silence the device.
    ///
    /// The backend still fires one of the callbacks for the abandoned run.
    fn stop(&self);
}

// ── Outbound sinks ─────────────────────────────────────────────────

/// Acknowledgment that an utterance finished playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackAck {
    pub correlation_id: CorrelationId,
    pub generation: u64,
}

/// Receives the single completion acknowledgment of each utterance.
#[cfg_attr(test, mockall::automock)]
pub trait AckSink: Send + Sync {
    fn acknowledge(&self, ack: PlaybackAck);
}

/// Which subsystem produced an [`ErrorReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Playback,
    Protocol,
}

/// Human-readable failure report for the error sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub correlation_id: CorrelationId,
    pub message: String,
}

/// Receives decode, playback and protocol failures.
#[cfg_attr(test, mockall::automock)]
pub trait ErrorSink: Send + Sync {
    fn report(&self, report: ErrorReport);
}

/// One recognised utterance of spoken text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub correlation_id: CorrelationId,
    pub text: String,
}

/// Receives transcript text for display.
#[cfg_attr(test, mockall::automock)]
pub trait TranscriptSink: Send + Sync {
    fn append(&self, transcript: Transcript);
}

// ── No-op implementations ──────────────────────────────────────────

/// Discards acknowledgments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAckSink;

impl AckSink for NoopAckSink {
    fn acknowledge(&self, _ack: PlaybackAck) {}
}

/// Discards error reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopErrorSink;

impl ErrorSink for NoopErrorSink {
    fn report(&self, _report: ErrorReport) {}
}

/// Discards transcripts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTranscriptSink;

impl TranscriptSink for NoopTranscriptSink {
    fn append(&self, _transcript: Transcript) {}
}

// ── Channel-backed sink ────────────────────────────────────────────

/// Forwards acknowledgments and errors as [`OutboundMessage`]s.
///
/// The transport's egress task drains the receiver and writes each message
/// to the peer. A closed receiver means the connection is gone; messages are
/// dropped with a debug log.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, message: OutboundMessage) {
        if self.tx.send(message).is_err() {
            tracing::debug!("Outbound receiver dropped; message discarded");
        }
    }
}

impl AckSink for ChannelSink {
    fn acknowledge(&self, ack: PlaybackAck) {
        self.send(OutboundMessage::PlaybackComplete {
            correlation_id: ack.correlation_id,
        });
    }
}

impl ErrorSink for ChannelSink {
    fn report(&self, report: ErrorReport) {
        self.send(OutboundMessage::Error {
            correlation_id: report.correlation_id,
            message: report.message,
        });
    }
}
