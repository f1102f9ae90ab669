//! Events emitted by the engine for UIs, logs and tests.

use serde::Serialize;

use crate::chunk::CorrelationId;
use crate::session::SessionState;

/// Observable engine activity.
///
/// Delivered over an unbounded channel; a dropped receiver is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Session lifecycle state changed.
    StateChanged { from: SessionState, to: SessionState },

    /// First chunk of a new utterance arrived.
    SessionStarted {
        generation: u64,
        correlation_id: CorrelationId,
        /// Chunks left over from a previous utterance that were discarded.
        stale_discarded: usize,
    },

    /// A new utterance arrived while the previous one was still draining.
    ///
    /// The previous utterance was fully streamed by the peer, yet its
    /// unplayed remainder (`dropped` chunks) is discarded and it is never
    /// acknowledged.
    SessionSuperseded { generation: u64, dropped: usize },

    ChunkQueued { generation: u64, queued: usize },

    /// A chunk failed to decode and was skipped.
    ChunkRejected {
        correlation_id: CorrelationId,
        reason: String,
    },

    /// A chunk belonging to a failed utterance was dropped.
    ChunkDiscarded { correlation_id: CorrelationId },

    PlaybackStarted { generation: u64, lease: u64, queued: usize },

    /// Playback finished early with chunks still queued; a fresh feeder took over.
    PlaybackRestarted { generation: u64, lease: u64, queued: usize },

    /// The device drained before the stream ended; back to buffering.
    PlaybackUnderrun { generation: u64 },

    PlaybackFailed {
        generation: u64,
        message: String,
        discarded: usize,
    },

    /// The single completion acknowledgment for an utterance was sent.
    Acknowledged {
        generation: u64,
        correlation_id: CorrelationId,
    },

    /// A protocol violation was ignored.
    ProtocolViolation { message: String },

    Transcript {
        correlation_id: CorrelationId,
        text: String,
    },
}
