//! Playback session: one utterance's lifecycle and its shared state.
//!
//! ```text
//!   Idle ─▶ Buffering ─▶ Playing ─▶ Completing ─▶ Idle
//!              │            │            │
//!              └────────────┴─▶ Discarding (playback failed) ─▶ Idle
//! ```
//!
//! The queue and the completion flag are the only mutable state shared
//! between chunk arrival, stream completion and playback callbacks. They live
//! behind a single mutex in [`SharedSession`]; the feeder is woken through a
//! [`Notify`] rather than polling.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::sync::futures::Notified;

use crate::chunk::{AudioChunk, CorrelationId};
use crate::queue::ChunkQueue;

/// Where the active utterance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No utterance in progress.
    Idle,
    /// Chunks are accumulating below the watermark.
    Buffering,
    /// A feeder is consuming the queue; more chunks may still arrive.
    Playing,
    /// A feeder is draining the remainder; the stream has ended.
    Completing,
    /// Playback failed; chunks of the failed utterance are dropped until
    /// the peer closes it.
    Discarding,
}

impl SessionState {
    /// Whether a feeder currently owns the queue.
    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Playing | Self::Completing)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Buffering => "buffering",
            Self::Playing => "playing",
            Self::Completing => "completing",
            Self::Discarding => "discarding",
        }
    }
}

/// Result of one feeder pull against the session.
#[derive(Debug)]
pub(crate) enum Pull {
    Chunk(AudioChunk),
    Wait,
    Done,
}

/// Read-only view of the session for status endpoints and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub generation: u64,
    pub state: SessionState,
    pub queued: usize,
    pub buffered_bytes: usize,
    pub stream_complete: bool,
    pub correlation_id: Option<CorrelationId>,
    pub chunks_received: u64,
    pub chunks_delivered: u64,
    pub acks_sent: u64,
    pub started_at: Option<DateTime<Utc>>,
}

/// State of the active utterance.
#[derive(Debug)]
pub struct PlaybackSession {
    generation: u64,
    state: SessionState,
    queue: ChunkQueue,
    stream_complete: bool,
    correlation_id: Option<CorrelationId>,
    completion_id: Option<CorrelationId>,
    last_closed: Option<CorrelationId>,
    active_lease: Option<u64>,
    next_lease: u64,
    chunks_received: u64,
    chunks_delivered: u64,
    acks_sent: u64,
    started_at: Option<DateTime<Utc>>,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSession {
    pub const fn new() -> Self {
        Self {
            generation: 0,
            state: SessionState::Idle,
            queue: ChunkQueue::new(),
            stream_complete: false,
            correlation_id: None,
            completion_id: None,
            last_closed: None,
            active_lease: None,
            next_lease: 0,
            chunks_received: 0,
            chunks_delivered: 0,
            acks_sent: 0,
            started_at: None,
        }
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn is_stream_complete(&self) -> bool {
        self.stream_complete
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub const fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    pub const fn active_lease(&self) -> Option<u64> {
        self.active_lease
    }

    pub const fn acks_sent(&self) -> u64 {
        self.acks_sent
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            generation: self.generation,
            state: self.state,
            queued: self.queue.len(),
            buffered_bytes: self.queue.buffered_bytes(),
            stream_complete: self.stream_complete,
            correlation_id: self.correlation_id.clone(),
            chunks_received: self.chunks_received,
            chunks_delivered: self.chunks_delivered,
            acks_sent: self.acks_sent,
            started_at: self.started_at,
        }
    }

    // ── Transitions (driven by the engine) ─────────────────────────

    /// Start a new utterance, discarding anything left from the previous one.
    ///
    /// Returns the number of stale chunks dropped.
    pub(crate) fn begin(&mut self, correlation_id: CorrelationId) -> usize {
        let stale = self.queue.reset();
        self.generation += 1;
        self.state = SessionState::Buffering;
        self.stream_complete = false;
        self.correlation_id = Some(correlation_id);
        self.completion_id = None;
        self.last_closed = None;
        self.active_lease = None;
        self.chunks_received = 0;
        self.chunks_delivered = 0;
        self.started_at = Some(Utc::now());
        stale
    }

    pub(crate) fn enqueue(&mut self, chunk: AudioChunk) {
        self.chunks_received += 1;
        self.queue.enqueue(chunk);
    }

    /// Set the completion flag, remembering the id to acknowledge with.
    pub(crate) fn mark_stream_complete(&mut self, completion_id: CorrelationId) {
        self.stream_complete = true;
        self.completion_id = Some(completion_id);
        if self.state == SessionState::Playing {
            self.state = SessionState::Completing;
        }
    }

    /// Hand the queue to a new feeder. Any previous lease stops yielding.
    pub(crate) fn grant_lease(&mut self) -> u64 {
        self.next_lease += 1;
        self.active_lease = Some(self.next_lease);
        self.state = if self.stream_complete {
            SessionState::Completing
        } else {
            SessionState::Playing
        };
        self.next_lease
    }

    /// The feeder stopped being consumed before the stream ended.
    pub(crate) fn underrun(&mut self) {
        self.active_lease = None;
        self.state = SessionState::Buffering;
    }

    /// Playback failed; drop the queue and wait for the peer to close the
    /// utterance unless it already has.
    ///
    /// Returns the number of chunks discarded.
    pub(crate) fn fail(&mut self) -> usize {
        let discarded = self.queue.reset();
        self.active_lease = None;
        if self.stream_complete {
            let closing = self.completion_id.take();
            self.finish(closing);
        } else {
            self.state = SessionState::Discarding;
        }
        discarded
    }

    /// Close the utterance after its acknowledgment has been decided.
    ///
    /// Returns the id the acknowledgment should carry, if any.
    pub(crate) fn close_acknowledged(&mut self) -> CorrelationId {
        let closing = self
            .completion_id
            .take()
            .or_else(|| self.correlation_id.clone())
            .unwrap_or_default();
        self.acks_sent += 1;
        self.finish(Some(closing.clone()));
        closing
    }

    /// Close the utterance without acknowledgment. Returns chunks dropped.
    ///
    /// Without an explicit id, a stream-complete id already received for the
    /// utterance is remembered as the closing one.
    pub(crate) fn close_silently(&mut self, closing: Option<CorrelationId>) -> usize {
        let dropped = self.queue.reset();
        let closing = closing.or_else(|| self.completion_id.take());
        self.finish(closing);
        dropped
    }

    /// Open and immediately acknowledge an utterance that carried no audio.
    pub(crate) fn acknowledge_empty(&mut self, completion_id: CorrelationId) {
        self.queue.reset();
        self.generation += 1;
        self.correlation_id = Some(completion_id.clone());
        self.chunks_received = 0;
        self.chunks_delivered = 0;
        self.started_at = Some(Utc::now());
        self.acks_sent += 1;
        self.finish(Some(completion_id));
    }

    /// Whether `id` closed the most recent utterance and no new one has
    /// begun since.
    pub(crate) fn was_closed_by(&self, id: &CorrelationId) -> bool {
        self.last_closed.as_ref() == Some(id)
    }

    fn finish(&mut self, closing: Option<CorrelationId>) {
        self.state = SessionState::Idle;
        self.stream_complete = false;
        self.active_lease = None;
        self.completion_id = None;
        self.last_closed = closing;
    }

    // ── Feeder access ──────────────────────────────────────────────

    pub(crate) fn pull(&mut self, lease: u64) -> Pull {
        if self.active_lease != Some(lease) {
            return Pull::Done;
        }
        if let Some(chunk) = self.queue.dequeue_one() {
            self.chunks_delivered += 1;
            return Pull::Chunk(chunk);
        }
        if self.stream_complete {
            Pull::Done
        } else {
            Pull::Wait
        }
    }
}

/// Session plus the wake primitive the feeder suspends on.
#[derive(Debug, Default)]
pub(crate) struct SharedSession {
    session: Mutex<PlaybackSession>,
    wake: Notify,
}

impl SharedSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, PlaybackSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake every suspended feeder so it re-checks the session.
    pub(crate) fn wake_feeders(&self) {
        self.wake.notify_waiters();
    }

    pub(crate) fn notified(&self) -> Notified<'_> {
        self.wake.notified()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(n: u8) -> AudioChunk {
        AudioChunk::new("s", vec![n])
    }

    #[test]
    fn begin_discards_stale_chunks_and_bumps_generation() {
        let mut session = PlaybackSession::new();
        session.begin("a".into());
        session.enqueue(chunk(1));
        session.enqueue(chunk(2));

        let stale = session.begin("b".into());
        assert_eq!(stale, 2);
        assert_eq!(session.generation(), 2);
        assert_eq!(session.queued(), 0);
        assert_eq!(session.state(), SessionState::Buffering);
        assert_eq!(session.correlation_id().map(CorrelationId::as_str), Some("b"));
    }

    #[test]
    fn only_the_active_lease_pulls() {
        let mut session = PlaybackSession::new();
        session.begin("a".into());
        session.enqueue(chunk(1));
        session.enqueue(chunk(2));

        let first = session.grant_lease();
        let second = session.grant_lease();
        assert!(matches!(session.pull(first), Pull::Done));
        assert!(matches!(session.pull(second), Pull::Chunk(c) if c.as_bytes() == [1]));
    }

    #[test]
    fn pull_waits_until_stream_complete() {
        let mut session = PlaybackSession::new();
        session.begin("a".into());
        let lease = session.grant_lease();
        assert_eq!(session.state(), SessionState::Playing);
        assert!(matches!(session.pull(lease), Pull::Wait));

        session.mark_stream_complete("a-end".into());
        assert_eq!(session.state(), SessionState::Completing);
        assert!(matches!(session.pull(lease), Pull::Done));
    }

    #[test]
    fn acknowledged_close_uses_completion_id() {
        let mut session = PlaybackSession::new();
        session.begin("a".into());
        session.mark_stream_complete("a-end".into());

        let id = session.close_acknowledged();
        assert_eq!(id.as_str(), "a-end");
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.acks_sent(), 1);
        assert!(session.was_closed_by(&"a-end".into()));
    }

    #[test]
    fn new_utterance_forgets_the_closing_id() {
        let mut session = PlaybackSession::new();
        session.begin("a".into());
        session.mark_stream_complete("stream".into());
        session.close_acknowledged();
        assert!(session.was_closed_by(&"stream".into()));

        session.begin("b".into());
        assert!(!session.was_closed_by(&"stream".into()));
    }

    #[test]
    fn failure_before_stream_end_discards() {
        let mut session = PlaybackSession::new();
        session.begin("a".into());
        session.enqueue(chunk(1));
        session.grant_lease();

        assert_eq!(session.fail(), 1);
        assert_eq!(session.state(), SessionState::Discarding);
        assert!(session.active_lease().is_none());
    }

    #[test]
    fn failure_after_stream_end_closes() {
        let mut session = PlaybackSession::new();
        session.begin("a".into());
        session.enqueue(chunk(1));
        session.mark_stream_complete("a-end".into());
        session.grant_lease();

        session.fail();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.acks_sent(), 0);
        assert!(session.was_closed_by(&"a-end".into()));
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let mut session = PlaybackSession::new();
        session.begin("a".into());
        session.enqueue(chunk(9));

        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(json["state"], "buffering");
        assert_eq!(json["queued"], 1);
        assert_eq!(json["streamComplete"], false);
        assert_eq!(json["correlationId"], "a");
    }
}
