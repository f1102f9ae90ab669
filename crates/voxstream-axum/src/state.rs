//! Shared application state and the single-speaker connection slot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use voxstream_core::{
    ChannelSink, EngineConfig, EngineDeps, EngineError, EngineEvent, NoopTranscriptSink,
    OutboundMessage, PlaybackService, SessionSnapshot, SpeechEngine, TranscriptSink,
};

/// Application state shared across all handlers.
pub type AppState = Arc<SpeechContext>;

#[derive(Default)]
struct Slot {
    next_id: u64,
    holder: Option<u64>,
    engine: Option<SpeechEngine>,
}

/// Services every connection is wired to.
///
/// The playback backend outlives connections; each connection gets its own
/// engine and outbound channel.
pub struct SpeechContext {
    engine_config: EngineConfig,
    playback: Arc<dyn PlaybackService>,
    transcripts: Arc<dyn TranscriptSink>,
    slot: Mutex<Slot>,
}

impl std::fmt::Debug for SpeechContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechContext")
            .field("engine_config", &self.engine_config)
            .finish_non_exhaustive()
    }
}

/// Everything one connection needs to drive its engine.
pub struct ConnectionEngine {
    pub engine: SpeechEngine,
    pub outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl SpeechContext {
    pub fn new(
        engine_config: EngineConfig,
        playback: Arc<dyn PlaybackService>,
    ) -> Result<Self, EngineError> {
        engine_config.validate()?;
        Ok(Self {
            engine_config,
            playback,
            transcripts: Arc::new(NoopTranscriptSink),
            slot: Mutex::new(Slot::default()),
        })
    }

    #[must_use]
    pub fn with_transcripts(mut self, transcripts: Arc<dyn TranscriptSink>) -> Self {
        self.transcripts = transcripts;
        self
    }

    pub const fn engine_config(&self) -> &EngineConfig {
        &self.engine_config
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the speaker slot. `None` if another connection holds it.
    pub fn claim(self: &Arc<Self>) -> Option<ConnectionGuard> {
        let mut slot = self.slot();
        if slot.holder.is_some() {
            return None;
        }
        slot.next_id += 1;
        let id = slot.next_id;
        slot.holder = Some(id);
        Some(ConnectionGuard {
            ctx: Arc::clone(self),
            id,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.slot().holder.is_some()
    }

    /// Snapshot of the connected speaker's session, if any.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.slot().engine.as_ref().map(SpeechEngine::snapshot)
    }

    pub fn playback_active(&self) -> bool {
        self.playback.is_playing()
    }
}

/// Holds the speaker slot for one connection; releasing it tears down the
/// connection's session.
#[derive(Debug)]
pub struct ConnectionGuard {
    ctx: AppState,
    id: u64,
}

impl ConnectionGuard {
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Build this connection's engine, wired to a fresh outbound channel.
    pub fn open_engine(&self) -> Result<ConnectionEngine, EngineError> {
        let (sink, outbound) = ChannelSink::new();
        let sink = Arc::new(sink);
        let deps = EngineDeps::new(Arc::clone(&self.ctx.playback))
            .with_acks(sink.clone())
            .with_errors(sink)
            .with_transcripts(Arc::clone(&self.ctx.transcripts));
        let (engine, events) = SpeechEngine::new(self.ctx.engine_config, deps)?;

        let mut slot = self.ctx.slot();
        if slot.holder == Some(self.id) {
            slot.engine = Some(engine.clone());
        }
        Ok(ConnectionEngine {
            engine,
            outbound,
            events,
        })
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let engine = {
            let mut slot = self.ctx.slot();
            if slot.holder != Some(self.id) {
                return;
            }
            slot.holder = None;
            slot.engine.take()
        };
        if let Some(engine) = engine {
            engine.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use voxstream_core::{ChunkFeeder, PlaybackCallbacks, PlaybackError, SessionState};

    use super::*;

    struct IdlePlayback;

    impl PlaybackService for IdlePlayback {
        fn play(&self, _: ChunkFeeder, _: PlaybackCallbacks) -> Result<(), PlaybackError> {
            Ok(())
        }

        fn is_playing(&self) -> bool {
            false
        }

        fn stop(&self) {}
    }

    fn context() -> AppState {
        Arc::new(SpeechContext::new(EngineConfig::default(), Arc::new(IdlePlayback)).unwrap())
    }

    #[test]
    fn only_one_connection_holds_the_slot() {
        let ctx = context();
        let first = ctx.claim().unwrap();
        assert!(ctx.claim().is_none());
        assert!(ctx.is_connected());

        drop(first);
        assert!(!ctx.is_connected());
        assert!(ctx.claim().is_some());
    }

    #[test]
    fn snapshot_follows_the_connected_engine() {
        let ctx = context();
        assert!(ctx.snapshot().is_none());

        let guard = ctx.claim().unwrap();
        let conn = guard.open_engine().unwrap();
        assert_eq!(ctx.snapshot().unwrap().state, SessionState::Idle);

        conn.engine
            .handle_chunk(voxstream_core::ChunkMessage {
                correlation_id: "u".into(),
                encoded_audio: "AAA=".into(),
            })
            .unwrap();
        assert_eq!(ctx.snapshot().unwrap().queued, 1);

        drop(guard);
        assert!(ctx.snapshot().is_none());
        assert_eq!(conn.engine.state(), SessionState::Idle, "disconnect tears down");
    }
}
