//! Speech engine: serialises chunk arrival, stream completion and playback
//! callbacks through one session.
//!
//! ```text
//!  ┌────────────┐  handle_chunk           ┌──────────────────┐   play(feeder)   ┌──────────────┐
//!  │ transport  │ ──────────────────────▶ │  SharedSession   │ ───────────────▶ │   Playback   │
//!  │            │  handle_stream_complete │  Mutex + Notify  │ ◀─────────────── │   Service    │
//!  └────────────┘                         └──────────────────┘  complete / fail └──────────────┘
//!        ▲                                         │
//!        └────────── AckSink / ErrorSink ◀─────────┘
//! ```
//!
//! Every handler decides what to do while holding the session lock and
//! returns a list of deferred actions. The actions run after the lock is released,
//! so a playback backend or sink may call straight back into the engine.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chunk::CorrelationId;
use crate::config::EngineConfig;
use crate::decode::decode_chunk;
use crate::error::{EngineError, PlaybackError, ProtocolError};
use crate::events::EngineEvent;
use crate::feeder::ChunkFeeder;
use crate::gate::{BufferingGate, GateDecision};
use crate::messages::{ChunkMessage, InboundMessage, StreamCompleteMessage, TranscriptMessage};
use crate::ports::{
    AckSink, ErrorKind, ErrorReport, ErrorSink, NoopAckSink, NoopErrorSink, NoopTranscriptSink,
    PlaybackAck, PlaybackCallbacks, PlaybackService, Transcript, TranscriptSink,
};
use crate::session::{PlaybackSession, SessionSnapshot, SessionState, SharedSession};

// ── Dependencies ───────────────────────────────────────────────────

/// External collaborators the engine drives.
#[derive(Clone)]
pub struct EngineDeps {
    pub playback: Arc<dyn PlaybackService>,
    pub acks: Arc<dyn AckSink>,
    pub errors: Arc<dyn ErrorSink>,
    pub transcripts: Arc<dyn TranscriptSink>,
}

impl EngineDeps {
    /// Playback backend with no-op sinks.
    pub fn new(playback: Arc<dyn PlaybackService>) -> Self {
        Self {
            playback,
            acks: Arc::new(NoopAckSink),
            errors: Arc::new(NoopErrorSink),
            transcripts: Arc::new(NoopTranscriptSink),
        }
    }

    #[must_use]
    pub fn with_acks(mut self, acks: Arc<dyn AckSink>) -> Self {
        self.acks = acks;
        self
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Arc<dyn ErrorSink>) -> Self {
        self.errors = errors;
        self
    }

    #[must_use]
    pub fn with_transcripts(mut self, transcripts: Arc<dyn TranscriptSink>) -> Self {
        self.transcripts = transcripts;
        self
    }
}

impl std::fmt::Debug for EngineDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineDeps").finish_non_exhaustive()
    }
}

// ── Deferred side effects ──────────────────────────────────────────

enum Action {
    Emit(EngineEvent),
    WakeFeeders,
    StopPlayback,
    StartPlayback { feeder: ChunkFeeder, lease: u64 },
    Acknowledge(PlaybackAck),
    Report(ErrorReport),
}

/// Collects actions while the session lock is held.
struct Plan {
    from: SessionState,
    actions: Vec<Action>,
}

impl Plan {
    fn new(session: &PlaybackSession) -> Self {
        Self {
            from: session.state(),
            actions: Vec::new(),
        }
    }

    fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    fn emit(&mut self, event: EngineEvent) {
        self.actions.push(Action::Emit(event));
    }

    /// Prepend the state-change event, if any, and hand over the actions.
    fn finish(mut self, session: &PlaybackSession) -> Vec<Action> {
        let to = session.state();
        if self.from != to {
            debug!(from = self.from.label(), to = to.label(), "Session state changed");
            self.actions
                .insert(0, Action::Emit(EngineEvent::StateChanged { from: self.from, to }));
        }
        self.actions
    }
}

// ── Engine ─────────────────────────────────────────────────────────

struct Inner {
    config: EngineConfig,
    gate: BufferingGate,
    shared: Arc<SharedSession>,
    deps: EngineDeps,
    event_tx: mpsc::UnboundedSender<EngineEvent>,
}

/// Cloneable handle to the playback-synchronization engine.
///
/// One engine drives one logical speaker stream, so at most one utterance
/// is ever playing.
#[derive(Clone)]
pub struct SpeechEngine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SpeechEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechEngine")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SpeechEngine {
    /// Create an engine and the receiver for its events.
    pub fn new(
        config: EngineConfig,
        deps: EngineDeps,
    ) -> Result<(Self, mpsc::UnboundedReceiver<EngineEvent>), EngineError> {
        config.validate()?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let engine = Self {
            inner: Arc::new(Inner {
                config,
                gate: BufferingGate::new(config.buffer_watermark),
                shared: Arc::new(SharedSession::new()),
                deps,
                event_tx,
            }),
        };
        Ok((engine, event_rx))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        self.inner.shared.lock().state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.shared.lock().snapshot()
    }

    /// Route one inbound message to its handler.
    pub fn dispatch(&self, message: InboundMessage) -> Result<(), EngineError> {
        match message {
            InboundMessage::AudioChunk(msg) => self.handle_chunk(msg),
            InboundMessage::StreamComplete(msg) => self.handle_stream_complete(msg),
            InboundMessage::Transcript(msg) => {
                self.handle_transcript(msg);
                Ok(())
            }
        }
    }

    // ── Inbound chunk ──────────────────────────────────────────────

    /// Decode and queue one chunk, starting playback once the buffering
    /// watermark is reached.
    ///
    /// A decode failure drops only this chunk; it is reported to the error
    /// sink and returned.
    pub fn handle_chunk(&self, msg: ChunkMessage) -> Result<(), EngineError> {
        let chunk = match decode_chunk(&msg.correlation_id, &msg.encoded_audio) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(correlation_id = %msg.correlation_id, error = %e, "Dropping undecodable chunk");
                self.run(vec![
                    Action::Report(ErrorReport {
                        kind: ErrorKind::Decode,
                        correlation_id: msg.correlation_id.clone(),
                        message: e.to_string(),
                    }),
                    Action::Emit(EngineEvent::ChunkRejected {
                        correlation_id: msg.correlation_id,
                        reason: e.to_string(),
                    }),
                ]);
                return Err(e.into());
            }
        };

        let actions = {
            let mut session = self.inner.shared.lock();
            let mut plan = Plan::new(&session);

            match session.state() {
                SessionState::Discarding => {
                    debug!(correlation_id = %msg.correlation_id, "Dropping chunk of failed utterance");
                    plan.emit(EngineEvent::ChunkDiscarded {
                        correlation_id: msg.correlation_id,
                    });
                    let actions = plan.finish(&session);
                    drop(session);
                    self.run(actions);
                    return Ok(());
                }
                SessionState::Idle => {
                    self.begin_session(&mut session, &mut plan, &msg.correlation_id);
                }
                SessionState::Completing => {
                    // The previous utterance was closed by the peer; anything
                    // still draining from it must not bleed into this one.
                    let superseded = session.generation();
                    let dropped = session.close_silently(None);
                    info!(generation = superseded, dropped, "New utterance supersedes draining session");
                    plan.push(Action::WakeFeeders);
                    plan.push(Action::StopPlayback);
                    plan.emit(EngineEvent::SessionSuperseded {
                        generation: superseded,
                        dropped,
                    });
                    self.begin_session(&mut session, &mut plan, &msg.correlation_id);
                }
                SessionState::Buffering | SessionState::Playing => {}
            }

            session.enqueue(chunk);
            let queued = session.queued();
            plan.emit(EngineEvent::ChunkQueued {
                generation: session.generation(),
                queued,
            });

            match self.inner.gate.evaluate(
                session.state().is_playing(),
                queued,
                session.is_stream_complete(),
            ) {
                GateDecision::AlreadyPlaying => plan.push(Action::WakeFeeders),
                GateDecision::Start => self.start_feeder(&mut session, &mut plan, false),
                GateDecision::Hold => {}
            }

            plan.finish(&session)
        };

        self.run(actions);
        Ok(())
    }

    fn begin_session(
        &self,
        session: &mut PlaybackSession,
        plan: &mut Plan,
        correlation_id: &CorrelationId,
    ) {
        let stale_discarded = session.begin(correlation_id.clone());
        info!(
            generation = session.generation(),
            correlation_id = %correlation_id,
            stale_discarded,
            watermark = self.inner.gate.watermark(),
            "Utterance started"
        );
        plan.emit(EngineEvent::SessionStarted {
            generation: session.generation(),
            correlation_id: correlation_id.clone(),
            stale_discarded,
        });
    }

    fn start_feeder(&self, session: &mut PlaybackSession, plan: &mut Plan, restart: bool) {
        let lease = session.grant_lease();
        let generation = session.generation();
        let queued = session.queued();
        let feeder = ChunkFeeder::new(Arc::clone(&self.inner.shared), lease, generation);

        if restart {
            info!(generation, lease, queued, "Restarting playback for late chunks");
            plan.emit(EngineEvent::PlaybackRestarted {
                generation,
                lease,
                queued,
            });
        } else {
            info!(generation, lease, queued, "Playback started");
            plan.emit(EngineEvent::PlaybackStarted {
                generation,
                lease,
                queued,
            });
        }
        plan.push(Action::StartPlayback { feeder, lease });
    }

    // ── Inbound stream-complete ────────────────────────────────────

    /// Mark the active utterance complete.
    ///
    /// Returns a [`ProtocolError`] (and changes nothing) when the signal
    /// does not fit the session: a repeat for an utterance that was already
    /// closed, or a second signal while draining.
    pub fn handle_stream_complete(&self, msg: StreamCompleteMessage) -> Result<(), EngineError> {
        let id = msg.correlation_id;

        let actions = {
            let mut session = self.inner.shared.lock();
            let mut plan = Plan::new(&session);

            match session.state() {
                SessionState::Idle => {
                    // Only a repeat with no chunk in between is a duplicate;
                    // any chunk would have opened a new session.
                    if session.was_closed_by(&id) {
                        drop(session);
                        let error = ProtocolError::DuplicateCompletion(id.to_string());
                        return Err(self.protocol_violation(id, error));
                    }
                    // Nothing was ever queued: the empty utterance is still
                    // acknowledged exactly once.
                    session.acknowledge_empty(id.clone());
                    self.acknowledge(&mut plan, session.generation(), id);
                }
                SessionState::Buffering => {
                    session.mark_stream_complete(id.clone());
                    match self.inner.gate.evaluate(false, session.queued(), true) {
                        GateDecision::Start => self.start_feeder(&mut session, &mut plan, false),
                        GateDecision::Hold | GateDecision::AlreadyPlaying => {
                            let generation = session.generation();
                            let closing = session.close_acknowledged();
                            self.acknowledge(&mut plan, generation, closing);
                        }
                    }
                }
                SessionState::Playing => {
                    session.mark_stream_complete(id.clone());
                    debug!(
                        generation = session.generation(),
                        queued = session.queued(),
                        correlation_id = %id,
                        "Stream complete; draining remainder"
                    );
                    plan.push(Action::WakeFeeders);
                }
                SessionState::Completing => {
                    drop(session);
                    let error = ProtocolError::AlreadyCompleting(id.to_string());
                    return Err(self.protocol_violation(id, error));
                }
                SessionState::Discarding => {
                    let generation = session.generation();
                    let dropped = session.close_silently(Some(id.clone()));
                    info!(generation, dropped, correlation_id = %id, "Failed utterance closed without acknowledgment");
                }
            }

            plan.finish(&session)
        };

        self.run(actions);
        Ok(())
    }

    fn acknowledge(&self, plan: &mut Plan, generation: u64, correlation_id: CorrelationId) {
        info!(generation, correlation_id = %correlation_id, "Utterance acknowledged");
        plan.push(Action::Acknowledge(PlaybackAck {
            correlation_id: correlation_id.clone(),
            generation,
        }));
        plan.emit(EngineEvent::Acknowledged {
            generation,
            correlation_id,
        });
    }

    /// Log, report and emit a violation. Session state is left untouched.
    fn protocol_violation(
        &self,
        correlation_id: CorrelationId,
        error: ProtocolError,
    ) -> EngineError {
        warn!(correlation_id = %correlation_id, error = %error, "Ignoring protocol violation");
        self.run(vec![
            Action::Report(ErrorReport {
                kind: ErrorKind::Protocol,
                correlation_id,
                message: error.to_string(),
            }),
            Action::Emit(EngineEvent::ProtocolViolation {
                message: error.to_string(),
            }),
        ]);
        error.into()
    }

    // ── Transcript ─────────────────────────────────────────────────

    pub fn handle_transcript(&self, msg: TranscriptMessage) {
        debug!(correlation_id = %msg.correlation_id, chars = msg.text.len(), "Transcript received");
        self.inner.deps.transcripts.append(Transcript {
            correlation_id: msg.correlation_id.clone(),
            text: msg.text.clone(),
        });
        self.emit(EngineEvent::Transcript {
            correlation_id: msg.correlation_id,
            text: msg.text,
        });
    }

    // ── Playback callbacks ─────────────────────────────────────────

    fn callbacks_for(&self, lease: u64) -> PlaybackCallbacks {
        let on_complete: Weak<Inner> = Arc::downgrade(&self.inner);
        let on_error = on_complete.clone();
        PlaybackCallbacks::new(
            move || {
                if let Some(inner) = on_complete.upgrade() {
                    Self { inner }.on_playback_complete(lease);
                }
            },
            move |err| {
                if let Some(inner) = on_error.upgrade() {
                    Self { inner }.on_playback_error(lease, &err);
                }
            },
        )
    }

    fn on_playback_complete(&self, lease: u64) {
        let actions = {
            let mut session = self.inner.shared.lock();
            if session.active_lease() != Some(lease) {
                debug!(lease, "Ignoring completion from superseded feeder");
                return;
            }
            let mut plan = Plan::new(&session);
            let generation = session.generation();

            if session.queued() > 0 {
                // The device finished before the queue drained; hand the
                // remainder to a fresh feeder rather than stalling.
                self.start_feeder(&mut session, &mut plan, true);
            } else if session.is_stream_complete() {
                let closing = session.close_acknowledged();
                self.acknowledge(&mut plan, generation, closing);
            } else {
                warn!(generation, "Playback drained before the stream ended");
                session.underrun();
                plan.emit(EngineEvent::PlaybackUnderrun { generation });
            }

            plan.finish(&session)
        };
        self.run(actions);
    }

    fn on_playback_error(&self, lease: u64, error: &PlaybackError) {
        let actions = {
            let mut session = self.inner.shared.lock();
            if session.active_lease() != Some(lease) {
                debug!(lease, error = %error, "Ignoring error from superseded feeder");
                return;
            }
            let mut plan = Plan::new(&session);
            let generation = session.generation();
            let correlation_id = session.correlation_id().cloned().unwrap_or_default();
            let discarded = session.fail();

            warn!(generation, discarded, correlation_id = %correlation_id, error = %error, "Playback failed");
            plan.push(Action::WakeFeeders);
            plan.push(Action::Report(ErrorReport {
                kind: ErrorKind::Playback,
                correlation_id,
                message: error.to_string(),
            }));
            plan.emit(EngineEvent::PlaybackFailed {
                generation,
                message: error.to_string(),
                discarded,
            });
            plan.finish(&session)
        };
        self.run(actions);
    }

    // ── Teardown ───────────────────────────────────────────────────

    /// Drop the active utterance without acknowledgment.
    ///
    /// Used when the transport disconnects.
    pub fn shutdown(&self) {
        let actions = {
            let mut session = self.inner.shared.lock();
            if session.state() == SessionState::Idle {
                return;
            }
            let mut plan = Plan::new(&session);
            let playing = session.state().is_playing();
            let generation = session.generation();
            let dropped = session.close_silently(None);
            info!(generation, dropped, "Session torn down");

            plan.push(Action::WakeFeeders);
            if playing {
                plan.push(Action::StopPlayback);
            }
            plan.finish(&session)
        };
        self.run(actions);
    }

    // ── Side effects ───────────────────────────────────────────────

    fn emit(&self, event: EngineEvent) {
        let _ = self.inner.event_tx.send(event);
    }

    fn run(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Emit(event) => self.emit(event),
                Action::WakeFeeders => self.inner.shared.wake_feeders(),
                Action::StopPlayback => self.inner.deps.playback.stop(),
                Action::StartPlayback { feeder, lease } => {
                    let callbacks = self.callbacks_for(lease);
                    if let Err(e) = self.inner.deps.playback.play(feeder, callbacks) {
                        self.on_playback_error(lease, &e);
                    }
                }
                Action::Acknowledge(ack) => self.inner.deps.acks.acknowledge(ack),
                Action::Report(report) => self.inner.deps.errors.report(report),
            }
        }
    }
}
