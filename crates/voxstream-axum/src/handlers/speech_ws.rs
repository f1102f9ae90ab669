//! WebSocket endpoint carrying the speech stream.
//!
//! `GET /api/speech/ws` upgrades to a WebSocket on which the remote speech
//! service sends JSON text frames and receives acknowledgments.
//!
//! | Direction | `type` | Fields |
//! |---|---|---|
//! | Peer → Server | `audio_chunk` | `correlationId`, `encodedAudio` (base64 PCM16 LE) |
//! | Peer → Server | `stream_complete` | `correlationId` |
//! | Peer → Server | `transcript` | `correlationId`, `text` |
//! | Server → Peer | `playback_complete` | `correlationId` |
//! | Server → Peer | `error` | `correlationId`, `message` |
//!
//! Only one speaker may be connected at a time; a second upgrade attempt is
//! refused with `409 Conflict`. Closing the socket tears down the
//! connection's session without acknowledgment.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use voxstream_core::{EngineError, InboundMessage, SpeechEngine};

use crate::error::HttpError;
use crate::state::{AppState, ConnectionEngine, ConnectionGuard};

/// `GET /api/speech/ws`: WebSocket upgrade endpoint.
pub async fn speech_ws(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
) -> Result<Response, HttpError> {
    let guard = state.claim().ok_or_else(|| {
        HttpError::Conflict("another speaker connection is already active".to_string())
    })?;
    let ws = ws.ok_or_else(|| HttpError::BadRequest("expected a WebSocket upgrade".to_string()))?;
    let conn = guard.open_engine()?;

    Ok(ws
        .on_upgrade(move |socket| handle_speech_ws(socket, guard, conn))
        .into_response())
}

/// Feed one inbound text frame to the engine.
///
/// Decode failures have already been reported to the peer by the engine's
/// error sink; everything else is only logged.
pub fn handle_text_frame(engine: &SpeechEngine, text: &str) -> Result<(), EngineError> {
    let message = InboundMessage::parse(text)?;
    engine.dispatch(message)
}

async fn handle_speech_ws(socket: WebSocket, guard: ConnectionGuard, conn: ConnectionEngine) {
    let connection = guard.id();
    let engine = conn.engine;
    let mut outbound = conn.outbound;
    let mut events = conn.events;

    info!(connection, "Speech connection opened");

    let (ws_sender, ws_receiver) = socket.split();

    // ── Ingest: peer text frames → engine ──────────────────────────

    let ingest_engine = engine.clone();
    let mut ingest = tokio::spawn(async move {
        let mut ws_receiver = ws_receiver;

        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match handle_text_frame(&ingest_engine, &text) {
                    Ok(()) | Err(EngineError::Decode(_)) => {}
                    Err(e) => warn!(connection, error = %e, "Ignoring inbound frame"),
                },
                Ok(Message::Binary(data)) => {
                    warn!(connection, bytes = data.len(), "Ignoring binary frame");
                }
                Ok(Message::Close(_)) | Err(_) => break,
                // Ping/pong are answered by axum.
                Ok(_) => {}
            }
        }
    });

    // ── Egress: acknowledgments and errors → peer text frames ──────

    let mut egress = tokio::spawn(async move {
        let mut ws_sender = ws_sender;

        while let Some(message) = outbound.recv().await {
            let json = match message.to_json() {
                Ok(json) => json,
                Err(e) => {
                    warn!(connection, error = %e, "Failed to serialize outbound message");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // Engine events are only logged here.
    let event_log = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(connection, ?event, "Engine event");
        }
    });

    tokio::select! {
        _ = &mut ingest => { egress.abort(); }
        _ = &mut egress => { ingest.abort(); }
    }

    // Releasing the slot tears down the session.
    drop(guard);
    drop(engine);
    event_log.abort();

    info!(connection, "Speech connection closed");
}
