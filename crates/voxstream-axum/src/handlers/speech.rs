//! Health and session status endpoints.

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use voxstream_core::SessionSnapshot;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /api/health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Body of `GET /api/speech/status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechStatusResponse {
    /// Whether a speaker connection is open.
    pub active: bool,
    pub buffer_watermark: usize,
    pub playback_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSnapshot>,
}

/// `GET /api/speech/status`
pub async fn status(State(state): State<AppState>) -> Json<SpeechStatusResponse> {
    let session = state.snapshot();
    Json(SpeechStatusResponse {
        active: state.is_connected(),
        buffer_watermark: state.engine_config().buffer_watermark,
        playback_active: state.playback_active(),
        session,
    })
}
