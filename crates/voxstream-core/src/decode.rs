//! Chunk decoder: base64 text payload → raw audio buffer.
//!
//! Pure and stateless. A malformed payload yields a [`DecodeError`] and is
//! never enqueued.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::chunk::{AudioChunk, CorrelationId};
use crate::error::DecodeError;

/// Decode one encoded chunk payload.
///
/// Surrounding whitespace is ignored; some peers append a trailing newline
/// to every frame.
pub fn decode_chunk(
    correlation_id: &CorrelationId,
    encoded: &str,
) -> Result<AudioChunk, DecodeError> {
    let data = STANDARD
        .decode(encoded.trim())
        .map_err(|e| DecodeError::InvalidEncoding(e.to_string()))?;

    if data.is_empty() {
        return Err(DecodeError::Empty);
    }

    Ok(AudioChunk::new(correlation_id.clone(), data))
}

/// Encode raw audio bytes the way the remote peer does.
///
/// Used by tooling that produces message logs and by tests.
pub fn encode_audio(data: &[u8]) -> String {
    STANDARD.encode(data)
}
