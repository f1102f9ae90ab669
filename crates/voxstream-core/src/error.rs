//! Engine error taxonomy.
//!
//! Every failure in this crate is scoped to the current utterance. None of
//! them is fatal to the outer connection.

use thiserror::Error;

/// A chunk payload could not be turned into audio.
///
/// Recovered locally: the single chunk is dropped and the sequence continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload is not valid base64.
    #[error("malformed audio payload: {0}")]
    InvalidEncoding(String),

    /// The payload decoded to zero bytes.
    #[error("audio payload is empty")]
    Empty,
}

/// The playback backend failed while consuming the chunk sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// The backend could not be started.
    #[error("failed to start playback: {0}")]
    StartFailed(String),

    /// The output device or stream failed mid-utterance.
    #[error("playback device failed: {0}")]
    Device(String),

    /// A chunk could not be rendered by the backend.
    #[error("unplayable audio chunk: {0}")]
    InvalidAudio(String),
}

/// The remote peer sent something that does not fit the session protocol.
///
/// Logged and treated as a no-op; there is no session state to mutate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Inbound message could not be parsed.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Stream-complete for an utterance that was already closed.
    #[error("stream-complete for '{0}' received after the session was closed")]
    DuplicateCompletion(String),

    /// Stream-complete while the active utterance is already completing.
    #[error("stream-complete for '{0}' received while the session is already completing")]
    AlreadyCompleting(String),
}

/// Umbrella error returned by the engine's inbound handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Configuration failed validation.
    #[error("invalid engine configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_is_transparent_over_sources() {
        let err: EngineError = DecodeError::Empty.into();
        assert_eq!(err.to_string(), "audio payload is empty");

        let err: EngineError = ProtocolError::DuplicateCompletion("utt-1".into()).into();
        assert!(err.to_string().contains("utt-1"));
    }
}
