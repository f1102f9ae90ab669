//! Playback backend error types.

use voxstream_core::PlaybackError;

/// Errors raised while setting up or driving a playback backend.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// Backend was created outside a tokio runtime.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// Failed to open the audio output stream.
    #[error("Failed to open audio output stream: {0}")]
    OutputStreamError(String),

    /// The dedicated audio thread is no longer running.
    #[error("Audio thread is not running")]
    AudioThreadDied,

    /// Audio configuration failed validation.
    #[error("Invalid audio configuration: {0}")]
    InvalidConfig(String),
}

impl From<AudioError> for PlaybackError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::NoRuntime(_) | AudioError::InvalidConfig(_) => {
                Self::StartFailed(err.to_string())
            }
            AudioError::OutputStreamError(_) | AudioError::AudioThreadDied => {
                Self::Device(err.to_string())
            }
        }
    }
}
