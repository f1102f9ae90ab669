//! CLI bootstrap - the composition root.
//!
//! Concrete playback backends, sinks and the tracing subscriber are created
//! here; handlers only see `Arc<dyn PlaybackService>` and the engine.

use std::sync::Arc;

use anyhow::Result;
use clap::ValueEnum;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voxstream_audio::{AudioConfig, HeadlessPlayback, Pacing};
use voxstream_core::{PlaybackService, Transcript, TranscriptSink};

/// Where decoded audio is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Consume audio at playing speed without an output device.
    Headless,
    /// Play through the default output device.
    Local,
}

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins unless `verbose` is set; the fallback level is `info`.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Build the playback backend. Must be called within a tokio runtime.
pub fn build_playback(backend: Backend, audio: AudioConfig) -> Result<Arc<dyn PlaybackService>> {
    match backend {
        Backend::Headless => Ok(Arc::new(HeadlessPlayback::new(audio, Pacing::Realtime)?)),
        Backend::Local => local_playback(audio),
    }
}

#[cfg(feature = "local-audio")]
fn local_playback(audio: AudioConfig) -> Result<Arc<dyn PlaybackService>> {
    Ok(Arc::new(voxstream_audio::LocalPlayback::new(audio)?))
}

#[cfg(not(feature = "local-audio"))]
fn local_playback(_audio: AudioConfig) -> Result<Arc<dyn PlaybackService>> {
    anyhow::bail!("this binary was built without local audio output; rebuild with --features local-audio")
}

/// Writes transcripts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTranscriptSink;

impl TranscriptSink for LogTranscriptSink {
    fn append(&self, transcript: Transcript) {
        info!(
            correlation_id = %transcript.correlation_id,
            text = %transcript.text,
            "Transcript"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn headless_backend_builds() {
        let playback = build_playback(Backend::Headless, AudioConfig::default()).unwrap();
        assert!(!playback.is_playing());
    }

    #[cfg(not(feature = "local-audio"))]
    #[tokio::test]
    async fn local_backend_needs_the_feature() {
        let err = build_playback(Backend::Local, AudioConfig::default())
            .err()
            .expect("local backend should fail without the feature");
        assert!(err.to_string().contains("local-audio"));
    }

    #[tokio::test]
    async fn invalid_audio_config_is_rejected() {
        let audio = AudioConfig {
            volume: 2.0,
            ..AudioConfig::default()
        };
        assert!(build_playback(Backend::Headless, audio).is_err());
    }
}
