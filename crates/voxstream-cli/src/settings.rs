//! Settings file plus command-line overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use voxstream_audio::AudioConfig;
use voxstream_axum::ServerConfig;
use voxstream_core::EngineConfig;

/// Everything the binary can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub engine: EngineConfig,
    pub audio: AudioConfig,
    pub server: ServerConfig,
}

/// Values given on the command line or through `VOXSTREAM_*`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Overrides {
    pub watermark: Option<usize>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub volume: Option<f32>,
}

impl Settings {
    /// Read `path` if given, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(watermark) = overrides.watermark {
            self.engine.buffer_watermark = watermark;
        }
        if let Some(sample_rate) = overrides.sample_rate {
            self.audio.sample_rate = sample_rate;
        }
        if let Some(channels) = overrides.channels {
            self.audio.channels = channels;
        }
        if let Some(volume) = overrides.volume {
            self.audio.volume = volume;
        }
        self
    }

    /// Reject values the engine or the audio backends would refuse later.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.audio.validate()?;
        Ok(())
    }
}
