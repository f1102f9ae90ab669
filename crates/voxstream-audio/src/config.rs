//! Output format and volume.

use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// Sample rate most speech-synthesis services stream at.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Format of the decoded chunks and how loudly to play them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioConfig {
    /// Samples per second per channel.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Output gain, 0.0 (muted) to 1.0 (full).
    pub volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            volume: 1.0,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<(), AudioError> {
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(AudioError::InvalidConfig(format!(
                "sample rate {} Hz is outside 8000..=192000",
                self.sample_rate
            )));
        }
        if !(1..=8).contains(&self.channels) {
            return Err(AudioError::InvalidConfig(format!(
                "channel count {} is outside 1..=8",
                self.channels
            )));
        }
        if !self.volume.is_finite() || !(0.0..=1.0).contains(&self.volume) {
            return Err(AudioError::InvalidConfig(format!(
                "volume {} is outside 0.0..=1.0",
                self.volume
            )));
        }
        Ok(())
    }
}
