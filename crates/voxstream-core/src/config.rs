//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Chunks that must be queued before playback of an utterance begins.
pub const DEFAULT_BUFFER_WATERMARK: usize = 16;

/// Upper bound accepted by [`EngineConfig::validate`].
pub const MAX_BUFFER_WATERMARK: usize = 1024;

/// Tunables for the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Minimum buffered chunk count before playback may begin.
    ///
    /// Starting on the very first chunk stutters on jittery networks;
    /// waiting for a fixed amount smooths over inter-chunk arrival variance
    /// while bounding the added latency.
    pub buffer_watermark: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_watermark: DEFAULT_BUFFER_WATERMARK,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn with_watermark(mut self, watermark: usize) -> Self {
        self.buffer_watermark = watermark;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.buffer_watermark == 0 {
            return Err(EngineError::Config(
                "buffer_watermark must be at least 1".to_string(),
            ));
        }
        if self.buffer_watermark > MAX_BUFFER_WATERMARK {
            return Err(EngineError::Config(format!(
                "buffer_watermark must be at most {MAX_BUFFER_WATERMARK}, got {}",
                self.buffer_watermark
            )));
        }
        Ok(())
    }
}
