//! Audio chunk and correlation identifier types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier the remote peer attaches to every message.
///
/// Opaque to the engine; it is only echoed back in acknowledgments and
/// error reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// One decoded fragment of synthesized audio.
///
/// Immutable once created. Owned by the queue until the feeder hands it to
/// the playback backend, which then owns it exclusively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    correlation_id: CorrelationId,
    data: Vec<u8>,
}

impl AudioChunk {
    pub fn new(correlation_id: impl Into<CorrelationId>, data: Vec<u8>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            data,
        }
    }

    pub const fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Raw audio bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume the chunk, yielding its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
