//! Wire messages exchanged with the remote speech service.
//!
//! JSON, internally tagged by `"type"`, camelCase fields.

use serde::{Deserialize, Serialize};

use crate::chunk::CorrelationId;
use crate::error::ProtocolError;

/// One encoded audio fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMessage {
    pub correlation_id: CorrelationId,
    /// Base64 (standard alphabet) encoded PCM.
    pub encoded_audio: String,
}

/// No further chunks will arrive for the current utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCompleteMessage {
    pub correlation_id: CorrelationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMessage {
    pub correlation_id: CorrelationId,
    pub text: String,
}

/// Messages the remote peer sends to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    AudioChunk(ChunkMessage),
    StreamComplete(StreamCompleteMessage),
    Transcript(TranscriptMessage),
}

impl InboundMessage {
    /// Parse a single JSON text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    pub const fn correlation_id(&self) -> &CorrelationId {
        match self {
            Self::AudioChunk(m) => &m.correlation_id,
            Self::StreamComplete(m) => &m.correlation_id,
            Self::Transcript(m) => &m.correlation_id,
        }
    }
}

/// Messages the engine sends back to the remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Completion acknowledgment: the utterance finished playing.
    #[serde(rename_all = "camelCase")]
    PlaybackComplete { correlation_id: CorrelationId },

    #[serde(rename_all = "camelCase")]
    Error {
        correlation_id: CorrelationId,
        message: String,
    },
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_audio_chunk() {
        let msg = InboundMessage::parse(
            r#"{"type":"audio_chunk","correlationId":"u1","encodedAudio":"AAE="}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            InboundMessage::AudioChunk(ChunkMessage {
                correlation_id: "u1".into(),
                encoded_audio: "AAE=".into(),
            })
        );
        assert_eq!(msg.correlation_id().as_str(), "u1");
    }

    #[test]
    fn parses_stream_complete_and_transcript() {
        let msg = InboundMessage::parse(r#"{"type":"stream_complete","correlationId":"u1"}"#)
            .unwrap();
        assert!(matches!(msg, InboundMessage::StreamComplete(_)));

        let msg =
            InboundMessage::parse(r#"{"type":"transcript","correlationId":"u1","text":"hi"}"#)
                .unwrap();
        assert!(matches!(msg, InboundMessage::Transcript(t) if t.text == "hi"));
    }

    #[test]
    fn unknown_type_is_malformed() {
        let err = InboundMessage::parse(r#"{"type":"bogus"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
        assert!(InboundMessage::parse("not json").is_err());
    }

    #[test]
    fn outbound_wire_shape() {
        let ack = OutboundMessage::PlaybackComplete {
            correlation_id: "u1".into(),
        };
        assert_eq!(
            ack.to_json().unwrap(),
            r#"{"type":"playback_complete","correlationId":"u1"}"#
        );

        let err = OutboundMessage::Error {
            correlation_id: "c3".into(),
            message: "bad".into(),
        };
        let json: serde_json::Value = serde_json::from_str(&err.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["correlationId"], "c3");
        assert_eq!(json["message"], "bad");
    }
}
