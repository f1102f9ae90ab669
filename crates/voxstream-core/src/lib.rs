#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod chunk;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod events;
pub mod feeder;
pub mod gate;
pub mod messages;
pub mod ports;
pub mod queue;
pub mod session;

// Re-export key types for convenience
pub use chunk::{AudioChunk, CorrelationId};
pub use config::{DEFAULT_BUFFER_WATERMARK, EngineConfig};
pub use engine::{EngineDeps, SpeechEngine};
pub use error::{DecodeError, EngineError, PlaybackError, ProtocolError};
pub use events::EngineEvent;
pub use feeder::{ChunkFeeder, FeederState};
pub use messages::{
    ChunkMessage, InboundMessage, OutboundMessage, StreamCompleteMessage, TranscriptMessage,
};
pub use ports::{
    AckSink, ChannelSink, ErrorKind, ErrorReport, ErrorSink, NoopAckSink, NoopErrorSink,
    NoopTranscriptSink, PlaybackAck, PlaybackCallbacks, PlaybackService, Transcript,
    TranscriptSink,
};
pub use session::{PlaybackSession, SessionSnapshot, SessionState};
