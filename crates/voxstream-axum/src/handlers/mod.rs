//! HTTP and WebSocket handlers.

pub mod speech;
pub mod speech_ws;
