#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tokio_test as _;

#[cfg(feature = "local-audio")]
pub mod audio_thread;
pub mod config;
pub mod error;
pub mod headless;
#[cfg(feature = "local-audio")]
pub mod local;
pub mod pcm;
mod run;

// Re-export key types for convenience
pub use config::{AudioConfig, DEFAULT_SAMPLE_RATE};
pub use error::AudioError;
pub use headless::{HeadlessPlayback, Pacing, PlaybackStats};
#[cfg(feature = "local-audio")]
pub use local::LocalPlayback;
