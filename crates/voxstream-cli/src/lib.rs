#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings
#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tokio_test as _;

// dotenvy is only called from main.rs
use dotenvy as _;

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;
pub mod settings;

// Re-export primary types for convenient access
pub use bootstrap::{Backend, LogTranscriptSink, build_playback, init_tracing};
pub use commands::{Commands, ReplayArgs, ServeArgs};
pub use parser::Cli;
pub use settings::{Overrides, Settings};
