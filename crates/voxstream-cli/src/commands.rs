//! Subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use voxstream_audio::Pacing;

use crate::bootstrap::Backend;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Accept a speech stream over WebSocket and play it
    Serve(ServeArgs),

    /// Feed a newline-delimited JSON message log through the engine
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "VOXSTREAM_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, short, env = "VOXSTREAM_PORT")]
    pub port: Option<u16>,

    /// Where decoded audio goes
    #[arg(long, value_enum, default_value_t = Backend::Headless, env = "VOXSTREAM_BACKEND")]
    pub backend: Backend,

    /// Restrict CORS to these origins (repeatable); any origin if omitted
    #[arg(long = "allow-origin")]
    pub allow_origins: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Message log, one JSON message per line
    pub log: PathBuf,

    /// How fast the headless backend consumes audio
    #[arg(long, value_enum, default_value_t = PacingArg::Immediate)]
    pub pacing: PacingArg,

    /// Delay between consecutive messages, in milliseconds
    #[arg(long = "interval-ms", default_value_t = 0)]
    pub interval_ms: u64,

    /// Give up waiting for playback to finish after this many seconds
    #[arg(long = "drain-timeout", default_value_t = 10)]
    pub drain_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PacingArg {
    Immediate,
    Realtime,
}

impl From<PacingArg> for Pacing {
    fn from(arg: PacingArg) -> Self {
        match arg {
            PacingArg::Immediate => Self::Immediate,
            PacingArg::Realtime => Self::Realtime,
        }
    }
}
