//! Root CLI structure and global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;
use crate::settings::Overrides;

/// Buffer streamed speech audio and play it back in order.
#[derive(Debug, Parser)]
#[command(name = "voxstream")]
#[command(about = "Buffer streamed speech audio and acknowledge playback")]
#[command(version)]
pub struct Cli {
    /// JSON settings file; flags and environment variables override it
    #[arg(long, global = true, env = "VOXSTREAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Chunks to buffer before playback starts
    #[arg(long, global = true, env = "VOXSTREAM_BUFFER_WATERMARK")]
    pub watermark: Option<usize>,

    /// Sample rate of the incoming PCM16 audio
    #[arg(long = "sample-rate", global = true, env = "VOXSTREAM_SAMPLE_RATE")]
    pub sample_rate: Option<u32>,

    /// Interleaved channel count of the incoming audio
    #[arg(long, global = true, env = "VOXSTREAM_CHANNELS")]
    pub channels: Option<u16>,

    /// Output volume, 0.0 to 1.0
    #[arg(long, global = true, env = "VOXSTREAM_VOLUME")]
    pub volume: Option<f32>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Flags shared by every command that override the settings file.
    pub const fn overrides(&self) -> Overrides {
        Overrides {
            watermark: self.watermark,
            sample_rate: self.sample_rate,
            channels: self.channels,
            volume: self.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_args_after_subcommand() {
        let cli = Cli::parse_from(["voxstream", "replay", "log.ndjson", "--watermark", "4", "-v"]);
        assert!(cli.verbose);
        assert_eq!(cli.overrides().watermark, Some(4));
        assert!(matches!(cli.command, Commands::Replay(_)));
    }
}
