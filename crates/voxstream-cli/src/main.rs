//! CLI entry point - the composition root.

use anyhow::Result;
use clap::Parser;

use voxstream_cli::{Cli, Commands, Settings, handlers, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so VOXSTREAM_* fallbacks see it
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?.with_overrides(cli.overrides());
    settings.validate()?;

    match &cli.command {
        Commands::Serve(args) => handlers::serve::execute(&settings, args).await?,
        Commands::Replay(args) => {
            let mut stdout = std::io::stdout();
            let report = handlers::replay::execute(&settings, args, &mut stdout).await?;
            if !report.drained {
                anyhow::bail!("replay ended before playback finished");
            }
        }
    }

    Ok(())
}
