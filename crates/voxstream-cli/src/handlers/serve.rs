//! Serve command handler.
//!
//! Runs the WebSocket transport against the chosen playback backend until
//! Ctrl-C.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use voxstream_axum::{CorsConfig, ServerConfig, SpeechContext, start_server};

use crate::bootstrap::{LogTranscriptSink, build_playback};
use crate::commands::ServeArgs;
use crate::settings::Settings;

/// Apply the command's flags on top of the configured server section.
pub fn server_config(settings: &Settings, args: &ServeArgs) -> ServerConfig {
    let mut server = settings.server.clone();
    if let Some(host) = &args.host {
        server.host.clone_from(host);
    }
    if let Some(port) = args.port {
        server.port = port;
    }
    if !args.allow_origins.is_empty() {
        server.cors = CorsConfig::AllowOrigins(args.allow_origins.clone());
    }
    server
}

/// Execute the serve command.
pub async fn execute(settings: &Settings, args: &ServeArgs) -> Result<()> {
    let server = server_config(settings, args);
    let playback = build_playback(args.backend, settings.audio)?;
    let context = SpeechContext::new(settings.engine, playback)?
        .with_transcripts(Arc::new(LogTranscriptSink));

    info!(
        backend = ?args.backend,
        watermark = settings.engine.buffer_watermark,
        sample_rate = settings.audio.sample_rate,
        channels = settings.audio.channels,
        "Starting speech server"
    );

    start_server(Arc::new(context), &server, shutdown_signal()).await?;
    info!("Speech server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
