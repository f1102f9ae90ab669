//! Replay command handler.
//!
//! Feeds a recorded message log through a fresh engine backed by headless
//! playback and writes every outbound message to `out`, one JSON object per
//! line. Lines are dispatched back to back unless an interval is given, so a
//! log with several utterances behaves like a burst from the peer.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use voxstream_audio::HeadlessPlayback;
use voxstream_core::{
    ChannelSink, EngineDeps, EngineError, EngineEvent, InboundMessage, OutboundMessage,
    SessionState, SpeechEngine,
};

use crate::bootstrap::LogTranscriptSink;
use crate::commands::ReplayArgs;
use crate::settings::Settings;

/// What happened during a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Non-blank, non-comment lines read.
    pub messages: usize,
    /// Lines the engine refused (malformed, undecodable or out of order).
    pub rejected: usize,
    pub acks: usize,
    pub errors: usize,
    /// Chunks the headless backend consumed.
    pub chunks_played: u64,
    /// Whether the engine was idle before the drain timeout.
    pub drained: bool,
}

impl ReplayReport {
    fn record(&mut self, message: &OutboundMessage) {
        match message {
            OutboundMessage::PlaybackComplete { .. } => self.acks += 1,
            OutboundMessage::Error { .. } => self.errors += 1,
        }
    }
}

fn handle_line(engine: &SpeechEngine, line: &str) -> Result<(), EngineError> {
    engine.dispatch(InboundMessage::parse(line)?)
}

fn write_message<W: Write>(out: &mut W, message: &OutboundMessage) -> Result<()> {
    writeln!(out, "{}", message.to_json()?)?;
    Ok(())
}

/// Wait until the session returns to idle or `deadline` passes.
async fn wait_for_idle(
    engine: &SpeechEngine,
    events: &mut UnboundedReceiver<EngineEvent>,
    deadline: Instant,
) -> bool {
    loop {
        if engine.state() == SessionState::Idle {
            return true;
        }
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Some(event)) => debug!(?event, "Engine event"),
            Ok(None) | Err(_) => return engine.state() == SessionState::Idle,
        }
    }
}

/// Execute the replay command.
pub async fn execute<W: Write>(
    settings: &Settings,
    args: &ReplayArgs,
    out: &mut W,
) -> Result<ReplayReport> {
    let file = File::open(&args.log)
        .with_context(|| format!("Failed to open replay log {}", args.log.display()))?;

    let playback = Arc::new(HeadlessPlayback::new(settings.audio, args.pacing.into())?);
    let (sink, mut outbound) = ChannelSink::new();
    let sink = Arc::new(sink);
    let deps = EngineDeps::new(playback.clone())
        .with_acks(sink.clone())
        .with_errors(sink)
        .with_transcripts(Arc::new(LogTranscriptSink));
    let (engine, mut events) = SpeechEngine::new(settings.engine, deps)?;

    let interval = Duration::from_millis(args.interval_ms);
    let mut report = ReplayReport::default();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        report.messages += 1;
        if report.messages > 1 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }

        if let Err(e) = handle_line(&engine, line) {
            report.rejected += 1;
            warn!(line = index + 1, error = %e, "Message rejected");
        }

        while let Ok(message) = outbound.try_recv() {
            report.record(&message);
            write_message(out, &message)?;
        }
    }

    let deadline = Instant::now() + Duration::from_secs(args.drain_timeout_secs);
    report.drained = wait_for_idle(&engine, &mut events, deadline).await;
    if !report.drained {
        warn!(state = ?engine.state(), "Playback still pending at drain timeout; tearing down");
        engine.shutdown();
    }

    // The outbound channel closes once the last engine handle is gone.
    drop(engine);
    while let Some(message) = outbound.recv().await {
        report.record(&message);
        write_message(out, &message)?;
    }

    report.chunks_played = playback.stats().chunks;
    info!(
        messages = report.messages,
        rejected = report.rejected,
        acks = report.acks,
        errors = report.errors,
        chunks_played = report.chunks_played,
        drained = report.drained,
        "Replay finished"
    );
    Ok(report)
}
