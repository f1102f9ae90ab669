//! End-to-end behaviour of the engine against in-process playback backends.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use voxstream_core::decode::encode_audio;
use voxstream_core::{
    ChannelSink, ChunkFeeder, ChunkMessage, CorrelationId, EngineConfig, EngineDeps, EngineEvent,
    OutboundMessage, PlaybackCallbacks, PlaybackError, PlaybackService, SessionState,
    SpeechEngine, StreamCompleteMessage,
};

// ── Test backends ──────────────────────────────────────────────────

/// Drains each feeder on a tokio task, recording the first byte of every
/// chunk. Optionally gives up after `per_run` chunks to simulate a device
/// that finishes early.
#[derive(Default)]
struct RecordingPlayback {
    played: Arc<Mutex<Vec<u8>>>,
    starts: AtomicUsize,
    active: Arc<AtomicBool>,
    per_run: Option<usize>,
}

impl RecordingPlayback {
    fn impatient(per_run: usize) -> Self {
        Self {
            per_run: Some(per_run),
            ..Self::default()
        }
    }

    fn played(&self) -> Vec<u8> {
        self.played.lock().unwrap().clone()
    }

    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl PlaybackService for RecordingPlayback {
    fn play(
        &self,
        mut feeder: ChunkFeeder,
        callbacks: PlaybackCallbacks,
    ) -> Result<(), PlaybackError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        let played = Arc::clone(&self.played);
        let active = Arc::clone(&self.active);
        let limit = self.per_run.unwrap_or(usize::MAX);

        tokio::spawn(async move {
            let mut taken = 0;
            while taken < limit {
                let Some(chunk) = feeder.next_chunk().await else {
                    break;
                };
                played.lock().unwrap().push(chunk.as_bytes()[0]);
                taken += 1;
            }
            active.store(false, Ordering::SeqCst);
            callbacks.complete();
        });
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn stop(&self) {}
}

/// Parks feeders so the test controls exactly when playback ends.
#[derive(Default)]
struct ManualPlayback {
    runs: Mutex<Vec<(ChunkFeeder, PlaybackCallbacks)>>,
}

impl ManualPlayback {
    fn take(&self) -> (ChunkFeeder, PlaybackCallbacks) {
        self.runs.lock().unwrap().remove(0)
    }
}

impl PlaybackService for ManualPlayback {
    fn play(
        &self,
        feeder: ChunkFeeder,
        callbacks: PlaybackCallbacks,
    ) -> Result<(), PlaybackError> {
        self.runs.lock().unwrap().push((feeder, callbacks));
        Ok(())
    }

    fn is_playing(&self) -> bool {
        !self.runs.lock().unwrap().is_empty()
    }

    fn stop(&self) {}
}

// ── Helpers ────────────────────────────────────────────────────────

struct Harness {
    engine: SpeechEngine,
    events: UnboundedReceiver<EngineEvent>,
    outbound: UnboundedReceiver<OutboundMessage>,
}

fn harness(watermark: usize, playback: Arc<dyn PlaybackService>) -> Harness {
    let (sink, outbound) = ChannelSink::new();
    let sink = Arc::new(sink);
    let deps = EngineDeps::new(playback)
        .with_acks(sink.clone())
        .with_errors(sink);
    let (engine, events) =
        SpeechEngine::new(EngineConfig::default().with_watermark(watermark), deps).unwrap();
    Harness {
        engine,
        events,
        outbound,
    }
}

fn chunk(id: &str, marker: u8) -> ChunkMessage {
    ChunkMessage {
        correlation_id: id.into(),
        encoded_audio: encode_audio(&[marker, 0]),
    }
}

fn complete(id: &str) -> StreamCompleteMessage {
    StreamCompleteMessage {
        correlation_id: id.into(),
    }
}

impl Harness {
    async fn until_acknowledged(&mut self) -> CorrelationId {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match self.events.recv().await {
                    Some(EngineEvent::Acknowledged { correlation_id, .. }) => {
                        return correlation_id;
                    }
                    Some(_) => {}
                    None => panic!("engine event channel closed"),
                }
            }
        })
        .await
        .expect("utterance should be acknowledged")
    }

    fn outbound(&mut self) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.outbound.try_recv() {
            out.push(msg);
        }
        out
    }

    fn acks(&mut self) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::PlaybackComplete { correlation_id } => {
                    Some(correlation_id.to_string())
                }
                OutboundMessage::Error { .. } => None,
            })
            .collect()
    }
}

// ── Scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_playback_starts_at_the_sixteenth_chunk() {
    let playback = Arc::new(RecordingPlayback::default());
    let mut h = harness(16, playback.clone());

    for n in 1..=15 {
        h.engine.handle_chunk(chunk("u1", n)).unwrap();
    }
    assert_eq!(playback.starts(), 0);
    assert_eq!(h.engine.state(), SessionState::Buffering);

    h.engine.handle_chunk(chunk("u1", 16)).unwrap();
    assert_eq!(playback.starts(), 1);
    assert_eq!(h.engine.state(), SessionState::Playing);

    for n in 17..=20 {
        h.engine.handle_chunk(chunk("u1", n)).unwrap();
        tokio::task::yield_now().await;
    }
    assert_eq!(playback.starts(), 1, "late chunks join the running feeder");

    h.engine.handle_stream_complete(complete("u1")).unwrap();
    h.until_acknowledged().await;

    assert_eq!(playback.played(), (1..=20).collect::<Vec<u8>>());
    assert_eq!(playback.starts(), 1);
}

#[tokio::test]
async fn scenario_b_stream_end_below_watermark_plays_everything() {
    let playback = Arc::new(RecordingPlayback::default());
    let mut h = harness(16, playback.clone());

    for n in 1..=5 {
        h.engine.handle_chunk(chunk("u1", n)).unwrap();
    }
    assert_eq!(playback.starts(), 0);

    h.engine.handle_stream_complete(complete("u1")).unwrap();
    assert_eq!(playback.starts(), 1, "starts immediately once the stream ends");

    let acked = h.until_acknowledged().await;
    assert_eq!(acked.as_str(), "u1");
    assert_eq!(playback.played(), vec![1, 2, 3, 4, 5]);
    assert_eq!(h.acks(), vec!["u1".to_string()]);
    assert_eq!(h.engine.state(), SessionState::Idle);
}

#[tokio::test]
async fn scenario_c_empty_stream_is_acknowledged_without_playback() {
    let playback = Arc::new(RecordingPlayback::default());
    let mut h = harness(16, playback.clone());

    h.engine.handle_stream_complete(complete("u1")).unwrap();

    assert_eq!(playback.starts(), 0);
    assert_eq!(h.acks(), vec!["u1".to_string()]);
    assert_eq!(h.engine.snapshot().acks_sent, 1);
}

#[tokio::test]
async fn scenario_d_undecodable_chunk_is_skipped() {
    let playback = Arc::new(RecordingPlayback::default());
    let mut h = harness(16, playback.clone());

    for n in 1..=10u8 {
        let id = format!("c{n}");
        let msg = if n == 3 {
            ChunkMessage {
                correlation_id: id.as_str().into(),
                encoded_audio: "%%%".into(),
            }
        } else {
            chunk(&id, n)
        };
        let result = h.engine.handle_chunk(msg);
        assert_eq!(result.is_err(), n == 3);
    }
    h.engine.handle_stream_complete(complete("u1")).unwrap();
    h.until_acknowledged().await;

    assert_eq!(playback.played(), vec![1, 2, 4, 5, 6, 7, 8, 9, 10]);

    let outbound = h.outbound();
    let errors: Vec<_> = outbound
        .iter()
        .filter_map(|m| match m {
            OutboundMessage::Error { correlation_id, .. } => Some(correlation_id.as_str()),
            OutboundMessage::PlaybackComplete { .. } => None,
        })
        .collect();
    assert_eq!(errors, vec!["c3"]);
    assert_eq!(outbound.len(), 2, "one error and one acknowledgment");
}

#[tokio::test]
async fn scenario_e_playback_failure_discards_queue_without_ack() {
    let playback = Arc::new(ManualPlayback::default());
    let mut h = harness(16, playback.clone());

    for n in 1..=24 {
        h.engine.handle_chunk(chunk("u1", n)).unwrap();
    }
    let (mut feeder, callbacks) = playback.take();
    for _ in 0..16 {
        feeder.next_chunk().await.unwrap();
    }
    assert_eq!(h.engine.snapshot().queued, 8);

    callbacks.fail(PlaybackError::Device("output stream closed".into()));

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.queued, 0);
    assert_eq!(snapshot.state, SessionState::Discarding);
    assert!(feeder.next_chunk().await.is_none());

    // The peer finishes the failed utterance; it is closed silently.
    h.engine.handle_stream_complete(complete("u1")).unwrap();
    assert_eq!(h.engine.state(), SessionState::Idle);

    let outbound = h.outbound();
    assert_eq!(outbound.len(), 1);
    assert!(matches!(
        &outbound[0],
        OutboundMessage::Error { correlation_id, message }
            if correlation_id.as_str() == "u1" && message.contains("output stream closed")
    ));
    assert_eq!(h.engine.snapshot().acks_sent, 0);
}

// ── Properties ─────────────────────────────────────────────────────

#[tokio::test]
async fn delivery_is_fifo_and_exactly_once_under_bursts() {
    let playback = Arc::new(RecordingPlayback::default());
    let mut h = harness(4, playback.clone());

    for n in 1..=120u8 {
        h.engine.handle_chunk(chunk("u1", n)).unwrap();
        if n % 7 == 0 {
            tokio::task::yield_now().await;
        }
    }
    h.engine.handle_stream_complete(complete("u1")).unwrap();
    h.until_acknowledged().await;

    assert_eq!(playback.played(), (1..=120).collect::<Vec<u8>>());
    assert_eq!(h.acks().len(), 1);
}

#[tokio::test]
async fn second_utterance_starts_with_an_empty_queue() {
    let playback = Arc::new(RecordingPlayback::default());
    let mut h = harness(2, playback.clone());

    for n in 1..=3 {
        h.engine.handle_chunk(chunk("u1", n)).unwrap();
    }
    h.engine.handle_stream_complete(complete("u1")).unwrap();
    h.until_acknowledged().await;
    let first = h.engine.snapshot().generation;

    h.engine.handle_chunk(chunk("u2", 50)).unwrap();
    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.queued, 1);
    assert_eq!(snapshot.generation, first + 1);
    assert_eq!(snapshot.state, SessionState::Buffering);

    h.engine.handle_chunk(chunk("u2", 51)).unwrap();
    h.engine.handle_stream_complete(complete("u2")).unwrap();
    h.until_acknowledged().await;

    assert_eq!(playback.played(), vec![1, 2, 3, 50, 51]);
    assert_eq!(h.acks(), vec!["u1".to_string(), "u2".to_string()]);
}

#[tokio::test]
async fn early_device_completion_restarts_the_feeder() {
    let playback = Arc::new(RecordingPlayback::impatient(2));
    let mut h = harness(4, playback.clone());

    for n in 1..=6 {
        h.engine.handle_chunk(chunk("u1", n)).unwrap();
    }
    h.engine.handle_stream_complete(complete("u1")).unwrap();
    h.until_acknowledged().await;

    assert_eq!(playback.played(), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(playback.starts(), 3);
    assert_eq!(h.acks(), vec!["u1".to_string()]);
}

#[tokio::test]
async fn new_utterance_supersedes_a_draining_one() {
    let playback = Arc::new(ManualPlayback::default());
    let mut h = harness(2, playback.clone());

    h.engine.handle_chunk(chunk("a", 1)).unwrap();
    h.engine.handle_chunk(chunk("a", 2)).unwrap();
    h.engine.handle_stream_complete(complete("a")).unwrap();
    assert_eq!(h.engine.state(), SessionState::Completing);

    h.engine.handle_chunk(chunk("b", 9)).unwrap();
    assert_eq!(h.engine.state(), SessionState::Buffering);
    assert_eq!(h.engine.snapshot().queued, 1);

    // The superseded feeder yields nothing more and its callback is ignored.
    let (mut old, old_callbacks) = playback.take();
    assert!(old.next_chunk().await.is_none());
    old_callbacks.complete();
    assert!(h.acks().is_empty());

    h.engine.handle_stream_complete(complete("b")).unwrap();
    let (mut feeder, callbacks) = playback.take();
    assert_eq!(feeder.next_chunk().await.unwrap().as_bytes()[0], 9);
    assert!(feeder.next_chunk().await.is_none());
    callbacks.complete();

    assert_eq!(h.acks(), vec!["b".to_string()]);
    let mut superseded = None;
    while let Ok(event) = h.events.try_recv() {
        if let EngineEvent::SessionSuperseded { generation, dropped } = event {
            superseded = Some((generation, dropped));
        }
    }
    assert_eq!(superseded, Some((1, 2)));
}

#[tokio::test]
async fn utterances_sharing_a_completion_id_are_each_acknowledged() {
    let playback = Arc::new(RecordingPlayback::default());
    let mut h = harness(16, playback.clone());

    for round in 0..2u8 {
        h.engine.handle_chunk(chunk("c1", round * 10 + 1)).unwrap();
        h.engine.handle_chunk(chunk("c2", round * 10 + 2)).unwrap();
        h.engine.handle_stream_complete(complete("stream")).unwrap();
        let acked = h.until_acknowledged().await;
        assert_eq!(acked.as_str(), "stream");
    }

    assert_eq!(playback.played(), vec![1, 2, 11, 12]);
    assert_eq!(playback.starts(), 2);
    assert_eq!(h.acks(), vec!["stream".to_string(), "stream".to_string()]);
    assert_eq!(h.engine.state(), SessionState::Idle);
}

#[tokio::test]
async fn repeated_completion_after_close_is_reported_not_acknowledged() {
    let playback = Arc::new(RecordingPlayback::default());
    let mut h = harness(16, playback.clone());

    h.engine.handle_chunk(chunk("u1", 1)).unwrap();
    h.engine.handle_stream_complete(complete("u1")).unwrap();
    h.until_acknowledged().await;

    assert!(h.engine.handle_stream_complete(complete("u1")).is_err());

    let outbound = h.outbound();
    assert_eq!(outbound.len(), 2);
    assert!(matches!(
        &outbound[0],
        OutboundMessage::PlaybackComplete { correlation_id } if correlation_id.as_str() == "u1"
    ));
    assert!(matches!(&outbound[1], OutboundMessage::Error { .. }));
    assert_eq!(h.engine.snapshot().acks_sent, 1);
    assert_eq!(h.engine.state(), SessionState::Idle);
}
