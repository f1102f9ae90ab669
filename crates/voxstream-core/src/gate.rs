//! Buffering gate: decides when an accumulating utterance starts playing.

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Not enough audio yet; keep accumulating.
    Hold,
    /// Start the feeder against the playback backend now.
    Start,
    /// A feeder is already consuming the queue; new chunks are picked up by it.
    AlreadyPlaying,
}

/// Watermark check run after every successful enqueue and on stream end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferingGate {
    watermark: usize,
}

impl BufferingGate {
    pub const fn new(watermark: usize) -> Self {
        Self { watermark }
    }

    pub const fn watermark(&self) -> usize {
        self.watermark
    }

    /// Evaluate the gate.
    ///
    /// Once the stream is marked complete no more chunks will arrive, so any
    /// non-empty queue starts immediately regardless of the watermark.
    pub const fn evaluate(
        &self,
        playing: bool,
        queued: usize,
        stream_complete: bool,
    ) -> GateDecision {
        if playing {
            return GateDecision::AlreadyPlaying;
        }
        if queued == 0 {
            return GateDecision::Hold;
        }
        if stream_complete || queued >= self.watermark {
            GateDecision::Start
        } else {
            GateDecision::Hold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_below_watermark() {
        let gate = BufferingGate::new(16);
        assert_eq!(gate.evaluate(false, 15, false), GateDecision::Hold);
    }

    #[test]
    fn starts_at_watermark() {
        let gate = BufferingGate::new(16);
        assert_eq!(gate.evaluate(false, 16, false), GateDecision::Start);
        assert_eq!(gate.evaluate(false, 40, false), GateDecision::Start);
    }

    #[test]
    fn stream_end_starts_below_watermark() {
        let gate = BufferingGate::new(16);
        assert_eq!(gate.evaluate(false, 5, true), GateDecision::Start);
    }

    #[test]
    fn empty_queue_never_starts() {
        let gate = BufferingGate::new(1);
        assert_eq!(gate.evaluate(false, 0, true), GateDecision::Hold);
    }

    #[test]
    fn never_starts_a_second_feeder() {
        let gate = BufferingGate::new(16);
        assert_eq!(gate.evaluate(true, 100, true), GateDecision::AlreadyPlaying);
    }
}
