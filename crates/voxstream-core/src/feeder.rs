//! Playback feeder: the continuous chunk sequence handed to the playback backend.
//!
//! ```text
//!   pull ─▶ queue non-empty ─▶ DRAINING (yield head)
//!        └▶ queue empty ─┬─▶ stream complete ─▶ DONE (end of sequence)
//!                        └─▶ otherwise ───────▶ WAITING (suspend until woken)
//! ```
//!
//! Waiting suspends only the task that pulls from the feeder. It is woken by
//! the engine on every enqueue, on stream completion and on session teardown,
//! so there is no polling interval.
//!
//! Each feeder holds a lease issued by the session. When the engine issues a
//! new lease (restart) or tears the session down, the old feeder reports DONE
//! on its next pull, so two feeders can never consume the same queue.

use std::sync::Arc;

use futures_util::Stream;

use crate::chunk::AudioChunk;
use crate::session::{Pull, SharedSession};

/// Observable feeder state, updated on every pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederState {
    /// Chunks were available on the last pull.
    Draining,
    /// Suspended on an empty queue with the stream still open.
    Waiting,
    /// Sequence terminated; every later pull returns `None`.
    Done,
}

/// Handle the playback backend pulls audio chunks from.
pub struct ChunkFeeder {
    shared: Arc<SharedSession>,
    lease: u64,
    generation: u64,
    state: FeederState,
    delivered: u64,
}

impl std::fmt::Debug for ChunkFeeder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkFeeder")
            .field("lease", &self.lease)
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("delivered", &self.delivered)
            .finish_non_exhaustive()
    }
}

impl ChunkFeeder {
    pub(crate) const fn new(shared: Arc<SharedSession>, lease: u64, generation: u64) -> Self {
        Self {
            shared,
            lease,
            generation,
            state: FeederState::Draining,
            delivered: 0,
        }
    }

    pub const fn state(&self) -> FeederState {
        self.state
    }

    /// Session generation (utterance) this feeder belongs to.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn lease(&self) -> u64 {
        self.lease
    }

    /// Chunks yielded so far.
    pub const fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Pull the next chunk, suspending while the queue is empty and the
    /// stream is still open. `None` terminates the sequence.
    pub async fn next_chunk(&mut self) -> Option<AudioChunk> {
        if self.state == FeederState::Done {
            return None;
        }

        loop {
            // Register interest before inspecting the queue so a wake that
            // lands between the check and the await is not lost.
            let mut notified = std::pin::pin!(self.shared.notified());
            notified.as_mut().enable();

            let pull = self.shared.lock().pull(self.lease);
            match pull {
                Pull::Chunk(chunk) => {
                    self.state = FeederState::Draining;
                    self.delivered += 1;
                    return Some(chunk);
                }
                Pull::Done => {
                    self.state = FeederState::Done;
                    tracing::debug!(
                        generation = self.generation,
                        lease = self.lease,
                        delivered = self.delivered,
                        "Feeder done"
                    );
                    return None;
                }
                Pull::Wait => {
                    if self.state != FeederState::Waiting {
                        tracing::trace!(generation = self.generation, "Feeder waiting");
                    }
                    self.state = FeederState::Waiting;
                }
            }

            notified.await;
        }
    }

    /// Adapt the feeder into a `Stream` of chunks.
    pub fn into_stream(self) -> impl Stream<Item = AudioChunk> + Send {
        futures_util::stream::unfold(self, |mut feeder| async move {
            feeder.next_chunk().await.map(|chunk| (chunk, feeder))
        })
    }
}
