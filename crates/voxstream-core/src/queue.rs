//! Chunk queue: ordered buffer of pending audio chunks.
//!
//! Insertion order is playback order. A chunk removed from the queue is
//! never re-inserted, and no chunk is read without being removed.

use std::collections::VecDeque;

use crate::chunk::AudioChunk;

#[derive(Debug, Default)]
pub struct ChunkQueue {
    chunks: VecDeque<AudioChunk>,
}

impl ChunkQueue {
    pub const fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
        }
    }

    /// Append to the tail. Never blocks.
    pub fn enqueue(&mut self, chunk: AudioChunk) {
        self.chunks.push_back(chunk);
    }

    /// Remove and return the head chunk.
    pub fn dequeue_one(&mut self) -> Option<AudioChunk> {
        self.chunks.pop_front()
    }

    /// Remove and return every pending chunk, in order.
    pub fn dequeue_all(&mut self) -> Vec<AudioChunk> {
        self.chunks.drain(..).collect()
    }

    /// Discard all pending chunks, returning how many were dropped.
    pub fn reset(&mut self) -> usize {
        let dropped = self.chunks.len();
        self.chunks.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total bytes currently buffered.
    pub fn buffered_bytes(&self) -> usize {
        self.chunks.iter().map(AudioChunk::len).sum()
    }
}
