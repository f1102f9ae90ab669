//! PCM16 little-endian → f32 conversion.

use std::time::Duration;

use voxstream_core::AudioChunk;

/// Convert raw PCM16 LE bytes to normalized f32 samples.
///
/// A trailing odd byte cannot form a sample and is dropped.
pub fn pcm16_le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect()
}

/// Decode one chunk's samples, warning when it carries a stray byte.
pub fn chunk_samples(chunk: &AudioChunk) -> Vec<f32> {
    if chunk.len() % 2 != 0 {
        tracing::warn!(
            correlation_id = %chunk.correlation_id(),
            bytes = chunk.len(),
            "Odd-length PCM16 chunk; dropping trailing byte"
        );
    }
    pcm16_le_to_f32(chunk.as_bytes())
}

/// Wall-clock time `samples` interleaved samples take to play.
pub fn play_duration(samples: usize, sample_rate: u32, channels: u16) -> Duration {
    let frames = u64::try_from(samples / usize::from(channels.max(1))).unwrap_or(u64::MAX);
    let rate = u64::from(sample_rate.max(1));
    Duration::from_micros(frames.saturating_mul(1_000_000) / rate)
}
