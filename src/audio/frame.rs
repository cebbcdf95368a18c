//! Frame and utterance types produced by the segmenter.

use std::time::Instant;

/// One fixed-duration slice of mono 16-bit PCM, tagged with its capture
/// timestamp and measured RMS energy. Immutable once produced.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Timestamp when the frame was captured.
    pub timestamp: Instant,
    /// Audio samples as 16-bit PCM.
    pub samples: Vec<i16>,
    /// Normalized RMS energy in [0, 1].
    pub energy: f32,
}

impl AudioFrame {
    pub fn new(timestamp: Instant, samples: Vec<i16>, energy: f32) -> Self {
        Self {
            timestamp,
            samples,
            energy,
        }
    }

    /// Returns the duration of this frame in milliseconds.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        (self.samples.len() as u32 * 1000) / sample_rate
    }
}

/// A contiguous speech segment from detected onset (including pre-roll)
/// to detected offset, concatenated into one PCM buffer.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Capture time of the first (pre-roll) frame.
    pub started_at: Instant,
    /// Concatenated PCM of all frames in the segment.
    pub samples: Vec<i16>,
    /// Total duration in milliseconds.
    pub duration_ms: u32,
}

impl Utterance {
    /// Builds an utterance by concatenating a frame sequence.
    pub fn from_frames(frames: &[AudioFrame], sample_rate: u32) -> Option<Self> {
        let first = frames.first()?;
        let samples: Vec<i16> = frames.iter().flat_map(|f| f.samples.iter().copied()).collect();
        let duration_ms = (samples.len() as u64 * 1000 / sample_rate as u64) as u32;
        Some(Self {
            started_at: first.timestamp,
            samples,
            duration_ms,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
