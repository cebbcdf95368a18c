//! Speech synthesis seam.

use crate::error::{Result, RflinkError};
use async_trait::async_trait;

/// Synthesized audio ready for the playback sink.
#[derive(Debug, Clone)]
pub struct SynthAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl SynthAudio {
    /// Playback duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        let frames = self.samples.len() as u64 / self.channels.max(1) as u64;
        frames * 1000 / self.sample_rate.max(1) as u64
    }
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Renders text to PCM audio.
    async fn synthesize(&self, text: &str) -> Result<SynthAudio>;
}

/// Pipe-mode synthesizer: a quiet tone whose length scales with the
/// text, so transmit timing is realistic without a TTS engine.
pub struct ToneSynthesizer {
    sample_rate: u32,
    /// Milliseconds of tone per character of text.
    ms_per_char: u64,
}

impl ToneSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ms_per_char: 60,
        }
    }
}

#[async_trait]
impl Synthesizer for ToneSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthAudio> {
        let ms = (text.chars().count() as u64).max(1) * self.ms_per_char;
        let n = (self.sample_rate as u64 * ms / 1000) as usize;
        let samples: Vec<i16> = (0..n)
            .map(|i| {
                let phase = i as f64 * 2.0 * std::f64::consts::PI * 800.0 / self.sample_rate as f64;
                (phase.sin() * 6000.0) as i16
            })
            .collect();
        Ok(SynthAudio {
            samples,
            sample_rate: self.sample_rate,
            channels: 1,
        })
    }
}

/// Mock synthesizer with fixed output and failure injection.
pub struct MockSynthesizer {
    samples: Vec<i16>,
    sample_rate: u32,
    should_fail: bool,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            samples: vec![1000i16; 160],
            sample_rate: 16_000,
            should_fail: false,
        }
    }

    pub fn with_samples(mut self, samples: Vec<i16>) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<SynthAudio> {
        if self.should_fail {
            return Err(RflinkError::Synthesis {
                message: "mock synthesis failure".to_string(),
            });
        }
        Ok(SynthAudio {
            samples: self.samples.clone(),
            sample_rate: self.sample_rate,
            channels: 1,
        })
    }
}
