//! Playback sink seam.
//!
//! The playback device is a black-box collaborator: it accepts a PCM
//! buffer plus stream parameters and resolves when the audio has fully
//! played (the keying controller must not drop the key before then).

use crate::error::{Result, RflinkError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Play the buffer to completion. Errors on device failure.
    async fn play(&self, samples: &[i16], sample_rate: u32, channels: u16) -> Result<()>;
}

/// Sink that plays nothing but takes as long as the audio would.
///
/// Used in pipe/RX-only mode so transmit timing (mute windows, keying
/// lead/tail) still behaves realistically without an output device.
pub struct NullPlaybackSink;

#[async_trait]
impl PlaybackSink for NullPlaybackSink {
    async fn play(&self, samples: &[i16], sample_rate: u32, channels: u16) -> Result<()> {
        let frames = samples.len() as u64 / channels.max(1) as u64;
        let ms = frames * 1000 / sample_rate.max(1) as u64;
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }
}

/// Recording mock for tests.
pub struct MockPlaybackSink {
    played: Arc<Mutex<Vec<usize>>>,
    should_fail: bool,
}

impl MockPlaybackSink {
    pub fn new() -> Self {
        Self {
            played: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
        }
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Sample counts of every buffer played so far.
    pub fn played_lengths(&self) -> Vec<usize> {
        self.played.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MockPlaybackSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaybackSink for MockPlaybackSink {
    async fn play(&self, samples: &[i16], _sample_rate: u32, _channels: u16) -> Result<()> {
        if self.should_fail {
            return Err(RflinkError::Playback {
                message: "mock playback failure".to_string(),
            });
        }
        self.played
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(samples.len());
        Ok(())
    }
}
