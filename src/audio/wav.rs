//! PCM → WAV framing, plus the WAV transmit-audio archive sink.

use crate::audio::playback::PlaybackSink;
use crate::error::{Result, RflinkError};
use async_trait::async_trait;
use chrono::Local;
use std::io::Cursor;
use std::path::PathBuf;

/// Wraps mono 16-bit PCM samples in a WAV container.
pub fn pcm_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| RflinkError::Other(format!(
                "Failed to create WAV writer: {}",
                e
            )))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| RflinkError::Other(format!("Failed to write WAV sample: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| RflinkError::Other(format!("Failed to finalize WAV: {}", e)))?;
    }
    Ok(cursor.into_inner())
}

/// Playback sink that archives every transmission as a timestamped WAV
/// file instead of driving a device. Useful for audit and for pipe
/// mode, where keyed audio has nowhere real to go.
pub struct WavFileSink {
    dir: PathBuf,
}

impl WavFileSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl PlaybackSink for WavFileSink {
    async fn play(&self, samples: &[i16], sample_rate: u32, _channels: u16) -> Result<()> {
        let bytes = pcm_to_wav(samples, sample_rate)?;
        std::fs::create_dir_all(&self.dir)?;
        let name = format!("tx-{}.wav", Local::now().format("%Y%m%d-%H%M%S%.3f"));
        std::fs::write(self.dir.join(name), bytes)?;
        Ok(())
    }
}
