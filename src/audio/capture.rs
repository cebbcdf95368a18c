//! Capture source seam.
//!
//! The OS audio device is a black-box transport behind this trait; the
//! gateway only requires raw PCM byte chunks and a restartable
//! start/stop lifecycle.

use crate::error::{Result, RflinkError};
use std::io::Read;

/// Trait for raw audio byte sources.
///
/// This trait allows swapping implementations (real device bridge,
/// stdin pipe, scripted test source).
pub trait CaptureSource: Send {
    /// Start delivering audio.
    fn start(&mut self) -> Result<()>;

    /// Stop delivering audio.
    fn stop(&mut self) -> Result<()>;

    /// Read the next chunk of raw 16-bit little-endian PCM bytes.
    ///
    /// An empty chunk means no data is available yet. An error means
    /// the source died; the runner treats this as restartable failure.
    fn read_chunk(&mut self) -> Result<Vec<u8>>;
}

/// Scripted capture source for tests: returns configured chunks in
/// order, then empty reads (or a terminal failure).
pub struct ScriptedCaptureSource {
    chunks: Vec<Vec<u8>>,
    position: usize,
    is_started: bool,
    fail_start: bool,
    fail_after_chunks: bool,
    error_message: String,
    start_count: u32,
}

impl ScriptedCaptureSource {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            position: 0,
            is_started: false,
            fail_start: false,
            fail_after_chunks: false,
            error_message: "scripted capture error".to_string(),
            start_count: 0,
        }
    }

    /// Queue a chunk of raw bytes.
    pub fn with_chunk(mut self, chunk: Vec<u8>) -> Self {
        self.chunks.push(chunk);
        self
    }

    /// Queue a chunk of i16 samples (converted to little-endian bytes).
    pub fn with_samples(self, samples: &[i16]) -> Self {
        let bytes = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.with_chunk(bytes)
    }

    /// Fail the next start() call.
    pub fn with_start_failure(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Return an error once the scripted chunks run out, simulating a
    /// capture process that exits mid-stream.
    pub fn with_exit_after_chunks(mut self) -> Self {
        self.fail_after_chunks = true;
        self
    }

    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    pub fn is_started(&self) -> bool {
        self.is_started
    }

    /// Number of times start() succeeded; restarts increment this.
    pub fn start_count(&self) -> u32 {
        self.start_count
    }
}

impl Default for ScriptedCaptureSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for ScriptedCaptureSource {
    fn start(&mut self) -> Result<()> {
        if self.fail_start {
            self.fail_start = false; // fail once, then recover
            return Err(RflinkError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        self.is_started = true;
        self.start_count += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_chunk(&mut self) -> Result<Vec<u8>> {
        if self.position < self.chunks.len() {
            let chunk = self.chunks[self.position].clone();
            self.position += 1;
            Ok(chunk)
        } else if self.fail_after_chunks {
            Err(RflinkError::AudioCapture {
                message: self.error_message.clone(),
            })
        } else {
            Ok(Vec::new())
        }
    }
}

/// Capture source reading raw PCM from stdin (pipe mode):
/// `arecord -f S16_LE -r 16000 -c 1 | rflink`
pub struct StdinCaptureSource {
    buffer_size: usize,
    started: bool,
}

impl StdinCaptureSource {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            started: false,
        }
    }
}

impl CaptureSource for StdinCaptureSource {
    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn read_chunk(&mut self) -> Result<Vec<u8>> {
        if !self.started {
            return Ok(Vec::new());
        }
        let mut buffer = vec![0u8; self.buffer_size];
        let n = std::io::stdin().lock().read(&mut buffer)?;
        if n == 0 {
            // EOF: the feeding process went away.
            return Err(RflinkError::AudioCapture {
                message: "stdin closed".to_string(),
            });
        }
        buffer.truncate(n);
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_returns_chunks_in_order() {
        let mut source = ScriptedCaptureSource::new()
            .with_chunk(vec![1, 2])
            .with_chunk(vec![3, 4]);

        source.start().unwrap();
        assert_eq!(source.read_chunk().unwrap(), vec![1, 2]);
        assert_eq!(source.read_chunk().unwrap(), vec![3, 4]);
        // Exhausted: empty reads
        assert!(source.read_chunk().unwrap().is_empty());
    }

    #[test]
    fn test_scripted_source_samples_round_trip() {
        let mut source = ScriptedCaptureSource::new().with_samples(&[0x0102, -1]);
        let chunk = source.read_chunk().unwrap();
        assert_eq!(chunk, vec![0x02, 0x01, 0xFF, 0xFF]);
    }

    #[test]
    fn test_scripted_source_exit_after_chunks() {
        let mut source = ScriptedCaptureSource::new()
            .with_chunk(vec![1])
            .with_exit_after_chunks()
            .with_error_message("process exited");

        assert!(source.read_chunk().is_ok());
        let err = source.read_chunk().unwrap_err();
        assert!(err.to_string().contains("process exited"));
    }

    #[test]
    fn test_scripted_source_start_fails_once_then_recovers() {
        let mut source = ScriptedCaptureSource::new().with_start_failure();

        assert!(source.start().is_err());
        assert!(!source.is_started());

        // Restart succeeds
        assert!(source.start().is_ok());
        assert!(source.is_started());
        assert_eq!(source.start_count(), 1);
    }

    #[test]
    fn test_scripted_source_start_stop_state() {
        let mut source = ScriptedCaptureSource::new();
        assert!(!source.is_started());
        source.start().unwrap();
        assert!(source.is_started());
        source.stop().unwrap();
        assert!(!source.is_started());
    }

    #[test]
    fn test_capture_source_is_object_safe() {
        let mut source: Box<dyn CaptureSource> =
            Box::new(ScriptedCaptureSource::new().with_chunk(vec![9]));
        source.start().unwrap();
        assert_eq!(source.read_chunk().unwrap(), vec![9]);
    }
}
