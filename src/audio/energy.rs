//! RMS energy measurement and byte-stream frame slicing.

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Returns
/// Normalized RMS value (0.0 to 1.0), where:
/// - 0.0 represents silence
/// - ~0.707 represents a full-scale sine wave
/// - 1.0 represents maximum amplitude
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

/// Slices an incoming raw byte stream into complete fixed-size PCM frames.
///
/// Leftover bytes that do not fill a full frame are carried forward and
/// prepended to the next chunk. Dropping them at each chunk boundary
/// would lose up to one frame of audio per capture read and skew the
/// offset timing.
#[derive(Debug)]
pub struct FrameSplitter {
    frame_bytes: usize,
    carry: Vec<u8>,
}

impl FrameSplitter {
    /// Creates a splitter for the given stream parameters.
    pub fn new(sample_rate: u32, channels: u16, frame_ms: u32) -> Self {
        let frame_bytes = (sample_rate as usize * frame_ms as usize / 1000)
            * channels as usize
            * std::mem::size_of::<i16>();
        Self {
            frame_bytes,
            carry: Vec::new(),
        }
    }

    /// Frame size in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// Splits a chunk into complete frames of i16 samples (little-endian),
    /// carrying any remainder to the next call.
    pub fn split(&mut self, chunk: &[u8]) -> Vec<Vec<i16>> {
        self.carry.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut offset = 0;
        while self.carry.len() - offset >= self.frame_bytes {
            let frame_bytes = &self.carry[offset..offset + self.frame_bytes];
            let samples: Vec<i16> = frame_bytes
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            frames.push(samples);
            offset += self.frame_bytes;
        }
        self.carry.drain(..offset);

        frames
    }

    /// Bytes currently held over for the next chunk.
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }

    /// Drops any held-over bytes. Used when the capture source restarts,
    /// since the remainder belongs to the dead stream.
    pub fn reset(&mut self) {
        self.carry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_rms_silence_is_zero() {
        assert_eq!(calculate_rms(&vec![0i16; 1000]), 0.0);
    }

    #[test]
    fn test_rms_empty_is_zero() {
        assert_eq!(calculate_rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_full_scale_square_wave() {
        // Alternating +max/-max is a square wave with RMS 1.0;
        // a half-scale square wave uses the 1/sqrt(2) sine identity below.
        let mut wave = Vec::new();
        for i in 0..1000 {
            wave.push(if i % 2 == 0 { i16::MAX } else { i16::MIN + 1 });
        }
        let rms = calculate_rms(&wave);
        assert!((rms - 1.0).abs() < 0.001, "RMS should be ~1.0, got {}", rms);
    }

    #[test]
    fn test_rms_full_scale_sine() {
        let wave: Vec<i16> = (0..16000)
            .map(|i| {
                let phase = i as f64 * 2.0 * std::f64::consts::PI * 440.0 / 16000.0;
                (phase.sin() * i16::MAX as f64) as i16
            })
            .collect();
        let rms = calculate_rms(&wave);
        let expected = 1.0 / 2f32.sqrt();
        assert!(
            (rms - expected).abs() < 0.01,
            "RMS should be ~{}, got {}",
            expected,
            rms
        );
    }

    #[test]
    fn test_rms_negative_samples() {
        let rms = calculate_rms(&vec![i16::MIN; 1000]);
        assert!(rms > 0.99, "RMS should be ~1.0 for i16::MIN, got {}", rms);
    }

    #[test]
    fn test_splitter_frame_size() {
        // 16kHz mono, 20ms -> 320 samples -> 640 bytes
        let splitter = FrameSplitter::new(16000, 1, 20);
        assert_eq!(splitter.frame_bytes(), 640);
    }

    #[test]
    fn test_splitter_exact_frames() {
        let mut splitter = FrameSplitter::new(16000, 1, 20);
        let samples: Vec<i16> = (0..640).map(|i| i as i16).collect();
        let frames = splitter.split(&to_bytes(&samples));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), 320);
        assert_eq!(frames[0][0], 0);
        assert_eq!(frames[1][0], 320);
        assert_eq!(splitter.pending_bytes(), 0);
    }

    #[test]
    fn test_splitter_carries_remainder() {
        let mut splitter = FrameSplitter::new(16000, 1, 20);

        // 1.5 frames worth of samples
        let samples: Vec<i16> = vec![7i16; 480];
        let frames = splitter.split(&to_bytes(&samples));
        assert_eq!(frames.len(), 1);
        assert_eq!(splitter.pending_bytes(), 320);

        // Next half frame completes the carried one
        let more: Vec<i16> = vec![9i16; 160];
        let frames = splitter.split(&to_bytes(&more));
        assert_eq!(frames.len(), 1);
        assert_eq!(splitter.pending_bytes(), 0);
        // Carried samples come first
        assert_eq!(frames[0][0], 7);
        assert_eq!(frames[0][319], 9);
    }

    #[test]
    fn test_splitter_odd_byte_carried() {
        let mut splitter = FrameSplitter::new(16000, 1, 20);
        let mut bytes = to_bytes(&vec![1i16; 320]);
        bytes.push(0xAB); // torn sample from a short read
        let frames = splitter.split(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(splitter.pending_bytes(), 1);
    }

    #[test]
    fn test_splitter_reset_drops_carry() {
        let mut splitter = FrameSplitter::new(16000, 1, 20);
        splitter.split(&to_bytes(&vec![1i16; 100]));
        assert!(splitter.pending_bytes() > 0);
        splitter.reset();
        assert_eq!(splitter.pending_bytes(), 0);
    }

    #[test]
    fn test_splitter_empty_chunk() {
        let mut splitter = FrameSplitter::new(16000, 1, 20);
        assert!(splitter.split(&[]).is_empty());
    }
}
