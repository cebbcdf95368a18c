//! Transcription backend seam.
//!
//! The engine itself (local model, HTTP service, websocket stream) is
//! an external collaborator; the orchestrator only needs one call with
//! two usage patterns: low-latency rolling partials (short timeout,
//! best effort) and final-segment transcription (bounded timeout,
//! errors logged).

use crate::error::{Result, RflinkError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe mono 16-bit PCM at the configured sample rate.
    async fn transcribe(&self, audio: &[i16]) -> Result<String>;
}

#[async_trait]
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    async fn transcribe(&self, audio: &[i16]) -> Result<String> {
        (**self).transcribe(audio).await
    }
}

/// Runs a transcription call under a hard deadline.
///
/// The deadline is deliberately the caller's, not the backend's: a slow
/// backend bounds perceived reply latency instead of stalling finalize.
pub async fn transcribe_with_timeout<T: Transcriber>(
    transcriber: &T,
    audio: &[i16],
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(timeout, transcriber.transcribe(audio)).await {
        Ok(result) => result,
        Err(_) => Err(RflinkError::TranscriptionTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Transcriber stand-in for pipe mode, where no real engine is wired:
/// describes the received segment (length and level) instead of its
/// words, which is enough to exercise the full segment-dispatch-reply
/// loop end to end.
pub struct SummaryTranscriber {
    sample_rate: u32,
}

impl SummaryTranscriber {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

#[async_trait]
impl Transcriber for SummaryTranscriber {
    async fn transcribe(&self, audio: &[i16]) -> Result<String> {
        let seconds = audio.len() as f32 / self.sample_rate.max(1) as f32;
        let level = crate::audio::calculate_rms(audio);
        Ok(format!(
            "transmission received, {:.1} seconds at level {:.2}",
            seconds, level
        ))
    }
}

/// Mock transcriber for tests: scripted responses consumed in order
/// (the last one repeats), with optional latency and failure injection.
pub struct MockTranscriber {
    responses: Vec<String>,
    next: AtomicU32,
    calls: AtomicU32,
    delay: Option<Duration>,
    should_fail: bool,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self {
            responses: vec!["mock transcript".to_string()],
            next: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            delay: None,
            should_fail: false,
        }
    }

    /// Replace the scripted responses.
    pub fn with_responses(mut self, responses: &[&str]) -> Self {
        self.responses = responses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_response(self, response: &str) -> Self {
        self.with_responses(&[response])
    }

    /// Sleep this long before answering (for timeout tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Number of transcribe calls made so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _audio: &[i16]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(RflinkError::Transcription {
                message: "mock transcription failure".to_string(),
            });
        }
        let idx = self.next.fetch_add(1, Ordering::SeqCst) as usize;
        let idx = idx.min(self.responses.len().saturating_sub(1));
        Ok(self.responses.get(idx).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_scripted_responses_in_order() {
        let mock = MockTranscriber::new().with_responses(&["first", "second"]);
        assert_eq!(mock.transcribe(&[]).await.unwrap(), "first");
        assert_eq!(mock.transcribe(&[]).await.unwrap(), "second");
        // Last response repeats
        assert_eq!(mock.transcribe(&[]).await.unwrap(), "second");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockTranscriber::new().with_failure();
        assert!(mock.transcribe(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_timeout_wrapper_passes_fast_result() {
        let mock = MockTranscriber::new().with_response("quick");
        let text = transcribe_with_timeout(&mock, &[], Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(text, "quick");
    }

    #[tokio::test]
    async fn test_timeout_wrapper_enforces_deadline() {
        let mock = MockTranscriber::new()
            .with_response("slow")
            .with_delay(Duration::from_millis(200));
        let err = transcribe_with_timeout(&mock, &[], Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, RflinkError::TranscriptionTimeout { .. }));
    }

    #[tokio::test]
    async fn test_arc_transcriber_delegates() {
        let mock = Arc::new(MockTranscriber::new().with_response("shared"));
        assert_eq!(mock.transcribe(&[]).await.unwrap(), "shared");
    }

    #[tokio::test]
    async fn test_summary_transcriber_reports_length() {
        let stt = SummaryTranscriber::new(16_000);
        let text = stt.transcribe(&vec![3000i16; 24_000]).await.unwrap();
        assert!(text.contains("1.5 seconds"), "got: {}", text);
    }
}
