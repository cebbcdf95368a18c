//! Receive-session state.
//!
//! One session covers everything between going idle and the debounced
//! finalize: the epoch counter that invalidates stale deferred work,
//! the rolling PCM window the partial transcriber reads from, and the
//! accumulated transcript fragments. Fragments deliberately survive an
//! epoch bump, so a fast stop/start flurry (or a max-duration split)
//! coalesces into a single finalized turn.

use crate::normalize::coalesce;
use crate::segmenter::EndReason;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RxSession {
    epoch: u64,
    recording: bool,
    fragments: Vec<String>,
    partial_text: String,
    window: Vec<i16>,
    window_max_samples: usize,
    last_fragment_at: Option<Instant>,
    last_end: Option<(Instant, EndReason)>,
    skip_next_utterance: bool,
}

impl RxSession {
    pub fn new(window_max_samples: usize) -> Self {
        Self {
            epoch: 0,
            recording: false,
            fragments: Vec::new(),
            partial_text: String::new(),
            window: Vec::new(),
            window_max_samples,
            last_fragment_at: None,
            last_end: None,
            skip_next_utterance: false,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Starts a new recording segment: bumps the epoch (cancelling any
    /// pending finalize or partial for the previous one) and clears the
    /// per-segment partial state. Fragments are kept.
    pub fn begin_recording(&mut self) -> u64 {
        self.epoch += 1;
        self.recording = true;
        self.partial_text.clear();
        self.window.clear();
        self.skip_next_utterance = false;
        self.epoch
    }

    pub fn end_recording(&mut self, at: Instant, reason: EndReason) {
        self.recording = false;
        self.last_end = Some((at, reason));
    }

    pub fn last_end(&self) -> Option<(Instant, EndReason)> {
        self.last_end
    }

    /// Appends samples to the rolling partial window, dropping the
    /// oldest samples past the bound.
    pub fn push_samples(&mut self, samples: &[i16]) {
        self.window.extend_from_slice(samples);
        if self.window.len() > self.window_max_samples {
            let excess = self.window.len() - self.window_max_samples;
            self.window.drain(..excess);
        }
    }

    pub fn window_snapshot(&self) -> Vec<i16> {
        self.window.clone()
    }

    pub fn set_partial(&mut self, text: String) {
        self.partial_text = text;
    }

    pub fn partial_text(&self) -> &str {
        &self.partial_text
    }

    pub fn take_partial(&mut self) -> String {
        std::mem::take(&mut self.partial_text)
    }

    /// Marks the next utterance event as already consumed (its text was
    /// taken from the streamed partial at a max-duration split).
    pub fn set_skip_next_utterance(&mut self) {
        self.skip_next_utterance = true;
    }

    pub fn take_skip_next_utterance(&mut self) -> bool {
        std::mem::take(&mut self.skip_next_utterance)
    }

    /// Appends a transcript fragment. When the previous fragment landed
    /// inside the adjacency window, the two are joined with the
    /// hyphen-aware coalescer (a word split across a max-duration
    /// boundary is glued back together).
    pub fn push_fragment(&mut self, text: &str, now: Instant, adjacency: Duration) {
        if text.is_empty() {
            return;
        }
        let adjacent = self
            .last_fragment_at
            .map(|t| now.saturating_duration_since(t) <= adjacency)
            .unwrap_or(false);
        if adjacent {
            if let Some(prev) = self.fragments.pop() {
                self.fragments.push(coalesce(&prev, text, true));
            } else {
                self.fragments.push(text.to_string());
            }
        } else {
            self.fragments.push(text.to_string());
        }
        self.last_fragment_at = Some(now);
    }

    pub fn has_fragments(&self) -> bool {
        !self.fragments.is_empty()
    }

    /// Joins and clears the accumulated fragments.
    pub fn take_transcript(&mut self) -> String {
        let text = self.fragments.join(" ");
        self.fragments.clear();
        self.last_fragment_at = None;
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_increments_per_recording() {
        let mut session = RxSession::new(16_000);
        assert_eq!(session.epoch(), 0);
        assert_eq!(session.begin_recording(), 1);
        let ended = Instant::now();
        session.end_recording(ended, EndReason::Silence);
        assert_eq!(session.last_end(), Some((ended, EndReason::Silence)));
        assert_eq!(session.begin_recording(), 2);
    }

    #[test]
    fn test_begin_recording_clears_partial_but_keeps_fragments() {
        let mut session = RxSession::new(16_000);
        session.begin_recording();
        session.set_partial("partial so far".to_string());
        session.push_fragment("first segment", Instant::now(), Duration::from_secs(2));

        session.begin_recording();
        assert!(session.partial_text().is_empty());
        assert!(session.has_fragments());
        assert_eq!(session.take_transcript(), "first segment");
    }

    #[test]
    fn test_window_bounded() {
        let mut session = RxSession::new(100);
        session.push_samples(&[1i16; 80]);
        session.push_samples(&[2i16; 80]);
        let window = session.window_snapshot();
        assert_eq!(window.len(), 100);
        // Oldest samples dropped
        assert_eq!(window[0], 1);
        assert_eq!(window[99], 2);
        assert_eq!(window.iter().filter(|s| **s == 2).count(), 80);
    }

    #[test]
    fn test_adjacent_fragments_coalesce() {
        let mut session = RxSession::new(16_000);
        let t0 = Instant::now();
        session.push_fragment("switching to frequen-", t0, Duration::from_millis(1_500));
        session.push_fragment("cy one four six", t0 + Duration::from_millis(500), Duration::from_millis(1_500));
        assert_eq!(
            session.take_transcript(),
            "switching to frequency one four six"
        );
    }

    #[test]
    fn test_distant_fragments_stay_separate() {
        let mut session = RxSession::new(16_000);
        let t0 = Instant::now();
        session.push_fragment("first call", t0, Duration::from_millis(1_500));
        session.push_fragment("second call", t0 + Duration::from_secs(10), Duration::from_millis(1_500));
        assert_eq!(session.take_transcript(), "first call second call");
    }

    #[test]
    fn test_take_transcript_clears() {
        let mut session = RxSession::new(16_000);
        session.push_fragment("hello", Instant::now(), Duration::from_secs(1));
        assert_eq!(session.take_transcript(), "hello");
        assert!(!session.has_fragments());
        assert_eq!(session.take_transcript(), "");
    }

    #[test]
    fn test_empty_fragment_ignored() {
        let mut session = RxSession::new(16_000);
        session.push_fragment("", Instant::now(), Duration::from_secs(1));
        assert!(!session.has_fragments());
    }

    #[test]
    fn test_skip_next_utterance_is_one_shot() {
        let mut session = RxSession::new(16_000);
        session.set_skip_next_utterance();
        assert!(session.take_skip_next_utterance());
        assert!(!session.take_skip_next_utterance());
    }
}
