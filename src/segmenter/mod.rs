//! Energy-based utterance segmentation over a continuous PCM stream.
//!
//! The segmenter slices incoming byte chunks into fixed-duration frames,
//! measures RMS energy per frame, and runs an onset/offset state machine
//! that turns the stream into discrete utterances: a pre-roll ring keeps
//! recent context from before the trigger frame, a hangover window ends
//! the utterance after sustained silence, and a hard cap splits very
//! long transmissions into consecutive segments.
//!
//! Duration accounting is done in frame units, so a scripted byte stream
//! produces the same segmentation regardless of wall-clock timing. The
//! injected [`Clock`] is only consulted for frame timestamps and the
//! transmit mute window.

pub mod runner;

use crate::audio::{calculate_rms, AudioFrame, FrameSplitter, Utterance};
use crate::config::{AudioConfig, SegmenterConfig};
use crate::defaults;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<Instant>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += duration;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Shared mute deadline. The transmit worker extends it to cover its
/// own audio before keying up; the segmenter refuses to trigger on
/// frames captured before the deadline. Half-duplex protection against
/// the gateway hearing itself.
#[derive(Clone, Default)]
pub struct MuteGate {
    until: Arc<Mutex<Option<Instant>>>,
}

impl MuteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extends the mute deadline. An earlier deadline never shortens a
    /// later one already in place.
    pub fn extend_until(&self, deadline: Instant) {
        let mut until = self.until.lock().unwrap_or_else(|e| e.into_inner());
        match *until {
            Some(existing) if existing >= deadline => {}
            _ => *until = Some(deadline),
        }
    }

    /// Whether `now` falls inside the mute window. Expired deadlines
    /// are cleared as a side effect.
    pub fn is_muted(&self, now: Instant) -> bool {
        let mut until = self.until.lock().unwrap_or_else(|e| e.into_inner());
        match *until {
            Some(deadline) if now < deadline => true,
            Some(_) => {
                *until = None;
                false
            }
            None => false,
        }
    }
}

/// Lock-free record of the last moment the channel carried energy
/// above the trigger threshold. The transmit queue polls this to wait
/// for a clear channel before keying up.
#[derive(Clone)]
pub struct ChannelActivity {
    base: Instant,
    last_ms: Arc<AtomicU64>,
}

impl ChannelActivity {
    pub fn new(base: Instant) -> Self {
        Self {
            base,
            last_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn mark(&self, now: Instant) {
        let ms = now.saturating_duration_since(self.base).as_millis() as u64;
        self.last_ms.fetch_max(ms, Ordering::Relaxed);
    }

    /// Time since the channel last carried above-threshold energy.
    pub fn idle_for(&self, now: Instant) -> Duration {
        let last = self.base + Duration::from_millis(self.last_ms.load(Ordering::Relaxed));
        now.saturating_duration_since(last)
    }
}

/// Why a recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Sustained silence after enough speech.
    Silence,
    /// Hard duration cap; the speaker may still be keyed, so the next
    /// frame can start a new segment immediately.
    MaxDuration,
}

/// Events emitted by [`EnergySegmenter::feed`], in stream order.
#[derive(Debug, Clone)]
pub enum SegmenterEvent {
    /// Per-frame RMS energy, emitted for every complete frame.
    Energy(f32),
    /// Onset: a new utterance is being recorded.
    RecordingStart { energy: f32, at: Instant },
    /// A frame belonging to the current utterance. Pre-roll frames are
    /// re-emitted first, in capture order.
    RecordingFrame(AudioFrame),
    /// Offset: the utterance ended.
    RecordingEnd {
        duration_ms: u64,
        silence_ms: u64,
        reason: EndReason,
        at: Instant,
    },
    /// The final concatenated utterance, unless discarded as spurious.
    Utterance(Utterance),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Recording,
}

/// Energy VAD state machine over a continuous byte stream.
pub struct EnergySegmenter<C: Clock = SystemClock> {
    splitter: FrameSplitter,
    config: SegmenterConfig,
    sample_rate: u32,
    frame_ms: u64,
    pre_roll_frames: usize,
    clock: C,
    mute: MuteGate,
    activity: ChannelActivity,

    state: State,
    pre_roll: VecDeque<AudioFrame>,
    frames: Vec<AudioFrame>,
    speech_ms: u64,
    silence_ms: u64,
    cooldown_remaining_ms: u64,
}

impl<C: Clock> EnergySegmenter<C> {
    pub fn with_clock(
        audio: &AudioConfig,
        config: SegmenterConfig,
        mute: MuteGate,
        activity: ChannelActivity,
        clock: C,
    ) -> Self {
        let frame_ms = audio.frame_ms.max(1) as u64;
        // At least one slot, so the trigger frame itself always makes
        // it into the utterance even with pre-roll disabled.
        let pre_roll_frames = (config.pre_roll_ms as usize)
            .div_ceil(frame_ms as usize)
            .max(1);
        Self {
            splitter: FrameSplitter::new(audio.sample_rate, audio.channels, audio.frame_ms),
            config,
            sample_rate: audio.sample_rate,
            frame_ms,
            pre_roll_frames,
            clock,
            mute,
            activity,
            state: State::Idle,
            pre_roll: VecDeque::with_capacity(pre_roll_frames + 1),
            frames: Vec::new(),
            speech_ms: 0,
            silence_ms: 0,
            cooldown_remaining_ms: 0,
        }
    }

    /// Feeds a raw little-endian PCM byte chunk and returns the events
    /// it produced. Incomplete trailing frames are carried to the next
    /// call; short or empty chunks simply produce no events.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SegmenterEvent> {
        let mut events = Vec::new();
        for samples in self.splitter.split(chunk) {
            self.process_frame(samples, &mut events);
        }
        events
    }

    fn process_frame(&mut self, samples: Vec<i16>, events: &mut Vec<SegmenterEvent>) {
        let energy = calculate_rms(&samples);
        let now = self.clock.now();
        let above = energy >= self.config.energy_threshold;
        if above {
            self.activity.mark(now);
        }
        events.push(SegmenterEvent::Energy(energy));

        let muted = self.mute.is_muted(now);
        let frame = AudioFrame {
            timestamp: now,
            samples,
            energy,
        };

        match self.state {
            State::Idle => {
                self.pre_roll.push_back(frame);
                while self.pre_roll.len() > self.pre_roll_frames {
                    self.pre_roll.pop_front();
                }

                if self.cooldown_remaining_ms > 0 {
                    self.cooldown_remaining_ms =
                        self.cooldown_remaining_ms.saturating_sub(self.frame_ms);
                    return;
                }
                if muted || !above {
                    return;
                }

                // Onset: seed with the pre-roll ring (the trigger frame
                // is already the newest entry).
                self.state = State::Recording;
                self.speech_ms = self.frame_ms;
                self.silence_ms = 0;
                self.frames = self.pre_roll.drain(..).collect();
                events.push(SegmenterEvent::RecordingStart { energy, at: now });
                for f in &self.frames {
                    events.push(SegmenterEvent::RecordingFrame(f.clone()));
                }
                debug!(energy, "recording started");
            }
            State::Recording => {
                if muted {
                    // Measured but never accumulated; counts as silence
                    // so a mute spanning the hangover still ends the
                    // segment.
                    self.silence_ms += self.frame_ms;
                } else {
                    if above {
                        self.speech_ms += self.frame_ms;
                        self.silence_ms = 0;
                    } else {
                        self.silence_ms += self.frame_ms;
                    }
                    self.frames.push(frame.clone());
                    events.push(SegmenterEvent::RecordingFrame(frame));
                }

                let total_ms = self.frames.len() as u64 * self.frame_ms;
                if self.speech_ms >= self.config.min_speech_ms as u64
                    && self.silence_ms >= self.config.max_silence_ms as u64
                {
                    self.finish(EndReason::Silence, now, events);
                } else if total_ms >= self.config.max_record_ms as u64 {
                    self.finish(EndReason::MaxDuration, now, events);
                }
            }
        }
    }

    fn finish(&mut self, reason: EndReason, now: Instant, events: &mut Vec<SegmenterEvent>) {
        let duration_ms = self.frames.len() as u64 * self.frame_ms;
        events.push(SegmenterEvent::RecordingEnd {
            duration_ms,
            silence_ms: self.silence_ms,
            reason,
            at: now,
        });
        debug!(duration_ms, ?reason, "recording ended");

        let mut frames = std::mem::take(&mut self.frames);
        // The hangover carries no speech; the transcriber only needs
        // pre-roll plus the burst itself.
        while frames
            .last()
            .is_some_and(|f| f.energy < self.config.energy_threshold)
        {
            frames.pop();
        }
        if let Some(utterance) = Utterance::from_frames(&frames, self.sample_rate) {
            if self.is_spurious(&utterance) {
                debug!(
                    duration_ms = utterance.duration_ms,
                    "discarding low-energy utterance"
                );
            } else {
                events.push(SegmenterEvent::Utterance(utterance));
            }
        }

        self.state = State::Idle;
        self.speech_ms = 0;
        self.silence_ms = 0;
        self.pre_roll.clear();
        // After a max-duration split the speaker may still be talking;
        // only a silence-terminated segment arms the cooldown.
        self.cooldown_remaining_ms = match reason {
            EndReason::Silence => self.config.start_cooldown_ms as u64,
            EndReason::MaxDuration => 0,
        };
    }

    /// A trigger that never carried real energy: RMS over the first
    /// second of the utterance below half the trigger threshold.
    fn is_spurious(&self, utterance: &Utterance) -> bool {
        let window = (self.sample_rate as usize).min(utterance.samples.len());
        if window == 0 {
            return true;
        }
        let rms = calculate_rms(&utterance.samples[..window]);
        rms < self.config.energy_threshold * defaults::DISCARD_RMS_FACTOR
    }

    /// Whether an utterance is currently being recorded.
    pub fn is_recording(&self) -> bool {
        self.state == State::Recording
    }

    /// Returns to idle and clears all buffered state, including any
    /// carried partial frame. Used after a capture restart.
    pub fn reset(&mut self) {
        self.splitter.reset();
        self.state = State::Idle;
        self.pre_roll.clear();
        self.frames.clear();
        self.speech_ms = 0;
        self.silence_ms = 0;
        self.cooldown_remaining_ms = 0;
    }
}

impl EnergySegmenter<SystemClock> {
    pub fn new(
        audio: &AudioConfig,
        config: SegmenterConfig,
        mute: MuteGate,
        activity: ChannelActivity,
    ) -> Self {
        Self::with_clock(audio, config, mute, activity, SystemClock)
    }
}
