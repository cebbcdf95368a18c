//! Default tuning constants for rflink.
//!
//! Shared across the config types so that the TOML file, the env
//! overrides and the builders all agree on one set of defaults.

/// Default audio sample rate in Hz.
///
/// 16kHz mono is the standard rate for speech recognition backends and
/// is what narrow-band radio audio carries anyway.
pub const SAMPLE_RATE: u32 = 16_000;

/// Number of audio channels. Radio audio is mono.
pub const CHANNELS: u16 = 1;

/// Segmentation frame duration in milliseconds.
pub const FRAME_MS: u32 = 20;

/// RMS energy threshold (0.0 to 1.0) above which a frame counts as speech.
///
/// Tuned for typical discriminator audio levels; squelch tails and
/// ambient hiss sit well below this.
pub const ENERGY_THRESHOLD: f32 = 0.02;

/// Pre-roll buffer duration in milliseconds.
///
/// Frames kept in a ring while idle and prepended on speech onset so
/// the first syllables are never clipped.
pub const PRE_ROLL_MS: u32 = 400;

/// Required sub-threshold duration in milliseconds before a recording ends.
pub const MAX_SILENCE_MS: u32 = 900;

/// Minimum accumulated speech in milliseconds before silence may end a recording.
pub const MIN_SPEECH_MS: u32 = 400;

/// Hard cap on a single recording in milliseconds.
///
/// A very long over is chopped here and continues as the next fragment;
/// the fragments are joined again at finalize.
pub const MAX_RECORD_MS: u32 = 30_000;

/// Cooldown after a silence-ended recording before a new onset may trigger.
///
/// Debounces re-triggering on our own transmit tail or a squelch crash
/// right after an utterance.
pub const START_COOLDOWN_MS: u32 = 1_000;

/// Minimum RMS over the first second of an utterance, as a fraction of
/// the speech threshold, for the utterance to be kept.
///
/// Utterances below half the speech threshold are transient noise
/// (doorbumps, squelch bursts) and are discarded before transcription.
pub const DISCARD_RMS_FACTOR: f32 = 0.5;

/// Interval between rolling partial-transcription calls in milliseconds.
pub const PARTIAL_INTERVAL_MS: u64 = 1_000;

/// Rolling audio window handed to partial transcription, in milliseconds.
pub const PARTIAL_WINDOW_MS: u32 = 8_000;

/// Partial transcript length (chars) at which the final blocking
/// transcription call is skipped as redundant.
pub const PARTIAL_MIN_CHARS: usize = 24;

/// Timeout for a rolling partial transcription call in milliseconds.
pub const PARTIAL_TIMEOUT_MS: u64 = 900;

/// Timeout for the final blocking transcription call in milliseconds.
///
/// Deliberately shorter than a backend's own overall timeout so a slow
/// backend bounds perceived reply latency instead of stalling finalize.
pub const FINAL_STT_TIMEOUT_MS: u64 = 6_000;

/// Debounce before a silence-ended session finalizes, in milliseconds.
///
/// Coalesces a flurry of start/stop pairs from one breath pause into a
/// single finalize.
pub const FINALIZE_DEBOUNCE_MS: u64 = 350;

/// Window within which two consecutive fragments count as temporally
/// adjacent for the word-join heuristic, in milliseconds.
pub const ADJACENCY_WINDOW_MS: u64 = 1_500;

/// PTT lead time: key-up to start of audio, in milliseconds.
pub const PTT_LEAD_MS: u64 = 250;

/// PTT tail time: end of audio to key-down, in milliseconds.
pub const PTT_TAIL_MS: u64 = 150;

/// Extra mute margin past key-down, in milliseconds.
///
/// Absorbs playback-device latency so the TX tail never re-triggers RX.
pub const MUTE_MARGIN_MS: u64 = 400;

/// Required idle time on the channel before transmitting, in milliseconds.
pub const CHANNEL_CLEAR_MS: u64 = 700;

/// Upper bound on waiting for a clear channel, in milliseconds.
///
/// After this we transmit anyway; replies must not be starved forever
/// by a busy channel.
pub const CHANNEL_MAX_WAIT_MS: u64 = 10_000;

/// Delay before replying to traffic that did not address us directly.
pub const REPLY_DELAY_MS: u64 = 2_000;

/// Hard cap on a single transmitted reply chunk, in characters.
pub const REPLY_MAX_CHARS: usize = 220;

/// Backoff between capture restart attempts, in milliseconds.
pub const CAPTURE_RESTART_BACKOFF_MS: u64 = 2_000;

/// Capture stall threshold as a multiple of the frame duration.
pub const STALL_FRAMES: u32 = 100;
