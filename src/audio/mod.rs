//! Audio primitives: frames, energy measurement, capture/playback seams.

pub mod capture;
pub mod energy;
pub mod frame;
pub mod playback;
pub mod wav;

pub use capture::{CaptureSource, ScriptedCaptureSource, StdinCaptureSource};
pub use energy::{calculate_rms, FrameSplitter};
pub use frame::{AudioFrame, Utterance};
pub use playback::{MockPlaybackSink, NullPlaybackSink, PlaybackSink};
pub use wav::{pcm_to_wav, WavFileSink};
