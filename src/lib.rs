//! rflink - half-duplex radio voice gateway
//!
//! Bridges a two-way radio audio channel to a conversational agent:
//! energy-based utterance segmentation on receive, transcript
//! normalization and transmit policy in the middle, strict push-to-talk
//! keying discipline on reply.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod agent;
pub mod app;
pub mod audio;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod keying;
pub mod logbook;
pub mod normalize;
pub mod orchestrator;
pub mod policy;
pub mod segmenter;
pub mod speech;
pub mod stt;

// Collaborator seams (capture → segment → transcribe → dispatch → transmit)
pub use agent::{AgentDispatch, EchoAgent, ReplyChunk, ReplyStream, TurnContext};
pub use audio::{CaptureSource, PlaybackSink};
pub use keying::{KeyLine, KeyingConfig, KeyingController, NullKeyLine};
pub use speech::{SynthAudio, Synthesizer};
pub use stt::Transcriber;

// Pipeline
pub use orchestrator::{Orchestrator, TxRequest, TxWorker, TxWorkerConfig};
pub use segmenter::runner::{CaptureRunner, RunnerConfig};
pub use segmenter::{ChannelActivity, EndReason, EnergySegmenter, MuteGate, SegmenterEvent};

// Error handling
pub use error::{Result, RflinkError};

// Config
pub use config::Config;

// Transmit policy
pub use policy::{PolicyDecision, TxPolicy};
