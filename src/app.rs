//! Composition root: wires capture, segmentation, orchestration and
//! the transmit worker into a running gateway.

use crate::agent::{AgentDispatch, EchoAgent};
use crate::audio::{CaptureSource, NullPlaybackSink, PlaybackSink, StdinCaptureSource, WavFileSink};
use crate::config::Config;
use crate::error::Result;
use crate::keying::{KeyLine, KeyingConfig, KeyingController, NullKeyLine};
use crate::logbook::Logbook;
use crate::orchestrator::{Orchestrator, TxWorker, TxWorkerConfig};
use crate::segmenter::runner::{CaptureRunner, RunnerConfig};
use crate::segmenter::{ChannelActivity, EnergySegmenter, MuteGate};
use crate::speech::{Synthesizer, ToneSynthesizer};
use crate::stt::{SummaryTranscriber, Transcriber};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::info;

/// The pluggable collaborators a gateway runs with. The library user
/// (or the pipe-mode binary) supplies the engines; everything inside
/// the seams is owned here.
pub struct Collaborators<S: CaptureSource + 'static, K: KeyLine + 'static> {
    pub source: S,
    pub key_line: K,
    pub transcriber: Arc<dyn Transcriber>,
    pub agent: Arc<dyn AgentDispatch>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub playback: Arc<dyn PlaybackSink>,
    pub runner: RunnerConfig,
}

/// Runs the gateway until the capture source is exhausted, then flushes
/// pending work and shuts the transmit side down cleanly.
pub async fn run_gateway<S, K>(config: Config, parts: Collaborators<S, K>) -> Result<()>
where
    S: CaptureSource + 'static,
    K: KeyLine + 'static,
{
    let mute = MuteGate::new();
    let activity = ChannelActivity::new(Instant::now());
    let logbook = Arc::new(Logbook::new(config.log.transcript_dir.clone()));

    let segmenter = EnergySegmenter::new(
        &config.audio,
        config.segmenter.clone(),
        mute.clone(),
        activity.clone(),
    );
    let runner = CaptureRunner::new(parts.source, segmenter, parts.runner);

    let keying = KeyingController::new(
        parts.key_line,
        KeyingConfig {
            lead: Duration::from_millis(config.tx.lead_ms),
            tail: Duration::from_millis(config.tx.tail_ms),
            rts_enabled: config.tx.rts_enabled,
        },
    );
    let worker = TxWorker::new(
        keying,
        parts.synthesizer,
        parts.playback,
        mute,
        activity,
        logbook.clone(),
        TxWorkerConfig {
            channel_clear: Duration::from_millis(config.tx.channel_clear_ms),
            channel_max_wait: Duration::from_millis(config.tx.channel_max_wait_ms),
            ..TxWorkerConfig::default()
        },
    );

    let (event_tx, event_rx) = mpsc::channel(256);
    let (tx_queue, tx_requests) = mpsc::channel(16);
    let orchestrator = Orchestrator::new(
        config,
        parts.transcriber,
        parts.agent,
        logbook,
        tx_queue,
    );

    info!("gateway up");
    let runner_handle = tokio::spawn(runner.run(event_tx));
    let worker_handle = tokio::spawn(worker.run(tx_requests));

    orchestrator.run(event_rx).await;
    let _ = runner_handle.await;
    // The worker drains once every queue sender (orchestrator and its
    // dispatch tasks) is gone.
    let _ = worker_handle.await;
    info!("gateway down");
    Ok(())
}

/// Pipe mode: raw PCM on stdin, a summarizing transcriber, the echo
/// agent, and tone synthesis played without keying any hardware.
/// Exercises the whole RX/TX path with no radio attached.
pub async fn run_pipe_gateway(config: Config) -> Result<()> {
    let sample_rate = config.audio.sample_rate;
    // Roughly 100ms of audio per read keeps stdin latency low.
    let chunk_bytes = (sample_rate as usize * config.audio.channels as usize * 2) / 10;
    // With a logbook directory configured, keyed audio is archived as
    // WAV next to the transcripts; otherwise it is timed and dropped.
    let playback: Arc<dyn PlaybackSink> = match &config.log.transcript_dir {
        Some(dir) => Arc::new(WavFileSink::new(dir.join("tx-audio"))),
        None => Arc::new(NullPlaybackSink),
    };
    run_gateway(
        config,
        Collaborators {
            source: StdinCaptureSource::new(chunk_bytes.max(640)),
            key_line: NullKeyLine::default(),
            transcriber: Arc::new(SummaryTranscriber::new(sample_rate)),
            agent: Arc::new(EchoAgent),
            synthesizer: Arc::new(ToneSynthesizer::new(sample_rate)),
            playback,
            runner: RunnerConfig::default(),
        },
    )
    .await
}
