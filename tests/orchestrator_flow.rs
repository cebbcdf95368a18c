//! End-to-end gateway flow: scripted PCM in, keyed replies out.
//!
//! Drives `run_gateway` with a scripted capture source and mock
//! engines, then asserts on the key-line journal, the playback record
//! and the transcript logbook.

use rflink::agent::MockAgent;
use rflink::app::{run_gateway, Collaborators};
use rflink::audio::{MockPlaybackSink, ScriptedCaptureSource};
use rflink::config::Config;
use rflink::keying::MockKeyLine;
use rflink::policy::TxPolicy;
use rflink::segmenter::runner::RunnerConfig;
use rflink::speech::MockSynthesizer;
use rflink::stt::MockTranscriber;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn speech_chunk(frames: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames * 640);
    for _ in 0..frames * 320 {
        bytes.extend_from_slice(&3000i16.to_le_bytes());
    }
    bytes
}

fn silence_chunk(frames: usize) -> Vec<u8> {
    vec![0u8; frames * 640]
}

/// One transmission: 200ms of quiet, 300ms of tone, 300ms of quiet,
/// then the capture process exits so the gateway shuts down.
fn scripted_audio() -> ScriptedCaptureSource {
    ScriptedCaptureSource::new()
        .with_chunk(silence_chunk(10))
        .with_chunk(speech_chunk(15))
        .with_chunk(silence_chunk(15))
        .with_exit_after_chunks()
}

fn gateway_config(policy: TxPolicy, transcript_dir: &Path) -> Config {
    let mut config = Config::default();
    config.tx.policy = policy;
    config.tx.callsign = "GATEWAY".to_string();
    config.tx.lead_ms = 5;
    config.tx.tail_ms = 5;
    config.tx.reply_delay_ms = 10;
    config.tx.channel_clear_ms = 10;
    config.tx.channel_max_wait_ms = 300;
    config.tx.finalize_debounce_ms = 20;
    config.stt.streaming_partials = false;
    config.segmenter.pre_roll_ms = 40;
    config.segmenter.min_speech_ms = 40;
    config.segmenter.max_silence_ms = 100;
    config.segmenter.start_cooldown_ms = 0;
    config.log.transcript_dir = Some(transcript_dir.to_path_buf());
    config
}

fn fast_runner() -> RunnerConfig {
    RunnerConfig {
        channel_buffer_size: 16,
        poll_interval: Duration::from_millis(1),
        stall_timeout: Duration::from_millis(200),
        restart_backoff: Duration::from_millis(10),
        max_fruitless_restarts: 2,
    }
}

struct Probes {
    journal: Arc<Mutex<Vec<String>>>,
    playback: Arc<MockPlaybackSink>,
    agent: Arc<MockAgent>,
}

async fn run_scripted_gateway(
    config: Config,
    transcriber: MockTranscriber,
    agent: MockAgent,
    playback: MockPlaybackSink,
) -> Probes {
    let key_line = MockKeyLine::new();
    let journal = key_line.journal_handle();
    let playback = Arc::new(playback);
    let agent = Arc::new(agent);

    let parts = Collaborators {
        source: scripted_audio(),
        key_line,
        transcriber: Arc::new(transcriber),
        agent: agent.clone(),
        synthesizer: Arc::new(MockSynthesizer::new().with_samples(vec![1000i16; 800])),
        playback: playback.clone(),
        runner: fast_runner(),
    };

    tokio::time::timeout(Duration::from_secs(10), run_gateway(config, parts))
        .await
        .expect("gateway must shut down once the source is exhausted")
        .expect("gateway run failed");

    Probes {
        journal,
        playback,
        agent,
    }
}

fn logbook_contents(dir: &Path) -> String {
    let mut out = String::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            if entry.path().extension().is_some_and(|e| e == "log") {
                out.push_str(&fs::read_to_string(entry.path()).unwrap_or_default());
            }
        }
    }
    out
}

#[tokio::test]
async fn direct_address_turn_is_keyed_played_and_logged() {
    let dir = TempDir::new().unwrap();
    let probes = run_scripted_gateway(
        gateway_config(TxPolicy::Direct, dir.path()),
        MockTranscriber::new().with_response("gateway radio check"),
        MockAgent::new().with_chunks(&["Read you loud and clear."]),
        MockPlaybackSink::new(),
    )
    .await;

    assert_eq!(probes.agent.dispatched(), vec!["gateway radio check"]);
    assert_eq!(probes.agent.recorded_turns(), 1);
    assert_eq!(probes.playback.played_lengths(), vec![800]);

    let ops = probes.journal.lock().unwrap().clone();
    assert_eq!(ops.iter().filter(|op| *op == "assert").count(), 1);
    assert_eq!(ops.iter().filter(|op| *op == "deassert").count(), 1);
    assert_eq!(ops.last().unwrap(), "close");

    let log = logbook_contents(dir.path());
    assert!(log.contains("RX: gateway radio check"), "log was: {log}");
    assert!(
        log.contains("TX: Read you loud and clear. GATEWAY"),
        "log was: {log}"
    );
    assert!(log.contains("METRIC: responseTimeMs="), "log was: {log}");
}

#[tokio::test]
async fn never_policy_receives_but_stays_cold() {
    let dir = TempDir::new().unwrap();
    let probes = run_scripted_gateway(
        gateway_config(TxPolicy::Never, dir.path()),
        MockTranscriber::new().with_response("gateway radio check"),
        MockAgent::new().with_chunks(&["must never air"]),
        MockPlaybackSink::new(),
    )
    .await;

    assert!(probes.agent.dispatched().is_empty());
    assert!(probes.playback.played_lengths().is_empty());
    // The key line was never even opened
    assert!(probes.journal.lock().unwrap().is_empty());

    let log = logbook_contents(dir.path());
    assert!(log.contains("RX: gateway radio check"), "log was: {log}");
    assert!(!log.contains("] TX:"), "log was: {log}");
}

#[tokio::test]
async fn silent_agent_falls_back_to_ack() {
    let dir = TempDir::new().unwrap();
    let probes = run_scripted_gateway(
        gateway_config(TxPolicy::Direct, dir.path()),
        MockTranscriber::new().with_response("gateway, logging off"),
        MockAgent::new().with_no_chunks(),
        MockPlaybackSink::new(),
    )
    .await;

    assert_eq!(probes.playback.played_lengths().len(), 1);
    let log = logbook_contents(dir.path());
    assert!(log.contains("TX: Copy. GATEWAY"), "log was: {log}");
    // The fallback ack is still a timed response
    assert!(log.contains("METRIC: responseTimeMs="), "log was: {log}");
}

#[tokio::test]
async fn playback_failure_still_keys_down_and_logs_nothing_transmitted() {
    let dir = TempDir::new().unwrap();
    let probes = run_scripted_gateway(
        gateway_config(TxPolicy::Direct, dir.path()),
        MockTranscriber::new().with_response("gateway radio check"),
        MockAgent::new().with_chunks(&["Read you loud and clear."]),
        MockPlaybackSink::new().with_failure(),
    )
    .await;

    let ops = probes.journal.lock().unwrap().clone();
    // Keyed up, and keyed down despite the dead playback device
    assert_eq!(ops.iter().filter(|op| *op == "assert").count(), 1);
    assert_eq!(ops.iter().filter(|op| *op == "deassert").count(), 1);

    let log = logbook_contents(dir.path());
    assert!(log.contains("RX: gateway radio check"), "log was: {log}");
    assert!(!log.contains("] TX:"), "log was: {log}");
}
