//! Background capture loop feeding the segmenter.
//!
//! A dedicated OS thread does the blocking `read_chunk` calls and hands
//! byte chunks over a bounded channel; the async side feeds the
//! segmenter and forwards its events. A stall watchdog restarts a
//! source that stops delivering, with a fixed backoff, resetting the
//! segmenter so a half-recorded utterance never straddles a restart.

use crate::audio::CaptureSource;
use crate::defaults;
use crate::error::Result;
use crate::segmenter::{Clock, EnergySegmenter, SegmenterEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Capture-loop tuning.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Bound of the chunk channel between the capture thread and the
    /// async feed loop.
    pub channel_buffer_size: usize,
    /// Polling interval when the source has no data yet.
    pub poll_interval: Duration,
    /// No chunk for this long means the source stalled.
    pub stall_timeout: Duration,
    /// Delay before reopening a dead or stalled source.
    pub restart_backoff: Duration,
    /// Consecutive generations that delivered nothing before the
    /// runner gives up. A generation that delivers any chunk resets
    /// the count.
    pub max_fruitless_restarts: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 64,
            poll_interval: Duration::from_millis(10),
            stall_timeout: Duration::from_millis(
                defaults::STALL_FRAMES as u64 * defaults::FRAME_MS as u64,
            ),
            restart_backoff: Duration::from_millis(defaults::CAPTURE_RESTART_BACKOFF_MS),
            max_fruitless_restarts: 3,
        }
    }
}

/// Owns a capture source and a segmenter; pumps events to a channel.
pub struct CaptureRunner<S: CaptureSource + 'static, C: Clock> {
    source: Arc<Mutex<S>>,
    segmenter: EnergySegmenter<C>,
    config: RunnerConfig,
}

impl<S: CaptureSource + 'static, C: Clock> CaptureRunner<S, C> {
    pub fn new(source: S, segmenter: EnergySegmenter<C>, config: RunnerConfig) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            segmenter,
            config,
        }
    }

    /// Starts one capture generation: opens the source and spawns the
    /// blocking read thread.
    fn spawn_generation(&self) -> Result<(mpsc::Receiver<Vec<u8>>, Arc<AtomicBool>)> {
        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size);
        {
            let mut source = self.source.lock().unwrap_or_else(|e| e.into_inner());
            source.start()?;
        }

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let source = self.source.clone();
        let poll_interval = self.config.poll_interval;

        thread::spawn(move || {
            while flag.load(Ordering::SeqCst) {
                let chunk = {
                    let mut src = source.lock().unwrap_or_else(|e| e.into_inner());
                    src.read_chunk()
                };
                match chunk {
                    Ok(chunk) if chunk.is_empty() => thread::sleep(poll_interval),
                    Ok(chunk) => {
                        if tx.blocking_send(chunk).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("capture read failed: {}", e);
                        break;
                    }
                }
            }
            let mut src = source.lock().unwrap_or_else(|e| e.into_inner());
            let _ = src.stop();
            flag.store(false, Ordering::SeqCst);
        });

        Ok((rx, running))
    }

    /// Runs the feed loop until the event receiver is dropped or the
    /// source permanently refuses to deliver audio. Restartable
    /// failures (stall, read error, one-off open failure) reopen the
    /// source after the backoff.
    pub async fn run(mut self, events: mpsc::Sender<SegmenterEvent>) -> Result<()> {
        let mut fruitless = 0u32;
        loop {
            let (mut rx, running) = match self.spawn_generation() {
                Ok(generation) => generation,
                Err(e) => {
                    fruitless += 1;
                    if fruitless >= self.config.max_fruitless_restarts {
                        error!("capture source would not start: {}", e);
                        return Err(e);
                    }
                    warn!("capture start failed, retrying: {}", e);
                    tokio::time::sleep(self.config.restart_backoff).await;
                    continue;
                }
            };

            let mut delivered = false;
            loop {
                match tokio::time::timeout(self.config.stall_timeout, rx.recv()).await {
                    Ok(Some(chunk)) => {
                        delivered = true;
                        fruitless = 0;
                        for event in self.segmenter.feed(&chunk) {
                            if events.send(event).await.is_err() {
                                running.store(false, Ordering::SeqCst);
                                return Ok(());
                            }
                        }
                    }
                    Ok(None) => {
                        debug!("capture generation ended");
                        break;
                    }
                    Err(_) => {
                        warn!(
                            stalled_ms = self.config.stall_timeout.as_millis() as u64,
                            "capture stalled, restarting"
                        );
                        break;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            self.segmenter.reset();
            if !delivered {
                fruitless += 1;
                if fruitless >= self.config.max_fruitless_restarts {
                    warn!("capture source delivers no audio, giving up");
                    return Ok(());
                }
            }
            tokio::time::sleep(self.config.restart_backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ScriptedCaptureSource;
    use crate::config::{AudioConfig, SegmenterConfig};
    use crate::segmenter::{ChannelActivity, MuteGate, SystemClock};
    use std::time::Instant;

    fn test_segmenter() -> EnergySegmenter<SystemClock> {
        let audio = AudioConfig {
            device: None,
            sample_rate: 16_000,
            channels: 1,
            frame_ms: 20,
        };
        let config = SegmenterConfig {
            energy_threshold: 0.02,
            pre_roll_ms: 40,
            max_silence_ms: 60,
            min_speech_ms: 40,
            max_record_ms: 2_000,
            start_cooldown_ms: 0,
        };
        EnergySegmenter::new(
            &audio,
            config,
            MuteGate::new(),
            ChannelActivity::new(Instant::now()),
        )
    }

    fn test_runner_config() -> RunnerConfig {
        RunnerConfig {
            channel_buffer_size: 16,
            poll_interval: Duration::from_millis(1),
            stall_timeout: Duration::from_millis(50),
            restart_backoff: Duration::from_millis(5),
            max_fruitless_restarts: 2,
        }
    }

    fn speech_chunk(frames: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        for _ in 0..frames * 320 {
            bytes.extend_from_slice(&3000i16.to_le_bytes());
        }
        bytes
    }

    fn silence_chunk(frames: usize) -> Vec<u8> {
        vec![0u8; frames * 640]
    }

    #[tokio::test]
    async fn test_runner_emits_segmenter_events() {
        let source = ScriptedCaptureSource::new()
            .with_chunk(speech_chunk(10))
            .with_chunk(silence_chunk(10))
            .with_exit_after_chunks();
        let runner = CaptureRunner::new(source, test_segmenter(), test_runner_config());

        let (tx, mut rx) = mpsc::channel(256);
        let handle = tokio::spawn(runner.run(tx));

        let mut saw_start = false;
        let mut saw_utterance = false;
        while let Some(event) = rx.recv().await {
            match event {
                SegmenterEvent::RecordingStart { .. } => saw_start = true,
                SegmenterEvent::Utterance(_) => saw_utterance = true,
                _ => {}
            }
        }
        assert!(saw_start);
        assert!(saw_utterance);
        handle.abort();
    }

    #[tokio::test]
    async fn test_runner_gives_up_on_permanent_start_failure() {
        // Fails to start once, then delivers nothing at all
        let source = ScriptedCaptureSource::new().with_exit_after_chunks();
        let runner = CaptureRunner::new(source, test_segmenter(), test_runner_config());

        let (tx, _rx) = mpsc::channel(16);
        let result = tokio::time::timeout(Duration::from_secs(2), runner.run(tx)).await;
        assert!(result.is_ok(), "runner should terminate on a dead source");
    }

    #[tokio::test]
    async fn test_runner_restarts_after_one_off_start_failure() {
        let source = ScriptedCaptureSource::new()
            .with_start_failure()
            .with_chunk(speech_chunk(5))
            .with_exit_after_chunks();
        let runner = CaptureRunner::new(source, test_segmenter(), test_runner_config());

        let (tx, mut rx) = mpsc::channel(256);
        let handle = tokio::spawn(runner.run(tx));

        // The first start fails; after the backoff the source recovers
        // and audio flows.
        let mut saw_energy = false;
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_secs(2), rx.recv()).await
        {
            if matches!(event, SegmenterEvent::Energy(_)) {
                saw_energy = true;
                break;
            }
        }
        assert!(saw_energy);
        handle.abort();
    }

    #[tokio::test]
    async fn test_runner_stops_when_receiver_dropped() {
        let source = ScriptedCaptureSource::new().with_chunk(speech_chunk(50));
        let runner = CaptureRunner::new(source, test_segmenter(), test_runner_config());

        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let result = tokio::time::timeout(Duration::from_secs(2), runner.run(tx)).await;
        assert!(matches!(result, Ok(Ok(()))));
    }
}
