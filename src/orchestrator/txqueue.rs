//! Outbound transmission queue worker.
//!
//! Strict FIFO with exactly one transmission in flight system-wide:
//! the worker owns the keying controller and processes one request at
//! a time. Before keying up it waits for the channel to go quiet
//! (bounded, then transmits anyway) and extends the segmenter's mute
//! window to cover the whole keyed interval, so the gateway never
//! triggers on its own audio.

use crate::audio::PlaybackSink;
use crate::error::Result;
use crate::keying::{KeyLine, KeyingController};
use crate::logbook::{Direction, Logbook};
use crate::segmenter::{ChannelActivity, MuteGate};
use crate::speech::Synthesizer;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One reply chunk, already formatted for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub text: String,
}

/// Worker timing parameters.
#[derive(Debug, Clone)]
pub struct TxWorkerConfig {
    /// Required quiet time before keying up.
    pub channel_clear: Duration,
    /// Upper bound on waiting for a clear channel.
    pub channel_max_wait: Duration,
    /// Channel-activity polling interval.
    pub poll_interval: Duration,
    /// Mute extension past key-down.
    pub mute_margin: Duration,
}

impl Default for TxWorkerConfig {
    fn default() -> Self {
        use crate::defaults;
        Self {
            channel_clear: Duration::from_millis(defaults::CHANNEL_CLEAR_MS),
            channel_max_wait: Duration::from_millis(defaults::CHANNEL_MAX_WAIT_MS),
            poll_interval: Duration::from_millis(50),
            mute_margin: Duration::from_millis(defaults::MUTE_MARGIN_MS),
        }
    }
}

/// Drains the TX request channel, one keyed transmission at a time.
pub struct TxWorker<K: KeyLine> {
    keying: KeyingController<K>,
    synthesizer: Arc<dyn Synthesizer>,
    playback: Arc<dyn PlaybackSink>,
    mute: MuteGate,
    activity: ChannelActivity,
    logbook: Arc<Logbook>,
    config: TxWorkerConfig,
}

impl<K: KeyLine> TxWorker<K> {
    pub fn new(
        keying: KeyingController<K>,
        synthesizer: Arc<dyn Synthesizer>,
        playback: Arc<dyn PlaybackSink>,
        mute: MuteGate,
        activity: ChannelActivity,
        logbook: Arc<Logbook>,
        config: TxWorkerConfig,
    ) -> Self {
        Self {
            keying,
            synthesizer,
            playback,
            mute,
            activity,
            logbook,
            config,
        }
    }

    /// Runs until the request channel closes. A failed transmission is
    /// logged and dropped; the worker itself never dies early.
    pub async fn run(mut self, mut requests: mpsc::Receiver<TxRequest>) {
        while let Some(request) = requests.recv().await {
            if let Err(e) = self.transmit(&request).await {
                warn!("transmission failed: {}", e);
            }
        }
        self.keying.shutdown();
    }

    async fn transmit(&mut self, request: &TxRequest) -> Result<()> {
        self.wait_channel_clear().await;

        // Synthesize before keying: the mute window must cover the full
        // keyed interval and needs the audio duration up front.
        let audio = self.synthesizer.synthesize(&request.text).await?;
        let keyed = self.keying.guard_time()
            + Duration::from_millis(audio.duration_ms())
            + self.config.mute_margin;
        self.mute.extend_until(Instant::now() + keyed);

        debug!(
            chars = request.text.len(),
            audio_ms = audio.duration_ms(),
            "keying up"
        );
        let playback = self.playback.clone();
        self.keying
            .with_keying(move || async move {
                playback
                    .play(&audio.samples, audio.sample_rate, audio.channels)
                    .await
            })
            .await?;

        info!(text = %request.text, "transmitted");
        self.logbook.record(Direction::Tx, &request.text);
        Ok(())
    }

    /// Polls channel activity until it has been quiet long enough, or
    /// the bounded wait expires (then transmits anyway rather than
    /// holding the reply forever on a busy channel).
    async fn wait_channel_clear(&self) {
        let deadline = Instant::now() + self.config.channel_max_wait;
        loop {
            let now = Instant::now();
            if self.activity.idle_for(now) >= self.config.channel_clear {
                return;
            }
            if now >= deadline {
                warn!("channel still busy past max wait, transmitting anyway");
                return;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}
