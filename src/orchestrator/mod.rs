//! RX/TX session orchestration.
//!
//! One task owns all session state. Segmenter events, partial
//! transcription ticks, debounced finalize deadlines and async
//! transcription completions all arrive on a single `select!` timeline,
//! so there is no locking around the session and no callback can
//! observe a half-updated state. Deferred work (finalize deadlines,
//! partial results) is tagged with the session epoch and dropped on
//! mismatch; completed segment text is never dropped, because
//! transcript fragments outlive a stop/start flurry.

pub mod session;
pub mod txqueue;

pub use session::RxSession;
pub use txqueue::{TxRequest, TxWorker, TxWorkerConfig};

use crate::agent::{AgentDispatch, TurnContext};
use crate::config::Config;
use crate::defaults;
use crate::logbook::{Direction, Logbook};
use crate::normalize::{format_for_tx, normalize};
use crate::policy::{self, PolicyDecision};
use crate::segmenter::{EndReason, SegmenterEvent};
use crate::stt::{transcribe_with_timeout, Transcriber};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Deferred work delivered back onto the reactor timeline.
#[derive(Debug)]
enum Control {
    /// Rolling partial transcription completed (None on error/timeout).
    PartialResult { epoch: u64, text: Option<String> },
    /// Final transcription of one recorded segment completed.
    SegmentText { epoch: u64, text: Option<String> },
    /// The debounced finalize deadline fired.
    FinalizeDue { epoch: u64 },
}

/// The single-task RX/TX reactor.
pub struct Orchestrator {
    config: Config,
    stt: Arc<dyn Transcriber>,
    agent: Arc<dyn AgentDispatch>,
    logbook: Arc<Logbook>,
    tx_queue: mpsc::Sender<TxRequest>,
    control_tx: mpsc::Sender<Control>,
    control_rx: Option<mpsc::Receiver<Control>>,
    session: RxSession,
    partial_in_flight: bool,
    stt_in_flight: u32,
    turn_counter: u64,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        stt: Arc<dyn Transcriber>,
        agent: Arc<dyn AgentDispatch>,
        logbook: Arc<Logbook>,
        tx_queue: mpsc::Sender<TxRequest>,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::channel(64);
        // Window bound: twice the partial window, so a late partial
        // still sees everything it may need.
        let window_max_samples = (config.audio.sample_rate as usize
            * config.stt.partial_window_ms as usize
            / 1000)
            * 2;
        Self {
            config,
            stt,
            agent,
            logbook,
            tx_queue,
            control_tx,
            control_rx: Some(control_rx),
            session: RxSession::new(window_max_samples),
            partial_in_flight: false,
            stt_in_flight: 0,
            turn_counter: 0,
        }
    }

    /// Runs until the segmenter event channel closes, then flushes any
    /// accumulated fragments as one last turn.
    pub async fn run(mut self, mut events: mpsc::Receiver<SegmenterEvent>) {
        let Some(mut control_rx) = self.control_rx.take() else {
            return;
        };
        let mut partial_tick =
            tokio::time::interval(Duration::from_millis(self.config.stt.partial_interval_ms));
        partial_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let partials_enabled = self.config.stt.streaming_partials;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.on_event(event).await,
                    None => break,
                },
                Some(control) = control_rx.recv() => self.on_control(control).await,
                _ = partial_tick.tick(), if partials_enabled && self.session.is_recording() => {
                    self.on_partial_tick();
                }
            }
        }

        // Input gone: wait for in-flight transcriptions, then flush.
        let final_timeout = Duration::from_millis(self.config.stt.final_timeout_ms);
        while self.stt_in_flight > 0 {
            match tokio::time::timeout(final_timeout, control_rx.recv()).await {
                Ok(Some(control)) => self.on_control(control).await,
                _ => break,
            }
        }
        self.finalize().await;
    }

    async fn on_event(&mut self, event: SegmenterEvent) {
        match event {
            SegmenterEvent::Energy(_) => {}
            SegmenterEvent::RecordingStart { energy, .. } => {
                let epoch = self.session.begin_recording();
                debug!(epoch, energy, "recording started");
            }
            SegmenterEvent::RecordingFrame(frame) => {
                self.session.push_samples(&frame.samples);
            }
            SegmenterEvent::RecordingEnd {
                duration_ms,
                reason,
                ..
            } => {
                debug!(duration_ms, ?reason, "recording ended");
                self.on_recording_end(reason);
            }
            SegmenterEvent::Utterance(utterance) => {
                self.on_utterance(utterance.samples).await;
            }
        }
    }

    fn on_recording_end(&mut self, reason: EndReason) {
        self.session.end_recording(Instant::now(), reason);
        match reason {
            EndReason::MaxDuration => {
                // The speaker is still keyed; take whatever the partial
                // loop already produced and skip the redundant full
                // pass over this segment. Without partials the
                // utterance flows through normal transcription.
                let partial = self.session.take_partial();
                if !partial.is_empty() {
                    self.push_fragment(&partial);
                    self.session.set_skip_next_utterance();
                }
            }
            EndReason::Silence => {
                self.schedule_finalize();
            }
        }
    }

    fn schedule_finalize(&self) {
        let epoch = self.session.epoch();
        let debounce = Duration::from_millis(self.config.tx.finalize_debounce_ms);
        let control = self.control_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let _ = control.send(Control::FinalizeDue { epoch }).await;
        });
    }

    async fn on_utterance(&mut self, samples: Vec<i16>) {
        if self.session.take_skip_next_utterance() {
            return;
        }

        // A long enough streamed partial makes the final pass over the
        // same audio redundant.
        if self.config.stt.streaming_partials
            && self.session.partial_text().len() >= self.config.stt.partial_min_chars
        {
            let text = self.session.take_partial();
            self.push_fragment(&text);
            return;
        }

        let epoch = self.session.epoch();
        let timeout = Duration::from_millis(self.config.stt.final_timeout_ms);
        let stt = self.stt.clone();
        let control = self.control_tx.clone();
        self.stt_in_flight += 1;
        tokio::spawn(async move {
            let text = match transcribe_with_timeout(&stt, &samples, timeout).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(epoch, "final transcription failed: {}", e);
                    None
                }
            };
            let _ = control.send(Control::SegmentText { epoch, text }).await;
        });
    }

    fn on_partial_tick(&mut self) {
        if self.partial_in_flight {
            return;
        }
        let samples = self.session.window_snapshot();
        if samples.is_empty() {
            return;
        }
        let epoch = self.session.epoch();
        let timeout = Duration::from_millis(self.config.stt.partial_timeout_ms);
        let stt = self.stt.clone();
        let control = self.control_tx.clone();
        self.partial_in_flight = true;
        tokio::spawn(async move {
            // Errors are swallowed: the final pass will cover the audio.
            let text = transcribe_with_timeout(&stt, &samples, timeout).await.ok();
            let _ = control.send(Control::PartialResult { epoch, text }).await;
        });
    }

    async fn on_control(&mut self, control: Control) {
        match control {
            Control::PartialResult { epoch, text } => {
                self.partial_in_flight = false;
                if epoch != self.session.epoch() || !self.session.is_recording() {
                    return;
                }
                if let Some(text) = text {
                    let normalized = normalize(&text);
                    if !normalized.is_empty() {
                        debug!(epoch, chars = normalized.len(), "partial updated");
                        self.session.set_partial(normalized);
                    }
                }
            }
            Control::SegmentText { epoch, text } => {
                self.stt_in_flight = self.stt_in_flight.saturating_sub(1);
                // Not epoch-guarded: segment text joins the transcript
                // even when a newer recording already started.
                if let Some(text) = text {
                    debug!(epoch, "segment transcribed");
                    self.push_fragment(&text);
                }
            }
            Control::FinalizeDue { epoch } => {
                if epoch != self.session.epoch() || self.session.is_recording() {
                    return;
                }
                if self.stt_in_flight > 0 {
                    // Segment text still pending; try again after
                    // another debounce interval.
                    self.schedule_finalize();
                    return;
                }
                self.finalize().await;
            }
        }
    }

    fn push_fragment(&mut self, text: &str) {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return;
        }
        let adjacency = Duration::from_millis(defaults::ADJACENCY_WINDOW_MS);
        self.session
            .push_fragment(&normalized, Instant::now(), adjacency);
    }

    async fn finalize(&mut self) {
        if !self.session.has_fragments() {
            return;
        }
        let transcript = normalize(&self.session.take_transcript());
        if transcript.is_empty() {
            debug!("finalized turn was empty after normalization");
            return;
        }
        let finalized_at = Instant::now();
        self.turn_counter += 1;
        info!(turn = self.turn_counter, %transcript, "turn finalized");
        self.logbook.record(Direction::Rx, &transcript);

        let tx = &self.config.tx;
        let direct = policy::is_direct_address(&transcript, &tx.callsign, &tx.aliases);
        let decision = policy::decide(
            tx.policy,
            &transcript,
            &tx.callsign,
            &tx.aliases,
            tx.reply_delay_ms,
        );
        match decision {
            PolicyDecision::Blocked => {
                info!(policy = ?tx.policy, "reply suppressed by policy");
            }
            PolicyDecision::Delayed { wait_ms } => {
                self.spawn_dispatch(transcript, direct, wait_ms, finalized_at);
            }
            PolicyDecision::Allowed => {
                self.spawn_dispatch(transcript, direct, 0, finalized_at);
            }
        }
    }

    /// Dispatch runs off-reactor: a slow agent must not delay frame
    /// handling or the next turn's segmentation.
    fn spawn_dispatch(&self, transcript: String, direct: bool, wait_ms: u64, finalized_at: Instant) {
        let agent = self.agent.clone();
        let tx_queue = self.tx_queue.clone();
        let logbook = self.logbook.clone();
        let callsign = self.config.tx.callsign.clone();
        let max_chars = self.config.tx.reply_max_chars;
        let session_id = self.turn_counter;

        tokio::spawn(async move {
            if wait_ms > 0 {
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            }
            let ctx = TurnContext { session_id, direct };
            if let Err(e) = agent.record_turn(&transcript, &ctx).await {
                warn!(session_id, "turn recording failed: {}", e);
            }

            let mut stream = match agent.dispatch(&transcript, &ctx).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(session_id, "agent dispatch failed: {}", e);
                    return;
                }
            };

            let mut chunks = 0u32;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(chunk) => {
                        let text = format_for_tx(&chunk.text, &callsign, max_chars);
                        if text.is_empty() {
                            continue;
                        }
                        if chunks == 0 {
                            logbook.record_metric(
                                "responseTimeMs",
                                finalized_at.elapsed().as_millis() as u64,
                            );
                        }
                        chunks += 1;
                        if tx_queue.send(TxRequest { text }).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(session_id, "reply chunk failed: {}", e),
                }
            }

            if chunks == 0 {
                // The agent had nothing to say, but dead air after a
                // direct call reads as a failure on the other end.
                logbook.record_metric(
                    "responseTimeMs",
                    finalized_at.elapsed().as_millis() as u64,
                );
                let ack = format_for_tx("Copy.", &callsign, max_chars);
                let _ = tx_queue.send(TxRequest { text: ack }).await;
            }
        });
    }
}
