use crate::defaults;
use crate::error::{Result, RflinkError};
use crate::policy::TxPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub segmenter: SegmenterConfig,
    pub stt: SttConfig,
    pub tx: TxConfig,
    pub log: LogConfig,
}

/// Audio stream parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_ms: u32,
}

/// Energy segmenter tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmenterConfig {
    pub energy_threshold: f32,
    pub pre_roll_ms: u32,
    pub max_silence_ms: u32,
    pub min_speech_ms: u32,
    pub max_record_ms: u32,
    pub start_cooldown_ms: u32,
}

/// Transcription timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Enable the rolling partial-transcription loop during recording.
    pub streaming_partials: bool,
    pub partial_interval_ms: u64,
    pub partial_window_ms: u32,
    pub partial_min_chars: usize,
    pub partial_timeout_ms: u64,
    pub final_timeout_ms: u64,
}

/// Transmit policy and keying timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TxConfig {
    pub policy: TxPolicy,
    /// Station identification appended to every transmitted reply.
    pub callsign: String,
    /// Spoken aliases that count as a direct address.
    pub aliases: Vec<String>,
    pub reply_delay_ms: u64,
    pub reply_max_chars: usize,
    pub lead_ms: u64,
    pub tail_ms: u64,
    /// When false the key line is never asserted (RX-only test mode);
    /// replies still synthesize and play.
    pub rts_enabled: bool,
    pub channel_clear_ms: u64,
    pub channel_max_wait_ms: u64,
    pub finalize_debounce_ms: u64,
}

/// Transcript logbook output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for the per-day transcript files. None disables the logbook.
    pub transcript_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
            frame_ms: defaults::FRAME_MS,
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            energy_threshold: defaults::ENERGY_THRESHOLD,
            pre_roll_ms: defaults::PRE_ROLL_MS,
            max_silence_ms: defaults::MAX_SILENCE_MS,
            min_speech_ms: defaults::MIN_SPEECH_MS,
            max_record_ms: defaults::MAX_RECORD_MS,
            start_cooldown_ms: defaults::START_COOLDOWN_MS,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            streaming_partials: true,
            partial_interval_ms: defaults::PARTIAL_INTERVAL_MS,
            partial_window_ms: defaults::PARTIAL_WINDOW_MS,
            partial_min_chars: defaults::PARTIAL_MIN_CHARS,
            partial_timeout_ms: defaults::PARTIAL_TIMEOUT_MS,
            final_timeout_ms: defaults::FINAL_STT_TIMEOUT_MS,
        }
    }
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            policy: TxPolicy::Direct,
            callsign: "GATEWAY".to_string(),
            aliases: Vec::new(),
            reply_delay_ms: defaults::REPLY_DELAY_MS,
            reply_max_chars: defaults::REPLY_MAX_CHARS,
            lead_ms: defaults::PTT_LEAD_MS,
            tail_ms: defaults::PTT_TAIL_MS,
            rts_enabled: true,
            channel_clear_ms: defaults::CHANNEL_CLEAR_MS,
            channel_max_wait_ms: defaults::CHANNEL_MAX_WAIT_MS,
            finalize_debounce_ms: defaults::FINALIZE_DEBOUNCE_MS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file is missing.
    ///
    /// Invalid TOML or invalid values are still hard errors.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - RFLINK_CALLSIGN → tx.callsign
    /// - RFLINK_TX_POLICY → tx.policy ("never" | "direct" | "open")
    /// - RFLINK_AUDIO_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(callsign) = std::env::var("RFLINK_CALLSIGN") {
            if !callsign.is_empty() {
                self.tx.callsign = callsign;
            }
        }

        if let Ok(policy) = std::env::var("RFLINK_TX_POLICY") {
            if let Some(parsed) = TxPolicy::parse(&policy) {
                self.tx.policy = parsed;
            }
        }

        if let Ok(device) = std::env::var("RFLINK_AUDIO_DEVICE") {
            if !device.is_empty() {
                self.audio.device = Some(device);
            }
        }

        self
    }

    /// Check value ranges that would otherwise surface as runtime panics
    /// or silent misbehavior deep in the segmenter.
    pub fn validate(&self) -> Result<()> {
        if self.audio.frame_ms == 0 {
            return Err(RflinkError::ConfigInvalidValue {
                key: "audio.frame_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.audio.sample_rate == 0 {
            return Err(RflinkError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.audio.channels == 0 {
            return Err(RflinkError::ConfigInvalidValue {
                key: "audio.channels".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.segmenter.energy_threshold)
            || self.segmenter.energy_threshold == 0.0
        {
            return Err(RflinkError::ConfigInvalidValue {
                key: "segmenter.energy_threshold".to_string(),
                message: "must be in (0.0, 1.0]".to_string(),
            });
        }
        if self.segmenter.max_record_ms <= self.segmenter.min_speech_ms {
            return Err(RflinkError::ConfigInvalidValue {
                key: "segmenter.max_record_ms".to_string(),
                message: "must exceed min_speech_ms".to_string(),
            });
        }
        if self.tx.callsign.trim().is_empty() {
            return Err(RflinkError::ConfigInvalidValue {
                key: "tx.callsign".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/rflink/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rflink")
            .join("config.toml")
    }
}
