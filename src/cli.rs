//! Command-line interface.
//!
//! Argument parsing using clap derive macros. The binary reads raw
//! 16-bit PCM from stdin, so the usual invocation bridges a sound
//! device through a pipe:
//!
//! `arecord -f S16_LE -r 16000 -c 1 | rflink --config gateway.toml`

use clap::Parser;
use std::path::PathBuf;

/// Half-duplex voice gateway between a radio channel and a
/// conversational agent.
#[derive(Parser, Debug)]
#[command(name = "rflink", version, about = "Radio voice gateway")]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Receive only: segment and log traffic, never transmit
    #[arg(long)]
    pub rx_only: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device hint (overrides config)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Transcript logbook directory (overrides config)
    #[arg(long, value_name = "DIR")]
    pub transcript_dir: Option<PathBuf>,
}
