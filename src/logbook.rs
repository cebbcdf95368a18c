//! Append-only transcript logbook.
//!
//! One file per day, `transcript-YYYY-MM-DD.log`, with lines of the
//! form `[2026-08-30T14:02:11+00:00] RX: <text>`. Received transcripts,
//! transmitted replies and response-time metrics all land here; the
//! file rolls at local midnight. A `None` directory disables logging
//! entirely, which tests and pipe mode use.

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

/// Direction tag for a logbook entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Rx => "RX",
            Direction::Tx => "TX",
        }
    }
}

/// Per-day transcript writer. Write failures are logged and swallowed;
/// the gateway never fails a turn over logbook I/O.
pub struct Logbook {
    dir: Option<PathBuf>,
}

impl Logbook {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// Disabled logbook that drops everything.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn record(&self, direction: Direction, text: &str) {
        self.append(&format!("{}: {}", direction.label(), text));
    }

    pub fn record_metric(&self, name: &str, value: u64) {
        self.append(&format!("METRIC: {}={}", name, value));
    }

    fn append(&self, line: &str) {
        let Some(dir) = &self.dir else { return };
        let now = Local::now();
        let path = dir.join(format!("transcript-{}.log", now.format("%Y-%m-%d")));
        let entry = format!("[{}] {}\n", now.to_rfc3339(), line);

        if let Err(e) = fs::create_dir_all(dir) {
            warn!("logbook directory creation failed: {}", e);
            return;
        }
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| f.write_all(entry.as_bytes()));
        if let Err(e) = result {
            warn!("logbook write failed: {}", e);
        }
    }
}
