//! Push-to-talk keying discipline.
//!
//! The controller owns exclusive access to the transmit-enable line and
//! exposes one atomic operation: key up, wait the lead time, run the
//! payload, wait the tail time, key down. Key-down happens on every
//! exit path; a transmitter stuck keyed is a fatal operational
//! condition, not a recoverable turn failure.
//!
//! The controller does not queue. Callers serialize keyings themselves
//! (the orchestrator's outbound queue is the single caller).

use crate::error::{Result, RflinkError};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, warn};

/// Hardware seam for the transmit-enable line (serial RTS, GPIO, a
/// rig-control daemon). Driver internals are a black box.
///
/// `Sync` because the transmit worker holds its controller across
/// await points inside a spawned task.
pub trait KeyLine: Send + Sync {
    fn open(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    fn set_asserted(&mut self, asserted: bool) -> Result<()>;
    fn is_open(&self) -> bool;
}

/// Key line that asserts nothing and always succeeds. Used for RX-only
/// operation and pipe mode.
#[derive(Debug, Default)]
pub struct NullKeyLine {
    open: bool,
}

impl KeyLine for NullKeyLine {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn set_asserted(&mut self, _asserted: bool) -> Result<()> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Mock key line recording an operation journal, with failure injection.
pub struct MockKeyLine {
    journal: Arc<Mutex<Vec<String>>>,
    open: bool,
    fail_open: bool,
    fail_assert: bool,
    fail_deassert: bool,
}

impl MockKeyLine {
    pub fn new() -> Self {
        Self {
            journal: Arc::new(Mutex::new(Vec::new())),
            open: false,
            fail_open: false,
            fail_assert: false,
            fail_deassert: false,
        }
    }

    pub fn with_open_failure(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn with_assert_failure(mut self) -> Self {
        self.fail_assert = true;
        self
    }

    pub fn with_deassert_failure(mut self) -> Self {
        self.fail_deassert = true;
        self
    }

    /// Shared handle to the operation journal; survives moving the line
    /// into a controller.
    pub fn journal_handle(&self) -> Arc<Mutex<Vec<String>>> {
        self.journal.clone()
    }

    fn record(&self, op: &str) {
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(op.to_string());
    }
}

impl Default for MockKeyLine {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyLine for MockKeyLine {
    fn open(&mut self) -> Result<()> {
        if self.fail_open {
            self.record("open:fail");
            return Err(RflinkError::KeyLineOpen {
                message: "mock open failure".to_string(),
            });
        }
        self.open = true;
        self.record("open");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        self.record("close");
        Ok(())
    }

    fn set_asserted(&mut self, asserted: bool) -> Result<()> {
        if asserted {
            if self.fail_assert {
                self.record("assert:fail");
                return Err(RflinkError::KeyAssert {
                    message: "mock assert failure".to_string(),
                });
            }
            self.record("assert");
        } else {
            if self.fail_deassert {
                self.record("deassert:fail");
                return Err(RflinkError::KeyDeassert {
                    message: "mock deassert failure".to_string(),
                });
            }
            self.record("deassert");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Keying timing parameters.
#[derive(Debug, Clone, Copy)]
pub struct KeyingConfig {
    /// Key-up to start of audio.
    pub lead: Duration,
    /// End of audio to key-down.
    pub tail: Duration,
    /// When false, the line is never asserted; the payload still runs
    /// (RX-only test mode: audio plays, the transmitter stays cold).
    pub rts_enabled: bool,
}

impl Default for KeyingConfig {
    fn default() -> Self {
        Self {
            lead: Duration::from_millis(crate::defaults::PTT_LEAD_MS),
            tail: Duration::from_millis(crate::defaults::PTT_TAIL_MS),
            rts_enabled: true,
        }
    }
}

/// Owns the key line and sequences key-up / payload / key-down.
pub struct KeyingController<K: KeyLine> {
    line: K,
    config: KeyingConfig,
    asserted: bool,
}

impl<K: KeyLine> KeyingController<K> {
    pub fn new(line: K, config: KeyingConfig) -> Self {
        Self {
            line,
            config,
            asserted: false,
        }
    }

    /// Total guard time added around the payload.
    pub fn guard_time(&self) -> Duration {
        if self.config.rts_enabled {
            self.config.lead + self.config.tail
        } else {
            Duration::ZERO
        }
    }

    /// Opens the line (if needed), keys up, waits the lead time, runs
    /// the payload, waits the tail time, keys down, and returns the
    /// payload result. The key is deasserted exactly once per call on
    /// every path; a payload failure still keys down first.
    pub async fn with_keying<F, Fut, T>(&mut self, payload: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.config.rts_enabled {
            // Keying short-circuited; no guard times needed either.
            return payload().await;
        }

        if !self.line.is_open() {
            self.line.open()?;
        }

        self.line.set_asserted(true)?;
        self.asserted = true;
        tokio::time::sleep(self.config.lead).await;

        let result = payload().await;

        tokio::time::sleep(self.config.tail).await;
        let keydown = self.line.set_asserted(false);
        if keydown.is_ok() {
            self.asserted = false;
        }

        match (result, keydown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => {
                error!("key-down failed after successful payload: {}", e);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(payload_err), Err(keydown_err)) => {
                // The stuck key is the worse condition; report it, log both.
                error!(
                    "payload failed ({}) and key-down failed ({})",
                    payload_err, keydown_err
                );
                Err(keydown_err)
            }
        }
    }

    /// Closes the line. Deasserts first only when a failed key-down
    /// left the transmitter keyed; a clean transmission has already
    /// deasserted exactly once.
    pub fn shutdown(&mut self) {
        if self.asserted {
            match self.line.set_asserted(false) {
                Ok(()) => self.asserted = false,
                Err(e) => warn!("deassert on shutdown failed: {}", e),
            }
        }
        if self.line.is_open() {
            if let Err(e) = self.line.close() {
                warn!("key line close failed: {}", e);
            }
        }
    }
}
