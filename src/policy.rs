//! Transmit policy evaluation.
//!
//! Decides, per finalized transcript, whether the gateway may reply on
//! the air. Policy rejections are a silent no-op by design, not errors.

use serde::{Deserialize, Serialize};

/// Configured transmit policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxPolicy {
    /// Never transmit (monitor-only deployment).
    Never,
    /// Reply only when the transcript addresses the station directly.
    Direct,
    /// Reply to anything; non-addressed traffic gets a settle delay.
    Open,
}

impl TxPolicy {
    /// Parses a policy name as used by the env override. Unknown names
    /// return None so a typo cannot silently widen the policy.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Some(Self::Never),
            "direct" => Some(Self::Direct),
            "open" => Some(Self::Open),
            _ => None,
        }
    }
}

/// Outcome of evaluating the policy against one transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// No reply; log and reset.
    Blocked,
    /// Reply after waiting the given number of milliseconds, letting
    /// the conversation settle before an automatic answer.
    Delayed { wait_ms: u64 },
    /// Reply immediately.
    Allowed,
}

impl PolicyDecision {
    /// True for Allowed and Delayed alike.
    pub fn permits_reply(&self) -> bool {
        !matches!(self, PolicyDecision::Blocked)
    }
}

/// Returns true when the transcript addresses the station directly by
/// callsign or one of its spoken aliases.
///
/// Matching is case-insensitive on word boundaries so "base" does not
/// match inside "database".
pub fn is_direct_address(text: &str, callsign: &str, aliases: &[String]) -> bool {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut needles: Vec<String> = Vec::with_capacity(aliases.len() + 1);
    needles.push(callsign.to_lowercase());
    needles.extend(aliases.iter().map(|a| a.to_lowercase()));

    for needle in &needles {
        if needle.is_empty() {
            continue;
        }
        // Multi-word aliases match as a phrase, single words on boundaries.
        if needle.contains(' ') {
            if lower.contains(needle.as_str()) {
                return true;
            }
        } else if words.iter().any(|w| w == needle) {
            return true;
        }
    }
    false
}

/// Evaluates the configured policy against a finalized transcript.
pub fn decide(
    policy: TxPolicy,
    text: &str,
    callsign: &str,
    aliases: &[String],
    reply_delay_ms: u64,
) -> PolicyDecision {
    let direct = is_direct_address(text, callsign, aliases);
    match (policy, direct) {
        (TxPolicy::Never, _) => PolicyDecision::Blocked,
        (_, true) => PolicyDecision::Allowed,
        (TxPolicy::Open, false) => PolicyDecision::Delayed {
            wait_ms: reply_delay_ms,
        },
        (TxPolicy::Direct, false) => PolicyDecision::Blocked,
    }
}
