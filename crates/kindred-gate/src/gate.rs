//! [`PolicyGate`] – single interception point between the agent and the
//! outside world.
//!
//! Every piece of external input, every decided action, and every candidate
//! output must pass through one of the gate's four channels before taking
//! effect:
//!
//! 1. **Integrity check**: the ruleset's SHA-256 hash is recomputed before
//!    any content check and compared against the hash captured at
//!    construction.  A mismatch poisons the gate permanently: every
//!    subsequent call on any thread returns
//!    [`KindredError::TamperDetected`].  The gate never terminates the
//!    process itself; the top-level caller maps the fatal error to a
//!    distinct exit status.
//! 2. **Content check**: case-insensitive substring match against the
//!    trigger table.  A match rejects the content and appends a timestamped
//!    record (reason + verbatim content) to the append-only violation log.
//!
//! [`PolicyGate::check_capture`] additionally requires an explicit consent
//! flag before any content check.
//!
//! # Example
//!
//! ```
//! use kindred_gate::PolicyGate;
//!
//! let gate = PolicyGate::with_default_ruleset();
//!
//! assert!(gate.check_input("hello there").is_ok());
//! assert!(gate.check_input("what is your password").is_err());
//! assert_eq!(gate.violations().len(), 1);
//! ```

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use kindred_types::{CaptureMetadata, KindredError};

use crate::ruleset::Ruleset;

// ─────────────────────────────────────────────────────────────────────────────
// Violation log entry
// ─────────────────────────────────────────────────────────────────────────────

/// One rejected check, recorded verbatim for auditability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Which channel rejected the content (`"input"`, `"output"`,
    /// `"action"`, `"capture"`).
    pub channel: String,
    pub reason: String,
    /// The rejected content, verbatim.
    pub content: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// PolicyGate
// ─────────────────────────────────────────────────────────────────────────────

/// The policy gate: stateless on success apart from the integrity re-check,
/// append-only on rejection, permanently poisoned on tampering.
///
/// All methods take `&self`; the gate is shared behind an `Arc` by every
/// component that needs it and is safe to call from concurrent cycles.
pub struct PolicyGate {
    ruleset: Ruleset,
    /// Hash captured at construction; the reference every check compares
    /// against.
    baseline_hash: String,
    /// One-way flag: set on the first detected mismatch, never cleared.
    poisoned: AtomicBool,
    /// Append-only; never truncated or rotated.
    violations: Mutex<Vec<Violation>>,
}

impl PolicyGate {
    /// Construct a gate over `ruleset`, capturing its integrity hash.
    pub fn new(ruleset: Ruleset) -> Self {
        let baseline_hash = ruleset.content_hash();
        Self {
            ruleset,
            baseline_hash,
            poisoned: AtomicBool::new(false),
            violations: Mutex::new(Vec::new()),
        }
    }

    /// Construct a gate over [`Ruleset::default_ruleset`].
    pub fn with_default_ruleset() -> Self {
        Self::new(Ruleset::default_ruleset())
    }

    /// Validate external input text.
    pub fn check_input(&self, text: &str) -> Result<(), KindredError> {
        self.check_text("input", text)
    }

    /// Validate a candidate response before release.
    pub fn check_output(&self, text: &str) -> Result<(), KindredError> {
        self.check_text("output", text)
    }

    /// Validate a decided action label before execution.
    pub fn check_action(&self, text: &str) -> Result<(), KindredError> {
        self.check_text("action", text)
    }

    /// Validate a camera capture request.
    ///
    /// Requires `metadata.consent == Some(true)` before any content check;
    /// an absent or false flag rejects regardless of the other fields.  The
    /// metadata values are then content-checked like any other text.
    pub fn check_capture(&self, metadata: &CaptureMetadata) -> Result<(), KindredError> {
        self.verify_integrity()?;

        if metadata.consent != Some(true) {
            let reason = "capture without explicit consent".to_string();
            self.record_violation("capture", &reason, &format!("{metadata:?}"));
            return Err(KindredError::PolicyRejection { reason });
        }

        for value in metadata.fields.values() {
            if let Some(trigger) = self.ruleset.first_match(value) {
                let reason = trigger.reason.clone();
                self.record_violation("capture", &reason, value);
                return Err(KindredError::PolicyRejection { reason });
            }
        }
        Ok(())
    }

    /// `true` once the gate has detected tampering.  Never reverts.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Snapshot of the append-only violation log, oldest first.
    pub fn violations(&self) -> Vec<Violation> {
        self.violations
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Recompute the ruleset hash and compare it to the construction-time
    /// baseline.
    ///
    /// A mismatch sets the one-way poisoned flag; once set, every check in
    /// every concurrent caller fails with [`KindredError::TamperDetected`]
    /// before looking at any content.
    fn verify_integrity(&self) -> Result<(), KindredError> {
        if self.poisoned.load(Ordering::Acquire) {
            return Err(KindredError::TamperDetected);
        }
        if self.ruleset.content_hash() != self.baseline_hash {
            self.poisoned.store(true, Ordering::Release);
            error!("policy ruleset hash mismatch: ruleset was modified after construction");
            return Err(KindredError::TamperDetected);
        }
        Ok(())
    }

    fn check_text(&self, channel: &str, text: &str) -> Result<(), KindredError> {
        self.verify_integrity()?;

        match self.ruleset.first_match(text) {
            Some(trigger) => {
                let reason = trigger.reason.clone();
                self.record_violation(channel, &reason, text);
                Err(KindredError::PolicyRejection { reason })
            }
            None => Ok(()),
        }
    }

    fn record_violation(&self, channel: &str, reason: &str, content: &str) {
        warn!(channel, reason, "policy check rejected content");
        if let Ok(mut log) = self.violations.lock() {
            log.push(Violation {
                id: Uuid::new_v4(),
                timestamp: Utc::now(),
                channel: channel.to_string(),
                reason: reason.to_string(),
                content: content.to_string(),
            });
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
