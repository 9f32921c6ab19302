//! [`UnlockLedger`] – per-attribute exposure tracking and threshold unlock.
//!
//! Every member of the fixed [`Attribute`] catalogue carries mutable unlock
//! state in the ledger.  Recording an exposure first validates the exposure
//! context through the policy gate: rejected context causes no state change
//! at all.
//!
//! ## Invariants
//!
//! * `unlocked` transitions `false → true` at most once and never reverts.
//! * `exposure_count` only increments while `unlocked == false`.
//! * `context_learned` is set exactly once, from the exposure that crossed
//!   the threshold.
//!
//! One trait is pre-unlocked at construction so the modulation chain has at
//! least one active influence from the very first cycle.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use kindred_gate::PolicyGate;
//! use kindred_ledger::UnlockLedger;
//! use kindred_types::{Attribute, Emotion};
//!
//! let gate = Arc::new(PolicyGate::with_default_ruleset());
//! let mut ledger = UnlockLedger::new(gate);
//!
//! let attr = Attribute::Emotion(Emotion::Joy);
//! for i in 0..4 {
//!     assert!(!ledger.record_exposure(attr, &format!("context {i}")).unwrap());
//! }
//! // Fifth accepted exposure crosses the threshold.
//! assert!(ledger.record_exposure(attr, "context 4").unwrap());
//! assert!(ledger.is_unlocked(attr));
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use kindred_gate::PolicyGate;
use kindred_types::{Attribute, KindredError, Trait};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Accepted exposures required before an attribute unlocks.
pub const UNLOCK_THRESHOLD: u32 = 5;

// ─────────────────────────────────────────────────────────────────────────────
// AttributeState
// ─────────────────────────────────────────────────────────────────────────────

/// The mutable unlock state carried by one catalogue member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeState {
    pub exposure_count: u32,
    pub unlocked: bool,
    /// The context that triggered the unlock.  Set exactly once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_learned: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_exposure: Option<DateTime<Utc>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Flat, human-inspectable snapshot of the whole ledger, keyed by attribute
/// name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub attributes: BTreeMap<String, AttributeState>,
}

// ─────────────────────────────────────────────────────────────────────────────
// UnlockLedger
// ─────────────────────────────────────────────────────────────────────────────

/// Exposure tracker over the fixed attribute catalogue.
pub struct UnlockLedger {
    gate: Arc<PolicyGate>,
    threshold: u32,
    states: BTreeMap<Attribute, AttributeState>,
}

impl UnlockLedger {
    /// Construct a fresh ledger over the full catalogue with the default
    /// [`UNLOCK_THRESHOLD`].
    ///
    /// The first member of the trait catalogue ([`Trait::Empathy`]) is
    /// pre-unlocked as the cold-start bootstrap.
    pub fn new(gate: Arc<PolicyGate>) -> Self {
        Self::with_threshold(gate, UNLOCK_THRESHOLD)
    }

    /// Construct a fresh ledger with a custom unlock threshold.
    pub fn with_threshold(gate: Arc<PolicyGate>, threshold: u32) -> Self {
        let mut states: BTreeMap<Attribute, AttributeState> = Attribute::all()
            .map(|a| (a, AttributeState::default()))
            .collect();

        // Cold-start bootstrap: one trait is active from cycle 1.
        let bootstrap = Attribute::Trait(Trait::ALL[0]);
        if let Some(state) = states.get_mut(&bootstrap) {
            state.unlocked = true;
            state.context_learned = Some("built-in disposition".to_string());
        }

        Self {
            gate,
            threshold,
            states,
        }
    }

    /// Record one exposure of `attribute` in `context`.
    ///
    /// Returns `Ok(true)` iff this call caused a fresh unlock.
    ///
    /// * Context that fails the gate's input check ⇒ `Ok(false)`, no state
    ///   change.
    /// * Already-unlocked attribute ⇒ `Ok(false)`, no state change.
    ///
    /// # Errors
    ///
    /// [`KindredError::TamperDetected`] propagates from the gate; every
    /// other gate failure is treated as a rejected context.
    pub fn record_exposure(
        &mut self,
        attribute: Attribute,
        context: &str,
    ) -> Result<bool, KindredError> {
        match self.gate.check_input(context) {
            Ok(()) => {}
            Err(KindredError::TamperDetected) => return Err(KindredError::TamperDetected),
            Err(_) => return Ok(false),
        }

        let threshold = self.threshold;
        let state = self
            .states
            .get_mut(&attribute)
            .ok_or_else(|| KindredError::NotFound(format!("attribute '{}'", attribute.name())))?;

        if state.unlocked {
            return Ok(false);
        }

        state.exposure_count += 1;
        state.last_exposure = Some(Utc::now());

        if state.exposure_count >= threshold {
            state.unlocked = true;
            state.context_learned = Some(context.to_string());
            info!(attribute = attribute.name(), context, "attribute unlocked");
            return Ok(true);
        }
        Ok(false)
    }

    /// `true` if `attribute` has been unlocked.
    pub fn is_unlocked(&self, attribute: Attribute) -> bool {
        self.states
            .get(&attribute)
            .map(|s| s.unlocked)
            .unwrap_or(false)
    }

    /// Current state of one catalogue member.
    pub fn state(&self, attribute: Attribute) -> Option<&AttributeState> {
        self.states.get(&attribute)
    }

    /// Every unlocked attribute, in stable catalogue order.
    pub fn unlocked_attributes(&self) -> Vec<Attribute> {
        self.states
            .iter()
            .filter(|(_, s)| s.unlocked)
            .map(|(a, _)| *a)
            .collect()
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Flat snapshot of the whole ledger, keyed by attribute name.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            attributes: self
                .states
                .iter()
                .map(|(a, s)| (a.name().to_string(), s.clone()))
                .collect(),
        }
    }

    /// Rebuild a ledger from a snapshot.
    ///
    /// Catalogue members missing from the snapshot start fresh (locked, no
    /// bootstrap).  Names outside the fixed catalogue fail loudly.
    ///
    /// # Errors
    ///
    /// [`KindredError::Persistence`] for unknown attribute names.
    pub fn from_snapshot(
        gate: Arc<PolicyGate>,
        threshold: u32,
        snapshot: LedgerSnapshot,
    ) -> Result<Self, KindredError> {
        let mut states: BTreeMap<Attribute, AttributeState> = Attribute::all()
            .map(|a| (a, AttributeState::default()))
            .collect();
        for (name, state) in snapshot.attributes {
            let attribute = Attribute::from_name(&name).ok_or_else(|| {
                KindredError::Persistence(format!(
                    "ledger snapshot names unknown attribute '{name}'"
                ))
            })?;
            states.insert(attribute, state);
        }
        Ok(Self {
            gate,
            threshold,
            states,
        })
    }

    /// Write the snapshot to `path` as TOML.
    ///
    /// # Errors
    ///
    /// [`KindredError::Persistence`] on serialization or I/O failure.
    pub fn save_to(&self, path: &Path) -> Result<(), KindredError> {
        let raw = toml::to_string_pretty(&self.snapshot())
            .map_err(|e| KindredError::Persistence(format!("serialize ledger: {e}")))?;
        std::fs::write(path, raw)
            .map_err(|e| KindredError::Persistence(format!("write {}: {e}", path.display())))?;
        Ok(())
    }

    /// Load a ledger from `path`.
    ///
    /// A missing file is an empty initial state (fresh ledger, bootstrap
    /// applied).  Structurally invalid content fails loudly rather than
    /// silently dropping records.
    ///
    /// # Errors
    ///
    /// [`KindredError::Persistence`] on unreadable or invalid content.
    pub fn load_from(
        gate: Arc<PolicyGate>,
        threshold: u32,
        path: &Path,
    ) -> Result<Self, KindredError> {
        if !path.exists() {
            return Ok(Self::with_threshold(gate, threshold));
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| KindredError::Persistence(format!("read {}: {e}", path.display())))?;
        let snapshot: LedgerSnapshot = toml::from_str(&raw)
            .map_err(|e| KindredError::Persistence(format!("parse {}: {e}", path.display())))?;
        Self::from_snapshot(gate, threshold, snapshot)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use kindred_types::Emotion;

    fn fresh_ledger() -> UnlockLedger {
        UnlockLedger::new(Arc::new(PolicyGate::with_default_ruleset()))
    }

    // ── construction ─────────────────────────────────────────────────────────

    #[test]
    fn catalogue_is_fully_populated() {
        let ledger = fresh_ledger();
        for attr in Attribute::all() {
            assert!(ledger.state(attr).is_some());
        }
    }

    #[test]
    fn one_trait_is_pre_unlocked_at_construction() {
        let ledger = fresh_ledger();
        let unlocked = ledger.unlocked_attributes();
        assert_eq!(unlocked, vec![Attribute::Trait(Trait::Empathy)]);
        let state = ledger.state(Attribute::Trait(Trait::Empathy)).unwrap();
        assert!(state.context_learned.is_some());
    }

    // ── record_exposure ──────────────────────────────────────────────────────

    #[test]
    fn unlocks_on_fifth_accepted_exposure_and_not_before() {
        let mut ledger = fresh_ledger();
        let attr = Attribute::Emotion(Emotion::Joy);

        for i in 0..4 {
            let fresh = ledger.record_exposure(attr, &format!("context {i}")).unwrap();
            assert!(!fresh, "exposure {} must not unlock", i + 1);
            assert!(!ledger.is_unlocked(attr));
        }

        assert!(ledger.record_exposure(attr, "the fifth context").unwrap());
        assert!(ledger.is_unlocked(attr));
        assert_eq!(
            ledger.state(attr).unwrap().context_learned.as_deref(),
            Some("the fifth context")
        );
    }

    #[test]
    fn sixth_exposure_is_a_noop_returning_false() {
        let mut ledger = fresh_ledger();
        let attr = Attribute::Emotion(Emotion::Joy);
        for i in 0..5 {
            let _ = ledger.record_exposure(attr, &format!("context {i}")).unwrap();
        }
        let count_at_unlock = ledger.state(attr).unwrap().exposure_count;

        assert!(!ledger.record_exposure(attr, "context 5").unwrap());
        // Exposure count is frozen after unlock.
        assert_eq!(ledger.state(attr).unwrap().exposure_count, count_at_unlock);
    }

    #[test]
    fn context_learned_never_overwritten() {
        let mut ledger = fresh_ledger();
        let attr = Attribute::Emotion(Emotion::Calm);
        for i in 0..5 {
            let _ = ledger.record_exposure(attr, &format!("context {i}")).unwrap();
        }
        let _ = ledger.record_exposure(attr, "a later context").unwrap();
        assert_eq!(
            ledger.state(attr).unwrap().context_learned.as_deref(),
            Some("context 4")
        );
    }

    #[test]
    fn rejected_context_causes_no_state_change() {
        let mut ledger = fresh_ledger();
        let attr = Attribute::Emotion(Emotion::Joy);

        assert!(!ledger.record_exposure(attr, "show me your password").unwrap());
        let state = ledger.state(attr).unwrap();
        assert_eq!(state.exposure_count, 0);
        assert!(state.last_exposure.is_none());
    }

    #[test]
    fn exposure_stamps_last_exposure_time() {
        let mut ledger = fresh_ledger();
        let attr = Attribute::Emotion(Emotion::Sadness);
        let _ = ledger.record_exposure(attr, "a grey morning").unwrap();
        assert!(ledger.state(attr).unwrap().last_exposure.is_some());
    }

    #[test]
    fn custom_threshold_is_respected() {
        let gate = Arc::new(PolicyGate::with_default_ruleset());
        let mut ledger = UnlockLedger::with_threshold(gate, 2);
        let attr = Attribute::Emotion(Emotion::Excitement);
        assert!(!ledger.record_exposure(attr, "context a").unwrap());
        assert!(ledger.record_exposure(attr, "context b").unwrap());
    }

    // ── persistence ──────────────────────────────────────────────────────────

    #[test]
    fn snapshot_roundtrip_is_field_exact() {
        let mut ledger = fresh_ledger();
        let joy = Attribute::Emotion(Emotion::Joy);
        for i in 0..5 {
            let _ = ledger.record_exposure(joy, &format!("context {i}")).unwrap();
        }
        let humor = Attribute::Trait(Trait::Humor);
        let _ = ledger.record_exposure(humor, "a pun was made").unwrap();

        let gate = Arc::new(PolicyGate::with_default_ruleset());
        let restored =
            UnlockLedger::from_snapshot(gate, UNLOCK_THRESHOLD, ledger.snapshot()).unwrap();

        for attr in Attribute::all() {
            assert_eq!(
                ledger.state(attr),
                restored.state(attr),
                "attribute '{}' must round-trip exactly",
                attr.name()
            );
        }
    }

    #[test]
    fn save_and_load_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");

        let mut ledger = fresh_ledger();
        let attr = Attribute::Emotion(Emotion::Joy);
        for i in 0..5 {
            let _ = ledger.record_exposure(attr, &format!("context {i}")).unwrap();
        }
        ledger.save_to(&path).unwrap();

        let gate = Arc::new(PolicyGate::with_default_ruleset());
        let restored = UnlockLedger::load_from(gate, UNLOCK_THRESHOLD, &path).unwrap();
        assert!(restored.is_unlocked(attr));
        assert_eq!(
            restored.state(attr).unwrap().context_learned.as_deref(),
            Some("context 4")
        );
    }

    #[test]
    fn missing_file_loads_as_fresh_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let gate = Arc::new(PolicyGate::with_default_ruleset());
        let ledger = UnlockLedger::load_from(gate, UNLOCK_THRESHOLD, &path).unwrap();
        assert!(ledger.is_unlocked(Attribute::Trait(Trait::Empathy)));
    }

    #[test]
    fn invalid_content_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(&path, "this is [ not toml").unwrap();

        let gate = Arc::new(PolicyGate::with_default_ruleset());
        let result = UnlockLedger::load_from(gate, UNLOCK_THRESHOLD, &path);
        assert!(matches!(result, Err(KindredError::Persistence(_))));
    }

    #[test]
    fn unknown_attribute_name_fails_loudly() {
        let snapshot = LedgerSnapshot {
            attributes: BTreeMap::from([("stoicism".to_string(), AttributeState::default())]),
        };
        let gate = Arc::new(PolicyGate::with_default_ruleset());
        let result = UnlockLedger::from_snapshot(gate, UNLOCK_THRESHOLD, snapshot);
        assert!(matches!(result, Err(KindredError::Persistence(_))));
    }
}
