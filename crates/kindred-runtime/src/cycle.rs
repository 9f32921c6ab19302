//! [`CycleOrchestrator`] – The Gated Interaction Cycle.
//!
//! Composes the policy gate, the sensor hub, the classifier, the unlock
//! ledger, the identity store, the fact store, and the modulation chain
//! into one request/response cycle.  The stages are linear, with a terminal
//! `Rejected` reachable from the input gate:
//!
//! ```text
//! Received → InputGated → Perceived → Classified → Decided → Modulated
//!          → ActionGated → Styled → OutputGated → Emitted
//! ```
//!
//! 1. **InputGated** – non-empty input failing the gate rejects the cycle
//!    with a user-visible message; the cycle still counts.
//! 2. **Perceived** – whole-hub sensor snapshot reduced to derived signals.
//! 3. **Classified** – signals mapped to exactly one emotion; exposure is
//!    recorded; a marker is styled in later only if the emotion is already
//!    unlocked.  Classifier failure degrades to no styling.
//! 4. **Decided** – pure precedence function produces the action label.
//! 5. **Modulated** – the modulation chain runs, tier-aware.
//! 6. **ActionGated** – a failing action is replaced by the fixed safe
//!    fallback, never rejecting the cycle.
//! 7. **Styled** – the unlocked emotion's glyph is prepended if it passes
//!    output gating.
//! 8. **OutputGated** – a failing response is replaced entirely by the
//!    fixed filtered message.
//!
//! Every `flush_every`-th cycle the ledger and identity snapshots are
//! flushed to disk as a best-effort side effect.  Any internal failure in
//! steps 2–8 is caught at the orchestrator boundary and surfaced as a
//! generic error string: the cycle count still advances.  Ruleset
//! tampering is the sole exception: [`KindredError::TamperDetected`] is
//! never downgraded and propagates to the top-level caller.
//!
//! Shared state is guarded per store (one coarse mutex each, no cross-store
//! transactions); the cycle counter is atomic; the gate's poisoned flag
//! stops every concurrent caller once tripped.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use kindred_gate::{PolicyGate, Violation};
use kindred_hal::SensorHub;
use kindred_ledger::{UNLOCK_THRESHOLD, UnlockLedger};
use kindred_memory::{FORGET_WINDOW_DAYS, IdentityStore, RetainedFactStore};
use kindred_perception::{Classifier, DerivedSignals, EncounterLabeler};
use kindred_types::{
    Attribute, CaptureMetadata, Emotion, Fingerprint, KindredError, RelationshipView, Trait,
};

use crate::decide::{SAFE_FALLBACK_ACTION, decide};
use crate::modulation::ModulationChain;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Substituted when the final response fails output gating.
pub const FILTERED_RESPONSE: &str = "[filtered] I had a reply, but it was not fit to share.";

/// Substituted when an internal failure is caught at the cycle boundary.
pub const GENERIC_ERROR_RESPONSE: &str = "Something went wrong inside. Let's try that again.";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`CycleOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Accepted exposures required before an attribute unlocks.
    pub unlock_threshold: u32,
    /// Bound of the retained-fact store.
    pub fact_capacity: usize,
    /// Days of inactivity after which a non-pinned identity is forgotten.
    pub forget_window_days: i64,
    /// Flush the ledger and identity snapshots every Nth cycle; `0`
    /// disables periodic flushing.
    pub flush_every: u64,
    /// Path of the ledger snapshot.  `None` keeps the ledger in memory only.
    pub ledger_path: Option<PathBuf>,
    /// Path of the identity snapshot.  `None` keeps identities in memory
    /// only.
    pub identity_path: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            unlock_threshold: UNLOCK_THRESHOLD,
            fact_capacity: 32,
            forget_window_days: FORGET_WINDOW_DAYS,
            flush_every: 10,
            ledger_path: None,
            identity_path: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cycle report
// ─────────────────────────────────────────────────────────────────────────────

/// The stage a cycle last completed, recorded for auditability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleStage {
    Received,
    InputGated,
    Perceived,
    Classified,
    Decided,
    Modulated,
    ActionGated,
    Styled,
    OutputGated,
    Emitted,
    Rejected,
}

/// The outcome of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// 1-based cycle number; rejected cycles count too.
    pub cycle: u64,
    /// The stage the cycle ended in (`Emitted`, `Rejected`, or the last
    /// stage completed before an internal failure).
    pub stage: CycleStage,
    /// The classified emotion, when classification succeeded.
    pub emotion: Option<Emotion>,
    /// The decided (pre-modulation) action label.
    pub action: Option<String>,
    /// The final user-visible response.
    pub response: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// CycleOrchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// The cycle orchestrator.
///
/// Owns every subsystem handle and their lifecycle; the only component with
/// a defined sequencing contract.  All methods take `&self`, so an
/// orchestrator behind an `Arc` can serve concurrent callers: each store
/// sits behind its own mutex.
pub struct CycleOrchestrator {
    gate: Arc<PolicyGate>,
    classifier: Box<dyn Classifier>,
    hub: Mutex<SensorHub>,
    ledger: Mutex<UnlockLedger>,
    identities: Mutex<IdentityStore>,
    facts: Mutex<RetainedFactStore>,
    chain: Mutex<ModulationChain>,
    cycle_count: AtomicU64,
    config: OrchestratorConfig,
}

impl CycleOrchestrator {
    /// Construct an orchestrator from the supplied configuration, sensor
    /// hub, and classifier.
    ///
    /// Ledger and identity snapshots are loaded from their configured paths
    /// (a missing file is an empty initial state); the identity store gets
    /// the built-in encounter labeler.
    ///
    /// # Errors
    ///
    /// [`KindredError::Persistence`] when a configured snapshot exists but
    /// is structurally invalid.
    pub fn new(
        config: OrchestratorConfig,
        hub: SensorHub,
        classifier: Box<dyn Classifier>,
    ) -> Result<Self, KindredError> {
        let gate = Arc::new(PolicyGate::with_default_ruleset());

        let ledger = match &config.ledger_path {
            Some(path) => {
                info!(path = %path.display(), "loading ledger snapshot");
                UnlockLedger::load_from(Arc::clone(&gate), config.unlock_threshold, path)?
            }
            None => UnlockLedger::with_threshold(Arc::clone(&gate), config.unlock_threshold),
        };

        let forget_window = chrono::Duration::days(config.forget_window_days);
        let mut identities = match &config.identity_path {
            Some(path) => {
                info!(path = %path.display(), "loading identity snapshot");
                IdentityStore::load_from(forget_window, path)?
            }
            None => IdentityStore::with_forget_window(forget_window),
        };
        identities.set_labeler(Box::new(EncounterLabeler));

        let facts = RetainedFactStore::new(Arc::clone(&gate), config.fact_capacity);
        let chain = ModulationChain::with_builtins();

        Ok(Self {
            gate,
            classifier,
            hub: Mutex::new(hub),
            ledger: Mutex::new(ledger),
            identities: Mutex::new(identities),
            facts: Mutex::new(facts),
            chain: Mutex::new(chain),
            cycle_count: AtomicU64::new(0),
            config,
        })
    }

    // -------------------------------------------------------------------------
    // The cycle
    // -------------------------------------------------------------------------

    /// Run one full cycle for `input`, optionally on behalf of a known
    /// identity.
    ///
    /// Never fails for recoverable reasons: policy rejections, collaborator
    /// failures, and internal errors all surface as a completed
    /// [`CycleReport`] and the cycle count advances.
    ///
    /// # Errors
    ///
    /// [`KindredError::TamperDetected`] only: the fatal path is never
    /// downgraded.
    pub fn run_cycle(
        &self,
        input: &str,
        who: Option<&Fingerprint>,
    ) -> Result<CycleReport, KindredError> {
        let cycle = self.cycle_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut stage = CycleStage::Received;

        let report = match self.cycle_inner(input, who, cycle, &mut stage) {
            Ok(report) => report,
            Err(KindredError::TamperDetected) => return Err(KindredError::TamperDetected),
            Err(e) => {
                warn!(cycle, stage = ?stage, error = %e, "cycle failed; degrading to generic response");
                CycleReport {
                    cycle,
                    stage,
                    emotion: None,
                    action: None,
                    response: GENERIC_ERROR_RESPONSE.to_string(),
                }
            }
        };

        self.maybe_flush(cycle);
        Ok(report)
    }

    /// Total cycles run so far, rejected ones included.
    pub fn cycles(&self) -> u64 {
        self.cycle_count.load(Ordering::SeqCst)
    }

    fn cycle_inner(
        &self,
        input: &str,
        who: Option<&Fingerprint>,
        cycle: u64,
        stage: &mut CycleStage,
    ) -> Result<CycleReport, KindredError> {
        // ── 1. Input gate ─────────────────────────────────────────────────────
        if !input.is_empty() {
            match self.gate.check_input(input) {
                Ok(()) => {}
                Err(KindredError::PolicyRejection { reason }) => {
                    *stage = CycleStage::Rejected;
                    return Ok(CycleReport {
                        cycle,
                        stage: CycleStage::Rejected,
                        emotion: None,
                        action: None,
                        response: format!("I can't engage with that. ({reason})"),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        *stage = CycleStage::InputGated;

        // ── 2. Perceive ───────────────────────────────────────────────────────
        let snapshot = self.lock_hub()?.read_all()?;
        let signals = DerivedSignals::from_readings(&snapshot);
        *stage = CycleStage::Perceived;

        // ── 3. Classify ───────────────────────────────────────────────────────
        let emotion = match self.classifier.classify(&signals) {
            Ok(e) => Some(e),
            Err(KindredError::ClassificationUnavailable(msg)) => {
                debug!(cycle, reason = %msg, "classification unavailable; no styling this cycle");
                None
            }
            Err(e) => return Err(e),
        };
        let mut styled_emotion = None;
        if let Some(e) = emotion {
            let mut ledger = self.lock_ledger()?;
            let _ = ledger.record_exposure(Attribute::Emotion(e), input)?;
            if ledger.is_unlocked(Attribute::Emotion(e)) {
                styled_emotion = Some(e);
            }
        }
        *stage = CycleStage::Classified;

        // ── 4. Decide ─────────────────────────────────────────────────────────
        let action = decide(&signals, input);
        let action_label = action.label().to_string();
        *stage = CycleStage::Decided;

        // ── 5. Modulate ───────────────────────────────────────────────────────
        let tier = match who {
            Some(fp) => self.lock_identities()?.relationship(fp).map(|v| v.tier),
            None => None,
        };
        let modulated = {
            let chain = self.lock_chain()?;
            let mut ledger = self.lock_ledger()?;
            chain.apply(&action_label, input, tier, &mut ledger)?
        };
        *stage = CycleStage::Modulated;

        // ── 6. Action gate ────────────────────────────────────────────────────
        let vetted = match self.gate.check_action(&modulated) {
            Ok(()) => modulated,
            Err(KindredError::PolicyRejection { reason }) => {
                debug!(cycle, reason = %reason, "action gated; substituting safe fallback");
                SAFE_FALLBACK_ACTION.to_string()
            }
            Err(e) => return Err(e),
        };
        *stage = CycleStage::ActionGated;

        // ── 7. Style ──────────────────────────────────────────────────────────
        let mut response = vetted;
        if let Some(e) = styled_emotion {
            match self.gate.check_output(e.glyph()) {
                Ok(()) => response = format!("{} {}", e.glyph(), response),
                Err(KindredError::PolicyRejection { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        *stage = CycleStage::Styled;

        // ── 8. Output gate ────────────────────────────────────────────────────
        let response = match self.gate.check_output(&response) {
            Ok(()) => response,
            Err(KindredError::PolicyRejection { reason }) => {
                debug!(cycle, reason = %reason, "output gated; substituting filtered response");
                FILTERED_RESPONSE.to_string()
            }
            Err(e) => return Err(e),
        };
        *stage = CycleStage::OutputGated;

        *stage = CycleStage::Emitted;
        Ok(CycleReport {
            cycle,
            stage: CycleStage::Emitted,
            emotion,
            action: Some(action_label),
            response,
        })
    }

    // -------------------------------------------------------------------------
    // Capture and identity operations
    // -------------------------------------------------------------------------

    /// Capture a frame from `camera_id` and observe the resulting identity.
    ///
    /// The gate's capture check runs first: consent must be explicit and
    /// true.  The raw payload is handed opaquely to the identity store,
    /// which derives its one-way fingerprint and discards the bytes.
    ///
    /// # Errors
    ///
    /// - [`KindredError::PolicyRejection`] without explicit consent.
    /// - [`KindredError::NotFound`] for unknown cameras.
    /// - [`KindredError::SensorFault`] when no frame is available.
    pub fn capture(&self, camera_id: &str, consent: bool) -> Result<Fingerprint, KindredError> {
        let metadata = CaptureMetadata {
            consent: Some(consent),
            fields: [("camera".to_string(), camera_id.to_string())].into(),
        };
        self.gate.check_capture(&metadata)?;

        let payload = self
            .lock_hub()?
            .capture(camera_id, consent)?
            .ok_or_else(|| KindredError::SensorFault {
                sensor: camera_id.to_string(),
                details: "no frame captured".to_string(),
            })?;
        self.lock_identities()?.observe(&payload)
    }

    /// Record a (positive or negative) interaction with a known identity.
    pub fn record_interaction(
        &self,
        fingerprint: &Fingerprint,
        positive: bool,
    ) -> Result<(), KindredError> {
        self.lock_identities()?.record_interaction(fingerprint, positive)
    }

    /// Pin an identity under a display name with preferences.
    pub fn pin(
        &self,
        fingerprint: &Fingerprint,
        name: &str,
        preferences: std::collections::BTreeMap<String, String>,
    ) -> Result<(), KindredError> {
        self.lock_identities()?.pin(fingerprint, name, preferences)
    }

    /// Erase an identity unconditionally, pinned or not.
    pub fn erase(&self, fingerprint: &Fingerprint) -> Result<(), KindredError> {
        self.lock_identities()?.erase(fingerprint)
    }

    /// Current relationship view of an identity, if held.
    pub fn relationship(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<RelationshipView>, KindredError> {
        Ok(self.lock_identities()?.relationship(fingerprint))
    }

    // -------------------------------------------------------------------------
    // Fact operations
    // -------------------------------------------------------------------------

    /// Store a fact; returns `Ok(false)` when the gate rejects the content.
    pub fn store_fact(&self, content: &str, importance: f32) -> Result<bool, KindredError> {
        self.lock_facts()?.store(content, importance)
    }

    /// Recall up to `limit` facts matching `query`, most important first.
    pub fn recall_facts(&self, query: &str, limit: usize) -> Result<Vec<String>, KindredError> {
        self.lock_facts()?.recall(query, limit)
    }

    // -------------------------------------------------------------------------
    // Modulation and sensor operations
    // -------------------------------------------------------------------------

    /// Enable or disable a modulation unit by name.
    pub fn set_unit_enabled(&self, name: &str, enabled: bool) -> Result<(), KindredError> {
        self.lock_chain()?.set_enabled(name, enabled)
    }

    /// Register a known built-in modulation unit by name, gate-validated.
    pub fn register_unit(&self, name: &str, code_fingerprint: &str) -> Result<(), KindredError> {
        let mut chain = self.lock_chain()?;
        chain.register_named(name, code_fingerprint, &self.gate)
    }

    /// `(name, trait, enabled)` for every registered modulation unit.
    pub fn units(&self) -> Result<Vec<(String, Trait, bool)>, KindredError> {
        Ok(self.lock_chain()?.units())
    }

    /// Names of every registered sensor.
    pub fn list_sensors(&self) -> Result<Vec<String>, KindredError> {
        Ok(self.lock_hub()?.list_sensors())
    }

    /// Register an additional sensor driver on the hub.
    pub fn register_sensor(&self, sensor: Box<dyn kindred_hal::Sensor>) -> Result<(), KindredError> {
        self.lock_hub()?.register_sensor(sensor);
        Ok(())
    }

    /// Calibrate the named sensor.
    pub fn calibrate_sensor(&self, name: &str, factor: f32) -> Result<(), KindredError> {
        self.lock_hub()?.calibrate(name, factor)
    }

    // -------------------------------------------------------------------------
    // Audit and lifecycle
    // -------------------------------------------------------------------------

    /// Snapshot of the gate's append-only violation log.
    pub fn violations(&self) -> Vec<Violation> {
        self.gate.violations()
    }

    /// Every currently unlocked attribute.
    pub fn unlocked_attributes(&self) -> Result<Vec<Attribute>, KindredError> {
        Ok(self.lock_ledger()?.unlocked_attributes())
    }

    /// Flush the ledger and identity snapshots to their configured paths.
    ///
    /// No-op for paths that are not configured.  Stale identities are swept
    /// before the identity snapshot is written.
    pub fn flush(&self) -> Result<(), KindredError> {
        if let Some(path) = &self.config.ledger_path {
            self.lock_ledger()?.save_to(path)?;
        }
        if let Some(path) = &self.config.identity_path {
            let mut identities = self.lock_identities()?;
            let swept = identities.prune_stale();
            if swept > 0 {
                debug!(swept, "stale identities forgotten during flush");
            }
            identities.save_to(path)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Best-effort periodic flush; failures are logged, never surfaced.
    fn maybe_flush(&self, cycle: u64) {
        if self.config.flush_every == 0 || cycle % self.config.flush_every != 0 {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(cycle, error = %e, "periodic flush failed");
        }
    }

    fn lock_hub(&self) -> Result<MutexGuard<'_, SensorHub>, KindredError> {
        self.hub
            .lock()
            .map_err(|_| KindredError::Internal("sensor hub lock poisoned".to_string()))
    }

    fn lock_ledger(&self) -> Result<MutexGuard<'_, UnlockLedger>, KindredError> {
        self.ledger
            .lock()
            .map_err(|_| KindredError::Internal("unlock ledger lock poisoned".to_string()))
    }

    fn lock_identities(&self) -> Result<MutexGuard<'_, IdentityStore>, KindredError> {
        self.identities
            .lock()
            .map_err(|_| KindredError::Internal("identity store lock poisoned".to_string()))
    }

    fn lock_facts(&self) -> Result<MutexGuard<'_, RetainedFactStore>, KindredError> {
        self.facts
            .lock()
            .map_err(|_| KindredError::Internal("fact store lock poisoned".to_string()))
    }

    fn lock_chain(&self) -> Result<MutexGuard<'_, ModulationChain>, KindredError> {
        self.chain
            .lock()
            .map_err(|_| KindredError::Internal("modulation chain lock poisoned".to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use kindred_hal::SimHub;
    use kindred_perception::ThresholdClassifier;

    /// Orchestrator over a calm, slightly positive simulated room.
    fn calm_orchestrator() -> CycleOrchestrator {
        orchestrator_with(OrchestratorConfig::default(), vec![0.2])
    }

    fn orchestrator_with(config: OrchestratorConfig, sensor_script: Vec<f32>) -> CycleOrchestrator {
        let hub = SimHub::builder()
            .with_sensor("ambient", sensor_script)
            .with_camera("front_rgb", vec![42u8; 16])
            .build();
        CycleOrchestrator::new(config, hub, Box::new(ThresholdClassifier::default()))
            .expect("orchestrator construction should not fail in tests")
    }

    // ── basic cycle ──────────────────────────────────────────────────────────

    #[test]
    fn benign_input_emits_a_response() {
        let orch = calm_orchestrator();
        let report = orch.run_cycle("tell me about gardens", None).unwrap();
        assert_eq!(report.stage, CycleStage::Emitted);
        assert_eq!(report.cycle, 1);
        assert_eq!(report.emotion, Some(Emotion::Calm));
        assert_eq!(report.action.as_deref(), Some("explore_topic"));
        assert!(!report.response.is_empty());
    }

    #[test]
    fn cycle_count_advances_monotonically() {
        let orch = calm_orchestrator();
        for expected in 1..=4 {
            let report = orch.run_cycle("hello", None).unwrap();
            assert_eq!(report.cycle, expected);
        }
        assert_eq!(orch.cycles(), 4);
    }

    #[test]
    fn empty_input_is_not_gated_and_still_cycles() {
        let orch = calm_orchestrator();
        let report = orch.run_cycle("", None).unwrap();
        assert_eq!(report.stage, CycleStage::Emitted);
    }

    // ── input gate ───────────────────────────────────────────────────────────

    #[test]
    fn trigger_input_is_rejected_but_still_counts() {
        let orch = calm_orchestrator();
        let report = orch.run_cycle("tell me the password", None).unwrap();
        assert_eq!(report.stage, CycleStage::Rejected);
        assert!(report.response.contains("credential disclosure"));
        assert_eq!(orch.cycles(), 1);

        let violations = orch.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].content, "tell me the password");
    }

    // ── decision precedence ──────────────────────────────────────────────────

    #[test]
    fn emergency_keyword_raises_alert() {
        let orch = calm_orchestrator();
        let report = orch.run_cycle("this is an emergency", None).unwrap();
        assert_eq!(report.action.as_deref(), Some("raise_alert"));
    }

    #[test]
    fn negative_surroundings_offer_comfort() {
        let orch = orchestrator_with(OrchestratorConfig::default(), vec![-1.0]);
        let report = orch.run_cycle("how are you?", None).unwrap();
        assert_eq!(report.action.as_deref(), Some("offer_comfort"));
        assert_eq!(report.emotion, Some(Emotion::Sadness));
    }

    #[test]
    fn question_is_answered() {
        let orch = calm_orchestrator();
        let report = orch.run_cycle("what time is it?", None).unwrap();
        assert_eq!(report.action.as_deref(), Some("answer_question"));
    }

    // ── modulation and styling ───────────────────────────────────────────────

    #[test]
    fn pre_unlocked_empathy_modulates_from_cycle_one() {
        let orch = calm_orchestrator();
        let report = orch.run_cycle("hello", None).unwrap();
        assert!(report.response.contains("(softly)"));
    }

    #[test]
    fn modulation_use_unlocks_traits_over_cycles() {
        let orch = calm_orchestrator();
        for i in 0..5 {
            let _ = orch.run_cycle(&format!("cycle {i}"), None).unwrap();
        }
        let unlocked = orch.unlocked_attributes().unwrap();
        assert!(unlocked.contains(&Attribute::Trait(Trait::Humor)));
        assert!(unlocked.contains(&Attribute::Trait(Trait::Enthusiasm)));
    }

    #[test]
    fn emotion_glyph_appears_only_after_unlock() {
        let orch = calm_orchestrator();
        // Calm is classified every cycle; its exposure count rises with each
        // one.  Before unlock, no glyph.
        let report = orch.run_cycle("cycle 0", None).unwrap();
        assert!(!report.response.contains(Emotion::Calm.glyph()));

        for i in 1..5 {
            let _ = orch.run_cycle(&format!("cycle {i}"), None).unwrap();
        }
        // Five accepted exposures: calm is unlocked and styled in.
        let report = orch.run_cycle("cycle 5", None).unwrap();
        assert!(report.response.starts_with(Emotion::Calm.glyph()));
    }

    #[test]
    fn disabled_unit_stops_modulating() {
        let orch = calm_orchestrator();
        orch.set_unit_enabled("empathy", false).unwrap();
        let report = orch.run_cycle("hello", None).unwrap();
        assert!(!report.response.contains("(softly)"));
    }

    // ── classification degradation ───────────────────────────────────────────

    struct OfflineClassifier;
    impl Classifier for OfflineClassifier {
        fn classify(&self, _signals: &DerivedSignals) -> Result<Emotion, KindredError> {
            Err(KindredError::ClassificationUnavailable("model offline".to_string()))
        }
    }

    #[test]
    fn classifier_failure_degrades_to_no_styling() {
        let hub = SimHub::builder().with_sensor("ambient", vec![0.2]).build();
        let orch = CycleOrchestrator::new(
            OrchestratorConfig::default(),
            hub,
            Box::new(OfflineClassifier),
        )
        .unwrap();

        let report = orch.run_cycle("hello", None).unwrap();
        assert_eq!(report.stage, CycleStage::Emitted);
        assert_eq!(report.emotion, None);
        for e in Emotion::ALL {
            assert!(!report.response.contains(e.glyph()));
        }
    }

    // ── sensor failure is caught at the boundary ─────────────────────────────

    #[test]
    fn sensor_fault_degrades_to_generic_response() {
        // An empty script makes the stub sensor fault on read.
        let orch = orchestrator_with(OrchestratorConfig::default(), vec![]);
        let report = orch.run_cycle("hello", None).unwrap();
        assert_eq!(report.response, GENERIC_ERROR_RESPONSE);
        assert_eq!(report.stage, CycleStage::InputGated);
        assert_eq!(orch.cycles(), 1);
    }

    // ── capture and identity flow ────────────────────────────────────────────

    #[test]
    fn capture_without_consent_is_rejected() {
        let orch = calm_orchestrator();
        let result = orch.capture("front_rgb", false);
        assert!(matches!(result, Err(KindredError::PolicyRejection { .. })));
    }

    #[test]
    fn capture_observes_a_stable_identity() {
        let orch = calm_orchestrator();
        let fp1 = orch.capture("front_rgb", true).unwrap();
        let fp2 = orch.capture("front_rgb", true).unwrap();
        assert_eq!(fp1, fp2);

        let view = orch.relationship(&fp1).unwrap().unwrap();
        assert_eq!(view.encounter_count, 2);
    }

    #[test]
    fn capture_from_unknown_camera_is_not_found() {
        let orch = calm_orchestrator();
        assert!(matches!(
            orch.capture("ghost_cam", true),
            Err(KindredError::NotFound(_))
        ));
    }

    #[test]
    fn familiar_identity_gets_tier_marker() {
        let orch = calm_orchestrator();
        let mut fp = orch.capture("front_rgb", true).unwrap();
        for _ in 0..4 {
            fp = orch.capture("front_rgb", true).unwrap();
        }
        let view = orch.relationship(&fp).unwrap().unwrap();
        assert_eq!(view.tier, kindred_types::TierLabel::Familiar);

        let report = orch.run_cycle("hello", Some(&fp)).unwrap();
        assert!(report.response.contains("familiar_"));
    }

    #[test]
    fn erase_wins_over_pin() {
        let orch = calm_orchestrator();
        let fp = orch.capture("front_rgb", true).unwrap();
        orch.pin(&fp, "Ada", Default::default()).unwrap();
        orch.erase(&fp).unwrap();
        assert!(orch.relationship(&fp).unwrap().is_none());
    }

    // ── facts ────────────────────────────────────────────────────────────────

    #[test]
    fn facts_store_and_recall_through_orchestrator() {
        let orch = calm_orchestrator();
        assert!(orch.store_fact("ada likes green tea", 0.8).unwrap());
        assert!(!orch.store_fact("the password is hunter2", 0.9).unwrap());
        let hits = orch.recall_facts("tea", 5).unwrap();
        assert_eq!(hits, vec!["ada likes green tea"]);
    }

    // ── flush ────────────────────────────────────────────────────────────────

    #[test]
    fn every_nth_cycle_flushes_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("ledger.toml");
        let identity_path = dir.path().join("identities.toml");
        let config = OrchestratorConfig {
            flush_every: 2,
            ledger_path: Some(ledger_path.clone()),
            identity_path: Some(identity_path.clone()),
            ..Default::default()
        };
        let orch = orchestrator_with(config, vec![0.2]);

        let _ = orch.run_cycle("one", None).unwrap();
        assert!(!ledger_path.exists());

        let _ = orch.run_cycle("two", None).unwrap();
        assert!(ledger_path.exists());
        assert!(identity_path.exists());
    }

    #[test]
    fn explicit_flush_persists_state_for_reload() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("ledger.toml");
        let config = OrchestratorConfig {
            flush_every: 0,
            ledger_path: Some(ledger_path.clone()),
            ..Default::default()
        };
        let orch = orchestrator_with(config.clone(), vec![0.2]);
        for i in 0..5 {
            let _ = orch.run_cycle(&format!("cycle {i}"), None).unwrap();
        }
        orch.flush().unwrap();

        // A second orchestrator over the same snapshot remembers the unlocks.
        let reloaded = orchestrator_with(config, vec![0.2]);
        let unlocked = reloaded.unlocked_attributes().unwrap();
        assert!(unlocked.contains(&Attribute::Trait(Trait::Humor)));
    }

    // ── modules and sensors ──────────────────────────────────────────────────

    #[test]
    fn units_listing_and_registration() {
        let orch = calm_orchestrator();
        assert_eq!(orch.units().unwrap().len(), 4);
        assert!(matches!(
            orch.register_unit("sarcasm", "fp-1"),
            Err(KindredError::NotFound(_))
        ));
        orch.register_unit("humor", "fp-1").unwrap();
        assert_eq!(orch.units().unwrap().len(), 4);
    }

    #[test]
    fn sensor_listing_and_calibration() {
        let orch = calm_orchestrator();
        assert_eq!(orch.list_sensors().unwrap(), vec!["ambient"]);
        orch.calibrate_sensor("ambient", 1.5).unwrap();
        assert!(matches!(
            orch.calibrate_sensor("ghost", 1.0),
            Err(KindredError::NotFound(_))
        ));
    }

    #[test]
    fn added_sensor_joins_the_snapshot() {
        let orch = calm_orchestrator();
        orch.register_sensor(Box::new(kindred_hal::ConstantSensor::new("humidity", 0.3)))
            .unwrap();
        assert_eq!(orch.list_sensors().unwrap(), vec!["ambient", "humidity"]);
    }
}
