//! [`IdentityStore`] – keyed, decaying relationship memory.
//!
//! Identities are keyed by a one-way SHA-256 fingerprint of the raw capture
//! payload; the payload itself is never stored and the fingerprint is never
//! reversible to it.  Records strengthen with encounters and positive
//! interactions, promote through ordered tiers, and silently expire after a
//! forget window of inactivity unless pinned.
//!
//! ## Decay ordering
//!
//! Staleness is evaluated against the *previous* `last_seen` after the
//! refresh has been applied: a single observation arriving after the forget
//! window deletes the record instead of reviving it, so
//! [`IdentityStore::relationship`] reports the identity absent immediately
//! after that call.  Pinned records never decay; only an explicit
//! [`IdentityStore::erase`] removes them.
//!
//! # Example
//!
//! ```
//! use kindred_memory::IdentityStore;
//! use kindred_types::TierLabel;
//!
//! let mut store = IdentityStore::new();
//! let fp = store.observe(b"capture bytes").unwrap();
//!
//! let view = store.relationship(&fp).unwrap();
//! assert_eq!(view.tier, TierLabel::Recognized);
//! assert_eq!(view.encounter_count, 1);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use kindred_perception::ContextLabeler;
use kindred_types::{Fingerprint, KindredError, RelationshipView, TierLabel};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Encounters required before an identity is `Familiar` and its context
/// label is (re)computed.
pub const CONTEXT_THRESHOLD: u64 = 5;

/// Positive interactions required for the top tier, regardless of encounter
/// count.
pub const FRIEND_THRESHOLD: u64 = 20;

/// Days of inactivity after which a non-pinned record is forgotten.
pub const FORGET_WINDOW_DAYS: i64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// IdentityRecord
// ─────────────────────────────────────────────────────────────────────────────

/// One identity's relationship memory.  The tier is derived on read, never
/// stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub encounter_count: u64,
    pub positive_interactions: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_label: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub preferences: BTreeMap<String, String>,
    #[serde(default)]
    pub pinned: bool,
}

impl IdentityRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            first_seen: now,
            last_seen: now,
            encounter_count: 1,
            positive_interactions: 0,
            display_name: None,
            context_label: None,
            preferences: BTreeMap::new(),
            pinned: false,
        }
    }

    /// Pure tier derivation from the interaction counters.
    fn tier(&self) -> TierLabel {
        if self.positive_interactions >= FRIEND_THRESHOLD {
            TierLabel::Friend
        } else if self.encounter_count >= CONTEXT_THRESHOLD {
            TierLabel::Familiar
        } else {
            TierLabel::Recognized
        }
    }

    fn view(&self, fingerprint: Fingerprint) -> RelationshipView {
        RelationshipView {
            fingerprint,
            tier: self.tier(),
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            encounter_count: self.encounter_count,
            positive_interactions: self.positive_interactions,
            display_name: self.display_name.clone(),
            context_label: self.context_label.clone(),
            preferences: self.preferences.clone(),
            pinned: self.pinned,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Flat, human-inspectable snapshot of the whole store, keyed by
/// fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub identities: BTreeMap<String, IdentityRecord>,
}

// ─────────────────────────────────────────────────────────────────────────────
// IdentityStore
// ─────────────────────────────────────────────────────────────────────────────

/// Decaying relationship memory keyed by capture fingerprint.
pub struct IdentityStore {
    records: BTreeMap<String, IdentityRecord>,
    forget_window: Duration,
    labeler: Option<Box<dyn ContextLabeler>>,
}

impl IdentityStore {
    /// Construct an empty store with the default [`FORGET_WINDOW_DAYS`] and
    /// no context labeler.
    pub fn new() -> Self {
        Self::with_forget_window(Duration::days(FORGET_WINDOW_DAYS))
    }

    /// Construct an empty store with a custom forget window.
    pub fn with_forget_window(forget_window: Duration) -> Self {
        Self {
            records: BTreeMap::new(),
            forget_window,
            labeler: None,
        }
    }

    /// Inject the context-labeling collaborator.
    ///
    /// Without one, identities simply never receive a context label.
    pub fn set_labeler(&mut self, labeler: Box<dyn ContextLabeler>) {
        self.labeler = Some(labeler);
    }

    /// Derive the one-way fingerprint of a capture payload.
    ///
    /// Identical payloads always derive the identical fingerprint; the
    /// payload is not recoverable from it.
    pub fn fingerprint_of(payload: &[u8]) -> Fingerprint {
        let digest = Sha256::digest(payload);
        Fingerprint::new(hex::encode(digest))
    }

    /// Record one observation of a capture payload.
    ///
    /// Unseen fingerprints create a fresh record with `encounter_count = 1`.
    /// Known fingerprints refresh `last_seen` and increment the counter,
    /// unless the record had already outlived the forget window, in which
    /// case it is forgotten as a side effect of this very call (see the
    /// module docs on decay ordering).  At [`CONTEXT_THRESHOLD`] encounters
    /// the context label is (re)computed via the injected labeler; labeler
    /// failure keeps the previous label.
    pub fn observe(&mut self, payload: &[u8]) -> Result<Fingerprint, KindredError> {
        let fp = Self::fingerprint_of(payload);
        let now = Utc::now();

        let Some(record) = self.records.get_mut(fp.as_str()) else {
            debug!(fingerprint = fp.as_str(), "new identity observed");
            self.records.insert(fp.as_str().to_string(), IdentityRecord::new(now));
            return Ok(fp);
        };

        let previous_last_seen = record.last_seen;
        record.last_seen = now;
        record.encounter_count += 1;

        // Decay: a sufficiently stale record is forgotten, not revived.
        if !record.pinned && now - previous_last_seen > self.forget_window {
            info!(fingerprint = fp.as_str(), "stale identity forgotten");
            self.records.remove(fp.as_str());
            return Ok(fp);
        }

        if record.encounter_count >= CONTEXT_THRESHOLD {
            if let Some(labeler) = &self.labeler {
                let view = record.view(fp.clone());
                match labeler.label(&view) {
                    Ok(label) => record.context_label = Some(label),
                    // Collaborator failure degrades; the old label stands.
                    Err(_) => {}
                }
            }
        }
        Ok(fp)
    }

    /// Record an interaction with a known identity.
    ///
    /// Positive interactions count toward the `Friend` tier; negative ones
    /// are acknowledged but not tallied.
    ///
    /// # Errors
    ///
    /// [`KindredError::NotFound`] for unknown fingerprints.
    pub fn record_interaction(
        &mut self,
        fingerprint: &Fingerprint,
        positive: bool,
    ) -> Result<(), KindredError> {
        let record = self
            .records
            .get_mut(fingerprint.as_str())
            .ok_or_else(|| KindredError::NotFound(format!("identity '{fingerprint}'")))?;
        if positive {
            record.positive_interactions += 1;
        }
        Ok(())
    }

    /// Pin an identity: assign a display name and preferences, and exempt
    /// it from decay until explicitly erased.
    ///
    /// # Errors
    ///
    /// [`KindredError::NotFound`] for unknown fingerprints.
    pub fn pin(
        &mut self,
        fingerprint: &Fingerprint,
        name: &str,
        preferences: BTreeMap<String, String>,
    ) -> Result<(), KindredError> {
        let record = self
            .records
            .get_mut(fingerprint.as_str())
            .ok_or_else(|| KindredError::NotFound(format!("identity '{fingerprint}'")))?;
        record.pinned = true;
        record.display_name = Some(name.to_string());
        record.preferences = preferences;
        Ok(())
    }

    /// Erase an identity unconditionally, pinned or not.
    ///
    /// An explicit erase request always wins over persisted memory.
    ///
    /// # Errors
    ///
    /// [`KindredError::NotFound`] for unknown fingerprints.
    pub fn erase(&mut self, fingerprint: &Fingerprint) -> Result<(), KindredError> {
        match self.records.remove(fingerprint.as_str()) {
            Some(_) => {
                info!(fingerprint = fingerprint.as_str(), "identity erased on request");
                Ok(())
            }
            None => Err(KindredError::NotFound(format!("identity '{fingerprint}'"))),
        }
    }

    /// Current relationship view of an identity, tier derived on read.
    ///
    /// Returns `None` for fingerprints the store does not (or no longer)
    /// holds.
    pub fn relationship(&self, fingerprint: &Fingerprint) -> Option<RelationshipView> {
        self.records
            .get(fingerprint.as_str())
            .map(|r| r.view(fingerprint.clone()))
    }

    /// Sweep every non-pinned record past the forget window.
    ///
    /// Returns the number of identities forgotten.
    pub fn prune_stale(&mut self) -> usize {
        let now = Utc::now();
        let window = self.forget_window;
        let before = self.records.len();
        self.records
            .retain(|_, r| r.pinned || now - r.last_seen <= window);
        before - self.records.len()
    }

    /// Number of identities currently held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when no identities are held.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Flat snapshot of the whole store, keyed by fingerprint.
    pub fn snapshot(&self) -> IdentitySnapshot {
        IdentitySnapshot {
            identities: self.records.clone(),
        }
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(forget_window: Duration, snapshot: IdentitySnapshot) -> Self {
        Self {
            records: snapshot.identities,
            forget_window,
            labeler: None,
        }
    }

    /// Write the snapshot to `path` as TOML.
    ///
    /// # Errors
    ///
    /// [`KindredError::Persistence`] on serialization or I/O failure.
    pub fn save_to(&self, path: &Path) -> Result<(), KindredError> {
        let raw = toml::to_string_pretty(&self.snapshot())
            .map_err(|e| KindredError::Persistence(format!("serialize identities: {e}")))?;
        std::fs::write(path, raw)
            .map_err(|e| KindredError::Persistence(format!("write {}: {e}", path.display())))?;
        Ok(())
    }

    /// Load a store from `path`.
    ///
    /// A missing file is an empty initial state.  Structurally invalid
    /// content fails loudly rather than silently dropping records.
    ///
    /// # Errors
    ///
    /// [`KindredError::Persistence`] on unreadable or invalid content.
    pub fn load_from(forget_window: Duration, path: &Path) -> Result<Self, KindredError> {
        if !path.exists() {
            return Ok(Self::with_forget_window(forget_window));
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| KindredError::Persistence(format!("read {}: {e}", path.display())))?;
        let snapshot: IdentitySnapshot = toml::from_str(&raw)
            .map_err(|e| KindredError::Persistence(format!("parse {}: {e}", path.display())))?;
        Ok(Self::from_snapshot(forget_window, snapshot))
    }
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
