//! [`RetainedFactStore`] – bounded, importance-weighted fact retention.
//!
//! Holds at most `capacity` `(content, importance)` pairs.  Under pressure
//! the single minimum-importance entry is evicted, oldest first on ties.
//! That eviction is expected steady-state behaviour, not an error.  Storage and recall are
//! independently policy-gated: a fact fit for storage may later be deemed
//! unfit for output.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use kindred_gate::PolicyGate;
//! use kindred_memory::RetainedFactStore;
//!
//! let gate = Arc::new(PolicyGate::with_default_ruleset());
//! let mut store = RetainedFactStore::new(gate, 2);
//!
//! assert!(store.store("ada likes green tea", 0.9).unwrap());
//! assert!(store.store("it rained on tuesday", 0.1).unwrap());
//! assert!(store.store("the door sticks in winter", 0.5).unwrap());
//!
//! // The least important fact was evicted.
//! assert_eq!(store.len(), 2);
//! let hits = store.recall("tea", 5).unwrap();
//! assert_eq!(hits, vec!["ada likes green tea"]);
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use kindred_gate::PolicyGate;
use kindred_types::KindredError;

// ─────────────────────────────────────────────────────────────────────────────
// RetainedFact
// ─────────────────────────────────────────────────────────────────────────────

/// One retained fact with its importance weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetainedFact {
    pub content: String,
    /// Importance in `[0.0, 1.0]`; clamped on store.
    pub importance: f32,
    /// Monotonic insertion counter, used for oldest-first tie-breaking.
    pub seq: u64,
    pub stored_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// RetainedFactStore
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity-bounded store with least-importance eviction.
pub struct RetainedFactStore {
    gate: Arc<PolicyGate>,
    capacity: usize,
    next_seq: u64,
    facts: Vec<RetainedFact>,
}

impl RetainedFactStore {
    /// Construct an empty store bounded by `capacity`.
    pub fn new(gate: Arc<PolicyGate>, capacity: usize) -> Self {
        Self {
            gate,
            capacity,
            next_seq: 0,
            facts: Vec::with_capacity(capacity),
        }
    }

    /// Store a fact.
    ///
    /// Returns `Ok(false)` when the content fails the gate's input check
    /// (no state change) or when the store has zero capacity.  Otherwise the
    /// fact is inserted: evicting the current minimum-importance entry
    /// first if the store is full: and `Ok(true)` is returned.  After any
    /// outcome `len() <= capacity` holds.
    ///
    /// # Errors
    ///
    /// [`KindredError::TamperDetected`] propagates from the gate.
    pub fn store(&mut self, content: &str, importance: f32) -> Result<bool, KindredError> {
        match self.gate.check_input(content) {
            Ok(()) => {}
            Err(KindredError::TamperDetected) => return Err(KindredError::TamperDetected),
            Err(_) => return Ok(false),
        }
        if self.capacity == 0 {
            return Ok(false);
        }

        if self.facts.len() >= self.capacity {
            self.evict_least_important();
        }

        let fact = RetainedFact {
            content: content.to_string(),
            importance: importance.clamp(0.0, 1.0),
            seq: self.next_seq,
            stored_at: Utc::now(),
        };
        self.next_seq += 1;
        self.facts.push(fact);
        Ok(true)
    }

    /// Recall up to `limit` facts containing `query` (case-insensitive),
    /// most important first.
    ///
    /// Every surviving candidate is re-checked against the gate's *output*
    /// policy before being returned: recall-time policy is enforced
    /// independently of storage-time policy.
    ///
    /// # Errors
    ///
    /// [`KindredError::TamperDetected`] propagates from the gate.
    pub fn recall(&self, query: &str, limit: usize) -> Result<Vec<String>, KindredError> {
        let needle = query.to_lowercase();
        let mut hits: Vec<&RetainedFact> = Vec::new();
        for fact in &self.facts {
            if !fact.content.to_lowercase().contains(&needle) {
                continue;
            }
            match self.gate.check_output(&fact.content) {
                Ok(()) => hits.push(fact),
                Err(KindredError::TamperDetected) => return Err(KindredError::TamperDetected),
                // Unfit for output now, even though it was fit for storage.
                Err(_) => {}
            }
        }
        hits.sort_by(|a, b| b.importance.total_cmp(&a.importance).then(a.seq.cmp(&b.seq)));
        hits.truncate(limit);
        Ok(hits.iter().map(|f| f.content.clone()).collect())
    }

    /// Number of facts currently held.  Never exceeds the capacity.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// `true` when no facts are held.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// The configured bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Read-only view of every retained fact, insertion order.
    pub fn entries(&self) -> &[RetainedFact] {
        &self.facts
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Remove the single minimum-importance entry, oldest first on ties.
    fn evict_least_important(&mut self) {
        let victim = self
            .facts
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.importance
                    .total_cmp(&b.importance)
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|(i, _)| i);
        if let Some(i) = victim {
            let evicted = self.facts.remove(i);
            debug!(
                content = %evicted.content,
                importance = evicted.importance,
                "evicted least-important fact"
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
