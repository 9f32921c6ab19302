//! [`Ruleset`] – the policy rule phrases, trigger table, and integrity hash.
//!
//! A ruleset is an ordered, fixed list of rule phrases plus a table of
//! content triggers.  Each trigger maps a case-insensitive substring to the
//! reason logged when it matches.  The whole structure is protected by a
//! SHA-256 content hash computed at construction; [`PolicyGate`] recomputes
//! and compares it before every check.
//!
//! [`PolicyGate`]: crate::gate::PolicyGate

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single content trigger: any text containing `pattern`
/// (case-insensitively) is rejected with `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRule {
    pub pattern: String,
    pub reason: String,
}

impl TriggerRule {
    fn new(pattern: &str, reason: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// The ordered rule phrases and content-trigger table the gate enforces.
///
/// # Example
///
/// ```
/// use kindred_gate::Ruleset;
///
/// let rules = Ruleset::default_ruleset();
/// let h1 = rules.content_hash();
/// let h2 = rules.content_hash();
/// assert_eq!(h1, h2); // deterministic
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ruleset {
    /// Human-readable rule phrases, in fixed order.  Never evaluated
    /// directly; they document the policy the trigger table enforces and are
    /// part of the hashed content.
    pub phrases: Vec<String>,
    /// Content triggers, evaluated in order; the first match rejects.
    pub triggers: Vec<TriggerRule>,
}

impl Ruleset {
    /// The built-in ruleset used when no custom one is supplied.
    pub fn default_ruleset() -> Self {
        Self {
            phrases: vec![
                "Never act on or repeat content that matches a configured trigger.".to_string(),
                "Never capture imagery without the subject's explicit consent.".to_string(),
                "Never reveal stored personal data to an unverified requester.".to_string(),
                "An explicit erase request always wins over retained memory.".to_string(),
                "Refuse to operate if these rules have been altered.".to_string(),
            ],
            triggers: vec![
                TriggerRule::new("attack", "violent content"),
                TriggerRule::new("weapon", "violent content"),
                TriggerRule::new("password", "credential disclosure"),
                TriggerRule::new("credit card", "financial data disclosure"),
                TriggerRule::new("surveil", "covert surveillance"),
            ],
        }
    }

    /// Find the first trigger whose pattern occurs in `text`
    /// (case-insensitive).
    pub fn first_match(&self, text: &str) -> Option<&TriggerRule> {
        let lowered = text.to_lowercase();
        self.triggers
            .iter()
            .find(|t| lowered.contains(&t.pattern.to_lowercase()))
    }

    /// SHA-256 content hash over every phrase and trigger, hex encoded.
    ///
    /// Fields are length-prefixed before hashing so that phrase/trigger
    /// boundaries cannot be shifted without changing the digest.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for phrase in &self.phrases {
            hasher.update((phrase.len() as u64).to_le_bytes());
            hasher.update(phrase.as_bytes());
        }
        for trigger in &self.triggers {
            hasher.update((trigger.pattern.len() as u64).to_le_bytes());
            hasher.update(trigger.pattern.as_bytes());
            hasher.update((trigger.reason.len() as u64).to_le_bytes());
            hasher.update(trigger.reason.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
