//! Classification contracts and threshold built-ins.
//!
//! Two collaborator contracts, both pluggable:
//!
//! * [`Classifier`] maps one cycle's [`DerivedSignals`] to exactly one
//!   member of the emotion catalogue.
//! * [`ContextLabeler`] produces a coarse textual context label for an
//!   identity once it has been encountered often enough.
//!
//! The built-ins ([`ThresholdClassifier`], [`EncounterLabeler`]) are fixed
//! threshold rules: deliberately simple, deliberately replaceable.

use tracing::debug;

use kindred_types::{Emotion, KindredError, RelationshipView};

use crate::signals::DerivedSignals;

// ─────────────────────────────────────────────────────────────────────────────
// Classifier
// ─────────────────────────────────────────────────────────────────────────────

/// Maps derived signals to exactly one emotion.
pub trait Classifier: Send + Sync {
    /// Classify one cycle's signals.
    ///
    /// # Errors
    ///
    /// Returns [`KindredError::ClassificationUnavailable`] when the
    /// collaborator cannot produce a class; the pipeline degrades to "no
    /// styling this cycle" rather than aborting.
    fn classify(&self, signals: &DerivedSignals) -> Result<Emotion, KindredError>;
}

/// Fixed threshold rules over the derived signals.
///
/// Evaluated in order: strongly positive mean → [`Emotion::Joy`]; strongly
/// negative mean → [`Emotion::Sadness`]; high spread → [`Emotion::Excitement`];
/// default → [`Emotion::Calm`].
///
/// # Example
///
/// ```
/// use kindred_perception::{DerivedSignals, Classifier, ThresholdClassifier};
/// use kindred_types::Emotion;
///
/// let clf = ThresholdClassifier::default();
/// let calm = DerivedSignals { mean: 0.1, spread: 0.1 };
/// assert_eq!(clf.classify(&calm).unwrap(), Emotion::Calm);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ThresholdClassifier {
    /// Mean at or above which the snapshot reads as positive.
    pub positive_mean: f32,
    /// Mean at or below which the snapshot reads as negative.
    pub negative_mean: f32,
    /// Spread at or above which the snapshot reads as high-arousal.
    pub arousal_spread: f32,
}

impl Default for ThresholdClassifier {
    fn default() -> Self {
        Self {
            positive_mean: 0.5,
            negative_mean: -0.5,
            arousal_spread: 1.0,
        }
    }
}

impl Classifier for ThresholdClassifier {
    fn classify(&self, signals: &DerivedSignals) -> Result<Emotion, KindredError> {
        let emotion = if signals.mean >= self.positive_mean {
            Emotion::Joy
        } else if signals.mean <= self.negative_mean {
            Emotion::Sadness
        } else if signals.spread >= self.arousal_spread {
            Emotion::Excitement
        } else {
            Emotion::Calm
        };
        debug!(
            mean = signals.mean,
            spread = signals.spread,
            class = emotion.name(),
            "signals classified"
        );
        Ok(emotion)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ContextLabeler
// ─────────────────────────────────────────────────────────────────────────────

/// Produces a coarse context label for an identity record.
pub trait ContextLabeler: Send + Sync {
    /// Label the identity described by `view`.
    ///
    /// # Errors
    ///
    /// Returns [`KindredError::ClassificationUnavailable`] when no label can
    /// be produced; the identity store keeps its previous label.
    fn label(&self, view: &RelationshipView) -> Result<String, KindredError>;
}

/// Labels an identity by encounter cadence alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncounterLabeler;

impl ContextLabeler for EncounterLabeler {
    fn label(&self, view: &RelationshipView) -> Result<String, KindredError> {
        let label = if view.encounter_count >= 20 {
            "constant companion"
        } else if view.encounter_count >= 5 {
            "regular visitor"
        } else {
            "new acquaintance"
        };
        Ok(label.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
