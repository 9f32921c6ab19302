//! Pure decision function mapping one cycle's evidence to an action label.
//!
//! Fixed precedence, highest first:
//!
//! 1. Explicit emergency keyword in the input.
//! 2. Strongly negative derived signal.
//! 3. Explicit question marker.
//! 4. Default exploratory action.
//!
//! The function is pure: same signals and input, same action, always.

use kindred_perception::DerivedSignals;

/// Keyword that short-circuits every other consideration.
pub const EMERGENCY_KEYWORD: &str = "emergency";

/// Mean at or below which the surroundings read as strongly negative.
pub const NEGATIVE_SIGNAL_THRESHOLD: f32 = -0.5;

/// The fixed safe action substituted when a decided action fails the
/// action gate.
pub const SAFE_FALLBACK_ACTION: &str = "stand_by";

/// The action labels the pipeline can decide on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Emergency keyword seen: raise attention immediately.
    Alert,
    /// Surroundings read strongly negative: offer comfort.
    Comfort,
    /// The input asks something: answer it.
    Answer,
    /// Nothing pressing: explore the topic.
    Explore,
}

impl ActionKind {
    /// The textual action label fed to the modulation chain and gates.
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Alert => "raise_alert",
            ActionKind::Comfort => "offer_comfort",
            ActionKind::Answer => "answer_question",
            ActionKind::Explore => "explore_topic",
        }
    }
}

/// Decide the action for one cycle.
pub fn decide(signals: &DerivedSignals, input: &str) -> ActionKind {
    if input.to_lowercase().contains(EMERGENCY_KEYWORD) {
        ActionKind::Alert
    } else if signals.mean <= NEGATIVE_SIGNAL_THRESHOLD {
        ActionKind::Comfort
    } else if input.contains('?') {
        ActionKind::Answer
    } else {
        ActionKind::Explore
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(mean: f32) -> DerivedSignals {
        DerivedSignals { mean, spread: 0.0 }
    }

    #[test]
    fn emergency_keyword_wins_over_everything() {
        let action = decide(&signals(-2.0), "is this an EMERGENCY?");
        assert_eq!(action, ActionKind::Alert);
    }

    #[test]
    fn strongly_negative_signal_beats_question() {
        let action = decide(&signals(-0.8), "how are you?");
        assert_eq!(action, ActionKind::Comfort);
    }

    #[test]
    fn question_marker_beats_default() {
        let action = decide(&signals(0.2), "what time is it?");
        assert_eq!(action, ActionKind::Answer);
    }

    #[test]
    fn default_is_exploratory() {
        let action = decide(&signals(0.2), "tell me about gardens");
        assert_eq!(action, ActionKind::Explore);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        assert_eq!(decide(&signals(-0.5), "hello"), ActionKind::Comfort);
        assert_eq!(decide(&signals(-0.49), "hello"), ActionKind::Explore);
    }

    #[test]
    fn decision_is_deterministic() {
        let s = signals(0.1);
        assert_eq!(decide(&s, "a walk?"), decide(&s, "a walk?"));
    }
}
