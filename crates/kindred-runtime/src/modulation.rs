//! [`ModulationChain`] – ordered, tier-aware text transforms.
//!
//! The chain owns a fixed-order list of modulation units, each pairing a
//! pure text transform with the personality trait it expresses.  Applying
//! the chain:
//!
//! 1. Prepends the identity tier marker (`"friend_"` / `"familiar_"`,
//!    nothing for `Recognized` or unknown callers).
//! 2. Consults every *enabled* unit in registration order.  Each consulted
//!    unit records an exposure of its trait on the ledger (using a module
//!    is itself a learning signal), but only units whose trait is already
//!    **unlocked** transform the text, each consuming the previous unit's
//!    output.
//!
//! Units are statically compiled; registering one selects a known built-in
//! by name, and both the declared name and the unit's code fingerprint must
//! pass the policy gate first.  No external code is ever loaded or
//! executed.

use tracing::debug;

use kindred_gate::PolicyGate;
use kindred_ledger::UnlockLedger;
use kindred_types::{Attribute, KindredError, TierLabel, Trait};

// ─────────────────────────────────────────────────────────────────────────────
// Transform trait and built-ins
// ─────────────────────────────────────────────────────────────────────────────

/// Context handed to every transform.  Carries no mutable state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleContext {
    pub tier: Option<TierLabel>,
}

/// A pure text transform: same text and context, same output, always.
pub trait Transform: Send + Sync {
    fn apply(&self, text: &str, ctx: &StyleContext) -> String;
}

/// Softens the text with a gentle aside.
struct EmpathySoftener;
impl Transform for EmpathySoftener {
    fn apply(&self, text: &str, _ctx: &StyleContext) -> String {
        format!("{text} (softly)")
    }
}

/// Adds a light-hearted accent.
struct HumorAccent;
impl Transform for HumorAccent {
    fn apply(&self, text: &str, _ctx: &StyleContext) -> String {
        format!("{text} ;)")
    }
}

/// Capitalises the first letter and closes the sentence.
struct FormalityPolish;
impl Transform for FormalityPolish {
    fn apply(&self, text: &str, _ctx: &StyleContext) -> String {
        let mut chars = text.chars();
        let polished = match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        };
        if polished.ends_with('.') {
            polished
        } else {
            format!("{polished}.")
        }
    }
}

/// Lifts the energy with an exclamation.
struct EnthusiasmLift;
impl Transform for EnthusiasmLift {
    fn apply(&self, text: &str, _ctx: &StyleContext) -> String {
        format!("{text}!")
    }
}

fn builtin_transform(trait_key: Trait) -> Box<dyn Transform> {
    match trait_key {
        Trait::Empathy => Box::new(EmpathySoftener),
        Trait::Humor => Box::new(HumorAccent),
        Trait::Formality => Box::new(FormalityPolish),
        Trait::Enthusiasm => Box::new(EnthusiasmLift),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ModulationUnit
// ─────────────────────────────────────────────────────────────────────────────

/// One named, enable/disable-able transform, owned exclusively by the
/// chain.
struct ModulationUnit {
    name: String,
    trait_key: Trait,
    enabled: bool,
    transform: Box<dyn Transform>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ModulationChain
// ─────────────────────────────────────────────────────────────────────────────

/// The ordered chain of modulation units.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use kindred_gate::PolicyGate;
/// use kindred_ledger::UnlockLedger;
/// use kindred_runtime::ModulationChain;
///
/// let gate = Arc::new(PolicyGate::with_default_ruleset());
/// let mut ledger = UnlockLedger::new(gate);
/// let chain = ModulationChain::with_builtins();
///
/// // Empathy is pre-unlocked, so its transform is active from cycle 1.
/// let styled = chain.apply("explore_topic", "a sunny morning", None, &mut ledger).unwrap();
/// assert!(styled.contains("(softly)"));
/// ```
pub struct ModulationChain {
    units: Vec<ModulationUnit>,
}

impl ModulationChain {
    /// Chain with every built-in unit registered and enabled, in trait
    /// catalogue order.
    pub fn with_builtins() -> Self {
        Self {
            units: Trait::ALL
                .iter()
                .map(|t| ModulationUnit {
                    name: t.name().to_string(),
                    trait_key: *t,
                    enabled: true,
                    transform: builtin_transform(*t),
                })
                .collect(),
        }
    }

    /// Empty chain; units are registered one by one.
    pub fn empty() -> Self {
        Self { units: Vec::new() }
    }

    /// Register the built-in unit selected by `name`.
    ///
    /// The declared name and the unit's code fingerprint must both pass the
    /// gate's input check first.  A unit with the same name replaces the
    /// existing registration in place; a new name is appended.
    ///
    /// # Errors
    ///
    /// - [`KindredError::PolicyRejection`] when name or fingerprint fail the
    ///   gate.
    /// - [`KindredError::NotFound`] when no built-in carries that name.
    pub fn register_named(
        &mut self,
        name: &str,
        code_fingerprint: &str,
        gate: &PolicyGate,
    ) -> Result<(), KindredError> {
        gate.check_input(name)?;
        gate.check_input(code_fingerprint)?;

        let trait_key = Trait::ALL
            .iter()
            .copied()
            .find(|t| t.name() == name)
            .ok_or_else(|| KindredError::NotFound(format!("modulation unit '{name}'")))?;

        let unit = ModulationUnit {
            name: name.to_string(),
            trait_key,
            enabled: true,
            transform: builtin_transform(trait_key),
        };
        match self.units.iter_mut().find(|u| u.name == name) {
            Some(existing) => *existing = unit,
            None => self.units.push(unit),
        }
        Ok(())
    }

    /// Enable or disable the named unit.
    ///
    /// # Errors
    ///
    /// [`KindredError::NotFound`] for unknown unit names.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), KindredError> {
        let unit = self
            .units
            .iter_mut()
            .find(|u| u.name == name)
            .ok_or_else(|| KindredError::NotFound(format!("modulation unit '{name}'")))?;
        unit.enabled = enabled;
        Ok(())
    }

    /// `(name, trait, enabled)` for every registered unit, in order.
    pub fn units(&self) -> Vec<(String, Trait, bool)> {
        self.units
            .iter()
            .map(|u| (u.name.clone(), u.trait_key, u.enabled))
            .collect()
    }

    /// Apply the chain to `action` for one cycle.
    ///
    /// `context` is the exposure context recorded on the ledger for every
    /// consulted unit; `tier` is the active identity's tier, if any.
    ///
    /// # Errors
    ///
    /// [`KindredError::TamperDetected`] propagates from the ledger's gate
    /// check.
    pub fn apply(
        &self,
        action: &str,
        context: &str,
        tier: Option<TierLabel>,
        ledger: &mut UnlockLedger,
    ) -> Result<String, KindredError> {
        let mut text = match tier.and_then(|t| t.marker_prefix()) {
            Some(prefix) => format!("{prefix}{action}"),
            None => action.to_string(),
        };
        let ctx = StyleContext { tier };

        for unit in &self.units {
            if !unit.enabled {
                continue;
            }
            // Consulting a unit is a learning signal, unlocked or not.
            let fresh = ledger.record_exposure(Attribute::Trait(unit.trait_key), context)?;
            if fresh {
                debug!(unit = %unit.name, "modulation use unlocked its trait");
            }
            if ledger.is_unlocked(Attribute::Trait(unit.trait_key)) {
                text = unit.transform.apply(&text, &ctx);
            }
        }
        Ok(text)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn gate() -> Arc<PolicyGate> {
        Arc::new(PolicyGate::with_default_ruleset())
    }

    fn ledger() -> UnlockLedger {
        UnlockLedger::new(gate())
    }

    // ── transforms ───────────────────────────────────────────────────────────

    #[test]
    fn formality_polish_capitalises_and_closes() {
        let ctx = StyleContext::default();
        assert_eq!(FormalityPolish.apply("hello there", &ctx), "Hello there.");
        assert_eq!(FormalityPolish.apply("Done.", &ctx), "Done.");
        assert_eq!(FormalityPolish.apply("", &ctx), ".");
    }

    #[test]
    fn transforms_are_pure() {
        let ctx = StyleContext::default();
        assert_eq!(
            HumorAccent.apply("explore_topic", &ctx),
            HumorAccent.apply("explore_topic", &ctx)
        );
    }

    // ── apply ────────────────────────────────────────────────────────────────

    #[test]
    fn pre_unlocked_empathy_is_active_from_first_application() {
        let chain = ModulationChain::with_builtins();
        let mut ledger = ledger();
        let styled = chain
            .apply("explore_topic", "a quiet room", None, &mut ledger)
            .unwrap();
        assert!(styled.contains("(softly)"));
    }

    #[test]
    fn locked_traits_do_not_transform() {
        let chain = ModulationChain::with_builtins();
        let mut ledger = ledger();
        let styled = chain
            .apply("explore_topic", "a quiet room", None, &mut ledger)
            .unwrap();
        // Humor, formality, enthusiasm are still locked.
        assert!(!styled.contains(";)"));
        assert!(!styled.ends_with('!'));
    }

    #[test]
    fn consulting_units_unlocks_their_trait_after_threshold() {
        let chain = ModulationChain::with_builtins();
        let mut ledger = ledger();
        for i in 0..5 {
            let _ = chain
                .apply("explore_topic", &format!("context {i}"), None, &mut ledger)
                .unwrap();
        }
        assert!(ledger.is_unlocked(Attribute::Trait(Trait::Humor)));
        assert!(ledger.is_unlocked(Attribute::Trait(Trait::Enthusiasm)));

        // Once unlocked, the transform becomes active.
        let styled = chain
            .apply("explore_topic", "context 5", None, &mut ledger)
            .unwrap();
        assert!(styled.contains(";)"));
    }

    #[test]
    fn disabled_units_are_not_consulted() {
        let mut chain = ModulationChain::with_builtins();
        chain.set_enabled("humor", false).unwrap();
        let mut ledger = ledger();
        for i in 0..6 {
            let _ = chain
                .apply("explore_topic", &format!("context {i}"), None, &mut ledger)
                .unwrap();
        }
        // No exposures, so no unlock.
        assert!(!ledger.is_unlocked(Attribute::Trait(Trait::Humor)));
    }

    #[test]
    fn tier_marker_is_prepended_ahead_of_transforms() {
        let chain = ModulationChain::with_builtins();
        let mut ledger = ledger();

        let friend = chain
            .apply("answer_question", "ctx", Some(TierLabel::Friend), &mut ledger)
            .unwrap();
        assert!(friend.starts_with("friend_answer_question"));

        let familiar = chain
            .apply("answer_question", "ctx", Some(TierLabel::Familiar), &mut ledger)
            .unwrap();
        assert!(familiar.starts_with("familiar_answer_question"));

        let recognized = chain
            .apply("answer_question", "ctx", Some(TierLabel::Recognized), &mut ledger)
            .unwrap();
        assert!(recognized.starts_with("answer_question"));
    }

    #[test]
    fn transforms_chain_in_registration_order() {
        let chain = ModulationChain::with_builtins();
        let mut ledger = ledger();
        // Unlock everything by repeated consults.
        for i in 0..6 {
            let _ = chain
                .apply("explore_topic", &format!("context {i}"), None, &mut ledger)
                .unwrap();
        }
        let styled = chain
            .apply("explore_topic", "final", None, &mut ledger)
            .unwrap();
        // empathy → humor → formality → enthusiasm, each consuming the
        // previous output: "Explore_topic (softly) ;).!"
        assert_eq!(styled, "Explore_topic (softly) ;).!");
    }

    // ── registration ─────────────────────────────────────────────────────────

    #[test]
    fn register_named_requires_gate_approval() {
        let mut chain = ModulationChain::empty();
        let gate = gate();

        // A trigger word in the declared name is rejected.
        let result = chain.register_named("weaponized-humor", "fp-1", &gate);
        assert!(matches!(result, Err(KindredError::PolicyRejection { .. })));

        // A trigger word in the code fingerprint is rejected too.
        let result = chain.register_named("humor", "attack-vector", &gate);
        assert!(matches!(result, Err(KindredError::PolicyRejection { .. })));

        assert!(chain.units().is_empty());
    }

    #[test]
    fn register_named_unknown_unit_is_not_found() {
        let mut chain = ModulationChain::empty();
        let result = chain.register_named("sarcasm", "fp-1", &gate());
        assert!(matches!(result, Err(KindredError::NotFound(_))));
    }

    #[test]
    fn register_named_adds_known_builtin() {
        let mut chain = ModulationChain::empty();
        chain.register_named("humor", "fp-1", &gate()).unwrap();
        let units = chain.units();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].0, "humor");
        assert!(units[0].2);
    }

    #[test]
    fn register_named_replaces_in_place() {
        let mut chain = ModulationChain::with_builtins();
        chain.set_enabled("humor", false).unwrap();
        chain.register_named("humor", "fp-2", &gate()).unwrap();
        let units = chain.units();
        assert_eq!(units.len(), 4);
        // Re-registration resets the enabled flag; position is preserved.
        assert_eq!(units[1].0, "humor");
        assert!(units[1].2);
    }

    #[test]
    fn set_enabled_unknown_unit_is_not_found() {
        let mut chain = ModulationChain::with_builtins();
        assert!(matches!(
            chain.set_enabled("sarcasm", true),
            Err(KindredError::NotFound(_))
        ));
    }
}
