//! `kindred-gate` – The Policy Gate.
//!
//! Single interception point for every piece of content that enters or
//! leaves the agent.  Before external data is accepted and before any
//! action or output is released, it must pass through a [`PolicyGate`]
//! check.
//!
//! # Modules
//!
//! - [`ruleset`] – [`Ruleset`][ruleset::Ruleset]: the ordered rule phrases,
//!   the content-trigger table, and the SHA-256 integrity hash.
//! - [`gate`] – [`PolicyGate`][gate::PolicyGate]: the four check channels
//!   (input, output, action, capture), the one-way poisoned flag, and the
//!   append-only violation log.

pub mod gate;
pub mod ruleset;

pub use gate::{PolicyGate, Violation};
pub use ruleset::{Ruleset, TriggerRule};
