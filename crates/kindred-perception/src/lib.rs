//! `kindred-perception` – Signal Derivation and Classification Contracts.
//!
//! Reduces a raw sensor snapshot to a small set of derived scalar signals
//! and defines the pluggable classification contracts the pipeline leans
//! on.  No real model is mandated anywhere: both contracts are single-method
//! traits with simple threshold-rule built-ins, so an implementer can
//! substitute a real model without altering the pipeline.
//!
//! # Modules
//!
//! - [`signals`] – [`DerivedSignals`][signals::DerivedSignals]: mean and
//!   spread of a sensor snapshot.
//! - [`classify`] – the [`Classifier`][classify::Classifier] and
//!   [`ContextLabeler`][classify::ContextLabeler] contracts with their
//!   threshold built-ins.

pub mod classify;
pub mod signals;

pub use classify::{Classifier, ContextLabeler, EncounterLabeler, ThresholdClassifier};
pub use signals::DerivedSignals;
