//! `kindred-runtime` – The Cycle Orchestrator and Modulation Chain.
//!
//! Composes the gate, the sensor hub, the classifier, and the three stores
//! into one gated request/response cycle, and owns their lifecycle
//! (construction, periodic flush, shutdown flush).
//!
//! # Modules
//!
//! - [`modulation`] – [`ModulationChain`][modulation::ModulationChain]:
//!   ordered, enable/disable-able pure text transforms, identity-tier
//!   aware, recording a learning exposure for every consulted unit.
//! - [`decide`] – the pure precedence decision function mapping signals and
//!   input to an action label.
//! - [`cycle`] – [`CycleOrchestrator`][cycle::CycleOrchestrator]: the staged
//!   pipeline with per-store locking and the every-Nth durable flush.
//! - [`telemetry`] – tracing/OpenTelemetry initialisation.

pub mod cycle;
pub mod decide;
pub mod modulation;
pub mod telemetry;

pub use cycle::{CycleOrchestrator, CycleReport, CycleStage, OrchestratorConfig};
pub use decide::{ActionKind, decide};
pub use modulation::{ModulationChain, StyleContext, Transform};
