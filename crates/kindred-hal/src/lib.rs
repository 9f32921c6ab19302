//! `kindred-hal` – Sensor Abstraction Layer.
//!
//! Defines the driver traits the pipeline observes the world through and a
//! registry that dispatches to them by identifier.  The orchestrator never
//! interprets raw capture bytes itself: scalar readings feed the derived
//! signals, and camera payloads are handed opaquely to the identity store.
//!
//! # Modules
//!
//! - [`sensor`] – the [`Sensor`][sensor::Sensor] trait (scalar read +
//!   bounded calibration).
//! - [`camera`] – the [`Camera`][camera::Camera] trait (consent-aware raw
//!   capture).
//! - [`hub`] – [`SensorHub`][hub::SensorHub]: central driver registry and
//!   snapshot reader.
//! - [`sim`] – [`SimHub`][sim::SimHub]: scripted in-process stubs for tests
//!   and CI.

pub mod camera;
pub mod hub;
pub mod sensor;
pub mod sim;

pub use camera::Camera;
pub use hub::SensorHub;
pub use sensor::{ConstantSensor, Sensor};
pub use sim::SimHub;
