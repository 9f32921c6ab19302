//! [`SimHub`] – in-process simulation hub for tests and CI.
//!
//! Constructs a [`SensorHub`] whose every slot is backed by a scripted stub
//! driver, so the full pipeline can run in a unit-test or CI environment
//! without physical devices.
//!
//! # Stub behaviour
//!
//! | Driver type | Stub behaviour |
//! |---|---|
//! | [`Sensor`] | Replays a preset sequence of readings, then holds the last one; calibration multiplies subsequent readings. |
//! | [`Camera`] | Returns a fixed payload on every consented capture. |
//!
//! # Example
//!
//! ```rust
//! use kindred_hal::SimHub;
//!
//! let mut hub = SimHub::builder()
//!     .with_sensor("ambient_light", vec![0.9, 0.1])
//!     .with_camera("front_rgb", vec![7, 7, 7])
//!     .build();
//!
//! let first = hub.read_all().unwrap();
//! assert!((first["ambient_light"] - 0.9).abs() < 1e-6);
//! let second = hub.read_all().unwrap();
//! assert!((second["ambient_light"] - 0.1).abs() < 1e-6);
//! ```

use kindred_types::KindredError;

use crate::camera::Camera;
use crate::hub::SensorHub;
use crate::sensor::Sensor;

// ─────────────────────────────────────────────────────────────────────────────
// Stub sensor
// ─────────────────────────────────────────────────────────────────────────────

struct StubSensor {
    id: String,
    script: Vec<f32>,
    cursor: usize,
    factor: f32,
}

impl Sensor for StubSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn read(&mut self) -> Result<f32, KindredError> {
        if self.script.is_empty() {
            return Err(KindredError::SensorFault {
                sensor: self.id.clone(),
                details: "stub sensor has no scripted readings".to_string(),
            });
        }
        let value = self.script[self.cursor.min(self.script.len() - 1)];
        if self.cursor < self.script.len() - 1 {
            self.cursor += 1;
        }
        Ok(value * self.factor)
    }

    fn calibrate(&mut self, factor: f32) -> Result<(), KindredError> {
        self.factor = factor;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stub camera
// ─────────────────────────────────────────────────────────────────────────────

struct StubCamera {
    id: String,
    payload: Vec<u8>,
}

impl Camera for StubCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture_raw(&mut self, consent: bool) -> Result<Option<Vec<u8>>, KindredError> {
        if !consent {
            return Ok(None);
        }
        Ok(Some(self.payload.clone()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SimHub builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder that constructs a [`SensorHub`] populated with scripted stubs.
#[derive(Default)]
pub struct SimHub {
    sensors: Vec<(String, Vec<f32>)>,
    cameras: Vec<(String, Vec<u8>)>,
}

impl SimHub {
    /// Create a new builder with no registered stubs.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Register a stub [`Sensor`] that replays `script` and then holds its
    /// last value.
    pub fn with_sensor(mut self, id: impl Into<String>, script: Vec<f32>) -> Self {
        self.sensors.push((id.into(), script));
        self
    }

    /// Register a stub [`Camera`] returning `payload` on every consented
    /// capture.
    pub fn with_camera(mut self, id: impl Into<String>, payload: Vec<u8>) -> Self {
        self.cameras.push((id.into(), payload));
        self
    }

    /// Consume the builder and return a fully populated [`SensorHub`].
    pub fn build(self) -> SensorHub {
        let mut hub = SensorHub::new();
        for (id, script) in self.sensors {
            hub.register_sensor(Box::new(StubSensor {
                id,
                script,
                cursor: 0,
                factor: 1.0,
            }));
        }
        for (id, payload) in self.cameras {
            hub.register_camera(Box::new(StubCamera { id, payload }));
        }
        hub
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
