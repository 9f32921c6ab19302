//! [`SensorHub`] – central driver registry and snapshot reader.
//!
//! The hub stores every registered [`Sensor`] and [`Camera`] driver, keyed
//! by identifier, and is the only surface the orchestrator reads the world
//! through: a whole-hub [`SensorHub::read_all`] snapshot per cycle, plus
//! per-device calibration and consent-aware capture.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use kindred_types::KindredError;

use crate::camera::Camera;
use crate::sensor::{CALIBRATION_RANGE, Sensor};

/// Central registry of sensor and camera drivers.
///
/// Construct with [`SensorHub::new`], register drivers, then read the world
/// via [`SensorHub::read_all`].
///
/// # Example
///
/// ```
/// use kindred_hal::SimHub;
///
/// let mut hub = SimHub::builder()
///     .with_sensor("ambient_light", vec![0.8])
///     .with_sensor("noise_level", vec![0.2])
///     .build();
///
/// let snapshot = hub.read_all().unwrap();
/// assert_eq!(snapshot.len(), 2);
/// ```
#[derive(Default)]
pub struct SensorHub {
    sensors: HashMap<String, Box<dyn Sensor>>,
    cameras: HashMap<String, Box<dyn Camera>>,
}

impl SensorHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sensor driver.  Any previously registered driver with the
    /// same `id` is replaced.
    pub fn register_sensor(&mut self, sensor: Box<dyn Sensor>) {
        self.sensors.insert(sensor.id().to_string(), sensor);
    }

    /// Register a camera driver.  Any previously registered driver with the
    /// same `id` is replaced.
    pub fn register_camera(&mut self, camera: Box<dyn Camera>) {
        self.cameras.insert(camera.id().to_string(), camera);
    }

    /// Names of every registered sensor, sorted.
    pub fn list_sensors(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sensors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Read every registered sensor once and return the name → value
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns the first [`KindredError::SensorFault`] encountered; a
    /// snapshot is all-or-nothing.
    pub fn read_all(&mut self) -> Result<BTreeMap<String, f32>, KindredError> {
        let mut snapshot = BTreeMap::new();
        for (name, sensor) in self.sensors.iter_mut() {
            let value = sensor.read()?;
            snapshot.insert(name.clone(), value);
        }
        debug!(sensors = snapshot.len(), "sensor snapshot read");
        Ok(snapshot)
    }

    /// Calibrate the named sensor.
    ///
    /// # Errors
    ///
    /// - [`KindredError::SensorFault`] when `factor` is outside
    ///   [`CALIBRATION_RANGE`].
    /// - [`KindredError::NotFound`] when no sensor with that name is
    ///   registered.
    pub fn calibrate(&mut self, name: &str, factor: f32) -> Result<(), KindredError> {
        let (lo, hi) = CALIBRATION_RANGE;
        if !(lo..=hi).contains(&factor) {
            return Err(KindredError::SensorFault {
                sensor: name.to_string(),
                details: format!("calibration factor {factor} outside [{lo}, {hi}]"),
            });
        }
        match self.sensors.get_mut(name) {
            Some(sensor) => sensor.calibrate(factor),
            None => Err(KindredError::NotFound(format!(
                "sensor '{name}' is not registered"
            ))),
        }
    }

    /// Capture a raw frame from the named camera.
    ///
    /// Returns `Ok(None)` when the driver withholds the frame (no consent).
    ///
    /// # Errors
    ///
    /// [`KindredError::NotFound`] when no camera with that id is registered.
    pub fn capture(&mut self, camera_id: &str, consent: bool) -> Result<Option<Vec<u8>>, KindredError> {
        match self.cameras.get_mut(camera_id) {
            Some(camera) => camera.capture_raw(consent),
            None => Err(KindredError::NotFound(format!(
                "camera '{camera_id}' is not registered"
            ))),
        }
    }
}
