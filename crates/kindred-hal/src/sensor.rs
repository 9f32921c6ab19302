//! Generic `Sensor` trait for scalar-reading devices.

use kindred_types::KindredError;

/// Calibration factors outside this range are rejected before reaching the
/// driver.
pub const CALIBRATION_RANGE: (f32, f32) = (0.1, 2.0);

/// A device that produces one scalar reading per poll.
///
/// Drivers implement this trait and register themselves with a
/// [`SensorHub`][crate::hub::SensorHub].
pub trait Sensor: Send + Sync {
    /// Stable identifier for this sensor, e.g. `"ambient_light"`.
    fn id(&self) -> &str;

    /// Read the next value.
    ///
    /// # Errors
    ///
    /// Returns [`KindredError::SensorFault`] if the device cannot be read.
    fn read(&mut self) -> Result<f32, KindredError>;

    /// Apply a multiplicative calibration factor to subsequent readings.
    ///
    /// The hub validates `factor` against [`CALIBRATION_RANGE`] before
    /// calling this method.
    fn calibrate(&mut self, factor: f32) -> Result<(), KindredError>;
}

/// A sensor that reports a fixed value, scaled by calibration.
///
/// Statically compiled stand-in for hardware added at runtime; the command
/// surface registers these by name rather than loading driver code.
pub struct ConstantSensor {
    id: String,
    value: f32,
    factor: f32,
}

impl ConstantSensor {
    pub fn new(id: impl Into<String>, value: f32) -> Self {
        Self {
            id: id.into(),
            value,
            factor: 1.0,
        }
    }
}

impl Sensor for ConstantSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn read(&mut self) -> Result<f32, KindredError> {
        Ok(self.value * self.factor)
    }

    fn calibrate(&mut self, factor: f32) -> Result<(), KindredError> {
        self.factor = factor;
        Ok(())
    }
}
