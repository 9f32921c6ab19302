//! Derived scalar signals.
//!
//! Each cycle reduces the whole-hub sensor snapshot to two scalars:
//!
//! * **mean** – the arithmetic mean of all readings; the pipeline's coarse
//!   valence signal (positive readings pull it up, negative pull it down).
//! * **spread** – the population standard deviation; the pipeline's arousal
//!   signal (disagreeing sensors mean something is happening).
//!
//! An empty snapshot derives to all-zero signals rather than an error, so a
//! sensorless deployment degrades to the neutral class.

use std::collections::BTreeMap;

/// The derived signals for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DerivedSignals {
    /// Arithmetic mean of all readings in the snapshot.
    pub mean: f32,
    /// Population standard deviation of the readings.
    pub spread: f32,
}

impl DerivedSignals {
    /// Derive signals from a name → value sensor snapshot.
    pub fn from_readings(readings: &BTreeMap<String, f32>) -> Self {
        if readings.is_empty() {
            return Self::default();
        }
        let n = readings.len() as f32;
        let mean = readings.values().sum::<f32>() / n;
        let variance = readings
            .values()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f32>()
            / n;
        Self {
            mean,
            spread: variance.sqrt(),
        }
    }
}
