//! Generic `Camera` trait for consent-aware image capture.

use kindred_types::KindredError;

/// An image-capture device.
///
/// The returned payload is opaque to every caller except the identity
/// store, which derives a one-way fingerprint from it and discards the
/// bytes.
pub trait Camera: Send + Sync {
    /// Stable identifier for this camera, e.g. `"front_rgb"`.
    fn id(&self) -> &str;

    /// Capture a raw frame.
    ///
    /// Returns `Ok(None)` when `consent` is false: the driver itself never
    /// captures without consent, independently of the policy gate's own
    /// consent check upstream.
    ///
    /// # Errors
    ///
    /// Returns [`KindredError::SensorFault`] if the device cannot produce a
    /// frame.
    fn capture_raw(&mut self, consent: bool) -> Result<Option<Vec<u8>>, KindredError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockCamera {
        id: String,
    }

    impl Camera for MockCamera {
        fn id(&self) -> &str {
            &self.id
        }

        fn capture_raw(&mut self, consent: bool) -> Result<Option<Vec<u8>>, KindredError> {
            if !consent {
                return Ok(None);
            }
            Ok(Some(vec![0u8; 4]))
        }
    }

    #[test]
    fn capture_requires_consent() {
        let mut cam = MockCamera {
            id: "front_rgb".to_string(),
        };
        assert_eq!(cam.id(), "front_rgb");
        assert!(cam.capture_raw(false).unwrap().is_none());
        assert_eq!(cam.capture_raw(true).unwrap().unwrap().len(), 4);
    }
}
