//! Landmark detection capability
//!
//! The pipeline never depends on a particular face model. Anything that can
//! turn a frame into at most one `KeypointSet` plugs in through
//! `LandmarkDetector`.

use image::RgbImage;

use crate::types::KeypointSet;

/// Finds the face in a frame. Returns `None` when no face is visible.
pub trait LandmarkDetector: Send + Sync {
    fn detect(&self, frame: &RgbImage) -> Option<KeypointSet>;
}

impl<F> LandmarkDetector for F
where
    F: Fn(&RgbImage) -> Option<KeypointSet> + Send + Sync,
{
    fn detect(&self, frame: &RgbImage) -> Option<KeypointSet> {
        self(frame)
    }
}

/// Reports the same keypoints for every frame. Suits fixed-mount cameras
/// where the patient's face stays in a known place.
#[derive(Clone, Debug)]
pub struct StaticLandmarkDetector {
    keypoints: KeypointSet,
}

impl StaticLandmarkDetector {
    pub fn new(keypoints: KeypointSet) -> Self {
        Self { keypoints }
    }
}

impl LandmarkDetector for StaticLandmarkDetector {
    fn detect(&self, _frame: &RgbImage) -> Option<KeypointSet> {
        Some(self.keypoints.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LandmarkConfig;

    #[test]
    fn test_static_detector_always_finds_face() {
        let keypoints = LandmarkConfig::default().keypoints().unwrap();
        let detector = StaticLandmarkDetector::new(keypoints.clone());
        let frame = RgbImage::new(8, 8);
        assert_eq!(detector.detect(&frame), Some(keypoints));
    }

    #[test]
    fn test_closure_detector() {
        let detector = |_frame: &RgbImage| -> Option<KeypointSet> { None };
        assert!(LandmarkDetector::detect(&detector, &RgbImage::new(2, 2)).is_none());
    }
}
