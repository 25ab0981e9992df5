//! types/keypoints.rs
//!
//! Keypoint sets produced by a landmark detector. A set always carries every
//! named keypoint, in the order of `KeypointName::ALL`, with coordinates
//! normalized to the frame (0.0 = left/top, 1.0 = right/bottom).

use serde::{Deserialize, Serialize};

/// Number of keypoints in every `KeypointSet`.
pub const KEYPOINT_COUNT: usize = 8;

/// Named facial keypoints understood by the region sampler and the overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypointName {
    LeftEye,
    RightEye,
    NoseTip,
    MouthLeft,
    MouthRight,
    LeftCheek,
    RightCheek,
    Forehead,
}

impl KeypointName {
    /// Canonical ordering of keypoints inside a `KeypointSet`.
    pub const ALL: [KeypointName; KEYPOINT_COUNT] = [
        KeypointName::LeftEye,
        KeypointName::RightEye,
        KeypointName::NoseTip,
        KeypointName::MouthLeft,
        KeypointName::MouthRight,
        KeypointName::LeftCheek,
        KeypointName::RightCheek,
        KeypointName::Forehead,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// A 2-D point in normalized image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Convert to a pixel position in a `width` x `height` frame.
    pub fn to_pixel(self, width: u32, height: u32) -> (i64, i64) {
        (
            (self.x as f64 * width as f64).round() as i64,
            (self.y as f64 * height as f64).round() as i64,
        )
    }
}

/// The fixed-size output of a landmark detector for one detected face.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeypointSet {
    points: [Point2; KEYPOINT_COUNT],
}

impl KeypointSet {
    /// Build a set from points given in `KeypointName::ALL` order.
    pub fn new(points: [Point2; KEYPOINT_COUNT]) -> Self {
        Self { points }
    }

    /// Build a set from `(name, point)` pairs. Returns `None` unless every
    /// name appears exactly once.
    pub fn from_named(pairs: &[(KeypointName, Point2)]) -> Option<Self> {
        let mut slots: [Option<Point2>; KEYPOINT_COUNT] = [None; KEYPOINT_COUNT];
        for (name, point) in pairs {
            let slot = &mut slots[name.index()];
            if slot.is_some() {
                return None;
            }
            *slot = Some(*point);
        }

        let mut points = [Point2::new(0.0, 0.0); KEYPOINT_COUNT];
        for (dst, src) in points.iter_mut().zip(slots.iter()) {
            *dst = (*src)?;
        }
        Some(Self { points })
    }

    pub fn get(&self, name: KeypointName) -> Point2 {
        self.points[name.index()]
    }

    /// Iterate over `(name, point)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (KeypointName, Point2)> + '_ {
        KeypointName::ALL.iter().copied().zip(self.points.iter().copied())
    }
}
