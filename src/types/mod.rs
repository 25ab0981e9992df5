//! Shared data types for the vitals pipeline.

pub mod keypoints;
pub mod vitals;

pub use keypoints::{KeypointName, KeypointSet, Point2, KEYPOINT_COUNT};
pub use vitals::{Baseline, RegionName, RegionSample, RegionSamples, VitalsResult};
