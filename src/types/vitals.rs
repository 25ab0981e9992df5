//! types/vitals.rs
//!
//! Value types that flow through the pipeline: region samples, per-source
//! baselines and the immutable per-frame `VitalsResult`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::keypoints::KeypointName;

/// Skin regions sampled for colour statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionName {
    LeftCheek,
    RightCheek,
    Forehead,
}

impl RegionName {
    pub const ALL: [RegionName; 3] = [
        RegionName::LeftCheek,
        RegionName::RightCheek,
        RegionName::Forehead,
    ];

    /// The keypoint a region window is centred on.
    pub fn anchor(self) -> KeypointName {
        match self {
            RegionName::LeftCheek => KeypointName::LeftCheek,
            RegionName::RightCheek => KeypointName::RightCheek,
            RegionName::Forehead => KeypointName::Forehead,
        }
    }
}

/// Mean channel intensities over one sampled window, each in [0, 255].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionSample {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl RegionSample {
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Redness in [0, 1]: `(R - (G + B) / 2) / 255`, clamped.
    pub fn redness(&self) -> f64 {
        ((self.r - (self.g + self.b) / 2.0) / 255.0).clamp(0.0, 1.0)
    }

    /// True when every channel sits at or beyond one of the saturation limits.
    pub fn is_saturated(&self, low: f64, high: f64) -> bool {
        let channels = [self.r, self.g, self.b];
        channels.iter().all(|c| *c >= high) || channels.iter().all(|c| *c <= low)
    }
}

/// Region name to mean colour, for the regions that survived clipping.
pub type RegionSamples = BTreeMap<RegionName, RegionSample>;

/// Per-source physiological baseline supplied by the baseline provider.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub baseline_hr: u16,
    pub baseline_rr: u16,
    /// Static risk carried over from the patient record, in [0, 1].
    pub baseline_risk: f64,
}

impl Default for Baseline {
    fn default() -> Self {
        Self {
            baseline_hr: 72,
            baseline_rr: 16,
            baseline_risk: 0.0,
        }
    }
}

/// Output of one pipeline pass for one frame. Never mutated after
/// construction; the hub shares it between consumers behind an `Arc`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VitalsResult {
    pub source_id: String,
    /// Producer-supplied sequence number or timestamp of the frame.
    pub sequence: u64,
    pub flushing_score: Option<f64>,
    pub heart_rate_bpm: Option<u16>,
    pub respiratory_rate: Option<u16>,
    pub risk_score: f64,
    pub alert: bool,
    pub degraded: bool,
    /// JPEG of the frame with the landmark overlay, when enabled.
    pub annotated_frame: Option<Vec<u8>>,
}
