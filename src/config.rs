//! Service configuration
//!
//! Every tunable of the pipeline, the source sessions and the broadcast hub
//! lives here. Defaults match the documented behaviour; a JSON file may
//! override any subset of fields. Configuration is validated before anything
//! is constructed from it: a service never runs with undefined thresholds.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{KeypointName, KeypointSet, Point2};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Durations are written as integer milliseconds in configuration files.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Signal-processing parameters shared by every source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Nominal producer frame rate in frames per second.
    pub frame_rate: f64,
    /// Heart-rate window length in frames (150 = 5 s at 30 fps).
    pub hr_window: usize,
    /// Respiratory window length in frames.
    pub rr_window: usize,
    /// FFT length; windows are zero-padded up to this size.
    pub fft_size: usize,
    /// Valid heart-rate band in cycles per minute.
    pub hr_band: (f64, f64),
    /// Valid respiratory band in cycles per minute.
    pub rr_band: (f64, f64),
    /// Half-size in pixels of the square sampling window.
    pub roi_half_size: u32,
    pub saturation_low: f64,
    pub saturation_high: f64,
    /// Consecutive saturated frames tolerated before the source is degraded.
    pub degraded_after_frames: u32,
    /// Consecutive clean frames required to leave the degraded state.
    pub recovered_after_frames: u32,
    pub alert_threshold: f64,
    pub annotate_frames: bool,
    pub annotation_jpeg_quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30.0,
            hr_window: 150,
            rr_window: 450,
            fft_size: 4096,
            hr_band: (45.0, 180.0),
            rr_band: (5.0, 40.0),
            roi_half_size: 10,
            saturation_low: 5.0,
            saturation_high: 250.0,
            degraded_after_frames: 15,
            recovered_after_frames: 5,
            alert_threshold: 0.70,
            annotate_frames: false,
            annotation_jpeg_quality: 80,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(invalid("frame_rate", "must be a positive number"));
        }
        if self.hr_window < 8 {
            return Err(invalid("hr_window", "must hold at least 8 frames"));
        }
        if self.rr_window < 8 {
            return Err(invalid("rr_window", "must hold at least 8 frames"));
        }
        if self.fft_size < self.hr_window.max(self.rr_window) {
            return Err(invalid("fft_size", "must be at least as long as both windows"));
        }
        let nyquist_cpm = self.frame_rate / 2.0 * 60.0;
        for (field, (lo, hi)) in [("hr_band", self.hr_band), ("rr_band", self.rr_band)] {
            if !(lo.is_finite() && hi.is_finite()) || lo <= 0.0 || lo >= hi {
                return Err(invalid(field, format!("({lo}, {hi}) is not an increasing positive range")));
            }
            if hi > nyquist_cpm {
                return Err(invalid(field, format!("upper bound {hi} exceeds Nyquist ({nyquist_cpm} cpm)")));
            }
        }
        if self.roi_half_size == 0 {
            return Err(invalid("roi_half_size", "must be at least one pixel"));
        }
        if !(0.0..=255.0).contains(&self.saturation_low)
            || !(0.0..=255.0).contains(&self.saturation_high)
            || self.saturation_low >= self.saturation_high
        {
            return Err(invalid(
                "saturation_low",
                "saturation limits must lie in [0, 255] with low < high",
            ));
        }
        if self.degraded_after_frames == 0 {
            return Err(invalid("degraded_after_frames", "must be at least 1"));
        }
        if self.recovered_after_frames == 0 {
            return Err(invalid("recovered_after_frames", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.alert_threshold) {
            return Err(invalid("alert_threshold", "must lie in [0, 1]"));
        }
        if !(1..=100).contains(&self.annotation_jpeg_quality) {
            return Err(invalid("annotation_jpeg_quality", "must lie in 1..=100"));
        }
        Ok(())
    }
}

/// Lifecycle limits for one producer session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Close the session when no frame arrives within this window.
    #[serde(with = "duration_ms", rename = "idle_timeout_ms")]
    pub idle_timeout: Duration,
    /// Consecutive undecodable frames tolerated before the producer is
    /// treated as disconnected.
    pub max_decode_failures: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            max_decode_failures: 10,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout.is_zero() {
            return Err(invalid("idle_timeout_ms", "must be positive"));
        }
        if self.max_decode_failures == 0 {
            return Err(invalid("max_decode_failures", "must be at least 1"));
        }
        Ok(())
    }
}

/// Fan-out limits for the broadcast hub.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Messages buffered per consumer before it is dropped for backpressure.
    pub outbox_capacity: usize,
    /// Upper bound on a single send to one consumer.
    #[serde(with = "duration_ms", rename = "send_timeout_ms")]
    pub send_timeout: Duration,
    /// Tell consumers when a producer goes away.
    pub announce_source_close: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: 64,
            send_timeout: Duration::from_secs(2),
            announce_source_close: true,
        }
    }
}

impl HubConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbox_capacity == 0 {
            return Err(invalid("outbox_capacity", "must be at least 1"));
        }
        if self.send_timeout.is_zero() {
            return Err(invalid("send_timeout_ms", "must be positive"));
        }
        Ok(())
    }
}

/// Fixed keypoints for deployments without a face detector, e.g. a
/// bed-mounted camera whose framing never changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkConfig {
    pub points: Vec<(KeypointName, Point2)>,
}

impl Default for LandmarkConfig {
    fn default() -> Self {
        Self {
            points: vec![
                (KeypointName::LeftEye, Point2::new(0.40, 0.40)),
                (KeypointName::RightEye, Point2::new(0.60, 0.40)),
                (KeypointName::NoseTip, Point2::new(0.50, 0.52)),
                (KeypointName::MouthLeft, Point2::new(0.43, 0.64)),
                (KeypointName::MouthRight, Point2::new(0.57, 0.64)),
                (KeypointName::LeftCheek, Point2::new(0.37, 0.55)),
                (KeypointName::RightCheek, Point2::new(0.63, 0.55)),
                (KeypointName::Forehead, Point2::new(0.50, 0.25)),
            ],
        }
    }
}

impl LandmarkConfig {
    pub fn keypoints(&self) -> Result<KeypointSet, ConfigError> {
        KeypointSet::from_named(&self.points)
            .ok_or_else(|| invalid("landmarks.points", "every keypoint must be listed exactly once"))
    }
}

/// Top-level configuration for a vitals service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub pipeline: PipelineConfig,
    pub session: SessionConfig,
    pub hub: HubConfig,
    pub landmarks: LandmarkConfig,
}

impl ServiceConfig {
    /// Load and validate a JSON configuration file. Missing fields take
    /// their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.session.validate()?;
        self.hub.validate()?;
        self.landmarks.keypoints()?;
        Ok(())
    }
}
