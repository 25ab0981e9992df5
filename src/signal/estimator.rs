//! Vitals estimator
//!
//! Turns per-frame region samples into flushing, heart-rate and respiratory
//! estimates. All rolling state lives in `SignalState`, which is owned by a
//! single source; the estimator itself only holds configuration and the FFT
//! plan.
//!
//! Heart rate and respiration are spectral estimates over the forehead
//! green-channel series: the heart-rate window covers about five seconds,
//! the respiratory window is longer so that it spans several breaths.

use crate::config::PipelineConfig;
use crate::types::{RegionName, RegionSamples};

use super::spectral::SpectralEstimator;
use super::window::RollingWindow;

/// Estimates produced for one frame. Missing values mean "not known yet";
/// once known, a value persists until a newer estimate replaces it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartialVitals {
    pub flushing_score: Option<f64>,
    pub heart_rate_bpm: Option<u16>,
    pub respiratory_rate: Option<u16>,
    /// Signal quality is too poor for new heart/respiratory estimates.
    pub degraded: bool,
}

/// Rolling per-source signal state.
#[derive(Clone, Debug)]
pub struct SignalState {
    hr_window: RollingWindow,
    rr_window: RollingWindow,
    flushing_score: Option<f64>,
    heart_rate_bpm: Option<u16>,
    respiratory_rate: Option<u16>,
    saturated_run: u32,
    clean_run: u32,
    degraded: bool,
}

impl SignalState {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            hr_window: RollingWindow::new(config.hr_window),
            rr_window: RollingWindow::new(config.rr_window),
            flushing_score: None,
            heart_rate_bpm: None,
            respiratory_rate: None,
            saturated_run: 0,
            clean_run: 0,
            degraded: false,
        }
    }

    pub fn hr_window(&self) -> &RollingWindow {
        &self.hr_window
    }

    pub fn rr_window(&self) -> &RollingWindow {
        &self.rr_window
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Last-known values.
    pub fn snapshot(&self) -> PartialVitals {
        PartialVitals {
            flushing_score: self.flushing_score,
            heart_rate_bpm: self.heart_rate_bpm,
            respiratory_rate: self.respiratory_rate,
            degraded: self.degraded,
        }
    }
}

pub struct VitalsEstimator {
    spectral: SpectralEstimator,
    hr_band: (f64, f64),
    rr_band: (f64, f64),
    saturation_low: f64,
    saturation_high: f64,
    degraded_after_frames: u32,
    recovered_after_frames: u32,
}

impl VitalsEstimator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            spectral: SpectralEstimator::new(config.frame_rate, config.fft_size),
            hr_band: config.hr_band,
            rr_band: config.rr_band,
            saturation_low: config.saturation_low,
            saturation_high: config.saturation_high,
            degraded_after_frames: config.degraded_after_frames,
            recovered_after_frames: config.recovered_after_frames,
        }
    }

    /// Fold one frame's region samples into `state` and return the current
    /// estimates.
    pub fn update(&mut self, state: &mut SignalState, samples: &RegionSamples) -> PartialVitals {
        if samples.is_empty() {
            return state.snapshot();
        }

        let saturated = samples
            .values()
            .all(|s| s.is_saturated(self.saturation_low, self.saturation_high));
        if saturated {
            self.record_saturated(state);
            return state.snapshot();
        }
        self.record_clean(state);

        if let Some(score) = flushing_score(samples) {
            state.flushing_score = Some(score);
        }

        if let Some(forehead) = samples.get(&RegionName::Forehead) {
            state.hr_window.push(forehead.g);
            state.rr_window.push(forehead.g);

            if !state.degraded {
                if state.hr_window.is_full() {
                    if let Some(cpm) = self.spectral.peak_cpm(state.hr_window.iter(), self.hr_band) {
                        state.heart_rate_bpm = Some(to_rate(cpm, self.hr_band));
                    }
                }
                if state.rr_window.is_full() {
                    if let Some(cpm) = self.spectral.peak_cpm(state.rr_window.iter(), self.rr_band) {
                        state.respiratory_rate = Some(to_rate(cpm, self.rr_band));
                    }
                }
            }
        }

        state.snapshot()
    }

    fn record_saturated(&self, state: &mut SignalState) {
        state.clean_run = 0;
        state.saturated_run = state.saturated_run.saturating_add(1);
        if !state.degraded && state.saturated_run > self.degraded_after_frames {
            log::debug!("Signal degraded after {} saturated frames", state.saturated_run);
            state.degraded = true;
        }
    }

    fn record_clean(&self, state: &mut SignalState) {
        state.saturated_run = 0;
        if state.degraded {
            state.clean_run += 1;
            if state.clean_run >= self.recovered_after_frames {
                log::debug!("Signal recovered after {} clean frames", state.clean_run);
                state.degraded = false;
                state.clean_run = 0;
            }
        }
    }
}

/// Mean redness of the available cheeks, or `None` without cheek samples.
pub fn flushing_score(samples: &RegionSamples) -> Option<f64> {
    let cheeks: Vec<f64> = [RegionName::LeftCheek, RegionName::RightCheek]
        .iter()
        .filter_map(|region| samples.get(region))
        .map(|s| s.redness())
        .collect();
    if cheeks.is_empty() {
        return None;
    }
    Some((cheeks.iter().sum::<f64>() / cheeks.len() as f64).clamp(0.0, 1.0))
}

fn to_rate(cpm: f64, band: (f64, f64)) -> u16 {
    cpm.round().clamp(band.0.ceil(), band.1.floor()) as u16
}
