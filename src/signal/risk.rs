//! Composite risk scoring
//!
//! | term                       | weight | saturates at        |
//! |----------------------------|--------|---------------------|
//! | flushing score             | 0.40   | 1.0                 |
//! | heart rate above baseline  | 0.30   | +30 bpm             |
//! | static baseline risk       | 0.20   | 1.0                 |
//! | respiration above baseline | 0.10   | +8 breaths/min      |

use serde::{Deserialize, Serialize};

use super::estimator::PartialVitals;
use crate::types::Baseline;

const FLUSHING_WEIGHT: f64 = 0.40;
const HEART_RATE_WEIGHT: f64 = 0.30;
const BASELINE_WEIGHT: f64 = 0.20;
const RESPIRATORY_WEIGHT: f64 = 0.10;

const HEART_RATE_SPAN_BPM: f64 = 30.0;
const RESPIRATORY_SPAN: f64 = 8.0;

/// Scores closer than this to the threshold count as equal to it, so that
/// sums like 0.36 + 0.30 + 0.04 do not alert through rounding noise.
const THRESHOLD_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Unrounded score in [0, 1].
    pub risk_score: f64,
    pub alert: bool,
}

#[derive(Clone, Debug)]
pub struct RiskScorer {
    alert_threshold: f64,
}

impl RiskScorer {
    pub fn new(alert_threshold: f64) -> Self {
        Self { alert_threshold }
    }

    pub fn alert_threshold(&self) -> f64 {
        self.alert_threshold
    }

    pub fn score(&self, vitals: &PartialVitals, baseline: &Baseline) -> RiskAssessment {
        let flushing = vitals.flushing_score.unwrap_or(0.0).clamp(0.0, 1.0);

        let heart_rate = vitals
            .heart_rate_bpm
            .map(|hr| elevation(hr, baseline.baseline_hr, HEART_RATE_SPAN_BPM))
            .unwrap_or(0.0);

        let respiratory = vitals
            .respiratory_rate
            .map(|rr| elevation(rr, baseline.baseline_rr, RESPIRATORY_SPAN))
            .unwrap_or(0.0);

        let static_risk = baseline.baseline_risk.clamp(0.0, 1.0);

        let risk_score = (FLUSHING_WEIGHT * flushing
            + HEART_RATE_WEIGHT * heart_rate
            + BASELINE_WEIGHT * static_risk
            + RESPIRATORY_WEIGHT * respiratory)
            .clamp(0.0, 1.0);

        RiskAssessment {
            risk_score,
            alert: risk_score - self.alert_threshold > THRESHOLD_TOLERANCE,
        }
    }
}

/// Fraction in [0, 1] of `span` by which `value` exceeds `baseline`.
fn elevation(value: u16, baseline: u16, span: f64) -> f64 {
    ((value as f64 - baseline as f64).max(0.0) / span).min(1.0)
}

/// Two-decimal rounding applied on the wire only.
pub fn round_for_transport(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}
