//! Signal processing: rolling windows, spectral estimation, the vitals
//! estimator and the risk scorer.

pub mod estimator;
pub mod risk;
pub mod spectral;
pub mod window;

pub use estimator::{flushing_score, PartialVitals, SignalState, VitalsEstimator};
pub use risk::{round_for_transport, RiskAssessment, RiskScorer};
pub use spectral::SpectralEstimator;
pub use window::RollingWindow;
