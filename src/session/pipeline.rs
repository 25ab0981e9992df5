//! The per-frame pipeline: decode, detect, sample, estimate, score.
//!
//! Synchronous and free of I/O. A `FramePipeline` belongs to one session;
//! all rolling state is passed in through `SourceState`.

use std::sync::Arc;

use image::RgbImage;

use crate::config::{ConfigError, PipelineConfig};
use crate::signal::{PartialVitals, RiskScorer, VitalsEstimator};
use crate::types::{KeypointSet, VitalsResult};
use crate::vision::{
    decode_frame, encode_jpeg, overlay::draw_overlay, LandmarkDetector, RegionSampler,
    SampleOutcome, VisionError,
};

use super::state::SourceState;

pub struct FramePipeline {
    config: PipelineConfig,
    detector: Arc<dyn LandmarkDetector>,
    sampler: RegionSampler,
    estimator: VitalsEstimator,
    scorer: RiskScorer,
}

impl FramePipeline {
    pub fn new(
        config: PipelineConfig,
        detector: Arc<dyn LandmarkDetector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            sampler: RegionSampler::new(config.roi_half_size),
            estimator: VitalsEstimator::new(&config),
            scorer: RiskScorer::new(config.alert_threshold),
            detector,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one encoded frame through every stage.
    ///
    /// Decode failures are returned untouched and leave `state` unchanged;
    /// the caller decides how many it tolerates.
    pub fn process(
        &mut self,
        state: &mut SourceState,
        sequence: u64,
        payload: &[u8],
    ) -> Result<VitalsResult, VisionError> {
        let frame = decode_frame(payload)?;
        let keypoints = self.detector.detect(&frame);

        let vitals = match self.sampler.sample(&frame, keypoints.as_ref()) {
            SampleOutcome::NoFace => {
                log::debug!("No face in frame {} of {}", sequence, state.source_id);
                state.signal.snapshot()
            }
            SampleOutcome::Regions(samples) => self.estimator.update(&mut state.signal, &samples),
        };
        state.frames_processed += 1;

        Ok(self.finish(state, sequence, vitals, &frame, keypoints.as_ref()))
    }

    fn finish(
        &self,
        state: &SourceState,
        sequence: u64,
        vitals: PartialVitals,
        frame: &RgbImage,
        keypoints: Option<&KeypointSet>,
    ) -> VitalsResult {
        let assessment = self.scorer.score(&vitals, &state.baseline);

        let annotated_frame = match keypoints {
            Some(keypoints) if self.config.annotate_frames => {
                let canvas = draw_overlay(frame, keypoints, &self.sampler, assessment.alert);
                match encode_jpeg(&canvas, self.config.annotation_jpeg_quality) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        log::warn!("Annotation of frame {} failed: {}", sequence, e);
                        None
                    }
                }
            }
            _ => None,
        };

        VitalsResult {
            source_id: state.source_id.clone(),
            sequence,
            flushing_score: vitals.flushing_score,
            heart_rate_bpm: vitals.heart_rate_bpm,
            respiratory_rate: vitals.respiratory_rate,
            risk_score: assessment.risk_score,
            alert: assessment.alert,
            degraded: vitals.degraded,
            annotated_frame,
        }
    }
}
