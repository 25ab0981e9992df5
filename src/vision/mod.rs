//! Frame-level vision stages: decoding, landmark detection, region sampling
//! and the optional overlay drawn on annotated frames.

pub mod decoder;
pub mod landmarks;
pub mod overlay;
pub mod sampler;

use thiserror::Error;

pub use decoder::{decode_frame, encode_jpeg};
pub use landmarks::{LandmarkDetector, StaticLandmarkDetector};
pub use sampler::{PixelWindow, RegionSampler, SampleOutcome};

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Frame payload could not be decoded: {0}")]
    Decode(String),

    #[error("Frame could not be encoded: {0}")]
    Encode(String),
}
