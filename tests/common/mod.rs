//! Frame builders shared by the integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use image::{ImageOutputFormat, Rgb, RgbImage};
use vitalcast::config::{HubConfig, LandmarkConfig};
use vitalcast::hub::BroadcastHub;
use vitalcast::session::SessionContext;
use vitalcast::vision::StaticLandmarkDetector;
use vitalcast::InboundFrame;

pub const FRAME_SIZE: u32 = 128;

/// Rows above this line belong to the forehead, rows below to the cheeks,
/// for the default landmark layout.
pub const FOREHEAD_SPLIT: u32 = 50;

pub fn png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

pub fn uniform(color: [u8; 3]) -> Vec<u8> {
    png(&RgbImage::from_pixel(FRAME_SIZE, FRAME_SIZE, Rgb(color)))
}

/// A face with separately coloured forehead and cheeks.
pub fn face(forehead: [u8; 3], cheeks: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_fn(FRAME_SIZE, FRAME_SIZE, |_, y| {
        if y < FOREHEAD_SPLIT {
            Rgb(forehead)
        } else {
            Rgb(cheeks)
        }
    });
    png(&image)
}

/// Forehead green channel following a sinusoid of `cpm` cycles per minute.
pub fn pulse_green(index: usize, cpm: f64, frame_rate: f64) -> u8 {
    let phase = 2.0 * std::f64::consts::PI * cpm / 60.0 * index as f64 / frame_rate;
    (120.0 + 20.0 * phase.sin()).round() as u8
}

pub fn frame(source_id: &str, sequence: u64, payload: Vec<u8>) -> InboundFrame {
    InboundFrame {
        source_id: source_id.to_string(),
        sequence,
        payload,
    }
}

/// Outboxes are sized so that a session publishing a whole burst before a
/// writer task gets scheduled never overflows them.
pub fn context() -> SessionContext {
    let hub = BroadcastHub::new(HubConfig {
        outbox_capacity: 1024,
        ..HubConfig::default()
    })
    .unwrap();
    let keypoints = LandmarkConfig::default().keypoints().unwrap();
    SessionContext::new(hub, Arc::new(StaticLandmarkDetector::new(keypoints)))
}
