//! Landmark overlay for annotated frames. Purely cosmetic.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use super::sampler::RegionSampler;
use crate::types::{KeypointSet, RegionName};

const KEYPOINT_COLOR: Rgb<u8> = Rgb([0, 255, 255]);
const REGION_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const ALERT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Draw keypoints and sampling windows onto a copy of `frame`. Windows are
/// drawn red while the source is alerting.
pub fn draw_overlay(
    frame: &RgbImage,
    keypoints: &KeypointSet,
    sampler: &RegionSampler,
    alert: bool,
) -> RgbImage {
    let mut canvas = frame.clone();
    let (width, height) = canvas.dimensions();

    let region_color = if alert { ALERT_COLOR } else { REGION_COLOR };
    for region in RegionName::ALL {
        if let Some(window) = sampler.window_for(frame, keypoints, region) {
            let rect = Rect::at(window.x0 as i32, window.y0 as i32)
                .of_size(window.width(), window.height());
            draw_hollow_rect_mut(&mut canvas, rect, region_color);
        }
    }

    for (_, point) in keypoints.iter() {
        let (x, y) = point.to_pixel(width, height);
        draw_filled_circle_mut(&mut canvas, (x as i32, y as i32), 2, KEYPOINT_COLOR);
    }

    canvas
}
