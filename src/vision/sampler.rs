//! Region sampler
//!
//! Reduces small square windows around the cheek and forehead keypoints to
//! their mean colour. Pure: the output depends only on the frame and the
//! keypoints.

use image::RgbImage;

use crate::types::{KeypointSet, RegionName, RegionSample, RegionSamples};

/// Result of sampling one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleOutcome {
    /// The detector found no face; nothing was sampled.
    NoFace,
    /// Samples for every region whose window overlapped the frame.
    Regions(RegionSamples),
}

/// A half-open pixel rectangle `[x0, x1) x [y0, y1)` inside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelWindow {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelWindow {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

#[derive(Clone, Debug)]
pub struct RegionSampler {
    half_size: u32,
}

impl RegionSampler {
    pub fn new(half_size: u32) -> Self {
        Self { half_size }
    }

    /// Sample every region of the face described by `keypoints`.
    pub fn sample(&self, frame: &RgbImage, keypoints: Option<&KeypointSet>) -> SampleOutcome {
        let keypoints = match keypoints {
            Some(k) => k,
            None => return SampleOutcome::NoFace,
        };

        let mut samples = RegionSamples::new();
        for region in RegionName::ALL {
            if let Some(window) = self.window_for(frame, keypoints, region) {
                samples.insert(region, mean_rgb(frame, &window));
            }
        }
        SampleOutcome::Regions(samples)
    }

    /// The clipped window for `region`, or `None` when nothing of it lies
    /// inside the frame.
    pub fn window_for(
        &self,
        frame: &RgbImage,
        keypoints: &KeypointSet,
        region: RegionName,
    ) -> Option<PixelWindow> {
        let (width, height) = frame.dimensions();
        let (cx, cy) = keypoints.get(region.anchor()).to_pixel(width, height);
        let h = self.half_size as i64;

        let clip = |v: i64, max: u32| v.clamp(0, max as i64) as u32;
        let window = PixelWindow {
            x0: clip(cx - h, width),
            y0: clip(cy - h, height),
            x1: clip(cx + h, width),
            y1: clip(cy + h, height),
        };

        if window.x1 <= window.x0 || window.y1 <= window.y0 {
            None
        } else {
            Some(window)
        }
    }
}

fn mean_rgb(frame: &RgbImage, window: &PixelWindow) -> RegionSample {
    let mut sums = [0u64; 3];
    for y in window.y0..window.y1 {
        for x in window.x0..window.x1 {
            let pixel = frame.get_pixel(x, y);
            for (sum, channel) in sums.iter_mut().zip(pixel.0.iter()) {
                *sum += *channel as u64;
            }
        }
    }
    let n = window.area() as f64;
    RegionSample::new(sums[0] as f64 / n, sums[1] as f64 / n, sums[2] as f64 / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KeypointName, Point2};
    use image::Rgb;

    fn keypoints_with(forehead: Point2, left: Point2, right: Point2) -> KeypointSet {
        let pairs: Vec<_> = KeypointName::ALL
            .iter()
            .map(|name| {
                let point = match name {
                    KeypointName::Forehead => forehead,
                    KeypointName::LeftCheek => left,
                    KeypointName::RightCheek => right,
                    _ => Point2::new(0.5, 0.5),
                };
                (*name, point)
            })
            .collect();
        KeypointSet::from_named(&pairs).unwrap()
    }

    #[test]
    fn test_no_face() {
        let sampler = RegionSampler::new(10);
        let frame = RgbImage::new(64, 64);
        assert_eq!(sampler.sample(&frame, None), SampleOutcome::NoFace);
    }

    #[test]
    fn test_window_means() {
        // Left half red, right half green.
        let frame = RgbImage::from_fn(100, 100, |x, _| {
            if x < 50 {
                Rgb([200, 0, 0])
            } else {
                Rgb([0, 200, 0])
            }
        });
        let keypoints = keypoints_with(
            Point2::new(0.5, 0.2),
            Point2::new(0.25, 0.6),
            Point2::new(0.75, 0.6),
        );
        let sampler = RegionSampler::new(4);

        let samples = match sampler.sample(&frame, Some(&keypoints)) {
            SampleOutcome::Regions(s) => s,
            other => panic!("unexpected outcome {:?}", other),
        };

        assert_eq!(samples[&RegionName::LeftCheek], RegionSample::new(200.0, 0.0, 0.0));
        assert_eq!(samples[&RegionName::RightCheek], RegionSample::new(0.0, 200.0, 0.0));
        // Forehead window straddles the boundary evenly.
        assert_eq!(samples[&RegionName::Forehead], RegionSample::new(100.0, 100.0, 0.0));
    }

    #[test]
    fn test_window_is_clipped_at_edges() {
        let frame = RgbImage::from_pixel(40, 40, Rgb([10, 20, 30]));
        let keypoints = keypoints_with(
            Point2::new(0.0, 0.0),
            Point2::new(0.5, 0.5),
            Point2::new(0.5, 0.5),
        );
        let sampler = RegionSampler::new(10);

        let window = sampler
            .window_for(&frame, &keypoints, RegionName::Forehead)
            .unwrap();
        assert_eq!(window, PixelWindow { x0: 0, y0: 0, x1: 10, y1: 10 });
        assert_eq!(window.area(), 100);
    }

    #[test]
    fn test_region_outside_frame_is_omitted() {
        let frame = RgbImage::from_pixel(40, 40, Rgb([10, 20, 30]));
        let keypoints = keypoints_with(
            Point2::new(2.0, 2.0),
            Point2::new(0.5, 0.5),
            Point2::new(-1.0, 0.5),
        );
        let sampler = RegionSampler::new(5);

        match sampler.sample(&frame, Some(&keypoints)) {
            SampleOutcome::Regions(samples) => {
                assert_eq!(samples.len(), 1);
                assert_eq!(samples[&RegionName::LeftCheek], RegionSample::new(10.0, 20.0, 30.0));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
