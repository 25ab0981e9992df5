//! Band-limited spectral peak estimation
//!
//! Detrend, Hann window, zero-padded FFT, then the strongest bin inside a
//! band given in cycles per minute.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Magnitudes at or below this are treated as "no periodic content".
const MIN_PEAK_MAGNITUDE: f64 = 1e-9;

pub struct SpectralEstimator {
    fft: Arc<dyn Fft<f64>>,
    fft_size: usize,
    sample_rate: f64,
    buffer: Vec<Complex<f64>>,
}

impl SpectralEstimator {
    pub fn new(sample_rate: f64, fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(fft_size),
            fft_size,
            sample_rate,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    /// Frequency resolution of one FFT bin, in cycles per minute.
    pub fn bin_width_cpm(&self) -> f64 {
        self.sample_rate / self.fft_size as f64 * 60.0
    }

    /// Dominant frequency of `samples` within `band` (cycles per minute).
    ///
    /// Returns `None` for fewer than two samples, a band with no bins, or a
    /// series with no periodic content (e.g. constant after detrending).
    pub fn peak_cpm<I>(&mut self, samples: I, band: (f64, f64)) -> Option<f64>
    where
        I: ExactSizeIterator<Item = f64>,
    {
        let total = samples.len();
        let n = total.min(self.fft_size);
        if n < 2 {
            return None;
        }
        // Longer series keep their newest `fft_size` samples.
        let series: Vec<f64> = samples.skip(total - n).collect();
        let detrended = detrend(&series);

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            *slot = if i < n {
                Complex::new(detrended[i] * hann(i, n), 0.0)
            } else {
                Complex::new(0.0, 0.0)
            };
        }
        self.fft.process(&mut self.buffer);

        let bin_cpm = self.bin_width_cpm();
        let nyquist_bin = self.fft_size / 2;
        let lo = (band.0 / bin_cpm).ceil().max(1.0) as usize;
        let hi = ((band.1 / bin_cpm).floor() as usize).min(nyquist_bin);
        if lo > hi {
            return None;
        }

        let mut best_bin = lo;
        let mut best_magnitude = f64::NEG_INFINITY;
        for k in lo..=hi {
            let magnitude = self.buffer[k].norm();
            if magnitude > best_magnitude {
                best_magnitude = magnitude;
                best_bin = k;
            }
        }

        if best_magnitude <= MIN_PEAK_MAGNITUDE {
            return None;
        }
        Some(best_bin as f64 * bin_cpm)
    }
}

/// Remove the least-squares line from `series`.
pub fn detrend(series: &[f64]) -> Vec<f64> {
    let n = series.len() as f64;
    let mean_t = (n - 1.0) / 2.0;
    let mean_y = series.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var = 0.0;
    for (i, y) in series.iter().enumerate() {
        let dt = i as f64 - mean_t;
        cov += dt * (y - mean_y);
        var += dt * dt;
    }
    let slope = if var > 0.0 { cov / var } else { 0.0 };

    series
        .iter()
        .enumerate()
        .map(|(i, y)| y - mean_y - slope * (i as f64 - mean_t))
        .collect()
}

fn hann(i: usize, n: usize) -> f64 {
    0.5 - 0.5 * (2.0 * PI * i as f64 / (n - 1) as f64).cos()
}
