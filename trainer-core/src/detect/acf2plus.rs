//! Autocorrelation estimator (ACF2+).
//!
//! Trims low-amplitude edges off the window, autocorrelates what is
//! left, walks down the zero-lag slope to skip the initial valley, and
//! takes the highest remaining peak as the period, refined by parabolic
//! interpolation. Carries its own RMS floor on top of the session's
//! energy gate.

use rustfft::FftPlanner;

use super::PitchEstimator;

/// Samples quieter than this fraction of full scale bound the trim.
const TRIM_THRESHOLD: f32 = 0.2;
/// The estimator's own silence floor.
const RMS_FLOOR: f32 = 0.01;

pub struct Acf2PlusEstimator {
    sample_rate: f32,
    planner: FftPlanner<f32>,
    corr: Vec<f32>,
}

impl Acf2PlusEstimator {
    pub fn new(sample_rate: u32, window_len: usize) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            planner: FftPlanner::new(),
            corr: Vec::with_capacity(window_len),
        }
    }
}

impl PitchEstimator for Acf2PlusEstimator {
    fn estimate(&mut self, window: &[f32]) -> Option<f32> {
        let size = window.len();
        if size < 4 {
            return None;
        }
        let rms = (window.iter().map(|&s| s * s).sum::<f32>() / size as f32).sqrt();
        if rms < RMS_FLOOR {
            return None;
        }

        // Trim to the first quiet sample from each end.
        let mut r1 = 0;
        let mut r2 = size - 1;
        for i in 0..size / 2 {
            if window[i].abs() < TRIM_THRESHOLD {
                r1 = i;
                break;
            }
        }
        for i in 1..size / 2 {
            if window[size - i].abs() < TRIM_THRESHOLD {
                r2 = size - i;
                break;
            }
        }
        let trimmed = &window[r1..r2];
        if trimmed.len() < 4 {
            return None;
        }

        super::autocorrelate(&mut self.planner, trimmed, &mut self.corr);
        let c = &self.corr;

        // Walk down the slope away from lag zero, then take the highest
        // peak past the valley.
        let mut d = 0;
        while d + 1 < c.len() && c[d] > c[d + 1] {
            d += 1;
        }
        if d + 1 >= c.len() {
            return None;
        }
        let mut t0 = d;
        let mut max_val = f32::MIN;
        for (i, &v) in c.iter().enumerate().skip(d) {
            if v > max_val {
                max_val = v;
                t0 = i;
            }
        }
        if t0 == 0 || t0 + 1 >= c.len() {
            return None;
        }

        // Parabolic refinement around the winning lag.
        let (x1, x2, x3) = (c[t0 - 1], c[t0], c[t0 + 1]);
        let a = (x1 + x3 - 2.0 * x2) / 2.0;
        let b = (x3 - x1) / 2.0;
        let period = if a != 0.0 { t0 as f32 - b / (2.0 * a) } else { t0 as f32 };
        if period <= 0.0 {
            return None;
        }
        Some(self.sample_rate / period)
    }
}
