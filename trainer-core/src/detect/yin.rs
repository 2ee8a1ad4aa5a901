//! YIN estimator.
//!
//! Squared difference function over half the window, cumulative mean
//! normalization, then the first dip below an absolute threshold walked
//! to its local minimum and refined by parabolic interpolation. Windows
//! with no dip below the threshold are rejected as noise.

use super::PitchEstimator;

/// Absolute threshold for the first-dip search.
const DIP_THRESHOLD: f32 = 0.1;

pub struct YinEstimator {
    sample_rate: f32,
    buffer: Vec<f32>,
}

impl YinEstimator {
    pub fn new(sample_rate: u32, window_len: usize) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            buffer: Vec::with_capacity(window_len / 2),
        }
    }
}

impl PitchEstimator for YinEstimator {
    fn estimate(&mut self, window: &[f32]) -> Option<f32> {
        let half = window.len() / 2;
        if half < 2 {
            return None;
        }
        let d = &mut self.buffer;
        d.clear();
        d.resize(half, 0.0);

        // Squared difference function.
        for tau in 1..half {
            let mut diff = 0.0;
            for i in 0..half {
                let delta = window[i] - window[i + tau];
                diff += delta * delta;
            }
            d[tau] = diff;
        }

        // Cumulative mean normalized difference.
        d[0] = 1.0;
        let mut running_sum = 0.0;
        for tau in 1..half {
            running_sum += d[tau];
            if running_sum > 0.0 {
                d[tau] *= tau as f32 / running_sum;
            } else {
                d[tau] = 1.0;
            }
        }

        // First dip below the threshold, walked down to its minimum.
        let mut tau = 2;
        let period = loop {
            if tau >= half {
                return None;
            }
            if d[tau] < DIP_THRESHOLD {
                while tau + 1 < half && d[tau + 1] < d[tau] {
                    tau += 1;
                }
                break tau;
            }
            tau += 1;
        };

        // Parabolic interpolation for sub-sample accuracy.
        if period == 0 || period + 1 >= half {
            return None;
        }
        let (y1, y2, y3) = (d[period - 1], d[period], d[period + 1]);
        let denom = y1 - 2.0 * y2 + y3;
        let better = if denom != 0.0 {
            period as f32 + (y1 - y3) / (2.0 * denom)
        } else {
            period as f32
        };

        let frequency = self.sample_rate / better;
        frequency.is_finite().then_some(frequency)
    }
}
