//! McLeod pitch method (MPM).
//!
//! Computes the normalized square difference function from an FFT-based
//! autocorrelation, gathers the local maxima between positive zero
//! crossings, then picks the first key maximum within a clarity margin
//! of the highest one. Strongly resistant to octave errors.

use rustfft::FftPlanner;

use super::PitchEstimator;

/// A peak within this fraction of the highest peak wins.
const CUTOFF: f32 = 0.97;
/// Windows whose best peak stays below this clarity are noise.
const SMALL_CUTOFF: f32 = 0.5;

pub struct McleodEstimator {
    sample_rate: f32,
    planner: FftPlanner<f32>,
    acf: Vec<f32>,
    nsdf: Vec<f32>,
}

impl McleodEstimator {
    pub fn new(sample_rate: u32, window_len: usize) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            planner: FftPlanner::new(),
            acf: Vec::with_capacity(window_len),
            nsdf: Vec::with_capacity(window_len),
        }
    }
}

/// Parabolic vertex through three equally spaced points.
fn turning_point(x: f32, y1: f32, y2: f32, y3: f32) -> (f32, f32) {
    let denom = 2.0 * (2.0 * y2 - y1 - y3);
    if denom == 0.0 {
        return (x, y2);
    }
    let dx = (y3 - y1) / denom;
    (x + dx, y2 - 0.25 * (y1 - y3) * dx)
}

impl PitchEstimator for McleodEstimator {
    fn estimate(&mut self, window: &[f32]) -> Option<f32> {
        let n = window.len();
        if n < 4 {
            return None;
        }
        super::autocorrelate(&mut self.planner, window, &mut self.acf);

        // Normalized square difference: 2 r(tau) / m'(tau), with m'
        // maintained incrementally from the signal energies.
        let nsdf = &mut self.nsdf;
        nsdf.clear();
        nsdf.resize(n, 0.0);
        let mut m = 2.0 * self.acf[0];
        for tau in 0..n {
            if tau > 0 {
                m -= window[tau - 1] * window[tau - 1] + window[n - tau] * window[n - tau];
            }
            nsdf[tau] = if m > 0.0 { 2.0 * self.acf[tau] / m } else { 0.0 };
        }

        // Local maxima between positive-going zero crossings.
        let mut peaks: Vec<usize> = Vec::new();
        let mut pos = 1;
        while pos < n - 1 && nsdf[pos] > 0.0 {
            pos += 1;
        }
        while pos < n - 1 && nsdf[pos] <= 0.0 {
            pos += 1;
        }
        let mut cur_max = 0usize;
        while pos < n - 1 {
            if nsdf[pos] > nsdf[pos - 1] && nsdf[pos] >= nsdf[pos + 1] {
                if cur_max == 0 || nsdf[pos] > nsdf[cur_max] {
                    cur_max = pos;
                }
            }
            pos += 1;
            if pos < n - 1 && nsdf[pos] <= 0.0 {
                if cur_max > 0 {
                    peaks.push(cur_max);
                    cur_max = 0;
                }
                while pos < n - 1 && nsdf[pos] <= 0.0 {
                    pos += 1;
                }
            }
        }
        if cur_max > 0 {
            peaks.push(cur_max);
        }
        if peaks.is_empty() {
            return None;
        }

        // Refine every candidate, then take the first within the clarity
        // margin of the best.
        let refined: Vec<(f32, f32)> = peaks
            .iter()
            .map(|&tau| turning_point(tau as f32, nsdf[tau - 1], nsdf[tau], nsdf[tau + 1]))
            .collect();
        let highest = refined.iter().map(|&(_, v)| v).fold(f32::MIN, f32::max);
        if highest < SMALL_CUTOFF {
            return None;
        }
        let threshold = CUTOFF * highest;
        let (period, _) = refined.into_iter().find(|&(_, v)| v >= threshold)?;
        if period <= 0.0 {
            return None;
        }
        Some(self.sample_rate / period)
    }
}
