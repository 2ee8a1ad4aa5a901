//! Dynamic-wavelet estimator (Larson and Maddox).
//!
//! Works entirely in the time domain: pick prominent extrema, histogram
//! the distances between nearby extrema of the same kind, then halve the
//! signal and repeat. Two adjacent levels agreeing on the (doubled) mode
//! distance ends the search. Fast and low-latency, but coarser than the
//! correlation-based estimators since the period resolves to whole
//! samples of the winning level.

use super::PitchEstimator;

/// Number of halving levels tried before giving up.
const MAX_LEVELS: u32 = 6;
/// Highest fundamental considered when spacing extrema.
const MAX_FREQ_HZ: f32 = 3000.0;
/// How many forward neighbors feed the distance histogram.
const DIFFERENCE_LEVELS: usize = 3;
/// Extrema must reach this fraction of the window's peak amplitude.
const AMPLITUDE_RATIO: f32 = 0.75;

pub struct WaveletEstimator {
    sample_rate: f32,
}

impl WaveletEstimator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
        }
    }
}

impl PitchEstimator for WaveletEstimator {
    fn estimate(&mut self, window: &[f32]) -> Option<f32> {
        let length = window.len();
        if length < 4 {
            return None;
        }
        let mut audio = window.to_vec();
        let mut cur_len = length;
        let mut distances = vec![0u32; length];
        let mut mins: Vec<usize> = Vec::new();
        let mut maxs: Vec<usize> = Vec::new();

        // Global amplitude statistics set the extremum acceptance bar.
        let dc = audio.iter().sum::<f32>() / length as f32;
        let max_value = audio.iter().cloned().fold(f32::MIN, f32::max) - dc;
        let min_value = audio.iter().cloned().fold(f32::MAX, f32::min) - dc;
        let amplitude_threshold = max_value.max(-min_value) * AMPLITUDE_RATIO;
        if amplitude_threshold <= 0.0 {
            return None;
        }

        let mut mode_distance = -1.0f32;

        for level in 0..MAX_LEVELS {
            let delta = (self.sample_rate / (2u32.pow(level) as f32 * MAX_FREQ_HZ)) as isize;
            if cur_len < 2 {
                return None;
            }

            // Collect spaced extrema that clear the amplitude bar.
            mins.clear();
            maxs.clear();
            let mut find_max = false;
            let mut find_min = false;
            let mut prev_dv = f32::NAN;
            let mut last_min = isize::MIN / 2;
            let mut last_max = isize::MIN / 2;
            for i in 2..cur_len {
                let si = audio[i] - dc;
                let si1 = audio[i - 1] - dc;
                if si1 <= 0.0 && si > 0.0 {
                    find_max = true;
                }
                if si1 >= 0.0 && si < 0.0 {
                    find_min = true;
                }
                let dv = si - si1;
                if !prev_dv.is_nan() {
                    let at = i as isize - 1;
                    if find_min
                        && prev_dv < 0.0
                        && dv >= 0.0
                        && si1.abs() >= amplitude_threshold
                        && at > last_min + delta
                    {
                        mins.push(i - 1);
                        last_min = at;
                        find_min = false;
                    }
                    if find_max
                        && prev_dv > 0.0
                        && dv <= 0.0
                        && si1.abs() >= amplitude_threshold
                        && at > last_max + delta
                    {
                        maxs.push(i - 1);
                        last_max = at;
                        find_max = false;
                    }
                }
                prev_dv = dv;
            }
            if mins.is_empty() && maxs.is_empty() {
                return None;
            }

            // Histogram of distances between nearby extrema of a kind.
            distances[..cur_len].fill(0);
            for set in [&maxs, &mins] {
                for i in 0..set.len() {
                    for j in 1..DIFFERENCE_LEVELS {
                        if i + j < set.len() {
                            let d = set[i + j] - set[i];
                            if d < cur_len {
                                distances[d] += 1;
                            }
                        }
                    }
                }
            }

            // Best-supported distance, smoothed over +-delta bins. Ties
            // prefer the harmonic double of the current best.
            let mut best_distance: isize = -1;
            let mut best_value: i64 = -1;
            for i in 0..cur_len {
                let mut summed: i64 = 0;
                for j in -delta..=delta {
                    let k = i as isize + j;
                    if k >= 0 && (k as usize) < cur_len {
                        summed += i64::from(distances[k as usize]);
                    }
                }
                if summed == best_value {
                    if i as isize == 2 * best_distance {
                        best_distance = i as isize;
                    }
                } else if summed > best_value {
                    best_value = summed;
                    best_distance = i as isize;
                }
            }
            if best_distance <= 0 {
                return None;
            }

            // Weighted average over the winning neighborhood.
            let mut dist_avg = 0.0f32;
            let mut total = 0.0f32;
            for j in -delta..=delta {
                let k = best_distance + j;
                if k >= 0 && (k as usize) < cur_len {
                    let count = distances[k as usize] as f32;
                    if count > 0.0 {
                        total += count;
                        dist_avg += k as f32 * count;
                    }
                }
            }
            if total == 0.0 {
                return None;
            }
            dist_avg /= total;

            // Two adjacent levels agreeing within the spacing tolerance
            // pins the fundamental at the previous level's resolution.
            if mode_distance > -1.0 && (dist_avg * 2.0 - mode_distance).abs() <= 2.0 * delta as f32 {
                return Some(self.sample_rate / (2u32.pow(level - 1) as f32 * mode_distance));
            }
            mode_distance = dist_avg;

            // Haar-style halving for the next level.
            cur_len /= 2;
            for i in 0..cur_len {
                audio[i] = (audio[2 * i] + audio[2 * i + 1]) / 2.0;
            }
        }
        None
    }
}
