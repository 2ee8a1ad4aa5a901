//! # Pitch Estimation Module
//!
//! A closed set of interchangeable fundamental-frequency estimators.
//! Each estimator is constructed for a fixed sample rate and window
//! length and is rebuilt whenever the session re-provisions; none of
//! them support dynamic reconfiguration.
//!
//! The surrounding pipeline only sees `estimate(window) -> Option<f32>`
//! plus the [`accept`] band filter; the algorithm choice trades latency
//! against robustness without changing that contract.

mod acf2plus;
mod mcleod;
mod wavelet;
mod yin;

pub use acf2plus::Acf2PlusEstimator;
pub use mcleod::McleodEstimator;
pub use wavelet::WaveletEstimator;
pub use yin::YinEstimator;

use anyhow::{bail, Result};
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

/// Estimates outside this band are treated as "no pitch". The band is
/// tuned for guitar and bass registers.
pub const MIN_FREQ_HZ: f64 = 30.0;
pub const MAX_FREQ_HZ: f64 = 1000.0;

/// The selectable estimation algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Acf2Plus,
    Yin,
    DynamicWavelet,
    Macleod,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Acf2Plus,
        Algorithm::Yin,
        Algorithm::DynamicWavelet,
        Algorithm::Macleod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Acf2Plus => "ACF2PLUS",
            Algorithm::Yin => "YIN",
            Algorithm::DynamicWavelet => "DynamicWavelet",
            Algorithm::Macleod => "Macleod",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "acf2plus" | "acf2+" | "acf" => Ok(Algorithm::Acf2Plus),
            "yin" => Ok(Algorithm::Yin),
            "dynamicwavelet" | "wavelet" => Ok(Algorithm::DynamicWavelet),
            "macleod" | "mpm" => Ok(Algorithm::Macleod),
            other => Err(format!("unknown algorithm: {other}")),
        }
    }
}

/// A fundamental-frequency estimator over one analysis window.
pub trait PitchEstimator: Send {
    /// Returns the estimated fundamental in Hz, or None when the window
    /// holds no usable pitch. Band filtering happens in [`accept`].
    fn estimate(&mut self, window: &[f32]) -> Option<f32>;
}

/// Builds the estimator for an algorithm/sample-rate/window pairing.
/// Construction failure is fatal to starting the requested mode.
pub fn build_estimator(
    algorithm: Algorithm,
    sample_rate: u32,
    window_len: usize,
) -> Result<Box<dyn PitchEstimator>> {
    if sample_rate == 0 {
        bail!("estimator requires a nonzero sample rate");
    }
    if window_len < 16 {
        bail!("analysis window too short for {algorithm}: {window_len} samples");
    }
    Ok(match algorithm {
        Algorithm::Acf2Plus => Box::new(Acf2PlusEstimator::new(sample_rate, window_len)),
        Algorithm::Yin => Box::new(YinEstimator::new(sample_rate, window_len)),
        Algorithm::DynamicWavelet => Box::new(WaveletEstimator::new(sample_rate)),
        Algorithm::Macleod => Box::new(McleodEstimator::new(sample_rate, window_len)),
    })
}

/// Accepts only finite estimates inside the instrument band.
pub fn accept(raw: Option<f32>) -> Option<f64> {
    let freq = raw? as f64;
    (freq.is_finite() && (MIN_FREQ_HZ..=MAX_FREQ_HZ).contains(&freq)).then_some(freq)
}

/// Linear autocorrelation of `signal` for lags 0..signal.len(), via the
/// zero-padded power-spectrum round trip. Written into `out`.
pub(crate) fn autocorrelate(planner: &mut FftPlanner<f32>, signal: &[f32], out: &mut Vec<f32>) {
    let n = signal.len();
    let padded = (2 * n).next_power_of_two();
    let fft = planner.plan_fft_forward(padded);
    let ifft = planner.plan_fft_inverse(padded);

    let mut buffer: Vec<Complex<f32>> = signal
        .iter()
        .map(|&s| Complex { re: s, im: 0.0 })
        .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
        .take(padded)
        .collect();

    fft.process(&mut buffer);
    for c in buffer.iter_mut() {
        *c = Complex { re: c.norm_sqr(), im: 0.0 };
    }
    ifft.process(&mut buffer);

    // rustfft leaves the round trip unnormalized.
    let scale = 1.0 / padded as f32;
    out.clear();
    out.extend(buffer[..n].iter().map(|c| c.re * scale));
}
