//! # Pitch Detection Module
//!
//! Estimates the fundamental frequency of a short frame of audio using
//! time-domain autocorrelation. Tuned for plucked guitar strings, where the
//! attack transient and trailing silence of a frame would otherwise smear the
//! correlation peak.
//!
//! ## Pipeline
//! 1. RMS voicing gate
//! 2. Trim the frame to the region between the first and last quiet samples
//! 3. Unnormalized autocorrelation
//! 4. Skip the decay away from the zero-lag peak
//! 5. Pick the strongest remaining peak
//! 6. Parabolic interpolation for a fractional lag
//!
//! Every step is bounds checked; anything degenerate comes back as
//! [`PitchReading::NoSignal`] rather than a panic.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::fft;

/// Frames quieter than this RMS level are treated as silence.
///
/// Empirical. Raise it in noisy rooms, lower it for quiet instruments.
pub const DEFAULT_RMS_THRESHOLD: f32 = 0.01;

/// Samples below this magnitude mark the edges of the voiced region.
pub const DEFAULT_TRIM_THRESHOLD: f32 = 0.2;

/// The estimator's verdict for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PitchReading {
    /// Too quiet, unvoiced, or otherwise impossible to read.
    NoSignal,
    /// A fundamental frequency in Hz, always finite and positive.
    Detected(f32),
}

impl PitchReading {
    /// The detected frequency, if any.
    pub fn frequency(&self) -> Option<f32> {
        match self {
            PitchReading::Detected(freq) => Some(*freq),
            PitchReading::NoSignal => None,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, PitchReading::Detected(_))
    }
}

/// How the autocorrelation sequence is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    /// Direct O(n^2) summation in the time domain.
    #[default]
    Direct,
    /// Zero-padded FFT, O(n log n). Same sequence up to rounding.
    Fft,
}

/// Stateless autocorrelation pitch estimator.
///
/// Holds only immutable thresholds, so a single instance can be shared
/// freely and calling [`estimate`](Self::estimate) twice on the same frame
/// always yields the same reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimator {
    rms_threshold: f32,
    trim_threshold: f32,
    correlation: CorrelationMethod,
}

impl Default for PitchEstimator {
    fn default() -> Self {
        Self {
            rms_threshold: DEFAULT_RMS_THRESHOLD,
            trim_threshold: DEFAULT_TRIM_THRESHOLD,
            correlation: CorrelationMethod::Direct,
        }
    }
}

impl PitchEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rms_threshold(mut self, threshold: f32) -> Self {
        self.rms_threshold = threshold;
        self
    }

    pub fn with_trim_threshold(mut self, threshold: f32) -> Self {
        self.trim_threshold = threshold;
        self
    }

    pub fn with_correlation(mut self, method: CorrelationMethod) -> Self {
        self.correlation = method;
        self
    }

    pub fn rms_threshold(&self) -> f32 {
        self.rms_threshold
    }

    pub fn trim_threshold(&self) -> f32 {
        self.trim_threshold
    }

    pub fn correlation(&self) -> CorrelationMethod {
        self.correlation
    }

    /// Estimates the fundamental frequency of `frame`.
    ///
    /// # Arguments
    /// * `frame` - Time-domain samples in [-1.0, 1.0]
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * `Detected(freq)` - Estimated fundamental in Hz
    /// * `NoSignal` - Silence, noise floor, or a degenerate buffer
    pub fn estimate(&self, frame: &[f32], sample_rate: u32) -> PitchReading {
        if frame.is_empty() || sample_rate == 0 {
            return PitchReading::NoSignal;
        }

        // --- Voicing gate ---
        let level = rms(frame);
        if level.is_nan() || level < self.rms_threshold {
            return PitchReading::NoSignal;
        }

        let voiced = trim_voiced_region(frame, self.trim_threshold);
        let correlation = match self.correlation {
            CorrelationMethod::Direct => autocorrelate(voiced),
            CorrelationMethod::Fft => fft::autocorrelate(voiced),
        };

        let Some(lag) = find_period(&correlation) else {
            trace!(
                "[PITCH] Degenerate buffer: {} of {} samples voiced, no usable peak",
                voiced.len(),
                frame.len()
            );
            return PitchReading::NoSignal;
        };

        let frequency = sample_rate as f64 / lag;
        if frequency.is_finite() && frequency > 0.0 {
            PitchReading::Detected(frequency as f32)
        } else {
            trace!("[PITCH] Rejected non-physical lag {lag}");
            PitchReading::NoSignal
        }
    }
}

/// Estimates a frame's pitch with the default thresholds.
pub fn estimate(frame: &[f32], sample_rate: u32) -> PitchReading {
    PitchEstimator::default().estimate(frame, sample_rate)
}

/// Root-mean-square level of a signal. Zero for an empty slice.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    let energy: f64 = signal.iter().map(|&s| s as f64 * s as f64).sum();
    (energy / signal.len() as f64).sqrt() as f32
}

/// Cuts a frame down to the span between its first and last quiet samples.
///
/// The start is the first sample in the first half whose magnitude is below
/// `threshold`; the end is the last such sample in the second half, and is
/// excluded. Without a quiet sample the bounds stay at `0` and `len - 1`.
pub fn trim_voiced_region(signal: &[f32], threshold: f32) -> &[f32] {
    let size = signal.len();
    let half = size / 2;

    let start = signal[..half]
        .iter()
        .position(|s| s.abs() < threshold)
        .unwrap_or(0);
    let end = (1..half)
        .map(|offset| size - offset)
        .find(|&i| signal[i].abs() < threshold)
        .unwrap_or(size.saturating_sub(1));

    if start >= end {
        return &signal[..0];
    }
    &signal[start..end]
}

/// Unnormalized autocorrelation `c[i] = sum_j x[j] * x[j + i]` for every lag.
pub fn autocorrelate(buffer: &[f32]) -> Vec<f64> {
    let size = buffer.len();
    (0..size)
        .map(|lag| {
            buffer[..size - lag]
                .iter()
                .zip(&buffer[lag..])
                .map(|(&a, &b)| a as f64 * b as f64)
                .sum()
        })
        .collect()
}

/// Finds the period, in fractional samples, from an autocorrelation sequence.
///
/// Walks past the zero-lag peak to the first local minimum, takes the
/// largest value from there on (the first one on ties) and refines its
/// position with a parabola through the peak and its two neighbours.
pub fn find_period(correlation: &[f64]) -> Option<f64> {
    let size = correlation.len();
    if size < 3 {
        return None;
    }

    // --- Skip the decay away from lag 0 ---
    let mut dip = 0;
    while dip + 1 < size && correlation[dip] > correlation[dip + 1] {
        dip += 1;
    }

    // --- Strongest peak after the dip ---
    let mut peak = dip;
    let mut peak_value = correlation[dip];
    for (lag, &value) in correlation.iter().enumerate().skip(dip + 1) {
        if value > peak_value {
            peak_value = value;
            peak = lag;
        }
    }

    // The parabola needs a neighbour on each side, and lag 0 has no period.
    if peak == 0 || peak + 1 >= size {
        return None;
    }

    Some(parabolic_peak(
        peak,
        correlation[peak - 1],
        correlation[peak],
        correlation[peak + 1],
    ))
}

/// Fits a parabola through three equally spaced points and returns the
/// abscissa of its vertex.
///
/// Falls back to `center` when the points are collinear or the vertex
/// would land more than one sample away.
fn parabolic_peak(center: usize, x1: f64, x2: f64, x3: f64) -> f64 {
    let a = (x1 + x3 - 2.0 * x2) / 2.0;
    let b = (x3 - x1) / 2.0;
    if a == 0.0 {
        return center as f64;
    }

    let shift = -b / (2.0 * a);
    if shift.is_finite() && shift.abs() <= 1.0 {
        center as f64 + shift
    } else {
        center as f64
    }
}
