//! # Fast Fourier Transform (FFT) Module
//!
//! FFT-backed autocorrelation for the pitch estimator. By the
//! Wiener-Khinchin theorem the autocorrelation is the inverse transform of
//! the power spectrum; zero-padding to at least `2n - 1` points keeps the
//! circular correlation from wrapping onto itself, so the result matches the
//! direct time-domain sum.

use rustfft::{FftPlanner, num_complex::Complex};

/// Smallest power of two that can hold the linear autocorrelation of a
/// buffer of length `buffer_size` without circular aliasing.
pub fn autocorr_fft_size(buffer_size: usize) -> usize {
    let min_length = (2 * buffer_size).saturating_sub(1).max(1);
    min_length.next_power_of_two()
}

/// Computes the unnormalized autocorrelation of `buffer` through the FFT.
///
/// Returns one value per lag, `buffer.len()` in total, matching
/// [`crate::pitch::autocorrelate`] up to floating-point rounding.
pub fn autocorrelate(buffer: &[f32]) -> Vec<f64> {
    let size = buffer.len();
    if size == 0 {
        return Vec::new();
    }

    let fft_size = autocorr_fft_size(size);
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_size);
    let inverse = planner.plan_fft_inverse(fft_size);

    let mut spectrum: Vec<Complex<f64>> = buffer
        .iter()
        .map(|&sample| Complex {
            re: sample as f64,
            im: 0.0,
        })
        .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
        .take(fft_size)
        .collect();

    forward.process(&mut spectrum);

    // Power spectral density: multiply each bin by its complex conjugate.
    for bin in spectrum.iter_mut() {
        *bin = Complex {
            re: bin.norm_sqr(),
            im: 0.0,
        };
    }

    inverse.process(&mut spectrum);

    // rustfft leaves the inverse unscaled.
    let scale = 1.0 / fft_size as f64;
    spectrum.iter().take(size).map(|c| c.re * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch;

    #[test]
    fn fft_size_avoids_wraparound() {
        assert_eq!(autocorr_fft_size(1), 1);
        assert_eq!(autocorr_fft_size(8), 16);
        assert_eq!(autocorr_fft_size(2048), 4096);
        assert_eq!(autocorr_fft_size(2000), 4096);
    }

    #[test]
    fn matches_time_domain_autocorrelation() {
        let window: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let reference = pitch::autocorrelate(&window);
        let fast = autocorrelate(&window);

        assert_eq!(reference.len(), fast.len());
        let epsilon = 1e-9;
        for (reference, fft_value) in reference.iter().zip(fast.iter()) {
            assert!((reference - fft_value).abs() <= epsilon);
        }
    }

    #[test]
    fn empty_buffer_has_no_lags() {
        assert!(autocorrelate(&[]).is_empty());
    }
}
