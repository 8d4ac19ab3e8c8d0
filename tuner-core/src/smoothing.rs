//! Optional median smoothing of successive frequency readings.
//!
//! The estimator itself is memoryless; the controller may run its output
//! through a [`MedianSmoother`] to calm the needle. A window of one (the
//! default) passes readings through untouched.

use std::collections::VecDeque;

/// Median of the last `window` detected frequencies.
#[derive(Debug, Clone)]
pub struct MedianSmoother {
    window: usize,
    history: VecDeque<f32>,
}

impl MedianSmoother {
    /// Creates a smoother over `window` readings. Zero is treated as one.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            history: VecDeque::with_capacity(window),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn is_enabled(&self) -> bool {
        self.window > 1
    }

    /// Records a reading and returns the median of the current history.
    pub fn push(&mut self, frequency: f32) -> f32 {
        if !self.is_enabled() {
            return frequency;
        }

        self.history.push_back(frequency);
        if self.history.len() > self.window {
            self.history.pop_front();
        }

        let mut sorted: Vec<f32> = self.history.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    /// Forgets all history, e.g. after a silent frame.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_of_one_is_passthrough() {
        let mut smoother = MedianSmoother::new(1);
        assert!(!smoother.is_enabled());
        assert_eq!(smoother.push(110.0), 110.0);
        assert_eq!(smoother.push(220.0), 220.0);
        assert!(smoother.is_empty());

        assert_eq!(MedianSmoother::new(0).window(), 1);
    }

    #[test]
    fn rejects_single_octave_jump() {
        let mut smoother = MedianSmoother::new(5);
        for freq in [110.0, 110.2, 109.9, 110.1] {
            smoother.push(freq);
        }
        // An octave error in one frame barely moves the median.
        let smoothed = smoother.push(220.0);
        assert!((smoothed - 110.1).abs() < 1e-4, "got {smoothed}");
        assert_eq!(smoother.len(), 5);
    }

    #[test]
    fn even_history_averages_middle_pair() {
        let mut smoother = MedianSmoother::new(4);
        smoother.push(100.0);
        assert_eq!(smoother.push(110.0), 105.0);
    }

    #[test]
    fn history_is_bounded_and_clearable() {
        let mut smoother = MedianSmoother::new(3);
        for freq in [1.0, 2.0, 3.0, 4.0, 5.0] {
            smoother.push(freq);
        }
        assert_eq!(smoother.len(), 3);
        assert_eq!(smoother.push(6.0), 5.0);

        smoother.clear();
        assert!(smoother.is_empty());
        assert_eq!(smoother.push(42.0), 42.0);
    }
}
