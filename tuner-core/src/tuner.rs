//! # Tuner Controller
//!
//! Owns one capture session at a time and turns its frames into display
//! readings. The host calls [`Tuner::tick`] once per display refresh; each
//! pending frame is estimated in arrival order and the latest reading wins.
//!
//! ## Lifecycle
//! - [`start`](Tuner::start) tears down any running session before opening a new one.
//!   A failed open is reported once and leaves the tuner off.
//! - [`stop`](Tuner::stop) halts ticking, disconnects the source, releases the stream
//!   and clears the display. Every step runs even if an earlier one fails.
//! - Dropping the tuner stops it.

use tracing::{error, info, trace, warn};

use crate::TuningReading;
use crate::audio::{CaptureBackend, CaptureError, FrameSource};
use crate::config::TunerConfig;
use crate::pitch::{PitchEstimator, PitchReading};
use crate::smoothing::MedianSmoother;
use crate::tuning;

pub struct Tuner<B: CaptureBackend> {
    backend: B,
    config: TunerConfig,
    estimator: PitchEstimator,
    smoother: MedianSmoother,
    source: Option<B::Source>,
    reading: Option<TuningReading>,
    last_error: Option<CaptureError>,
    frames_processed: u64,
}

impl<B: CaptureBackend> Tuner<B> {
    pub fn new(backend: B, config: TunerConfig) -> Self {
        let config = config.sanitized();
        Self {
            backend,
            estimator: config.estimator(),
            smoother: MedianSmoother::new(config.smoothing_window),
            config,
            source: None,
            reading: None,
            last_error: None,
            frames_processed: 0,
        }
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn is_listening(&self) -> bool {
        self.source.is_some()
    }

    /// The reading currently on display, `None` while nothing is detected.
    pub fn reading(&self) -> Option<TuningReading> {
        self.reading
    }

    /// Why the last start attempt failed, cleared by the next attempt.
    pub fn last_error(&self) -> Option<&CaptureError> {
        self.last_error.as_ref()
    }

    /// Sample rate of the open session.
    pub fn sample_rate(&self) -> Option<u32> {
        self.source.as_ref().map(|s| s.sample_rate())
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Opens a capture session, replacing any session already running.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.source.is_some() {
            info!("[TUNER] Restart requested, closing the current session first");
            if let Err(e) = self.stop() {
                warn!("[TUNER] Previous session did not close cleanly: {e}");
            }
        }

        self.last_error = None;
        match self.backend.open(&self.config) {
            Ok(source) => {
                info!("[TUNER] Listening at {} Hz", source.sample_rate());
                self.source = Some(source);
                Ok(())
            }
            Err(e) => {
                error!("[TUNER] Could not start listening: {e}");
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Stops listening and clears the display.
    ///
    /// Returns the first teardown failure, after all steps have run.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        let mut first_error = None;

        // Without a source, tick() has nothing to pull from.
        if let Some(mut source) = self.source.take() {
            if let Err(e) = source.disconnect() {
                warn!("[TUNER] Disconnecting source failed: {e}");
                first_error.get_or_insert(e);
            }
            if let Err(e) = source.release() {
                warn!("[TUNER] Releasing stream failed: {e}");
                first_error.get_or_insert(e);
            }
            info!("[TUNER] Stopped after {} frames", self.frames_processed);
        }

        self.reading = None;
        self.smoother.clear();

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Analyses every frame that arrived since the last tick.
    ///
    /// Returns the reading now on display. A tick with no new frames leaves
    /// the display as it was.
    pub fn tick(&mut self) -> Option<TuningReading> {
        let source = self.source.as_mut()?;
        let sample_rate = source.sample_rate();

        // Collect first to avoid borrowing conflicts with process_frame.
        let frames: Vec<Vec<f32>> = std::iter::from_fn(|| source.next_frame()).collect();
        for frame in &frames {
            self.process_frame(frame, sample_rate);
        }
        self.reading
    }

    /// Runs one frame through the estimator and updates the display.
    pub fn process_frame(&mut self, frame: &[f32], sample_rate: u32) -> Option<TuningReading> {
        self.frames_processed += 1;

        self.reading = match self.estimator.estimate(frame, sample_rate) {
            PitchReading::Detected(freq) => {
                let freq = self.smoother.push(freq);
                tuning::reading_for(freq, self.config.in_tune_cents)
            }
            PitchReading::NoSignal => {
                self.smoother.clear();
                None
            }
        };

        trace!("[TUNER] Frame {}: {:?}", self.frames_processed, self.reading);
        self.reading
    }
}

impl<B: CaptureBackend> Drop for Tuner<B> {
    fn drop(&mut self) {
        if self.source.is_some() {
            if let Err(e) = self.stop() {
                warn!("[TUNER] Teardown on drop failed: {e}");
            }
        }
    }
}
