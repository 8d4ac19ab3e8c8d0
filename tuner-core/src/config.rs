//! # Tuner Configuration
//!
//! Every tunable of the capture and analysis pipeline, persisted as JSON.
//! Missing fields fall back to their defaults so older files keep loading.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audio::{BUFFER_SIZE, DEFAULT_CHANNEL_CAPACITY, DEFAULT_SAMPLE_RATE};
use crate::pitch::{CorrelationMethod, DEFAULT_RMS_THRESHOLD, DEFAULT_TRIM_THRESHOLD, PitchEstimator};
use crate::tuning::DEFAULT_IN_TUNE_CENTS;

/// File name the GUI looks for in its working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tuner_config.json";

/// Smallest frame the estimator can do anything useful with.
const MIN_FRAME_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Samples per analysis frame.
    pub frame_size: usize,
    /// Sample rate requested from the input device, in Hz.
    pub preferred_sample_rate: u32,
    /// RMS level below which a frame is treated as silence.
    pub rms_threshold: f32,
    /// Sample magnitude that marks the edges of the voiced region.
    pub trim_threshold: f32,
    /// Autocorrelation back end.
    pub correlation: CorrelationMethod,
    /// Readings closer than this to a note are shown as in tune.
    pub in_tune_cents: i32,
    /// Median window over successive readings; 1 disables smoothing.
    pub smoothing_window: usize,
    /// Frames buffered between the audio callback and the analysis tick.
    pub channel_capacity: usize,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            frame_size: BUFFER_SIZE,
            preferred_sample_rate: DEFAULT_SAMPLE_RATE,
            rms_threshold: DEFAULT_RMS_THRESHOLD,
            trim_threshold: DEFAULT_TRIM_THRESHOLD,
            correlation: CorrelationMethod::default(),
            in_tune_cents: DEFAULT_IN_TUNE_CENTS,
            smoothing_window: 1,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl TunerConfig {
    /// Reads a config file, failing on I/O or parse errors.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading tuner config {}", path.display()))?;
        let config: TunerConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing tuner config {}", path.display()))?;
        Ok(config.sanitized())
    }

    /// Reads a config file, using defaults when it is missing or broken.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("[CONFIG] No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                info!("[CONFIG] Loaded {}", path.display());
                config
            }
            Err(e) => {
                warn!("[CONFIG] {e:#}; using defaults");
                Self::default()
            }
        }
    }

    /// Writes the config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("serializing tuner config")?;
        fs::write(path, json).with_context(|| format!("writing tuner config {}", path.display()))?;
        Ok(())
    }

    /// Replaces values the pipeline cannot work with by their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.frame_size < MIN_FRAME_SIZE {
            warn!("[CONFIG] frame_size {} too small, using {}", self.frame_size, defaults.frame_size);
            self.frame_size = defaults.frame_size;
        }
        if self.preferred_sample_rate == 0 {
            self.preferred_sample_rate = defaults.preferred_sample_rate;
        }
        if !(self.rms_threshold.is_finite() && self.rms_threshold >= 0.0) {
            self.rms_threshold = defaults.rms_threshold;
        }
        if !(self.trim_threshold.is_finite() && self.trim_threshold > 0.0) {
            self.trim_threshold = defaults.trim_threshold;
        }
        if self.in_tune_cents <= 0 {
            self.in_tune_cents = defaults.in_tune_cents;
        }
        self.smoothing_window = self.smoothing_window.max(1);
        self.channel_capacity = self.channel_capacity.max(1);
        self
    }

    /// An estimator carrying this config's thresholds.
    pub fn estimator(&self) -> PitchEstimator {
        PitchEstimator::new()
            .with_rms_threshold(self.rms_threshold)
            .with_trim_threshold(self.trim_threshold)
            .with_correlation(self.correlation)
    }
}
