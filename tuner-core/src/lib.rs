// tuner-core/src/lib.rs

//! The core logic for the choir's guitar tuner.
//! This crate is responsible for audio capture, pitch estimation,
//! and mapping frequencies onto equal-tempered notes. It is completely
//! headless and contains no GUI code.

pub mod audio;
pub mod config;
pub mod fft;
pub mod pitch;
pub mod smoothing;
pub mod tuner;
pub mod tuning;

pub use audio::{CaptureBackend, CaptureError, CpalBackend, FrameSource};
pub use config::TunerConfig;
pub use pitch::{PitchEstimator, PitchReading};
pub use tuner::Tuner;
pub use tuning::{NoteReading, to_note};

/// What the display shows for a single analysed frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningReading {
    /// The detected fundamental in Hz.
    pub frequency_hz: f32,
    /// Pitch class of the nearest equal-tempered note.
    pub note_name: &'static str,
    /// Deviation from that note, negative is flat.
    pub cents: i32,
    /// Whether the reading falls inside the in-tune window.
    pub in_tune: bool,
}
