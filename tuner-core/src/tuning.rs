//! # Musical Tuning Module
//!
//! Maps detected frequencies onto twelve-tone equal temperament referenced to
//! A4 = 440 Hz, and holds the standard guitar tuning used by the display to
//! highlight the string being tuned.
//!
//! Cents are always measured against the nearest equal-tempered semitone.
//! The string table never takes part in that calculation.

use crate::TuningReading;

/// Concert pitch.
pub const A4_FREQUENCY: f32 = 440.0;

/// MIDI note number of A4.
pub const A4_NOTE_NUMBER: f32 = 69.0;

/// Pitch-class names indexed by `note_number mod 12`.
pub const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Readings within this many cents of a note count as in tune.
pub const DEFAULT_IN_TUNE_CENTS: i32 = 5;

/// How far a reading may stray from a string's target and still light it up.
pub const STRING_MATCH_TOLERANCE_HZ: f32 = 10.0;

/// Nearest note to a frequency and the offset from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteReading {
    /// Pitch class of the nearest note (`"C"` .. `"B"`).
    pub note_name: &'static str,
    /// Offset from that note, in `[-50, 50)`. Negative is flat.
    pub cents: i32,
    /// MIDI number of the nearest note (69 is A4).
    pub note_number: i32,
}

impl NoteReading {
    /// Octave in scientific pitch notation (A4 is in octave 4).
    pub fn octave(&self) -> i32 {
        self.note_number.div_euclid(12) - 1
    }
}

/// A guitar string in standard tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceString {
    /// Pitch class, as shown on the display.
    pub note_name: &'static str,
    /// Note with octave, e.g. `"E2"`.
    pub label: &'static str,
    /// Target frequency in Hz.
    pub frequency: f32,
}

/// Standard tuning, low E to high E.
pub static GUITAR_STRINGS: [ReferenceString; 6] = [
    ReferenceString { note_name: "E", label: "E2", frequency: 82.41 },
    ReferenceString { note_name: "A", label: "A2", frequency: 110.00 },
    ReferenceString { note_name: "D", label: "D3", frequency: 146.83 },
    ReferenceString { note_name: "G", label: "G3", frequency: 196.00 },
    ReferenceString { note_name: "B", label: "B3", frequency: 246.94 },
    ReferenceString { note_name: "E", label: "E4", frequency: 329.63 },
];

/// Fractional MIDI note number of a frequency.
pub fn midi_note_number(frequency_hz: f32) -> f32 {
    12.0 * (frequency_hz / A4_FREQUENCY).log2() + A4_NOTE_NUMBER
}

/// Finds the nearest equal-tempered note to a frequency.
///
/// `frequency_hz` must be positive. Ties between two notes round upward,
/// which keeps `cents` inside `[-50, 50)`.
pub fn to_note(frequency_hz: f32) -> NoteReading {
    let note_number = midi_note_number(frequency_hz);
    let rounded = (note_number + 0.5).floor();
    let cents = ((note_number - rounded) * 100.0).floor() as i32;
    let note_number = rounded as i32;

    NoteReading {
        // rem_euclid: frequencies below C-1 have negative note numbers.
        note_name: PITCH_CLASS_NAMES[note_number.rem_euclid(12) as usize],
        cents,
        note_number,
    }
}

/// Note name with octave, e.g. `"A4"` for 440 Hz.
pub fn note_label(frequency_hz: f32) -> String {
    let note = to_note(frequency_hz);
    format!("{}{}", note.note_name, note.octave())
}

/// Display policy: close enough to the nearest note to call it tuned.
pub fn is_in_tune(frequency_hz: f32, cents: i32, tolerance_cents: i32) -> bool {
    frequency_hz > 0.0 && cents.abs() < tolerance_cents
}

/// Builds the display record for a detected frequency.
///
/// Returns `None` for frequencies that cannot be placed on the scale
/// (zero, negative, or not finite).
pub fn reading_for(frequency_hz: f32, tolerance_cents: i32) -> Option<TuningReading> {
    if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
        return None;
    }
    let note = to_note(frequency_hz);
    Some(TuningReading {
        frequency_hz,
        note_name: note.note_name,
        cents: note.cents,
        in_tune: is_in_tune(frequency_hz, note.cents, tolerance_cents),
    })
}

/// The guitar string a reading most plausibly belongs to.
///
/// A string matches when its pitch class equals `note_name` and its target
/// lies within [`STRING_MATCH_TOLERANCE_HZ`] of the reading.
pub fn matching_string(note_name: &str, frequency_hz: f32) -> Option<&'static ReferenceString> {
    GUITAR_STRINGS.iter().find(|string| {
        string.note_name == note_name
            && (frequency_hz - string.frequency).abs() < STRING_MATCH_TOLERANCE_HZ
    })
}
