//! # Note Math Module
//!
//! Equal-tempered (A4 = 440 Hz) conversions shared by every exercise:
//! frequency to MIDI, cent deviations, pitch-class normalization, note
//! names and scale-degree labels.
//!
//! All conversions run in f64 so that frequency/MIDI round trips stay
//! exact to well below a cent.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Sharp-spelled pitch class names, index 0 = C.
pub const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Frequency of a (possibly fractional) MIDI note.
pub fn midi_to_freq(midi: f64) -> f64 {
    440.0 * 2.0_f64.powf((midi - 69.0) / 12.0)
}

/// Fractional MIDI note number for a frequency.
pub fn freq_to_midi(freq: f64) -> f64 {
    69.0 + 12.0 * (freq / 440.0).log2()
}

/// Rounded deviation of `freq` from the given whole MIDI note, in cents.
pub fn cents_off(freq: f64, midi: i32) -> i32 {
    let reference = midi_to_freq(midi as f64);
    (1200.0 * (freq / reference).log2()).round() as i32
}

/// Normalizes any whole MIDI note (negatives included) to a 0..12 pitch class.
pub fn pitch_class(midi: i32) -> u8 {
    (((midi % 12) + 12) % 12) as u8
}

/// Semitone distance of `midi` above `root`, folded into one octave.
/// Also works directly on pitch classes.
pub fn semitones_above(midi: i32, root: i32) -> u8 {
    ((((midi - root) % 12) + 12) % 12) as u8
}

/// Note name with octave, e.g. "A2", "C#4". Octaves follow the MIDI
/// convention (middle C = C4 = 60).
pub fn note_name_from_midi(midi: i32) -> String {
    let name = NOTE_NAMES_SHARP[pitch_class(midi) as usize];
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

/// Octave-less name for a pitch class.
pub fn pitch_class_name(pc: u8) -> &'static str {
    NOTE_NAMES_SHARP[(pc % 12) as usize]
}

/// Static map from semitones-above-root (0..11) to the printable degree
/// label used across the exercises.
static DEGREE_LABELS: Lazy<BTreeMap<u8, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        (0, "R"),
        (1, "b2"),
        (2, "2"),
        (3, "b3"),
        (4, "3"),
        (5, "4"),
        (6, "b5/#4"),
        (7, "5"),
        (8, "b6/#5"),
        (9, "6"),
        (10, "b7"),
        (11, "7"),
    ])
});

/// Degree label for a semitone offset above the root.
pub fn degree_label(semitones: u8) -> &'static str {
    DEGREE_LABELS.get(&(semitones % 12)).copied().unwrap_or("-")
}
