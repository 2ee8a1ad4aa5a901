//! Interval display exercise.
//!
//! The first confidently detected note becomes the root, after octave
//! folding pulls harmonics and high-register detections down into the
//! bass register. Every later note is labelled with its scale degree
//! relative to that root. Acquiring the root also drops the pipeline
//! from stable to low-latency mode.

use std::time::{Duration, Instant};

use super::{Judge, JudgeSnapshot};
use crate::music;
use crate::session::Mode;
use crate::NoteObservation;

/// Root acquisition accepts detections in this band.
const ROOT_MIN_HZ: f64 = 35.0;
const ROOT_MAX_HZ: f64 = 1000.0;
/// Fold down while the candidate stays above this frequency...
const FOLD_ABOVE_HZ: f64 = 95.0;
/// ...and at least an octave above E1 (MIDI 28).
const FOLD_FLOOR_MIDI: i32 = 28;
/// How long the fretboard shows only the freshly acquired root.
const ROOT_FLASH: Duration = Duration::from_millis(300);

/// What the fretboard diagram should highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FretboardMode {
    RootOnly,
    Both,
}

/// An acquired root note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Root {
    pub midi: i32,
    pub frequency_hz: f64,
}

pub struct IntervalDisplay {
    root: Option<Root>,
    degree: Option<&'static str>,
    flash_until: Option<Instant>,
}

impl IntervalDisplay {
    pub fn new() -> Self {
        Self {
            root: None,
            degree: None,
            flash_until: None,
        }
    }

    pub fn root(&self) -> Option<Root> {
        self.root
    }

    /// Halves the candidate toward the bass register. The floor keeps
    /// the result at or above E1 once a fold has happened.
    fn fold(mut freq: f64, mut midi: i32) -> (f64, i32) {
        while freq > FOLD_ABOVE_HZ && midi - 12 >= FOLD_FLOOR_MIDI {
            freq /= 2.0;
            midi -= 12;
        }
        (freq, midi)
    }

    /// Fretboard mode at `now`; split from the clock for tests. The
    /// flash is one-shot and restarted by a new root commit.
    fn fretboard_at(&self, now: Instant) -> FretboardMode {
        match self.flash_until {
            Some(until) if now < until => FretboardMode::RootOnly,
            _ => FretboardMode::Both,
        }
    }

    pub fn fretboard(&self) -> FretboardMode {
        self.fretboard_at(Instant::now())
    }
}

impl Default for IntervalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Judge for IntervalDisplay {
    fn preferred_mode(&self) -> Mode {
        if self.root.is_some() {
            Mode::LowLatency
        } else {
            Mode::Stable
        }
    }

    fn observe(&mut self, obs: &NoteObservation) {
        match self.root {
            None => {
                if (ROOT_MIN_HZ..=ROOT_MAX_HZ).contains(&obs.frequency_hz) {
                    let (frequency_hz, midi) = Self::fold(obs.frequency_hz, obs.rounded_midi);
                    self.root = Some(Root { midi, frequency_hz });
                    self.flash_until = Some(Instant::now() + ROOT_FLASH);
                }
            }
            Some(root) => {
                self.degree =
                    Some(music::degree_label(music::semitones_above(obs.rounded_midi, root.midi)));
            }
        }
    }

    fn reset(&mut self) {
        self.root = None;
        self.degree = None;
        self.flash_until = None;
    }

    fn snapshot(&self) -> JudgeSnapshot {
        JudgeSnapshot::Interval(IntervalSnapshot {
            root: self.root,
            root_name: self.root.map(|r| music::note_name_from_midi(r.midi)),
            root_cents: self.root.map(|r| music::cents_off(r.frequency_hz, r.midi)),
            degree: self.degree,
            fretboard: self.fretboard(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct IntervalSnapshot {
    pub root: Option<Root>,
    pub root_name: Option<String>,
    pub root_cents: Option<i32>,
    pub degree: Option<&'static str>,
    pub fretboard: FretboardMode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::midi_to_freq;

    fn obs(freq: f64) -> NoteObservation {
        NoteObservation::from_frequency(freq)
    }

    #[test]
    fn folds_a3_down_to_a1() {
        // 220 Hz is MIDI 57; both fold steps satisfy the floor check.
        let (freq, midi) = IntervalDisplay::fold(220.0, 57);
        assert_eq!(midi, 33);
        assert!((freq - 55.0).abs() < 1e-9);
    }

    #[test]
    fn folds_stop_at_the_frequency_bound() {
        let (freq, midi) = IntervalDisplay::fold(100.0, 43);
        assert_eq!(midi, 31);
        assert!((freq - 50.0).abs() < 1e-9);

        // Already below the fold bound: untouched.
        let (freq, midi) = IntervalDisplay::fold(80.0, 40);
        assert_eq!(midi, 40);
        assert!((freq - 80.0).abs() < 1e-9);
    }

    #[test]
    fn folding_respects_the_e1_floor() {
        for step in 0..200 {
            let freq = 41.3 + step as f64 * 4.8;
            let midi = crate::music::freq_to_midi(freq).round() as i32;
            let (folded_freq, folded_midi) = IntervalDisplay::fold(freq, midi);
            assert!(folded_midi >= FOLD_FLOOR_MIDI, "input {freq} Hz");
            assert!(folded_freq > 0.0);
        }
    }

    #[test]
    fn first_note_becomes_root_and_switches_mode() {
        let mut judge = IntervalDisplay::new();
        assert_eq!(judge.preferred_mode(), Mode::Stable);

        judge.observe(&obs(220.0));
        let root = judge.root().expect("root acquired");
        assert_eq!(root.midi, 33);
        assert_eq!(judge.preferred_mode(), Mode::LowLatency);
    }

    #[test]
    fn later_notes_are_labelled_relative_to_the_root() {
        let mut judge = IntervalDisplay::new();
        judge.observe(&obs(110.0)); // root A2 folded to A1 (midi 33)
        judge.observe(&obs(midi_to_freq(40.0))); // E2, a fifth above A
        match judge.snapshot() {
            JudgeSnapshot::Interval(s) => assert_eq!(s.degree, Some("5")),
            _ => unreachable!(),
        }
    }

    #[test]
    fn out_of_band_detections_do_not_acquire_a_root() {
        let mut judge = IntervalDisplay::new();
        judge.observe(&obs(32.0));
        assert!(judge.root().is_none());
        assert_eq!(judge.preferred_mode(), Mode::Stable);
    }

    #[test]
    fn reset_clears_root_and_returns_to_stable() {
        let mut judge = IntervalDisplay::new();
        judge.observe(&obs(220.0));
        judge.reset();
        assert!(judge.root().is_none());
        assert_eq!(judge.preferred_mode(), Mode::Stable);
        match judge.snapshot() {
            JudgeSnapshot::Interval(s) => {
                assert!(s.degree.is_none());
                assert_eq!(s.fretboard, FretboardMode::Both);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn root_flash_is_a_one_shot_window() {
        let mut judge = IntervalDisplay::new();
        let before = Instant::now();
        judge.observe(&obs(220.0));
        assert_eq!(judge.fretboard_at(before + Duration::from_millis(1)), FretboardMode::RootOnly);
        assert_eq!(judge.fretboard_at(before + Duration::from_millis(600)), FretboardMode::Both);
    }
}
