//! Triad and tetrad construction quizzes.
//!
//! A question fixes a chord quality, a root pitch class and an
//! inversion; the player must produce the chord tones one at a time in
//! the order the inversion dictates. A wrong note flags the current
//! step without resetting earlier progress; completing the last step
//! finishes the question.

use rand::Rng;

use super::{InversionPolicy, Judge, JudgeSnapshot, Verdict};
use crate::music;
use crate::session::Mode;
use crate::NoteObservation;

/// A chord quality: interval pattern above the root plus the label for
/// each chord tone.
#[derive(Debug, Clone, Copy)]
pub struct ChordQuality {
    pub name: &'static str,
    pub semitones: &'static [u8],
    pub degree_labels: &'static [&'static str],
}

pub const TRIADS: [ChordQuality; 4] = [
    ChordQuality { name: "major", semitones: &[0, 4, 7], degree_labels: &["R", "3", "5"] },
    ChordQuality { name: "minor", semitones: &[0, 3, 7], degree_labels: &["R", "b3", "5"] },
    ChordQuality { name: "augmented", semitones: &[0, 4, 8], degree_labels: &["R", "3", "#5"] },
    ChordQuality { name: "diminished", semitones: &[0, 3, 6], degree_labels: &["R", "b3", "b5"] },
];

pub const TETRADS: [ChordQuality; 5] = [
    ChordQuality { name: "maj7", semitones: &[0, 4, 7, 11], degree_labels: &["R", "3", "5", "7"] },
    ChordQuality { name: "7", semitones: &[0, 4, 7, 10], degree_labels: &["R", "3", "5", "b7"] },
    ChordQuality { name: "m7", semitones: &[0, 3, 7, 10], degree_labels: &["R", "b3", "5", "b7"] },
    ChordQuality { name: "m7b5", semitones: &[0, 3, 6, 10], degree_labels: &["R", "b3", "b5", "b7"] },
    ChordQuality { name: "dim7", semitones: &[0, 3, 6, 9], degree_labels: &["R", "b3", "b5", "bb7"] },
];

/// Which quality table a quiz draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordSet {
    Triads,
    Tetrads,
}

impl ChordSet {
    pub fn qualities(self) -> &'static [ChordQuality] {
        match self {
            ChordSet::Triads => &TRIADS,
            ChordSet::Tetrads => &TETRADS,
        }
    }

    /// Number of inversions, one per chord tone.
    pub fn positions(self) -> u8 {
        match self {
            ChordSet::Triads => 3,
            ChordSet::Tetrads => 4,
        }
    }
}

/// Cyclic rotation of a chord's pattern by the inversion index.
pub fn rotate<T: Copy>(items: &[T], shift: usize) -> Vec<T> {
    let n = items.len();
    if n == 0 {
        return Vec::new();
    }
    let s = shift % n;
    items[s..].iter().chain(items[..s].iter()).copied().collect()
}

/// One construction question.
#[derive(Debug, Clone)]
pub struct ChordQuestion {
    pub quality: ChordQuality,
    pub root_pc: u8,
    pub inversion: u8,
}

impl ChordQuestion {
    pub fn random(set: ChordSet, policy: InversionPolicy) -> Self {
        let mut rng = rand::thread_rng();
        let qualities = set.qualities();
        let quality = qualities[rng.gen_range(0..qualities.len())];
        let inversion = match policy {
            InversionPolicy::Root => 0,
            InversionPolicy::First => 1,
            InversionPolicy::Second => 2,
            // Triads have no third inversion.
            InversionPolicy::Third => set.positions() - 1,
            InversionPolicy::Mix => rng.gen_range(0..set.positions()),
        };
        Self {
            quality,
            root_pc: rng.gen_range(0..12),
            inversion,
        }
    }

    /// Required semitone-above-root sequence, in playing order.
    pub fn step_sequence(&self) -> Vec<u8> {
        rotate(self.quality.semitones, self.inversion as usize)
    }

    /// Degree labels in playing order.
    pub fn step_labels(&self) -> Vec<&'static str> {
        rotate(self.quality.degree_labels, self.inversion as usize)
    }

    /// Note names in playing order, for the answer readout.
    pub fn step_notes(&self) -> Vec<&'static str> {
        self.step_sequence()
            .iter()
            .map(|&s| music::pitch_class_name((self.root_pc + s) % 12))
            .collect()
    }

    pub fn root_name(&self) -> &'static str {
        music::pitch_class_name(self.root_pc)
    }

    pub fn step_count(&self) -> usize {
        self.quality.semitones.len()
    }
}

pub struct ChordQuiz {
    set: ChordSet,
    policy: InversionPolicy,
    question: ChordQuestion,
    step: usize,
    steps_correct: Vec<bool>,
    done: bool,
    verdict: Verdict,
}

impl ChordQuiz {
    pub fn new(set: ChordSet, policy: InversionPolicy) -> Self {
        let question = ChordQuestion::random(set, policy);
        Self::with_question(set, policy, question)
    }

    pub fn with_question(set: ChordSet, policy: InversionPolicy, question: ChordQuestion) -> Self {
        let steps = question.step_count();
        Self {
            set,
            policy,
            question,
            step: 0,
            steps_correct: vec![false; steps],
            done: false,
            verdict: Verdict::Idle,
        }
    }

    pub fn question(&self) -> &ChordQuestion {
        &self.question
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn done(&self) -> bool {
        self.done
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }
}

impl Judge for ChordQuiz {
    fn preferred_mode(&self) -> Mode {
        Mode::LowLatency
    }

    fn observe(&mut self, obs: &NoteObservation) {
        // Terminal until the next question.
        if self.done {
            return;
        }
        let target = self.question.step_sequence()[self.step];
        let diff = music::semitones_above(obs.pitch_class as i32, self.question.root_pc as i32);
        if diff == target {
            self.verdict = Verdict::Correct;
            self.steps_correct[self.step] = true;
            if self.step + 1 >= self.question.step_count() {
                self.done = true;
            } else {
                self.step += 1;
            }
        } else {
            // A miss neither advances nor resets earlier steps.
            self.verdict = Verdict::Wrong;
        }
    }

    fn next_question(&mut self) {
        *self = Self::with_question(self.set, self.policy, ChordQuestion::random(self.set, self.policy));
    }

    fn set_inversion_policy(&mut self, policy: InversionPolicy) {
        self.policy = policy;
    }

    fn snapshot(&self) -> JudgeSnapshot {
        JudgeSnapshot::Chord(ChordSnapshot {
            quality_name: self.question.quality.name,
            root_name: self.question.root_name(),
            inversion: self.question.inversion,
            step_labels: self.question.step_labels(),
            step_notes: self.question.step_notes(),
            step: self.step,
            steps_correct: self.steps_correct.clone(),
            done: self.done,
            verdict: self.verdict,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChordSnapshot {
    pub quality_name: &'static str,
    pub root_name: &'static str,
    pub inversion: u8,
    pub step_labels: Vec<&'static str>,
    pub step_notes: Vec<&'static str>,
    pub step: usize,
    pub steps_correct: Vec<bool>,
    pub done: bool,
    pub verdict: Verdict,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::midi_to_freq;

    fn obs(pc: u8) -> NoteObservation {
        NoteObservation::from_frequency(midi_to_freq(48.0 + pc as f64))
    }

    fn minor_first_inversion_on_d() -> ChordQuiz {
        let question = ChordQuestion {
            quality: TRIADS[1], // minor {0, 3, 7}
            root_pc: 2,         // D
            inversion: 1,
        };
        ChordQuiz::with_question(ChordSet::Triads, InversionPolicy::First, question)
    }

    #[test]
    fn rotation_builds_the_step_sequence() {
        assert_eq!(rotate(&[0u8, 3, 7], 0), vec![0, 3, 7]);
        assert_eq!(rotate(&[0u8, 3, 7], 1), vec![3, 7, 0]);
        assert_eq!(rotate(&[0u8, 3, 7], 2), vec![7, 0, 3]);
        assert_eq!(rotate(&[0u8, 4, 7, 10], 3), vec![10, 0, 4, 7]);
    }

    #[test]
    fn in_order_steps_complete_the_question() {
        let mut quiz = minor_first_inversion_on_d();
        assert_eq!(quiz.question().step_sequence(), vec![3, 7, 0]);

        quiz.observe(&obs(5)); // F: diff 3
        assert_eq!(quiz.verdict(), Verdict::Correct);
        assert_eq!(quiz.step(), 1);

        quiz.observe(&obs(9)); // A: diff 7
        assert_eq!(quiz.step(), 2);

        quiz.observe(&obs(2)); // D: diff 0
        assert!(quiz.done());
        match quiz.snapshot() {
            JudgeSnapshot::Chord(s) => assert_eq!(s.steps_correct, vec![true, true, true]),
            _ => unreachable!(),
        }
    }

    #[test]
    fn out_of_order_note_flags_without_advancing() {
        let mut quiz = minor_first_inversion_on_d();

        quiz.observe(&obs(9)); // A before F
        assert_eq!(quiz.verdict(), Verdict::Wrong);
        assert_eq!(quiz.step(), 0);
        assert!(!quiz.done());

        // Progress is still achievable afterwards.
        quiz.observe(&obs(5));
        assert_eq!(quiz.verdict(), Verdict::Correct);
        assert_eq!(quiz.step(), 1);
    }

    #[test]
    fn done_is_terminal_until_next_question() {
        let mut quiz = minor_first_inversion_on_d();
        for pc in [5, 9, 2] {
            quiz.observe(&obs(pc));
        }
        assert!(quiz.done());

        quiz.observe(&obs(6)); // ignored
        assert!(quiz.done());
        assert_eq!(quiz.verdict(), Verdict::Correct);

        quiz.next_question();
        assert!(!quiz.done());
        assert_eq!(quiz.step(), 0);
        assert_eq!(quiz.verdict(), Verdict::Idle);
    }

    #[test]
    fn wrong_step_keeps_earlier_marks() {
        let mut quiz = minor_first_inversion_on_d();
        quiz.observe(&obs(5)); // step 0 correct
        quiz.observe(&obs(2)); // wrong for step 1
        match quiz.snapshot() {
            JudgeSnapshot::Chord(s) => {
                assert_eq!(s.steps_correct, vec![true, false, false]);
                assert_eq!(s.verdict, Verdict::Wrong);
                assert_eq!(s.step, 1);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn inversion_policies_bound_the_question() {
        for _ in 0..50 {
            let q = ChordQuestion::random(ChordSet::Triads, InversionPolicy::Mix);
            assert!(q.inversion < 3);
            let q = ChordQuestion::random(ChordSet::Tetrads, InversionPolicy::Mix);
            assert!(q.inversion < 4);
        }
        let q = ChordQuestion::random(ChordSet::Triads, InversionPolicy::Third);
        assert_eq!(q.inversion, 2);
        let q = ChordQuestion::random(ChordSet::Tetrads, InversionPolicy::Third);
        assert_eq!(q.inversion, 3);
    }

    #[test]
    fn answer_notes_follow_the_inversion() {
        let question = ChordQuestion {
            quality: TETRADS[2], // m7 {0, 3, 7, 10}
            root_pc: 0,          // C
            inversion: 1,
        };
        assert_eq!(question.step_labels(), vec!["b3", "5", "b7", "R"]);
        assert_eq!(question.step_notes(), vec!["D#", "G", "A#", "C"]);
    }
}
