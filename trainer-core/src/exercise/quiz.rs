//! Interval quiz.
//!
//! Each question fixes a root pitch class and a target degree; every
//! accepted observation is judged against the target. The verdict is
//! recomputed on every observation, so a wrong note after a correct one
//! overwrites it.

use rand::Rng;

use super::{Judge, JudgeSnapshot, Verdict};
use crate::music;
use crate::session::Mode;
use crate::NoteObservation;

/// Target degrees drawn for a question; the root itself is excluded.
const TARGET_POOL: [u8; 11] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
/// Quiz roots render on the fretboard from C3.
const DISPLAY_BASE_MIDI: i32 = 48;

/// One interval question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub root_pc: u8,
    pub target_semitones: u8,
}

impl Question {
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            root_pc: rng.gen_range(0..12),
            target_semitones: TARGET_POOL[rng.gen_range(0..TARGET_POOL.len())],
        }
    }

    pub fn root_name(&self) -> &'static str {
        music::pitch_class_name(self.root_pc)
    }

    pub fn target_label(&self) -> &'static str {
        music::degree_label(self.target_semitones)
    }

    /// Pitch class of the correct answer.
    pub fn answer_pc(&self) -> u8 {
        (self.root_pc + self.target_semitones) % 12
    }

    pub fn answer_name(&self) -> &'static str {
        music::pitch_class_name(self.answer_pc())
    }

    /// MIDI notes used to render root and answer on a fretboard diagram.
    pub fn root_display_midi(&self) -> i32 {
        DISPLAY_BASE_MIDI + self.root_pc as i32
    }

    pub fn answer_display_midi(&self) -> i32 {
        DISPLAY_BASE_MIDI + self.answer_pc() as i32
    }

    /// Fret shift to the answer on the same string.
    pub fn same_string_shift(&self) -> i32 {
        self.target_semitones as i32
    }

    /// Fret shift to the answer on the next string up (tuned a fourth
    /// apart).
    pub fn upper_string_shift(&self) -> i32 {
        self.target_semitones as i32 - 5
    }
}

pub struct IntervalQuiz {
    question: Question,
    verdict: Verdict,
}

impl IntervalQuiz {
    pub fn new() -> Self {
        Self::with_question(Question::random())
    }

    pub fn with_question(question: Question) -> Self {
        Self {
            question,
            verdict: Verdict::Idle,
        }
    }

    pub fn question(&self) -> Question {
        self.question
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }
}

impl Default for IntervalQuiz {
    fn default() -> Self {
        Self::new()
    }
}

impl Judge for IntervalQuiz {
    fn preferred_mode(&self) -> Mode {
        Mode::LowLatency
    }

    fn observe(&mut self, obs: &NoteObservation) {
        let diff = music::semitones_above(obs.pitch_class as i32, self.question.root_pc as i32);
        self.verdict = if diff == self.question.target_semitones {
            Verdict::Correct
        } else {
            Verdict::Wrong
        };
    }

    fn next_question(&mut self) {
        self.question = Question::random();
        self.verdict = Verdict::Idle;
    }

    fn snapshot(&self) -> JudgeSnapshot {
        JudgeSnapshot::Quiz(QuizSnapshot {
            question: self.question,
            verdict: self.verdict,
        })
    }
}

#[derive(Debug, Clone)]
pub struct QuizSnapshot {
    pub question: Question,
    pub verdict: Verdict,
}
