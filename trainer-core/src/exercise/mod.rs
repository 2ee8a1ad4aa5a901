//! # Exercise Judgement Module
//!
//! The four exercise variants share one capture/buffer/gate/estimation
//! pipeline and differ only in how they consume note observations. Each
//! variant implements [`Judge`]; the session feeds it accepted
//! observations in arrival order and re-provisions the pipeline
//! whenever the judge's preferred mode changes.

pub mod chord;
pub mod interval;
pub mod quiz;

pub use chord::{ChordQuiz, ChordSet, ChordSnapshot};
pub use interval::{FretboardMode, IntervalDisplay, IntervalSnapshot};
pub use quiz::{IntervalQuiz, QuizSnapshot};

use serde::{Deserialize, Serialize};

use crate::session::Mode;
use crate::NoteObservation;

/// Correctness verdict for the most recent observation. Not sticky: a
/// later observation may overwrite it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Idle,
    Correct,
    Wrong,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Idle => "...",
            Verdict::Correct => "correct",
            Verdict::Wrong => "wrong",
        }
    }
}

/// Inversion selection policy for chord construction questions.
/// `Third` only exists for tetrads; triads clamp it to second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InversionPolicy {
    Root,
    First,
    Second,
    Third,
    Mix,
}

impl std::str::FromStr for InversionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "root" => Ok(InversionPolicy::Root),
            "first" => Ok(InversionPolicy::First),
            "second" => Ok(InversionPolicy::Second),
            "third" => Ok(InversionPolicy::Third),
            "mix" => Ok(InversionPolicy::Mix),
            other => Err(format!("unknown inversion policy: {other}")),
        }
    }
}

/// Per-exercise judgement logic behind the shared pitch session.
pub trait Judge: Send {
    /// Buffer/window mode this judge wants right now.
    fn preferred_mode(&self) -> Mode;

    /// Consumes one accepted observation and updates judgement state.
    fn observe(&mut self, obs: &NoteObservation);

    /// Regenerates the question, where the variant has one.
    fn next_question(&mut self) {}

    /// Explicit reset (interval display: clear the acquired root).
    fn reset(&mut self) {}

    /// Changes the inversion policy, where the variant has one. Takes
    /// effect from the next question.
    fn set_inversion_policy(&mut self, _policy: InversionPolicy) {}

    /// Display-facing copy of the judgement state.
    fn snapshot(&self) -> JudgeSnapshot;
}

/// Display data, one variant per exercise.
#[derive(Debug, Clone)]
pub enum JudgeSnapshot {
    Interval(IntervalSnapshot),
    Quiz(QuizSnapshot),
    Chord(ChordSnapshot),
}
