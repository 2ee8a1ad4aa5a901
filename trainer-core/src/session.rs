//! # Pitch Session Module
//!
//! The single-threaded reducer at the center of the pipeline. Raw
//! capture chunks come in; the session frames them to the operating
//! mode's frame size, writes them through the ring buffer, applies the
//! energy gate, runs the estimator over a window snapshot, maps the
//! result onto the note grid and feeds the judge.
//!
//! The judge (root, question, judgement state) outlives capture: `stop`
//! tears down only the provisioned DSP chain. Whenever the judge's
//! preferred mode changes, the chain is rebuilt destructively on the
//! same stream: new ring buffer, cursor at zero, fresh estimator,
//! in-flight samples discarded.

use anyhow::Result;

use crate::detect::{self, Algorithm, PitchEstimator};
use crate::exercise::{InversionPolicy, Judge, JudgeSnapshot};
use crate::ring::RingBuffer;
use crate::{NoteObservation, Status};

/// Frames with RMS below this are treated as silence.
pub const RMS_GATE: f32 = 0.002;

/// Buffer and window provisioning, chosen per operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Large window: higher latency, better low-frequency accuracy.
    Stable,
    /// Small window: fast judgement once a root or question is fixed.
    LowLatency,
}

impl Mode {
    /// Samples per analysis frame (one gate/estimate step).
    pub fn frame_size(self) -> usize {
        match self {
            Mode::Stable => 4096,
            Mode::LowLatency => 1024,
        }
    }

    /// Ring capacity, always a power of two.
    pub fn capacity(self) -> usize {
        match self {
            Mode::Stable => 1 << 14,
            Mode::LowLatency => 1 << 12,
        }
    }

    /// Analysis window length.
    pub fn window_len(self) -> usize {
        match self {
            Mode::Stable => self.capacity(),
            Mode::LowLatency => self.capacity().min(2048),
        }
    }

    fn running_status(self) -> Status {
        match self {
            Mode::Stable => Status::RunningStable,
            Mode::LowLatency => Status::RunningLowLatency,
        }
    }
}

/// DSP state torn down and rebuilt as one unit on every mode change.
struct Provisioned {
    mode: Mode,
    sample_rate: u32,
    ring: RingBuffer,
    estimator: Box<dyn PitchEstimator>,
    /// Capture samples not yet framed.
    pending: Vec<f32>,
    /// Reused window snapshot allocation.
    window: Vec<f32>,
}

/// One exercise's pitch pipeline plus its judgement state.
pub struct PitchSession {
    algorithm: Algorithm,
    judge: Box<dyn Judge>,
    dsp: Option<Provisioned>,
    status: Status,
    current: Option<NoteObservation>,
}

/// Display-facing copy of the whole session state.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: Status,
    pub current: Option<NoteObservation>,
    pub judge: JudgeSnapshot,
}

impl PitchSession {
    pub fn new(algorithm: Algorithm, judge: Box<dyn Judge>) -> Self {
        Self {
            algorithm,
            judge,
            dsp: None,
            status: Status::Idle,
            current: None,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.dsp.is_some()
    }

    pub fn judge(&self) -> &dyn Judge {
        self.judge.as_ref()
    }

    /// Provisions the DSP chain for a newly opened capture stream.
    pub fn start(&mut self, sample_rate: u32) -> Result<()> {
        let mode = self.judge.preferred_mode();
        self.dsp = Some(Self::provision(self.algorithm, mode, sample_rate)?);
        self.status = mode.running_status();
        self.current = None;
        Ok(())
    }

    /// Tears down the DSP chain. Root, question and judgement survive
    /// so a stopped exercise can resume where it was.
    pub fn stop(&mut self) {
        self.dsp = None;
        self.current = None;
        self.status = Status::Stopped;
    }

    /// Records that the input device could not be opened.
    pub fn mark_mic_denied(&mut self) {
        self.status = Status::MicDenied;
    }

    /// Feeds raw capture samples in arrival order. Complete frames are
    /// analyzed immediately; a mode change requested by the judge
    /// discards whatever was in flight and re-provisions.
    pub fn ingest(&mut self, samples: &[f32]) -> Result<()> {
        let Some(dsp) = self.dsp.as_mut() else {
            return Ok(());
        };
        dsp.pending.extend_from_slice(samples);
        loop {
            let frame = {
                let Some(dsp) = self.dsp.as_mut() else { break };
                let frame_size = dsp.mode.frame_size();
                if dsp.pending.len() < frame_size {
                    break;
                }
                dsp.pending.drain(..frame_size).collect::<Vec<f32>>()
            };
            self.process_frame(&frame)?;
        }
        Ok(())
    }

    /// Resets exercise state (interval display: clears the root).
    pub fn reset(&mut self) -> Result<()> {
        self.judge.reset();
        self.current = None;
        self.sync_mode()
    }

    /// Regenerates the judge's question, where the variant has one.
    pub fn next_question(&mut self) -> Result<()> {
        self.judge.next_question();
        self.sync_mode()
    }

    /// Changes the chord inversion policy for subsequent questions.
    pub fn set_inversion_policy(&mut self, policy: InversionPolicy) {
        self.judge.set_inversion_policy(policy);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            current: self.current,
            judge: self.judge.snapshot(),
        }
    }

    fn provision(algorithm: Algorithm, mode: Mode, sample_rate: u32) -> Result<Provisioned> {
        eprintln!(
            "[SESSION] Provisioning {:?} mode (frame {}, window {})",
            mode,
            mode.frame_size(),
            mode.window_len()
        );
        Ok(Provisioned {
            mode,
            sample_rate,
            ring: RingBuffer::new(mode.capacity()),
            estimator: detect::build_estimator(algorithm, sample_rate, mode.window_len())?,
            pending: Vec::with_capacity(mode.frame_size() * 2),
            window: Vec::with_capacity(mode.window_len()),
        })
    }

    fn process_frame(&mut self, frame: &[f32]) -> Result<()> {
        let Some(dsp) = self.dsp.as_mut() else {
            return Ok(());
        };
        dsp.ring.write(frame);

        let rms = (frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32).sqrt();
        if rms < RMS_GATE {
            self.status = Status::Detecting;
            return Ok(());
        }

        let mode = dsp.mode;
        dsp.ring.snapshot_window(mode.window_len(), &mut dsp.window);
        let raw = dsp.estimator.estimate(&dsp.window);
        let Some(freq) = detect::accept(raw) else {
            self.status = Status::Detecting;
            return Ok(());
        };

        let obs = NoteObservation::from_frequency(freq);
        self.current = Some(obs);
        self.status = mode.running_status();
        self.judge.observe(&obs);
        self.sync_mode()
    }

    /// Re-provisions when the judge's preferred mode differs from the
    /// provisioned one. Runs on the same capture stream; only the DSP
    /// chain is replaced.
    fn sync_mode(&mut self) -> Result<()> {
        let Some(dsp) = self.dsp.as_ref() else {
            return Ok(());
        };
        let want = self.judge.preferred_mode();
        if want != dsp.mode {
            let sample_rate = dsp.sample_rate;
            self.dsp = Some(Self::provision(self.algorithm, want, sample_rate)?);
            self.status = want.running_status();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::{
        ChordQuiz, ChordSet, IntervalDisplay, IntervalQuiz, JudgeSnapshot, Verdict,
    };
    use crate::exercise::quiz::Question;

    const SAMPLE_RATE: u32 = 44_100;

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.6 * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    fn quiz_session(root_pc: u8, target_semitones: u8) -> PitchSession {
        let judge = IntervalQuiz::with_question(Question {
            root_pc,
            target_semitones,
        });
        PitchSession::new(Algorithm::Acf2Plus, Box::new(judge))
    }

    #[test]
    fn silence_never_reaches_the_judge() {
        for algorithm in Algorithm::ALL {
            let judge = IntervalQuiz::with_question(Question {
                root_pc: 0,
                target_semitones: 7,
            });
            let mut session = PitchSession::new(algorithm, Box::new(judge));
            session.start(SAMPLE_RATE).unwrap();
            session.ingest(&vec![0.0; 4096]).unwrap();

            assert_eq!(session.status(), Status::Detecting, "{algorithm}");
            match session.snapshot().judge {
                JudgeSnapshot::Quiz(s) => assert_eq!(s.verdict, Verdict::Idle),
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn a_fifth_above_c_is_judged_correct() {
        let mut session = quiz_session(0, 7);
        assert_eq!(session.status(), Status::Idle);
        session.start(SAMPLE_RATE).unwrap();

        session.ingest(&sine(196.0, 8192)).unwrap(); // G3
        assert_eq!(session.status(), Status::RunningLowLatency);
        let obs = session.snapshot().current.expect("note detected");
        assert_eq!(obs.rounded_midi, 55);
        match session.snapshot().judge {
            JudgeSnapshot::Quiz(s) => assert_eq!(s.verdict, Verdict::Correct),
            _ => unreachable!(),
        }

        session.ingest(&sine(174.61, 8192)).unwrap(); // F3
        match session.snapshot().judge {
            JudgeSnapshot::Quiz(s) => assert_eq!(s.verdict, Verdict::Wrong),
            _ => unreachable!(),
        }
    }

    #[test]
    fn odd_sized_chunks_frame_identically() {
        let mut session = quiz_session(0, 7);
        session.start(SAMPLE_RATE).unwrap();
        for chunk in sine(196.0, 8192).chunks(333) {
            session.ingest(chunk).unwrap();
        }
        match session.snapshot().judge {
            JudgeSnapshot::Quiz(s) => assert_eq!(s.verdict, Verdict::Correct),
            _ => unreachable!(),
        }
    }

    #[test]
    fn interval_session_acquires_root_and_drops_to_low_latency() {
        let mut session = PitchSession::new(Algorithm::Acf2Plus, Box::new(IntervalDisplay::new()));
        session.start(SAMPLE_RATE).unwrap();
        assert_eq!(session.status(), Status::RunningStable);

        session.ingest(&sine(110.0, 1 << 15)).unwrap(); // A2
        assert_eq!(session.status(), Status::RunningLowLatency);
        match session.snapshot().judge {
            JudgeSnapshot::Interval(s) => {
                // 110 Hz folds down an octave to A1.
                assert_eq!(s.root_name.as_deref(), Some("A1"));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn judge_state_survives_stop_and_restart() {
        let mut session = PitchSession::new(Algorithm::Acf2Plus, Box::new(IntervalDisplay::new()));
        session.start(SAMPLE_RATE).unwrap();
        session.ingest(&sine(110.0, 1 << 15)).unwrap();

        session.stop();
        assert_eq!(session.status(), Status::Stopped);
        assert!(session.snapshot().current.is_none());

        // Root persisted, so the restart provisions low-latency mode.
        session.start(SAMPLE_RATE).unwrap();
        assert_eq!(session.status(), Status::RunningLowLatency);
        match session.snapshot().judge {
            JudgeSnapshot::Interval(s) => assert_eq!(s.root_name.as_deref(), Some("A1")),
            _ => unreachable!(),
        }
    }

    #[test]
    fn reset_returns_the_interval_session_to_stable() {
        let mut session = PitchSession::new(Algorithm::Acf2Plus, Box::new(IntervalDisplay::new()));
        session.start(SAMPLE_RATE).unwrap();
        session.ingest(&sine(110.0, 1 << 15)).unwrap();
        assert_eq!(session.status(), Status::RunningLowLatency);

        session.reset().unwrap();
        assert_eq!(session.status(), Status::RunningStable);
        match session.snapshot().judge {
            JudgeSnapshot::Interval(s) => assert!(s.root.is_none()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn chord_session_steps_through_a_question() {
        use crate::exercise::chord::{ChordQuestion, TRIADS};
        use crate::exercise::InversionPolicy;
        use crate::music::midi_to_freq;

        let question = ChordQuestion {
            quality: TRIADS[0], // major {0, 4, 7}
            root_pc: 0,         // C
            inversion: 0,
        };
        let judge = ChordQuiz::with_question(ChordSet::Triads, InversionPolicy::Root, question);
        let mut session = PitchSession::new(Algorithm::Yin, Box::new(judge));
        session.start(SAMPLE_RATE).unwrap();
        assert_eq!(session.status(), Status::RunningLowLatency);

        for midi in [48, 52, 55] {
            // C3, E3, G3
            session.ingest(&sine(midi_to_freq(midi as f64) as f32, 8192)).unwrap();
        }
        match session.snapshot().judge {
            JudgeSnapshot::Chord(s) => {
                assert!(s.done);
                assert_eq!(s.steps_correct, vec![true, true, true]);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn ingest_without_start_is_ignored() {
        let mut session = quiz_session(0, 7);
        session.ingest(&sine(196.0, 8192)).unwrap();
        assert_eq!(session.status(), Status::Idle);
        assert!(session.snapshot().current.is_none());
    }
}
