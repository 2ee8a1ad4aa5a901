//! # Ear Trainer - Terminal Frontend
//!
//! Thin presentation layer over `trainer-core`. Runs one exercise at a
//! time against the microphone and prints the session snapshot as a
//! status line whenever it changes.
//!
//! ## Architecture
//! - **Main thread**: owns the capture stream and the pitch session and
//!   reduces every event (capture chunks, user commands, shutdown).
//! - **Stdin thread**: parses interactive commands into a channel.
//! - **Communication**: crossbeam channels; the audio callback only
//!   forwards raw sample chunks.

use std::fs;
use std::io::{self, BufRead};
use std::str::FromStr;
use std::thread;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use trainer_core::capture::{self, CaptureSession};
use trainer_core::detect::Algorithm;
use trainer_core::exercise::{
    ChordQuiz, ChordSet, FretboardMode, IntervalDisplay, IntervalQuiz, InversionPolicy, Judge,
    JudgeSnapshot,
};
use trainer_core::session::{PitchSession, SessionSnapshot};

const PREFS_PATH: &str = "trainer_prefs.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Exercise {
    /// Acquire a root, then read interval degrees off your playing
    Intervals,
    /// Interval quiz: play the asked degree above the root
    Quiz,
    /// Triad construction quiz
    Triads,
    /// Tetrad construction quiz
    Tetrads,
}

/// command-line interface for the ear trainer
#[derive(Parser, Debug)]
#[command(name = "trainer")]
#[command(about = "real-time ear training against a microphone")]
struct Cli {
    /// exercise to run
    #[arg(short, long, value_enum, default_value_t = Exercise::Intervals)]
    exercise: Exercise,

    /// pitch detection algorithm (acf2plus, yin, wavelet, macleod)
    #[arg(short, long)]
    algorithm: Option<String>,

    /// input device index (use --list-devices to see options)
    #[arg(short, long)]
    device: Option<usize>,

    /// inversion selection for chord quizzes (root, first, second, third, mix)
    #[arg(short, long)]
    inversion: Option<String>,

    /// list available input devices and exit
    #[arg(long)]
    list_devices: bool,
}

/// Saved user preferences, restored at startup and overridden by flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Preferences {
    algorithm: Option<Algorithm>,
    device: Option<usize>,
    inversion: Option<InversionPolicy>,
}

fn load_preferences(path: &str) -> Preferences {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(prefs) => prefs,
            Err(e) => {
                eprintln!("[MAIN] Ignoring malformed preferences: {}", e);
                Preferences::default()
            }
        },
        Err(_) => Preferences::default(),
    }
}

fn save_preferences(prefs: &Preferences, path: &str) -> io::Result<()> {
    let json = serde_json::to_string_pretty(prefs)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path, json)
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Start,
    Stop,
    Reset,
    Next,
    Answer,
    Inversion(InversionPolicy),
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let head = parts.next()?;
    match head {
        "start" => Some(Command::Start),
        "stop" => Some(Command::Stop),
        "r" | "reset" => Some(Command::Reset),
        "n" | "next" => Some(Command::Next),
        "a" | "answer" => Some(Command::Answer),
        "i" | "inversion" => {
            let policy = InversionPolicy::from_str(parts.next()?).ok()?;
            Some(Command::Inversion(policy))
        }
        "h" | "help" => Some(Command::Help),
        "q" | "quit" => Some(Command::Quit),
        _ => None,
    }
}

fn spawn_stdin_reader(sender: Sender<Command>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_command(trimmed) {
                Some(command) => {
                    let quit = matches!(command, Command::Quit);
                    if sender.send(command).is_err() || quit {
                        break;
                    }
                }
                None => eprintln!("[MAIN] Unknown command: {} (try 'help')", trimmed),
            }
        }
    });
}

fn print_help(exercise: Exercise) {
    println!("commands:");
    println!("  start / stop     capture on or off");
    match exercise {
        Exercise::Intervals => println!("  r                reset the acquired root"),
        _ => {
            println!("  n                next question");
            println!("  a                show the answer");
        }
    }
    if matches!(exercise, Exercise::Triads | Exercise::Tetrads) {
        println!("  i <policy>       inversion policy (root/first/second/third/mix)");
    }
    println!("  q                quit");
}

/// One status line per state change.
fn render(snapshot: &SessionSnapshot) -> String {
    let current = match &snapshot.current {
        Some(obs) => format!(
            "{} {:.1} Hz ({:+} cents)",
            obs.name(),
            obs.frequency_hz,
            obs.cents_offset
        ),
        None => "-".to_string(),
    };
    let judge = match &snapshot.judge {
        JudgeSnapshot::Interval(s) => {
            let root = match (&s.root_name, s.root_cents) {
                (Some(name), Some(cents)) => format!("{} ({:+} cents)", name, cents),
                _ => "-".to_string(),
            };
            let flash = if s.fretboard == FretboardMode::RootOnly {
                " [new root]"
            } else {
                ""
            };
            format!("root {}{} | degree {}", root, flash, s.degree.unwrap_or("-"))
        }
        JudgeSnapshot::Quiz(s) => format!(
            "{} + {} ? | {}",
            s.question.root_name(),
            s.question.target_label(),
            s.verdict.as_str()
        ),
        JudgeSnapshot::Chord(s) => {
            let steps = s
                .step_labels
                .iter()
                .enumerate()
                .map(|(i, label)| {
                    let mark = if s.steps_correct[i] {
                        "x"
                    } else if i == s.step && !s.done {
                        ">"
                    } else {
                        " "
                    };
                    format!("{}[{}]", label, mark)
                })
                .collect::<Vec<_>>()
                .join(" ");
            let state = if s.done { "done" } else { s.verdict.as_str() };
            format!(
                "{} {} (inv {}) | {} | {}",
                s.root_name, s.quality_name, s.inversion, steps, state
            )
        }
    };
    format!("[{}] {} | {}", snapshot.status, current, judge)
}

fn print_answer(snapshot: &SessionSnapshot) {
    match &snapshot.judge {
        JudgeSnapshot::Interval(_) => println!("the interval display has no hidden answer"),
        JudgeSnapshot::Quiz(s) => {
            let q = &s.question;
            println!(
                "answer: {} (same string {:+} frets, next string up {:+})",
                q.answer_name(),
                q.same_string_shift(),
                q.upper_string_shift()
            );
        }
        JudgeSnapshot::Chord(s) => println!("answer: {}", s.step_notes.join(" ")),
    }
}

fn start_capture(
    session: &mut PitchSession,
    capture: &mut Option<CaptureSession>,
    frames_rx: &mut Option<Receiver<Vec<f32>>>,
    device: Option<usize>,
) {
    if capture.is_some() {
        return;
    }
    let (frames_tx, rx) = unbounded::<Vec<f32>>();
    match CaptureSession::open(device, frames_tx) {
        Ok(cap) => match session.start(cap.sample_rate()) {
            Ok(()) => {
                *capture = Some(cap);
                *frames_rx = Some(rx);
            }
            Err(e) => eprintln!("[MAIN] Could not start session: {}", e),
        },
        Err(e) => {
            eprintln!("[MAIN] Microphone unavailable: {}", e);
            session.mark_mic_denied();
        }
    }
}

fn stop_capture(
    session: &mut PitchSession,
    capture: &mut Option<CaptureSession>,
    frames_rx: &mut Option<Receiver<Vec<f32>>>,
) {
    if let Some(mut cap) = capture.take() {
        cap.close();
    }
    *frames_rx = None;
    if session.is_running() {
        session.stop();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_devices {
        for device in capture::list_input_devices()? {
            println!("{}: {}", device.index, device.name);
        }
        return Ok(());
    }

    let mut prefs = load_preferences(PREFS_PATH);
    let algorithm = match &cli.algorithm {
        Some(s) => Algorithm::from_str(s).map_err(anyhow::Error::msg)?,
        None => prefs.algorithm.unwrap_or(Algorithm::Acf2Plus),
    };
    let inversion = match &cli.inversion {
        Some(s) => InversionPolicy::from_str(s).map_err(anyhow::Error::msg)?,
        None => prefs.inversion.unwrap_or(InversionPolicy::Mix),
    };
    let device = cli.device.or(prefs.device);

    prefs.algorithm = Some(algorithm);
    prefs.inversion = Some(inversion);
    prefs.device = device;
    if let Err(e) = save_preferences(&prefs, PREFS_PATH) {
        eprintln!("[MAIN] Could not save preferences: {}", e);
    }

    let judge: Box<dyn Judge> = match cli.exercise {
        Exercise::Intervals => Box::new(IntervalDisplay::new()),
        Exercise::Quiz => Box::new(IntervalQuiz::new()),
        Exercise::Triads => Box::new(ChordQuiz::new(ChordSet::Triads, inversion)),
        Exercise::Tetrads => Box::new(ChordQuiz::new(ChordSet::Tetrads, inversion)),
    };
    let mut session = PitchSession::new(algorithm, judge);

    println!("ear trainer: {:?} with {}", cli.exercise, algorithm);
    print_help(cli.exercise);

    let (command_tx, command_rx) = unbounded::<Command>();
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })?;
    spawn_stdin_reader(command_tx);

    let mut capture: Option<CaptureSession> = None;
    let mut frames_rx: Option<Receiver<Vec<f32>>> = None;
    let mut last_line = String::new();

    start_capture(&mut session, &mut capture, &mut frames_rx, device);

    loop {
        let frames = frames_rx.clone().unwrap_or_else(crossbeam_channel::never);
        let mut quit = false;
        crossbeam_channel::select! {
            recv(frames) -> msg => match msg {
                Ok(chunk) => {
                    if let Err(e) = session.ingest(&chunk) {
                        eprintln!("[SESSION] {}", e);
                        stop_capture(&mut session, &mut capture, &mut frames_rx);
                    }
                }
                Err(_) => {
                    frames_rx = None;
                }
            },
            recv(command_rx) -> msg => match msg {
                Ok(command) => match command {
                    Command::Start => start_capture(&mut session, &mut capture, &mut frames_rx, device),
                    Command::Stop => stop_capture(&mut session, &mut capture, &mut frames_rx),
                    Command::Reset => {
                        if let Err(e) = session.reset() {
                            eprintln!("[SESSION] {}", e);
                            stop_capture(&mut session, &mut capture, &mut frames_rx);
                        }
                    }
                    Command::Next => {
                        if let Err(e) = session.next_question() {
                            eprintln!("[SESSION] {}", e);
                            stop_capture(&mut session, &mut capture, &mut frames_rx);
                        }
                    }
                    Command::Answer => print_answer(&session.snapshot()),
                    Command::Inversion(policy) => {
                        session.set_inversion_policy(policy);
                        prefs.inversion = Some(policy);
                        if let Err(e) = save_preferences(&prefs, PREFS_PATH) {
                            eprintln!("[MAIN] Could not save preferences: {}", e);
                        }
                        println!("inversion policy {:?} from the next question", policy);
                    }
                    Command::Help => print_help(cli.exercise),
                    Command::Quit => quit = true,
                },
                Err(_) => quit = true,
            },
            recv(shutdown_rx) -> _ => quit = true,
        }

        if quit {
            break;
        }
        let line = render(&session.snapshot());
        if line != last_line {
            println!("{}", line);
            last_line = line;
        }
    }

    stop_capture(&mut session, &mut capture, &mut frames_rx);
    println!("[{}]", session.snapshot().status);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_round_trip() {
        let prefs = Preferences {
            algorithm: Some(Algorithm::Yin),
            device: Some(2),
            inversion: Some(InversionPolicy::Mix),
        };
        let json = serde_json::to_string_pretty(&prefs).unwrap();
        let back: Preferences = serde_json::from_str(&json).unwrap();
        assert_eq!(back.algorithm, Some(Algorithm::Yin));
        assert_eq!(back.device, Some(2));
        assert_eq!(back.inversion, Some(InversionPolicy::Mix));
    }

    #[test]
    fn commands_parse() {
        assert!(matches!(parse_command("start"), Some(Command::Start)));
        assert!(matches!(parse_command("r"), Some(Command::Reset)));
        assert!(matches!(parse_command("next"), Some(Command::Next)));
        assert!(matches!(
            parse_command("i first"),
            Some(Command::Inversion(InversionPolicy::First))
        ));
        assert!(parse_command("i sideways").is_none());
        assert!(parse_command("bogus").is_none());
    }
}
