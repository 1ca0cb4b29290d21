//! Practice Flow Integration Tests
//!
//! Drives the public API end to end:
//! - note naming round trip over the piano range
//! - sequencer progress and debounce
//! - a full session fed by a scripted input source

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use practice_core::audio::{CaptureRequest, FrameSender, InputStream, OpenedInput};
use practice_core::config::SequencerConfig;
use practice_core::tuning::midi_to_frequency;
use practice_core::{
    AudioFrame, CaptureError, ExerciseEvent, ExerciseSequencer, FeedbackCategory, InputSource,
    LatestFeedback, MapperConfig, NextNote, NoteMapper, NotePitch, PitchEstimate, PracticeConfig,
    PracticeSession, TargetSequence,
};

const SAMPLE_RATE: u32 = 44_100;
const HOP: usize = 512;

fn note(s: &str) -> NotePitch {
    s.parse().unwrap()
}

fn sequencer(target: &str) -> ExerciseSequencer {
    let mut sequencer = ExerciseSequencer::new(SequencerConfig::default()).unwrap();
    sequencer.begin(TargetSequence::parse(target).unwrap());
    sequencer
}

/// Plays `notes` with a silent gap after each, the way a student would.
fn play(sequencer: &mut ExerciseSequencer, notes: &[&str]) -> Vec<ExerciseEvent> {
    notes
        .iter()
        .flat_map(|n| [Some(note(n)), None])
        .filter_map(|played| sequencer.evaluate(played))
        .collect()
}

#[test]
fn mapper_recovers_every_piano_key() {
    let mapper = NoteMapper::new(&MapperConfig::default(), 0.8).unwrap();
    for midi in 21..=108 {
        let expected = NotePitch::from_midi(midi);
        for detune in [-0.49f32, 0.0, 0.49] {
            let freq = 440.0 * 2f32.powf((midi as f32 + detune - 69.0) / 12.0);
            assert_eq!(mapper.map_frequency(Some(freq)), Some(expected), "midi {midi} detune {detune}");
        }
        assert_relative_frequency(midi_to_frequency(midi, 440.0), expected.frequency(440.0));
    }
    assert_eq!(mapper.map_frequency(Some(20.0)), None);
    assert_eq!(mapper.map_frequency(None), None);
    assert_eq!(
        mapper.map_estimate(&PitchEstimate { frequency_hz: Some(440.0), confidence: 0.5 }),
        None
    );
}

fn assert_relative_frequency(a: f32, b: f32) {
    assert!((a - b).abs() <= a * 1e-5, "{a} != {b}");
}

#[test]
fn played_scale_completes_and_wraps() {
    let mut sequencer = sequencer("C4 D4 E4");
    let events = play(&mut sequencer, &["C4", "D4", "E4"]);
    assert_eq!(
        events,
        vec![
            ExerciseEvent::Correct { played: note("C4"), next: NextNote::Note(note("D4")) },
            ExerciseEvent::Correct { played: note("D4"), next: NextNote::Note(note("E4")) },
            ExerciseEvent::Correct { played: note("E4"), next: NextNote::SequenceComplete },
        ]
    );
    assert_eq!(sequencer.cursor(), 0);
}

#[test]
fn repeated_note_only_matches_once() {
    let mut sequencer = sequencer("C4 D4");
    let events = play(&mut sequencer, &["C4", "C4"]);
    let correct = events
        .iter()
        .filter(|e| matches!(e, ExerciseEvent::Correct { .. }))
        .count();
    assert_eq!(correct, 1);
    assert_eq!(sequencer.cursor(), 1);
}

#[test]
fn wrong_note_keeps_cursor() {
    let mut sequencer = sequencer("C4 D4");
    let events: Vec<_> = (0..10).filter_map(|_| sequencer.evaluate(Some(note("G4")))).collect();
    assert_eq!(
        events,
        vec![ExerciseEvent::Incorrect { played: note("G4"), expected: note("C4") }]
    );
    assert_eq!(sequencer.cursor(), 0);
}

#[test]
fn silence_never_judges() {
    let mut sequencer = sequencer("C4");
    for _ in 0..50 {
        assert_eq!(sequencer.evaluate(None), None);
    }
    assert_eq!(sequencer.expected(), Some(note("C4")));
}

#[test]
fn reset_then_full_cycle_returns_to_start() {
    let mut sequencer = sequencer("A3 B3 C#4 D4");
    play(&mut sequencer, &["A3", "B3"]);
    sequencer.reset();
    assert_eq!(sequencer.evaluate(Some(note("A3"))), None);

    let sequence = TargetSequence::parse("A3 B3 C#4 D4").unwrap();
    sequencer.begin(sequence.clone());
    let names: Vec<String> = sequence.notes().iter().map(|n| n.to_string()).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    play(&mut sequencer, &names);
    assert_eq!(sequencer.cursor(), 0);
}

/// An input whose frames are pushed by the test itself.
#[derive(Clone, Default)]
struct ScriptedInput {
    frames: Arc<Mutex<Option<FrameSender>>>,
    errors: Arc<Mutex<Option<Sender<CaptureError>>>>,
    released: Arc<AtomicBool>,
}

struct ScriptedStream(ScriptedInput);

impl InputStream for ScriptedStream {
    fn pause(&self) -> Result<(), CaptureError> {
        Ok(())
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.0.frames.lock().unwrap().take();
        self.0.released.store(true, Ordering::SeqCst);
    }
}

impl InputSource for ScriptedInput {
    fn open(
        &mut self,
        request: &CaptureRequest,
        frames: FrameSender,
        errors: Sender<CaptureError>,
    ) -> Result<OpenedInput, CaptureError> {
        assert_eq!(request.hop_size, HOP);
        *self.frames.lock().unwrap() = Some(frames);
        *self.errors.lock().unwrap() = Some(errors);
        self.released.store(false, Ordering::SeqCst);
        Ok(OpenedInput {
            stream: Box::new(ScriptedStream(self.clone())),
            sample_rate: SAMPLE_RATE,
        })
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

/// Pushes hops one at a time, waiting for each to be processed.
struct Player<'a> {
    session: &'a PracticeSession,
    sender: FrameSender,
    phase: f32,
    index: u64,
}

impl Player<'_> {
    fn hop(&mut self, freq: Option<f32>) {
        let step = freq.map_or(0.0, |f| 2.0 * std::f32::consts::PI * f / SAMPLE_RATE as f32);
        let samples: Vec<f32> = (0..HOP)
            .map(|_| {
                let s = if freq.is_some() { 0.5 * self.phase.sin() } else { 0.0 };
                self.phase = (self.phase + step) % (2.0 * std::f32::consts::PI);
                s
            })
            .collect();
        self.sender.push(AudioFrame::new(samples, self.index));
        self.index += 1;
        let target = self.index;
        assert!(wait_until(|| self.session.status().frames_processed >= target));
    }

    fn sustain(&mut self, name: &str, hops: usize) {
        let freq = note(name).frequency(440.0);
        for _ in 0..hops {
            self.hop(Some(freq));
        }
        for _ in 0..8 {
            self.hop(None);
        }
    }
}

#[test]
fn session_plays_through_a_melody() {
    let input = ScriptedInput::default();
    let latest = Arc::new(LatestFeedback::new());
    let config = PracticeConfig {
        target: vec![note("C4"), note("E4"), note("G4")],
        ..PracticeConfig::default()
    };
    let mut session = PracticeSession::new(config, input.clone(), latest.clone()).unwrap();

    session.start().unwrap();
    assert_eq!(latest.latest().map(|f| f.category), Some(FeedbackCategory::Info));

    let sender = input.frames.lock().unwrap().clone().unwrap();
    {
        let mut player = Player { session: &session, sender, phase: 0.0, index: 0 };

        player.sustain("C4", 20);
        assert_eq!(session.status().cursor, 1);

        player.sustain("F4", 20);
        assert_eq!(session.status().cursor, 1);
        assert_eq!(
            latest.latest().map(|f| f.message),
            Some("Incorrect: played F4, expected E4".to_string())
        );

        player.sustain("E4", 20);
        player.sustain("G4", 20);
        assert_eq!(session.status().cursor, 0);
        assert_eq!(
            latest.latest().map(|f| f.message),
            Some("Correct! Sequence complete!".to_string())
        );
    }

    // A runtime stream error is reported without ending the session.
    let errors = input.errors.lock().unwrap().clone().unwrap();
    errors.send(CaptureError::Stream("buffer overrun".into())).unwrap();
    assert!(wait_until(|| latest.latest().map(|f| f.category) == Some(FeedbackCategory::Error)));
    assert!(session.is_active());

    session.stop();
    session.stop();
    assert!(!session.is_active());
    assert!(input.released.load(Ordering::SeqCst));
    assert_eq!(latest.latest().map(|f| f.message), Some("Practice stopped".to_string()));
}

#[test]
fn missing_device_fails_cleanly() {
    struct NoDevice;
    impl InputSource for NoDevice {
        fn open(
            &mut self,
            _request: &CaptureRequest,
            _frames: FrameSender,
            _errors: Sender<CaptureError>,
        ) -> Result<OpenedInput, CaptureError> {
            Err(CaptureError::NoInputDevice)
        }
    }

    let latest = Arc::new(LatestFeedback::new());
    let mut session = PracticeSession::new(PracticeConfig::default(), NoDevice, latest.clone()).unwrap();
    assert_eq!(session.start(), Err(CaptureError::NoInputDevice));
    assert!(!session.is_active());
    assert_eq!(latest.revision(), 1);
    assert_eq!(latest.latest().map(|f| f.category), Some(FeedbackCategory::Error));

    // Retrying fails the same way rather than reporting a busy session.
    assert_eq!(session.start(), Err(CaptureError::NoInputDevice));
    session.stop();
}
