//! # Exercise Sequencer
//!
//! Holds the target note sequence and a cursor into it, and judges each
//! detected note against the expected one. Sequences are cyclic: matching the
//! last note wraps the cursor back to the first so an exercise can be repeated
//! without restarting.
//!
//! Notes are judged on onset. A note has to be seen for
//! `min_stable_frames` consecutive evaluations before it is judged, and once
//! judged the same note held continuously is ignored until `release_frames`
//! consecutive silent frames or a different note are observed. A single
//! sustained note can therefore never advance the cursor more than once, even
//! if a frame or two inside it drops out.

use std::fmt;

use crate::config::SequencerConfig;
use crate::error::ConfigError;
use crate::tuning::NotePitch;

/// Ordered, non-empty list of notes to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSequence(Vec<NotePitch>);

impl TargetSequence {
    pub fn new(notes: Vec<NotePitch>) -> Result<Self, ConfigError> {
        if notes.is_empty() {
            return Err(ConfigError::EmptySequence);
        }
        Ok(Self(notes))
    }

    /// Parses whitespace- or comma-separated note names, e.g. `"C4 D4 E4"`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let notes = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<NotePitch>, _>>()?;
        Self::new(notes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, index: usize) -> Option<NotePitch> {
        self.0.get(index).copied()
    }

    pub fn notes(&self) -> &[NotePitch] {
        &self.0
    }
}

impl fmt::Display for TargetSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, note) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{note}")?;
        }
        Ok(())
    }
}

/// What follows a correctly played note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextNote {
    Note(NotePitch),
    /// The last note of the sequence was played; the cursor wrapped to 0
    SequenceComplete,
}

/// Outcome of a judged note, consumed by the feedback presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseEvent {
    /// An exercise started and is waiting for `expected`
    Listening { expected: NotePitch },
    Correct { played: NotePitch, next: NextNote },
    Incorrect { played: NotePitch, expected: NotePitch },
}

/// Observable sequencer state. Advancing happens inside `evaluate` and is
/// never visible from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Listening { expected: NotePitch },
}

/// A running exercise: the sequence and the index of the expected note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseState {
    sequence: TargetSequence,
    cursor: usize,
}

impl ExerciseState {
    fn expected(&self) -> NotePitch {
        self.sequence.0[self.cursor]
    }
}

#[derive(Debug, Clone)]
pub struct ExerciseSequencer {
    config: SequencerConfig,
    exercise: Option<ExerciseState>,
    /// Note currently accumulating stable frames
    candidate: Option<NotePitch>,
    candidate_frames: u32,
    /// Last judged note, ignored until released
    latched: Option<NotePitch>,
    /// Consecutive silent frames since the last detection
    silent_frames: u32,
}

impl Default for ExerciseSequencer {
    fn default() -> Self {
        Self {
            config: SequencerConfig::default(),
            exercise: None,
            candidate: None,
            candidate_frames: 0,
            latched: None,
            silent_frames: 0,
        }
    }
}

impl ExerciseSequencer {
    pub fn new(config: SequencerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Starts (or restarts) an exercise at its first note.
    pub fn begin(&mut self, sequence: TargetSequence) -> ExerciseEvent {
        let exercise = ExerciseState { sequence, cursor: 0 };
        let expected = exercise.expected();
        self.exercise = Some(exercise);
        self.release();
        ExerciseEvent::Listening { expected }
    }

    /// Back to `Idle` with the cursor at 0.
    pub fn reset(&mut self) {
        self.exercise = None;
        self.release();
    }

    pub fn state(&self) -> SequencerState {
        match &self.exercise {
            Some(exercise) => SequencerState::Listening {
                expected: exercise.expected(),
            },
            None => SequencerState::Idle,
        }
    }

    pub fn cursor(&self) -> usize {
        self.exercise.as_ref().map_or(0, |e| e.cursor)
    }

    pub fn expected(&self) -> Option<NotePitch> {
        self.exercise.as_ref().map(ExerciseState::expected)
    }

    pub fn sequence(&self) -> Option<&TargetSequence> {
        self.exercise.as_ref().map(|e| &e.sequence)
    }

    /// Judges one detection. `None` is silence: it emits nothing, restarts
    /// the stability count and, once `release_frames` silent frames have been
    /// seen in a row, releases the hold on the last judged note.
    pub fn evaluate(&mut self, played: Option<NotePitch>) -> Option<ExerciseEvent> {
        self.exercise.as_ref()?;

        let Some(note) = played else {
            self.candidate = None;
            self.candidate_frames = 0;
            self.silent_frames = self.silent_frames.saturating_add(1);
            if self.silent_frames >= self.config.release_frames {
                self.latched = None;
            }
            return None;
        };
        self.silent_frames = 0;
        if self.latched == Some(note) {
            return None;
        }

        if self.candidate == Some(note) {
            self.candidate_frames += 1;
        } else {
            self.candidate = Some(note);
            self.candidate_frames = 1;
        }
        if self.candidate_frames < self.config.min_stable_frames {
            return None;
        }

        self.candidate = None;
        self.candidate_frames = 0;
        self.latched = Some(note);
        self.judge(note)
    }

    fn judge(&mut self, played: NotePitch) -> Option<ExerciseEvent> {
        let exercise = self.exercise.as_mut()?;
        let expected = exercise.expected();
        if played != expected {
            return Some(ExerciseEvent::Incorrect { played, expected });
        }

        let len = exercise.sequence.len();
        let next = if exercise.cursor + 1 == len {
            NextNote::SequenceComplete
        } else {
            NextNote::Note(exercise.sequence.0[exercise.cursor + 1])
        };
        exercise.cursor = (exercise.cursor + 1) % len;
        Some(ExerciseEvent::Correct { played, next })
    }

    fn release(&mut self) {
        self.candidate = None;
        self.candidate_frames = 0;
        self.latched = None;
        self.silent_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(s: &str) -> NotePitch {
        s.parse().unwrap()
    }

    fn started(sequence: &str) -> ExerciseSequencer {
        let mut sequencer = ExerciseSequencer::default();
        sequencer.begin(TargetSequence::parse(sequence).unwrap());
        sequencer
    }

    fn play(sequencer: &mut ExerciseSequencer, notes: &[&str]) -> Vec<ExerciseEvent> {
        notes
            .iter()
            .filter_map(|n| sequencer.evaluate(Some(note(n))))
            .collect()
    }

    #[test]
    fn test_full_sequence_wraps_to_start() {
        let mut sequencer = started("C4 D4 E4");
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
        assert_eq!(sequencer.state(), SequencerState::Listening { expected: note("C4") });
    }

    #[test]
    fn test_sustained_note_advances_once() {
        let mut sequencer = started("C4 D4");
        let events = play(&mut sequencer, &["C4", "C4"]);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ExerciseEvent::Correct { .. }));
        assert_eq!(sequencer.expected(), Some(note("D4")));

        let events = play(&mut sequencer, &["D4"]);
        assert!(matches!(events[0], ExerciseEvent::Correct { next: NextNote::SequenceComplete, .. }));
    }

    #[test]
    fn test_wrong_note_keeps_cursor() {
        let mut sequencer = started("C4 D4");
        let events = play(&mut sequencer, &["G4"]);
        assert_eq!(
            events,
            vec![ExerciseEvent::Incorrect { played: note("G4"), expected: note("C4") }]
        );
        assert_eq!(sequencer.cursor(), 0);

        // Holding the wrong note does not repeat the verdict.
        assert!(play(&mut sequencer, &["G4", "G4"]).is_empty());
    }

    #[test]
    fn test_silence_is_never_judged() {
        let mut sequencer = started("C4");
        for _ in 0..10 {
            assert_eq!(sequencer.evaluate(None), None);
        }
        assert_eq!(sequencer.cursor(), 0);
    }

    #[test]
    fn test_silence_releases_repeated_note() {
        let mut sequencer = started("C4 C4 D4");
        assert!(sequencer.evaluate(Some(note("C4"))).is_some());
        assert!(sequencer.evaluate(Some(note("C4"))).is_none());
        assert!(sequencer.evaluate(None).is_none());
        assert!(matches!(
            sequencer.evaluate(Some(note("C4"))),
            Some(ExerciseEvent::Correct { next: NextNote::Note(n), .. }) if n == note("D4")
        ));
        assert_eq!(sequencer.cursor(), 2);
    }

    #[test]
    fn test_reset_then_replay_is_cyclic() {
        let notes = ["E4", "G4", "C5", "A4", "F#4"];
        let mut sequencer = started(&notes.join(" "));
        play(&mut sequencer, &["E4", "G4"]);
        assert_eq!(sequencer.cursor(), 2);

        sequencer.reset();
        assert_eq!(sequencer.state(), SequencerState::Idle);
        assert_eq!(sequencer.cursor(), 0);

        sequencer.begin(TargetSequence::parse(&notes.join(" ")).unwrap());
        let events = play(&mut sequencer, &notes);
        assert_eq!(events.len(), notes.len());
        assert!(events.iter().all(|e| matches!(e, ExerciseEvent::Correct { .. })));
        assert_eq!(sequencer.cursor(), 0);
    }

    #[test]
    fn test_idle_ignores_everything() {
        let mut sequencer = ExerciseSequencer::default();
        assert_eq!(sequencer.evaluate(Some(note("C4"))), None);
        assert_eq!(sequencer.state(), SequencerState::Idle);
        assert_eq!(sequencer.expected(), None);
    }

    #[test]
    fn test_stable_frames_gate_judgement() {
        let config = SequencerConfig {
            min_stable_frames: 3,
            ..SequencerConfig::default()
        };
        let mut sequencer = ExerciseSequencer::new(config).unwrap();
        sequencer.begin(TargetSequence::parse("C4 D4").unwrap());

        // A flicker of a wrong note never reaches the verdict.
        assert!(play(&mut sequencer, &["C#4", "C4", "C4"]).is_empty());
        let events = play(&mut sequencer, &["C4", "C4", "C4"]);
        assert_eq!(events.len(), 1);
        assert_eq!(sequencer.cursor(), 1);

        // Silence restarts the count.
        assert!(play(&mut sequencer, &["D4", "D4"]).is_empty());
        sequencer.evaluate(None);
        assert!(play(&mut sequencer, &["D4", "D4"]).is_empty());
        assert_eq!(play(&mut sequencer, &["D4"]).len(), 1);
        assert_eq!(sequencer.cursor(), 0);
    }

    #[test]
    fn test_begin_returns_listening() {
        let mut sequencer = ExerciseSequencer::default();
        let event = sequencer.begin(TargetSequence::parse("A3, B3").unwrap());
        assert_eq!(event, ExerciseEvent::Listening { expected: note("A3") });
    }

    #[test]
    fn test_sequence_parsing() {
        assert!(matches!(TargetSequence::parse("  "), Err(ConfigError::EmptySequence)));
        assert!(matches!(TargetSequence::parse("C4 X4"), Err(ConfigError::Note(_))));
        let sequence = TargetSequence::parse("C4,Eb4  G4").unwrap();
        assert_eq!(sequence.to_string(), "C4 D#4 G4");
        assert_eq!(sequence.len(), 3);
    }

    #[test]
    fn test_zero_stable_frames_rejected() {
        let config = SequencerConfig {
            min_stable_frames: 0,
            ..SequencerConfig::default()
        };
        assert!(ExerciseSequencer::new(config).is_err());
        let config = SequencerConfig {
            release_frames: 0,
            ..SequencerConfig::default()
        };
        assert!(matches!(ExerciseSequencer::new(config), Err(ConfigError::InvalidReleaseFrames)));
    }

    fn held(release_frames: u32) -> ExerciseSequencer {
        let mut sequencer = ExerciseSequencer::new(SequencerConfig {
            min_stable_frames: 3,
            release_frames,
        })
        .unwrap();
        sequencer.begin(TargetSequence::parse("C4 D4").unwrap());
        sequencer
    }

    fn feed(sequencer: &mut ExerciseSequencer, notes: &[Option<&str>]) -> Vec<ExerciseEvent> {
        notes
            .iter()
            .filter_map(|n| sequencer.evaluate(n.map(note)))
            .collect()
    }

    #[test]
    fn test_dropout_inside_held_note_is_not_a_new_onset() {
        let c4 = Some("C4");
        let mut sequencer = held(3);
        let events = feed(&mut sequencer, &[c4, c4, c4, None, c4, c4, c4]);
        assert_eq!(
            events,
            vec![ExerciseEvent::Correct { played: note("C4"), next: NextNote::Note(note("D4")) }]
        );
        assert_eq!(sequencer.cursor(), 1);

        // Two missing frames are still inside the note.
        assert!(feed(&mut sequencer, &[None, None, c4, c4, c4]).is_empty());
    }

    #[test]
    fn test_release_frames_of_silence_end_the_note() {
        let c4 = Some("C4");
        let mut sequencer = held(3);
        feed(&mut sequencer, &[c4, c4, c4]);

        let events = feed(&mut sequencer, &[None, None, None, c4, c4, c4]);
        assert_eq!(
            events,
            vec![ExerciseEvent::Incorrect { played: note("C4"), expected: note("D4") }]
        );
        assert_eq!(sequencer.cursor(), 1);
    }
}
