//! # Practice Pipeline
//!
//! The per-frame path: estimator → note mapper → sequencer. One pipeline
//! instance belongs to exactly one worker and processes frames one at a time;
//! `process` takes `&mut self`, so a frame can never be analysed while the
//! previous one is still in flight.

use crate::audio::AudioFrame;
use crate::config::PracticeConfig;
use crate::error::ConfigError;
use crate::exercise::{ExerciseEvent, ExerciseSequencer, TargetSequence};
use crate::pitch::{PitchEstimate, PitchEstimator};
use crate::tuning::{NoteMapper, NotePitch};

/// Everything learned from one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub estimate: PitchEstimate,
    pub note: Option<NotePitch>,
    /// Deviation of the estimate from `note`, in cents
    pub cents: Option<f32>,
    pub event: Option<ExerciseEvent>,
}

#[derive(Debug)]
pub struct PracticePipeline {
    estimator: PitchEstimator,
    mapper: NoteMapper,
    sequencer: ExerciseSequencer,
}

impl PracticePipeline {
    /// Builds the pipeline for a stream running at `sample_rate`.
    ///
    /// # Arguments
    /// * `config` - Detector, mapper and sequencer settings
    /// * `sample_rate` - Rate the input actually delivers, which may differ
    ///   from `config.detector.sample_rate`
    ///
    /// # Returns
    /// * The pipeline, idle until [`begin`](Self::begin), or the first
    ///   setting that is invalid at this rate
    pub fn new(config: &PracticeConfig, sample_rate: u32) -> Result<Self, ConfigError> {
        let detector = config.detector.with_sample_rate(sample_rate)?;
        let mapper = NoteMapper::new(&config.mapper, detector.confidence_threshold)?;
        Ok(Self {
            estimator: PitchEstimator::new(detector)?,
            mapper,
            sequencer: ExerciseSequencer::new(config.sequencer.clone())?,
        })
    }

    /// Starts the exercise and returns the initial `Listening` event.
    pub fn begin(&mut self, sequence: TargetSequence) -> ExerciseEvent {
        self.estimator.reset();
        self.sequencer.begin(sequence)
    }

    pub fn reset(&mut self) {
        self.estimator.reset();
        self.sequencer.reset();
    }

    pub fn sequencer(&self) -> &ExerciseSequencer {
        &self.sequencer
    }

    pub fn process(&mut self, frame: &AudioFrame) -> FrameReport {
        let estimate = self.estimator.process(frame);
        let note = self.mapper.map_estimate(&estimate);
        let cents = match (estimate.frequency_hz, note) {
            (Some(freq), Some(note)) => Some(self.mapper.cents_from(freq, note)),
            _ => None,
        };
        let event = self.sequencer.evaluate(note);
        FrameReport {
            estimate,
            note,
            cents,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SequencerConfig;
    use crate::exercise::NextNote;

    const RATE: u32 = 44_100;

    /// Continuous-phase tone generator so hops join without clicks.
    struct Tone {
        phase: f32,
    }

    impl Tone {
        fn frames(&mut self, freq: f32, hops: usize, hop: usize, first_index: u64) -> Vec<AudioFrame> {
            (0..hops)
                .map(|h| {
                    let samples: Vec<f32> = (0..hop)
                        .map(|_| {
                            let s = 0.5 * self.phase.sin();
                            self.phase = (self.phase + 2.0 * std::f32::consts::PI * freq / RATE as f32)
                                % (2.0 * std::f32::consts::PI);
                            s
                        })
                        .collect();
                    AudioFrame::new(samples, first_index + h as u64)
                })
                .collect()
        }
    }

    fn silence(hops: usize, hop: usize) -> Vec<AudioFrame> {
        (0..hops).map(|i| AudioFrame::new(vec![0.0; hop], i as u64)).collect()
    }

    fn pipeline(stable: u32) -> PracticePipeline {
        let config = PracticeConfig {
            sequencer: SequencerConfig {
                min_stable_frames: stable,
                ..SequencerConfig::default()
            },
            ..PracticeConfig::default()
        };
        PracticePipeline::new(&config, RATE).unwrap()
    }

    fn events(pipeline: &mut PracticePipeline, frames: &[AudioFrame]) -> Vec<ExerciseEvent> {
        frames.iter().filter_map(|f| pipeline.process(f).event).collect()
    }

    fn note(s: &str) -> NotePitch {
        s.parse().unwrap()
    }

    #[test]
    fn test_played_scale_advances_once_per_note() {
        let mut pipeline = pipeline(3);
        let sequence = TargetSequence::parse("C4 D4 E4").unwrap();
        pipeline.begin(sequence.clone());

        let hop = 512;
        let mut tone = Tone { phase: 0.0 };
        let mut all = Vec::new();
        for n in sequence.notes() {
            // Each note is sustained for many hops, separated by silence.
            all.extend(events(&mut pipeline, &tone.frames(n.frequency(440.0), 24, hop, 0)));
            all.extend(events(&mut pipeline, &silence(8, hop)));
        }

        assert_eq!(
            all,
            vec![
                ExerciseEvent::Correct { played: note("C4"), next: NextNote::Note(note("D4")) },
                ExerciseEvent::Correct { played: note("D4"), next: NextNote::Note(note("E4")) },
                ExerciseEvent::Correct { played: note("E4"), next: NextNote::SequenceComplete },
            ]
        );
        assert_eq!(pipeline.sequencer().cursor(), 0);
    }

    #[test]
    fn test_wrong_note_reported_once() {
        let mut pipeline = pipeline(3);
        pipeline.begin(TargetSequence::parse("C4 D4").unwrap());
        let mut tone = Tone { phase: 0.0 };
        let all = events(&mut pipeline, &tone.frames(note("G4").frequency(440.0), 30, 512, 0));
        assert_eq!(
            all,
            vec![ExerciseEvent::Incorrect { played: note("G4"), expected: note("C4") }]
        );
        assert_eq!(pipeline.sequencer().cursor(), 0);
    }

    #[test]
    fn test_silence_produces_no_events() {
        let mut pipeline = pipeline(1);
        pipeline.begin(TargetSequence::parse("C4").unwrap());
        for frame in silence(40, 512) {
            let report = pipeline.process(&frame);
            assert_eq!(report.note, None);
            assert_eq!(report.event, None);
        }
    }

    #[test]
    fn test_report_carries_cents() {
        let mut pipeline = pipeline(1);
        pipeline.begin(TargetSequence::parse("A4").unwrap());
        let mut tone = Tone { phase: 0.0 };
        let report = tone
            .frames(440.0, 6, 512, 0)
            .iter()
            .map(|f| pipeline.process(f))
            .last()
            .unwrap();
        assert_eq!(report.note, Some(note("A4")));
        assert!(report.cents.unwrap().abs() < 10.0);
    }

    #[test]
    fn test_builds_at_device_rate() {
        let config = PracticeConfig::default();
        assert!(PracticePipeline::new(&config, 48_000).is_ok());
        assert!(PracticePipeline::new(&config, 4_000).is_err());
    }
}
