// practice-core/src/lib.rs

//! The core logic for the pitch practice trainer.
//! This crate captures microphone audio, estimates the pitch being played,
//! names it, and judges it against an expected note sequence. It also lays
//! the sequence out as staff notation. It is completely headless
//! and contains no GUI code.

pub mod audio;
pub mod config;
pub mod error;
pub mod exercise;
pub mod feedback;
pub mod fft;
pub mod notation;
pub mod pipeline;
pub mod pitch;
pub mod session;
pub mod tuning;

pub use audio::{AudioFrame, CpalInput, InputSource};
pub use config::{DetectorConfig, MapperConfig, PracticeConfig, SequencerConfig};
pub use error::{CaptureError, ConfigError, NoteParseError};
pub use exercise::{ExerciseEvent, ExerciseSequencer, NextNote, TargetSequence};
pub use feedback::{Feedback, FeedbackCategory, FeedbackPresenter, FeedbackSink, LatestFeedback};
pub use notation::{layout_staff, NotationRenderer, NotationView, StaffLayout, StaffNote};
pub use pipeline::{FrameReport, PracticePipeline};
pub use pitch::{PitchEstimate, PitchEstimator};
pub use session::{PracticeSession, PracticeStatus, StopHandle};
pub use tuning::{NoteMapper, NotePitch, PitchClass};
