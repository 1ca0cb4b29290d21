//! # Feedback Presenter
//!
//! Renders exercise events into short user-facing messages and hands them to
//! a sink. Sinks must not block: the presenter is called from the processing
//! worker, right after a frame is judged.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::CaptureError;
use crate::exercise::{ExerciseEvent, NextNote};

/// Visual category of a feedback message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackCategory {
    Info,
    Correct,
    Incorrect,
    Error,
}

/// One status update for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub message: String,
    pub category: FeedbackCategory,
}

impl Feedback {
    pub fn new(message: impl Into<String>, category: FeedbackCategory) -> Self {
        Self {
            message: message.into(),
            category,
        }
    }
}

/// Destination for feedback. Implementations must return promptly.
pub trait FeedbackSink: Send + Sync {
    fn publish(&self, feedback: Feedback);
}

impl<F> FeedbackSink for F
where
    F: Fn(Feedback) + Send + Sync,
{
    fn publish(&self, feedback: Feedback) {
        self(feedback)
    }
}

/// Last-write-wins slot that a UI polls.
///
/// Each publish replaces the previous message; nothing is queued. The
/// revision counter lets a poller skip redraws when nothing changed.
#[derive(Debug, Default)]
pub struct LatestFeedback {
    slot: Mutex<Option<Feedback>>,
    revision: AtomicU64,
}

impl LatestFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Feedback> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Bumped on every publish.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }
}

impl FeedbackSink for LatestFeedback {
    fn publish(&self, feedback: Feedback) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(feedback);
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}

/// Formats engine events and session notices for a [`FeedbackSink`].
#[derive(Clone)]
pub struct FeedbackPresenter {
    sink: std::sync::Arc<dyn FeedbackSink>,
}

impl std::fmt::Debug for FeedbackPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackPresenter").finish_non_exhaustive()
    }
}

impl FeedbackPresenter {
    pub fn new(sink: std::sync::Arc<dyn FeedbackSink>) -> Self {
        Self { sink }
    }

    pub fn present(&self, event: &ExerciseEvent) {
        self.sink.publish(describe(event));
    }

    pub fn stopped(&self) {
        self.sink.publish(Feedback::new("Practice stopped", FeedbackCategory::Info));
    }

    pub fn capture_failed(&self, error: &CaptureError) {
        self.sink.publish(Feedback::new(
            format!("Unable to access the microphone: {error}. Please check permissions."),
            FeedbackCategory::Error,
        ));
    }

    pub fn stream_failed(&self, error: &CaptureError) {
        self.sink.publish(Feedback::new(
            format!("Audio input problem: {error}"),
            FeedbackCategory::Error,
        ));
    }
}

/// The message and category shown for an exercise event.
pub fn describe(event: &ExerciseEvent) -> Feedback {
    match event {
        ExerciseEvent::Listening { expected } => Feedback::new(
            format!("Listening... play {expected}"),
            FeedbackCategory::Info,
        ),
        ExerciseEvent::Correct { next: NextNote::Note(next), .. } => Feedback::new(
            format!("Correct! Next note: {next}"),
            FeedbackCategory::Correct,
        ),
        ExerciseEvent::Correct { next: NextNote::SequenceComplete, .. } => Feedback::new(
            "Correct! Sequence complete!",
            FeedbackCategory::Correct,
        ),
        ExerciseEvent::Incorrect { played, expected } => Feedback::new(
            format!("Incorrect: played {played}, expected {expected}"),
            FeedbackCategory::Incorrect,
        ),
    }
}
