//! Error types for the practice engine

use thiserror::Error;

/// Failures while acquiring or running the audio input.
///
/// Any of these fails a `start()`. Once running, only the ones for which
/// [`CaptureError::is_fatal`] holds end the session; the rest are reported
/// and capture carries on. Nothing is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The host reports no input device (or the configured one is missing)
    #[error("no input device available")]
    NoInputDevice,

    /// The device exists but offers no f32 stream we can use
    #[error("no supported input configuration near {0} Hz")]
    NoSupportedConfig(u32),

    /// The platform refused access to the microphone
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    /// Device enumeration or configuration query failed
    #[error("input device error: {0}")]
    Device(String),

    /// Building or starting the input stream failed
    #[error("input stream error: {0}")]
    Stream(String),

    /// `start()` was called on a session that is already capturing
    #[error("capture session is already active")]
    AlreadyActive,

    /// The worker thread exited before reporting its startup result
    #[error("capture worker exited unexpectedly")]
    WorkerUnavailable,
}

impl CaptureError {
    /// Whether the input is gone for good, so a running session must end.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::NoInputDevice | CaptureError::PermissionDenied(_)
        )
    }
}

/// Invalid configuration values, rejected at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("window size must be a power of two >= 64, got {0}")]
    InvalidWindowSize(usize),

    #[error("hop size must be in 1..={window}, got {hop}")]
    InvalidHopSize { hop: usize, window: usize },

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("{name} must be within 0.0..=1.0, got {value}")]
    OutOfUnitRange { name: &'static str, value: f32 },

    #[error("invalid frequency range: {min} - {max} Hz")]
    InvalidFrequencyRange { min: f32, max: f32 },

    #[error("window of {window} samples cannot hold two periods of {min} Hz at {sample_rate} Hz")]
    WindowTooShort { window: usize, min: f32, sample_rate: u32 },

    #[error("min_stable_frames must be at least 1")]
    InvalidStableFrames,

    #[error("release_frames must be at least 1")]
    InvalidReleaseFrames,

    #[error("target sequence must contain at least one note")]
    EmptySequence,

    #[error(transparent)]
    Note(#[from] NoteParseError),

    #[error("malformed practice configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read practice configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// A note name that does not follow scientific pitch notation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid note name {0:?}, expected something like \"C#4\" or \"Bb3\"")]
pub struct NoteParseError(pub String);
