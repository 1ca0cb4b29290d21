//! # Configuration
//!
//! Explicit, validated configuration for every stage of the practice engine.
//! All structs deserialize from JSON with per-field defaults, so a
//! `practice.json` only needs to name what it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::exercise::TargetSequence;
use crate::tuning::{NotePitch, PitchClass};

/// Estimates below this confidence are reported as "no pitch".
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.8;

/// Period-detection algorithm used by the pitch estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    /// YIN with an FFT-computed difference function
    #[default]
    Yin,
}

/// Pitch estimator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub method: DetectionMethod,
    /// Analysis window in samples
    pub window_size: usize,
    /// Samples per delivered frame
    pub hop_size: usize,
    /// Requested capture rate; the device may override it
    pub sample_rate: u32,
    pub confidence_threshold: f32,
    /// YIN absolute threshold on the normalized difference function
    pub yin_threshold: f32,
    /// RMS below which a window counts as silence
    pub silence_rms: f32,
    pub min_frequency: f32,
    pub max_frequency: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            method: DetectionMethod::Yin,
            window_size: 2048,
            hop_size: 512,
            sample_rate: 44_100,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            yin_threshold: 0.15,
            silence_rms: 0.01,
            min_frequency: 60.0,
            max_frequency: 1500.0,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size < 64 || !self.window_size.is_power_of_two() {
            return Err(ConfigError::InvalidWindowSize(self.window_size));
        }
        if self.hop_size == 0 || self.hop_size > self.window_size {
            return Err(ConfigError::InvalidHopSize {
                hop: self.hop_size,
                window: self.window_size,
            });
        }
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("yin_threshold", self.yin_threshold),
            ("silence_rms", self.silence_rms),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }

        let nyquist = self.sample_rate as f32 / 2.0;
        if !(self.min_frequency > 0.0
            && self.min_frequency < self.max_frequency
            && self.max_frequency < nyquist)
        {
            return Err(ConfigError::InvalidFrequencyRange {
                min: self.min_frequency,
                max: self.max_frequency,
            });
        }

        // The longest lag we search must leave room for interpolation.
        let longest_period = (self.sample_rate as f32 / self.min_frequency).ceil() as usize;
        if longest_period + 2 >= self.window_size / 2 {
            return Err(ConfigError::WindowTooShort {
                window: self.window_size,
                min: self.min_frequency,
                sample_rate: self.sample_rate,
            });
        }
        Ok(())
    }

    /// Same settings at the rate the device actually delivered.
    pub fn with_sample_rate(&self, sample_rate: u32) -> Result<Self, ConfigError> {
        let config = Self {
            sample_rate,
            ..self.clone()
        };
        config.validate()?;
        Ok(config)
    }
}

/// Frequency → note mapping settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub reference_a4_hz: f32,
    pub lowest_note: NotePitch,
    pub highest_note: NotePitch,
}

impl Default for MapperConfig {
    fn default() -> Self {
        // Full 88-key piano range, A0 to C8.
        Self {
            reference_a4_hz: 440.0,
            lowest_note: NotePitch::new(PitchClass::A, 0),
            highest_note: NotePitch::new(PitchClass::C, 8),
        }
    }
}

impl MapperConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(400.0..=480.0).contains(&self.reference_a4_hz) {
            return Err(ConfigError::InvalidFrequencyRange {
                min: self.reference_a4_hz,
                max: self.reference_a4_hz,
            });
        }
        if self.lowest_note > self.highest_note {
            return Err(ConfigError::InvalidFrequencyRange {
                min: self.lowest_note.frequency(self.reference_a4_hz),
                max: self.highest_note.frequency(self.reference_a4_hz),
            });
        }
        Ok(())
    }
}

/// Matching and debounce settings for the exercise sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Consecutive identical detections required before a note is judged.
    pub min_stable_frames: u32,
    /// Consecutive silent frames that end a held note, so that playing it
    /// again counts as a new onset.
    pub release_frames: u32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            min_stable_frames: 1,
            release_frames: 1,
        }
    }
}

impl SequencerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_stable_frames == 0 {
            return Err(ConfigError::InvalidStableFrames);
        }
        if self.release_frames == 0 {
            return Err(ConfigError::InvalidReleaseFrames);
        }
        Ok(())
    }
}

/// Everything needed to run a live practice session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    pub detector: DetectorConfig,
    pub mapper: MapperConfig,
    pub sequencer: SequencerConfig,
    /// Notes to play, in order; the exercise repeats when finished
    pub target: Vec<NotePitch>,
    /// Input device name; the host default when absent
    pub input_device: Option<String>,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        let target = ["C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5"]
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect();
        Self {
            detector: DetectorConfig::default(),
            mapper: MapperConfig::default(),
            // At 512-sample hops three frames is roughly 35 ms.
            sequencer: SequencerConfig {
                min_stable_frames: 3,
                release_frames: 3,
            },
            target,
            input_device: None,
        }
    }
}

impl PracticeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector.validate()?;
        self.mapper.validate()?;
        self.sequencer.validate()?;
        TargetSequence::new(self.target.clone())?;
        Ok(())
    }

    pub fn target_sequence(&self) -> Result<TargetSequence, ConfigError> {
        TargetSequence::new(self.target.clone())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
