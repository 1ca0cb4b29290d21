//! # Musical Tuning Module
//!
//! Converts between frequencies, MIDI numbers and note names in twelve-tone
//! equal temperament. This is the `PitchToNoteMapper` stage of the practice
//! pipeline: a continuous frequency estimate goes in, a discrete [`NotePitch`]
//! comes out (or nothing, when the estimate is unusable).
//!
//! ## Features
//! - Scientific pitch notation parsing and display (`"C#4"`, `"Bb3"`)
//! - Nearest-semitone rounding with a configurable A4 reference
//! - Range and confidence gating so silence never maps to a wrong note
//! - Cent deviation for the live readout

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::config::MapperConfig;
use crate::error::{ConfigError, NoteParseError};
use crate::pitch::PitchEstimate;

/// Pitch-class names, indexed by `midi mod 12`.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// MIDI number of A4.
const A4_MIDI: i32 = 69;

/// One of the twelve pitch classes, spelled with sharps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitones above C (0..12).
    pub fn index(self) -> i32 {
        self as i32
    }

    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(12) as usize]
    }

    pub fn name(self) -> &'static str {
        NOTE_NAMES[self as usize]
    }

    /// Position of the natural letter within the octave (C=0 .. B=6).
    pub fn letter_index(self) -> i32 {
        match self {
            PitchClass::C | PitchClass::CSharp => 0,
            PitchClass::D | PitchClass::DSharp => 1,
            PitchClass::E => 2,
            PitchClass::F | PitchClass::FSharp => 3,
            PitchClass::G | PitchClass::GSharp => 4,
            PitchClass::A | PitchClass::ASharp => 5,
            PitchClass::B => 6,
        }
    }

    pub fn is_sharp(self) -> bool {
        self.name().len() == 2
    }
}

/// A discrete musical pitch: pitch class plus octave.
///
/// Equality is exact (name and octave). Ordering follows the underlying MIDI
/// number, so `B3 < C4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NotePitch {
    pub class: PitchClass,
    pub octave: i32,
}

impl NotePitch {
    pub fn new(class: PitchClass, octave: i32) -> Self {
        Self { class, octave }
    }

    /// `name = NOTE_NAMES[m mod 12]`, `octave = floor(m / 12) - 1`.
    pub fn from_midi(midi: i32) -> Self {
        Self {
            class: PitchClass::from_index(midi.rem_euclid(12)),
            octave: midi.div_euclid(12) - 1,
        }
    }

    pub fn midi(self) -> i32 {
        (self.octave + 1) * 12 + self.class.index()
    }

    pub fn name(self) -> &'static str {
        self.class.name()
    }

    /// Equal-tempered frequency of this note for the given A4 reference.
    pub fn frequency(self, a4_hz: f32) -> f32 {
        midi_to_frequency(self.midi(), a4_hz)
    }
}

impl PartialOrd for NotePitch {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NotePitch {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.midi().cmp(&other.midi())
    }
}

impl fmt::Display for NotePitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name(), self.octave)
    }
}

/// Spelling → semitone offset from C of the same written octave.
///
/// Flats and the enharmonic edge spellings (`Cb`, `B#`, `E#`, `Fb`) are
/// accepted on input and normalized to the sharp spelling.
static SPELLINGS: Lazy<BTreeMap<&'static str, i32>> = Lazy::new(|| {
    let mut map: BTreeMap<&'static str, i32> = NOTE_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, i as i32))
        .collect();
    for (flat, offset) in [
        ("Cb", -1),
        ("Db", 1),
        ("Eb", 3),
        ("Fb", 4),
        ("Gb", 6),
        ("Ab", 8),
        ("Bb", 10),
        ("B#", 12),
        ("E#", 5),
    ] {
        map.insert(flat, offset);
    }
    map
});

impl FromStr for NotePitch {
    type Err = NoteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = || NoteParseError(s.to_string());

        let split = trimmed
            .find(|c: char| c.is_ascii_digit() || c == '-')
            .ok_or_else(err)?;
        let (spelling, octave) = trimmed.split_at(split);

        // Accept lower-case letters and unicode accidentals.
        let mut normalized = String::with_capacity(2);
        let mut chars = spelling.chars();
        normalized.push(chars.next().ok_or_else(err)?.to_ascii_uppercase());
        for c in chars {
            normalized.push(match c {
                '♯' => '#',
                '♭' => 'b',
                other => other,
            });
        }

        let offset = *SPELLINGS.get(normalized.as_str()).ok_or_else(err)?;
        let octave: i32 = octave.parse().map_err(|_| err())?;
        Ok(NotePitch::from_midi((octave + 1) * 12 + offset))
    }
}

impl TryFrom<String> for NotePitch {
    type Error = NoteParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NotePitch> for String {
    fn from(note: NotePitch) -> Self {
        note.to_string()
    }
}

/// Frequency in Hz of a (possibly out-of-range) MIDI number.
pub fn midi_to_frequency(midi: i32, a4_hz: f32) -> f32 {
    a4_hz * 2.0_f32.powf((midi - A4_MIDI) as f32 / 12.0)
}

/// Nearest MIDI number to a frequency: `round(12 * log2(f / a4) + 69)`.
///
/// Returns `None` for non-finite or non-positive input.
pub fn frequency_to_midi(freq: f32, a4_hz: f32) -> Option<i32> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    let midi = (12.0 * (freq / a4_hz).log2() + A4_MIDI as f32).round();
    midi.is_finite().then_some(midi as i32)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Maps continuous pitch estimates onto discrete notes.
#[derive(Debug, Clone)]
pub struct NoteMapper {
    a4_hz: f32,
    lowest: i32,
    highest: i32,
    min_confidence: f32,
}

impl NoteMapper {
    /// Builds a mapper from its config and the detector's confidence threshold.
    pub fn new(config: &MapperConfig, min_confidence: f32) -> Result<Self, ConfigError> {
        config.validate()?;
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(ConfigError::OutOfUnitRange {
                name: "confidence_threshold",
                value: min_confidence,
            });
        }
        Ok(Self {
            a4_hz: config.reference_a4_hz,
            lowest: config.lowest_note.midi(),
            highest: config.highest_note.midi(),
            min_confidence,
        })
    }

    pub fn reference_a4(&self) -> f32 {
        self.a4_hz
    }

    /// Nearest equal-tempered note to a frequency.
    ///
    /// # Arguments
    /// * `freq` - Detected frequency in Hz, `None` for silence
    ///
    /// # Returns
    /// * The note whose MIDI number is `round(12 * log2(freq / a4) + 69)`, or
    ///   `None` when the input is absent, not positive, or rounds outside the
    ///   configured note range
    pub fn map_frequency(&self, freq: Option<f32>) -> Option<NotePitch> {
        let midi = frequency_to_midi(freq?, self.a4_hz)?;
        (self.lowest..=self.highest)
            .contains(&midi)
            .then(|| NotePitch::from_midi(midi))
    }

    /// Like [`map_frequency`](Self::map_frequency), but also rejects estimates
    /// whose confidence is below the threshold.
    pub fn map_estimate(&self, estimate: &PitchEstimate) -> Option<NotePitch> {
        if estimate.confidence < self.min_confidence {
            return None;
        }
        self.map_frequency(estimate.frequency_hz)
    }

    /// Cent offset of `freq` from the equal-tempered frequency of `note`.
    pub fn cents_from(&self, freq: f32, note: NotePitch) -> f32 {
        calculate_cents_deviation(freq, note.frequency(self.a4_hz))
    }
}

impl Default for NoteMapper {
    fn default() -> Self {
        let config = MapperConfig::default();
        Self {
            a4_hz: config.reference_a4_hz,
            lowest: config.lowest_note.midi(),
            highest: config.highest_note.midi(),
            min_confidence: crate::config::DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}
