//! # Staff Notation
//!
//! Lays a target sequence out on a treble staff and hands the layout to a
//! renderer. Layout is pure geometry in staff units; drawing belongs to the
//! GUI. Nothing here runs per audio frame.

use serde::{Deserialize, Serialize};

use crate::exercise::TargetSequence;
use crate::tuning::NotePitch;

pub const CANVAS_WIDTH: f32 = 1000.0;
pub const CANVAS_HEIGHT: f32 = 200.0;
/// Left margin before the stave starts.
pub const STAVE_X: f32 = 50.0;
/// Horizontal room reserved for the clef at the start of the stave.
pub const CLEF_WIDTH: f32 = 100.0;

/// Staff step of the bottom line (E4) and the top line (F5).
const BOTTOM_LINE: i32 = 0;
const TOP_LINE: i32 = 8;
/// Staff step of the middle line (B4); notes below it get stems up.
const MIDDLE_LINE: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteDuration {
    Whole,
    Half,
    #[default]
    Quarter,
    Eighth,
}

impl NoteDuration {
    pub fn beats(self) -> f32 {
        match self {
            NoteDuration::Whole => 4.0,
            NoteDuration::Half => 2.0,
            NoteDuration::Quarter => 1.0,
            NoteDuration::Eighth => 0.5,
        }
    }

    /// Whole notes carry no stem.
    pub fn has_stem(self) -> bool {
        self != NoteDuration::Whole
    }

    /// Whole and half notes are drawn hollow.
    pub fn is_filled(self) -> bool {
        matches!(self, NoteDuration::Quarter | NoteDuration::Eighth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffNote {
    pub pitch: NotePitch,
    #[serde(default)]
    pub duration: NoteDuration,
}

impl From<NotePitch> for StaffNote {
    fn from(pitch: NotePitch) -> Self {
        Self {
            pitch,
            duration: NoteDuration::default(),
        }
    }
}

impl StaffNote {
    /// One quarter note per element of `sequence`.
    pub fn from_sequence(sequence: &TargetSequence) -> Vec<StaffNote> {
        sequence.notes().iter().copied().map(StaffNote::from).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clef {
    Treble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accidental {
    Sharp,
}

impl Accidental {
    pub fn symbol(self) -> &'static str {
        match self {
            Accidental::Sharp => "♯",
        }
    }
}

/// A note with its position on the staff.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedNote {
    pub pitch: NotePitch,
    pub duration: NoteDuration,
    /// Horizontal centre of the note head
    pub x: f32,
    /// Diatonic steps above the bottom line; lines sit on even steps
    pub step: i32,
    pub accidental: Option<Accidental>,
    /// Steps that need a ledger line, nearest the staff first
    pub ledger_steps: Vec<i32>,
    pub stem_up: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaffLayout {
    pub clef: Clef,
    pub width: f32,
    pub stave_x: f32,
    pub stave_width: f32,
    /// Width shared out between the notes
    pub format_width: f32,
    pub notes: Vec<PlacedNote>,
}

impl StaffLayout {
    /// Vertical position of `step` for a staff whose top line is at `top`.
    pub fn step_y(step: i32, top: f32, line_spacing: f32) -> f32 {
        top + (TOP_LINE - step) as f32 * line_spacing / 2.0
    }

    /// Steps of the five staff lines, bottom to top.
    pub fn line_steps() -> impl Iterator<Item = i32> {
        (BOTTOM_LINE..=TOP_LINE).step_by(2)
    }
}

/// Diatonic distance from E4, so E4 = 0, G4 = 2, C4 = -2.
pub fn staff_step(pitch: NotePitch) -> i32 {
    pitch.octave * 7 + pitch.class.letter_index() - (4 * 7 + 2)
}

fn ledger_steps(step: i32) -> Vec<i32> {
    if step < BOTTOM_LINE {
        (step..BOTTOM_LINE).rev().filter(|s| s % 2 == 0).collect()
    } else if step > TOP_LINE {
        (TOP_LINE + 1..=step).filter(|s| s % 2 == 0).collect()
    } else {
        Vec::new()
    }
}

/// Lays `notes` out on a treble stave spanning a canvas `width` wide.
///
/// Each note gets a horizontal division proportional to its duration and is
/// centred within it.
///
/// # Arguments
/// * `notes` - Notes in playing order
/// * `width` - Canvas width in layout units
///
/// # Returns
/// * Stave geometry plus one [`PlacedNote`] per input note, in the same order
pub fn layout_staff(notes: &[StaffNote], width: f32) -> StaffLayout {
    let stave_width = (width - 2.0 * STAVE_X).max(0.0);
    let format_width = (stave_width - CLEF_WIDTH).max(0.0);
    let total_beats: f32 = notes.iter().map(|n| n.duration.beats()).sum();
    let per_beat = if total_beats > 0.0 { format_width / total_beats } else { 0.0 };

    let mut cursor = STAVE_X + CLEF_WIDTH;
    let placed = notes
        .iter()
        .map(|note| {
            let division = note.duration.beats() * per_beat;
            let x = cursor + division / 2.0;
            cursor += division;

            let step = staff_step(note.pitch);
            PlacedNote {
                pitch: note.pitch,
                duration: note.duration,
                x,
                step,
                accidental: note.pitch.class.is_sharp().then_some(Accidental::Sharp),
                ledger_steps: ledger_steps(step),
                stem_up: step < MIDDLE_LINE,
            }
        })
        .collect();

    StaffLayout {
        clef: Clef::Treble,
        width,
        stave_x: STAVE_X,
        stave_width,
        format_width,
        notes: placed,
    }
}

/// A drawing backend for staff layouts.
pub trait NotationRenderer {
    fn render(&mut self, layout: &StaffLayout);
}

/// Drives a renderer, laying out and rendering only when the notes or the
/// width change.
#[derive(Debug)]
pub struct NotationView<R> {
    renderer: R,
    shown: Option<(Vec<StaffNote>, f32)>,
}

impl<R: NotationRenderer> NotationView<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            shown: None,
        }
    }

    /// Returns whether the renderer was invoked.
    pub fn show(&mut self, notes: &[StaffNote], width: f32) -> bool {
        if let Some((shown, shown_width)) = &self.shown {
            if shown.as_slice() == notes && *shown_width == width {
                return false;
            }
        }
        let layout = layout_staff(notes, width);
        self.renderer.render(&layout);
        self.shown = Some((notes.to_vec(), width));
        true
    }

    pub fn show_sequence(&mut self, sequence: &TargetSequence, width: f32) -> bool {
        self.show(&StaffNote::from_sequence(sequence), width)
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}
