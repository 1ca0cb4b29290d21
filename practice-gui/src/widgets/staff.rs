//! # Staff Widget
//!
//! Draws a [`StaffLayout`] on an iced canvas. The staff and notes are cached
//! geometry, rebuilt only when a new layout is rendered. The highlight on the
//! expected note is a separate overlay redrawn every frame.

use iced::widget::canvas::{self, Cache, Geometry, Path, Stroke, Text};
use iced::widget::container;
use iced::{mouse, Color, Element, Length, Pixels, Point, Rectangle, Renderer, Size, Theme};
use practice_core::notation::{StaffLayout, CANVAS_HEIGHT};
use practice_core::NotationRenderer;

/// Distance between two staff lines at canvas scale 1.
const LINE_SPACING: f32 = 12.0;
/// Y of the top staff line at canvas scale 1.
const STAFF_TOP: f32 = 70.0;
const HEAD_RADIUS: f32 = 6.0;
const STEM_LENGTH: f32 = 3.5 * LINE_SPACING;
const LEDGER_HALF_WIDTH: f32 = 11.0;

const INK: Color = Color::from_rgb(0.9, 0.9, 0.9);
const HIGHLIGHT: Color = Color::from_rgba(0.3, 0.6, 1.0, 0.35);

#[derive(Default)]
pub struct StaffCanvas {
    layout: Option<StaffLayout>,
    highlight: Option<usize>,
    cache: Cache,
}

impl StaffCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the note at `index` as the one being listened for.
    pub fn set_highlight(&mut self, index: Option<usize>) {
        self.highlight = index;
    }

    pub fn view(&self) -> Element<'_, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(Length::Fill)
                .height(Length::Fixed(CANVAS_HEIGHT)),
        )
        .width(Length::Fill)
        .into()
    }
}

impl NotationRenderer for StaffCanvas {
    fn render(&mut self, layout: &StaffLayout) {
        self.layout = Some(layout.clone());
        self.cache.clear();
    }
}

/// Maps layout units onto the canvas bounds, keeping the aspect ratio.
#[derive(Debug, Clone, Copy)]
struct Scale(f32);

impl Scale {
    fn fit(layout: &StaffLayout, bounds: Size) -> Self {
        if layout.width <= 0.0 {
            return Scale(1.0);
        }
        Scale((bounds.width / layout.width).min(bounds.height / CANVAS_HEIGHT))
    }

    fn point(self, x: f32, y: f32) -> Point {
        Point::new(x * self.0, y * self.0)
    }

    fn step_y(self, step: i32) -> f32 {
        StaffLayout::step_y(step, STAFF_TOP, LINE_SPACING)
    }
}

fn draw_staff(frame: &mut canvas::Frame, layout: &StaffLayout, scale: Scale) {
    let line = Stroke::default().with_color(INK).with_width(1.0);
    let left = layout.stave_x;
    let right = layout.stave_x + layout.stave_width;

    for step in StaffLayout::line_steps() {
        let y = scale.step_y(step);
        frame.stroke(&Path::line(scale.point(left, y), scale.point(right, y)), line);
    }
    for x in [left, right] {
        let top = scale.point(x, scale.step_y(8));
        let bottom = scale.point(x, scale.step_y(0));
        frame.stroke(&Path::line(top, bottom), line);
    }

    frame.fill_text(Text {
        content: "𝄞".to_string(),
        position: scale.point(left + 8.0, scale.step_y(11)),
        color: INK,
        size: Pixels(7.0 * LINE_SPACING * scale.0),
        ..Text::default()
    });

    for note in &layout.notes {
        let y = scale.step_y(note.step);
        let head = Path::circle(scale.point(note.x, y), HEAD_RADIUS * scale.0);
        if note.duration.is_filled() {
            frame.fill(&head, INK);
        } else {
            frame.stroke(&head, Stroke::default().with_color(INK).with_width(1.5));
        }

        for &ledger in &note.ledger_steps {
            let ly = scale.step_y(ledger);
            frame.stroke(
                &Path::line(
                    scale.point(note.x - LEDGER_HALF_WIDTH, ly),
                    scale.point(note.x + LEDGER_HALF_WIDTH, ly),
                ),
                line,
            );
        }

        if note.duration.has_stem() {
            let (x, end) = if note.stem_up {
                (note.x + HEAD_RADIUS, y - STEM_LENGTH)
            } else {
                (note.x - HEAD_RADIUS, y + STEM_LENGTH)
            };
            frame.stroke(&Path::line(scale.point(x, y), scale.point(x, end)), line);
        }

        if let Some(accidental) = note.accidental {
            frame.fill_text(Text {
                content: accidental.symbol().to_string(),
                position: scale.point(note.x - 3.0 * HEAD_RADIUS, y - LINE_SPACING),
                color: INK,
                size: Pixels(2.0 * LINE_SPACING * scale.0),
                ..Text::default()
            });
        }
    }
}

impl<Message> canvas::Program<Message> for StaffCanvas {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let Some(layout) = &self.layout else {
            return vec![];
        };
        if !bounds.width.is_finite() || !bounds.height.is_finite() {
            return vec![];
        }
        let scale = Scale::fit(layout, bounds.size());

        let staff = self
            .cache
            .draw(renderer, bounds.size(), |frame| draw_staff(frame, layout, scale));

        let mut overlay = canvas::Frame::new(renderer, bounds.size());
        if let Some(note) = self.highlight.and_then(|i| layout.notes.get(i)) {
            let top = scale.step_y(note.step.max(8) + 2);
            let bottom = scale.step_y(note.step.min(0) - 2);
            overlay.fill(
                &Path::rectangle(
                    scale.point(note.x - 2.0 * HEAD_RADIUS, top),
                    Size::new(4.0 * HEAD_RADIUS * scale.0, (bottom - top) * scale.0),
                ),
                HIGHLIGHT,
            );
        }

        vec![staff, overlay.into_geometry()]
    }
}
