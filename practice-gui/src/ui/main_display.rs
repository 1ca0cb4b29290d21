//! # Main Display Module
//!
//! This module contains the main layout for the pitch practice application:
//! staff, feedback banner, live readout and the practice controls.

use iced::widget::{button, column, container, horizontal_space, row, text, Space};
use iced::{Alignment, Element, Length};

use super::feedback_banner;
use crate::widgets::staff::StaffCanvas;
use crate::{AppDisplayData, Message};

/// Creates the complete main application view
pub fn create_main_view<'a>(data: &'a AppDisplayData, staff: &'a StaffCanvas) -> Element<'a, Message> {
    let title = text("Pitch Practice").size(28);
    let sequence = text(format!("Sequence: {}", data.sequence)).size(14);

    let main_content = column![
        row![title, horizontal_space(), create_controls(data)].align_y(Alignment::Center),
        sequence,
        Space::with_height(10),
        staff.view(),
        Space::with_height(10),
        feedback_banner::view(data.feedback.as_ref()),
        Space::with_height(10),
        create_readout_panel(data),
    ]
    .spacing(5)
    .padding(20);

    container(main_content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

/// Start/stop buttons, each enabled only when it can act.
fn create_controls(data: &AppDisplayData) -> Element<'static, Message> {
    let start = button(text("Start practice").size(16))
        .padding([6, 12])
        .on_press_maybe((!data.active).then_some(Message::StartPractice));
    let stop = button(text("Stop practice").size(16))
        .padding([6, 12])
        .on_press_maybe(data.active.then_some(Message::StopPractice));

    row![start, stop].spacing(10).into()
}

/// Detected note, frequency, cents and confidence.
fn create_readout_panel(data: &AppDisplayData) -> Element<'static, Message> {
    let status = &data.status;
    let note = status.last_note.map(|n| n.to_string()).unwrap_or_else(|| "--".to_string());
    let freq = status
        .last_frequency
        .map(|f| format!("{:.2} Hz", f))
        .unwrap_or_else(|| "-- Hz".to_string());
    let cents = status
        .last_cents
        .map(|c| format!("{:+.0} cents", c))
        .unwrap_or_default();
    let confidence = format!("{:.0}%", status.confidence * 100.0);
    let expected = status
        .expected
        .map(|n| format!("Expected: {}", n))
        .unwrap_or_default();

    container(
        column![
            row![
                text("Detected").size(14),
                horizontal_space(),
                text("Confidence").size(14),
            ],
            row![
                text(note).size(24),
                Space::with_width(10),
                text(freq).size(24),
                Space::with_width(10),
                text(cents).size(16),
                horizontal_space(),
                text(confidence).size(16),
            ]
            .align_y(Alignment::Center),
            row![
                text(expected).size(14),
                horizontal_space(),
                text(format!("dropped frames: {}", status.frames_dropped)).size(12),
            ],
        ]
        .spacing(5)
        .padding(15),
    )
    .width(Length::Fill)
    .into()
}
