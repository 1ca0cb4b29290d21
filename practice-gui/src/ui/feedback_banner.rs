//! # Feedback Banner
//!
//! Shows the latest practice feedback message, tinted by its category.

use iced::widget::{container, text};
use iced::{Background, Border, Color, Element, Length};
use practice_core::{Feedback, FeedbackCategory};

fn category_color(category: FeedbackCategory) -> Color {
    match category {
        FeedbackCategory::Info => Color::from_rgb(0.25, 0.35, 0.55),
        FeedbackCategory::Correct => Color::from_rgb(0.2, 0.6, 0.3),
        FeedbackCategory::Incorrect => Color::from_rgb(0.8, 0.45, 0.1),
        FeedbackCategory::Error => Color::from_rgb(0.8, 0.2, 0.2),
    }
}

pub fn view(feedback: Option<&Feedback>) -> Element<'static, crate::Message> {
    let (message, background) = match feedback {
        Some(feedback) => (feedback.message.clone(), category_color(feedback.category)),
        None => ("Press \"Start practice\" and play the highlighted note".to_string(), Color::from_rgb(0.2, 0.2, 0.2)),
    };

    container(text(message).size(20))
        .padding([10, 16])
        .width(Length::Fill)
        .style(move |_theme| container::Style {
            background: Some(Background::Color(background)),
            text_color: Some(Color::WHITE),
            border: Border {
                radius: 6.0.into(),
                ..Border::default()
            },
            ..container::Style::default()
        })
        .into()
}
