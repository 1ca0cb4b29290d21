//! # Pitch Practice GUI
//!
//! Desktop front end for the pitch practice engine. Shows the target
//! sequence on a staff, starts and stops practice, and reports each judged
//! note as it is played.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme
//! - **Practice Worker**: owned by [`PracticeSession`], runs capture and analysis
//! - **Communication**: the worker publishes into a [`LatestFeedback`] slot and
//!   a status snapshot, both polled on every tick
//! - **Updates**: 60 FPS continuous updates via subscription system

mod ui;
mod widgets;

use anyhow::Context;
use iced::{Element, Subscription, Task, Theme};
use log::{error, info, warn};
use practice_core::notation::{NotationView, CANVAS_WIDTH};
use practice_core::session::PracticeStatus;
use practice_core::{CpalInput, Feedback, LatestFeedback, PracticeConfig, PracticeSession};
use std::path::Path;
use std::sync::Arc;
use ui::main_display::create_main_view;
use widgets::staff::StaffCanvas;

/// Read from the working directory when present.
const CONFIG_PATH: &str = "practice.json";

/// Main entry point for the Pitch Practice application.
pub fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting Pitch Practice...");

    let config = load_config(Path::new(CONFIG_PATH)).unwrap_or_else(|e| {
        error!("{:#}; using default settings", e);
        PracticeConfig::default()
    });
    let app = PracticeApp::new(config).context("failed to set up practice session")?;

    iced::application("Pitch Practice", PracticeApp::update, PracticeApp::view)
        .subscription(PracticeApp::subscription)
        .theme(PracticeApp::theme)
        .run_with(move || (app, Task::none()))?;

    info!("Application finished");
    Ok(())
}

/// Loads the practice configuration, falling back to defaults when no file exists.
fn load_config(path: &Path) -> anyhow::Result<PracticeConfig> {
    if !path.exists() {
        info!("No {} found, using default settings", path.display());
        return Ok(PracticeConfig::default());
    }
    let config = PracticeConfig::load(path)
        .with_context(|| format!("invalid practice configuration in {}", path.display()))?;
    info!("Loaded practice configuration from {}", path.display());
    Ok(config)
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    StartPractice,
    StopPractice,
    /// Timer tick for real-time updates
    Tick,
}

/// UI-specific data needed for rendering the interface.
#[derive(Debug, Clone, Default)]
pub struct AppDisplayData {
    pub active: bool,
    pub sequence: String,
    pub feedback: Option<Feedback>,
    pub status: PracticeStatus,
}

struct PracticeApp {
    session: PracticeSession,
    feedback: Arc<LatestFeedback>,
    /// Last feedback revision copied into the display
    feedback_revision: u64,
    staff: NotationView<StaffCanvas>,
    display_data: AppDisplayData,
}

impl PracticeApp {
    fn new(config: PracticeConfig) -> anyhow::Result<Self> {
        let feedback = Arc::new(LatestFeedback::new());
        let session = match PracticeSession::new(config, CpalInput::new(), feedback.clone()) {
            Ok(session) => session,
            Err(e) => {
                error!("Practice configuration rejected: {}; using default settings", e);
                PracticeSession::new(PracticeConfig::default(), CpalInput::new(), feedback.clone())?
            }
        };

        let mut staff = NotationView::new(StaffCanvas::new());
        staff.show_sequence(session.sequence(), CANVAS_WIDTH);

        let display_data = AppDisplayData {
            sequence: session.sequence().to_string(),
            ..AppDisplayData::default()
        };
        Ok(Self {
            session,
            feedback,
            feedback_revision: 0,
            staff,
            display_data,
        })
    }

    fn update(&mut self, message: Message) {
        match message {
            Message::StartPractice => {
                // The failure itself reaches the banner through the feedback sink.
                if let Err(e) = self.session.start() {
                    warn!("Practice did not start: {}", e);
                }
            }
            Message::StopPractice => self.session.stop(),
            Message::Tick => {}
        }
        self.refresh();
    }

    /// Copies the worker's latest state into the display data.
    fn refresh(&mut self) {
        let revision = self.feedback.revision();
        if revision != self.feedback_revision {
            self.feedback_revision = revision;
            self.display_data.feedback = self.feedback.latest();
        }

        // No-op unless the sequence changed.
        self.staff.show_sequence(self.session.sequence(), CANVAS_WIDTH);

        let status = self.session.status();
        self.staff
            .renderer_mut()
            .set_highlight(status.active.then_some(status.cursor));
        self.display_data.active = self.session.is_active();
        self.display_data.status = status;
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data, self.staff.renderer())
    }

    /// Fires every 16ms (60 FPS) to pick up feedback from the practice worker.
    fn subscription(&self) -> Subscription<Message> {
        iced::time::every(std::time::Duration::from_millis(16)).map(|_| Message::Tick)
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}
