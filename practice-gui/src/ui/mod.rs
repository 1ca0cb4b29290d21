//! # UI Module
//!
//! This module contains the layout and panels for the pitch practice application.

pub mod feedback_banner;
pub mod main_display;
