//! Canvas widgets.

pub mod staff;
