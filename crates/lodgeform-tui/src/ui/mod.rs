//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout, wizard steps and overlays
//! - `input`: keyboard handling per state and step
//! - `styles`: colors and text styles

pub mod input;
pub mod render;
pub mod styles;
