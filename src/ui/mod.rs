//! Terminal viewer
//!
//! ratatui loading screen that redraws the grid between script steps.

pub mod viewer;

pub use viewer::{StepView, Viewer};
