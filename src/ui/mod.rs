//! Terminal User Interface components for btreadmill.

pub mod chart;
mod help;
pub mod theme;
pub mod widgets;

pub use help::HelpOverlay;
pub use theme::Theme;
