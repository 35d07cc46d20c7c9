//! Theme configuration for the TUI.

use ratatui::style::{Color, Modifier, Style};

use crate::protocol::BeltState;

/// Color theme for the application
#[derive(Debug, Clone)]
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub highlight_bg: Color,
    pub highlight_fg: Color,
    pub border: Color,
    pub title: Color,
    pub belt_running: Color,
    pub belt_transition: Color,
    pub belt_idle: Color,
    pub paused: Color,
    pub chart_colors: Vec<Color>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            bg: Color::Reset,
            fg: Color::White,
            highlight_bg: Color::Rgb(60, 60, 80),
            highlight_fg: Color::White,
            border: Color::Rgb(100, 100, 120),
            title: Color::Cyan,
            belt_running: Color::Green,
            belt_transition: Color::Yellow,
            belt_idle: Color::DarkGray,
            paused: Color::Yellow,
            // Using named colors instead of RGB for better terminal compatibility
            chart_colors: vec![
                Color::Green,
                Color::Cyan,
                Color::Yellow,
                Color::Blue,
                Color::Magenta,
                Color::Red,
                Color::LightGreen,
                Color::LightCyan,
            ],
        }
    }
}

impl Theme {
    /// Base surface style used to paint widget backgrounds
    pub fn surface_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    /// Convenience helper returning (border_style, title_style) for focus state
    pub fn panel_styles(&self, focused: bool) -> (Style, Style) {
        if focused {
            (self.focused_border_style(), self.focused_border_style())
        } else {
            (self.border_style(), self.dimmed_title_style())
        }
    }

    /// Get style for normal text
    pub fn normal_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    /// Get style for highlighted/selected items
    pub fn highlight_style(&self) -> Style {
        Style::default()
            .fg(self.highlight_fg)
            .bg(self.highlight_bg)
            .add_modifier(Modifier::BOLD)
    }

    /// Get style for borders
    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }

    /// Get style for focused panel borders (distinct from normal borders)
    pub fn focused_border_style(&self) -> Style {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    }

    /// Get style for titles
    pub fn title_style(&self) -> Style {
        Style::default().fg(self.title).add_modifier(Modifier::BOLD)
    }

    /// Get style for unfocused/dimmed titles
    pub fn dimmed_title_style(&self) -> Style {
        Style::default().fg(self.border).add_modifier(Modifier::DIM)
    }

    /// Get style for the belt state label
    pub fn belt_style(&self, state: &BeltState) -> Style {
        let color = match state {
            BeltState::Running(_) => self.belt_running,
            BeltState::Starting | BeltState::Stopping(_) => self.belt_transition,
            BeltState::Idling | BeltState::Hibernated | BeltState::Unknown => self.belt_idle,
        };
        Style::default().fg(color)
    }

    /// Get a chart color by index (cycles through available colors)
    pub fn chart_color(&self, index: usize) -> Color {
        self.chart_colors[index % self.chart_colors.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_colors_are_distinct() {
        let theme = Theme::default();
        // Verify first few colors are all different
        let c0 = theme.chart_color(0);
        let c1 = theme.chart_color(1);
        let c2 = theme.chart_color(2);
        assert_ne!(c0, c1, "Colors 0 and 1 should be different");
        assert_ne!(c1, c2, "Colors 1 and 2 should be different");
        assert_ne!(c0, c2, "Colors 0 and 2 should be different");
    }

    #[test]
    fn test_chart_color_cycles() {
        let theme = Theme::default();
        let len = theme.chart_colors.len();
        // Color at index 0 should equal color at index len (cycle)
        assert_eq!(theme.chart_color(0), theme.chart_color(len));
        assert_eq!(theme.chart_color(1), theme.chart_color(len + 1));
    }

    #[test]
    fn test_belt_state_colors_differ() {
        let theme = Theme::default();
        let running = theme.belt_style(&BeltState::Running(crate::protocol::RunSnapshot::new(
            chrono::Utc::now(),
            3.0,
            0.5,
            0.7,
        )));
        let idle = theme.belt_style(&BeltState::Idling);
        assert_ne!(running, idle);
    }
}
