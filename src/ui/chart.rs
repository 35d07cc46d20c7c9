//! Speed chart widget for the live session and recorded runs.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    symbols::Marker,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

use crate::protocol::MAX_SPEED_KMH;

use super::theme::Theme;

/// Line chart of speed samples over time
pub struct SpeedChart<'a> {
    /// km/h samples in chronological order
    samples: &'a [f64],
    title: &'a str,
    theme: &'a Theme,
}

impl<'a> SpeedChart<'a> {
    pub fn new(samples: &'a [f64], title: &'a str, theme: &'a Theme) -> Self {
        SpeedChart {
            samples,
            title,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        if self.samples.is_empty() {
            self.render_empty(frame, area, focused);
            return;
        }

        let points: Vec<(f64, f64)> = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, s)| (i as f64, *s))
            .collect();

        let x_max = (points.len().saturating_sub(1)).max(1) as f64;
        // Fixed y bounds so the trace doesn't rescale while walking
        let y_max = MAX_SPEED_KMH + 0.5;

        let dataset = Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(self.theme.chart_color(0)))
            .data(&points);

        let x_labels = vec![
            Span::raw("0".to_string()),
            Span::raw(format!("{:.0}", x_max / 2.0)),
            Span::raw(format!("{x_max:.0}")),
        ];
        let y_labels = vec![
            Span::raw("0.0"),
            Span::raw(format!("{:.1}", y_max / 2.0)),
            Span::raw(format!("{y_max:.1}")),
        ];

        let (border_style, title_style) = self.theme.panel_styles(focused);

        let chart = Chart::new(vec![dataset])
            .block(
                Block::default()
                    .title(format!(" {} ", self.title))
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title_style(title_style),
            )
            .x_axis(
                Axis::default()
                    .title(Span::styled(
                        "sample",
                        Style::default().add_modifier(Modifier::DIM),
                    ))
                    .style(self.theme.normal_style())
                    .bounds([0.0, x_max])
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .title(Span::styled(
                        "km/h",
                        Style::default().add_modifier(Modifier::DIM),
                    ))
                    .style(self.theme.normal_style())
                    .bounds([0.0, y_max])
                    .labels(y_labels),
            );

        frame.render_widget(chart, area);
    }

    fn render_empty(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let (border_style, title_style) = self.theme.panel_styles(focused);

        let block = Block::default()
            .title(format!(" {} ", self.title))
            .borders(Borders::ALL)
            .border_style(border_style)
            .title_style(title_style);

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let message = ratatui::widgets::Paragraph::new("No speed samples yet")
            .style(Style::default().add_modifier(Modifier::DIM))
            .alignment(ratatui::layout::Alignment::Center);

        frame.render_widget(message, inner);
    }
}
