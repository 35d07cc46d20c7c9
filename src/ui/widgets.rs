//! UI widgets for the treadmill dashboard.

use chrono::Utc;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::data::DayGroup;
use crate::protocol::BeltState;
use crate::workout::{ExecutorStatus, Plan, Session};

use super::theme::Theme;

/// Live session panel showing the current run's metrics
pub struct SessionPanel<'a> {
    session: Option<&'a Session>,
    belt: &'a BeltState,
    target_speed: f64,
    theme: &'a Theme,
}

impl<'a> SessionPanel<'a> {
    pub fn new(
        session: Option<&'a Session>,
        belt: &'a BeltState,
        target_speed: f64,
        theme: &'a Theme,
    ) -> Self {
        SessionPanel {
            session,
            belt,
            target_speed,
            theme,
        }
    }

    fn state_label(&self) -> &'static str {
        match (self.belt, self.session) {
            (_, Some(s)) if s.paused => "PAUSED",
            (BeltState::Running(_), _) => "RUNNING",
            (BeltState::Starting, _) => "STARTING",
            (BeltState::Stopping(_), _) => "STOPPING",
            (BeltState::Hibernated, _) => "ASLEEP",
            (BeltState::Idling, _) => "IDLE",
            (BeltState::Unknown, _) => "UNKNOWN",
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let (border_style, title_style) = self.theme.panel_styles(focused);

        let state_style = if self.session.map(|s| s.paused).unwrap_or(false) {
            Style::default()
                .fg(self.theme.paused)
                .add_modifier(Modifier::BOLD)
        } else {
            self.theme.belt_style(self.belt).add_modifier(Modifier::BOLD)
        };

        let mut lines: Vec<Line> = vec![Line::from(vec![
            Span::raw("  State      "),
            Span::styled(self.state_label(), state_style),
        ])];

        match self.session {
            Some(session) => {
                let elapsed = session.elapsed(Utc::now());
                let total_secs = elapsed.num_seconds().max(0) as u64;
                let stat = |label: &str, value: String| {
                    Line::from(vec![
                        Span::styled(format!("  {label:<11}"), self.theme.normal_style()),
                        Span::styled(value, Style::default().add_modifier(Modifier::BOLD)),
                    ])
                };
                lines.push(stat("Speed", format!("{:.1} km/h", session.current_speed)));
                lines.push(stat("Target", format!("{:.1} km/h", self.target_speed)));
                lines.push(stat("Distance", format!("{:.2} km", session.total_distance)));
                lines.push(stat("Time", format_duration(total_secs)));
                lines.push(stat("Steps", session.total_steps.to_string()));
                lines.push(stat("Calories", format!("{} kcal", session.estimated_calories)));
                lines.push(stat("Avg speed", format!("{:.1} km/h", session.average_speed)));
                lines.push(stat("Max speed", format!("{:.1} km/h", session.max_speed)));
                let pace = if session.average_pace > 0.0 {
                    format_pace(session.average_pace)
                } else {
                    "-".to_string()
                };
                lines.push(stat("Pace", pace));
            }
            None => {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    "  No active run. Press [s] to start.",
                    Style::default().add_modifier(Modifier::DIM),
                )));
            }
        }

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .title(" Session ")
                .borders(Borders::ALL)
                .border_style(border_style)
                .title_style(title_style),
        );

        frame.render_widget(paragraph, area);
    }
}

/// Run history panel, grouped by day
pub struct HistoryList<'a> {
    groups: &'a [DayGroup],
    /// Ordinal of the selected run, counting runs only (headers excluded)
    selected: usize,
    theme: &'a Theme,
}

impl<'a> HistoryList<'a> {
    pub fn new(groups: &'a [DayGroup], selected: usize, theme: &'a Theme) -> Self {
        HistoryList {
            groups,
            selected,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let (border_style, title_style) = self.theme.panel_styles(focused);

        let mut items: Vec<ListItem> = Vec::new();
        let mut selected_item = None;
        let mut run_ordinal = 0usize;

        for group in self.groups {
            items.push(ListItem::new(Span::styled(
                group.title(),
                self.theme.title_style(),
            )));
            for run in &group.runs {
                if run_ordinal == self.selected {
                    selected_item = Some(items.len());
                }
                let time = run
                    .start_timestamp
                    .with_timezone(&chrono::Local)
                    .format("%H:%M");
                let mut tags = String::new();
                if run.paused {
                    tags.push_str(" [paused]");
                } else if !run.completed {
                    tags.push_str(" [live]");
                }
                if run.uploaded_id.is_some() {
                    tags.push_str(" ^");
                }
                items.push(ListItem::new(format!(
                    "  {time}  {:.2} km  {}{tags}",
                    run.total_km(),
                    run.duration_string(),
                )));
                run_ordinal += 1;
            }
        }

        let run_count: usize = self.groups.iter().map(|g| g.runs.len()).sum();
        let list = List::new(items)
            .block(
                Block::default()
                    .title(format!(" History ({run_count}) "))
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title_style(title_style),
            )
            .highlight_style(self.theme.highlight_style())
            .highlight_symbol("> ");

        let mut state = ListState::default();
        state.select(selected_item);
        frame.render_stateful_widget(list, area, &mut state);
    }
}

/// Workout plans panel, including progress for the plan being executed
pub struct PlanPanel<'a> {
    plans: &'a [Plan],
    selected: usize,
    active: Option<&'a ExecutorStatus>,
    theme: &'a Theme,
}

impl<'a> PlanPanel<'a> {
    pub fn new(
        plans: &'a [Plan],
        selected: usize,
        active: Option<&'a ExecutorStatus>,
        theme: &'a Theme,
    ) -> Self {
        PlanPanel {
            plans,
            selected,
            active,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let (border_style, title_style) = self.theme.panel_styles(focused);
        let block = Block::default()
            .title(" Plans ")
            .borders(Borders::ALL)
            .border_style(border_style)
            .title_style(title_style);

        match self.active {
            Some(status) => {
                let inner = block.inner(area);
                frame.render_widget(block, area);
                self.render_active(frame, inner, status);
            }
            None => {
                let items: Vec<ListItem> = self
                    .plans
                    .iter()
                    .map(|p| {
                        let duration = p
                            .estimated_duration()
                            .map(|d| format_duration(d as u64))
                            .unwrap_or_else(|| "open-ended".to_string());
                        let (lo, hi) = p.speed_range();
                        ListItem::new(format!(
                            "{}  ({duration}, {lo:.1}-{hi:.1} km/h)",
                            p.name
                        ))
                    })
                    .collect();

                let list = List::new(items)
                    .block(block)
                    .highlight_style(self.theme.highlight_style())
                    .highlight_symbol("> ");

                let mut state = ListState::default();
                if !self.plans.is_empty() {
                    state.select(Some(self.selected.min(self.plans.len() - 1)));
                }
                frame.render_stateful_widget(list, area, &mut state);
            }
        }
    }

    fn render_active(&self, frame: &mut Frame, area: Rect, status: &ExecutorStatus) {
        let mut lines = vec![
            Line::from(Span::styled(
                format!(
                    "  Segment {}/{}: {}",
                    status.segment_index + 1,
                    status.segment_count,
                    status.segment.label
                ),
                self.theme.normal_style(),
            )),
            Line::from(format!(
                "  Target {:.1} km/h",
                status.segment.target_speed
            )),
        ];
        if let Some(next) = status.segment.next_transition {
            lines.push(Line::from(format!(
                "  Next change in {}",
                format_duration(next as u64)
            )));
        }
        if let Some(remaining) = status.remaining_secs {
            lines.push(Line::from(format!(
                "  {} remaining",
                format_duration(remaining as u64)
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);

        if let Some(progress) = status.overall_progress {
            // Gauge goes on the panel's bottom row
            if area.height > 3 {
                let gauge_area = Rect {
                    x: area.x + 1,
                    y: area.y + area.height - 1,
                    width: area.width.saturating_sub(2),
                    height: 1,
                };
                let gauge = Gauge::default()
                    .ratio(progress.clamp(0.0, 1.0))
                    .gauge_style(Style::default().fg(self.theme.belt_running))
                    .label(format!("{:.0}%", progress * 100.0));
                frame.render_widget(gauge, gauge_area);
            }
        }
    }
}

/// Status bar widget
pub struct StatusBar<'a> {
    mode: &'a str,
    error: Option<&'a str>,
    theme: &'a Theme,
}

impl<'a> StatusBar<'a> {
    pub fn new(mode: &'a str, error: Option<&'a str>, theme: &'a Theme) -> Self {
        StatusBar { mode, error, theme }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let line = if let Some(e) = self.error {
            Line::from(Span::styled(
                format!("Error: {e}"),
                Style::default().fg(ratatui::style::Color::Red),
            ))
        } else {
            Line::from(format!(
                "btreadmill ({}) | [s] Start [space] Pause [e] End [+/-] Speed [h] Help [q] Quit",
                self.mode
            ))
        };

        let paragraph = Paragraph::new(line).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(self.theme.border_style()),
        );

        frame.render_widget(paragraph, area);
    }
}

/// "1h 02m 05s" style formatting for elapsed times.
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

/// "m:ss / km" from a pace in minutes per km.
pub fn format_pace(minutes_per_km: f64) -> String {
    let minutes = minutes_per_km as u64;
    let seconds = ((minutes_per_km - minutes as f64) * 60.0) as u64;
    format!("{minutes}:{seconds:02} / km")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5), "5s");
        assert_eq!(format_duration(65), "1m 05s");
        assert_eq!(format_duration(3725), "1h 02m 05s");
    }

    #[test]
    fn test_format_pace() {
        assert_eq!(format_pace(20.0), "20:00 / km");
        assert_eq!(format_pace(12.5), "12:30 / km");
    }
}
