//! Main application logic and TUI event loop.

use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};

use crate::cli::AppConfig;
use crate::data::{DayGroup, Run, Storage};
use crate::protocol::{BeltState, Command, MAX_SPEED_KMH, MIN_SPEED_KMH};
use crate::settings::{plans_dir, Settings, CONFIG_FILE_NAME};
use crate::treadmill::{SimulatorDriver, TreadmillDriver};
use crate::ui::{
    chart::SpeedChart,
    widgets::{HistoryList, PlanPanel, SessionPanel, StatusBar},
    HelpOverlay, Theme,
};
use crate::workout::{plan::load_plans, ExecutorStatus, Plan, PlanExecutor, Session};

/// Speed step for the +/- keys, km/h.
const SPEED_STEP_KMH: f64 = 0.5;
/// How often the active run row is flushed to the database.
const PERSIST_INTERVAL: Duration = Duration::from_secs(2);

/// Which panel is currently focused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPanel {
    Session,
    History,
    Plans,
}

impl FocusedPanel {
    fn next(self) -> Self {
        match self {
            FocusedPanel::Session => FocusedPanel::History,
            FocusedPanel::History => FocusedPanel::Plans,
            FocusedPanel::Plans => FocusedPanel::Session,
        }
    }

    fn prev(self) -> Self {
        match self {
            FocusedPanel::Session => FocusedPanel::Plans,
            FocusedPanel::History => FocusedPanel::Session,
            FocusedPanel::Plans => FocusedPanel::History,
        }
    }
}

/// Application state
pub struct App {
    config: AppConfig,
    theme: Theme,
    settings: Settings,

    // Belt
    driver: Box<dyn TreadmillDriver>,
    belt: BeltState,
    target_speed: f64,
    /// Speed command waiting for the belt to finish its start countdown
    pending_speed: bool,

    // Active run
    session: Option<Session>,
    run: Option<Run>,
    storage: Storage,
    last_persist: Instant,

    // Plan execution
    executor: Option<PlanExecutor>,
    executor_status: Option<ExecutorStatus>,
    plan_started_at: Option<Instant>,

    // Data
    plans: Vec<Plan>,
    history: Vec<DayGroup>,
    /// Decoded speed samples of the selected history run, for the chart
    selected_run_samples: Vec<f64>,

    // UI state
    focused: FocusedPanel,
    selected_run: usize,
    selected_plan: usize,
    show_help: bool,

    should_quit: bool,

    // Error message to display (non-fatal)
    error_message: Option<String>,
}

impl App {
    /// Create a new App instance
    pub fn new(config: AppConfig) -> Result<Self> {
        let settings = Settings::load(&config.data_dir)?;
        // First launch: write the defaults out so there is a file to edit.
        if !config.data_dir.join(CONFIG_FILE_NAME).exists() {
            settings.save(&config.data_dir)?;
        }
        let storage = Storage::open(&config.data_dir)?;

        if !config.simulator && !settings.profile.simulator_mode {
            anyhow::bail!(
                "no hardware driver is configured; run with --simulator or enable \
                 simulator_mode in the settings file"
            );
        }
        let driver: Box<dyn TreadmillDriver> = Box::new(SimulatorDriver::new(
            settings.profile.default_speed_kmh,
            settings.profile.stride_length_m,
            config.time_factor,
        ));

        let mut app = App {
            target_speed: settings.profile.default_speed_kmh,
            config,
            theme: Theme::default(),
            settings,
            driver,
            belt: BeltState::Unknown,
            pending_speed: false,
            session: None,
            run: None,
            storage,
            last_persist: Instant::now(),
            executor: None,
            executor_status: None,
            plan_started_at: None,
            plans: Vec::new(),
            history: Vec::new(),
            selected_run_samples: Vec::new(),
            focused: FocusedPanel::Session,
            selected_run: 0,
            selected_plan: 0,
            show_help: false,
            should_quit: false,
            error_message: None,
        };

        app.refresh()?;
        app.pick_up_paused_run()?;
        Ok(app)
    }

    /// Reload history and plans from disk
    fn refresh(&mut self) -> Result<()> {
        self.error_message = None;
        self.history = self.storage.runs_grouped_by_day()?;
        self.plans = load_plans(&plans_dir(&self.config.data_dir))?;
        let run_count = self.run_count();
        if self.selected_run >= run_count {
            self.selected_run = run_count.saturating_sub(1);
        }
        if self.selected_plan >= self.plans.len() {
            self.selected_plan = self.plans.len().saturating_sub(1);
        }
        self.reload_selected_samples();
        Ok(())
    }

    fn reload_selected_samples(&mut self) {
        self.selected_run_samples = self
            .selected_history_run()
            .map(|r| r.speeds_array())
            .unwrap_or_default();
    }

    /// Rebuild the session for a run left paused by a previous process.
    fn pick_up_paused_run(&mut self) -> Result<()> {
        let Some(run) = self.storage.resumable_run()? else {
            return Ok(());
        };
        tracing::info!(run_id = ?run.id, "picking up paused run");
        let session = Session::resume_from(
            run.start_timestamp,
            run.total_km(),
            run.speeds_array(),
            self.settings.profile.weight_kg,
            self.settings.profile.stride_length_m,
            self.config.time_factor,
        );
        self.target_speed = self.settings.profile.default_speed_kmh;
        self.session = Some(session);
        self.run = Some(run);
        Ok(())
    }

    /// Set an error message to display (non-fatal)
    pub fn set_error(&mut self, message: String) {
        self.error_message = Some(message);
    }

    fn run_count(&self) -> usize {
        self.history.iter().map(|g| g.runs.len()).sum()
    }

    fn selected_history_run(&self) -> Option<&Run> {
        self.history
            .iter()
            .flat_map(|g| g.runs.iter())
            .nth(self.selected_run)
    }

    fn session_is_paused(&self) -> bool {
        self.session.as_ref().map(|s| s.paused).unwrap_or(false)
    }

    /// Start a fresh run at the default speed.
    fn start_run(&mut self) -> Result<()> {
        if self.session.as_ref().map(|s| s.is_active()).unwrap_or(false) {
            return Ok(());
        }
        let now = Utc::now();
        self.target_speed = self.settings.profile.default_speed_kmh;
        self.driver.send(Command::Start)?;
        self.pending_speed = true;

        let mut run = Run::new(now);
        self.storage.save_run(&mut run)?;
        tracing::info!(run_id = ?run.id, "run started");

        self.session = Some(Session::new(
            now,
            self.settings.profile.weight_kg,
            self.config.time_factor,
        ));
        self.run = Some(run);
        Ok(())
    }

    /// Pause or resume the active run.
    fn toggle_pause(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if session.paused {
            session.resume(Utc::now());
            if session.speed_before_pause > 0.0 {
                self.target_speed = session.speed_before_pause;
            }
            self.driver.send(Command::Start)?;
            self.pending_speed = true;
            if let Some(executor) = self.executor.as_mut() {
                executor.resume();
            }
        } else {
            session.pause();
            self.driver.send(Command::Stop)?;
            if let Some(executor) = self.executor.as_mut() {
                executor.pause();
            }
        }
        self.persist_run()?;
        Ok(())
    }

    /// Stop the belt and close out the run.
    fn end_run(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        self.driver.send(Command::Stop)?;
        session.end(Utc::now());

        if let Some(run) = self.run.as_mut() {
            run.end_timestamp = session.ended_at;
            run.distance_meters = session.total_distance * 1000.0;
            run.distance_meters_offset = 0.0;
            run.set_speeds(&session.speed_history);
            run.completed = true;
            run.paused = false;
            self.storage.save_run(run)?;
            tracing::info!(run_id = ?run.id, km = run.total_km(), "run ended");
        }

        self.session = None;
        self.run = None;
        self.executor = None;
        self.executor_status = None;
        self.plan_started_at = None;
        self.pending_speed = false;
        self.refresh()?;
        Ok(())
    }

    /// Change the belt's target speed by `delta` km/h.
    fn adjust_speed(&mut self, delta: f64) -> Result<()> {
        self.target_speed = (self.target_speed + delta).clamp(MIN_SPEED_KMH, MAX_SPEED_KMH);
        if self.belt.is_moving() && !self.session_is_paused() {
            self.driver.send(Command::Speed(self.target_speed))?;
        }
        Ok(())
    }

    /// Start executing the selected plan, starting a run if needed.
    fn start_selected_plan(&mut self) -> Result<()> {
        let Some(plan) = self.plans.get(self.selected_plan).cloned() else {
            return Ok(());
        };
        let problems = plan.validate();
        if !problems.is_empty() {
            self.set_error(format!("plan {:?} is invalid: {}", plan.name, problems[0]));
            return Ok(());
        }
        tracing::info!(plan = %plan.name, "starting plan");
        self.start_run()?;
        self.executor = Some(PlanExecutor::new(plan));
        self.plan_started_at = Some(Instant::now());
        self.focused = FocusedPanel::Session;
        Ok(())
    }

    fn skip_segment(&mut self) {
        if let Some(executor) = self.executor.as_mut() {
            executor.skip_segment();
        }
    }

    /// Flush the active run row to the database.
    fn persist_run(&mut self) -> Result<()> {
        let (Some(session), Some(run)) = (self.session.as_ref(), self.run.as_mut()) else {
            return Ok(());
        };
        run.distance_meters = session.total_distance * 1000.0;
        run.distance_meters_offset = 0.0;
        run.set_speeds(&session.speed_history);
        run.paused = session.paused;
        self.storage.save_run(run)?;
        self.last_persist = Instant::now();
        Ok(())
    }

    /// One poll cycle: read the belt, fold telemetry into the session, and
    /// let the plan executor push speed changes.
    fn tick(&mut self) -> Result<()> {
        if let Some(state) = self.driver.poll_state() {
            self.belt = state;
        }

        // The belt ignores speed commands until the start countdown ends.
        if self.pending_speed && self.belt.is_moving() {
            self.driver.send(Command::Speed(self.target_speed))?;
            self.pending_speed = false;
        }

        if let (Some(session), Some(snapshot)) = (self.session.as_mut(), self.belt.snapshot()) {
            if session.is_active() && !session.paused {
                session.update(snapshot);
            }
        }

        self.tick_executor()?;

        if self.last_persist.elapsed() >= PERSIST_INTERVAL {
            self.persist_run()?;
        }
        Ok(())
    }

    fn tick_executor(&mut self) -> Result<()> {
        let Some(executor) = self.executor.as_mut() else {
            return Ok(());
        };
        let Some(started) = self.plan_started_at else {
            return Ok(());
        };

        let wall_elapsed = started.elapsed().as_secs_f64() * self.config.time_factor;
        self.executor_status = executor.tick(wall_elapsed);

        if let Some(target) = executor.speed_command() {
            // Interval rests ask for 0 km/h, but stopping the belt would reset
            // its counters and a stopped belt ignores speed commands. Keep it
            // crawling at the minimum instead.
            let target = target.max(MIN_SPEED_KMH);
            self.target_speed = target;
            self.driver.send(Command::Speed(target))?;
        }

        if executor.is_complete() {
            let auto_stop = executor.plan().auto_stop_on_completion;
            self.executor = None;
            self.executor_status = None;
            self.plan_started_at = None;
            if auto_stop {
                self.end_run()?;
            }
        }
        Ok(())
    }

    /// Handle keyboard input
    fn handle_input(&mut self, key: KeyCode, _modifiers: KeyModifiers) -> Result<()> {
        // Global shortcuts
        match key {
            KeyCode::Char('q') => {
                self.quit()?;
                return Ok(());
            }
            KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::F(1) => {
                self.show_help = !self.show_help;
                return Ok(());
            }
            KeyCode::Esc if self.show_help => {
                self.show_help = false;
                return Ok(());
            }
            KeyCode::Char('r') => {
                self.refresh()?;
                return Ok(());
            }
            KeyCode::Tab => {
                self.focused = self.focused.next();
                return Ok(());
            }
            KeyCode::BackTab => {
                self.focused = self.focused.prev();
                return Ok(());
            }
            _ => {}
        }

        // If help is shown, don't process other keys
        if self.show_help {
            return Ok(());
        }

        match key {
            KeyCode::Char('s') => self.start_run()?,
            KeyCode::Char(' ') => self.toggle_pause()?,
            KeyCode::Char('e') => self.end_run()?,
            KeyCode::Char('+') | KeyCode::Char('=') => self.adjust_speed(SPEED_STEP_KMH)?,
            KeyCode::Char('-') => self.adjust_speed(-SPEED_STEP_KMH)?,
            KeyCode::Char('n') => self.skip_segment(),
            KeyCode::Enter if self.focused == FocusedPanel::Plans => {
                self.start_selected_plan()?;
            }
            KeyCode::Down | KeyCode::Char('j') => self.navigate(1),
            KeyCode::Up | KeyCode::Char('k') => self.navigate(-1),
            _ => {}
        }

        Ok(())
    }

    fn navigate(&mut self, delta: isize) {
        let len = match self.focused {
            FocusedPanel::History => self.run_count(),
            FocusedPanel::Plans => self.plans.len(),
            FocusedPanel::Session => return,
        };
        if len == 0 {
            return;
        }
        let step = |current: usize| (current as isize + delta).rem_euclid(len as isize) as usize;
        match self.focused {
            FocusedPanel::History => {
                self.selected_run = step(self.selected_run);
                self.reload_selected_samples();
            }
            FocusedPanel::Plans => self.selected_plan = step(self.selected_plan),
            FocusedPanel::Session => {}
        }
    }

    /// Quit, leaving any active run paused so it can be resumed later.
    fn quit(&mut self) -> Result<()> {
        if let Some(session) = self.session.as_mut() {
            if session.is_active() && !session.paused {
                session.pause();
                self.driver.send(Command::Stop)?;
            }
            self.persist_run()?;
        }
        self.should_quit = true;
        Ok(())
    }

    /// Render the UI
    fn render(&self, frame: &mut ratatui::Frame) {
        let size = frame.area();

        // Main layout: body, status bar
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),    // Body
                Constraint::Length(2), // Status bar
            ])
            .split(size);

        // Body layout: sidebar (left) and content (right)
        let body_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(36), // Sidebar
                Constraint::Min(40),    // Content
            ])
            .split(main_chunks[0]);

        // Sidebar layout: session, plans
        let sidebar_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(13), // Session stats
                Constraint::Min(6),     // Plans
            ])
            .split(body_chunks[0]);

        // Content layout: chart over history
        let content_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(45), // Speed chart
                Constraint::Percentage(55), // History
            ])
            .split(body_chunks[1]);

        let session_panel = SessionPanel::new(
            self.session.as_ref(),
            &self.belt,
            self.target_speed,
            &self.theme,
        );
        session_panel.render(
            frame,
            sidebar_chunks[0],
            self.focused == FocusedPanel::Session,
        );

        let plan_panel = PlanPanel::new(
            &self.plans,
            self.selected_plan,
            self.executor_status.as_ref(),
            &self.theme,
        );
        plan_panel.render(frame, sidebar_chunks[1], self.focused == FocusedPanel::Plans);

        // Chart shows the live session when one exists, otherwise the
        // selected history run.
        let (samples, chart_title): (&[f64], &str) = match self.session.as_ref() {
            Some(session) => (&session.speed_history, "Speed (live)"),
            None => (&self.selected_run_samples, "Speed"),
        };
        let chart = SpeedChart::new(samples, chart_title, &self.theme);
        chart.render(frame, content_chunks[0], false);

        let history = HistoryList::new(&self.history, self.selected_run, &self.theme);
        history.render(
            frame,
            content_chunks[1],
            self.focused == FocusedPanel::History,
        );

        let mode = if !self.driver.is_connected() {
            "disconnected"
        } else if self.config.simulator || self.settings.profile.simulator_mode {
            "simulator"
        } else {
            "belt"
        };
        let status_bar = StatusBar::new(mode, self.error_message.as_deref(), &self.theme);
        status_bar.render(frame, main_chunks[1]);

        // Render help overlay if active
        if self.show_help {
            let help = HelpOverlay::new(&self.theme);
            help.render(frame, size);
        }
    }
}

/// Restore terminal to normal state
fn restore_terminal() {
    // Best effort cleanup - ignore errors since we may be in a panic
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
}

/// Run the TUI application
pub fn run(config: AppConfig) -> Result<()> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen, EnableMouseCapture) {
        restore_terminal();
        return Err(e).context("Failed to setup terminal");
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = match Terminal::new(backend) {
        Ok(t) => t,
        Err(e) => {
            restore_terminal();
            return Err(e).context("Failed to create terminal");
        }
    };

    // Create app - if this fails, restore terminal first
    let mut app = match App::new(config) {
        Ok(a) => a,
        Err(e) => {
            restore_terminal();
            return Err(e).context("Failed to initialize application");
        }
    };

    // Main loop - wrap in a closure to ensure cleanup
    let result = run_main_loop(&mut terminal, &mut app);

    // Always restore terminal, regardless of result
    restore_terminal();
    terminal.show_cursor().ok();

    result
}

/// Main application loop
fn run_main_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Belt telemetry and plan progress advance every cycle.
        if let Err(e) = app.tick() {
            app.set_error(format!("Belt error: {e}"));
        }

        // Render - if this fails, we should exit
        terminal.draw(|f| app.render(f))?;

        // Handle input with timeout
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if let Err(e) = app.handle_input(key.code, key.modifiers) {
                    // Log error but don't crash
                    app.set_error(format!("Input error: {e}"));
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RunSnapshot;

    fn test_app(dir: &std::path::Path) -> App {
        let config = AppConfig {
            data_dir: dir.to_path_buf(),
            simulator: true,
            time_factor: 1.0,
        };
        App::new(config).unwrap()
    }

    #[test]
    fn test_requires_a_driver() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            simulator: false,
            time_factor: 1.0,
        };
        assert!(App::new(config).is_err());
    }

    #[test]
    fn test_start_run_creates_session_and_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        assert!(app.session.is_none());

        app.start_run().unwrap();
        assert!(app.session.as_ref().unwrap().is_active());
        let run_id = app.run.as_ref().unwrap().id.unwrap();
        assert!(app.storage.fetch_run(run_id).unwrap().is_some());

        // s again while running is a no-op
        app.start_run().unwrap();
        assert_eq!(app.run.as_ref().unwrap().id, Some(run_id));
    }

    #[test]
    fn test_pause_persists_and_end_completes() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.start_run().unwrap();

        let now = app.session.as_ref().unwrap().started_at;
        let snap = RunSnapshot::new(now + chrono::TimeDelta::seconds(60), 3.0, 0.05, 0.7);
        app.session.as_mut().unwrap().update(&snap);

        app.toggle_pause().unwrap();
        let run_id = app.run.as_ref().unwrap().id.unwrap();
        let stored = app.storage.fetch_run(run_id).unwrap().unwrap();
        assert!(stored.paused);
        assert!((stored.distance_meters - 50.0).abs() < 1e-6);

        app.toggle_pause().unwrap();
        assert!(!app.session.as_ref().unwrap().paused);

        app.end_run().unwrap();
        assert!(app.session.is_none());
        let stored = app.storage.fetch_run(run_id).unwrap().unwrap();
        assert!(stored.completed);
        assert!(!stored.paused);
    }

    #[test]
    fn test_paused_run_picked_up_on_startup() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut app = test_app(dir.path());
            app.start_run().unwrap();
            let now = app.session.as_ref().unwrap().started_at;
            let snap = RunSnapshot::new(now + chrono::TimeDelta::seconds(30), 3.0, 0.1, 0.7);
            app.session.as_mut().unwrap().update(&snap);
            app.quit().unwrap();
        }

        let app = test_app(dir.path());
        let session = app.session.as_ref().expect("paused run picked up");
        assert!(session.paused);
        assert!((session.total_distance - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_speed_keys_clamp_to_belt_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.target_speed = 5.8;
        app.adjust_speed(SPEED_STEP_KMH).unwrap();
        assert!((app.target_speed - MAX_SPEED_KMH).abs() < 1e-9);

        app.target_speed = 1.2;
        app.adjust_speed(-SPEED_STEP_KMH).unwrap();
        assert!((app.target_speed - MIN_SPEED_KMH).abs() < 1e-9);
    }

    #[test]
    fn test_focus_cycles_through_panels() {
        assert_eq!(FocusedPanel::Session.next(), FocusedPanel::History);
        assert_eq!(FocusedPanel::Plans.next(), FocusedPanel::Session);
        assert_eq!(FocusedPanel::Session.prev(), FocusedPanel::Plans);
    }

    #[test]
    fn test_navigation_wraps() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        // Two completed runs in history
        for _ in 0..2 {
            app.start_run().unwrap();
            app.end_run().unwrap();
        }
        app.focused = FocusedPanel::History;
        assert_eq!(app.run_count(), 2);
        assert_eq!(app.selected_run, 0);
        app.navigate(1);
        assert_eq!(app.selected_run, 1);
        app.navigate(1);
        assert_eq!(app.selected_run, 0);
        app.navigate(-1);
        assert_eq!(app.selected_run, 1);
    }

    #[test]
    fn test_starting_plan_starts_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.plans = vec![Plan {
            name: "easy walk".to_string(),
            description: None,
            segments: vec![crate::workout::Segment::Fixed(
                crate::workout::plan::FixedSegment {
                    name: None,
                    speed: 3.0,
                    duration_secs: 120.0,
                },
            )],
            auto_stop_on_completion: true,
            tags: Vec::new(),
        }];
        app.focused = FocusedPanel::Plans;
        app.start_selected_plan().unwrap();
        assert!(app.executor.is_some());
        assert!(app.session.is_some());
        assert_eq!(app.focused, FocusedPanel::Session);
    }

    #[test]
    fn test_interval_rest_keeps_belt_crawling() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.plans = vec![Plan {
            name: "sets with rest".to_string(),
            description: None,
            segments: vec![crate::workout::Segment::Interval(
                crate::workout::plan::IntervalSegment {
                    name: None,
                    pattern: vec![crate::workout::plan::IntervalStep {
                        name: None,
                        speed: 4.0,
                        duration_secs: 30.0,
                    }],
                    repeat: crate::workout::plan::Repeat::Count(2),
                    rest_between_sets_secs: Some(20.0),
                },
            )],
            auto_stop_on_completion: true,
            tags: Vec::new(),
        }];
        app.focused = FocusedPanel::Plans;
        app.start_selected_plan().unwrap();

        // Mid-step: belt runs at the step speed
        app.plan_started_at = Some(Instant::now() - Duration::from_secs(10));
        app.tick_executor().unwrap();
        assert!((app.target_speed - 4.0).abs() < 1e-9);

        // Rest between sets drops to the minimum, never to a stop; a stopped
        // belt resets its counters and ignores speed commands.
        app.plan_started_at = Some(Instant::now() - Duration::from_secs(40));
        app.tick_executor().unwrap();
        assert!((app.target_speed - MIN_SPEED_KMH).abs() < 1e-9);

        // Next set picks the step speed back up
        app.plan_started_at = Some(Instant::now() - Duration::from_secs(60));
        app.tick_executor().unwrap();
        assert!((app.target_speed - 4.0).abs() < 1e-9);
    }
}
