//! Main application logic and orchestration

use crate::audio::{Acquisition, MicrophoneSource, SpectrumSource};
use crate::config::Config;
use crate::constants::{detection, ui as ui_constants};
use crate::controller::CakeEvent;
use crate::detector::{Calibration, CalibrationTracker};
use crate::error::{AppError, AppResult};
use crate::slideshow::Slideshow;
use crate::state::{AppState, Screen, Session, SharedSession};
use crate::ui;
use crate::wishes::{FileStore, KeyValueStore, Wish, load_wishes, store_wishes};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
        MouseButton, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend, layout::Rect};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

/// Main application struct
pub struct App {
    config: Config,
    terminal: Tui,
}

/// Exit codes for the application
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    Success = 0,
    UserExit = 1,  // User pressed Escape or Ctrl+C
    Error = 2,     // Actual application error
}

/// Result type that includes user exit information
pub type AppRunResult = Result<(), AppError>;

/// Extended result that tracks exit reason
pub struct RunResult {
    pub result: AppRunResult,
    pub exit_code: ExitCode,
}

/// User intent decoded from terminal input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    /// Zero-based candle position
    Tap(usize),
    Click { column: u16, row: u16 },
    Restart,
    ThresholdUp,
    ThresholdDown,
    NextWish,
    PreviousWish,
    FirstWish,
    LastWish,
}

/// Map a terminal event to a command
pub fn command_for(event: &Event) -> Option<Command> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
            KeyCode::Esc => Some(Command::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Command::Quit),
            KeyCode::Char('0') => Some(Command::Tap(9)),
            KeyCode::Char(c @ '1'..='9') => Some(Command::Tap(c as usize - '1' as usize)),
            KeyCode::Char('r') => Some(Command::Restart),
            KeyCode::Char('+') | KeyCode::Char('=') => Some(Command::ThresholdUp),
            KeyCode::Char('-') => Some(Command::ThresholdDown),
            KeyCode::Right => Some(Command::NextWish),
            KeyCode::Left => Some(Command::PreviousWish),
            KeyCode::Home => Some(Command::FirstWish),
            KeyCode::End => Some(Command::LastWish),
            _ => None,
        },
        Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
            Some(Command::Click {
                column: mouse.column,
                row: mouse.row,
            })
        }
        _ => None,
    }
}

/// Read terminal input on its own thread until `running` clears
fn spawn_input_thread(tx: mpsc::UnboundedSender<Command>, running: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::spawn(move || {
        while running.load(Ordering::Relaxed) {
            match event::poll(Duration::from_millis(50)) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(error = %e, "terminal input failed");
                    break;
                }
            }

            let Ok(event) = event::read() else {
                continue;
            };
            if let Some(command) = command_for(&event) {
                if tx.send(command).is_err() {
                    break;
                }
            }
        }
    })
}

/// Ask for the microphone and put the session in the matching mode
pub async fn acquire<S: SpectrumSource>(
    config: &Config,
    source: &mut S,
    session: &SharedSession,
    state: &mut AppState,
) {
    if config.no_mic {
        info!("microphone disabled on the command line");
        session.lock().enable_fallback();
        state.device_name = None;
        state.set_fallback(true);
        return;
    }

    let acquisition = source.start().await;
    session.lock().apply_acquisition(&acquisition);

    state.device_name = match &acquisition {
        Acquisition::Granted { device } => Some(device.clone()),
        Acquisition::Denied(_) => None,
    };
    state.set_fallback(session.lock().fallback_mode);
}

/// The last candle went out: stop listening and hand the wishes over
pub fn celebrate<S: SpectrumSource, K: KeyValueStore>(
    source: &mut S,
    session: &SharedSession,
    store: &mut K,
    wishes: &[Wish],
) {
    info!("starting celebration");
    session.lock().detector.stop();
    source.stop();

    if let Err(e) = store_wishes(store, wishes) {
        warn!(error = %e, "could not store wishes, the slideshow will use the defaults");
    }
}

impl App {
    /// Initialize the application with configuration
    pub fn new_with_config(config: Config) -> AppResult<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(App { config, terminal })
    }

    /// Run the cake until the user quits
    pub async fn run(mut self) -> RunResult {
        let session = SharedSession::new(Session::new(&self.config));
        let mut events = session.lock().controller.subscribe();
        let mut state = AppState::new(&session.lock());

        let mut store = FileStore::open(&self.config.store_path);
        let wishes = load_wishes(&store);
        let mut source = MicrophoneSource::new(self.config.device_name.clone(), self.config.permission_timeout);

        if !self.config.no_mic {
            let instructions = std::mem::replace(&mut state.instructions, "Waiting for the microphone...".to_string());
            if let Err(e) = draw(&mut self.terminal, &state, Instant::now()) {
                return self.finish(Err(e), ExitCode::Error);
            }
            state.instructions = instructions;
        }
        acquire(&self.config, &mut source, &session, &mut state).await;

        let (tx, mut commands) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));
        let input = spawn_input_thread(tx.clone(), Arc::clone(&running));
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(Command::Quit);
            }
        });

        let mut interval = tokio::time::interval(Duration::from_millis(ui_constants::UPDATE_INTERVAL_MS));
        let mut cake_area = Rect::default();
        let mut exit_reason = ExitCode::Success;

        let result = 'frames: loop {
            interval.tick().await;
            let now = Instant::now();

            // Sampling tick
            if matches!(state.screen, Screen::Cake) {
                let data = source.frequency_data();
                let mut session = session.lock();
                if let Some(outcome) = session.tick(data.as_deref()) {
                    state.last_blow = outcome.strength.or(state.last_blow);
                }
                state.meter.update(session.detector.last_intensity());
            }

            while let Ok(event) = events.try_recv() {
                if event == CakeEvent::AllExtinguished {
                    celebrate(&mut source, &session, &mut store, &wishes);
                }
                state.apply(&event, now);
            }

            {
                let mut session = session.lock();
                for view in state.candles.iter().filter(|c| c.lit) {
                    session.controller.set_flame_intensity(view.id, view.flame(now));
                }
            }

            if state.celebration_finished(now) {
                state.screen = Screen::Wishes(Slideshow::new(load_wishes(&store)));
            }

            match draw(&mut self.terminal, &state, now) {
                Ok(area) => cake_area = area,
                Err(e) => {
                    exit_reason = ExitCode::Error;
                    break Err(e);
                }
            }

            while let Ok(command) = commands.try_recv() {
                match command {
                    Command::Quit => {
                        exit_reason = ExitCode::UserExit;
                        break 'frames Ok(());
                    }
                    Command::Tap(index) => {
                        if matches!(state.screen, Screen::Cake) {
                            session.lock().tap(index);
                        }
                    }
                    Command::Click { column, row } => {
                        if let Some(index) = ui::candle_at(cake_area, &state.candles, column, row) {
                            session.lock().tap(index);
                        }
                    }
                    Command::Restart => {
                        source.stop();
                        session.lock().reset();
                        // the reset's progress event describes the new cake
                        while events.try_recv().is_ok() {}
                        state.sync(&session.lock());
                        acquire(&self.config, &mut source, &session, &mut state).await;
                    }
                    Command::ThresholdUp | Command::ThresholdDown => {
                        let step = if command == Command::ThresholdUp {
                            detection::THRESHOLD_STEP
                        } else {
                            -detection::THRESHOLD_STEP
                        };
                        let mut session = session.lock();
                        let threshold = session.detector.threshold() + step;
                        session.detector.set_threshold(threshold);
                        state.threshold = session.detector.threshold();
                    }
                    Command::NextWish | Command::PreviousWish | Command::FirstWish | Command::LastWish => {
                        if let Screen::Wishes(show) = &mut state.screen {
                            match command {
                                Command::NextWish => show.next(),
                                Command::PreviousWish => show.previous(),
                                Command::FirstWish => show.first(),
                                _ => show.last(),
                            }
                        }
                    }
                }
            }
        };

        running.store(false, Ordering::Relaxed);
        source.stop();
        if input.join().is_err() {
            warn!("input thread panicked");
        }

        self.finish(result, exit_reason)
    }

    fn finish(self, result: AppRunResult, exit_code: ExitCode) -> RunResult {
        if let Err(e) = self.cleanup() {
            warn!(error = %e, "terminal cleanup failed");
        }
        RunResult { result, exit_code }
    }

    /// Clean up terminal state
    fn cleanup(mut self) -> AppResult<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

fn draw(terminal: &mut Tui, state: &AppState, now: Instant) -> AppResult<Rect> {
    let mut cake_area = Rect::default();
    terminal.draw(|f| {
        cake_area = ui::render_ui(f, state, now);
    })?;
    Ok(cake_area)
}

/// Listen to the room for a while and suggest a noise floor
pub async fn calibrate(config: &Config, seconds: f32) -> AppResult<Calibration> {
    let mut source = MicrophoneSource::new(config.device_name.clone(), config.permission_timeout);
    listen(&mut source, seconds).await
}

/// Collect ambient levels from `source` for `seconds`
pub async fn listen<S: SpectrumSource>(source: &mut S, seconds: f32) -> AppResult<Calibration> {
    if let Acquisition::Denied(reason) = source.start().await {
        return Err(AppError::AudioDevice(reason));
    }

    let deadline = Instant::now() + Duration::from_secs_f32(seconds);
    let mut interval = tokio::time::interval(Duration::from_millis(ui_constants::UPDATE_INTERVAL_MS));
    let mut tracker = CalibrationTracker::default();

    // a capture thread that died ends the run early
    while Instant::now() < deadline && source.is_active() {
        interval.tick().await;
        if let Some(data) = source.frequency_data() {
            tracker.record(&data);
        }
    }

    source.stop();
    info!(samples = tracker.samples(), "calibration finished");
    Ok(tracker.finish())
}
