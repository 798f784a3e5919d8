//! Session and presentation state

use crate::audio::Acquisition;
use crate::candle::CandleId;
use crate::config::Config;
use crate::constants::ui;
use crate::controller::{BlowOutcome, CakeEvent, CakePhase, ExtinguishController, remaining_message};
use crate::detector::{BlowBands, BlowDetector, BlowStrength};
use crate::slideshow::Slideshow;
use crate::smoothing::IntensityMeter;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const BLOW_INSTRUCTIONS: &str = "Blow into your microphone to make your wishes come true!";
pub const TAP_INSTRUCTIONS: &str = "Tap on candles to make your wishes come true!";

/// One run of the cake: candles, detector and interaction mode
pub struct Session {
    pub controller: ExtinguishController,
    pub detector: BlowDetector,
    pub fallback_mode: bool,
    candle_count: usize,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Self {
            controller: ExtinguishController::new(config.candle_count, config.bands),
            detector: BlowDetector::new(config.threshold, config.bands),
            fallback_mode: false,
            candle_count: config.candle_count,
        }
    }

    /// Record how the microphone request went
    pub fn apply_acquisition(&mut self, acquisition: &Acquisition) {
        match acquisition {
            Acquisition::Granted { .. } => {
                self.fallback_mode = false;
                // a finished cake stays quiet until it is reset
                if !self.controller.celebration_triggered() {
                    self.detector.start();
                }
            }
            Acquisition::Denied(reason) => {
                warn!(reason = %reason, "switching to tap mode");
                self.enable_fallback();
            }
        }
    }

    pub fn enable_fallback(&mut self) {
        self.fallback_mode = true;
        self.detector.stop();
    }

    /// One sampling tick: detect, then hand any blow to the controller
    pub fn tick(&mut self, frequency_data: Option<&[u8]>) -> Option<BlowOutcome> {
        if self.controller.phase() == CakePhase::Complete {
            return None;
        }
        let blow = self.detector.tick(frequency_data)?;
        debug!(intensity = blow.intensity, strength = ?blow.strength, "blow detected");
        Some(self.controller.handle_blow(blow.intensity))
    }

    /// Tap the candle at a zero-based position
    pub fn tap(&mut self, index: usize) -> bool {
        match self.controller.registry().id_at(index) {
            Some(id) => self.controller.handle_tap(id).succeeded(),
            None => false,
        }
    }

    /// Start over with a fresh cake; detection must be re-acquired
    pub fn reset(&mut self) {
        info!("restarting session");
        self.detector.stop();
        self.fallback_mode = false;
        self.controller.reset(self.candle_count);
    }
}

/// Session handle shared between the sampling loop and input handling
#[derive(Clone)]
pub struct SharedSession(Arc<Mutex<Session>>);

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    /// Every mutation happens under this guard
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What a candle looks like right now
#[derive(Debug, Clone)]
pub struct CandleView {
    pub id: CandleId,
    pub lit: bool,
    /// Percent across the cake
    pub x: f32,
    flicker: f32,
    flicker_until: Option<Instant>,
}

impl CandleView {
    /// Remaining flicker strength, fading out linearly
    pub fn flicker_level(&self, now: Instant) -> f32 {
        match self.flicker_until {
            Some(until) if until > now => {
                let decay = Duration::from_millis(ui::FLICKER_DECAY_MS).as_secs_f32();
                self.flicker * (until - now).as_secs_f32() / decay
            }
            _ => 0.0,
        }
    }

    /// Flame level for the registry: a flickering flame burns lower
    pub fn flame(&self, now: Instant) -> f32 {
        if !self.lit {
            return 0.0;
        }
        1.0 - 0.5 * self.flicker_level(now)
    }
}

/// Which screen is showing
pub enum Screen {
    Cake,
    Celebrating { since: Instant },
    Wishes(Slideshow),
}

/// Presentation state driven by cake events
pub struct AppState {
    pub device_name: Option<String>,
    pub instructions: String,
    pub status: String,
    pub candles: Vec<CandleView>,
    pub lit: usize,
    pub total: usize,
    pub progress_percent: f64,
    pub threshold: f32,
    pub bands: BlowBands,
    pub last_blow: Option<BlowStrength>,
    pub fallback_mode: bool,
    pub meter: IntensityMeter,
    pub screen: Screen,
}

impl AppState {
    pub fn new(session: &Session) -> Self {
        let mut state = Self {
            device_name: None,
            instructions: BLOW_INSTRUCTIONS.to_string(),
            status: String::new(),
            candles: Vec::new(),
            lit: 0,
            total: 0,
            progress_percent: 0.0,
            threshold: session.detector.threshold(),
            bands: session.detector.bands(),
            last_blow: None,
            fallback_mode: false,
            meter: IntensityMeter::default(),
            screen: Screen::Cake,
        };
        state.sync(session);
        state
    }

    /// Rebuild everything from the session (start and restart)
    pub fn sync(&mut self, session: &Session) {
        let registry = session.controller.registry();
        self.candles = registry
            .iter()
            .map(|c| CandleView {
                id: c.id(),
                lit: c.is_lit(),
                x: c.position().x,
                flicker: 0.0,
                flicker_until: None,
            })
            .collect();
        self.lit = registry.count_lit();
        self.total = registry.count_total();
        self.progress_percent = session.controller.progress_percent();
        self.status = session.controller.remaining_message();
        self.threshold = session.detector.threshold();
        self.bands = session.detector.bands();
        self.last_blow = None;
        self.set_fallback(session.fallback_mode);
        self.meter.reset();
        self.screen = Screen::Cake;
    }

    pub fn set_fallback(&mut self, enabled: bool) {
        self.fallback_mode = enabled;
        self.instructions = if enabled {
            TAP_INSTRUCTIONS.to_string()
        } else {
            BLOW_INSTRUCTIONS.to_string()
        };
    }

    /// React to one controller event
    pub fn apply(&mut self, event: &CakeEvent, now: Instant) {
        match event {
            CakeEvent::CandleExtinguished(id) => {
                if let Some(view) = self.candles.iter_mut().find(|c| c.id == *id) {
                    view.lit = false;
                    view.flicker_until = None;
                }
            }
            CakeEvent::Flicker { id, intensity } => {
                if let Some(view) = self.candles.iter_mut().find(|c| c.id == *id && c.lit) {
                    view.flicker = intensity.clamp(0.0, 1.0);
                    view.flicker_until = Some(now + Duration::from_millis(ui::FLICKER_DECAY_MS));
                }
            }
            CakeEvent::ProgressChanged { lit, total } => {
                self.lit = *lit;
                self.total = *total;
                self.progress_percent = if *total > 0 {
                    (*total - *lit) as f64 / *total as f64 * 100.0
                } else {
                    0.0
                };
                self.status = remaining_message(*lit);
            }
            CakeEvent::AllExtinguished => {
                self.instructions = "Your wishes are coming true!".to_string();
                self.screen = Screen::Celebrating { since: now };
            }
        }
    }

    /// Move from the celebration to the slideshow once the delay is over
    pub fn celebration_finished(&self, now: Instant) -> bool {
        match self.screen {
            Screen::Celebrating { since } => {
                now.duration_since(since) >= Duration::from_millis(ui::CELEBRATION_DELAY_MS)
            }
            _ => false,
        }
    }
}
