//! Extinguish state machine: turns blows and taps into candle transitions

use crate::candle::{CandleId, CandleRegistry};
use crate::constants::detection;
use crate::detector::{BlowBands, BlowStrength};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Everything the presentation layer needs to hear about
#[derive(Debug, Clone, PartialEq)]
pub enum CakeEvent {
    CandleExtinguished(CandleId),
    Flicker { id: CandleId, intensity: f32 },
    ProgressChanged { lit: usize, total: usize },
    AllExtinguished,
}

/// Result of a single-candle request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extinguish {
    /// The candle went out
    Done,
    /// The candle was absent or already out; nothing changed
    AlreadySatisfied,
}

impl Extinguish {
    pub fn succeeded(self) -> bool {
        self == Extinguish::Done
    }
}

/// What one blow did to the cake
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlowOutcome {
    pub strength: Option<BlowStrength>,
    pub extinguished: Vec<CandleId>,
}

/// Phase of the cake for the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CakePhase {
    /// At least one candle is lit
    Active,
    /// Every candle is out; terminal until reset
    Complete,
}

/// Owns the registry and is the only path that mutates it
pub struct ExtinguishController {
    registry: CandleRegistry,
    bands: BlowBands,
    celebration_triggered: bool,
    subscribers: Vec<mpsc::UnboundedSender<CakeEvent>>,
}

impl ExtinguishController {
    pub fn new(candle_count: usize, bands: BlowBands) -> Self {
        Self {
            registry: CandleRegistry::new(candle_count),
            bands,
            celebration_triggered: false,
            subscribers: Vec::new(),
        }
    }

    /// Register a new listener for cake events
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<CakeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn registry(&self) -> &CandleRegistry {
        &self.registry
    }

    pub fn celebration_triggered(&self) -> bool {
        self.celebration_triggered
    }

    pub fn phase(&self) -> CakePhase {
        if self.registry.count_lit() == 0 {
            CakePhase::Complete
        } else {
            CakePhase::Active
        }
    }

    /// Put out one candle and settle the terminal check
    pub fn extinguish_one(&mut self, id: CandleId) -> Extinguish {
        let outcome = self.apply(id);
        if outcome.succeeded() {
            self.settle();
        }
        outcome
    }

    /// Manual fallback path; always honoured regardless of fallback mode
    pub fn handle_tap(&mut self, id: CandleId) -> Extinguish {
        debug!(candle = %id, "tap");
        self.extinguish_one(id)
    }

    /// React to a blow of the given intensity.
    ///
    /// All extinguishes of one call land before the terminal check, so no
    /// observer sees half of a strong blow.
    pub fn handle_blow(&mut self, intensity: f32) -> BlowOutcome {
        let lit = self.registry.all_lit();
        if lit.is_empty() {
            return BlowOutcome::default();
        }

        let Some(strength) = self.bands.classify(intensity) else {
            return BlowOutcome::default();
        };

        let mut outcome = BlowOutcome {
            strength: Some(strength),
            ..BlowOutcome::default()
        };

        match strength {
            BlowStrength::Strong | BlowStrength::Medium => {
                let take = if strength == BlowStrength::Strong {
                    detection::STRONG_BLOW_CANDLES
                } else {
                    1
                };
                for id in lit.into_iter().take(take) {
                    if self.apply(id).succeeded() {
                        outcome.extinguished.push(id);
                    }
                }
            }
            BlowStrength::Light => {
                for id in lit {
                    self.emit(CakeEvent::Flicker { id, intensity });
                }
            }
        }

        debug!(
            intensity,
            ?strength,
            extinguished = outcome.extinguished.len(),
            "blow"
        );

        if !outcome.extinguished.is_empty() {
            self.settle();
        }
        outcome
    }

    /// Visual-only flame level; ignored for unlit or unknown candles
    pub fn set_flame_intensity(&mut self, id: CandleId, intensity: f32) -> bool {
        self.registry.set_flame_intensity(id, intensity)
    }

    /// Recreate the whole cake with fresh, lit candles.
    ///
    /// Numbering continues, so ids held from the old cake match nothing.
    pub fn reset(&mut self, candle_count: usize) {
        info!(candles = candle_count, "cake reset");
        self.registry = CandleRegistry::starting_at(self.registry.next_id(), candle_count);
        self.celebration_triggered = false;
        self.emit_progress();
    }

    /// (extinguished, total)
    pub fn progress(&self) -> (usize, usize) {
        let total = self.registry.count_total();
        (total - self.registry.count_lit(), total)
    }

    /// Share of candles already out, in percent
    pub fn progress_percent(&self) -> f64 {
        let (done, total) = self.progress();
        if total == 0 {
            return 0.0;
        }
        done as f64 / total as f64 * 100.0
    }

    pub fn remaining_message(&self) -> String {
        remaining_message(self.registry.count_lit())
    }

    fn apply(&mut self, id: CandleId) -> Extinguish {
        if self.registry.extinguish(id) {
            self.emit(CakeEvent::CandleExtinguished(id));
            Extinguish::Done
        } else {
            Extinguish::AlreadySatisfied
        }
    }

    fn settle(&mut self) {
        self.emit_progress();

        if self.registry.count_lit() == 0 && !self.celebration_triggered {
            self.celebration_triggered = true;
            info!("all candles extinguished");
            self.emit(CakeEvent::AllExtinguished);
        }
    }

    fn emit_progress(&mut self) {
        let lit = self.registry.count_lit();
        let total = self.registry.count_total();
        self.emit(CakeEvent::ProgressChanged { lit, total });
    }

    fn emit(&mut self, event: CakeEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Progress line shown under the cake
pub fn remaining_message(lit: usize) -> String {
    match lit {
        0 => "All wishes are on their way!".to_string(),
        1 => "Blow out 1 candle to see your wishes!".to_string(),
        n => format!("Blow out {} candles to see your wishes!", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn controller(count: usize) -> ExtinguishController {
        ExtinguishController::new(count, BlowBands::default())
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<CakeEvent>) -> Vec<CakeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn terminal_count(events: &[CakeEvent]) -> usize {
        events
            .iter()
            .filter(|e| **e == CakeEvent::AllExtinguished)
            .count()
    }

    #[test]
    fn test_strong_blow_takes_first_two_lit() {
        let mut ctl = controller(7);
        let outcome = ctl.handle_blow(0.9);

        assert_eq!(outcome.strength, Some(BlowStrength::Strong));
        let ids: Vec<usize> = outcome.extinguished.iter().map(|id| id.index()).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(ctl.registry().count_lit(), 5);
    }

    #[test]
    fn test_strong_blow_skips_already_out_candles() {
        let mut ctl = controller(4);
        let first = ctl.registry().id_at(0).unwrap();
        ctl.handle_tap(first);

        let outcome = ctl.handle_blow(0.75);
        let ids: Vec<usize> = outcome.extinguished.iter().map(|id| id.index()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(ctl.registry().count_lit(), 1);
    }

    #[test]
    fn test_strong_blow_with_one_left_takes_one() {
        let mut ctl = controller(3);
        ctl.handle_blow(0.9);
        let outcome = ctl.handle_blow(0.9);
        assert_eq!(outcome.extinguished.len(), 1);
        assert_eq!(ctl.phase(), CakePhase::Complete);
    }

    #[test]
    fn test_medium_blow_takes_exactly_one() {
        let mut ctl = controller(5);
        let outcome = ctl.handle_blow(0.5);
        assert_eq!(outcome.strength, Some(BlowStrength::Medium));
        assert_eq!(outcome.extinguished.len(), 1);
        assert_eq!(outcome.extinguished[0].index(), 0);
        assert_eq!(ctl.registry().count_lit(), 4);
    }

    #[test]
    fn test_light_blow_only_flickers() {
        let mut ctl = controller(3);
        let mut rx = ctl.subscribe();
        let outcome = ctl.handle_blow(0.35);

        assert_eq!(outcome.strength, Some(BlowStrength::Light));
        assert!(outcome.extinguished.is_empty());
        assert_eq!(ctl.registry().count_lit(), 3);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        assert!(
            events
                .iter()
                .all(|e| matches!(e, CakeEvent::Flicker { intensity, .. } if *intensity == 0.35))
        );
    }

    #[test]
    fn test_below_gate_emits_nothing() {
        let mut ctl = controller(3);
        let mut rx = ctl.subscribe();
        let outcome = ctl.handle_blow(0.2);

        assert_eq!(outcome, BlowOutcome::default());
        assert!(drain(&mut rx).is_empty());

        let outcome = ctl.handle_blow(f32::NAN);
        assert_eq!(outcome, BlowOutcome::default());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(ctl.registry().count_lit(), 3);
    }

    #[test]
    fn test_single_candle_medium_blow_completes_once() {
        let mut ctl = controller(1);
        let mut rx = ctl.subscribe();

        ctl.handle_blow(0.5);
        assert_eq!(ctl.registry().count_lit(), 0);
        assert!(ctl.celebration_triggered());

        ctl.handle_blow(0.9);
        ctl.handle_tap(ctl.registry().id_at(0).unwrap());

        let events = drain(&mut rx);
        assert_eq!(terminal_count(&events), 1);
        assert_eq!(
            events,
            vec![
                CakeEvent::CandleExtinguished(ctl.registry().id_at(0).unwrap()),
                CakeEvent::ProgressChanged { lit: 0, total: 1 },
                CakeEvent::AllExtinguished,
            ]
        );
    }

    #[test]
    fn test_strong_blow_is_atomic_for_observers() {
        let mut ctl = controller(2);
        let mut rx = ctl.subscribe();
        ctl.handle_blow(0.9);

        let events = drain(&mut rx);
        // both extinguishes, then a single progress update, then the terminal signal
        assert!(matches!(events[0], CakeEvent::CandleExtinguished(_)));
        assert!(matches!(events[1], CakeEvent::CandleExtinguished(_)));
        assert_eq!(events[2], CakeEvent::ProgressChanged { lit: 0, total: 2 });
        assert_eq!(events[3], CakeEvent::AllExtinguished);
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn test_tap_is_idempotent() {
        let mut ctl = controller(3);
        let id = ctl.registry().id_at(2).unwrap();

        assert_eq!(ctl.handle_tap(id), Extinguish::Done);
        assert_eq!(ctl.handle_tap(id), Extinguish::AlreadySatisfied);
        assert_eq!(ctl.registry().count_lit(), 2);
    }

    #[test]
    fn test_unknown_candle_is_absorbed() {
        let mut ctl = controller(3);
        let other = controller(10);
        let stray = other.registry().id_at(9).unwrap();

        assert_eq!(ctl.extinguish_one(stray), Extinguish::AlreadySatisfied);
        assert_eq!(ctl.registry().count_lit(), 3);
    }

    #[test]
    fn test_reset_rearms_celebration() {
        let mut ctl = controller(1);
        let mut rx = ctl.subscribe();
        ctl.handle_blow(0.5);
        assert_eq!(ctl.phase(), CakePhase::Complete);

        ctl.reset(2);
        assert!(!ctl.celebration_triggered());
        assert_eq!(ctl.registry().count_lit(), 2);
        assert_eq!(ctl.phase(), CakePhase::Active);

        ctl.handle_blow(0.9);
        assert_eq!(terminal_count(&drain(&mut rx)), 2);
    }

    #[test]
    fn test_ids_from_before_reset_match_nothing() {
        let mut ctl = controller(3);
        let stale = ctl.registry().id_at(1).unwrap();

        ctl.reset(3);
        assert_eq!(ctl.handle_tap(stale), Extinguish::AlreadySatisfied);
        assert!(!ctl.set_flame_intensity(stale, 0.5));
        assert_eq!(ctl.registry().count_lit(), 3);

        let fresh: Vec<usize> = ctl.registry().iter().map(|c| c.id().index()).collect();
        assert_eq!(fresh, vec![3, 4, 5]);
    }

    #[test]
    fn test_closed_subscribers_are_pruned() {
        let mut ctl = controller(2);
        let rx = ctl.subscribe();
        let mut live = ctl.subscribe();
        drop(rx);

        ctl.handle_blow(0.5);
        assert_eq!(ctl.subscribers.len(), 1);
        assert_eq!(drain(&mut live).len(), 2);
    }

    #[test]
    fn test_progress_reporting() {
        let mut ctl = controller(4);
        assert_eq!(ctl.remaining_message(), "Blow out 4 candles to see your wishes!");
        ctl.handle_blow(0.9);
        ctl.handle_blow(0.5);
        assert_eq!(ctl.progress(), (3, 4));
        assert_eq!(ctl.progress_percent(), 75.0);
        assert_eq!(ctl.remaining_message(), "Blow out 1 candle to see your wishes!");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_lit_count_never_increases(
            count in 1usize..=10,
            actions in proptest::collection::vec((0.0f32..1.0, 0usize..12, any::<bool>()), 1..30),
        ) {
            let mut ctl = controller(count);
            let mut rx = ctl.subscribe();
            let mut previous = ctl.registry().count_lit();

            for (intensity, index, tap) in actions {
                if tap {
                    let before = ctl.registry().count_lit();
                    match ctl.registry().id_at(index) {
                        Some(id) => {
                            let was_lit = ctl.registry().is_lit(id);
                            let result = ctl.handle_tap(id);
                            prop_assert_eq!(result.succeeded(), was_lit);
                        }
                        None => prop_assert_eq!(ctl.registry().count_lit(), before),
                    }
                } else {
                    ctl.handle_blow(intensity);
                }

                let now = ctl.registry().count_lit();
                prop_assert!(now <= previous);
                previous = now;
            }

            let fired = terminal_count(&drain(&mut rx));
            prop_assert_eq!(fired, usize::from(ctl.registry().count_lit() == 0));
            prop_assert_eq!(ctl.celebration_triggered(), ctl.registry().count_lit() == 0);
        }

        #[test]
        fn prop_unlit_candles_have_no_flame(count in 1usize..=10, blows in 1usize..6) {
            let mut ctl = controller(count);
            for _ in 0..blows {
                ctl.handle_blow(0.9);
            }
            for candle in ctl.registry().iter() {
                if !candle.is_lit() {
                    prop_assert_eq!(candle.flame_intensity(), 0.0);
                }
            }
        }
    }
}
