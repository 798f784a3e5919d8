//! Candle records and the registry that owns them

use std::fmt;

/// Identifier of a candle. Never reused, not even across resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandleId(usize);

impl CandleId {
    /// Creation sequence number
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "candle-{}", self.0)
    }
}

/// Normalized layout coordinate (x in percent of the cake width)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// A single candle on the cake
#[derive(Debug, Clone)]
pub struct Candle {
    id: CandleId,
    is_lit: bool,
    flame_intensity: f32,
    position: Position,
}

impl Candle {
    fn new(id: CandleId, position: Position) -> Self {
        Self {
            id,
            is_lit: true,
            flame_intensity: 1.0,
            position,
        }
    }

    pub fn id(&self) -> CandleId {
        self.id
    }

    pub fn is_lit(&self) -> bool {
        self.is_lit
    }

    pub fn flame_intensity(&self) -> f32 {
        self.flame_intensity
    }

    pub fn position(&self) -> Position {
        self.position
    }

    fn extinguish(&mut self) {
        self.is_lit = false;
        self.flame_intensity = 0.0;
    }
}

/// Ordered collection of candles; iteration order is creation order.
///
/// The registry only stores and looks up. Deciding which candle goes out is
/// the controller's job, so the mutators are crate-private.
#[derive(Debug, Clone)]
pub struct CandleRegistry {
    candles: Vec<Candle>,
}

impl CandleRegistry {
    /// Create `count` lit candles spread evenly across the cake
    pub fn new(count: usize) -> Self {
        Self::starting_at(0, count)
    }

    /// Like `new`, numbering the candles from `first_id`
    pub fn starting_at(first_id: usize, count: usize) -> Self {
        let spacing = 100.0 / (count as f32 + 1.0);
        let candles = (0..count)
            .map(|i| {
                Candle::new(
                    CandleId(first_id + i),
                    Position {
                        x: spacing * (i as f32 + 1.0),
                        y: 0.0,
                    },
                )
            })
            .collect();

        Self { candles }
    }

    /// Ids of lit candles in registry order
    pub fn all_lit(&self) -> Vec<CandleId> {
        self.candles
            .iter()
            .filter(|c| c.is_lit)
            .map(|c| c.id)
            .collect()
    }

    pub fn count_lit(&self) -> usize {
        self.candles.iter().filter(|c| c.is_lit).count()
    }

    pub fn count_total(&self) -> usize {
        self.candles.len()
    }

    /// Unknown ids report unlit
    pub fn is_lit(&self, id: CandleId) -> bool {
        self.get(id).is_some_and(Candle::is_lit)
    }

    pub fn get(&self, id: CandleId) -> Option<&Candle> {
        self.candles.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: CandleId) -> Option<&mut Candle> {
        self.candles.iter_mut().find(|c| c.id == id)
    }

    /// One past the highest id in use
    pub fn next_id(&self) -> usize {
        self.candles.last().map_or(0, |c| c.id.index() + 1)
    }

    /// Look up the candle at a zero-based position
    pub fn id_at(&self, index: usize) -> Option<CandleId> {
        self.candles.get(index).map(|c| c.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    /// Returns false when the candle is absent or already out
    pub(crate) fn extinguish(&mut self, id: CandleId) -> bool {
        match self.get_mut(id) {
            Some(candle) if candle.is_lit => {
                candle.extinguish();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn set_flame_intensity(&mut self, id: CandleId, intensity: f32) -> bool {
        match self.get_mut(id) {
            Some(candle) if candle.is_lit => {
                candle.flame_intensity = intensity.clamp(0.0, 1.0);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_registry_is_all_lit() {
        let registry = CandleRegistry::new(7);
        assert_eq!(registry.count_total(), 7);
        assert_eq!(registry.count_lit(), 7);
        assert!(registry.iter().all(|c| c.flame_intensity() == 1.0));
    }

    #[test]
    fn test_positions_are_evenly_spaced() {
        let registry = CandleRegistry::new(3);
        let xs: Vec<f32> = registry.iter().map(|c| c.position().x).collect();
        assert_eq!(xs, vec![25.0, 50.0, 75.0]);
    }

    #[test]
    fn test_extinguish_zeroes_flame() {
        let mut registry = CandleRegistry::new(2);
        let id = registry.id_at(1).unwrap();
        assert!(registry.extinguish(id));

        let candle = registry.get(id).unwrap();
        assert!(!candle.is_lit());
        assert_eq!(candle.flame_intensity(), 0.0);
        assert!(!registry.extinguish(id));
    }

    #[test]
    fn test_unknown_id_is_absent_and_unlit() {
        let registry = CandleRegistry::new(3);
        let stray = CandleId(42);
        assert!(registry.get(stray).is_none());
        assert!(!registry.is_lit(stray));
        assert_eq!(stray.to_string(), "candle-42");
    }

    #[test]
    fn test_flame_intensity_is_clamped_and_ignored_when_out() {
        let mut registry = CandleRegistry::new(1);
        let id = registry.id_at(0).unwrap();

        assert!(registry.set_flame_intensity(id, 3.0));
        assert_eq!(registry.get(id).unwrap().flame_intensity(), 1.0);
        assert!(registry.set_flame_intensity(id, -1.0));
        assert_eq!(registry.get(id).unwrap().flame_intensity(), 0.0);

        registry.extinguish(id);
        assert!(!registry.set_flame_intensity(id, 0.5));
        assert_eq!(registry.get(id).unwrap().flame_intensity(), 0.0);
    }

    #[test]
    fn test_numbering_can_continue() {
        let registry = CandleRegistry::starting_at(5, 3);
        let ids: Vec<usize> = registry.iter().map(|c| c.id().index()).collect();
        assert_eq!(ids, vec![5, 6, 7]);
        assert_eq!(registry.next_id(), 8);
        assert_eq!(registry.id_at(0), Some(CandleId(5)));

        // ids from an earlier numbering are unknown
        let mut registry = registry;
        assert!(registry.get(CandleId(0)).is_none());
        assert!(!registry.extinguish(CandleId(0)));
        assert!(!registry.set_flame_intensity(CandleId(1), 0.5));
        assert_eq!(registry.count_lit(), 3);
    }

    proptest! {
        #[test]
        fn prop_ids_are_unique_and_sequential(count in 1usize..=10) {
            let registry = CandleRegistry::new(count);
            prop_assert_eq!(registry.count_total(), count);
            for (i, candle) in registry.iter().enumerate() {
                prop_assert_eq!(candle.id().index(), i);
                prop_assert!(candle.is_lit());
            }
        }

        #[test]
        fn prop_extinguish_has_no_cross_talk(count in 1usize..=10, pick in 0usize..10) {
            let mut registry = CandleRegistry::new(count);
            let target = registry.id_at(pick % count).unwrap();

            prop_assert!(registry.extinguish(target));
            prop_assert!(!registry.is_lit(target));
            prop_assert_eq!(registry.count_lit(), count - 1);
            for candle in registry.iter().filter(|c| c.id() != target) {
                prop_assert!(candle.is_lit());
            }
        }
    }
}
