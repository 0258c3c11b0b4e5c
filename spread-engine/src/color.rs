use crate::model::Rgb;
use fnv::FnvHashMap;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::trace;

/// Assigns and caches a display colour per chart series slot.
///
/// A slot keeps its colour for the lifetime of the allocator (or until [`Self::reset`]).
/// Distinct slots may collide, no attempt is made to spread colours apart.
#[derive(Debug, Clone)]
pub struct ColorAllocator {
    cache: FnvHashMap<usize, Rgb>,
    rng: StdRng,
}

impl ColorAllocator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic allocator, used by tests & reproducible sessions.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            cache: FnvHashMap::default(),
            rng,
        }
    }

    /// Colour for the provided slot, generating and caching one on first request.
    pub fn color_for(&mut self, slot: usize) -> Rgb {
        *self.cache.entry(slot).or_insert_with(|| {
            let color = Rgb::new(self.rng.random(), self.rng.random(), self.rng.random());
            trace!(slot, %color, "allocated series colour");
            color
        })
    }

    /// Idempotently ensure slots `0..count` have a colour.
    ///
    /// Returns the number of newly allocated slots.
    pub fn register_slots(&mut self, count: usize) -> usize {
        let before = self.cache.len();
        for slot in 0..count {
            self.color_for(slot);
        }
        self.cache.len() - before
    }

    /// Cached colour without allocating.
    pub fn color(&self, slot: usize) -> Option<Rgb> {
        self.cache.get(&slot).copied()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn reset(&mut self) {
        self.cache.clear();
    }
}

impl Default for ColorAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_for_is_stable_per_slot() {
        let mut colors = ColorAllocator::seeded(42);
        let first = colors.color_for(0);
        let second = colors.color_for(1);

        for _ in 0..10 {
            assert_eq!(colors.color_for(0), first);
            assert_eq!(colors.color_for(1), second);
        }
        assert_eq!(colors.len(), 2);
    }

    #[test]
    fn test_register_slots_is_idempotent() {
        let mut colors = ColorAllocator::seeded(7);
        assert_eq!(colors.register_slots(3), 3);
        let snapshot: Vec<_> = (0..3).map(|slot| colors.color(slot)).collect();

        assert_eq!(colors.register_slots(3), 0);
        assert_eq!(colors.register_slots(2), 0);
        assert_eq!(colors.register_slots(4), 1);

        let after: Vec<_> = (0..3).map(|slot| colors.color(slot)).collect();
        assert_eq!(snapshot, after);
        assert!(colors.color(4).is_none());
    }

    #[test]
    fn test_reset_forgets_colours() {
        let mut colors = ColorAllocator::seeded(1);
        colors.register_slots(2);
        colors.reset();
        assert!(colors.is_empty());
        assert!(colors.color(0).is_none());
    }
}
