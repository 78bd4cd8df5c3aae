//! Deterministic LCG for virus placement and capsule colours.

use crate::segment::Colour;

/// Linear congruential generator; same seed, same game.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        // A zero state would still advance, but keep seeds distinct from the increment.
        let state = if seed == 0 { 0x1234_5678 } else { seed };
        Self { state }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12345);
        self.state >> 16
    }

    /// Value in `0..max`; `max` of 0 yields 0.
    pub fn next_below(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.next_u32() % max
    }

    pub fn colour(&mut self) -> Colour {
        Colour::from_index(self.next_below(3) as usize)
    }

    /// Random ordered pair for a capsule (all nine combinations).
    pub fn colour_pair(&mut self) -> [Colour; 2] {
        [self.colour(), self.colour()]
    }
}

impl Default for Rng {
    fn default() -> Self {
        Self::new(0x1234_5678)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Rng::new(42);
        let mut b = Rng::new(42);
        for _ in 0..32 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn next_below_stays_in_range() {
        let mut rng = Rng::new(7);
        for _ in 0..1000 {
            assert!(rng.next_below(5) < 5);
        }
        assert_eq!(rng.next_below(0), 0);
    }

    #[test]
    fn colour_pairs_cover_all_colours() {
        let mut rng = Rng::new(99);
        let mut seen = [false; 3];
        for _ in 0..200 {
            for c in rng.colour_pair() {
                seen[c.index()] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }
}
