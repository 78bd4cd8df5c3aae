//! Level setup: virus quota, paced virus insertion, drop speed.

use crate::bottle::{Bottle, VirusRules};
use crate::cascade::BottleEvent;
use crate::rng::Rng;

/// Highest level with its own quota; higher requests are clamped.
pub const MAX_LEVEL: u32 = 20;

/// Ticks the whole virus fill should take, whatever the quota.
const GENERATION_TICKS: f32 = 40.0;

/// Ticks per row of capsule fall, fastest last.
const DROP_TICKS: [u32; 32] = [
    40, 38, 36, 34, 32, 30, 28, 26, 24, 22, 20, 19, 18, 17, 16, 15, 14, 13, 12, 11, 10, 9, 8, 7,
    6, 6, 5, 5, 4, 4, 3, 3,
];

/// Capsules locked per one-step speed-up.
pub const CAPSULES_PER_SPEEDUP: u32 = 10;

/// Base fall speed and virus score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Speed {
    #[default]
    Low,
    Med,
    Hi,
}

impl Speed {
    fn table_offset(self) -> usize {
        match self {
            Self::Low => 0,
            Self::Med => 5,
            Self::Hi => 10,
        }
    }

    /// Points for the first virus of a chain.
    pub fn virus_points(self) -> u32 {
        match self {
            Self::Low => 100,
            Self::Med => 200,
            Self::Hi => 300,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Med => "MED",
            Self::Hi => "HI",
        }
    }
}

#[inline]
pub fn clamp_level(level: u32) -> u32 {
    level.min(MAX_LEVEL)
}

/// Viruses to place for `level`.
pub fn virus_quota(level: u32) -> u32 {
    (clamp_level(level) + 1) * 4
}

/// Topmost row viruses may use; later levels fill higher.
pub fn virus_min_row(level: u32) -> usize {
    match clamp_level(level) {
        0..=14 => 6,
        15..=16 => 5,
        17..=18 => 4,
        _ => 3,
    }
}

/// Ticks between gravity steps of the falling capsule.
pub fn drop_interval(level: u32, speed: Speed, speedups: u32) -> u32 {
    let index = clamp_level(level) as usize / 2 + speed.table_offset() + speedups as usize;
    DROP_TICKS[index.min(DROP_TICKS.len() - 1)]
}

/// Fills the bottle with its quota a few viruses per tick, then reports
/// `DropComplete` once so the first capsule can spawn.
#[derive(Debug, Clone)]
pub struct LevelGenerator {
    level: u32,
    quota: u32,
    /// Fractional ticks per insertion; below 1.0 means several per tick.
    ticks_per_insert: f32,
    budget: f32,
    rules: VirusRules,
    done: bool,
}

impl LevelGenerator {
    pub fn new(level: u32, match_length: usize) -> Self {
        let level = clamp_level(level);
        let quota = virus_quota(level);
        log::info!("level {}: {} viruses", level, quota);
        Self {
            level,
            quota,
            ticks_per_insert: GENERATION_TICKS / quota as f32,
            budget: 0.0,
            rules: VirusRules {
                min_row: virus_min_row(level),
                match_length,
            },
            done: false,
        }
    }

    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[inline]
    pub fn quota(&self) -> u32 {
        self.quota
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// One pacing tick.
    pub fn update(&mut self, bottle: &mut Bottle, rng: &mut Rng) -> Option<BottleEvent> {
        if self.done {
            return None;
        }
        let remaining = self.quota.saturating_sub(bottle.virus_count());
        if remaining > 0 {
            self.budget += 1.0;
            let wanted = (self.budget / self.ticks_per_insert) as u32;
            if wanted > 0 {
                let placed = bottle.insert_virus(rng, wanted, remaining, self.rules);
                self.budget -= placed as f32 * self.ticks_per_insert;
                // Don't bank a burst while placement is stalled.
                self.budget = self.budget.min(self.ticks_per_insert);
            }
        }
        if bottle.virus_count() >= self.quota {
            self.done = true;
            log::debug!("generation done: {} viruses", bottle.virus_count());
            return Some(BottleEvent::DropComplete);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_grows_by_four_and_clamps() {
        assert_eq!(virus_quota(0), 4);
        assert_eq!(virus_quota(1), 8);
        assert_eq!(virus_quota(20), 84);
        assert_eq!(virus_quota(99), 84);
    }

    #[test]
    fn drop_interval_clamps_to_table() {
        assert_eq!(drop_interval(0, Speed::Low, 0), DROP_TICKS[0]);
        assert_eq!(drop_interval(99, Speed::Hi, 999), *DROP_TICKS.last().unwrap());
        assert!(drop_interval(0, Speed::Hi, 0) < drop_interval(0, Speed::Low, 0));
        assert!(drop_interval(0, Speed::Low, 3) < drop_interval(0, Speed::Low, 0));
    }

    #[test]
    fn level_zero_fills_one_at_a_time() {
        let mut bottle = Bottle::new();
        let mut rng = Rng::new(1);
        let mut generator = LevelGenerator::new(0, 4);
        let mut completions = 0;
        let mut last = 0;
        for _ in 0..200 {
            let event = generator.update(&mut bottle, &mut rng);
            let count = bottle.virus_count();
            assert!(count <= last + 1);
            if event == Some(BottleEvent::DropComplete) {
                completions += 1;
                assert_eq!(count, 4);
                assert!(count > last, "completion fires on the last insertion tick");
            }
            last = count;
        }
        assert_eq!(completions, 1);
        assert_eq!(bottle.virus_count(), 4);
        assert!(generator.is_done());
    }

    #[test]
    fn high_levels_insert_several_per_tick() {
        let mut bottle = Bottle::new();
        let mut rng = Rng::new(2);
        let mut generator = LevelGenerator::new(20, 4);
        generator.update(&mut bottle, &mut rng);
        assert!(bottle.virus_count() >= 2);
        let mut ticks = 1;
        while !generator.is_done() && ticks < 500 {
            generator.update(&mut bottle, &mut rng);
            ticks += 1;
        }
        assert_eq!(bottle.virus_count(), 84);
        assert_eq!(bottle.virus_count(), bottle.count_viruses());
    }

    #[test]
    fn viruses_stay_below_ceiling() {
        let mut bottle = Bottle::new();
        let mut rng = Rng::new(3);
        let mut generator = LevelGenerator::new(10, 4);
        while !generator.is_done() {
            generator.update(&mut bottle, &mut rng);
        }
        for y in 0..virus_min_row(10) as i32 {
            for x in 0..8 {
                assert!(bottle.is_empty_at(x, y));
            }
        }
    }
}
