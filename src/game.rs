//! Game session: one bottle, the falling and preview capsules, the match engine
//! and the level generator, driven one tick at a time.
//!
//! Player intents are latched between ticks and consumed by the next [`GameState::tick`].
//! Capsule control is only enabled while the engine is idle and a capsule is in play,
//! so the bottle has a single writer at any moment.

use crate::bottle::Bottle;
use crate::capsule::{Capsule, Direction};
use crate::cascade::{BottleEvent, Centroid, EngineConfig, MatchEngine};
use crate::level::{self, LevelGenerator, Speed};
use crate::rng::Rng;

/// Score popup lifetime in ticks.
const POPUP_TICKS: u32 = 90;
/// Ticks per row a popup floats up.
const POPUP_RISE_TICKS: u32 = 15;
/// Chain bonus doubling stops after this many viruses.
const MAX_CHAIN_DOUBLINGS: u32 = 6;

/// Session options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    pub level: u32,
    pub speed: Speed,
    pub seed: u32,
    pub engine: EngineConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            level: 0,
            speed: Speed::Low,
            seed: 0x1234_5678,
            engine: EngineConfig::default(),
        }
    }
}

/// What the session is doing this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Viruses are being placed.
    Generating,
    /// Player controls the capsule.
    Playing,
    /// Match engine is running; no player control.
    Resolving,
    LevelClear,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    MoveLeft,
    MoveRight,
    RotateLeft,
    RotateRight,
    SoftDrop,
    HardDrop,
}

/// Intents latched since the last tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Intents {
    left: bool,
    right: bool,
    rotate_left: bool,
    rotate_right: bool,
    soft_drop: bool,
    hard_drop: bool,
}

/// Notifications for the front-end, drained after each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    MatchMade {
        viruses: u32,
        cascade: u32,
        centroid: Centroid,
        points: u32,
    },
    /// Next capsule is in play.
    DropComplete,
    /// Level cleared; call [`GameState::next_level`] to continue.
    BottleEmpty,
    GameOver,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScorePopup {
    pub x: f32,
    pub y: f32,
    pub amount: u32,
    pub cascade: u32,
    pub age_ticks: u32,
}

#[derive(Debug, Clone)]
pub struct GameState {
    config: GameConfig,
    bottle: Bottle,
    capsule: Capsule,
    next: Capsule,
    engine: MatchEngine,
    generator: LevelGenerator,
    rng: Rng,
    stage: Stage,
    /// Capsule accepts intents.
    control: bool,
    intents: Intents,
    events: Vec<GameEvent>,
    level: u32,
    score: u32,
    top_score: u32,
    tick: u64,
    drop_timer: u32,
    capsules_locked: u32,
    /// Viruses cleared since the last lock.
    chain_viruses: u32,
    popups: Vec<ScorePopup>,
}

impl GameState {
    pub fn new(config: GameConfig) -> Self {
        let mut rng = Rng::new(config.seed);
        let capsule = Capsule::new(rng.colour_pair());
        let next = Capsule::new(rng.colour_pair());
        let level = level::clamp_level(config.level);
        Self {
            config,
            bottle: Bottle::new(),
            capsule,
            next,
            engine: MatchEngine::new(config.engine),
            generator: LevelGenerator::new(level, config.engine.match_length),
            rng,
            stage: Stage::Generating,
            control: false,
            intents: Intents::default(),
            events: Vec::new(),
            level,
            score: 0,
            top_score: 0,
            tick: 0,
            drop_timer: 0,
            capsules_locked: 0,
            chain_viruses: 0,
            popups: Vec::new(),
        }
    }

    /// Session over a prepared bottle, skipping generation; the first capsule is in play.
    pub fn with_bottle(config: GameConfig, bottle: Bottle) -> Self {
        let mut state = Self::new(config);
        state.bottle = bottle;
        state.generator = LevelGenerator::new(state.level, config.engine.match_length);
        state.spawn_next();
        state.events.clear();
        state
    }

    fn start_level(&mut self, level: u32) {
        self.level = level;
        self.bottle.clear();
        self.engine.reset();
        self.generator = LevelGenerator::new(level, self.config.engine.match_length);
        self.stage = Stage::Generating;
        self.control = false;
        self.intents = Intents::default();
        self.drop_timer = 0;
        self.capsules_locked = 0;
        self.chain_viruses = 0;
        self.popups.clear();
    }

    /// Advance from a cleared bottle to the next level.
    pub fn next_level(&mut self) {
        if self.stage != Stage::LevelClear {
            return;
        }
        self.start_level(self.level + 1);
    }

    /// Start over from the configured level, keeping the session's top score.
    pub fn restart(&mut self) {
        self.score = 0;
        self.start_level(level::clamp_level(self.config.level));
    }

    /// Latch an intent for the next tick; ignored while control is disabled.
    pub fn press(&mut self, intent: Intent) {
        if !self.control {
            return;
        }
        let i = &mut self.intents;
        match intent {
            Intent::MoveLeft => i.left = true,
            Intent::MoveRight => i.right = true,
            Intent::RotateLeft => i.rotate_left = true,
            Intent::RotateRight => i.rotate_right = true,
            Intent::SoftDrop => i.soft_drop = true,
            Intent::HardDrop => i.hard_drop = true,
        }
    }

    /// One fixed-rate update.
    pub fn tick(&mut self) {
        self.tick += 1;
        self.tick_popups();
        match self.stage {
            Stage::Generating => {
                if let Some(event) = self.generator.update(&mut self.bottle, &mut self.rng) {
                    self.on_bottle_event(event);
                }
            }
            Stage::Playing => self.control_step(),
            Stage::Resolving => {
                if let Some(event) = self.engine.update(&mut self.bottle) {
                    self.on_bottle_event(event);
                }
            }
            Stage::LevelClear | Stage::GameOver => {}
        }
        self.intents = Intents::default();
    }

    fn control_step(&mut self) {
        let intents = std::mem::take(&mut self.intents);
        let bottle = &self.bottle;
        let capsule = &mut self.capsule;
        if intents.left {
            capsule.slide(bottle, Direction::Left);
        }
        if intents.right {
            capsule.slide(bottle, Direction::Right);
        }
        if intents.rotate_left {
            capsule.rotate(bottle, Direction::Left);
        }
        if intents.rotate_right {
            capsule.rotate(bottle, Direction::Right);
        }
        if intents.hard_drop {
            while capsule.drop(bottle) {}
            self.lock_capsule();
            return;
        }

        self.drop_timer += 1;
        if intents.soft_drop || self.drop_timer >= self.drop_interval() {
            self.drop_timer = 0;
            if !self.capsule.drop(&self.bottle) {
                self.lock_capsule();
            }
        }
    }

    /// Capsule can't fall further: write it and hand over to the engine.
    fn lock_capsule(&mut self) {
        self.control = false;
        if self.capsule.above_neck() {
            self.stage = Stage::GameOver;
            self.events.push(GameEvent::GameOver);
            log::info!("game over at level {} with score {}", self.level, self.score);
            return;
        }
        self.capsule.apply(&mut self.bottle);
        self.capsules_locked += 1;
        self.chain_viruses = 0;
        self.stage = Stage::Resolving;
        self.engine.trigger();
    }

    fn on_bottle_event(&mut self, event: BottleEvent) {
        match event {
            BottleEvent::MatchMade {
                viruses,
                cascade,
                centroid,
            } => {
                let points = self.score_viruses(viruses);
                if points > 0 {
                    self.popups.push(ScorePopup {
                        x: centroid.x,
                        y: centroid.y,
                        amount: points,
                        cascade,
                        age_ticks: 0,
                    });
                }
                self.events.push(GameEvent::MatchMade {
                    viruses,
                    cascade,
                    centroid,
                    points,
                });
            }
            BottleEvent::DropComplete => {
                self.spawn_next();
            }
            BottleEvent::BottleEmpty => {
                self.stage = Stage::LevelClear;
                self.control = false;
                self.events.push(GameEvent::BottleEmpty);
                log::info!("level {} cleared, score {}", self.level, self.score);
            }
        }
    }

    /// Chain scoring: the k-th virus since the last lock is worth base * 2^(k-1).
    fn score_viruses(&mut self, viruses: u32) -> u32 {
        let base = self.config.speed.virus_points();
        let mut points = 0;
        for _ in 0..viruses {
            self.chain_viruses += 1;
            points += base << (self.chain_viruses.min(MAX_CHAIN_DOUBLINGS) - 1);
        }
        self.score += points;
        self.top_score = self.top_score.max(self.score);
        points
    }

    /// Promote the preview capsule and roll a new preview.
    fn spawn_next(&mut self) {
        self.capsule.reset(self.next.colours);
        self.next.reset(self.rng.colour_pair());
        self.stage = Stage::Playing;
        self.control = true;
        self.drop_timer = 0;
        self.events.push(GameEvent::DropComplete);
    }

    fn tick_popups(&mut self) {
        self.popups.retain_mut(|p| {
            p.age_ticks += 1;
            if p.age_ticks % POPUP_RISE_TICKS == 0 && p.y > 0.0 {
                p.y -= 1.0;
            }
            p.age_ticks < POPUP_TICKS
        });
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = GameEvent> + '_ {
        self.events.drain(..)
    }

    #[inline]
    pub fn drop_interval(&self) -> u32 {
        level::drop_interval(
            self.level,
            self.config.speed,
            self.capsules_locked / level::CAPSULES_PER_SPEEDUP,
        )
    }

    pub fn bottle(&self) -> &Bottle {
        &self.bottle
    }

    /// Falling capsule, while the player controls it.
    pub fn capsule(&self) -> Option<&Capsule> {
        (self.stage == Stage::Playing).then_some(&self.capsule)
    }

    pub fn next_capsule(&self) -> &Capsule {
        &self.next
    }

    pub fn engine(&self) -> &MatchEngine {
        &self.engine
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn has_control(&self) -> bool {
        self.control
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn speed(&self) -> Speed {
        self.config.speed
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn top_score(&self) -> u32 {
        self.top_score
    }

    /// Keep the best score across sessions started from the menu.
    pub fn carry_top_score(&mut self, top: u32) {
        self.top_score = self.top_score.max(top);
    }

    pub fn virus_count(&self) -> u32 {
        self.bottle.virus_count()
    }

    pub fn virus_quota(&self) -> u32 {
        self.generator.quota()
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn popups(&self) -> &[ScorePopup] {
        &self.popups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capsule::Orientation;
    use crate::segment::{Colour, Segment, SegmentKind};

    fn config() -> GameConfig {
        GameConfig {
            seed: 9,
            engine: EngineConfig {
                match_length: 4,
                clear_delay_ticks: 2,
                settle_ticks: 0,
            },
            ..GameConfig::default()
        }
    }

    fn run(state: &mut GameState, ticks: u32) -> Vec<GameEvent> {
        let mut out = Vec::new();
        for _ in 0..ticks {
            state.tick();
            out.extend(state.drain_events());
        }
        out
    }

    #[test]
    fn generation_hands_over_to_the_player() {
        let mut state = GameState::new(config());
        assert_eq!(state.stage(), Stage::Generating);
        assert!(state.capsule().is_none());
        let events = run(&mut state, 60);
        assert_eq!(
            events.iter().filter(|e| **e == GameEvent::DropComplete).count(),
            1
        );
        assert_eq!(state.virus_count(), 4);
        assert_eq!(state.stage(), Stage::Playing);
        assert!(state.has_control());
    }

    #[test]
    fn intents_ignored_without_control() {
        let mut state = GameState::new(config());
        state.press(Intent::HardDrop);
        assert_eq!(state.intents, Intents::default());
    }

    #[test]
    fn hard_drop_locks_and_resolves() {
        let mut bottle = Bottle::new();
        bottle.set(0, 15, Segment::virus(Colour::Red, 0));
        let mut state = GameState::with_bottle(config(), bottle);
        assert_eq!(state.stage(), Stage::Playing);
        state.press(Intent::HardDrop);
        state.tick();
        assert_eq!(state.stage(), Stage::Resolving);
        assert!(!state.has_control());
        assert!(!state.bottle().is_empty_at(3, 15));
        let events = run(&mut state, 5);
        assert!(events.contains(&GameEvent::DropComplete));
        assert_eq!(state.stage(), Stage::Playing);
        assert_eq!(state.capsule().map(|c| c.y), Some(-1));
    }

    #[test]
    fn slide_and_rotate_are_consumed_once() {
        let mut bottle = Bottle::new();
        bottle.set(0, 15, Segment::virus(Colour::Red, 0));
        let mut state = GameState::with_bottle(config(), bottle);
        state.press(Intent::MoveLeft);
        state.tick();
        assert_eq!(state.capsule().map(|c| c.x), Some(2));
        state.tick();
        assert_eq!(state.capsule().map(|c| c.x), Some(2));
        state.press(Intent::RotateRight);
        state.tick();
        assert_eq!(
            state.capsule().map(|c| c.orientation),
            Some(Orientation::Vertical)
        );
    }

    #[test]
    fn blocked_neck_is_game_over() {
        let mut bottle = Bottle::new();
        bottle.set(3, 0, Segment::virus(Colour::Red, 0));
        bottle.set(4, 0, Segment::virus(Colour::Blue, 0));
        let mut state = GameState::with_bottle(config(), bottle);
        state.press(Intent::SoftDrop);
        state.tick();
        let events: Vec<_> = state.drain_events().collect();
        assert_eq!(events, vec![GameEvent::GameOver]);
        assert_eq!(state.stage(), Stage::GameOver);
        assert!(state.capsule().is_none());
    }

    #[test]
    fn clearing_last_virus_ends_level() {
        let mut bottle = Bottle::new();
        bottle.set(3, 15, Segment::virus(Colour::Red, 0));
        bottle.set(3, 14, Segment::new(SegmentKind::Single, Colour::Red));
        let mut state = GameState::with_bottle(config(), bottle);
        state.capsule = Capsule {
            colours: [Colour::Red, Colour::Red],
            orientation: Orientation::Vertical,
            x: 3,
            y: 0,
        };
        state.press(Intent::HardDrop);
        let events = run(&mut state, 20);
        let points = Speed::Low.virus_points();
        assert!(events.contains(&GameEvent::BottleEmpty));
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::MatchMade { viruses: 1, cascade: 0, points: p, .. } if *p == points
        )));
        assert_eq!(state.stage(), Stage::LevelClear);
        assert_eq!(state.score(), points);
        assert_eq!(state.popups().len(), 1);

        state.next_level();
        assert_eq!(state.level(), 1);
        assert_eq!(state.stage(), Stage::Generating);
        run(&mut state, 60);
        assert_eq!(state.virus_count(), 8);
    }

    #[test]
    fn chain_scoring_doubles() {
        let mut state = GameState::new(config());
        assert_eq!(state.score_viruses(3), 100 + 200 + 400);
        assert_eq!(state.score_viruses(1), 800);
        assert_eq!(state.top_score(), 1500);
    }

    #[test]
    fn restart_keeps_top_score() {
        let mut state = GameState::new(config());
        state.score_viruses(2);
        state.restart();
        assert_eq!(state.score(), 0);
        assert_eq!(state.top_score(), 300);
        assert_eq!(state.stage(), Stage::Generating);
    }

    #[test]
    fn popups_expire() {
        let mut state = GameState::new(config());
        state.popups.push(ScorePopup {
            x: 1.0,
            y: 10.0,
            amount: 100,
            cascade: 0,
            age_ticks: 0,
        });
        for _ in 0..POPUP_TICKS {
            state.tick_popups();
        }
        assert!(state.popups().is_empty());
    }
}
