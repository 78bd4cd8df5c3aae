//! Match and cascade resolution.
//!
//! After a capsule lands the owner calls [`MatchEngine::trigger`] and then
//! [`MatchEngine::update`] once per tick until the engine is idle again:
//!
//! ```text
//! Idle -> Scanning -> Clearing(delay) -> Settling(gravity) -> Scanning ... -> Idle
//! ```
//!
//! Each tick performs at most one phase's worth of bottle mutation.

use crate::bottle::{Bottle, BOTTLE_HEIGHT, BOTTLE_WIDTH};
use crate::segment::{Segment, SegmentKind};

/// Tunables for run length and phase timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Minimum run length that clears.
    pub match_length: usize,
    /// Ticks matched cells stay visible before they empty.
    pub clear_delay_ticks: u32,
    /// Ticks between gravity passes.
    pub settle_ticks: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_length: 4,
            clear_delay_ticks: 20,
            settle_ticks: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scanning,
    Clearing { ticks_left: u32 },
    Settling { ticks_left: u32, moved: bool },
}

/// Mean grid position of the cells of one match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BottleEvent {
    /// One scan found runs. `cascade` is 0 for the scan right after a lock.
    MatchMade {
        viruses: u32,
        cascade: u32,
        centroid: Centroid,
    },
    /// Resolution finished with viruses left; spawn the next capsule.
    DropComplete,
    /// Resolution finished and no viruses remain.
    BottleEmpty,
}

#[derive(Debug, Clone)]
pub struct MatchEngine {
    config: EngineConfig,
    phase: Phase,
    cascade: u32,
    /// Cells currently held as Matched.
    matched: Vec<(i32, i32)>,
}

impl MatchEngine {
    pub fn new(config: EngineConfig) -> Self {
        let config = EngineConfig {
            match_length: config.match_length.max(2),
            ..config
        };
        Self {
            config,
            phase: Phase::Idle,
            cascade: 0,
            matched: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    #[inline]
    pub fn cascade(&self) -> u32 {
        self.cascade
    }

    /// Cells waiting out the clear delay.
    pub fn matched(&self) -> &[(i32, i32)] {
        &self.matched
    }

    /// Start resolving after a capsule was applied.
    pub fn trigger(&mut self) {
        self.phase = Phase::Scanning;
        self.cascade = 0;
        self.matched.clear();
        log::debug!("engine triggered");
    }

    /// Abandon any resolution in progress (new level or restart).
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.cascade = 0;
        self.matched.clear();
    }

    /// Advance one tick. Returns the event produced this tick, if any.
    pub fn update(&mut self, bottle: &mut Bottle) -> Option<BottleEvent> {
        match self.phase {
            Phase::Idle => None,
            Phase::Scanning => {
                let event = self.scan(bottle);
                if event.is_some() {
                    self.phase = Phase::Clearing {
                        ticks_left: self.config.clear_delay_ticks,
                    };
                    event
                } else {
                    Some(self.finish(bottle))
                }
            }
            Phase::Clearing { ticks_left } => {
                if ticks_left > 0 {
                    self.phase = Phase::Clearing {
                        ticks_left: ticks_left - 1,
                    };
                } else {
                    for &(x, y) in &self.matched {
                        bottle.set(x, y, Segment::EMPTY);
                    }
                    self.matched.clear();
                    self.phase = Phase::Settling {
                        ticks_left: self.config.settle_ticks,
                        moved: false,
                    };
                }
                None
            }
            Phase::Settling { ticks_left, moved } => {
                if ticks_left > 0 {
                    self.phase = Phase::Settling {
                        ticks_left: ticks_left - 1,
                        moved,
                    };
                    return None;
                }
                if settle_pass(bottle) {
                    self.phase = Phase::Settling {
                        ticks_left: self.config.settle_ticks,
                        moved: true,
                    };
                    None
                } else if moved {
                    self.cascade += 1;
                    self.phase = Phase::Scanning;
                    log::debug!("settled, rescanning at cascade {}", self.cascade);
                    None
                } else {
                    Some(self.finish(bottle))
                }
            }
        }
    }

    fn finish(&mut self, bottle: &Bottle) -> BottleEvent {
        self.phase = Phase::Idle;
        debug_assert!(bottle.pairs_consistent());
        if bottle.is_cleared() {
            log::debug!("resolution done, bottle empty");
            BottleEvent::BottleEmpty
        } else {
            log::debug!("resolution done, {} viruses left", bottle.virus_count());
            BottleEvent::DropComplete
        }
    }

    /// Mark every run and return the match event, or `None` if nothing matched.
    fn scan(&mut self, bottle: &mut Bottle) -> Option<BottleEvent> {
        let marks = find_runs(bottle, self.config.match_length);
        let mut viruses = 0;
        let mut orphans = Vec::new();
        let (mut sum_x, mut sum_y) = (0.0f32, 0.0f32);

        for y in 0..BOTTLE_HEIGHT as i32 {
            for x in 0..BOTTLE_WIDTH as i32 {
                if !marks[y as usize][x as usize] {
                    continue;
                }
                let Some(seg) = bottle.get(x, y) else { continue };
                if seg.is_virus() {
                    viruses += 1;
                }
                if let Some((dx, dy)) = seg.kind.partner_offset() {
                    let (px, py) = (x + dx, y + dy);
                    if Bottle::in_bounds(px, py) && !marks[py as usize][px as usize] {
                        orphans.push((px, py));
                    }
                }
                bottle.set_kind(x, y, SegmentKind::Matched);
                self.matched.push((x, y));
                sum_x += x as f32;
                sum_y += y as f32;
            }
        }

        if self.matched.is_empty() {
            return None;
        }
        for (x, y) in orphans {
            bottle.set_kind(x, y, SegmentKind::Single);
        }

        let n = self.matched.len() as f32;
        let centroid = Centroid {
            x: sum_x / n,
            y: sum_y / n,
        };
        log::debug!(
            "matched {} cells ({} viruses) at cascade {}",
            self.matched.len(),
            viruses,
            self.cascade
        );
        Some(BottleEvent::MatchMade {
            viruses,
            cascade: self.cascade,
            centroid,
        })
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

type Marks = [[bool; BOTTLE_WIDTH]; BOTTLE_HEIGHT];

/// Flag every cell in a same-colour row or column run of at least `length`.
fn find_runs(bottle: &Bottle, length: usize) -> Marks {
    let mut marks = [[false; BOTTLE_WIDTH]; BOTTLE_HEIGHT];

    for y in 0..BOTTLE_HEIGHT {
        mark_line(bottle, length, BOTTLE_WIDTH, |i| (i, y), &mut marks);
    }
    for x in 0..BOTTLE_WIDTH {
        mark_line(bottle, length, BOTTLE_HEIGHT, |i| (x, i), &mut marks);
    }
    marks
}

fn mark_line(
    bottle: &Bottle,
    length: usize,
    len: usize,
    at: impl Fn(usize) -> (usize, usize),
    marks: &mut Marks,
) {
    let colour_at = |i: usize| {
        let (x, y) = at(i);
        bottle
            .get(x as i32, y as i32)
            .filter(|s| s.kind != SegmentKind::Matched)
            .and_then(|s| s.match_colour())
    };
    let mut start = 0;
    while start < len {
        let Some(colour) = colour_at(start) else {
            start += 1;
            continue;
        };
        let mut end = start + 1;
        while end < len && colour_at(end) == Some(colour) {
            end += 1;
        }
        if end - start >= length {
            for i in start..end {
                let (x, y) = at(i);
                marks[y][x] = true;
            }
        }
        start = end;
    }
}

/// One gravity pass, bottom to top; everything that can fall moves one row.
/// Pairs move as a unit: horizontal pairs are handled at the left half and need
/// room under both halves, vertical pairs are handled at the bottom half.
fn settle_pass(bottle: &mut Bottle) -> bool {
    let mut moved = false;
    for y in (0..BOTTLE_HEIGHT as i32 - 1).rev() {
        for x in 0..BOTTLE_WIDTH as i32 {
            let Some(seg) = bottle.get(x, y) else { continue };
            match seg.kind {
                SegmentKind::Single if bottle.is_empty_at(x, y + 1) => {
                    shift_down(bottle, x, y, seg);
                    moved = true;
                }
                SegmentKind::LeftHalf
                    if bottle.is_empty_at(x, y + 1) && bottle.is_empty_at(x + 1, y + 1) =>
                {
                    if let Some(right) = bottle.get(x + 1, y) {
                        shift_down(bottle, x, y, seg);
                        shift_down(bottle, x + 1, y, right);
                        moved = true;
                    }
                }
                SegmentKind::BottomHalf if bottle.is_empty_at(x, y + 1) => {
                    shift_down(bottle, x, y, seg);
                    if let Some(top) = bottle.get(x, y - 1) {
                        shift_down(bottle, x, y - 1, top);
                    }
                    moved = true;
                }
                _ => {}
            }
        }
    }
    moved
}

#[inline]
fn shift_down(bottle: &mut Bottle, x: i32, y: i32, seg: Segment) {
    bottle.set(x, y + 1, seg);
    bottle.set(x, y, Segment::EMPTY);
}
