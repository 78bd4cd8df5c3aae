//! Bottle: the fixed 8x16 grid of segments.
//!
//! Coordinates are (x, y) with x = column 0..8 (left to right) and y = row 0..16,
//! row 0 at the top. The sides and the floor block; anything above row 0 is open
//! so a spawning capsule can hang over the neck of the bottle.

use crate::rng::Rng;
use crate::segment::{Colour, Segment, SegmentKind};

pub const BOTTLE_WIDTH: usize = 8;
pub const BOTTLE_HEIGHT: usize = 16;

const BOTTLE_SIZE: usize = BOTTLE_WIDTH * BOTTLE_HEIGHT;

/// Placement rules for generated viruses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirusRules {
    /// Topmost row a virus may occupy.
    pub min_row: usize,
    /// A virus may not complete a run of this length at generation time.
    pub match_length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bottle {
    /// Row-major cells (y * WIDTH + x).
    cells: [Segment; BOTTLE_SIZE],
    virus_count: u32,
}

impl Bottle {
    pub fn new() -> Self {
        Self {
            cells: [Segment::EMPTY; BOTTLE_SIZE],
            virus_count: 0,
        }
    }

    #[inline]
    fn index(x: i32, y: i32) -> Option<usize> {
        if x < 0 || x >= BOTTLE_WIDTH as i32 || y < 0 || y >= BOTTLE_HEIGHT as i32 {
            return None;
        }
        Some(y as usize * BOTTLE_WIDTH + x as usize)
    }

    #[inline]
    pub fn width(&self) -> usize {
        BOTTLE_WIDTH
    }

    #[inline]
    pub fn height(&self) -> usize {
        BOTTLE_HEIGHT
    }

    #[inline]
    pub fn in_bounds(x: i32, y: i32) -> bool {
        Self::index(x, y).is_some()
    }

    /// True only for an empty in-grid cell, or anywhere above row 0 between the walls.
    pub fn is_empty_at(&self, x: i32, y: i32) -> bool {
        if x < 0 || x >= BOTTLE_WIDTH as i32 || y >= BOTTLE_HEIGHT as i32 {
            return false;
        }
        if y < 0 {
            return true;
        }
        Self::index(x, y).is_some_and(|i| self.cells[i].is_empty())
    }

    #[inline]
    pub fn segment_at(&self, x: i32, y: i32) -> Option<&Segment> {
        Self::index(x, y).map(|i| &self.cells[i])
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<Segment> {
        self.segment_at(x, y).copied()
    }

    /// Write a cell, keeping the virus tally in step. Returns false out of bounds.
    pub fn set(&mut self, x: i32, y: i32, segment: Segment) -> bool {
        let Some(i) = Self::index(x, y) else {
            return false;
        };
        if self.cells[i].is_virus() {
            self.virus_count = self.virus_count.saturating_sub(1);
        }
        if segment.is_virus() {
            self.virus_count += 1;
        }
        self.cells[i] = segment;
        true
    }

    /// Change only the kind of an occupied cell (colour kept).
    pub fn set_kind(&mut self, x: i32, y: i32, kind: SegmentKind) -> bool {
        match self.get(x, y) {
            Some(seg) => self.set(x, y, Segment::new(kind, seg.colour)),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.cells = [Segment::EMPTY; BOTTLE_SIZE];
        self.virus_count = 0;
    }

    #[inline]
    pub fn virus_count(&self) -> u32 {
        self.virus_count
    }

    /// Rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Segment]> {
        self.cells.chunks(BOTTLE_WIDTH)
    }

    pub fn is_cleared(&self) -> bool {
        self.virus_count == 0
    }

    /// Length of the same-colour run through (x, y) along one axis if `colour`
    /// were placed there.
    fn run_through(&self, x: i32, y: i32, colour: Colour, dx: i32, dy: i32) -> usize {
        let same = |cx: i32, cy: i32| {
            self.get(cx, cy)
                .and_then(|s| s.match_colour())
                .is_some_and(|c| c == colour)
        };
        let mut len = 1;
        let (mut cx, mut cy) = (x - dx, y - dy);
        while same(cx, cy) {
            len += 1;
            cx -= dx;
            cy -= dy;
        }
        let (mut cx, mut cy) = (x + dx, y + dy);
        while same(cx, cy) {
            len += 1;
            cx += dx;
            cy += dy;
        }
        len
    }

    /// True if a segment of `colour` at (x, y) would complete a run of `length`.
    pub fn would_complete_run(&self, x: i32, y: i32, colour: Colour, length: usize) -> bool {
        self.run_through(x, y, colour, 1, 0) >= length
            || self.run_through(x, y, colour, 0, 1) >= length
    }

    /// Place up to `min(wanted, remaining)` viruses on legal empty cells.
    /// Returns how many were placed; 0 when nothing legal is left this tick.
    pub fn insert_virus(&mut self, rng: &mut Rng, wanted: u32, remaining: u32, rules: VirusRules) -> u32 {
        let mut placed = 0;
        while placed < wanted.min(remaining) {
            if !self.insert_one_virus(rng, rules) {
                break;
            }
            placed += 1;
        }
        placed
    }

    fn insert_one_virus(&mut self, rng: &mut Rng, rules: VirusRules) -> bool {
        let top = rules.min_row.min(BOTTLE_HEIGHT - 1);
        let candidates = (BOTTLE_HEIGHT - top) * BOTTLE_WIDTH;
        let start = rng.next_below(candidates as u32) as usize;
        // Cycle colours so the mix stays balanced; fall back to the others when blocked.
        let first = self.virus_count as usize % 3;
        let variant = rng.next_below(3) as u8;

        for step in 0..candidates {
            let slot = (start + step) % candidates;
            let x = (slot % BOTTLE_WIDTH) as i32;
            let y = (top + slot / BOTTLE_WIDTH) as i32;
            if !self.is_empty_at(x, y) {
                continue;
            }
            for k in 0..3 {
                let colour = Colour::from_index(first + k);
                if !self.would_complete_run(x, y, colour, rules.match_length) {
                    self.set(x, y, Segment::virus(colour, variant));
                    log::debug!("virus {:?} at ({}, {})", colour, x, y);
                    return true;
                }
            }
        }
        false
    }

    /// Recount viruses from the cells.
    pub fn count_viruses(&self) -> u32 {
        self.cells.iter().filter(|s| s.is_virus()).count() as u32
    }

    /// Every half has its complementary partner next to it.
    pub fn pairs_consistent(&self) -> bool {
        for y in 0..BOTTLE_HEIGHT as i32 {
            for x in 0..BOTTLE_WIDTH as i32 {
                let Some(seg) = self.get(x, y) else { continue };
                let Some((dx, dy)) = seg.kind.partner_offset() else {
                    continue;
                };
                let expected = match seg.kind {
                    SegmentKind::LeftHalf => SegmentKind::RightHalf,
                    SegmentKind::RightHalf => SegmentKind::LeftHalf,
                    SegmentKind::TopHalf => SegmentKind::BottomHalf,
                    _ => SegmentKind::TopHalf,
                };
                if self.get(x + dx, y + dy).map(|s| s.kind) != Some(expected) {
                    return false;
                }
            }
        }
        true
    }
}

impl Default for Bottle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(c: Colour) -> Segment {
        Segment::new(SegmentKind::Single, c)
    }

    #[test]
    fn edges_block_and_neck_is_open() {
        let bottle = Bottle::new();
        for y in -2..BOTTLE_HEIGHT as i32 {
            assert!(!bottle.is_empty_at(-1, y));
            assert!(!bottle.is_empty_at(BOTTLE_WIDTH as i32, y));
        }
        for x in 0..BOTTLE_WIDTH as i32 {
            assert!(!bottle.is_empty_at(x, BOTTLE_HEIGHT as i32));
            assert!(bottle.is_empty_at(x, -1));
            assert!(bottle.is_empty_at(x, 0));
        }
    }

    #[test]
    fn occupied_cell_is_not_empty() {
        let mut bottle = Bottle::new();
        bottle.set(3, 5, single(Colour::Red));
        assert!(!bottle.is_empty_at(3, 5));
        assert!(bottle.is_empty_at(4, 5));
    }

    #[test]
    fn set_tracks_virus_count() {
        let mut bottle = Bottle::new();
        bottle.set(0, 15, Segment::virus(Colour::Red, 0));
        bottle.set(1, 15, Segment::virus(Colour::Blue, 1));
        assert_eq!(bottle.virus_count(), 2);
        bottle.set_kind(0, 15, SegmentKind::Matched);
        assert_eq!(bottle.virus_count(), 1);
        assert_eq!(bottle.virus_count(), bottle.count_viruses());
        bottle.clear();
        assert_eq!(bottle.virus_count(), 0);
        assert!(bottle.is_empty_at(1, 15));
    }

    #[test]
    fn out_of_bounds_set_is_rejected() {
        let mut bottle = Bottle::new();
        assert!(!bottle.set(-1, 0, single(Colour::Red)));
        assert!(!bottle.set(0, -1, single(Colour::Red)));
        assert!(bottle.segment_at(8, 0).is_none());
    }

    #[test]
    fn run_detection_for_placement() {
        let mut bottle = Bottle::new();
        for x in 0..3 {
            bottle.set(x, 10, single(Colour::Blue));
        }
        assert!(bottle.would_complete_run(3, 10, Colour::Blue, 4));
        assert!(!bottle.would_complete_run(3, 10, Colour::Red, 4));
        assert!(!bottle.would_complete_run(4, 10, Colour::Blue, 4));
    }

    #[test]
    fn insert_virus_respects_ceiling_and_runs() {
        let mut bottle = Bottle::new();
        let mut rng = Rng::new(3);
        let rules = VirusRules {
            min_row: 6,
            match_length: 4,
        };
        let placed = bottle.insert_virus(&mut rng, 40, 40, rules);
        assert_eq!(placed, 40);
        assert_eq!(bottle.virus_count(), 40);
        for y in 0..6 {
            for x in 0..BOTTLE_WIDTH as i32 {
                assert!(bottle.is_empty_at(x, y));
            }
        }
        for y in 0..BOTTLE_HEIGHT as i32 {
            for x in 0..BOTTLE_WIDTH as i32 {
                if let Some(seg) = bottle.get(x, y).filter(|s| s.is_virus()) {
                    assert!(bottle.run_through(x, y, seg.colour, 1, 0) < 4);
                    assert!(bottle.run_through(x, y, seg.colour, 0, 1) < 4);
                }
            }
        }
    }

    #[test]
    fn insert_virus_never_exceeds_remaining() {
        let mut bottle = Bottle::new();
        let mut rng = Rng::new(11);
        let rules = VirusRules {
            min_row: 6,
            match_length: 4,
        };
        assert_eq!(bottle.insert_virus(&mut rng, 5, 2, rules), 2);
        assert_eq!(bottle.virus_count(), 2);
    }

    #[test]
    fn insert_virus_is_noop_when_full() {
        let mut bottle = Bottle::new();
        for y in 0..BOTTLE_HEIGHT as i32 {
            for x in 0..BOTTLE_WIDTH as i32 {
                bottle.set(x, y, single(Colour::from_index((x + y) as usize)));
            }
        }
        let mut rng = Rng::new(5);
        let rules = VirusRules {
            min_row: 0,
            match_length: 4,
        };
        assert_eq!(bottle.insert_virus(&mut rng, 1, 1, rules), 0);
        assert_eq!(bottle.virus_count(), 0);
    }

    #[test]
    fn pairing_check() {
        let mut bottle = Bottle::new();
        bottle.set(2, 4, Segment::new(SegmentKind::LeftHalf, Colour::Red));
        assert!(!bottle.pairs_consistent());
        bottle.set(3, 4, Segment::new(SegmentKind::RightHalf, Colour::Blue));
        assert!(bottle.pairs_consistent());
        bottle.set(5, 9, Segment::new(SegmentKind::BottomHalf, Colour::Red));
        assert!(!bottle.pairs_consistent());
        bottle.set(5, 8, Segment::new(SegmentKind::TopHalf, Colour::Red));
        assert!(bottle.pairs_consistent());
    }
}
