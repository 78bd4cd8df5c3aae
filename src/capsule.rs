//! Capsule: the two-segment piece the player steers.
//!
//! The anchor is the left segment when horizontal and the bottom segment when
//! vertical. `colours[0]` belongs to the anchor, `colours[1]` to the other half.
//! Every mutator is all-or-nothing: it either moves/rotates and returns true, or
//! leaves the capsule untouched and returns false.

use crate::bottle::Bottle;
use crate::segment::{Colour, Segment, SegmentKind};

/// Spawn anchor: columns 3-4, one row above the neck.
pub const SPAWN_X: i32 = 3;
pub const SPAWN_Y: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    #[inline]
    fn dx(self) -> i32 {
        match self {
            Self::Left => -1,
            Self::Right => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capsule {
    pub colours: [Colour; 2],
    pub orientation: Orientation,
    pub x: i32,
    pub y: i32,
}

impl Capsule {
    /// Horizontal capsule at the spawn point.
    pub fn new(colours: [Colour; 2]) -> Self {
        Self {
            colours,
            orientation: Orientation::Horizontal,
            x: SPAWN_X,
            y: SPAWN_Y,
        }
    }

    /// Reuse this capsule for a new round.
    pub fn reset(&mut self, colours: [Colour; 2]) {
        *self = Self::new(colours);
    }

    /// Cell of the non-anchor half.
    #[inline]
    pub fn partner_pos(&self) -> (i32, i32) {
        match self.orientation {
            Orientation::Horizontal => (self.x + 1, self.y),
            Orientation::Vertical => (self.x, self.y - 1),
        }
    }

    /// Both cells with their colours, anchor first.
    pub fn cells(&self) -> [((i32, i32), Colour); 2] {
        [((self.x, self.y), self.colours[0]), (self.partner_pos(), self.colours[1])]
    }

    /// Segments this capsule would write at its current position, anchor first.
    pub fn segments(&self) -> [Segment; 2] {
        let (anchor, other) = match self.orientation {
            Orientation::Horizontal => (SegmentKind::LeftHalf, SegmentKind::RightHalf),
            Orientation::Vertical => (SegmentKind::BottomHalf, SegmentKind::TopHalf),
        };
        [
            Segment::new(anchor, self.colours[0]),
            Segment::new(other, self.colours[1]),
        ]
    }

    pub fn can_drop(&self, bottle: &Bottle) -> bool {
        match self.orientation {
            Orientation::Horizontal => {
                bottle.is_empty_at(self.x, self.y + 1) && bottle.is_empty_at(self.x + 1, self.y + 1)
            }
            Orientation::Vertical => bottle.is_empty_at(self.x, self.y + 1),
        }
    }

    /// Move one row down.
    pub fn drop(&mut self, bottle: &Bottle) -> bool {
        if !self.can_drop(bottle) {
            return false;
        }
        self.y += 1;
        true
    }

    pub fn can_slide(&self, bottle: &Bottle, dir: Direction) -> bool {
        match self.orientation {
            Orientation::Horizontal => {
                let edge = match dir {
                    Direction::Left => self.x - 1,
                    Direction::Right => self.x + 2,
                };
                bottle.is_empty_at(edge, self.y)
            }
            Orientation::Vertical => {
                let nx = self.x + dir.dx();
                // At the top row the upper half is outside the bottle.
                bottle.is_empty_at(nx, self.y) && (self.y <= 0 || bottle.is_empty_at(nx, self.y - 1))
            }
        }
    }

    pub fn slide(&mut self, bottle: &Bottle, dir: Direction) -> bool {
        if !self.can_slide(bottle, dir) {
            return false;
        }
        self.x += dir.dx();
        true
    }

    /// Anchor column after rotating from vertical, or `None` if both sides are blocked.
    /// The rotation direction picks the preferred side; the other side is the kick.
    fn horizontal_anchor(&self, bottle: &Bottle, dir: Direction) -> Option<i32> {
        let right_open = bottle.is_empty_at(self.x + 1, self.y);
        let left_open = bottle.is_empty_at(self.x - 1, self.y);
        match (dir, right_open, left_open) {
            (Direction::Right, true, _) => Some(self.x),
            (Direction::Right, false, true) => Some(self.x - 1),
            (Direction::Left, _, true) => Some(self.x - 1),
            (Direction::Left, true, false) => Some(self.x),
            _ => None,
        }
    }

    pub fn can_rotate(&self, bottle: &Bottle, dir: Direction) -> bool {
        match self.orientation {
            Orientation::Horizontal => self.y <= 0 || bottle.is_empty_at(self.x, self.y - 1),
            Orientation::Vertical => self.horizontal_anchor(bottle, dir).is_some(),
        }
    }

    /// Rotate a quarter turn. Right (clockwise) swaps the colours going
    /// horizontal → vertical; left (counter-clockwise) swaps them going
    /// vertical → horizontal. Four turns either way restore the starting order.
    pub fn rotate(&mut self, bottle: &Bottle, dir: Direction) -> bool {
        match self.orientation {
            Orientation::Horizontal => {
                if !self.can_rotate(bottle, dir) {
                    return false;
                }
                if dir == Direction::Right {
                    self.colours.swap(0, 1);
                }
                self.orientation = Orientation::Vertical;
                true
            }
            Orientation::Vertical => {
                let Some(x) = self.horizontal_anchor(bottle, dir) else {
                    return false;
                };
                if dir == Direction::Left {
                    self.colours.swap(0, 1);
                }
                self.x = x;
                self.orientation = Orientation::Horizontal;
                true
            }
        }
    }

    /// True while any part of the capsule hangs above the bottle.
    pub fn above_neck(&self) -> bool {
        self.y < 0
    }

    /// Write both halves into the bottle. A vertical capsule locked on row 0 has
    /// its top half outside the bottle, so only the anchor lands, as a single.
    /// Cells above the neck are discarded.
    pub fn apply(&self, bottle: &mut Bottle) {
        let [anchor_seg, other_seg] = self.segments();
        let (px, py) = self.partner_pos();
        let anchor_in = Bottle::in_bounds(self.x, self.y);
        let other_in = Bottle::in_bounds(px, py);
        match (anchor_in, other_in) {
            (true, true) => {
                bottle.set(self.x, self.y, anchor_seg);
                bottle.set(px, py, other_seg);
            }
            (true, false) => {
                bottle.set(self.x, self.y, Segment::new(SegmentKind::Single, self.colours[0]));
            }
            (false, true) => {
                bottle.set(px, py, Segment::new(SegmentKind::Single, self.colours[1]));
            }
            (false, false) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bottle::{BOTTLE_HEIGHT, BOTTLE_WIDTH};

    fn block(bottle: &mut Bottle, x: i32, y: i32) {
        bottle.set(x, y, Segment::virus(Colour::Blue, 0));
    }

    fn capsule_at(orientation: Orientation, x: i32, y: i32) -> Capsule {
        Capsule {
            colours: [Colour::Red, Colour::Yellow],
            orientation,
            x,
            y,
        }
    }

    #[test]
    fn drops_to_the_floor() {
        let bottle = Bottle::new();
        let mut c = Capsule::new([Colour::Red, Colour::Blue]);
        let mut steps = 0;
        while c.drop(&bottle) {
            steps += 1;
        }
        assert_eq!(c.y, BOTTLE_HEIGHT as i32 - 1);
        assert_eq!(steps, BOTTLE_HEIGHT as i32);
        assert!(!c.can_drop(&bottle));
    }

    #[test]
    fn horizontal_drop_checks_both_cells() {
        let mut bottle = Bottle::new();
        block(&mut bottle, 4, 6);
        let mut c = capsule_at(Orientation::Horizontal, 3, 5);
        assert!(!c.drop(&bottle));
        assert_eq!(c.y, 5);
        let mut v = capsule_at(Orientation::Vertical, 3, 5);
        assert!(v.drop(&bottle));
        assert_eq!(v.y, 6);
    }

    #[test]
    fn slide_stops_at_walls() {
        let bottle = Bottle::new();
        let mut c = capsule_at(Orientation::Horizontal, 0, 5);
        assert!(!c.slide(&bottle, Direction::Left));
        c.x = BOTTLE_WIDTH as i32 - 2;
        assert!(!c.slide(&bottle, Direction::Right));
        assert!(c.slide(&bottle, Direction::Left));
        assert_eq!(c.x, BOTTLE_WIDTH as i32 - 3);
    }

    #[test]
    fn vertical_slide_checks_upper_half() {
        let mut bottle = Bottle::new();
        block(&mut bottle, 4, 4);
        let mut c = capsule_at(Orientation::Vertical, 3, 5);
        assert!(!c.slide(&bottle, Direction::Right));
        assert_eq!(c.x, 3);
        assert!(c.slide(&bottle, Direction::Left));
    }

    #[test]
    fn vertical_slide_at_top_row_ignores_row_above() {
        let mut bottle = Bottle::new();
        let mut c = capsule_at(Orientation::Vertical, 3, 0);
        assert!(c.slide(&bottle, Direction::Right));
        block(&mut bottle, 5, 0);
        assert!(!c.slide(&bottle, Direction::Right));
    }

    #[test]
    fn horizontal_to_vertical_needs_room_above() {
        let mut bottle = Bottle::new();
        block(&mut bottle, 3, 4);
        let mut c = capsule_at(Orientation::Horizontal, 3, 5);
        assert!(!c.rotate(&bottle, Direction::Left));
        assert_eq!(c.orientation, Orientation::Horizontal);

        let mut top = capsule_at(Orientation::Horizontal, 3, 0);
        assert!(top.rotate(&bottle, Direction::Left));
        assert_eq!(top.orientation, Orientation::Vertical);
    }

    #[test]
    fn colour_order_cycles_over_four_turns() {
        let bottle = Bottle::new();
        for dir in [Direction::Left, Direction::Right] {
            let mut c = capsule_at(Orientation::Horizontal, 3, 8);
            let start = c.colours;
            let mut orders = Vec::new();
            for _ in 0..4 {
                assert!(c.rotate(&bottle, dir));
                orders.push(c.colours);
            }
            assert_eq!(c.colours, start);
            assert_eq!(c.orientation, Orientation::Horizontal);
            assert!(orders.contains(&[start[1], start[0]]));
        }
    }

    #[test]
    fn rotate_right_puts_left_colour_on_top() {
        let bottle = Bottle::new();
        let mut c = capsule_at(Orientation::Horizontal, 3, 8);
        c.rotate(&bottle, Direction::Right);
        // anchor (bottom) takes the old right colour
        assert_eq!(c.colours, [Colour::Yellow, Colour::Red]);
        let mut c = capsule_at(Orientation::Horizontal, 3, 8);
        c.rotate(&bottle, Direction::Left);
        assert_eq!(c.colours, [Colour::Red, Colour::Yellow]);
    }

    #[test]
    fn wall_kick_left_when_right_blocked() {
        let bottle = Bottle::new();
        let mut c = capsule_at(Orientation::Vertical, BOTTLE_WIDTH as i32 - 1, 8);
        assert!(c.rotate(&bottle, Direction::Right));
        assert_eq!(c.orientation, Orientation::Horizontal);
        assert_eq!(c.x, BOTTLE_WIDTH as i32 - 2);
    }

    #[test]
    fn rotate_fails_when_both_sides_blocked() {
        let mut bottle = Bottle::new();
        block(&mut bottle, 2, 8);
        block(&mut bottle, 4, 8);
        let mut c = capsule_at(Orientation::Vertical, 3, 8);
        let before = c;
        for dir in [Direction::Left, Direction::Right] {
            assert!(!c.can_rotate(&bottle, dir));
            assert!(!c.rotate(&bottle, dir));
            assert_eq!(c, before);
        }
    }

    #[test]
    fn direction_picks_preferred_side() {
        let bottle = Bottle::new();
        let mut r = capsule_at(Orientation::Vertical, 3, 8);
        r.rotate(&bottle, Direction::Right);
        assert_eq!(r.x, 3);
        let mut l = capsule_at(Orientation::Vertical, 3, 8);
        l.rotate(&bottle, Direction::Left);
        assert_eq!(l.x, 2);
    }

    #[test]
    fn apply_writes_paired_halves() {
        let mut bottle = Bottle::new();
        capsule_at(Orientation::Horizontal, 2, 15).apply(&mut bottle);
        capsule_at(Orientation::Vertical, 6, 15).apply(&mut bottle);
        assert_eq!(bottle.get(2, 15).map(|s| s.kind), Some(SegmentKind::LeftHalf));
        assert_eq!(bottle.get(3, 15).map(|s| s.kind), Some(SegmentKind::RightHalf));
        assert_eq!(bottle.get(6, 15).map(|s| s.kind), Some(SegmentKind::BottomHalf));
        assert_eq!(bottle.get(6, 14).map(|s| s.kind), Some(SegmentKind::TopHalf));
        assert!(bottle.pairs_consistent());
    }

    #[test]
    fn vertical_apply_on_top_row_degenerates_to_single() {
        let mut bottle = Bottle::new();
        capsule_at(Orientation::Vertical, 3, 0).apply(&mut bottle);
        let seg = bottle.get(3, 0).unwrap();
        assert_eq!(seg.kind, SegmentKind::Single);
        assert_eq!(seg.colour, Colour::Red);
        assert!(bottle.pairs_consistent());
    }
}
