//! Segment: the value stored in one bottle cell.

/// Capsule and virus colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Colour {
    Yellow,
    Red,
    Blue,
}

impl Colour {
    pub const ALL: [Self; 3] = [Self::Yellow, Self::Red, Self::Blue];

    /// Index 0..3 for theme lookups.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::Yellow => 0,
            Self::Red => 1,
            Self::Blue => 2,
        }
    }

    pub fn from_index(i: usize) -> Self {
        Self::ALL[i % 3]
    }
}

/// What occupies a cell. Halves always come in complementary pairs
/// (Left at x with Right at x+1, Top at y-1 with Bottom at y).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Empty,
    /// Virus with a cosmetic sprite variant (0..3).
    Virus(u8),
    Single,
    LeftHalf,
    RightHalf,
    TopHalf,
    BottomHalf,
    /// Part of a run; held until the clear delay expires.
    Matched,
}

impl SegmentKind {
    #[inline]
    pub fn is_half(self) -> bool {
        matches!(
            self,
            Self::LeftHalf | Self::RightHalf | Self::TopHalf | Self::BottomHalf
        )
    }

    /// Offset (dx, dy) from a half to its partner.
    pub fn partner_offset(self) -> Option<(i32, i32)> {
        match self {
            Self::LeftHalf => Some((1, 0)),
            Self::RightHalf => Some((-1, 0)),
            Self::TopHalf => Some((0, 1)),
            Self::BottomHalf => Some((0, -1)),
            _ => None,
        }
    }
}

/// One cell of the bottle. Empty segments carry no meaningful colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub colour: Colour,
}

impl Segment {
    pub const EMPTY: Self = Self {
        kind: SegmentKind::Empty,
        colour: Colour::Yellow,
    };

    pub fn new(kind: SegmentKind, colour: Colour) -> Self {
        Self { kind, colour }
    }

    pub fn virus(colour: Colour, variant: u8) -> Self {
        Self::new(SegmentKind::Virus(variant % 3), colour)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.kind == SegmentKind::Empty
    }

    #[inline]
    pub fn is_virus(&self) -> bool {
        matches!(self.kind, SegmentKind::Virus(_))
    }

    /// Colour for run detection; `None` for empty cells.
    #[inline]
    pub fn match_colour(&self) -> Option<Colour> {
        (!self.is_empty()).then_some(self.colour)
    }
}

impl Default for Segment {
    fn default() -> Self {
        Self::EMPTY
    }
}
