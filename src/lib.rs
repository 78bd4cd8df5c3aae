//! Capsuletui: falling-capsule virus puzzle.
//!
//! The library holds the bottle simulation and the game session; the binary is a
//! terminal front-end that feeds intents in and draws what comes out.

pub mod bottle;
pub mod capsule;
pub mod cascade;
pub mod game;
pub mod level;
pub mod rng;
pub mod segment;

pub use bottle::{Bottle, BOTTLE_HEIGHT, BOTTLE_WIDTH};
pub use capsule::{Capsule, Direction, Orientation};
pub use cascade::{BottleEvent, Centroid, EngineConfig, MatchEngine, Phase};
pub use game::{GameConfig, GameEvent, GameState, Intent, Stage};
pub use level::{LevelGenerator, Speed};
pub use rng::Rng;
pub use segment::{Colour, Segment, SegmentKind};
