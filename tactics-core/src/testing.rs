//! Fixtures for tests and downstream crates.
//!
//! Everything here is seeded so scenarios built from these fixtures replay
//! identically.

use crate::grid::{GridError, Position, Room, STANDARD_TILE_SET};
use crate::race::Race;
use crate::sheet::CharacterSheet;
use crate::stats::AbilityScores;
use crate::token::CreatureToken;

/// The two-level sample map. The up-stair sits at (3, 1).
pub const SAMPLE_ROOM_ROWS: [&str; 11] = [
    "WWWWWWW",
    "WDWURFW",
    "WFWFRFW",
    "WFWFRFW",
    "WFFFFFW",
    "WFFEEFW",
    "WWWWWWW",
    "WFWFRFW",
    "WWWWFFW",
    "WFWEEFW",
    "WWWWWWW",
];

pub const SAMPLE_UP_STAIR: Position = Position::new(3, 1);

/// Every ability at 10.
pub fn uniform_scores() -> AbilityScores {
    AbilityScores::uniform(10)
}

/// A race with no adjustments.
pub fn plain_race() -> Race {
    Race::new("Human")
}

/// A seeded fighter with all scores at 10: AC 10, 10 HP, speed 5.
pub fn sample_fighter(seed: u64) -> CharacterSheet {
    CharacterSheet::seeded(uniform_scores(), plain_race(), "fighter", seed)
}

/// A token carrying [`sample_fighter`].
pub fn sample_token(name: &str, position: Position, seed: u64) -> CreatureToken {
    CreatureToken::new(name, position, sample_fighter(seed))
}

/// The 7x11 sample room on the standard tile set.
pub fn sample_room() -> Result<Room, GridError> {
    Room::from_rows(&STANDARD_TILE_SET, &SAMPLE_ROOM_ROWS)
}
