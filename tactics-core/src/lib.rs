//! Deterministic simulation core for a turn-based tactical adventure.
//!
//! This crate provides:
//! - Seeded, replayable dice with advantage and disadvantage
//! - Character sheets with equipment, armor class and resistances
//! - Rooms with cost-weighted flood fill movement
//! - A turn tracker with unique keys and tie-broken initiative
//! - Snapshots for external save/load
//!
//! Nothing here renders, reads input or touches the filesystem.
//!
//! # Quick Start
//!
//! ```ignore
//! use tactics_core::testing::{sample_fighter, sample_room, SAMPLE_UP_STAIR};
//! use tactics_core::{CreatureToken, Encounter, EncounterConfig, Position};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EncounterConfig::new("Crypt").with_seed(7);
//!     let mut encounter = Encounter::new(config, vec![sample_room()?])?;
//!
//!     let hero = encounter.spawn(CreatureToken::new("hero", SAMPLE_UP_STAIR, sample_fighter(1)))?;
//!     let rat = encounter.spawn(CreatureToken::new("rat", Position::new(3, 2), sample_fighter(2)))?;
//!
//!     let outcome = encounter.strike(&hero, &rat, None)?;
//!     println!("hit: {}, rat hp: {}", outcome.hit, outcome.target_hp);
//!
//!     let save = tactics_core::SavedEncounter::new(&encounter).to_json()?;
//!     println!("{save}");
//!     Ok(())
//! }
//! ```

pub mod dice;
pub mod encounter;
pub mod equipment;
pub mod grid;
pub mod persist;
pub mod race;
pub mod sheet;
pub mod stats;
pub mod testing;
pub mod token;
pub mod tracker;

// Primary public API
pub use dice::{Advantage, DamageDice, Dice, DiceError, DieSpec, RollResult, MAX_DICE};
pub use encounter::{Encounter, EncounterConfig, EncounterError, StrikeOutcome};
pub use equipment::{Armor, DamageType, Equipment, EquipmentError, EquipmentSlot, Weapon};
pub use grid::{GridError, Position, Room, RoomSize, Tile, TileKind, TileSet, STANDARD_TILE_SET};
pub use persist::{PersistError, SaveMetadata, SavedEncounter, SAVE_VERSION};
pub use race::{NaturalWeapon, Race, RaceError, RaceTable, ResistanceLevel};
pub use sheet::{AttackRoll, CharacterSheet, SheetError};
pub use stats::{Ability, AbilityBonuses, AbilityScores, StatsError};
pub use token::{ActionEconomy, ActionKind, CreatureToken, TokenError};
pub use tracker::{Initiative, TokenKey, TrackerError, TurnHandler, TurnTracker};
