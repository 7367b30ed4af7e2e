//! Encounter - rooms, the turn tracker and combat resolution in one place.
//!
//! An encounter owns the rooms of a level and the tracker holding every
//! creature. Tokens live on the current room; movement is validated against
//! it and strikes are resolved between two tracked tokens.

use crate::equipment::{DamageType, EquipmentSlot};
use crate::grid::{GridError, Position, Room};
use crate::sheet::SheetError;
use crate::token::{ActionKind, CreatureToken, TokenError};
use crate::tracker::{TokenKey, TrackerError, TurnHandler, TurnTracker, DEFAULT_KEY_DIGITS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from encounter operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncounterError {
    #[error("An encounter needs at least one room")]
    NoRooms,

    #[error("No room with index {0}")]
    UnknownRoom(usize),

    #[error("Unknown token: {0}")]
    UnknownToken(TokenKey),

    #[error("A token cannot strike itself")]
    SelfTarget,

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
}

/// Configuration for creating an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterConfig {
    /// Encounter label, carried into save metadata.
    pub name: String,

    /// Seed for the tracker's key and tie-break die. `None` draws from entropy.
    pub seed: Option<u64>,

    /// Length of freshly generated token keys.
    pub key_digits: usize,

    /// Restore every token's actions before its turn.
    pub reset_actions_each_round: bool,
}

impl EncounterConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seed: None,
            key_digits: DEFAULT_KEY_DIGITS,
            reset_actions_each_round: true,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_key_digits(mut self, digits: usize) -> Self {
        self.key_digits = digits;
        self
    }

    pub fn with_action_reset(mut self, reset: bool) -> Self {
        self.reset_actions_each_round = reset;
        self
    }
}

/// Result of one token striking another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeOutcome {
    pub hit: bool,
    pub roll: i32,
    /// Rolled damage before resistances; zero on a miss.
    pub damage: i32,
    pub damage_type: Option<DamageType>,
    /// Damage actually subtracted from the target.
    pub applied: i32,
    pub target_hp: i32,
}

impl StrikeOutcome {
    /// Whether the target has been driven to zero HP or below.
    pub fn target_down(&self) -> bool {
        self.target_hp <= 0
    }
}

#[derive(Debug)]
pub struct Encounter {
    config: EncounterConfig,
    rooms: Vec<Room>,
    current_room: usize,
    tracker: TurnTracker,
}

impl Encounter {
    pub fn new(config: EncounterConfig, rooms: Vec<Room>) -> Result<Self, EncounterError> {
        if rooms.is_empty() {
            return Err(EncounterError::NoRooms);
        }
        let tracker = TurnTracker::configured(
            config.seed,
            config.key_digits,
            config.reset_actions_each_round,
        );
        Ok(Self {
            config,
            rooms,
            current_room: 0,
            tracker,
        })
    }

    pub(crate) fn from_parts(
        config: EncounterConfig,
        rooms: Vec<Room>,
        current_room: usize,
        tracker: TurnTracker,
    ) -> Self {
        Self {
            config,
            rooms,
            current_room,
            tracker,
        }
    }

    pub fn config(&self) -> &EncounterConfig {
        &self.config
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn current_room_index(&self) -> usize {
        self.current_room
    }

    pub fn room(&self) -> &Room {
        &self.rooms[self.current_room]
    }

    pub fn room_mut(&mut self) -> &mut Room {
        &mut self.rooms[self.current_room]
    }

    pub fn set_current_room(&mut self, index: usize) -> Result<(), EncounterError> {
        if index >= self.rooms.len() {
            return Err(EncounterError::UnknownRoom(index));
        }
        self.current_room = index;
        Ok(())
    }

    pub fn tracker(&self) -> &TurnTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut TurnTracker {
        &mut self.tracker
    }

    pub fn token(&self, key: &TokenKey) -> Result<&CreatureToken, EncounterError> {
        self.tracker
            .get(key)
            .ok_or_else(|| EncounterError::UnknownToken(key.clone()))
    }

    // ========================================================================
    // Creatures
    // ========================================================================

    /// Track a token and stand it on the current room.
    pub fn spawn(&mut self, token: CreatureToken) -> Result<TokenKey, EncounterError> {
        let position = token.position();
        if self.room().tile(position).is_none() {
            return Err(GridError::NoTile(position).into());
        }
        let name = token.name().to_string();
        let key = self.tracker.add_token(token)?;
        self.room_mut().place(&name, position)?;
        Ok(key)
    }

    /// Remove a token from the tracker and the current room.
    pub fn despawn(&mut self, key: &TokenKey) -> Option<CreatureToken> {
        let token = self.tracker.remove_token(key)?;
        self.room_mut().remove_occupant(token.name(), token.position());
        Some(token)
    }

    pub fn reachable(&self, key: &TokenKey) -> Result<BTreeMap<Position, u32>, EncounterError> {
        Ok(self.token(key)?.valid_movements(self.room()))
    }

    /// Walk a token to `dest`, returning the budget left on arrival.
    pub fn move_token(&mut self, key: &TokenKey, dest: Position) -> Result<u32, EncounterError> {
        let room = &mut self.rooms[self.current_room];
        let token = self
            .tracker
            .get_mut(key)
            .ok_or_else(|| EncounterError::UnknownToken(key.clone()))?;
        Ok(token.move_to(room, dest)?)
    }

    // ========================================================================
    // Combat
    // ========================================================================

    /// Resolve one attack with the weapon in `slot` (or the natural weapon).
    /// Spends the attacker's standard action.
    pub fn strike(
        &mut self,
        attacker: &TokenKey,
        target: &TokenKey,
        slot: Option<EquipmentSlot>,
    ) -> Result<StrikeOutcome, EncounterError> {
        if attacker == target {
            return Err(EncounterError::SelfTarget);
        }
        let target_ac = self.token(target)?.sheet().armor_class();
        if !self.token(attacker)?.actions().available(ActionKind::Standard) {
            return Err(TokenError::ActionSpent(ActionKind::Standard).into());
        }

        let striker = self
            .tracker
            .get_mut(attacker)
            .ok_or_else(|| EncounterError::UnknownToken(attacker.clone()))?;
        let attack = striker.sheet_mut().attack(target_ac, slot)?;
        let rolled = if attack.hit {
            Some(striker.sheet_mut().roll_damage(slot)?)
        } else {
            None
        };
        striker.actions_mut().spend(ActionKind::Standard)?;

        let defender = self
            .tracker
            .get_mut(target)
            .ok_or_else(|| EncounterError::UnknownToken(target.clone()))?;
        let applied = rolled.map_or(0, |(damage, kind)| defender.sheet_mut().take_damage(damage, kind));
        let outcome = StrikeOutcome {
            hit: attack.hit,
            roll: attack.roll,
            damage: rolled.map_or(0, |(damage, _)| damage),
            damage_type: rolled.map(|(_, kind)| kind),
            applied,
            target_hp: defender.sheet().hp(),
        };
        tracing::debug!(
            "{} struck {}: roll {} vs AC {}, {} damage applied",
            attacker,
            target,
            outcome.roll,
            target_ac,
            outcome.applied
        );
        Ok(outcome)
    }

    /// Run one round of turns in initiative order.
    pub fn run_round<H: TurnHandler>(&mut self, handler: &mut H) {
        self.tracker.process_turn(handler);
    }
}
