//! Creature tokens: a character sheet standing somewhere in a room.

use crate::grid::{GridError, Position, Room};
use crate::sheet::CharacterSheet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("{0} action already spent this turn")]
    ActionSpent(ActionKind),
    #[error("'{name}' cannot reach {to} from {from}")]
    Unreachable {
        name: String,
        from: Position,
        to: Position,
    },
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Standard,
    Movement,
    Reaction,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Standard => write!(f, "Standard"),
            ActionKind::Movement => write!(f, "Movement"),
            ActionKind::Reaction => write!(f, "Reaction"),
        }
    }
}

/// Actions still available this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEconomy {
    pub standard: bool,
    pub movement: bool,
    pub reaction: bool,
}

impl Default for ActionEconomy {
    fn default() -> Self {
        Self {
            standard: true,
            movement: true,
            reaction: true,
        }
    }
}

impl ActionEconomy {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn available(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Standard => self.standard,
            ActionKind::Movement => self.movement,
            ActionKind::Reaction => self.reaction,
        }
    }

    pub fn spend(&mut self, kind: ActionKind) -> Result<(), TokenError> {
        let flag = match kind {
            ActionKind::Standard => &mut self.standard,
            ActionKind::Movement => &mut self.movement,
            ActionKind::Reaction => &mut self.reaction,
        };
        if !*flag {
            return Err(TokenError::ActionSpent(kind));
        }
        *flag = false;
        Ok(())
    }

    /// Trade the standard action for a second movement action.
    pub fn convert_standard_to_movement(&mut self) -> Result<(), TokenError> {
        self.spend(ActionKind::Standard)?;
        self.movement = true;
        Ok(())
    }
}

#[derive(Debug)]
pub struct CreatureToken {
    name: String,
    position: Position,
    sheet: CharacterSheet,
    actions: ActionEconomy,
}

impl CreatureToken {
    pub fn new(name: impl Into<String>, position: Position, sheet: CharacterSheet) -> Self {
        Self {
            name: name.into(),
            position,
            sheet,
            actions: ActionEconomy::default(),
        }
    }

    pub(crate) fn with_actions(mut self, actions: ActionEconomy) -> Self {
        self.actions = actions;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn sheet(&self) -> &CharacterSheet {
        &self.sheet
    }

    pub fn sheet_mut(&mut self) -> &mut CharacterSheet {
        &mut self.sheet
    }

    pub fn actions(&self) -> &ActionEconomy {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut ActionEconomy {
        &mut self.actions
    }

    pub fn speed(&self) -> u32 {
        self.sheet.movement_speed()
    }

    /// Reachable destinations with the budget left at each.
    pub fn valid_movements(&self, room: &Room) -> BTreeMap<Position, u32> {
        room.flood_fill(self.position, self.speed())
    }

    /// Spend the movement action to walk to `dest`, updating room occupancy.
    /// Returns the movement budget left on arrival.
    pub fn move_to(&mut self, room: &mut Room, dest: Position) -> Result<u32, TokenError> {
        if !self.actions.movement {
            tracing::debug!("{} tried to move without a movement action", self.name);
            return Err(TokenError::ActionSpent(ActionKind::Movement));
        }
        let Some(&left) = self.valid_movements(room).get(&dest) else {
            tracing::debug!("{} cannot reach {} from {}", self.name, dest, self.position);
            return Err(TokenError::Unreachable {
                name: self.name.clone(),
                from: self.position,
                to: dest,
            });
        };

        room.remove_occupant(&self.name, self.position);
        room.place(&self.name, dest)?;
        self.actions.spend(ActionKind::Movement)?;
        self.position = dest;
        Ok(left)
    }
}
