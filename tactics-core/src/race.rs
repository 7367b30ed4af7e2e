//! Race descriptors: ability adjustments, natural defenses and resistances.

use crate::dice::DieSpec;
use crate::equipment::DamageType;
use crate::stats::AbilityBonuses;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const DEFAULT_MOVEMENT_SPEED: u32 = 5;

#[derive(Debug, Error)]
pub enum RaceError {
    #[error("Unknown race: {0}")]
    UnknownRace(String),
    #[error("Failed to parse race table: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How strongly a race reacts to a damage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResistanceLevel {
    Bane,
    Weakness,
    Normal,
    Resistant,
    Immune,
}

impl ResistanceLevel {
    /// Scale incoming damage. Reduced tiers never drop below 1.
    pub fn apply(self, damage: i32) -> i32 {
        match self {
            ResistanceLevel::Bane => damage * 4,
            ResistanceLevel::Weakness => damage * 2,
            ResistanceLevel::Normal => damage,
            ResistanceLevel::Resistant => damage.div_euclid(2).max(1),
            ResistanceLevel::Immune => damage.div_euclid(4).max(1),
        }
    }
}

/// The unarmed attack a race falls back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NaturalWeapon {
    pub dice: DieSpec,
    pub damage_type: DamageType,
}

impl Default for NaturalWeapon {
    fn default() -> Self {
        Self {
            dice: DieSpec::D4,
            damage_type: DamageType::Bludgeoning,
        }
    }
}

fn default_movement_speed() -> u32 {
    DEFAULT_MOVEMENT_SPEED
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Race {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ability_mod: AbilityBonuses,
    #[serde(default, alias = "natural_ac")]
    pub natural_armor: i32,
    #[serde(default)]
    pub natural_weapon: NaturalWeapon,
    #[serde(default = "default_movement_speed")]
    pub movement_speed: u32,
    #[serde(default)]
    pub resistances: BTreeMap<DamageType, ResistanceLevel>,
}

impl Race {
    /// A race with no adjustments at all.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ability_mod: AbilityBonuses::default(),
            natural_armor: 0,
            natural_weapon: NaturalWeapon::default(),
            movement_speed: DEFAULT_MOVEMENT_SPEED,
            resistances: BTreeMap::new(),
        }
    }

    pub fn with_ability_mod(mut self, ability_mod: AbilityBonuses) -> Self {
        self.ability_mod = ability_mod;
        self
    }

    pub fn with_natural_armor(mut self, natural_armor: i32) -> Self {
        self.natural_armor = natural_armor;
        self
    }

    pub fn with_natural_weapon(mut self, dice: DieSpec, damage_type: DamageType) -> Self {
        self.natural_weapon = NaturalWeapon { dice, damage_type };
        self
    }

    pub fn with_movement_speed(mut self, movement_speed: u32) -> Self {
        self.movement_speed = movement_speed;
        self
    }

    pub fn with_resistance(mut self, damage_type: DamageType, level: ResistanceLevel) -> Self {
        self.resistances.insert(damage_type, level);
        self
    }

    /// Resistance tier for a damage type, if the race has one.
    pub fn resistance(&self, damage_type: DamageType) -> Option<ResistanceLevel> {
        self.resistances.get(&damage_type).copied()
    }

    /// Damage after this race's resistance table is applied.
    pub fn adjust_damage(&self, damage: i32, damage_type: DamageType) -> i32 {
        self.resistance(damage_type)
            .map_or(damage, |level| level.apply(damage))
    }
}

/// Races available at character creation, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaceTable {
    races: BTreeMap<String, Race>,
}

impl RaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `name -> race`. A race without a `name`
    /// field takes its key.
    pub fn from_json(json: &str) -> Result<Self, RaceError> {
        let mut races: BTreeMap<String, Race> = serde_json::from_str(json)?;
        for (key, race) in races.iter_mut() {
            if race.name.is_empty() {
                race.name = key.clone();
            }
        }
        Ok(Self { races })
    }

    pub fn insert(&mut self, race: Race) {
        self.races.insert(race.name.clone(), race);
    }

    pub fn get(&self, name: &str) -> Result<&Race, RaceError> {
        self.races
            .get(name)
            .ok_or_else(|| RaceError::UnknownRace(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.races.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.races.len()
    }

    pub fn is_empty(&self) -> bool {
        self.races.is_empty()
    }
}
