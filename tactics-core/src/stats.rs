//! Ability scores and their derived modifiers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from stat block construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("Missing ability score: {0}")]
    MissingAbility(Ability),
    #[error("Unknown ability: {0}")]
    UnknownAbility(String),
    #[error("Score {score} for {ability} is outside the point buy range 8-16")]
    PointBuyOutOfRange { ability: Ability, score: u8 },
    #[error("Total point cost {cost} exceeds the budget of {budget}")]
    PointBuyOverBudget { cost: u32, budget: u32 },
}

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    Strength,
    Constitution,
    Dexterity,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Constitution => "CON",
            Ability::Dexterity => "DEX",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Ability::Strength => "strength",
            Ability::Constitution => "constitution",
            Ability::Dexterity => "dexterity",
            Ability::Intelligence => "intelligence",
            Ability::Wisdom => "wisdom",
            Ability::Charisma => "charisma",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Constitution,
            Ability::Dexterity,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

impl FromStr for Ability {
    type Err = StatsError;

    /// Accepts either the abbreviation (`STR`) or the full name (`strength`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ability::all()
            .into_iter()
            .find(|a| a.abbreviation().eq_ignore_ascii_case(s) || a.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| StatsError::UnknownAbility(s.to_string()))
    }
}

/// Ability modifier for a raw score: floor((score - 10) / 2).
pub fn modifier_for(score: u8) -> i8 {
    (i16::from(score) - 10).div_euclid(2) as i8
}

/// The stat block: exactly one score per ability.
///
/// Serializes as a mapping of ability name to score; deserializing a mapping
/// with a missing ability fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub constitution: u8,
    pub dexterity: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    pub fn new(str: u8, con: u8, dex: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            constitution: con,
            dexterity: dex,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    /// Every ability at the same score.
    pub fn uniform(score: u8) -> Self {
        Self::new(score, score, score, score, score, score)
    }

    /// Build from a keyed table, failing on the first missing ability.
    pub fn from_map(scores: &HashMap<Ability, u8>) -> Result<Self, StatsError> {
        let get = |ability| {
            scores
                .get(&ability)
                .copied()
                .ok_or(StatsError::MissingAbility(ability))
        };
        Ok(Self {
            strength: get(Ability::Strength)?,
            constitution: get(Ability::Constitution)?,
            dexterity: get(Ability::Dexterity)?,
            intelligence: get(Ability::Intelligence)?,
            wisdom: get(Ability::Wisdom)?,
            charisma: get(Ability::Charisma)?,
        })
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Constitution => self.constitution,
            Ability::Dexterity => self.dexterity,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: u8) {
        match ability {
            Ability::Strength => self.strength = value,
            Ability::Constitution => self.constitution = value,
            Ability::Dexterity => self.dexterity = value,
            Ability::Intelligence => self.intelligence = value,
            Ability::Wisdom => self.wisdom = value,
            Ability::Charisma => self.charisma = value,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i8 {
        modifier_for(self.get(ability))
    }

    /// Add racial bonuses, saturating at the score bounds.
    pub fn apply_bonuses(&mut self, bonuses: &AbilityBonuses) {
        for ability in Ability::all() {
            let raised = self.get(ability).saturating_add_signed(bonuses.get(ability));
            self.set(ability, raised);
        }
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::uniform(10)
    }
}

/// Signed per-ability adjustments, as granted by a race.
///
/// Absent abilities default to zero; keys may be full names or abbreviations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityBonuses {
    #[serde(alias = "STR")]
    pub strength: i8,
    #[serde(alias = "CON")]
    pub constitution: i8,
    #[serde(alias = "DEX")]
    pub dexterity: i8,
    #[serde(alias = "INT")]
    pub intelligence: i8,
    #[serde(alias = "WIS")]
    pub wisdom: i8,
    #[serde(alias = "CHA")]
    pub charisma: i8,
}

impl AbilityBonuses {
    pub fn get(&self, ability: Ability) -> i8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Constitution => self.constitution,
            Ability::Dexterity => self.dexterity,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn with(mut self, ability: Ability, bonus: i8) -> Self {
        match ability {
            Ability::Strength => self.strength = bonus,
            Ability::Constitution => self.constitution = bonus,
            Ability::Dexterity => self.dexterity = bonus,
            Ability::Intelligence => self.intelligence = bonus,
            Ability::Wisdom => self.wisdom = bonus,
            Ability::Charisma => self.charisma = bonus,
        }
        self
    }
}

// ============================================================================
// Point Buy
// ============================================================================

pub const POINT_BUY_MIN: u8 = 8;
pub const POINT_BUY_MAX: u8 = 16;

/// Point cost of a single score: one point per step until the modifier
/// reaches +2, two points per step after that.
pub fn point_buy_cost(score: u8) -> Option<u32> {
    if !(POINT_BUY_MIN..=POINT_BUY_MAX).contains(&score) {
        return None;
    }
    let steps = u32::from(score);
    if modifier_for(score) < 2 {
        Some(steps - 8)
    } else {
        Some(5 + (steps - 13) * 2)
    }
}

/// Total cost of a stat block, or the first ability outside the buyable range.
pub fn point_buy_total(scores: &AbilityScores) -> Result<u32, StatsError> {
    Ability::all().into_iter().try_fold(0, |total, ability| {
        let score = scores.get(ability);
        point_buy_cost(score)
            .map(|cost| total + cost)
            .ok_or(StatsError::PointBuyOutOfRange { ability, score })
    })
}

/// Validate a point buy against a budget.
pub fn validate_point_buy(scores: &AbilityScores, budget: u32) -> Result<u32, StatsError> {
    let cost = point_buy_total(scores)?;
    if cost > budget {
        return Err(StatsError::PointBuyOverBudget { cost, budget });
    }
    Ok(cost)
}
