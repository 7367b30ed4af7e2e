//! Seeded dice rolling.
//!
//! Supports `XdY` die specifications, flat modifiers, and
//! advantage/disadvantage. Every engine owns its own seeded generator so a
//! sequence of rolls can be replayed by rebuilding the engine from its seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for die specification parsing and rolling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid die specification '{notation}': {reason}")]
    InvalidDieSpec { notation: String, reason: String },
    #[error("Invalid damage modifier in '{0}'")]
    InvalidModifier(String),
}

impl DiceError {
    fn invalid(notation: &str, reason: impl Into<String>) -> Self {
        DiceError::InvalidDieSpec {
            notation: notation.to_string(),
            reason: reason.into(),
        }
    }
}

/// Advantage state for a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Combine two advantage states (advantage + disadvantage = normal).
    pub fn combine(self, other: Advantage) -> Advantage {
        match (self, other) {
            (Advantage::Normal, x) | (x, Advantage::Normal) => x,
            (Advantage::Advantage, Advantage::Disadvantage) => Advantage::Normal,
            (Advantage::Disadvantage, Advantage::Advantage) => Advantage::Normal,
            (Advantage::Advantage, Advantage::Advantage) => Advantage::Advantage,
            (Advantage::Disadvantage, Advantage::Disadvantage) => Advantage::Disadvantage,
        }
    }
}

/// Most dice a single spec may roll at once.
pub const MAX_DICE: u32 = 1000;

/// A `<count>d<size>` die specification. The largest total always fits an `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DieSpec {
    count: u32,
    size: u32,
}

impl DieSpec {
    pub const D4: DieSpec = DieSpec { count: 1, size: 4 };
    pub const D10: DieSpec = DieSpec { count: 1, size: 10 };
    pub const D20: DieSpec = DieSpec { count: 1, size: 20 };

    /// Build a spec, rejecting fewer than one die, dice with fewer than two
    /// sides, and specs whose largest total does not fit an `i32`.
    pub fn new(count: u32, size: u32) -> Result<Self, DiceError> {
        Self::checked(&format!("{count}d{size}"), i64::from(count), i64::from(size))
    }

    /// Parse a `<count>d<size>` string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let trimmed = notation.trim().to_lowercase();
        let (count_str, size_str) = trimmed
            .split_once('d')
            .ok_or_else(|| DiceError::invalid(notation, "missing 'd' separator"))?;

        let count: i64 = count_str
            .trim()
            .parse()
            .map_err(|_| DiceError::invalid(notation, "number of dice is not an integer"))?;
        let size: i64 = size_str
            .trim()
            .parse()
            .map_err(|_| DiceError::invalid(notation, "size of dice is not an integer"))?;
        Self::checked(notation, count, size)
    }

    fn checked(notation: &str, count: i64, size: i64) -> Result<Self, DiceError> {
        if count < 1 {
            return Err(DiceError::invalid(
                notation,
                format!("number of dice is below the minimum of 1: {count}"),
            ));
        }
        if size < 2 {
            return Err(DiceError::invalid(
                notation,
                format!("size of dice is below the minimum of 2: {size}"),
            ));
        }
        if count > i64::from(MAX_DICE) {
            return Err(DiceError::invalid(
                notation,
                format!("number of dice is above the maximum of {MAX_DICE}: {count}"),
            ));
        }
        let fits = count
            .checked_mul(size)
            .is_some_and(|max| max <= i64::from(i32::MAX));
        if !fits {
            return Err(DiceError::invalid(notation, "largest total does not fit in an i32"));
        }

        let count = u32::try_from(count)
            .map_err(|_| DiceError::invalid(notation, "number of dice is too large"))?;
        let size = u32::try_from(size)
            .map_err(|_| DiceError::invalid(notation, "size of dice is too large"))?;
        Ok(Self { count, size })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Smallest and largest unmodified totals.
    pub fn range(&self) -> (u32, u32) {
        (self.count, self.count * self.size)
    }
}

impl FromStr for DieSpec {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DieSpec::parse(s)
    }
}

impl fmt::Display for DieSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.size)
    }
}

impl Serialize for DieSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DieSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let notation = String::deserialize(deserializer)?;
        DieSpec::parse(&notation).map_err(serde::de::Error::custom)
    }
}

/// A die specification plus a flat modifier, e.g. `1d8+1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DamageDice {
    pub spec: DieSpec,
    pub modifier: i32,
}

impl DamageDice {
    pub fn new(spec: DieSpec, modifier: i32) -> Self {
        Self { spec, modifier }
    }

    /// Parse `2d6`, `1d8+1` or `1d6-1`.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let trimmed = notation.trim();
        let (dice_part, modifier) = match trimmed.find(['+', '-']) {
            Some(pos) => {
                let value: i32 = trimmed[pos + 1..]
                    .trim()
                    .parse()
                    .map_err(|_| DiceError::InvalidModifier(notation.to_string()))?;
                let sign = if trimmed.as_bytes()[pos] == b'-' { -1 } else { 1 };
                (&trimmed[..pos], sign * value)
            }
            None => (trimmed, 0),
        };
        Ok(Self {
            spec: DieSpec::parse(dice_part)?,
            modifier,
        })
    }
}

impl FromStr for DamageDice {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DamageDice::parse(s)
    }
}

impl fmt::Display for DamageDice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifier {
            0 => write!(f, "{}", self.spec),
            m if m > 0 => write!(f, "{}+{}", self.spec, m),
            m => write!(f, "{}-{}", self.spec, m.unsigned_abs()),
        }
    }
}

impl Serialize for DamageDice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DamageDice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let notation = String::deserialize(deserializer)?;
        DamageDice::parse(&notation).map_err(serde::de::Error::custom)
    }
}

/// Complete result of a verbose roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollResult {
    pub spec: DieSpec,
    pub advantage: Advantage,
    /// Individual die values of every attempt (two attempts under advantage).
    pub attempts: Vec<Vec<u32>>,
    /// Index into `attempts` of the attempt that counted.
    pub kept: usize,
    pub modifier: i32,
    pub total: i32,
}

impl RollResult {
    /// Format the individual dice results for display.
    pub fn dice_display(&self) -> String {
        let parts: Vec<String> = self
            .attempts
            .iter()
            .enumerate()
            .map(|(i, rolls)| {
                let shown = format!(
                    "[{}]",
                    rolls
                        .iter()
                        .map(|r| r.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                if i == self.kept {
                    shown
                } else {
                    format!("({shown})")
                }
            })
            .collect();

        let dice_str = parts.join(" vs ");
        match self.modifier {
            0 => dice_str,
            m if m > 0 => format!("{dice_str} + {m}"),
            m => format!("{dice_str} - {}", m.unsigned_abs()),
        }
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} = {}", self.spec, self.dice_display(), self.total)
    }
}

/// A seeded, reproducible dice roller for one die specification.
///
/// An engine built from a malformed specification still exists but reports
/// `is_valid() == false`; every roll on it returns the construction error.
#[derive(Debug)]
pub struct Dice {
    notation: String,
    spec: Result<DieSpec, DiceError>,
    seed: u64,
    rng: ChaCha8Rng,
}

impl Dice {
    /// Build an engine from notation, drawing a fresh seed from entropy.
    pub fn new(notation: &str) -> Self {
        Self::build(notation, DieSpec::parse(notation), None)
    }

    /// Build an engine from notation with an explicit seed.
    pub fn seeded(notation: &str, seed: u64) -> Self {
        Self::build(notation, DieSpec::parse(notation), Some(seed))
    }

    /// Build an engine from an already validated spec.
    pub fn with_spec(spec: DieSpec, seed: Option<u64>) -> Self {
        Self::build(&spec.to_string(), Ok(spec), seed)
    }

    /// Rebuild an engine and fast-forward it to a recorded stream position.
    pub fn restore(notation: &str, seed: u64, stream_position: u64) -> Self {
        let mut dice = Self::seeded(notation, seed);
        dice.rng.set_word_pos(u128::from(stream_position));
        dice
    }

    fn build(notation: &str, spec: Result<DieSpec, DiceError>, seed: Option<u64>) -> Self {
        if let Err(err) = &spec {
            tracing::warn!("Dice built from invalid specification: {err}");
        }
        let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
        Self {
            notation: notation.to_string(),
            spec,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.spec.is_ok()
    }

    /// The construction error, if the specification was rejected.
    pub fn error(&self) -> Option<&DiceError> {
        self.spec.as_ref().err()
    }

    pub fn spec(&self) -> Result<DieSpec, DiceError> {
        self.spec.clone()
    }

    pub fn notation(&self) -> &str {
        &self.notation
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of generator words consumed so far.
    pub fn stream_position(&self) -> u64 {
        // Saturating: no session draws anywhere near 2^64 words.
        u64::try_from(self.rng.get_word_pos()).unwrap_or(u64::MAX)
    }

    fn draw(&mut self, spec: DieSpec) -> Vec<u32> {
        (0..spec.count)
            .map(|_| self.rng.gen_range(1..=spec.size))
            .collect()
    }

    // Totals are bounded by `DieSpec`, so the sum never leaves i32.
    fn sum(rolls: &[u32]) -> i32 {
        rolls.iter().map(|&r| r as i32).sum()
    }

    /// Roll once: the sum of `count` draws in `[1, size]` plus `modifier`.
    pub fn roll(&mut self, modifier: i32) -> Result<i32, DiceError> {
        let spec = self.spec()?;
        let rolls = self.draw(spec);
        Ok(Self::sum(&rolls).saturating_add(modifier))
    }

    /// Roll twice and keep the higher (advantage) or lower (disadvantage) sum.
    pub fn roll_advantage(&mut self, advantage: Advantage, modifier: i32) -> Result<i32, DiceError> {
        Ok(self.roll_advantage_verbose(advantage, modifier)?.total)
    }

    /// Roll once, keeping every individual die value.
    pub fn roll_verbose(&mut self, modifier: i32) -> Result<RollResult, DiceError> {
        self.roll_advantage_verbose(Advantage::Normal, modifier)
    }

    pub fn roll_advantage_verbose(
        &mut self,
        advantage: Advantage,
        modifier: i32,
    ) -> Result<RollResult, DiceError> {
        let spec = self.spec()?;
        let first = self.draw(spec);

        let (attempts, kept) = match advantage {
            Advantage::Normal => (vec![first], 0),
            Advantage::Advantage | Advantage::Disadvantage => {
                let second = self.draw(spec);
                let (a, b) = (Self::sum(&first), Self::sum(&second));
                let keep_second = match advantage {
                    Advantage::Advantage => b > a,
                    _ => b < a,
                };
                (vec![first, second], usize::from(keep_second))
            }
        };

        let total = Self::sum(&attempts[kept]).saturating_add(modifier);
        Ok(RollResult {
            spec,
            advantage,
            attempts,
            kept,
            modifier,
            total,
        })
    }
}

impl fmt::Display for Dice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dice(die_type: {}, seed: {})", self.notation, self.seed)
    }
}
