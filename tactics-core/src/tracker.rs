//! Turn tracking: token identity and initiative order.
//!
//! The tracker is the single owner of every token in an encounter. Each
//! token gets an opaque key built from 1d10 digits, and an initiative value
//! that is unique across the tracker. Ties are broken by adding a 1d10
//! thousandths jitter until the value is free.

use crate::dice::{Dice, DiceError, DieSpec};
use crate::sheet::SheetError;
use crate::token::CreatureToken;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const DEFAULT_KEY_DIGITS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("A token named '{0}' is already tracked")]
    DuplicateName(String),
    #[error("Unknown token key: {0}")]
    UnknownKey(TokenKey),
    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),
    #[error("Dice error: {0}")]
    Dice(#[from] DiceError),
}

/// Opaque identity of a tracked token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenKey(String);

impl TokenKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An initiative value held exactly in thousandths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Initiative(i64);

impl Initiative {
    pub fn from_roll(roll: i32) -> Self {
        Self(i64::from(roll) * 1000)
    }

    pub fn from_thousandths(thousandths: i64) -> Self {
        Self(thousandths)
    }

    pub fn thousandths(&self) -> i64 {
        self.0
    }

    pub fn value(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    fn jitter(self, thousandths: i32) -> Self {
        Self(self.0 + i64::from(thousandths))
    }
}

impl fmt::Display for Initiative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.value())
    }
}

/// Turn-taking behavior invoked for each token in initiative order.
pub trait TurnHandler {
    fn take_turn(&mut self, key: &TokenKey, token: &mut CreatureToken);
}

impl<F> TurnHandler for F
where
    F: FnMut(&TokenKey, &mut CreatureToken),
{
    fn take_turn(&mut self, key: &TokenKey, token: &mut CreatureToken) {
        self(key, token)
    }
}

#[derive(Debug)]
pub struct TurnTracker {
    tokens: BTreeMap<TokenKey, CreatureToken>,
    order: BTreeMap<Initiative, TokenKey>,
    die: Dice,
    key_digits: usize,
    reset_actions: bool,
    round: u32,
}

impl TurnTracker {
    pub fn new(seed: u64) -> Self {
        Self::build(Dice::with_spec(DieSpec::D10, Some(seed)), DEFAULT_KEY_DIGITS, true)
    }

    /// A tracker with explicit settings. A `None` seed draws from entropy.
    pub fn configured(seed: Option<u64>, key_digits: usize, reset_actions: bool) -> Self {
        Self::build(Dice::with_spec(DieSpec::D10, seed), key_digits, reset_actions)
    }

    fn build(die: Dice, key_digits: usize, reset_actions: bool) -> Self {
        Self {
            tokens: BTreeMap::new(),
            order: BTreeMap::new(),
            die,
            key_digits,
            reset_actions,
            round: 0,
        }
    }

    /// Reassemble a tracker whose registry and order were validated as a pair.
    pub(crate) fn from_parts(
        tokens: BTreeMap<TokenKey, CreatureToken>,
        order: BTreeMap<Initiative, TokenKey>,
        die: Dice,
        key_digits: usize,
        reset_actions: bool,
        round: u32,
    ) -> Self {
        Self {
            tokens,
            order,
            die,
            key_digits,
            reset_actions,
            round,
        }
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Register a token under a fresh key and roll its initiative.
    pub fn add_token(&mut self, token: CreatureToken) -> Result<TokenKey, TrackerError> {
        if self.key_of(token.name()).is_some() {
            return Err(TrackerError::DuplicateName(token.name().to_string()));
        }

        let key = self.generate_key()?;
        tracing::debug!("Tracking {} as {}", token.name(), key);
        self.tokens.insert(key.clone(), token);
        if let Err(err) = self.add_to_initiative(&key) {
            self.tokens.remove(&key);
            return Err(err);
        }
        Ok(key)
    }

    fn digit(&mut self) -> Result<char, TrackerError> {
        let roll = self.die.roll(-1)?;
        Ok(char::from(b'0' + roll as u8))
    }

    fn generate_key(&mut self) -> Result<TokenKey, TrackerError> {
        let mut key = String::with_capacity(self.key_digits);
        for _ in 0..self.key_digits {
            key.push(self.digit()?);
        }
        while key.is_empty() || self.tokens.contains_key(&TokenKey::new(key.as_str())) {
            key.push(self.digit()?);
        }
        Ok(TokenKey(key))
    }

    /// Roll (or re-roll) initiative for a tracked token.
    pub fn add_to_initiative(&mut self, key: &TokenKey) -> Result<Initiative, TrackerError> {
        let token = self
            .tokens
            .get_mut(key)
            .ok_or_else(|| TrackerError::UnknownKey(key.clone()))?;
        let roll = token.sheet_mut().roll_initiative()?;

        self.order.retain(|_, k| k != key);
        let mut initiative = Initiative::from_roll(roll);
        while self.order.contains_key(&initiative) {
            let jitter = self.die.roll(0)?;
            tracing::debug!("Initiative {} taken, adding {} thousandths for {}", initiative, jitter, key);
            initiative = initiative.jitter(jitter);
        }
        self.order.insert(initiative, key.clone());
        Ok(initiative)
    }

    /// Drop a token from the registry and the order. Absent keys are ignored.
    pub fn remove_token(&mut self, key: &TokenKey) -> Option<CreatureToken> {
        let token = self.tokens.remove(key)?;
        self.order.retain(|_, k| k != key);
        tracing::debug!("Stopped tracking {} ({})", token.name(), key);
        Some(token)
    }

    pub fn get(&self, key: &TokenKey) -> Option<&CreatureToken> {
        self.tokens.get(key)
    }

    pub fn get_mut(&mut self, key: &TokenKey) -> Option<&mut CreatureToken> {
        self.tokens.get_mut(key)
    }

    pub fn key_of(&self, name: &str) -> Option<&TokenKey> {
        self.tokens
            .iter()
            .find(|(_, token)| token.name() == name)
            .map(|(key, _)| key)
    }

    pub fn tokens(&self) -> impl Iterator<Item = (&TokenKey, &CreatureToken)> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    // ========================================================================
    // Order
    // ========================================================================

    /// Keys with their initiative, highest first.
    pub fn order(&self) -> Vec<(Initiative, &TokenKey)> {
        self.order.iter().rev().map(|(i, k)| (*i, k)).collect()
    }

    pub fn initiative(&self, key: &TokenKey) -> Option<Initiative> {
        self.order
            .iter()
            .find(|(_, k)| *k == key)
            .map(|(i, _)| *i)
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn seed(&self) -> u64 {
        self.die.seed()
    }

    pub fn key_digits(&self) -> usize {
        self.key_digits
    }

    pub fn resets_actions(&self) -> bool {
        self.reset_actions
    }

    pub(crate) fn die(&self) -> &Dice {
        &self.die
    }

    /// Give every token a turn in descending initiative order.
    pub fn process_turn<H: TurnHandler>(&mut self, handler: &mut H) {
        let keys: Vec<TokenKey> = self.order.values().rev().cloned().collect();
        for key in keys {
            if let Some(token) = self.tokens.get_mut(&key) {
                if self.reset_actions {
                    token.actions_mut().reset();
                }
                handler.take_turn(&key, token);
            }
        }
        self.round += 1;
    }
}
