//! Equipment slots, armor and weapons.

use crate::dice::{DamageDice, DiceError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EquipmentError {
    #[error("Unknown damage type: {0}")]
    UnknownDamageType(String),
}

// ============================================================================
// Slots
// ============================================================================

/// Body locations an item can be equipped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSlot {
    Head,
    Neck,
    Body,
    Back,
    Arms,
    Hands,
    /// Off hand.
    HandL,
    FingersL,
    /// Main hand.
    HandR,
    FingersR,
    Waist,
    Legs,
    Feet,
}

impl EquipmentSlot {
    pub const MAIN_HAND: EquipmentSlot = EquipmentSlot::HandR;
    pub const OFF_HAND: EquipmentSlot = EquipmentSlot::HandL;

    pub fn all() -> [EquipmentSlot; 13] {
        [
            EquipmentSlot::Head,
            EquipmentSlot::Neck,
            EquipmentSlot::Body,
            EquipmentSlot::Back,
            EquipmentSlot::Arms,
            EquipmentSlot::Hands,
            EquipmentSlot::HandL,
            EquipmentSlot::FingersL,
            EquipmentSlot::HandR,
            EquipmentSlot::FingersR,
            EquipmentSlot::Waist,
            EquipmentSlot::Legs,
            EquipmentSlot::Feet,
        ]
    }

    pub fn is_hand(&self) -> bool {
        matches!(self, EquipmentSlot::HandL | EquipmentSlot::HandR)
    }

    pub fn name(&self) -> &'static str {
        match self {
            EquipmentSlot::Head => "head",
            EquipmentSlot::Neck => "neck",
            EquipmentSlot::Body => "body",
            EquipmentSlot::Back => "back",
            EquipmentSlot::Arms => "arms",
            EquipmentSlot::Hands => "hands",
            EquipmentSlot::HandL => "hand_l",
            EquipmentSlot::FingersL => "fingers_l",
            EquipmentSlot::HandR => "hand_r",
            EquipmentSlot::FingersR => "fingers_r",
            EquipmentSlot::Waist => "waist",
            EquipmentSlot::Legs => "legs",
            EquipmentSlot::Feet => "feet",
        }
    }
}

impl fmt::Display for EquipmentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Damage Types
// ============================================================================

/// Common damage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Thunder,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    Force,
    Psychic,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Thunder => "thunder",
            DamageType::Acid => "acid",
            DamageType::Poison => "poison",
            DamageType::Necrotic => "necrotic",
            DamageType::Radiant => "radiant",
            DamageType::Force => "force",
            DamageType::Psychic => "psychic",
        }
    }

    pub fn all() -> [DamageType; 13] {
        [
            DamageType::Slashing,
            DamageType::Piercing,
            DamageType::Bludgeoning,
            DamageType::Fire,
            DamageType::Cold,
            DamageType::Lightning,
            DamageType::Thunder,
            DamageType::Acid,
            DamageType::Poison,
            DamageType::Necrotic,
            DamageType::Radiant,
            DamageType::Force,
            DamageType::Psychic,
        ]
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DamageType {
    type Err = EquipmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DamageType::all()
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EquipmentError::UnknownDamageType(s.to_string()))
    }
}

// ============================================================================
// Items
// ============================================================================

/// A piece of armor bound to one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Armor {
    pub name: String,
    pub slot: EquipmentSlot,
    pub armor_class: i32,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default)]
    pub restrictions: Vec<String>,
}

impl Armor {
    pub fn new(name: impl Into<String>, slot: EquipmentSlot, armor_class: i32) -> Self {
        Self {
            name: name.into(),
            slot,
            armor_class,
            effects: Vec::new(),
            restrictions: Vec::new(),
        }
    }

    pub fn with_effects(mut self, effects: Vec<String>) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_restrictions(mut self, restrictions: Vec<String>) -> Self {
        self.restrictions = restrictions;
        self
    }
}

/// A weapon with its damage dice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub slot: EquipmentSlot,
    pub damage: DamageDice,
    pub damage_type: DamageType,
    #[serde(default)]
    pub two_handed: bool,
    #[serde(default)]
    pub restrictions: Vec<String>,
}

impl Weapon {
    pub fn new(
        name: impl Into<String>,
        slot: EquipmentSlot,
        damage: DamageDice,
        damage_type: DamageType,
    ) -> Self {
        Self {
            name: name.into(),
            slot,
            damage,
            damage_type,
            two_handed: false,
            restrictions: Vec::new(),
        }
    }

    /// Build a weapon from damage notation such as `1d8+1`.
    pub fn parse(
        name: impl Into<String>,
        slot: EquipmentSlot,
        damage: &str,
        damage_type: DamageType,
    ) -> Result<Self, DiceError> {
        Ok(Self::new(name, slot, DamageDice::parse(damage)?, damage_type))
    }

    pub fn two_handed(mut self) -> Self {
        self.two_handed = true;
        self
    }

    pub fn with_restrictions(mut self, restrictions: Vec<String>) -> Self {
        self.restrictions = restrictions;
        self
    }

    /// Flat bonus applied to attack and damage rolls.
    pub fn modifier(&self) -> i32 {
        self.damage.modifier
    }
}

/// Anything that can be equipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Equipment {
    Armor(Armor),
    Weapon(Weapon),
}

impl Equipment {
    pub fn name(&self) -> &str {
        match self {
            Equipment::Armor(a) => &a.name,
            Equipment::Weapon(w) => &w.name,
        }
    }

    pub fn slot(&self) -> EquipmentSlot {
        match self {
            Equipment::Armor(a) => a.slot,
            Equipment::Weapon(w) => w.slot,
        }
    }

    pub fn restrictions(&self) -> &[String] {
        match self {
            Equipment::Armor(a) => &a.restrictions,
            Equipment::Weapon(w) => &w.restrictions,
        }
    }

    pub fn as_weapon(&self) -> Option<&Weapon> {
        match self {
            Equipment::Weapon(w) => Some(w),
            Equipment::Armor(_) => None,
        }
    }

    pub fn as_armor(&self) -> Option<&Armor> {
        match self {
            Equipment::Armor(a) => Some(a),
            Equipment::Weapon(_) => None,
        }
    }

    pub fn is_two_handed(&self) -> bool {
        self.as_weapon().is_some_and(|w| w.two_handed)
    }

    /// Armor class contributed while equipped.
    pub fn armor_class_bonus(&self) -> i32 {
        self.as_armor().map_or(0, |a| a.armor_class)
    }
}

impl From<Armor> for Equipment {
    fn from(armor: Armor) -> Self {
        Equipment::Armor(armor)
    }
}

impl From<Weapon> for Equipment {
    fn from(weapon: Weapon) -> Self {
        Equipment::Weapon(weapon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_names_round_trip_through_serde() {
        for slot in EquipmentSlot::all() {
            let json = serde_json::to_string(&slot).unwrap();
            assert_eq!(json, format!("\"{}\"", slot.name()));
        }
    }

    #[test]
    fn test_weapon_parse() {
        let sword = Weapon::parse("Iron Sword", EquipmentSlot::HandR, "1d8+1", DamageType::Slashing)
            .unwrap();
        assert_eq!(sword.modifier(), 1);
        assert_eq!(sword.damage.spec.to_string(), "1d8");
        assert!(!sword.two_handed);

        assert!(Weapon::parse("Bent Stick", EquipmentSlot::HandR, "1d0", DamageType::Bludgeoning)
            .is_err());
    }

    #[test]
    fn test_equipment_tagged_record() {
        let helm: Equipment = Armor::new("Iron Helm", EquipmentSlot::Head, 2).into();
        let value = serde_json::to_value(&helm).unwrap();
        assert_eq!(value["kind"], "armor");
        assert_eq!(value["slot"], "head");
        assert_eq!(value["armor_class"], 2);

        let zweihander: Equipment = Weapon::parse(
            "Iron Zweihander",
            EquipmentSlot::HandR,
            "1d12",
            DamageType::Slashing,
        )
        .unwrap()
        .two_handed()
        .into();
        let value = serde_json::to_value(&zweihander).unwrap();
        assert_eq!(value["kind"], "weapon");
        assert_eq!(value["damage"], "1d12");
        assert_eq!(value["two_handed"], true);
        assert!(zweihander.is_two_handed());
    }

    #[test]
    fn test_shared_capabilities() {
        let cloak: Equipment = Armor::new("Cloak", EquipmentSlot::Back, 1)
            .with_restrictions(vec!["no_plate".to_string()])
            .into();
        assert_eq!(cloak.name(), "Cloak");
        assert_eq!(cloak.slot(), EquipmentSlot::Back);
        assert_eq!(cloak.restrictions(), ["no_plate".to_string()]);
        assert_eq!(cloak.armor_class_bonus(), 1);
        assert!(cloak.as_weapon().is_none());
    }

    #[test]
    fn test_damage_type_parse() {
        assert_eq!("fire".parse::<DamageType>().unwrap(), DamageType::Fire);
        assert_eq!("Slashing".parse::<DamageType>().unwrap(), DamageType::Slashing);
        assert_eq!(
            "sonic".parse::<DamageType>(),
            Err(EquipmentError::UnknownDamageType("sonic".to_string()))
        );
    }
}
