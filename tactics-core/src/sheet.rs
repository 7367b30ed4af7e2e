//! Character sheets: hit points, armor class, equipment and combat rolls.
//!
//! A sheet privately owns one [`Dice`] engine per die type it has used. The
//! d20 and the race's natural weapon die are always present; weapon dice are
//! added the first time a weapon is equipped or rolled.

use crate::dice::{Advantage, DiceError, Dice, DieSpec};
use crate::equipment::{DamageType, Equipment, EquipmentSlot, Weapon};
use crate::race::Race;
use crate::stats::{Ability, AbilityScores};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetError {
    #[error("Dice error: {0}")]
    Dice(#[from] DiceError),
}

/// Outcome of an attack roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRoll {
    pub hit: bool,
    pub roll: i32,
}

/// Seed for one die type, derived from a sheet-wide base seed.
pub(crate) fn derive_seed(base: u64, spec: DieSpec) -> u64 {
    let key = (u64::from(spec.count()) << 32) | u64::from(spec.size());
    base ^ key.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[derive(Debug)]
pub struct CharacterSheet {
    scores: AbilityScores,
    race: Race,
    role: String,
    equipment: BTreeMap<EquipmentSlot, Option<Equipment>>,
    inventory: Vec<Equipment>,
    dice: BTreeMap<DieSpec, Dice>,
    dice_seed: Option<u64>,
    hp: i32,
    max_hp: i32,
}

impl CharacterSheet {
    /// Create a sheet, applying the race's ability adjustments. Dice seeds
    /// are drawn from entropy.
    pub fn new(scores: AbilityScores, race: Race, role: impl Into<String>) -> Self {
        Self::create(scores, race, role.into(), None)
    }

    /// Create a sheet whose dice seeds all derive from `seed`.
    pub fn seeded(scores: AbilityScores, race: Race, role: impl Into<String>, seed: u64) -> Self {
        Self::create(scores, race, role.into(), Some(seed))
    }

    fn create(mut scores: AbilityScores, race: Race, role: String, dice_seed: Option<u64>) -> Self {
        scores.apply_bonuses(&race.ability_mod);
        let max_hp = 10 + i32::from(scores.modifier(Ability::Constitution));
        let mut sheet = Self {
            scores,
            race,
            role,
            equipment: EquipmentSlot::all().into_iter().map(|s| (s, None)).collect(),
            inventory: Vec::new(),
            dice: BTreeMap::new(),
            dice_seed,
            hp: max_hp,
            max_hp,
        };
        sheet.add_dice(DieSpec::D20);
        sheet.add_dice(sheet.race.natural_weapon.dice);
        sheet
    }

    /// Reassemble a sheet from already validated parts without touching the
    /// scores again.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        scores: AbilityScores,
        race: Race,
        role: String,
        equipment: BTreeMap<EquipmentSlot, Option<Equipment>>,
        inventory: Vec<Equipment>,
        dice: BTreeMap<DieSpec, Dice>,
        dice_seed: Option<u64>,
        hp: i32,
        max_hp: i32,
    ) -> Self {
        let mut sheet = Self {
            scores,
            race,
            role,
            equipment,
            inventory,
            dice,
            dice_seed,
            hp,
            max_hp,
        };
        for slot in EquipmentSlot::all() {
            sheet.equipment.entry(slot).or_insert(None);
        }
        sheet.add_dice(DieSpec::D20);
        sheet.add_dice(sheet.race.natural_weapon.dice);
        sheet
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn scores(&self) -> &AbilityScores {
        &self.scores
    }

    pub fn race(&self) -> &Race {
        &self.race
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    pub fn max_hp(&self) -> i32 {
        self.max_hp
    }

    pub fn movement_speed(&self) -> u32 {
        self.race.movement_speed
    }

    pub fn inventory(&self) -> &[Equipment] {
        &self.inventory
    }

    pub fn equipment(&self) -> &BTreeMap<EquipmentSlot, Option<Equipment>> {
        &self.equipment
    }

    /// Raw content of a slot.
    pub fn equipped(&self, slot: EquipmentSlot) -> Option<&Equipment> {
        self.equipment.get(&slot).and_then(Option::as_ref)
    }

    /// The weapon held in a hand. The off hand reports a two-handed weapon
    /// gripped in the main hand.
    pub fn wielded(&self, slot: EquipmentSlot) -> Option<&Weapon> {
        if !slot.is_hand() {
            return None;
        }
        if let Some(weapon) = self.equipped(slot).and_then(Equipment::as_weapon) {
            return Some(weapon);
        }
        self.two_hander()
    }

    fn two_hander(&self) -> Option<&Weapon> {
        self.equipped(EquipmentSlot::MAIN_HAND)
            .and_then(Equipment::as_weapon)
            .filter(|w| w.two_handed)
    }

    pub fn dice(&self) -> &BTreeMap<DieSpec, Dice> {
        &self.dice
    }

    pub(crate) fn dice_seed(&self) -> Option<u64> {
        self.dice_seed
    }

    /// Register an engine for a die type if the sheet has none yet.
    pub fn add_dice(&mut self, spec: DieSpec) {
        self.dice_for(spec);
    }

    fn dice_for(&mut self, spec: DieSpec) -> &mut Dice {
        let seed = self.dice_seed.map(|base| derive_seed(base, spec));
        self.dice
            .entry(spec)
            .or_insert_with(|| Dice::with_spec(spec, seed))
    }

    fn modifier(&self, ability: Ability) -> i32 {
        i32::from(self.scores.modifier(ability))
    }

    // ========================================================================
    // Derived Stats
    // ========================================================================

    /// 10 + DEX modifier + natural armor + every equipped armor bonus.
    pub fn armor_class(&self) -> i32 {
        let worn: i32 = self
            .equipment
            .values()
            .flatten()
            .map(Equipment::armor_class_bonus)
            .sum();
        10 + self.modifier(Ability::Dexterity) + self.race.natural_armor + worn
    }

    // ========================================================================
    // Equipment
    // ========================================================================

    /// Move whatever occupies `slot` into the inventory.
    fn evict(&mut self, slot: EquipmentSlot) {
        if let Some(previous) = self.equipment.insert(slot, None).flatten() {
            tracing::debug!("{} moved from {} to inventory", previous.name(), slot);
            self.inventory.push(previous);
        }
    }

    /// Equip an item, swapping any displaced items into the inventory.
    ///
    /// Two-handed weapons always take the main hand and clear the off hand.
    /// Anything placed in the off hand forces a two-handed weapon out.
    pub fn equip(&mut self, item: Equipment, offhand: bool) {
        let slot = match &item {
            Equipment::Weapon(_) if offhand => EquipmentSlot::OFF_HAND,
            _ => item.slot(),
        };
        self.install(item, slot);
    }

    /// Move the occupant of `slot` to the inventory and install `replacement`
    /// there under the same hand rules as [`equip`](Self::equip).
    pub fn unequip(&mut self, slot: EquipmentSlot, replacement: Option<Equipment>) {
        match replacement {
            Some(item) => self.install(item, slot),
            None => self.evict(slot),
        }
    }

    fn install(&mut self, item: Equipment, slot: EquipmentSlot) {
        if let Some(pos) = self.inventory.iter().position(|held| *held == item) {
            self.inventory.remove(pos);
        }

        let two_handed = item.is_two_handed();
        let slot = if two_handed { EquipmentSlot::MAIN_HAND } else { slot };
        if slot == EquipmentSlot::OFF_HAND && self.two_hander().is_some() {
            self.evict(EquipmentSlot::MAIN_HAND);
        }
        if two_handed {
            self.evict(EquipmentSlot::OFF_HAND);
        }
        self.evict(slot);

        if let Equipment::Weapon(weapon) = &item {
            self.add_dice(weapon.damage.spec);
        }
        self.equipment.insert(slot, Some(item));
    }

    // ========================================================================
    // Rolls
    // ========================================================================

    /// Roll 1d20 + STR (+ the weapon bonus when a hand slot holds a weapon).
    /// Hits only when the roll strictly exceeds the target's armor class.
    pub fn attack(
        &mut self,
        target_armor_class: i32,
        weapon_slot: Option<EquipmentSlot>,
    ) -> Result<AttackRoll, SheetError> {
        self.attack_with_advantage(target_armor_class, weapon_slot, Advantage::Normal)
    }

    pub fn attack_with_advantage(
        &mut self,
        target_armor_class: i32,
        weapon_slot: Option<EquipmentSlot>,
        advantage: Advantage,
    ) -> Result<AttackRoll, SheetError> {
        let weapon_bonus = weapon_slot
            .and_then(|slot| self.wielded(slot))
            .map_or(0, Weapon::modifier);
        let modifier = self.modifier(Ability::Strength) + weapon_bonus;
        let roll = self
            .dice_for(DieSpec::D20)
            .roll_advantage(advantage, modifier)?;
        Ok(AttackRoll {
            hit: roll > target_armor_class,
            roll,
        })
    }

    /// Roll the weapon in `weapon_slot`, or the natural weapon when that slot
    /// holds none.
    pub fn roll_damage(
        &mut self,
        weapon_slot: Option<EquipmentSlot>,
    ) -> Result<(i32, DamageType), SheetError> {
        let strength = self.modifier(Ability::Strength);
        let (spec, modifier, damage_type) = match weapon_slot.and_then(|slot| self.wielded(slot)) {
            Some(weapon) => (
                weapon.damage.spec,
                strength + weapon.modifier(),
                weapon.damage_type,
            ),
            None => (
                self.race.natural_weapon.dice,
                strength,
                self.race.natural_weapon.damage_type,
            ),
        };
        let damage = self.dice_for(spec).roll(modifier)?;
        Ok((damage, damage_type))
    }

    /// 1d20 + DEX.
    pub fn roll_initiative(&mut self) -> Result<i32, SheetError> {
        let dex = self.modifier(Ability::Dexterity);
        Ok(self.dice_for(DieSpec::D20).roll(dex)?)
    }

    /// Apply damage after resistances and return the amount actually taken.
    /// HP may go negative.
    pub fn take_damage(&mut self, amount: i32, damage_type: DamageType) -> i32 {
        let applied = self.race.adjust_damage(amount, damage_type);
        self.hp -= applied;
        applied
    }

    /// Restore HP up to the maximum, returning the amount restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.hp = (self.hp + amount.max(0)).min(self.max_hp).max(before);
        self.hp - before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::Armor;
    use crate::race::ResistanceLevel;
    use crate::stats::AbilityBonuses;

    fn fighter(race: Race) -> CharacterSheet {
        CharacterSheet::seeded(AbilityScores::uniform(10), race, "fighter", 7)
    }

    fn helm() -> Equipment {
        Armor::new("Iron Helm", EquipmentSlot::Head, 2).into()
    }

    fn hat() -> Equipment {
        Armor::new("Fancy Hat", EquipmentSlot::Head, 0).into()
    }

    fn sword() -> Equipment {
        Weapon::parse("Iron Sword", EquipmentSlot::HandR, "1d8+1", DamageType::Slashing)
            .unwrap()
            .into()
    }

    fn dagger() -> Equipment {
        Weapon::parse("Dagger", EquipmentSlot::HandR, "1d4", DamageType::Piercing)
            .unwrap()
            .into()
    }

    fn zweihander() -> Equipment {
        Weapon::parse("Zweihander", EquipmentSlot::HandR, "2d6", DamageType::Slashing)
            .unwrap()
            .two_handed()
            .into()
    }

    fn names(items: &[Equipment]) -> Vec<&str> {
        items.iter().map(Equipment::name).collect()
    }

    #[test]
    fn test_new_sheet() {
        let sheet = fighter(Race::new("Human"));
        assert_eq!(sheet.max_hp(), 10);
        assert_eq!(sheet.hp(), 10);
        assert_eq!(sheet.equipment().len(), 13);
        assert!(sheet.equipment().values().all(Option::is_none));
        assert!(sheet.dice().contains_key(&DieSpec::D20));
        assert!(sheet.dice().contains_key(&DieSpec::D4));
        assert_eq!(sheet.movement_speed(), 5);
    }

    #[test]
    fn test_race_bonuses_feed_derived_stats() {
        let race = Race::new("Hardy")
            .with_ability_mod(AbilityBonuses::default().with(Ability::Constitution, 4));
        let sheet = fighter(race);
        assert_eq!(sheet.scores().constitution, 14);
        assert_eq!(sheet.max_hp(), 12);
    }

    #[test]
    fn test_armor_class_from_dexterity() {
        let race =
            Race::new("Nimble").with_ability_mod(AbilityBonuses::default().with(Ability::Dexterity, 4));
        assert_eq!(fighter(race).armor_class(), 12);
    }

    #[test]
    fn test_armor_class_from_natural_armor() {
        let race = Race::new("Scaled").with_natural_armor(2);
        assert_eq!(fighter(race).armor_class(), 12);
    }

    #[test]
    fn test_equip_armor() {
        let mut sheet = fighter(Race::new("Human"));
        sheet.equip(helm(), false);
        assert_eq!(sheet.armor_class(), 12);

        sheet.equip(Armor::new("Breastplate", EquipmentSlot::Body, 4).into(), false);
        assert_eq!(sheet.armor_class(), 16);
    }

    #[test]
    fn test_equip_swaps_into_inventory() {
        let mut sheet = fighter(Race::new("Human"));
        sheet.equip(helm(), false);
        sheet.equip(hat(), false);

        assert_eq!(sheet.armor_class(), 10);
        assert_eq!(names(sheet.inventory()), vec!["Iron Helm"]);
        assert_eq!(sheet.equipped(EquipmentSlot::Head).unwrap().name(), "Fancy Hat");

        // Re-equipping from the inventory pulls the item back out of it
        sheet.equip(helm(), false);
        assert_eq!(names(sheet.inventory()), vec!["Fancy Hat"]);
        assert_eq!(sheet.armor_class(), 12);
    }

    #[test]
    fn test_equip_main_and_off_hand() {
        let mut sheet = fighter(Race::new("Human"));
        sheet.equip(sword(), false);
        sheet.equip(dagger(), true);

        assert_eq!(sheet.equipped(EquipmentSlot::HandR).unwrap().name(), "Iron Sword");
        assert_eq!(sheet.equipped(EquipmentSlot::HandL).unwrap().name(), "Dagger");
        assert!(sheet.dice().contains_key(&DieSpec::parse("1d8").unwrap()));
    }

    #[test]
    fn test_two_handed_clears_both_hands() {
        let mut sheet = fighter(Race::new("Human"));
        sheet.equip(sword(), false);
        sheet.equip(dagger(), true);
        sheet.equip(zweihander(), false);

        assert_eq!(sheet.equipped(EquipmentSlot::HandR).unwrap().name(), "Zweihander");
        assert!(sheet.equipped(EquipmentSlot::HandL).is_none());
        assert_eq!(sheet.wielded(EquipmentSlot::HandL).unwrap().name, "Zweihander");
        assert_eq!(names(sheet.inventory()), vec!["Dagger", "Iron Sword"]);
    }

    #[test]
    fn test_off_hand_evicts_two_handed() {
        let mut sheet = fighter(Race::new("Human"));
        sheet.equip(zweihander(), false);
        sheet.equip(dagger(), true);

        assert!(sheet.equipped(EquipmentSlot::HandR).is_none());
        assert_eq!(sheet.equipped(EquipmentSlot::HandL).unwrap().name(), "Dagger");
        assert_eq!(names(sheet.inventory()), vec!["Zweihander"]);
    }

    #[test]
    fn test_unequip() {
        let mut sheet = fighter(Race::new("Human"));
        sheet.equip(helm(), false);
        sheet.unequip(EquipmentSlot::Head, None);
        assert!(sheet.equipped(EquipmentSlot::Head).is_none());
        assert_eq!(names(sheet.inventory()), vec!["Iron Helm"]);

        // Unequipping an empty slot adds nothing
        sheet.unequip(EquipmentSlot::Feet, None);
        assert_eq!(sheet.inventory().len(), 1);

        sheet.unequip(EquipmentSlot::Head, Some(hat()));
        assert_eq!(sheet.equipped(EquipmentSlot::Head).unwrap().name(), "Fancy Hat");
    }

    #[test]
    fn test_unequip_off_hand_replacement_evicts_two_handed() {
        let mut sheet = fighter(Race::new("Human"));
        sheet.equip(zweihander(), false);
        sheet.unequip(EquipmentSlot::OFF_HAND, Some(dagger()));

        assert!(sheet.equipped(EquipmentSlot::HandR).is_none());
        assert_eq!(sheet.equipped(EquipmentSlot::HandL).unwrap().name(), "Dagger");
        assert_eq!(names(sheet.inventory()), vec!["Zweihander"]);
    }

    #[test]
    fn test_unequip_two_handed_replacement_clears_off_hand() {
        let mut sheet = fighter(Race::new("Human"));
        sheet.equip(sword(), false);
        sheet.equip(dagger(), true);
        sheet.unequip(EquipmentSlot::MAIN_HAND, Some(zweihander()));

        assert_eq!(sheet.equipped(EquipmentSlot::HandR).unwrap().name(), "Zweihander");
        assert!(sheet.equipped(EquipmentSlot::HandL).is_none());
        assert_eq!(names(sheet.inventory()), vec!["Iron Sword", "Dagger"]);

        // A two-hander named for the off hand still lands in the main hand
        let mut other = fighter(Race::new("Human"));
        other.equip(dagger(), true);
        other.unequip(EquipmentSlot::OFF_HAND, Some(zweihander()));
        assert_eq!(other.equipped(EquipmentSlot::HandR).unwrap().name(), "Zweihander");
        assert!(other.equipped(EquipmentSlot::HandL).is_none());
        assert_eq!(names(other.inventory()), vec!["Dagger"]);
    }

    #[test]
    fn test_attack_is_strictly_greater() {
        let mut sheet = fighter(Race::new("Human"));
        for _ in 0..50 {
            let attack = sheet.attack(10, None).unwrap();
            assert!((1..=20).contains(&attack.roll));
            assert_eq!(attack.hit, attack.roll > 10);
        }
    }

    #[test]
    fn test_attack_adds_weapon_bonus() {
        let mut plain = fighter(Race::new("Human"));
        let mut armed = fighter(Race::new("Human"));
        armed.equip(sword(), false);

        for _ in 0..20 {
            let base = plain.attack(10, Some(EquipmentSlot::HandR)).unwrap().roll;
            let bonus = armed.attack(10, Some(EquipmentSlot::HandR)).unwrap().roll;
            assert_eq!(bonus, base + 1);
        }
    }

    #[test]
    fn test_roll_damage() {
        let mut sheet = fighter(Race::new("Human"));
        for _ in 0..20 {
            let (damage, kind) = sheet.roll_damage(None).unwrap();
            assert!((1..=4).contains(&damage));
            assert_eq!(kind, DamageType::Bludgeoning);
        }

        sheet.equip(sword(), false);
        for _ in 0..20 {
            let (damage, kind) = sheet.roll_damage(Some(EquipmentSlot::HandR)).unwrap();
            assert!((2..=9).contains(&damage));
            assert_eq!(kind, DamageType::Slashing);
        }

        // Empty off hand falls back to the natural weapon
        let (_, kind) = sheet.roll_damage(Some(EquipmentSlot::HandL)).unwrap();
        assert_eq!(kind, DamageType::Bludgeoning);
    }

    #[test]
    fn test_take_damage_with_resistances() {
        let race = Race::new("Salamander")
            .with_resistance(DamageType::Fire, ResistanceLevel::Immune)
            .with_resistance(DamageType::Cold, ResistanceLevel::Bane);
        let mut sheet = fighter(race);

        assert_eq!(sheet.take_damage(3, DamageType::Fire), 1);
        assert_eq!(sheet.hp(), 9);
        assert_eq!(sheet.take_damage(2, DamageType::Slashing), 2);
        assert_eq!(sheet.hp(), 7);
        assert_eq!(sheet.take_damage(3, DamageType::Cold), 12);
        assert_eq!(sheet.hp(), -5);
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut sheet = fighter(Race::new("Human"));
        sheet.take_damage(6, DamageType::Force);
        assert_eq!(sheet.heal(4), 4);
        assert_eq!(sheet.heal(10), 2);
        assert_eq!(sheet.hp(), sheet.max_hp());
        assert_eq!(sheet.heal(-3), 0);
    }

    #[test]
    fn test_seeded_sheets_roll_identically() {
        let mut a = fighter(Race::new("Human"));
        let mut b = fighter(Race::new("Human"));
        for _ in 0..10 {
            assert_eq!(a.roll_initiative().unwrap(), b.roll_initiative().unwrap());
            assert_eq!(a.roll_damage(None).unwrap(), b.roll_damage(None).unwrap());
        }
    }
}
