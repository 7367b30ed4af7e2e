//! Snapshots of simulation state for external save/load.
//!
//! Every entity encodes to a plain serde snapshot with `From<&Entity>` and
//! decodes with `TryFrom<Snapshot>`. Decoding validates the whole snapshot
//! before building anything, so a failed load never leaves a partial entity.
//! Dice snapshots record the seed together with the stream position, which
//! makes a decoded entity continue the exact roll sequence of the original.
//!
//! This module never touches the filesystem; callers own the JSON text.

use crate::dice::{Dice, DiceError, DieSpec};
use crate::encounter::{Encounter, EncounterConfig};
use crate::equipment::{Equipment, EquipmentSlot};
use crate::grid::{GridError, Position, Room, TileSet};
use crate::race::Race;
use crate::sheet::CharacterSheet;
use crate::stats::AbilityScores;
use crate::token::{ActionEconomy, CreatureToken};
use crate::tracker::{Initiative, TokenKey, TurnTracker};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dice error: {0}")]
    Dice(#[from] DiceError),

    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    #[error("Invalid snapshot: {0}")]
    Invalid(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save format version.
pub const SAVE_VERSION: u32 = 1;

// ============================================================================
// Dice
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceSnapshot {
    pub notation: String,
    pub seed: u64,
    #[serde(default)]
    pub stream_position: u64,
}

impl From<&Dice> for DiceSnapshot {
    fn from(dice: &Dice) -> Self {
        Self {
            notation: dice.notation().to_string(),
            seed: dice.seed(),
            stream_position: dice.stream_position(),
        }
    }
}

impl TryFrom<DiceSnapshot> for Dice {
    type Error = PersistError;

    fn try_from(snapshot: DiceSnapshot) -> Result<Self, Self::Error> {
        DieSpec::parse(&snapshot.notation)?;
        Ok(Dice::restore(&snapshot.notation, snapshot.seed, snapshot.stream_position))
    }
}

// ============================================================================
// Character Sheets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSnapshot {
    /// Scores with race adjustments already applied.
    pub ability_scores: AbilityScores,
    pub race: Race,
    pub role: String,
    pub dice: Vec<DiceSnapshot>,
    #[serde(default)]
    pub dice_seed: Option<u64>,
    pub equipment: BTreeMap<EquipmentSlot, Option<Equipment>>,
    #[serde(default)]
    pub inventory: Vec<Equipment>,
    pub hp: i32,
    pub max_hp: i32,
}

impl From<&CharacterSheet> for SheetSnapshot {
    fn from(sheet: &CharacterSheet) -> Self {
        Self {
            ability_scores: sheet.scores().clone(),
            race: sheet.race().clone(),
            role: sheet.role().to_string(),
            dice: sheet.dice().values().map(DiceSnapshot::from).collect(),
            dice_seed: sheet.dice_seed(),
            equipment: sheet.equipment().clone(),
            inventory: sheet.inventory().to_vec(),
            hp: sheet.hp(),
            max_hp: sheet.max_hp(),
        }
    }
}

impl TryFrom<SheetSnapshot> for CharacterSheet {
    type Error = PersistError;

    fn try_from(snapshot: SheetSnapshot) -> Result<Self, Self::Error> {
        let mut dice = BTreeMap::new();
        for entry in snapshot.dice {
            let spec = DieSpec::parse(&entry.notation)?;
            if dice.insert(spec, Dice::try_from(entry)?).is_some() {
                return Err(PersistError::Invalid(format!("duplicate dice entry for {spec}")));
            }
        }

        for (slot, item) in snapshot.equipment.iter() {
            if let Some(item) = item {
                if item.is_two_handed() && *slot != EquipmentSlot::MAIN_HAND {
                    return Err(PersistError::Invalid(format!(
                        "two-handed {} equipped in {slot}",
                        item.name()
                    )));
                }
            }
        }
        let two_hander = snapshot
            .equipment
            .get(&EquipmentSlot::MAIN_HAND)
            .and_then(Option::as_ref)
            .is_some_and(Equipment::is_two_handed);
        let off_hand = snapshot
            .equipment
            .get(&EquipmentSlot::OFF_HAND)
            .and_then(Option::as_ref);
        if let (true, Some(item)) = (two_hander, off_hand) {
            return Err(PersistError::Invalid(format!(
                "{} held alongside a two-handed weapon",
                item.name()
            )));
        }

        Ok(CharacterSheet::from_parts(
            snapshot.ability_scores,
            snapshot.race,
            snapshot.role,
            snapshot.equipment,
            snapshot.inventory,
            dice,
            snapshot.dice_seed,
            snapshot.hp,
            snapshot.max_hp,
        ))
    }
}

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub name: String,
    pub position: Position,
    pub sheet: SheetSnapshot,
    #[serde(default)]
    pub actions: ActionEconomy,
}

impl From<&CreatureToken> for TokenSnapshot {
    fn from(token: &CreatureToken) -> Self {
        Self {
            name: token.name().to_string(),
            position: token.position(),
            sheet: SheetSnapshot::from(token.sheet()),
            actions: *token.actions(),
        }
    }
}

impl TryFrom<TokenSnapshot> for CreatureToken {
    type Error = PersistError;

    fn try_from(snapshot: TokenSnapshot) -> Result<Self, Self::Error> {
        let sheet = CharacterSheet::try_from(snapshot.sheet)?;
        Ok(CreatureToken::new(snapshot.name, snapshot.position, sheet).with_actions(snapshot.actions))
    }
}

// ============================================================================
// Turn Tracker
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub tokens: BTreeMap<TokenKey, TokenSnapshot>,
    pub initiative_order: BTreeMap<Initiative, TokenKey>,
    pub die: DiceSnapshot,
    pub key_digits: usize,
    pub reset_actions: bool,
    #[serde(default)]
    pub round: u32,
}

impl From<&TurnTracker> for TrackerSnapshot {
    fn from(tracker: &TurnTracker) -> Self {
        Self {
            tokens: tracker
                .tokens()
                .map(|(key, token)| (key.clone(), TokenSnapshot::from(token)))
                .collect(),
            initiative_order: tracker
                .order()
                .into_iter()
                .map(|(initiative, key)| (initiative, key.clone()))
                .collect(),
            die: DiceSnapshot::from(tracker.die()),
            key_digits: tracker.key_digits(),
            reset_actions: tracker.resets_actions(),
            round: tracker.round(),
        }
    }
}

impl TryFrom<TrackerSnapshot> for TurnTracker {
    type Error = PersistError;

    fn try_from(snapshot: TrackerSnapshot) -> Result<Self, Self::Error> {
        let mut ordered = BTreeSet::new();
        for key in snapshot.initiative_order.values() {
            if !snapshot.tokens.contains_key(key) {
                return Err(PersistError::Invalid(format!("initiative entry for unknown token {key}")));
            }
            if !ordered.insert(key) {
                return Err(PersistError::Invalid(format!("token {key} has two initiative entries")));
            }
        }
        if let Some(key) = snapshot.tokens.keys().find(|k| !ordered.contains(k)) {
            return Err(PersistError::Invalid(format!("token {key} has no initiative entry")));
        }

        let mut names = BTreeSet::new();
        for token in snapshot.tokens.values() {
            if !names.insert(token.name.as_str()) {
                return Err(PersistError::Invalid(format!("duplicate token name {}", token.name)));
            }
        }

        let die = Dice::try_from(snapshot.die)?;
        let mut tokens = BTreeMap::new();
        for (key, token) in snapshot.tokens {
            tokens.insert(key, CreatureToken::try_from(token)?);
        }

        Ok(TurnTracker::from_parts(
            tokens,
            snapshot.initiative_order,
            die,
            snapshot.key_digits,
            snapshot.reset_actions,
            snapshot.round,
        ))
    }
}

// ============================================================================
// Rooms
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub tile_set: TileSet,
    pub rows: Vec<String>,
    #[serde(default)]
    pub occupants: Vec<Occupant>,
}

impl From<&Room> for RoomSnapshot {
    fn from(room: &Room) -> Self {
        let occupants = room
            .tiles()
            .flat_map(|(position, tile)| {
                tile.occupants().iter().map(move |name| Occupant {
                    name: name.clone(),
                    position: *position,
                })
            })
            .collect();
        Self {
            tile_set: room.tile_set().clone(),
            rows: room.rows(),
            occupants,
        }
    }
}

impl TryFrom<RoomSnapshot> for Room {
    type Error = PersistError;

    fn try_from(snapshot: RoomSnapshot) -> Result<Self, Self::Error> {
        let mut room = Room::from_rows(&snapshot.tile_set, &snapshot.rows)?;
        for occupant in &snapshot.occupants {
            room.place(&occupant.name, occupant.position)?;
        }
        Ok(room)
    }
}

// ============================================================================
// Encounters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterSnapshot {
    pub config: EncounterConfig,
    pub rooms: Vec<RoomSnapshot>,
    pub current_room: usize,
    pub tracker: TrackerSnapshot,
}

impl From<&Encounter> for EncounterSnapshot {
    fn from(encounter: &Encounter) -> Self {
        Self {
            config: encounter.config().clone(),
            rooms: encounter.rooms().iter().map(RoomSnapshot::from).collect(),
            current_room: encounter.current_room_index(),
            tracker: TrackerSnapshot::from(encounter.tracker()),
        }
    }
}

impl TryFrom<EncounterSnapshot> for Encounter {
    type Error = PersistError;

    fn try_from(snapshot: EncounterSnapshot) -> Result<Self, Self::Error> {
        if snapshot.current_room >= snapshot.rooms.len() {
            return Err(PersistError::Invalid(format!(
                "current room {} of {} rooms",
                snapshot.current_room,
                snapshot.rooms.len()
            )));
        }
        let rooms = snapshot
            .rooms
            .into_iter()
            .map(Room::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let tracker = TurnTracker::try_from(snapshot.tracker)?;
        Ok(Encounter::from_parts(
            snapshot.config,
            rooms,
            snapshot.current_room,
            tracker,
        ))
    }
}

// ============================================================================
// Save Envelope
// ============================================================================

/// Metadata about a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMetadata {
    /// Encounter name.
    pub encounter_name: String,

    /// Rounds played so far.
    pub round: u32,

    /// Number of tracked tokens.
    pub token_count: usize,

    /// When the save was created.
    #[serde(default)]
    pub saved_at: String,
}

/// A saved encounter with everything needed to resume play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedEncounter {
    /// Save format version for compatibility checking.
    pub version: u32,

    pub metadata: SaveMetadata,

    pub snapshot: EncounterSnapshot,
}

impl SavedEncounter {
    pub fn new(encounter: &Encounter) -> Self {
        let metadata = SaveMetadata {
            encounter_name: encounter.config().name.clone(),
            round: encounter.tracker().round(),
            token_count: encounter.tracker().len(),
            saved_at: timestamp_now(),
        };
        Self {
            version: SAVE_VERSION,
            metadata,
            snapshot: EncounterSnapshot::from(encounter),
        }
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        let saved: Self = serde_json::from_str(json)?;
        check_version(saved.version)?;
        Ok(saved)
    }

    /// Read just the metadata of a save.
    pub fn peek_metadata(json: &str) -> Result<SaveMetadata, PersistError> {
        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SaveMetadata,
        }

        let partial: Partial = serde_json::from_str(json)?;
        check_version(partial.version)?;
        Ok(partial.metadata)
    }

    /// Rebuild the encounter.
    pub fn restore(self) -> Result<Encounter, PersistError> {
        Encounter::try_from(self.snapshot)
    }
}

fn check_version(found: u32) -> Result<(), PersistError> {
    if found != SAVE_VERSION {
        tracing::warn!("Save version {found} does not match {SAVE_VERSION}");
        return Err(PersistError::VersionMismatch {
            expected: SAVE_VERSION,
            found,
        });
    }
    Ok(())
}

/// Seconds since the Unix epoch.
fn timestamp_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::{Armor, DamageType, Weapon};
    use crate::stats::{Ability, AbilityBonuses};
    use crate::testing::{sample_fighter, sample_room, sample_token};

    fn geared_sheet() -> CharacterSheet {
        let race = Race::new("Dwarf")
            .with_ability_mod(AbilityBonuses::default().with(Ability::Constitution, 2))
            .with_natural_armor(1);
        let mut sheet = CharacterSheet::seeded(AbilityScores::uniform(12), race, "fighter", 77);
        sheet.equip(Armor::new("Iron Helm", EquipmentSlot::Head, 2).into(), false);
        sheet.equip(Armor::new("Fancy Hat", EquipmentSlot::Head, 0).into(), false);
        sheet.equip(
            Weapon::parse("Iron Sword", EquipmentSlot::HandR, "1d8+1", DamageType::Slashing)
                .unwrap()
                .into(),
            false,
        );
        sheet.take_damage(3, DamageType::Fire);
        sheet
    }

    #[test]
    fn test_dice_snapshot_continues_stream() {
        let mut original = Dice::seeded("2d6", 5);
        for _ in 0..7 {
            original.roll(0).unwrap();
        }
        let mut restored = Dice::try_from(DiceSnapshot::from(&original)).unwrap();
        for _ in 0..10 {
            assert_eq!(original.roll(0).unwrap(), restored.roll(0).unwrap());
        }
    }

    #[test]
    fn test_dice_snapshot_rejects_bad_notation() {
        let snapshot = DiceSnapshot {
            notation: "1d-12".to_string(),
            seed: 0,
            stream_position: 0,
        };
        assert!(matches!(Dice::try_from(snapshot), Err(PersistError::Dice(_))));
    }

    #[test]
    fn test_sheet_round_trip() {
        let mut original = geared_sheet();
        let json = serde_json::to_string(&SheetSnapshot::from(&original)).unwrap();
        let snapshot: SheetSnapshot = serde_json::from_str(&json).unwrap();
        let mut restored = CharacterSheet::try_from(snapshot).unwrap();

        // Race bonuses are not applied a second time
        assert_eq!(restored.scores(), original.scores());
        assert_eq!(restored.max_hp(), original.max_hp());
        assert_eq!(restored.hp(), original.hp());
        assert_eq!(restored.armor_class(), original.armor_class());
        assert_eq!(restored.inventory(), original.inventory());
        assert_eq!(restored.equipment(), original.equipment());

        for _ in 0..10 {
            assert_eq!(
                restored.attack(12, Some(EquipmentSlot::HandR)).unwrap(),
                original.attack(12, Some(EquipmentSlot::HandR)).unwrap()
            );
            assert_eq!(
                restored.roll_damage(Some(EquipmentSlot::HandR)).unwrap(),
                original.roll_damage(Some(EquipmentSlot::HandR)).unwrap()
            );
        }
    }

    #[test]
    fn test_sheet_snapshot_shape() {
        let value = serde_json::to_value(SheetSnapshot::from(&geared_sheet())).unwrap();
        assert_eq!(value["ability_scores"]["constitution"], 14);
        assert_eq!(value["equipment"]["head"]["name"], "Fancy Hat");
        assert_eq!(value["equipment"]["head"]["kind"], "armor");
        assert!(value["equipment"]["feet"].is_null());
        assert_eq!(value["inventory"][0]["name"], "Iron Helm");
    }

    #[test]
    fn test_sheet_rejects_two_hander_with_off_hand() {
        let mut snapshot = SheetSnapshot::from(&sample_fighter(1));
        let zweihander: Equipment =
            Weapon::parse("Zweihander", EquipmentSlot::HandR, "2d6", DamageType::Slashing)
                .unwrap()
                .two_handed()
                .into();
        let dagger: Equipment =
            Weapon::parse("Dagger", EquipmentSlot::HandR, "1d4", DamageType::Piercing)
                .unwrap()
                .into();
        snapshot.equipment.insert(EquipmentSlot::HandR, Some(zweihander));
        snapshot.equipment.insert(EquipmentSlot::HandL, Some(dagger));
        assert!(matches!(
            CharacterSheet::try_from(snapshot),
            Err(PersistError::Invalid(_))
        ));
    }

    #[test]
    fn test_sheet_round_trip_after_hand_swaps() {
        let zweihander: Equipment =
            Weapon::parse("Zweihander", EquipmentSlot::HandR, "2d6", DamageType::Slashing)
                .unwrap()
                .two_handed()
                .into();
        let dagger: Equipment =
            Weapon::parse("Dagger", EquipmentSlot::HandR, "1d4", DamageType::Piercing)
                .unwrap()
                .into();

        let mut sheet = sample_fighter(6);
        sheet.equip(zweihander.clone(), false);
        sheet.unequip(EquipmentSlot::OFF_HAND, Some(dagger.clone()));
        let restored = CharacterSheet::try_from(SheetSnapshot::from(&sheet)).unwrap();
        assert_eq!(restored.equipment(), sheet.equipment());

        sheet.unequip(EquipmentSlot::MAIN_HAND, Some(zweihander));
        let restored = CharacterSheet::try_from(SheetSnapshot::from(&sheet)).unwrap();
        assert!(restored.equipped(EquipmentSlot::OFF_HAND).is_none());
        assert_eq!(restored.inventory(), [dagger]);
    }

    #[test]
    fn test_tracker_round_trip() {
        let mut original = TurnTracker::new(31);
        for (i, name) in ["ana", "bo", "cy"].into_iter().enumerate() {
            original
                .add_token(sample_token(name, Position::new(i as i32, 0), i as u64))
                .unwrap();
        }

        let json = serde_json::to_string(&TrackerSnapshot::from(&original)).unwrap();
        let mut restored = TurnTracker::try_from(serde_json::from_str::<TrackerSnapshot>(&json).unwrap()).unwrap();

        assert_eq!(restored.order(), original.order());
        assert_eq!(restored.seed(), original.seed());

        // Both continue with the same next key
        let a = original.add_token(sample_token("dee", Position::ORIGIN, 9)).unwrap();
        let b = restored.add_token(sample_token("dee", Position::ORIGIN, 9)).unwrap();
        assert_eq!(a, b);
        assert_eq!(restored.initiative(&b), original.initiative(&a));
    }

    #[test]
    fn test_tracker_rejects_unpaired_order() {
        let mut tracker = TurnTracker::new(31);
        tracker.add_token(sample_token("ana", Position::ORIGIN, 1)).unwrap();
        let mut snapshot = TrackerSnapshot::from(&tracker);
        snapshot.initiative_order.clear();
        assert!(matches!(
            TurnTracker::try_from(snapshot),
            Err(PersistError::Invalid(_))
        ));
    }

    #[test]
    fn test_room_round_trip() {
        let mut room = sample_room().unwrap();
        room.place("hero", Position::new(3, 1)).unwrap();
        let restored = Room::try_from(RoomSnapshot::from(&room)).unwrap();
        assert_eq!(restored.render(), room.render());
        assert_eq!(restored.occupants(Position::new(3, 1)), ["hero".to_string()]);
    }

    #[test]
    fn test_room_rejects_unknown_icon() {
        let mut snapshot = RoomSnapshot::from(&sample_room().unwrap());
        snapshot.rows[2] = "WF?FRFW".to_string();
        assert!(matches!(
            Room::try_from(snapshot),
            Err(PersistError::Grid(GridError::UnknownIcon { icon: '?', .. }))
        ));
    }

    #[test]
    fn test_version_mismatch() {
        let encounter = Encounter::new(
            EncounterConfig::new("Crypt").with_seed(4),
            vec![sample_room().unwrap()],
        )
        .unwrap();
        let mut saved = SavedEncounter::new(&encounter);
        saved.version = SAVE_VERSION + 1;
        let json = saved.to_json().unwrap();

        assert!(matches!(
            SavedEncounter::from_json(&json),
            Err(PersistError::VersionMismatch { expected: 1, found: 2 })
        ));
        assert!(matches!(
            SavedEncounter::peek_metadata(&json),
            Err(PersistError::VersionMismatch { .. })
        ));
    }
}
