//! Rooms: bounded tile lattices with movement costs and occupancy.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::fmt;
use thiserror::Error;

/// Movement cost reported by every impassable tile.
pub const IMPASSABLE_COST: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("Unknown tile icon '{icon}' at {position}")]
    UnknownIcon { icon: char, position: Position },
    #[error("Position {0} is outside the room")]
    OutOfBounds(Position),
    #[error("No tile at {0}")]
    NoTile(Position),
    #[error("'{name}' is not on the tile at {position}")]
    NotPresent { name: String, position: Position },
}

// ============================================================================
// Coordinates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Orthogonal neighbors in the order east, south, west, north.
    pub fn neighbors(&self) -> [Position; 4] {
        [
            Position::new(self.x + 1, self.y),
            Position::new(self.x, self.y + 1),
            Position::new(self.x - 1, self.y),
            Position::new(self.x, self.y - 1),
        ]
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Position::new(x, y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSize {
    pub width: u32,
    pub height: u32,
}

impl RoomSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, position: Position) -> bool {
        position.x >= 0
            && position.y >= 0
            && (position.x as u32) < self.width
            && (position.y as u32) < self.height
    }
}

/// Every coordinate within `radius` of `center` (Euclidean).
pub fn tiles_in_circle(radius: u32, center: Position) -> BTreeSet<Position> {
    let r = radius as i32;
    let mut points = BTreeSet::new();
    for dx in -r..=r {
        for dy in -r..=r {
            if dx * dx + dy * dy <= r * r {
                points.insert(center.offset(dx, dy));
            }
        }
    }
    points
}

/// The square of side `2 * radius - 1` centered on `center`.
pub fn tiles_in_square(radius: u32, center: Position) -> BTreeSet<Position> {
    let r = radius as i32;
    let mut points = BTreeSet::new();
    for dx in (1 - r)..r {
        for dy in (1 - r)..r {
            points.insert(center.offset(dx, dy));
        }
    }
    points
}

// ============================================================================
// Tile Sets
// ============================================================================

fn default_movement_cost() -> u32 {
    1
}

fn default_passable() -> bool {
    true
}

/// Terrain properties shared by every tile with the same icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileKind {
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_movement_cost")]
    pub movement_cost: u32,
    #[serde(default = "default_passable")]
    pub passable: bool,
}

impl TileKind {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            movement_cost: 1,
            passable: true,
        }
    }

    pub fn with_cost(mut self, movement_cost: u32) -> Self {
        self.movement_cost = movement_cost;
        self
    }

    pub fn impassable(mut self) -> Self {
        self.passable = false;
        self
    }
}

/// Icon to terrain mapping, with the icons used for absent and blank tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSet {
    pub void: char,
    pub floor: char,
    pub kinds: BTreeMap<char, TileKind>,
}

impl TileSet {
    pub fn new(void: char, floor: char) -> Self {
        Self {
            void,
            floor,
            kinds: BTreeMap::new(),
        }
    }

    pub fn with_kind(mut self, icon: char, kind: TileKind) -> Self {
        self.kinds.insert(icon, kind);
        self
    }

    pub fn get(&self, icon: char) -> Option<&TileKind> {
        self.kinds.get(&icon)
    }
}

lazy_static::lazy_static! {
    /// Dungeon terrain: void, floor, wall, rubble and both staircases.
    pub static ref STANDARD_TILE_SET: TileSet = TileSet::new('E', 'F')
        .with_kind('E', TileKind::new("An empty void...").impassable())
        .with_kind('F', TileKind::new("A patch of smooth stone floor."))
        .with_kind('W', TileKind::new("A solid brick wall.").impassable())
        .with_kind('R', TileKind::new("A pile of rubble littering the floor.").with_cost(2))
        .with_kind('U', TileKind::new("A staircase leading up to the surface."))
        .with_kind('D', TileKind::new("A staircase leading down deeper into the dungeon."));
}

// ============================================================================
// Tiles
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    icon: char,
    movement_cost: u32,
    passable: bool,
    occupants: Vec<String>,
}

impl Tile {
    pub fn new(icon: char, kind: &TileKind) -> Self {
        Self {
            icon,
            movement_cost: kind.movement_cost,
            passable: kind.passable,
            occupants: Vec::new(),
        }
    }

    pub fn icon(&self) -> char {
        self.icon
    }

    pub fn passable(&self) -> bool {
        self.passable
    }

    pub fn movement_cost(&self) -> u32 {
        if self.passable {
            self.movement_cost
        } else {
            IMPASSABLE_COST
        }
    }

    pub fn occupants(&self) -> &[String] {
        &self.occupants
    }

    fn add_occupant(&mut self, name: &str) {
        if !self.occupants.iter().any(|o| o == name) {
            self.occupants.push(name.to_string());
        }
    }

    fn remove_occupant(&mut self, name: &str) -> bool {
        let before = self.occupants.len();
        self.occupants.retain(|o| o != name);
        self.occupants.len() != before
    }
}

// ============================================================================
// Rooms
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    tile_set: TileSet,
    size: RoomSize,
    tiles: BTreeMap<Position, Tile>,
}

impl Room {
    /// A room filled with the tile set's floor icon.
    pub fn blank(size: RoomSize, tile_set: &TileSet) -> Result<Self, GridError> {
        let floor = tile_set.floor;
        let kind = tile_set.get(floor).ok_or(GridError::UnknownIcon {
            icon: floor,
            position: Position::ORIGIN,
        })?;
        let mut tiles = BTreeMap::new();
        for y in 0..size.height as i32 {
            for x in 0..size.width as i32 {
                tiles.insert(Position::new(x, y), Tile::new(floor, kind));
            }
        }
        Ok(Self {
            tile_set: tile_set.clone(),
            size,
            tiles,
        })
    }

    /// Build a room from rows of icons. The width is the longest row.
    pub fn from_rows<S: AsRef<str>>(tile_set: &TileSet, rows: &[S]) -> Result<Self, GridError> {
        let mut tiles = BTreeMap::new();
        let mut width = 0;
        for (y, row) in rows.iter().enumerate() {
            let mut row_width = 0;
            for (x, icon) in row.as_ref().chars().enumerate() {
                let position = Position::new(x as i32, y as i32);
                let kind = tile_set
                    .get(icon)
                    .ok_or(GridError::UnknownIcon { icon, position })?;
                tiles.insert(position, Tile::new(icon, kind));
                row_width += 1;
            }
            width = width.max(row_width);
        }
        Ok(Self {
            tile_set: tile_set.clone(),
            size: RoomSize::new(width, rows.len() as u32),
            tiles,
        })
    }

    pub fn size(&self) -> RoomSize {
        self.size
    }

    pub fn tile_set(&self) -> &TileSet {
        &self.tile_set
    }

    pub fn tile(&self, position: Position) -> Option<&Tile> {
        self.tiles.get(&position)
    }

    pub fn tiles(&self) -> impl Iterator<Item = (&Position, &Tile)> {
        self.tiles.iter()
    }

    /// Replace the tile at `position`, keeping its occupants.
    pub fn add_tile(&mut self, position: Position, icon: char) -> Result<(), GridError> {
        if !self.size.contains(position) {
            return Err(GridError::OutOfBounds(position));
        }
        let kind = self
            .tile_set
            .get(icon)
            .ok_or(GridError::UnknownIcon { icon, position })?;
        let mut tile = Tile::new(icon, kind);
        if let Some(previous) = self.tiles.remove(&position) {
            tile.occupants = previous.occupants;
        }
        self.tiles.insert(position, tile);
        Ok(())
    }

    /// One string per row; coordinates without a tile show the void icon.
    pub fn rows(&self) -> Vec<String> {
        (0..self.size.height as i32)
            .map(|y| {
                (0..self.size.width as i32)
                    .map(|x| {
                        self.tile(Position::new(x, y))
                            .map_or(self.tile_set.void, Tile::icon)
                    })
                    .collect()
            })
            .collect()
    }

    /// Text snapshot of the room, each row newline terminated.
    pub fn render(&self) -> String {
        self.rows().into_iter().fold(String::new(), |mut out, row| {
            out.push_str(&row);
            out.push('\n');
            out
        })
    }

    // ========================================================================
    // Occupancy
    // ========================================================================

    pub fn occupants(&self, position: Position) -> &[String] {
        self.tile(position)
            .map(Tile::occupants)
            .unwrap_or_default()
    }

    pub fn place(&mut self, name: &str, position: Position) -> Result<(), GridError> {
        self.tiles
            .get_mut(&position)
            .ok_or(GridError::NoTile(position))?
            .add_occupant(name);
        Ok(())
    }

    /// Move an occupant between tiles. Nothing changes on failure.
    pub fn transfer(&mut self, name: &str, from: Position, to: Position) -> Result<(), GridError> {
        if !self.tiles.contains_key(&to) {
            return Err(GridError::NoTile(to));
        }
        let origin = self.tiles.get_mut(&from).ok_or(GridError::NoTile(from))?;
        if !origin.remove_occupant(name) {
            return Err(GridError::NotPresent {
                name: name.to_string(),
                position: from,
            });
        }
        self.place(name, to)
    }

    pub fn remove_occupant(&mut self, name: &str, position: Position) -> bool {
        self.tiles
            .get_mut(&position)
            .is_some_and(|tile| tile.remove_occupant(name))
    }

    /// Where an occupant currently stands.
    pub fn locate(&self, name: &str) -> Option<Position> {
        self.tiles
            .iter()
            .find(|(_, tile)| tile.occupants.iter().any(|o| o == name))
            .map(|(pos, _)| *pos)
    }

    // ========================================================================
    // Movement
    // ========================================================================

    /// Every tile reachable from `start` within `budget`, mapped to the
    /// budget left on arrival.
    ///
    /// Each tile keeps the best remaining budget over all paths and is
    /// expanded again whenever that improves. The start always maps to the
    /// full budget; a start with no tile yields an empty fill.
    pub fn flood_fill(&self, start: Position, budget: u32) -> BTreeMap<Position, u32> {
        let mut fill = BTreeMap::new();
        if !self.tiles.contains_key(&start) {
            return fill;
        }
        fill.insert(start, budget);

        let mut frontier = BinaryHeap::new();
        frontier.push((budget, start));
        while let Some((remaining, position)) = frontier.pop() {
            if fill.get(&position).is_some_and(|&best| best > remaining) {
                continue;
            }
            for next in position.neighbors() {
                let Some(tile) = self.tiles.get(&next) else {
                    continue;
                };
                if !tile.passable() {
                    continue;
                }
                let Some(left) = remaining.checked_sub(tile.movement_cost()) else {
                    continue;
                };
                if fill.get(&next).map_or(true, |&best| left > best) {
                    fill.insert(next, left);
                    frontier.push((left, next));
                }
            }
        }

        tracing::trace!("Flood fill from {start} with budget {budget} reached {} tiles", fill.len());
        fill
    }

    pub fn can_reach(&self, start: Position, dest: Position, budget: u32) -> bool {
        self.flood_fill(start, budget).contains_key(&dest)
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep_room() -> Room {
        let rows = [
            "WWWFWWW",
            "WFWFRFW",
            "WFWFRFW",
            "WFWFRFW",
            "WFFFFFW",
            "WFFFFFW",
            "WWWWWWW",
        ];
        Room::from_rows(&STANDARD_TILE_SET, &rows).unwrap()
    }

    #[test]
    fn test_neighbors_order() {
        let p = Position::new(3, 3);
        assert_eq!(
            p.neighbors(),
            [
                Position::new(4, 3),
                Position::new(3, 4),
                Position::new(2, 3),
                Position::new(3, 2)
            ]
        );
    }

    #[test]
    fn test_blank_room_renders_floor() {
        let room = Room::blank(RoomSize::new(5, 5), &STANDARD_TILE_SET).unwrap();
        assert_eq!(room.render(), "FFFFF\n".repeat(5));
    }

    #[test]
    fn test_add_tiles() {
        let mut room = Room::blank(RoomSize::new(5, 5), &STANDARD_TILE_SET).unwrap();
        for (x, y) in [(4, 2), (3, 2), (2, 2), (2, 3)] {
            room.add_tile(Position::new(x, y), 'W').unwrap();
        }
        assert_eq!(room.render(), "FFFFF\nFFFFF\nFFWWW\nFFWFF\nFFFFF\n");
        assert_eq!(room.tile(Position::new(2, 2)).unwrap().movement_cost(), IMPASSABLE_COST);

        assert_eq!(
            room.add_tile(Position::new(5, 0), 'W'),
            Err(GridError::OutOfBounds(Position::new(5, 0)))
        );
    }

    #[test]
    fn test_from_rows_round_trips_render() {
        let rows = ["WWFWW", "FFFFW", "WWFFF", "EWFFW", "EWFWW"];
        let room = Room::from_rows(&STANDARD_TILE_SET, &rows).unwrap();
        assert_eq!(room.size(), RoomSize::new(5, 5));
        assert_eq!(room.rows(), rows);
    }

    #[test]
    fn test_ragged_rows_pad_with_void() {
        let room = Room::from_rows(&STANDARD_TILE_SET, &["FFF", "F"]).unwrap();
        assert_eq!(room.size(), RoomSize::new(3, 2));
        assert!(room.tile(Position::new(2, 1)).is_none());
        assert_eq!(room.render(), "FFF\nFEE\n");
    }

    #[test]
    fn test_unknown_icon_rejected() {
        let err = Room::from_rows(&STANDARD_TILE_SET, &["FFF", "FQF"]).unwrap_err();
        assert_eq!(
            err,
            GridError::UnknownIcon {
                icon: 'Q',
                position: Position::new(1, 1)
            }
        );
    }

    #[test]
    fn test_flood_fill() {
        let room = keep_room();
        let start = Position::new(3, 0);
        let fill = room.flood_fill(start, 4);

        assert_eq!(fill[&start], 4);
        for (x, y) in [(3, 1), (3, 2), (3, 3), (3, 4), (4, 1), (4, 2), (5, 1)] {
            assert!(fill.contains_key(&Position::new(x, y)), "missing ({x}, {y})");
        }
        assert_eq!(fill[&Position::new(3, 4)], 0);
        assert_eq!(fill[&Position::new(4, 1)], 1);
        // Walls never enter the fill
        assert!(!fill.contains_key(&Position::new(2, 1)));
        assert!(!fill.contains_key(&Position::new(3, 5)));
    }

    #[test]
    fn test_flood_fill_keeps_best_budget() {
        // (2, 0) costs 3 over the rubble and 4 around it
        let room = Room::from_rows(&STANDARD_TILE_SET, &["FRF", "FFF"]).unwrap();
        let fill = room.flood_fill(Position::new(0, 0), 3);
        assert_eq!(fill[&Position::new(1, 0)], 1);
        assert_eq!(fill[&Position::new(2, 1)], 0);
        assert_eq!(fill[&Position::new(2, 0)], 0);

        let fill = room.flood_fill(Position::new(0, 0), 4);
        assert_eq!(fill[&Position::new(2, 0)], 1);
    }

    #[test]
    fn test_flood_fill_off_grid_is_empty() {
        let room = keep_room();
        assert!(room.flood_fill(Position::new(-1, 0), 10).is_empty());
    }

    #[test]
    fn test_can_reach() {
        let room = keep_room();
        assert!(room.can_reach(Position::new(3, 0), Position::new(3, 4), 4));
        assert!(!room.can_reach(Position::new(3, 0), Position::new(3, 5), 4));
        assert!(!room.can_reach(Position::new(3, 0), Position::new(1, 1), 4));
    }

    #[test]
    fn test_area_helpers() {
        let center = Position::new(3, 3);
        let circle = tiles_in_circle(3, center);
        assert!(circle.contains(&Position::new(6, 3)));
        assert!(!circle.contains(&Position::new(6, 6)));
        for p in &circle {
            let (dx, dy) = (p.x - center.x, p.y - center.y);
            assert!(dx * dx + dy * dy <= 9);
        }

        let square = tiles_in_square(2, center);
        assert_eq!(square.len(), 9);
        assert!(square.contains(&Position::new(4, 4)));
        assert!(!square.contains(&Position::new(5, 3)));
    }

    #[test]
    fn test_occupancy() {
        let mut room = keep_room();
        let a = Position::new(3, 0);
        let b = Position::new(3, 1);

        room.place("bob", a).unwrap();
        room.place("bob", a).unwrap();
        assert_eq!(room.occupants(a), ["bob".to_string()]);
        assert_eq!(room.locate("bob"), Some(a));

        room.transfer("bob", a, b).unwrap();
        assert!(room.occupants(a).is_empty());
        assert_eq!(room.occupants(b), ["bob".to_string()]);

        assert!(matches!(
            room.transfer("dan", a, b),
            Err(GridError::NotPresent { .. })
        ));
        assert_eq!(
            room.transfer("bob", b, Position::new(9, 9)),
            Err(GridError::NoTile(Position::new(9, 9)))
        );
        assert_eq!(room.occupants(b), ["bob".to_string()]);

        assert!(room.remove_occupant("bob", b));
        assert!(!room.remove_occupant("bob", b));
        assert_eq!(room.place("bob", Position::new(7, 7)), Err(GridError::NoTile(Position::new(7, 7))));
    }
}
