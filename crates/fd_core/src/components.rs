//! Core value types shared by every subsystem.
//!
//! Components are plain data. Cross-references between entities, patches and
//! wall networks are integer identifiers resolved through lookup, never
//! pointers.

use serde::{Deserialize, Serialize};

use crate::structures::StructureType;

/// Unique identifier for entities. Monotonic for the lifetime of a run.
pub type EntityId = u64;

/// Unique identifier for ore patches.
pub type PatchId = u64;

/// Identifier of a wall network (the lowest member wall id).
pub type NetworkId = u64;

/// Item identifier as used in content (`"plate_iron"`, `"ammo_light"`).
pub type ItemId = String;

/// Well-known item identifiers referenced by simulation rules.
pub mod items {
    /// Raw iron ore.
    pub const ORE_IRON: &str = "ore_iron";
    /// Raw copper ore.
    pub const ORE_COPPER: &str = "ore_copper";
    /// Coal.
    pub const ORE_COAL: &str = "ore_coal";
    /// Iron plate.
    pub const PLATE_IRON: &str = "plate_iron";
    /// Copper plate.
    pub const PLATE_COPPER: &str = "plate_copper";
    /// Steel plate.
    pub const PLATE_STEEL: &str = "plate_steel";
    /// Gear.
    pub const GEAR: &str = "gear";
    /// Circuit board.
    pub const CIRCUIT: &str = "circuit";
    /// Power cell.
    pub const POWER_CELL: &str = "power_cell";
    /// Wall construction kit.
    pub const WALL_KIT: &str = "wall_kit";
    /// Turret core.
    pub const TURRET_CORE: &str = "turret_core";
    /// Light ammunition.
    pub const AMMO_LIGHT: &str = "ammo_light";
    /// Heavy ammunition.
    pub const AMMO_HEAVY: &str = "ammo_heavy";
    /// Plasma ammunition.
    pub const AMMO_PLASMA: &str = "ammo_plasma";

    /// Prefix shared by every ammunition item.
    pub const AMMO_PREFIX: &str = "ammo_";
    /// Prefix shared by every raw ore item.
    pub const ORE_PREFIX: &str = "ore_";
    /// Prefix shared by every plate item.
    pub const PLATE_PREFIX: &str = "plate_";

    /// Whether the item is ammunition.
    #[must_use]
    pub fn is_ammo(item_id: &str) -> bool {
        item_id.starts_with(AMMO_PREFIX)
    }
}

// ============================================================================
// Grid geometry
// ============================================================================

/// Cardinal direction on the board. North is towards smaller `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// `y - 1`.
    North,
    /// `x + 1`.
    #[default]
    East,
    /// `y + 1`.
    South,
    /// `x - 1`.
    West,
}

impl Direction {
    /// All directions in clockwise order starting north.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Unit offset `(dx, dy)`.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    /// Next direction clockwise.
    #[must_use]
    pub const fn rotated_clockwise(self) -> Self {
        match self {
            Self::North => Self::East,
            Self::East => Self::South,
            Self::South => Self::West,
            Self::West => Self::North,
        }
    }

    /// Next direction counter-clockwise.
    #[must_use]
    pub const fn rotated_counter_clockwise(self) -> Self {
        match self {
            Self::North => Self::West,
            Self::West => Self::South,
            Self::South => Self::East,
            Self::East => Self::North,
        }
    }

    /// Opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    /// Lowercase name used in command sort tokens.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        }
    }
}

/// Integer grid cell with elevation.
///
/// Ordering is `x`, then `y`, then `z`, which keeps cell sets in stable order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct GridPosition {
    /// Column.
    pub x: i32,
    /// Row (north is smaller).
    pub y: i32,
    /// Elevation level.
    pub z: i32,
}

impl GridPosition {
    /// Create a position at ground level.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y, z: 0 }
    }

    /// Create a position with explicit elevation.
    #[must_use]
    pub const fn with_z(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Shift by `(dx, dy)`, keeping elevation.
    #[must_use]
    pub const fn translated(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z,
        }
    }

    /// Adjacent cell in `direction`, keeping elevation.
    #[must_use]
    pub const fn neighbor(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        self.translated(dx, dy)
    }

    /// Same `(x, y)` at ground level.
    #[must_use]
    pub const fn flattened(self) -> Self {
        Self::new(self.x, self.y)
    }

    /// Whether two positions share `(x, y)`, ignoring elevation.
    #[must_use]
    pub const fn same_cell(self, other: Self) -> bool {
        self.x == other.x && self.y == other.y
    }

    /// Manhattan distance in the `(x, y)` plane.
    #[must_use]
    pub const fn manhattan_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Chebyshev distance in the `(x, y)` plane.
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Direction from `self` to an orthogonally adjacent `other`, if any.
    #[must_use]
    pub fn direction_to(self, other: Self) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|&d| self.neighbor(d).same_cell(other))
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Broad entity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityCategory {
    /// Placed building of any [`StructureType`].
    Structure,
    /// Hostile unit.
    Enemy,
    /// Projectile in flight.
    Projectile,
}

/// A game object stored in the [`crate::entity_store::EntityStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Unique id.
    pub id: EntityId,
    /// Entity class.
    pub category: EntityCategory,
    /// Structure kind, set only for structures.
    pub structure_type: Option<StructureType>,
    /// Anchor cell. For structures this is the bottom-right footprint cell.
    pub position: GridPosition,
    /// Facing; drives conveyor flow and output ports.
    pub rotation: Direction,
    /// Current health.
    pub health: u32,
    /// Maximum health.
    pub max_health: u32,
    /// Wall that carries this turret mount.
    pub host_wall_id: Option<EntityId>,
    /// Ore patch this miner extracts from.
    pub bound_patch_id: Option<PatchId>,
    /// Turret definition used by this turret mount.
    pub turret_def_id: Option<String>,
}

impl Entity {
    /// Whether this entity is a structure of the given type.
    #[must_use]
    pub fn is_structure(&self, structure_type: StructureType) -> bool {
        self.structure_type == Some(structure_type)
    }

    /// Every cell covered by this entity. Non-structures cover one cell.
    #[must_use]
    pub fn covered_cells(&self) -> Vec<GridPosition> {
        match self.structure_type {
            Some(structure_type) => structure_type.covered_cells(self.position),
            None => vec![self.position],
        }
    }

    /// Whether the entity covers `(x, y)`, ignoring elevation.
    #[must_use]
    pub fn covers(&self, cell: GridPosition) -> bool {
        match self.structure_type {
            Some(structure_type) => {
                let (width, height) = structure_type.footprint();
                let min_x = self.position.x - (width as i32 - 1);
                let min_y = self.position.y - (height as i32 - 1);
                (min_x..=self.position.x).contains(&cell.x)
                    && (min_y..=self.position.y).contains(&cell.y)
            }
            None => self.position.same_cell(cell),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_rotation_cycle() {
        let mut direction = Direction::North;
        for _ in 0..4 {
            direction = direction.rotated_clockwise();
        }
        assert_eq!(direction, Direction::North);
        assert_eq!(Direction::East.rotated_counter_clockwise(), Direction::North);
        assert_eq!(Direction::West.opposite(), Direction::East);
    }

    #[test]
    fn test_grid_distances_ignore_elevation() {
        let a = GridPosition::with_z(2, 3, 0);
        let b = GridPosition::with_z(5, 1, 4);
        assert_eq!(a.manhattan_distance(b), 5);
        assert_eq!(a.chebyshev_distance(b), 3);
        assert!(a.translated(3, -2).same_cell(b));
    }

    #[test]
    fn test_direction_to_neighbor() {
        let origin = GridPosition::new(4, 4);
        assert_eq!(origin.direction_to(GridPosition::new(4, 3)), Some(Direction::North));
        assert_eq!(origin.direction_to(GridPosition::new(5, 4)), Some(Direction::East));
        assert_eq!(origin.direction_to(GridPosition::new(5, 5)), None);
    }

    #[test]
    fn test_ammo_prefix() {
        assert!(items::is_ammo(items::AMMO_PLASMA));
        assert!(!items::is_ammo(items::PLATE_IRON));
    }
}
