//! Structure kinds and their static rule tables.
//!
//! Footprints, build costs, power draw, buffer sizes and recipe support are
//! fixed per type. Data-driven balance (recipes, turrets, enemies) lives in
//! [`crate::data`].

use serde::{Deserialize, Serialize};

use crate::components::{items, GridPosition};

/// Every placeable (and the bootstrap-only HQ) structure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StructureType {
    /// Headquarters. Spawned at bootstrap, never buildable or removable.
    Hq,
    /// Defensive wall segment; hosts turret mounts and forms wall networks.
    Wall,
    /// Turret mounted on a wall cell.
    TurretMount,
    /// Extracts ore from an adjacent patch.
    Miner,
    /// Ore to plate processor.
    Smelter,
    /// Component processor.
    Assembler,
    /// Ammunition processor.
    AmmoModule,
    /// Power supply.
    PowerPlant,
    /// Single-slot item transport.
    Conveyor,
    /// Transport that alternates between two output sides.
    Splitter,
    /// Transport that pulls from two input sides.
    Merger,
    /// Shared item pool.
    Storage,
    /// Runs ore surveys.
    ResearchCenter,
}

/// Power supplied by a power plant.
pub const POWER_PLANT_OUTPUT: u32 = 12;

/// Total item capacity of one storage pool.
pub const STORAGE_POOL_CAPACITY: u32 = 24;

impl StructureType {
    /// Every structure type, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Hq,
        Self::Wall,
        Self::TurretMount,
        Self::Miner,
        Self::Smelter,
        Self::Assembler,
        Self::AmmoModule,
        Self::PowerPlant,
        Self::Conveyor,
        Self::Splitter,
        Self::Merger,
        Self::Storage,
        Self::ResearchCenter,
    ];

    /// Snake-case name used in tokens and logs.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Hq => "hq",
            Self::Wall => "wall",
            Self::TurretMount => "turret_mount",
            Self::Miner => "miner",
            Self::Smelter => "smelter",
            Self::Assembler => "assembler",
            Self::AmmoModule => "ammo_module",
            Self::PowerPlant => "power_plant",
            Self::Conveyor => "conveyor",
            Self::Splitter => "splitter",
            Self::Merger => "merger",
            Self::Storage => "storage",
            Self::ResearchCenter => "research_center",
        }
    }

    /// Footprint `(width, height)` in cells.
    #[must_use]
    pub const fn footprint(self) -> (u32, u32) {
        match self {
            Self::Hq | Self::PowerPlant | Self::Storage | Self::ResearchCenter => (2, 2),
            _ => (1, 1),
        }
    }

    /// Cells covered when anchored at `anchor` (the bottom-right cell).
    #[must_use]
    pub fn covered_cells(self, anchor: GridPosition) -> Vec<GridPosition> {
        let (width, height) = self.footprint();
        let mut cells = Vec::with_capacity((width * height) as usize);
        for dy in 0..height as i32 {
            for dx in 0..width as i32 {
                cells.push(GridPosition::with_z(
                    anchor.x - dx,
                    anchor.y - dy,
                    anchor.z,
                ));
            }
        }
        cells.sort();
        cells
    }

    /// Items consumed when the structure is built.
    #[must_use]
    pub const fn build_cost(self) -> &'static [(&'static str, u32)] {
        match self {
            Self::Hq => &[],
            Self::Miner => &[(items::PLATE_IRON, 6), (items::GEAR, 3)],
            Self::Conveyor => &[(items::PLATE_IRON, 1)],
            Self::Splitter | Self::Merger => &[(items::PLATE_IRON, 2), (items::GEAR, 1)],
            Self::Wall => &[(items::WALL_KIT, 1)],
            Self::TurretMount => &[(items::TURRET_CORE, 1), (items::PLATE_STEEL, 2)],
            Self::Storage => &[(items::PLATE_STEEL, 3), (items::GEAR, 2)],
            Self::Smelter => &[(items::PLATE_STEEL, 4)],
            Self::Assembler => &[(items::PLATE_IRON, 4), (items::CIRCUIT, 2)],
            Self::AmmoModule => &[(items::CIRCUIT, 2), (items::PLATE_STEEL, 2)],
            Self::PowerPlant => &[(items::CIRCUIT, 2), (items::PLATE_COPPER, 4)],
            Self::ResearchCenter => &[
                (items::PLATE_STEEL, 4),
                (items::CIRCUIT, 2),
                (items::GEAR, 2),
            ],
        }
    }

    /// Whether players may place this type.
    #[must_use]
    pub const fn is_buildable(self) -> bool {
        !matches!(self, Self::Hq)
    }

    /// Power drawn per tick. Power plants draw nothing and supply
    /// [`POWER_PLANT_OUTPUT`].
    #[must_use]
    pub const fn power_demand(self) -> u32 {
        match self {
            Self::Miner => 2,
            Self::Smelter | Self::Assembler => 3,
            Self::AmmoModule => 4,
            Self::ResearchCenter => 2,
            Self::Conveyor | Self::Splitter | Self::Merger | Self::Storage => 1,
            Self::Hq | Self::Wall | Self::TurretMount | Self::PowerPlant => 0,
        }
    }

    /// Whether enemies and connectivity checks treat the footprint as solid.
    #[must_use]
    pub const fn blocks_movement(self) -> bool {
        !matches!(
            self,
            Self::Conveyor | Self::Splitter | Self::Merger | Self::TurretMount
        )
    }

    /// Single-slot transports.
    #[must_use]
    pub const fn is_transport(self) -> bool {
        matches!(self, Self::Conveyor | Self::Splitter | Self::Merger)
    }

    /// Default maximum health. The HQ value comes from content.
    #[must_use]
    pub const fn max_health(self) -> u32 {
        match self {
            Self::Wall => 200,
            _ => 100,
        }
    }

    /// Recipes this type may run.
    #[must_use]
    pub const fn supported_recipes(self) -> &'static [&'static str] {
        match self {
            Self::Smelter => &["smelt_iron", "smelt_copper", "smelt_steel"],
            Self::Assembler => &[
                "forge_gear",
                "etch_circuit",
                "assemble_power_cell",
                "craft_wall_kit",
                "craft_turret_core",
                "craft_repair_kit",
            ],
            Self::AmmoModule => &["craft_ammo_light", "craft_ammo_heavy", "craft_ammo_plasma"],
            _ => &[],
        }
    }

    /// Recipe pinned on placement.
    #[must_use]
    pub const fn default_recipe(self) -> Option<&'static str> {
        match self {
            Self::Smelter => Some("smelt_iron"),
            Self::Assembler => Some("forge_gear"),
            Self::AmmoModule => Some("craft_ammo_light"),
            _ => None,
        }
    }

    /// Whether `recipe_id` is in [`Self::supported_recipes`].
    #[must_use]
    pub fn supports_recipe(self, recipe_id: &str) -> bool {
        self.supported_recipes().contains(&recipe_id)
    }

    /// Capacity of the typed input buffer (0 = no input buffer).
    #[must_use]
    pub const fn input_capacity(self) -> u32 {
        match self {
            Self::Smelter | Self::Assembler | Self::AmmoModule => 12,
            Self::TurretMount => 6,
            Self::ResearchCenter => 48,
            _ => 0,
        }
    }

    /// Capacity of the typed output buffer (0 = no output buffer).
    #[must_use]
    pub const fn output_capacity(self) -> u32 {
        match self {
            Self::Miner | Self::AmmoModule => 8,
            Self::Smelter | Self::Assembler => 4,
            _ => 0,
        }
    }

    /// Whether the typed input buffer (or storage pool) accepts `item_id`.
    #[must_use]
    pub fn accepts_input(self, item_id: &str) -> bool {
        match self {
            Self::Smelter => item_id.starts_with(items::ORE_PREFIX) || item_id == items::PLATE_IRON,
            Self::Assembler => {
                item_id.starts_with(items::PLATE_PREFIX)
                    || matches!(item_id, items::ORE_COAL | items::GEAR | items::CIRCUIT)
            }
            Self::AmmoModule => matches!(
                item_id,
                items::PLATE_IRON
                    | items::PLATE_STEEL
                    | items::AMMO_LIGHT
                    | items::POWER_CELL
                    | items::CIRCUIT
            ),
            Self::TurretMount => items::is_ammo(item_id),
            Self::ResearchCenter => {
                item_id.starts_with(items::PLATE_PREFIX)
                    || matches!(item_id, items::GEAR | items::CIRCUIT)
            }
            Self::Storage => true,
            _ => false,
        }
    }

    /// Port table: whether an item arriving from `side` (the direction from
    /// this structure towards the sender) is accepted. Transports are handled
    /// by the logistics router and never appear here.
    #[must_use]
    pub const fn accepts_from(self, _side: crate::components::Direction) -> bool {
        match self {
            Self::Storage
            | Self::Smelter
            | Self::Assembler
            | Self::AmmoModule
            | Self::TurretMount
            | Self::ResearchCenter => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footprint_anchors_bottom_right() {
        let cells = StructureType::PowerPlant.covered_cells(GridPosition::new(39, 30));
        assert_eq!(
            cells,
            vec![
                GridPosition::new(38, 29),
                GridPosition::new(38, 30),
                GridPosition::new(39, 29),
                GridPosition::new(39, 30),
            ]
        );
        assert_eq!(StructureType::Wall.covered_cells(GridPosition::new(3, 3)).len(), 1);
    }

    #[test]
    fn test_default_recipe_is_supported() {
        for structure in StructureType::ALL {
            if let Some(recipe) = structure.default_recipe() {
                assert!(structure.supports_recipe(recipe), "{structure:?}");
            }
        }
    }

    #[test]
    fn test_movement_blocking_table() {
        assert!(StructureType::Wall.blocks_movement());
        assert!(StructureType::Hq.blocks_movement());
        assert!(!StructureType::Conveyor.blocks_movement());
        assert!(!StructureType::TurretMount.blocks_movement());
    }

    #[test]
    fn test_accepts_input_table() {
        assert!(StructureType::Smelter.accepts_input(items::ORE_COPPER));
        assert!(!StructureType::Smelter.accepts_input(items::GEAR));
        assert!(StructureType::TurretMount.accepts_input(items::AMMO_HEAVY));
        assert!(!StructureType::TurretMount.accepts_input(items::PLATE_IRON));
        assert!(StructureType::Storage.accepts_input("anything"));
        assert!(!StructureType::Wall.accepts_input(items::AMMO_LIGHT));
    }

    #[test]
    fn test_hq_is_not_buildable() {
        assert!(!StructureType::Hq.is_buildable());
        assert!(StructureType::Hq.build_cost().is_empty());
        assert!(StructureType::ALL
            .iter()
            .filter(|s| s.is_buildable())
            .all(|s| !s.build_cost().is_empty()));
    }
}
