//! Read-only content consumed by the simulation.
//!
//! A [`ContentBundle`] carries every data-driven definition the core needs:
//! items, recipes, turrets, enemies, waves, research nodes, the starter board,
//! the HQ, difficulty tuning and ore configuration. The core never mutates it.
//!
//! **Note:** This module contains no IO. Callers hand over RON text (or use
//! [`ContentBundle::standard`]); reading files is the embedder's concern.

mod board_data;
mod combat_data;
mod item_data;
mod ore_data;
mod tech_data;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::Fixed;
use crate::structures::StructureType;

pub use board_data::{BoardDef, Difficulty, DifficultyDef, HqDef, PerDifficulty, RampDef};
pub use combat_data::{EnemyDef, EnemyGroup, ProceduralWaveDef, TurretDef, WaveContent, WaveDef};
pub use item_data::{ItemCategory, ItemDef, ItemStack, RecipeDef};
pub use ore_data::{OreConfigDef, OreRingDef, OreTypeDef, RenewalDef, Richness, RichnessWeights};
pub use tech_data::TechNodeDef;

/// Every data-driven definition, supplied once at bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBundle {
    /// Item catalogue.
    pub items: Vec<ItemDef>,
    /// Production recipes.
    pub recipes: Vec<RecipeDef>,
    /// Turret definitions.
    pub turrets: Vec<TurretDef>,
    /// Turret used by mounts placed without an explicit definition.
    pub default_turret_id: String,
    /// Enemy archetypes.
    pub enemies: Vec<EnemyDef>,
    /// Authored and procedural waves.
    pub waves: WaveContent,
    /// Research nodes.
    pub tech_nodes: Vec<TechNodeDef>,
    /// Starter board.
    pub board: BoardDef,
    /// Headquarters.
    #[serde(default)]
    pub hq: HqDef,
    /// Difficulty tuning.
    pub difficulty: PerDifficulty<DifficultyDef>,
    /// Ore rings and renewal.
    #[serde(default)]
    pub ore: OreConfigDef,
}

impl ContentBundle {
    /// Built-in content used by the headless runner and tests.
    #[must_use]
    pub fn standard() -> Self {
        use crate::components::items::*;

        let item = |id: &str, category| ItemDef::new(id, id, category);
        let items = vec![
            item(ORE_IRON, ItemCategory::Ore),
            item(ORE_COPPER, ItemCategory::Ore),
            item(ORE_COAL, ItemCategory::Ore),
            item(PLATE_IRON, ItemCategory::Intermediate),
            item(PLATE_COPPER, ItemCategory::Intermediate),
            item(PLATE_STEEL, ItemCategory::Intermediate),
            item(GEAR, ItemCategory::Intermediate),
            item(CIRCUIT, ItemCategory::Intermediate),
            item(POWER_CELL, ItemCategory::Intermediate),
            item(WALL_KIT, ItemCategory::Construction),
            item(TURRET_CORE, ItemCategory::Construction),
            item("repair_kit", ItemCategory::Construction),
            item(AMMO_LIGHT, ItemCategory::Ammo),
            item(AMMO_HEAVY, ItemCategory::Ammo),
            item(AMMO_PLASMA, ItemCategory::Ammo),
        ];

        let recipes = vec![
            RecipeDef::new("smelt_iron", &[(ORE_IRON, 2)], &[(PLATE_IRON, 1)], 40),
            RecipeDef::new("smelt_copper", &[(ORE_COPPER, 2)], &[(PLATE_COPPER, 1)], 40),
            RecipeDef::new("smelt_steel", &[(PLATE_IRON, 2), (ORE_COAL, 1)], &[(PLATE_STEEL, 1)], 80),
            RecipeDef::new("forge_gear", &[(PLATE_IRON, 2)], &[(GEAR, 1)], 30),
            RecipeDef::new("etch_circuit", &[(PLATE_COPPER, 2), (ORE_COAL, 1)], &[(CIRCUIT, 1)], 40),
            RecipeDef::new(
                "assemble_power_cell",
                &[(PLATE_COPPER, 1), (CIRCUIT, 1)],
                &[(POWER_CELL, 1)],
                50,
            ),
            RecipeDef::new("craft_wall_kit", &[(PLATE_STEEL, 1), (GEAR, 1)], &[(WALL_KIT, 1)], 24),
            RecipeDef::new(
                "craft_turret_core",
                &[(PLATE_STEEL, 1), (CIRCUIT, 1), (GEAR, 1)],
                &[(TURRET_CORE, 1)],
                50,
            ),
            RecipeDef::new(
                "craft_repair_kit",
                &[(PLATE_STEEL, 1), (CIRCUIT, 1)],
                &[("repair_kit", 1)],
                40,
            ),
            RecipeDef::new("craft_ammo_light", &[(PLATE_IRON, 1)], &[(AMMO_LIGHT, 4)], 40),
            RecipeDef::new(
                "craft_ammo_heavy",
                &[(PLATE_STEEL, 1), (AMMO_LIGHT, 2)],
                &[(AMMO_HEAVY, 3)],
                52,
            ),
            RecipeDef::new(
                "craft_ammo_plasma",
                &[(POWER_CELL, 1), (CIRCUIT, 1)],
                &[(AMMO_PLASMA, 2)],
                60,
            ),
        ];

        let turret = |id: &str, ammo: &str, fire_rate: Fixed, range: Fixed, damage| TurretDef {
            id: id.to_string(),
            ammo_item_id: ammo.to_string(),
            fire_rate,
            range,
            damage,
        };
        let turrets = vec![
            turret("turret_mk1", AMMO_LIGHT, Fixed::from_num(2), Fixed::from_num(8), 12),
            turret("turret_mk2", AMMO_HEAVY, Fixed::from_num(1.4), Fixed::from_num(10), 25),
            turret("gattling_tower", AMMO_LIGHT, Fixed::from_num(4.2), Fixed::from_num(6.5), 8),
            turret("plasma_sentinel", AMMO_PLASMA, Fixed::from_num(0.9), Fixed::from_num(11), 45),
        ];

        let enemies = vec![
            EnemyDef {
                id: "scout".into(),
                health: 20,
                health_per_wave: 3,
                move_every_ticks: 8,
                threat_cost: 1,
                base_damage: 8,
                reward: 2,
                wall_damage_percent: 50,
                min_wave: 0,
            },
            EnemyDef {
                id: "raider".into(),
                health: 45,
                health_per_wave: 5,
                move_every_ticks: 6,
                threat_cost: 3,
                base_damage: 12,
                reward: 4,
                wall_damage_percent: 100,
                min_wave: 4,
            },
            EnemyDef {
                id: "breacher".into(),
                health: 120,
                health_per_wave: 8,
                move_every_ticks: 10,
                threat_cost: 6,
                base_damage: 25,
                reward: 8,
                wall_damage_percent: 200,
                min_wave: 8,
            },
        ];

        let waves = WaveContent {
            authored: vec![
                WaveDef {
                    index: 1,
                    groups: vec![EnemyGroup::new("scout", 4, 0)],
                    threat_budget: 4,
                },
                WaveDef {
                    index: 2,
                    groups: vec![EnemyGroup::new("scout", 6, 0), EnemyGroup::new("scout", 2, 40)],
                    threat_budget: 8,
                },
                WaveDef {
                    index: 3,
                    groups: vec![EnemyGroup::new("scout", 6, 0), EnemyGroup::new("raider", 2, 60)],
                    threat_budget: 12,
                },
            ],
            procedural: ProceduralWaveDef::default(),
        };

        Self {
            items,
            recipes,
            turrets,
            default_turret_id: "turret_mk1".into(),
            enemies,
            waves,
            tech_nodes: TechNodeDef::standard_surveys(),
            board: BoardDef::starter(),
            hq: HqDef::default(),
            difficulty: DifficultyDef::standard(),
            ore: OreConfigDef::default(),
        }
    }

    /// Parse content from RON and validate cross references.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let content: Self = ron::from_str(ron)?;
        content.validate()?;
        Ok(content)
    }

    /// Check that every referenced definition exists.
    pub fn validate(&self) -> Result<()> {
        for structure in StructureType::ALL {
            for recipe_id in structure.supported_recipes() {
                self.recipe(recipe_id)?;
            }
        }
        self.turret(&self.default_turret_id)?;
        for wave in &self.waves.authored {
            for group in &wave.groups {
                self.enemy(&group.enemy_id)?;
            }
        }
        for node in &self.tech_nodes {
            for prerequisite in &node.prerequisites {
                self.tech_node(prerequisite)?;
            }
            if let Some(ring) = node.survey_ring {
                if self.ore.ring(ring).is_none() {
                    return Err(GameError::ContentError(format!(
                        "tech node '{}' surveys unknown ring {ring}",
                        node.id
                    )));
                }
            }
        }
        if self.ore.ore_types.is_empty() {
            return Err(GameError::ContentError("no ore types defined".into()));
        }
        Ok(())
    }

    /// Recipe by id.
    pub fn recipe(&self, id: &str) -> Result<&RecipeDef> {
        self.recipes
            .iter()
            .find(|recipe| recipe.id == id)
            .ok_or_else(|| unknown("recipe", id))
    }

    /// Turret by id.
    pub fn turret(&self, id: &str) -> Result<&TurretDef> {
        self.turrets
            .iter()
            .find(|turret| turret.id == id)
            .ok_or_else(|| unknown("turret", id))
    }

    /// Enemy by id.
    pub fn enemy(&self, id: &str) -> Result<&EnemyDef> {
        self.enemies
            .iter()
            .find(|enemy| enemy.id == id)
            .ok_or_else(|| unknown("enemy", id))
    }

    /// Research node by id.
    pub fn tech_node(&self, id: &str) -> Result<&TechNodeDef> {
        self.tech_nodes
            .iter()
            .find(|node| node.id == id)
            .ok_or_else(|| unknown("tech node", id))
    }
}

fn unknown(kind: &'static str, id: &str) -> GameError {
    GameError::UnknownDefinition {
        kind,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_content_is_valid() {
        let content = ContentBundle::standard();
        content.validate().unwrap();
        assert_eq!(content.recipe("smelt_iron").unwrap().duration_ticks, 40);
        assert_eq!(content.turret("gattling_tower").unwrap().ticks_per_shot(20), 5);
    }

    #[test]
    fn test_content_ron_round_trip() {
        let content = ContentBundle::standard();
        let text = ron::ser::to_string(&content).unwrap();
        let parsed = ContentBundle::from_ron_str(&text).unwrap();
        assert_eq!(parsed, content);
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let mut content = ContentBundle::standard();
        content.waves.authored[0].groups[0].enemy_id = "ghost".into();
        let err = content.validate().unwrap_err();
        assert!(matches!(err, GameError::UnknownDefinition { kind: "enemy", .. }));
    }

    #[test]
    fn test_malformed_ron_rejected() {
        let err = ContentBundle::from_ron_str("(items: [").unwrap_err();
        assert!(matches!(err, GameError::ContentError(_)));
    }
}
