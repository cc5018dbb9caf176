//! Simulation tunables that are not content.
//!
//! Every section uses `#[serde(default)]`, so a RON file only needs the
//! values it changes:
//!
//! ```ron
//! (
//!     combat: (range_override: Some(12.0), damage_override: Some(18)),
//!     waves: (enable_raids: true),
//! )
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::BoardGrowthPolicy;
use crate::components::items;
use crate::error::Result;
use crate::math::{fixed_decimal_serde, Fixed};
use crate::simulation::TICK_RATE;

/// Economy and logistics constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Extraction progress needed per ore unit.
    pub miner_ticks_per_unit: u32,
    /// Ticks an item spends on a transport tile before moving on.
    pub conveyor_transit_ticks: u32,
    /// Global stock recipes may not draw below.
    pub reserve_floor: BTreeMap<String, u32>,
    /// Recipes exempt from the reserve floor.
    pub reserve_exempt_recipes: Vec<String>,
    /// Shared ammo capacity contributed by each wall.
    pub ammo_per_wall: u32,
    /// Ammo moved from global inventory into each wall network per tick.
    pub network_refill_per_tick: u32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            miner_ticks_per_unit: 20,
            conveyor_transit_ticks: 4,
            reserve_floor: [
                (items::PLATE_IRON, 6),
                (items::PLATE_COPPER, 4),
                (items::PLATE_STEEL, 4),
                (items::GEAR, 3),
                (items::CIRCUIT, 2),
            ]
            .into_iter()
            .map(|(item, floor)| (item.to_string(), floor))
            .collect(),
            reserve_exempt_recipes: vec!["craft_wall_kit".into(), "craft_turret_core".into()],
            ammo_per_wall: 8,
            network_refill_per_tick: 4,
        }
    }
}

impl EconomyConfig {
    /// Floor for `item_id` when `recipe_id` draws on global stock.
    #[must_use]
    pub fn floor_for(&self, recipe_id: &str, outputs_item: bool, item_id: &str) -> u32 {
        if outputs_item || self.reserve_exempt_recipes.iter().any(|r| r == recipe_id) {
            return 0;
        }
        self.reserve_floor.get(item_id).copied().unwrap_or(0)
    }
}

/// Combat overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Turret definition for mounts placed without one; content default when unset.
    pub default_turret_id: Option<String>,
    /// Replaces every turret's range.
    #[serde(with = "fixed_decimal_serde::option")]
    pub range_override: Option<Fixed>,
    /// Replaces every turret's damage.
    pub damage_override: Option<u32>,
    /// Extra path cost enemies assign to a structure cell.
    pub wall_breach_cost: u32,
    /// Projectile speed in cells per tick.
    pub projectile_cells_per_tick: u32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            default_turret_id: None,
            range_override: None,
            damage_override: None,
            wall_breach_cost: 6,
            projectile_cells_per_tick: 2,
        }
    }
}

/// Wave and raid switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Allow unscheduled raids between waves.
    pub enable_raids: bool,
    /// Raid roll modulus.
    pub raid_roll_modulus: u64,
    /// A roll below this triggers a raid.
    pub raid_roll_threshold: u64,
    /// Ticks between raids.
    pub raid_cooldown_ticks: u64,
    /// Currency per milestone wave number.
    pub milestone_reward_per_wave: u64,
    /// Currency per tick while a wave is active.
    pub currency_per_active_tick: u64,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            enable_raids: false,
            raid_roll_modulus: 97,
            raid_roll_threshold: 3,
            raid_cooldown_ticks: 220,
            milestone_reward_per_wave: 10,
            currency_per_active_tick: 1,
        }
    }
}

/// Bottleneck thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BottleneckConfig {
    /// Consecutive ticks a condition must hold before its signal shows.
    pub activation_threshold_ticks: u32,
    /// Consecutive clear ticks before a signal hides.
    pub recovery_threshold_ticks: u32,
    /// Dry-fire increase per tick that counts as starving.
    pub dry_fire_delta: u64,
    /// Queued spawns that count as a surge backlog.
    pub spawn_backlog_threshold: u32,
    /// Pool fill ratio below which a defended network is underfed.
    #[serde(with = "fixed_decimal_serde")]
    pub network_ammo_ratio: Fixed,
}

impl Default for BottleneckConfig {
    fn default() -> Self {
        Self {
            activation_threshold_ticks: 6,
            recovery_threshold_ticks: 20,
            dry_fire_delta: 1,
            spawn_backlog_threshold: 10,
            network_ammo_ratio: Fixed::from_bits(1 << 30),
        }
    }
}

/// Every tunable the systems read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Ticks per simulated second.
    pub tick_rate: u32,
    /// Economy constants.
    pub economy: EconomyConfig,
    /// Combat overrides.
    pub combat: CombatConfig,
    /// Wave switches.
    pub waves: WaveConfig,
    /// Bottleneck thresholds.
    pub bottleneck: BottleneckConfig,
    /// Board growth.
    pub growth: BoardGrowthPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            economy: EconomyConfig::default(),
            combat: CombatConfig::default(),
            waves: WaveConfig::default(),
            bottleneck: BottleneckConfig::default(),
            growth: BoardGrowthPolicy::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse a RON config; missing fields keep their defaults.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        Ok(ron::from_str(ron)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = SimulationConfig::from_ron_str(
            "(combat: (range_override: Some(12.0), damage_override: Some(18)), waves: (enable_raids: true))",
        )
        .unwrap();
        assert_eq!(config.combat.range_override, Some(Fixed::from_num(12)));
        assert_eq!(config.combat.damage_override, Some(18));
        assert_eq!(config.combat.wall_breach_cost, 6);
        assert!(config.waves.enable_raids);
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.bottleneck.network_ammo_ratio, Fixed::from_num(0.25));
    }

    #[test]
    fn test_reserve_floor_exemptions() {
        let economy = EconomyConfig::default();
        assert_eq!(economy.floor_for("forge_gear", false, items::PLATE_IRON), 6);
        assert_eq!(economy.floor_for("craft_wall_kit", false, items::PLATE_STEEL), 0);
        assert_eq!(economy.floor_for("forge_gear", true, items::GEAR), 0);
        assert_eq!(economy.floor_for("forge_gear", false, items::ORE_COAL), 0);
    }

    #[test]
    fn test_invalid_ron_is_content_error() {
        assert!(SimulationConfig::from_ron_str("(tick_rate: \"fast\")").is_err());
    }
}
