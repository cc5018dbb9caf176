//! Turret, enemy and wave definitions.

use serde::{Deserialize, Serialize};

use crate::components::ItemId;
use crate::math::{fixed_decimal_serde, Fixed};

/// Turret stats. Cadence and range are decimals in content.
///
/// # Example RON
///
/// ```ron
/// TurretDef(
///     id: "gattling_tower",
///     ammo_item_id: "ammo_light",
///     fire_rate: 4.2,
///     range: 6.5,
///     damage: 8,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurretDef {
    /// Unique turret id.
    pub id: String,
    /// Ammunition consumed per shot.
    pub ammo_item_id: ItemId,
    /// Shots per second.
    #[serde(with = "fixed_decimal_serde")]
    pub fire_rate: Fixed,
    /// Targeting range in cells (Manhattan).
    #[serde(with = "fixed_decimal_serde")]
    pub range: Fixed,
    /// Damage per projectile.
    pub damage: u32,
}

impl TurretDef {
    /// Ticks between shots at `tick_rate`, rounded to nearest, at least 1.
    #[must_use]
    pub fn ticks_per_shot(&self, tick_rate: u32) -> u64 {
        if self.fire_rate <= Fixed::ZERO {
            return u64::MAX;
        }
        let ticks = (Fixed::from_num(tick_rate) / self.fire_rate).round();
        ticks.to_num::<u64>().max(1)
    }
}

/// Enemy archetype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyDef {
    /// Unique enemy id.
    pub id: String,
    /// Health at wave 0.
    pub health: u32,
    /// Extra health per wave index.
    #[serde(default)]
    pub health_per_wave: u32,
    /// The enemy steps once every this many ticks.
    pub move_every_ticks: u32,
    /// Budget consumed when spawned as part of a wave.
    pub threat_cost: u32,
    /// Damage dealt to the HQ on arrival and to structures per attack.
    pub base_damage: u32,
    /// Currency granted when destroyed.
    #[serde(default)]
    pub reward: u32,
    /// Multiplier (percent) applied to damage against structures.
    #[serde(default = "default_wall_damage_percent")]
    pub wall_damage_percent: u32,
    /// Earliest wave index at which procedural waves use this enemy.
    #[serde(default)]
    pub min_wave: u32,
}

fn default_wall_damage_percent() -> u32 {
    100
}

impl EnemyDef {
    /// Health for an enemy spawned in `wave_index`.
    #[must_use]
    pub fn health_at_wave(&self, wave_index: u32) -> u32 {
        self.health
            .saturating_add(self.health_per_wave.saturating_mul(wave_index))
    }

    /// Damage dealt to a structure per attack.
    #[must_use]
    pub fn structure_damage(&self) -> u32 {
        self.base_damage.saturating_mul(self.wall_damage_percent) / 100
    }
}

/// One group of identical enemies within a wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyGroup {
    /// Enemy definition id.
    pub enemy_id: String,
    /// Number to spawn.
    pub count: u32,
    /// Delay after wave start before the group spawns.
    #[serde(default)]
    pub delay_ticks: u32,
}

impl EnemyGroup {
    /// Create a group.
    #[must_use]
    pub fn new(enemy_id: &str, count: u32, delay_ticks: u32) -> Self {
        Self {
            enemy_id: enemy_id.to_string(),
            count,
            delay_ticks,
        }
    }
}

/// Hand-authored wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveDef {
    /// 1-based wave index this definition applies to.
    pub index: u32,
    /// Enemy groups in spawn order.
    pub groups: Vec<EnemyGroup>,
    /// Threat budget before the difficulty multiplier.
    pub threat_budget: u32,
}

/// Budget formula for waves past the hand-authored list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProceduralWaveDef {
    /// Constant budget term.
    pub base_budget: u32,
    /// Budget per wave index.
    pub linear_budget: u32,
    /// Budget per squared wave index, in hundredths.
    pub quadratic_budget_percent: u32,
    /// Hard cap on spawns per wave.
    pub max_spawns: u32,
    /// Ticks between successive procedural groups.
    pub group_spacing_ticks: u32,
}

impl Default for ProceduralWaveDef {
    fn default() -> Self {
        Self {
            base_budget: 10,
            linear_budget: 4,
            quadratic_budget_percent: 50,
            max_spawns: 24,
            group_spacing_ticks: 20,
        }
    }
}

impl ProceduralWaveDef {
    /// Budget for `wave_index` before the difficulty multiplier.
    #[must_use]
    pub fn budget(&self, wave_index: u32) -> u32 {
        let w = u64::from(wave_index);
        let quadratic = w * w * u64::from(self.quadratic_budget_percent) / 100;
        let total = u64::from(self.base_budget) + u64::from(self.linear_budget) * w + quadratic;
        u32::try_from(total).unwrap_or(u32::MAX)
    }
}

/// Wave content: authored waves followed by the procedural formula.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaveContent {
    /// Authored waves keyed by their `index`.
    #[serde(default)]
    pub authored: Vec<WaveDef>,
    /// Fallback formula.
    #[serde(default)]
    pub procedural: ProceduralWaveDef,
}

impl WaveContent {
    /// Authored definition for `wave_index`, if any.
    #[must_use]
    pub fn authored_wave(&self, wave_index: u32) -> Option<&WaveDef> {
        self.authored.iter().find(|wave| wave.index == wave_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turret(fire_rate: f64) -> TurretDef {
        TurretDef {
            id: "t".into(),
            ammo_item_id: "ammo_light".into(),
            fire_rate: Fixed::from_num(fire_rate),
            range: Fixed::from_num(8),
            damage: 1,
        }
    }

    #[test]
    fn test_ticks_per_shot_rounds() {
        assert_eq!(turret(2.0).ticks_per_shot(20), 10);
        assert_eq!(turret(4.2).ticks_per_shot(20), 5);
        assert_eq!(turret(0.9).ticks_per_shot(20), 22);
        assert_eq!(turret(40.0).ticks_per_shot(20), 1);
        assert_eq!(turret(0.0).ticks_per_shot(20), u64::MAX);
    }

    #[test]
    fn test_procedural_budget_grows() {
        let procedural = ProceduralWaveDef::default();
        assert_eq!(procedural.budget(0), 10);
        assert_eq!(procedural.budget(2), 10 + 8 + 2);
        assert!(procedural.budget(10) > procedural.budget(9));
    }
}
