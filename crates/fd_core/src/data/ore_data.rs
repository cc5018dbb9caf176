//! Ore rings, ore types and renewal tuning.

use serde::{Deserialize, Serialize};

use super::board_data::PerDifficulty;
use crate::components::{items, ItemId};

/// Patch richness tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Richness {
    /// Small deposit.
    Poor,
    /// Typical deposit.
    #[default]
    Normal,
    /// Large deposit.
    Rich,
}

impl Richness {
    /// Tiers in weight-table order.
    pub const ALL: [Self; 3] = [Self::Poor, Self::Normal, Self::Rich];
}

/// Weight per richness tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichnessWeights {
    /// Weight of [`Richness::Poor`].
    pub poor: u32,
    /// Weight of [`Richness::Normal`].
    pub normal: u32,
    /// Weight of [`Richness::Rich`].
    pub rich: u32,
}

impl RichnessWeights {
    /// Weights in [`Richness::ALL`] order.
    #[must_use]
    pub const fn as_array(self) -> [u32; 3] {
        [self.poor, self.normal, self.rich]
    }
}

/// One concentric band around the base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OreRingDef {
    /// Ring index; ring 0 is revealed at bootstrap.
    pub ring: u32,
    /// Inner Chebyshev distance from the base, inclusive.
    pub min_distance: u32,
    /// Outer Chebyshev distance from the base, inclusive.
    pub max_distance: u32,
    /// Patches generated when the ring is revealed.
    pub patch_count: u32,
    /// Richness weights for generated patches.
    pub richness: RichnessWeights,
}

/// Ore type weight and deposit sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OreTypeDef {
    /// Item produced by miners.
    pub item_id: ItemId,
    /// Relative pick weight.
    pub weight: u32,
    /// Ore in a poor patch.
    pub poor_amount: u32,
    /// Ore in a normal patch.
    pub normal_amount: u32,
    /// Ore in a rich patch.
    pub rich_amount: u32,
}

impl OreTypeDef {
    /// Deposit size for `richness`.
    #[must_use]
    pub const fn amount(&self, richness: Richness) -> u32 {
        match richness {
            Richness::Poor => self.poor_amount,
            Richness::Normal => self.normal_amount,
            Richness::Rich => self.rich_amount,
        }
    }
}

/// Renewal of exhausted patches between waves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalDef {
    /// Requests processed per wave boundary.
    pub batch_cap: PerDifficulty<u32>,
    /// No renewal spawns while this many non-exhausted patches exist.
    pub max_active_patches: u32,
    /// Minimum Chebyshev distance from the base for renewed patches.
    pub min_distance_from_base: u32,
    /// Exponent on normalized distance; larger favours the board edge.
    pub edge_bias_power: u32,
    /// Chance (percent) on hard that a request is deferred.
    pub hard_skip_percent: u32,
    /// Skips after which spacing is bypassed and the request is forced.
    pub hard_max_consecutive_skips: u32,
}

impl Default for RenewalDef {
    fn default() -> Self {
        Self {
            batch_cap: PerDifficulty::new(2, 1, 1),
            max_active_patches: 24,
            min_distance_from_base: 4,
            edge_bias_power: 2,
            hard_skip_percent: 35,
            hard_max_consecutive_skips: 2,
        }
    }
}

/// Complete ore configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OreConfigDef {
    /// Rings, ring 0 first.
    pub rings: Vec<OreRingDef>,
    /// Ore types in pick order.
    pub ore_types: Vec<OreTypeDef>,
    /// Minimum Chebyshev spacing between patches.
    pub min_spacing: u32,
    /// Renewal tuning.
    #[serde(default)]
    pub renewal: RenewalDef,
}

impl OreConfigDef {
    /// Ring definition by index.
    #[must_use]
    pub fn ring(&self, ring: u32) -> Option<&OreRingDef> {
        self.rings.iter().find(|def| def.ring == ring)
    }

    /// Ore type definition by item id.
    #[must_use]
    pub fn ore_type(&self, item_id: &str) -> Option<&OreTypeDef> {
        self.ore_types.iter().find(|def| def.item_id == item_id)
    }
}

impl Default for OreConfigDef {
    fn default() -> Self {
        let ring = |ring, min_distance, max_distance, patch_count, poor, normal, rich| OreRingDef {
            ring,
            min_distance,
            max_distance,
            patch_count,
            richness: RichnessWeights { poor, normal, rich },
        };
        let ore = |item: &str, weight, poor_amount, normal_amount, rich_amount| OreTypeDef {
            item_id: item.to_string(),
            weight,
            poor_amount,
            normal_amount,
            rich_amount,
        };
        Self {
            rings: vec![
                ring(0, 3, 14, 4, 2, 5, 1),
                ring(1, 15, 26, 4, 2, 5, 2),
                ring(2, 27, 38, 5, 1, 5, 3),
                ring(3, 39, 60, 6, 1, 4, 4),
            ],
            ore_types: vec![
                ore(items::ORE_IRON, 5, 300, 500, 800),
                ore(items::ORE_COPPER, 3, 200, 400, 650),
                ore(items::ORE_COAL, 2, 150, 300, 500),
            ],
            min_spacing: 3,
            renewal: RenewalDef::default(),
        }
    }
}
