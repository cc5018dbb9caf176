//! Starter board layout, HQ and difficulty tuning.

use serde::{Deserialize, Serialize};

use super::item_data::ItemStack;

/// Run difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    /// Long grace period, slower waves.
    Easy,
    /// Baseline.
    #[default]
    Normal,
    /// Short grace period, bigger waves, renewal skips.
    Hard,
}

impl Difficulty {
    /// Numeric key used in hash streams.
    #[must_use]
    pub const fn key(self) -> u64 {
        match self {
            Self::Easy => 0,
            Self::Normal => 1,
            Self::Hard => 2,
        }
    }
}

/// One value per difficulty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerDifficulty<T> {
    /// Easy value.
    pub easy: T,
    /// Normal value.
    pub normal: T,
    /// Hard value.
    pub hard: T,
}

impl<T> PerDifficulty<T> {
    /// Build from three values.
    pub const fn new(easy: T, normal: T, hard: T) -> Self {
        Self { easy, normal, hard }
    }

    /// Value for `difficulty`.
    pub const fn get(&self, difficulty: Difficulty) -> &T {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Normal => &self.normal,
            Difficulty::Hard => &self.hard,
        }
    }
}

/// Schedule tuning for one difficulty. Times are in seconds of game time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyDef {
    /// Seconds before the first wave may start.
    pub grace_period_seconds: u32,
    /// Gap between waves before compression.
    pub wave_gap_base_seconds: u32,
    /// Lower bound on the gap.
    pub wave_gap_floor_seconds: u32,
    /// Gap reduction per completed wave.
    pub wave_gap_compression_seconds: u32,
    /// Seconds between trickle spawns.
    pub trickle_interval_seconds: u32,
    /// Minimum enemies per trickle.
    pub trickle_min: u32,
    /// Maximum enemies per trickle.
    pub trickle_max: u32,
    /// Wave budget multiplier in percent.
    pub budget_percent: u32,
}

impl DifficultyDef {
    /// Standard table.
    #[must_use]
    pub fn standard() -> PerDifficulty<Self> {
        PerDifficulty::new(
            Self {
                grace_period_seconds: 180,
                wave_gap_base_seconds: 120,
                wave_gap_floor_seconds: 70,
                wave_gap_compression_seconds: 2,
                trickle_interval_seconds: 15,
                trickle_min: 1,
                trickle_max: 1,
                budget_percent: 85,
            },
            Self {
                grace_period_seconds: 120,
                wave_gap_base_seconds: 90,
                wave_gap_floor_seconds: 50,
                wave_gap_compression_seconds: 2,
                trickle_interval_seconds: 12,
                trickle_min: 1,
                trickle_max: 2,
                budget_percent: 100,
            },
            Self {
                grace_period_seconds: 60,
                wave_gap_base_seconds: 60,
                wave_gap_floor_seconds: 35,
                wave_gap_compression_seconds: 2,
                trickle_interval_seconds: 8,
                trickle_min: 2,
                trickle_max: 3,
                budget_percent: 115,
            },
        )
    }
}

/// Elevated cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RampDef {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Elevation level.
    pub elevation: i32,
}

/// Starter board layout.
///
/// # Example RON
///
/// ```ron
/// BoardDef(
///     width: 96,
///     height: 64,
///     base: (40, 32),
///     spawn_edge_x: 56,
///     spawn_y_min: 27,
///     spawn_y_max: 36,
///     blocked: [],
///     restricted: [(39, 31), (40, 31), (39, 32), (40, 32)],
///     ramps: [(x: 47, y: 31, elevation: 1)],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDef {
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
    /// Base (HQ anchor) cell.
    pub base: (i32, i32),
    /// Column enemies spawn on.
    pub spawn_edge_x: i32,
    /// First spawn row.
    pub spawn_y_min: i32,
    /// Last spawn row.
    pub spawn_y_max: i32,
    /// Terrain-blocked cells.
    #[serde(default)]
    pub blocked: Vec<(i32, i32)>,
    /// Cells no structure may occupy.
    #[serde(default)]
    pub restricted: Vec<(i32, i32)>,
    /// Elevated cells.
    #[serde(default)]
    pub ramps: Vec<RampDef>,
}

impl BoardDef {
    /// The 96x64 starter board.
    #[must_use]
    pub fn starter() -> Self {
        Self {
            width: 96,
            height: 64,
            base: (40, 32),
            spawn_edge_x: 56,
            spawn_y_min: 27,
            spawn_y_max: 36,
            blocked: Vec::new(),
            restricted: vec![(39, 31), (40, 31), (39, 32), (40, 32)],
            ramps: (31..=33)
                .map(|y| RampDef {
                    x: 47,
                    y,
                    elevation: 1,
                })
                .collect(),
        }
    }
}

/// Headquarters definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HqDef {
    /// HQ health; reaching zero ends the run.
    pub health: u32,
    /// Extra starting inventory per difficulty.
    #[serde(default)]
    pub starting_resources: PerDifficulty<Vec<ItemStack>>,
}

impl Default for HqDef {
    fn default() -> Self {
        Self {
            health: 500,
            starting_resources: PerDifficulty::new(
                vec![
                    ItemStack::new("wall_kit", 8),
                    ItemStack::new("turret_core", 2),
                    ItemStack::new("plate_steel", 6),
                ],
                vec![
                    ItemStack::new("wall_kit", 6),
                    ItemStack::new("turret_core", 1),
                    ItemStack::new("plate_steel", 4),
                ],
                vec![ItemStack::new("wall_kit", 4), ItemStack::new("plate_steel", 2)],
            ),
        }
    }
}
