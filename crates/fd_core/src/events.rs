//! Events emitted while stepping the simulation.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, ItemId};

/// Kind of a [`SimEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A structure was placed.
    StructurePlaced,
    /// A structure was demolished.
    StructureRemoved,
    /// A placement or removal was refused; `value` is the result code.
    PlacementRejected,
    /// An enemy hit a structure.
    StructureDamaged,
    /// A structure was destroyed by enemies.
    StructureDestroyed,
    /// The board grew.
    BoardExpanded,
    /// A turret used ammo.
    AmmoSpent,
    /// A turret was due to fire but had no ammo.
    NotEnoughAmmo,
    /// A projectile left a turret.
    ProjectileFired,
    /// An enemy entered the board.
    EnemySpawned,
    /// An enemy was killed.
    EnemyDestroyed,
    /// An enemy reached the base.
    EnemyReachedBase,
    /// An ore patch ran out.
    PatchExhausted,
    /// A miner has nothing left to extract.
    MinerIdled,
    /// A geology survey started.
    RingSurveyStarted,
    /// A ring's patches became visible.
    RingRevealed,
    /// An exhausted patch was replaced.
    OreRenewalSpawned,
    /// A bottleneck signal turned on.
    BottleneckActivated,
    /// A bottleneck signal turned off.
    BottleneckDeactivated,
    /// The grace period ended.
    GracePeriodEnded,
    /// A wave started.
    WaveStarted,
    /// A wave ended.
    WaveEnded,
    /// An unscheduled raid started.
    RaidTriggered,
    /// A milestone wave was cleared.
    MilestoneReached,
    /// The run was extracted.
    RunExtracted,
    /// The HQ fell.
    GameOver,
}

impl EventKind {
    /// Stable name for logs and dumps.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::StructurePlaced => "structure_placed",
            Self::StructureRemoved => "structure_removed",
            Self::PlacementRejected => "placement_rejected",
            Self::StructureDamaged => "structure_damaged",
            Self::StructureDestroyed => "structure_destroyed",
            Self::BoardExpanded => "board_expanded",
            Self::AmmoSpent => "ammo_spent",
            Self::NotEnoughAmmo => "not_enough_ammo",
            Self::ProjectileFired => "projectile_fired",
            Self::EnemySpawned => "enemy_spawned",
            Self::EnemyDestroyed => "enemy_destroyed",
            Self::EnemyReachedBase => "enemy_reached_base",
            Self::PatchExhausted => "patch_exhausted",
            Self::MinerIdled => "miner_idled",
            Self::RingSurveyStarted => "ring_survey_started",
            Self::RingRevealed => "ring_revealed",
            Self::OreRenewalSpawned => "ore_renewal_spawned",
            Self::BottleneckActivated => "bottleneck_activated",
            Self::BottleneckDeactivated => "bottleneck_deactivated",
            Self::GracePeriodEnded => "grace_period_ended",
            Self::WaveStarted => "wave_started",
            Self::WaveEnded => "wave_ended",
            Self::RaidTriggered => "raid_triggered",
            Self::MilestoneReached => "milestone_reached",
            Self::RunExtracted => "run_extracted",
            Self::GameOver => "game_over",
        }
    }
}

/// Something that happened during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimEvent {
    /// Tick being processed when the event fired.
    pub tick: u64,
    /// What happened.
    pub kind: EventKind,
    /// Entity involved.
    pub entity: Option<EntityId>,
    /// Kind-specific number (result code, damage, wave number, ...).
    pub value: Option<i64>,
    /// Item involved.
    pub item_id: Option<ItemId>,
    /// Kind-specific text.
    pub detail: Option<String>,
}

impl SimEvent {
    /// Event with no payload.
    #[must_use]
    pub const fn new(tick: u64, kind: EventKind) -> Self {
        Self {
            tick,
            kind,
            entity: None,
            value: None,
            item_id: None,
            detail: None,
        }
    }

    /// Attach an entity.
    #[must_use]
    pub fn with_entity(mut self, entity: EntityId) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Attach a value.
    #[must_use]
    pub fn with_value(mut self, value: i64) -> Self {
        self.value = Some(value);
        self
    }

    /// Attach an item.
    #[must_use]
    pub fn with_item(mut self, item_id: impl Into<ItemId>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    /// Attach detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
