//! Wave schedule and spawn queue.

use serde::{Deserialize, Serialize};

use crate::data::DifficultyDef;

/// An enemy waiting for its spawn tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingSpawn {
    /// Tick at or after which the enemy spawns.
    pub due_tick: u64,
    /// Enemy definition id.
    pub enemy_id: String,
    /// Wave number the spawn belongs to (0 for trickle and raids).
    pub wave_number: u32,
    /// Position in the wave, used to spread spawn rows.
    pub sequence: u32,
}

/// Cumulative threat counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ThreatTelemetry {
    /// Turret shots skipped for lack of ammo.
    pub dry_fire_events: u64,
    /// Spawns queued but not yet placed.
    pub queued_spawn_backlog: u32,
    /// Enemies spawned.
    pub enemies_spawned: u64,
    /// Enemies destroyed by turrets.
    pub enemies_destroyed: u64,
    /// Enemies that reached the base.
    pub enemies_reached_base: u64,
    /// Raids triggered.
    pub raids_triggered: u32,
}

/// Wave schedule state.
///
/// `wave_index` counts completed waves; the active wave is number
/// `wave_index + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreatState {
    /// Completed waves.
    pub wave_index: u32,
    /// Whether a wave is in progress.
    pub is_wave_active: bool,
    /// Tick the active wave started.
    pub wave_started_at_tick: u64,
    /// Tick the active wave times out.
    pub wave_ends_at_tick: u64,
    /// Earliest tick for the next wave.
    pub next_wave_tick: u64,
    /// Gap between waves before compression.
    pub wave_gap_base_ticks: u64,
    /// Minimum gap.
    pub wave_gap_floor_ticks: u64,
    /// Gap reduction per completed wave.
    pub wave_gap_compression_ticks: u64,
    /// Maximum wave length.
    pub wave_duration_ticks: u64,
    /// End of the grace period.
    pub grace_ends_at_tick: u64,
    /// Ticks between trickle spawns.
    pub trickle_interval_ticks: u64,
    /// Next trickle spawn.
    pub next_trickle_tick: u64,
    /// Minimum enemies per trickle.
    pub trickle_min: u32,
    /// Maximum enemies per trickle.
    pub trickle_max: u32,
    /// Trickles spawned so far.
    pub trickle_count: u32,
    /// Wave budget multiplier in percent.
    pub budget_percent: u32,
    /// Milestone cadence in waves.
    pub milestone_every: u32,
    /// Milestones reached.
    pub milestones_reached: u32,
    /// No raid before this tick.
    pub raid_cooldown_until_tick: u64,
    /// Spawns waiting for their tick, in due order.
    pub pending_spawns: Vec<PendingSpawn>,
    /// Counters.
    pub telemetry: ThreatTelemetry,
}

impl ThreatState {
    /// Schedule for a difficulty at `tick_rate` ticks per second.
    #[must_use]
    pub fn for_difficulty(def: &DifficultyDef, tick_rate: u32) -> Self {
        let seconds = |s: u32| u64::from(s) * u64::from(tick_rate);
        let grace_ends_at_tick = seconds(def.grace_period_seconds);
        Self {
            wave_index: 0,
            is_wave_active: false,
            wave_started_at_tick: 0,
            wave_ends_at_tick: 0,
            next_wave_tick: grace_ends_at_tick,
            wave_gap_base_ticks: seconds(def.wave_gap_base_seconds),
            wave_gap_floor_ticks: seconds(def.wave_gap_floor_seconds),
            wave_gap_compression_ticks: seconds(def.wave_gap_compression_seconds),
            wave_duration_ticks: 600,
            grace_ends_at_tick,
            trickle_interval_ticks: seconds(def.trickle_interval_seconds),
            next_trickle_tick: grace_ends_at_tick + seconds(def.trickle_interval_seconds),
            trickle_min: def.trickle_min,
            trickle_max: def.trickle_max.max(def.trickle_min),
            trickle_count: 0,
            budget_percent: def.budget_percent,
            milestone_every: 5,
            milestones_reached: 0,
            raid_cooldown_until_tick: grace_ends_at_tick,
            pending_spawns: Vec::new(),
            telemetry: ThreatTelemetry::default(),
        }
    }

    /// Number of the active (or next) wave.
    #[must_use]
    pub const fn current_wave_number(&self) -> u32 {
        self.wave_index + 1
    }

    /// Gap before the next wave after `completed` waves.
    #[must_use]
    pub fn wave_gap_ticks(&self, completed: u32) -> u64 {
        self.wave_gap_base_ticks
            .saturating_sub(u64::from(completed) * self.wave_gap_compression_ticks)
            .max(self.wave_gap_floor_ticks)
    }
}

impl Default for ThreatState {
    fn default() -> Self {
        Self::for_difficulty(&DifficultyDef::standard().normal, crate::simulation::TICK_RATE)
    }
}
