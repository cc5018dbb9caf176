//! Bottleneck signal state and hysteresis counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, ItemId, NetworkId};

/// Signal kinds, declared in display priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BottleneckKind {
    /// Turrets fired dry during a wave.
    AmmoDryFire,
    /// A defended wall network is low on ammo during combat.
    WallNetworkUnderfed,
    /// Too many queued spawns.
    SurgeBacklogHigh,
    /// Demand exceeds supply.
    PowerShortage,
    /// Pinned recipe cannot be fed.
    InputStarved,
    /// Output buffer full.
    OutputBlocked,
    /// Miner without a usable patch.
    MinerNoOre,
    /// Transport payload cannot move on.
    ConveyorStall,
}

impl BottleneckKind {
    /// Stable name for events and logs.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::AmmoDryFire => "ammo_dry_fire",
            Self::WallNetworkUnderfed => "wall_network_underfed",
            Self::SurgeBacklogHigh => "surge_backlog_high",
            Self::PowerShortage => "power_shortage",
            Self::InputStarved => "input_starved",
            Self::OutputBlocked => "output_blocked",
            Self::MinerNoOre => "miner_no_ore",
            Self::ConveyorStall => "conveyor_stall",
        }
    }
}

/// What a signal is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalScope {
    /// The whole base.
    Global,
    /// One structure.
    Structure(EntityId),
    /// One wall network.
    Network(NetworkId),
}

impl SignalScope {
    /// Entity the signal points at, if any.
    #[must_use]
    pub const fn entity(self) -> Option<EntityId> {
        match self {
            Self::Global => None,
            Self::Structure(id) | Self::Network(id) => Some(id),
        }
    }
}

/// Signal severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational.
    Info,
    /// Needs attention.
    Warn,
    /// Defense or economy failing.
    Critical,
}

/// Identity of a tracked condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignalKey {
    /// Signal kind.
    pub kind: BottleneckKind,
    /// Signal subject.
    pub scope: SignalScope,
}

/// A condition observed this tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BottleneckObservation {
    /// Severity if it becomes active.
    pub severity: Severity,
    /// Item involved, if any.
    pub item_id: Option<ItemId>,
    /// Short human-readable reason.
    pub detail: String,
}

/// An active signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BottleneckSignal {
    /// Signal kind.
    pub kind: BottleneckKind,
    /// Signal subject.
    pub scope: SignalScope,
    /// Severity.
    pub severity: Severity,
    /// Item involved, if any.
    pub item_id: Option<ItemId>,
    /// Short human-readable reason.
    pub detail: String,
    /// Tick the signal became active.
    pub active_since_tick: u64,
}

/// Consecutive-tick counters for one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct HysteresisCounter {
    /// Consecutive ticks the condition held.
    pub condition_met_ticks: u32,
    /// Consecutive ticks the condition was absent.
    pub cleared_ticks: u32,
    /// Whether the signal is visible.
    pub is_active: bool,
    /// Tick the signal became active.
    pub active_since_tick: u64,
    /// Latest observation while the condition held.
    pub last_observation: Option<BottleneckObservation>,
}

/// Cumulative counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BottleneckTelemetry {
    /// Activations plus deactivations per kind.
    pub transitions: BTreeMap<BottleneckKind, u32>,
    /// Ticks with at least one active signal per kind.
    pub active_ticks: BTreeMap<BottleneckKind, u64>,
    /// Most signals active at once.
    pub max_concurrent: u32,
}

/// Bottleneck system state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BottleneckState {
    /// Active signals in priority order.
    pub active_signals: Vec<BottleneckSignal>,
    /// Counters per tracked key.
    pub counters: BTreeMap<SignalKey, HysteresisCounter>,
    /// Dry-fire total seen on the previous tick.
    pub previous_dry_fire_events: u64,
    /// Counters.
    pub telemetry: BottleneckTelemetry,
}

impl BottleneckState {
    /// Whether a signal of `kind` is active for `scope`.
    #[must_use]
    pub fn is_active(&self, kind: BottleneckKind, scope: SignalScope) -> bool {
        self.active_signals
            .iter()
            .any(|signal| signal.kind == kind && signal.scope == scope)
    }

    /// Active signals of one kind.
    pub fn signals_of(&self, kind: BottleneckKind) -> impl Iterator<Item = &BottleneckSignal> {
        self.active_signals.iter().filter(move |signal| signal.kind == kind)
    }
}
