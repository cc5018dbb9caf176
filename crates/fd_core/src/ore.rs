//! Ore patches and the ring reveal / renewal lifecycle state.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, GridPosition, ItemId, PatchId};
use crate::data::Richness;

/// Reveal state of one ring. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RingState {
    /// Hidden; a survey may be started.
    Locked,
    /// Survey in progress.
    Surveying,
    /// Patches generated and visible.
    Revealed,
}

/// A minable ore deposit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrePatch {
    /// Patch id.
    pub id: PatchId,
    /// Ore item produced.
    pub ore_item_id: ItemId,
    /// Richness tier.
    pub richness: Richness,
    /// Patch cell.
    pub position: GridPosition,
    /// Initial ore.
    pub total_ore: u32,
    /// Ore left, in `[0, total_ore]`.
    pub remaining_ore: u32,
    /// Miner extracting from this patch.
    pub bound_miner_id: Option<EntityId>,
    /// Ring the patch belongs to.
    pub reveal_ring: u32,
    /// Whether players can see and mine it.
    pub is_revealed: bool,
    /// Tick the patch ran dry.
    pub exhausted_at_tick: Option<u64>,
    /// Whether the patch has been queued for renewal.
    pub renewal_queued: bool,
}

impl OrePatch {
    /// Whether no ore remains.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining_ore == 0
    }

    /// Whether a miner could bind to this patch right now.
    #[must_use]
    pub const fn is_minable(&self) -> bool {
        self.is_revealed && !self.is_exhausted()
    }
}

/// An exhausted patch waiting to be replaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenewalRequest {
    /// Exhausted patch.
    pub source_patch_id: PatchId,
    /// Ore to respawn.
    pub ore_item_id: ItemId,
    /// Richness to respawn.
    pub richness: Richness,
    /// Failed or deferred attempts so far.
    pub skip_count: u32,
}

/// Ring and renewal bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OreLifecycleState {
    /// State per ring.
    pub ring_states: BTreeMap<u32, RingState>,
    /// Survey completion tick per ring.
    pub survey_end_tick_by_ring: BTreeMap<u32, u64>,
    /// Survey node driving each surveying ring.
    pub survey_node_by_ring: BTreeMap<u32, String>,
    /// Pending renewals, oldest first.
    pub renewal_queue: VecDeque<RenewalRequest>,
    /// Next id handed to a new patch.
    pub next_patch_id: PatchId,
    /// Last wave boundary at which renewals ran.
    pub last_renewal_wave_processed: u32,
    /// Renewed patches spawned so far.
    pub renewals_spawned: u32,
}

impl Default for OreLifecycleState {
    fn default() -> Self {
        Self {
            ring_states: BTreeMap::new(),
            survey_end_tick_by_ring: BTreeMap::new(),
            survey_node_by_ring: BTreeMap::new(),
            renewal_queue: VecDeque::new(),
            next_patch_id: 1,
            last_renewal_wave_processed: 0,
            renewals_spawned: 0,
        }
    }
}

impl OreLifecycleState {
    /// State of `ring`; unknown rings are locked.
    #[must_use]
    pub fn ring_state(&self, ring: u32) -> RingState {
        self.ring_states.get(&ring).copied().unwrap_or(RingState::Locked)
    }

    /// Advance `ring` to `state`. Backward transitions are ignored.
    pub fn advance_ring(&mut self, ring: u32, state: RingState) -> bool {
        if state <= self.ring_state(ring) && self.ring_states.contains_key(&ring) {
            return false;
        }
        self.ring_states.insert(ring, state);
        true
    }

    /// Allocate a patch id.
    pub fn allocate_patch_id(&mut self) -> PatchId {
        let id = self.next_patch_id;
        self.next_patch_id += 1;
        id
    }
}
