//! Economy state: inventories, buffers, transport payloads and power.
//!
//! All item counts are integers. Buffers are keyed by structure id and
//! created when the structure is placed; they are returned to the global
//! inventory and dropped when the structure is removed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::{Direction, EntityId, ItemId};
use crate::math::{fixed_serde, Fixed};
use crate::structures::StructureType;

/// Item counts keyed by item id.
pub type ItemBuffer = BTreeMap<ItemId, u32>;

/// Total quantity across a buffer.
#[must_use]
pub fn buffer_total(buffer: &ItemBuffer) -> u32 {
    buffer.values().sum()
}

/// Add `quantity` of `item_id`.
pub fn buffer_add(buffer: &mut ItemBuffer, item_id: &str, quantity: u32) {
    if quantity == 0 {
        return;
    }
    *buffer.entry(item_id.to_string()).or_insert(0) += quantity;
}

/// Remove up to `quantity` of `item_id`, returning how many were taken.
/// Empty entries are dropped so equal states encode identically.
pub fn buffer_take(buffer: &mut ItemBuffer, item_id: &str, quantity: u32) -> u32 {
    let Some(held) = buffer.get_mut(item_id) else {
        return 0;
    };
    let taken = (*held).min(quantity);
    *held -= taken;
    if *held == 0 {
        buffer.remove(item_id);
    }
    taken
}

/// Quantity of `item_id` held.
#[must_use]
pub fn buffer_count(buffer: &ItemBuffer, item_id: &str) -> u32 {
    buffer.get(item_id).copied().unwrap_or(0)
}

/// Item riding on a transport tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConveyorPayload {
    /// Item carried.
    pub item_id: ItemId,
    /// Ticks spent on this tile.
    pub progress_ticks: u32,
}

impl ConveyorPayload {
    /// Fresh payload at the start of a tile.
    #[must_use]
    pub fn new(item_id: impl Into<ItemId>) -> Self {
        Self {
            item_id: item_id.into(),
            progress_ticks: 0,
        }
    }
}

/// Explicit input/output sides for a transport tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConveyorIo {
    /// Side items are accepted from.
    pub input: Direction,
    /// Side items leave through.
    pub output: Direction,
}

/// Progress of the current production or extraction cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ProductionProgress {
    /// Active recipe; `None` for miners.
    pub recipe_id: Option<String>,
    /// Accumulated power-weighted ticks.
    #[serde(with = "fixed_serde")]
    pub elapsed: Fixed,
}

/// Cumulative counters for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EconomyTelemetry {
    /// Items produced by recipes and miners.
    pub produced: BTreeMap<ItemId, u64>,
    /// Items consumed by recipes.
    pub consumed: BTreeMap<ItemId, u64>,
    /// Successful transport hand-offs.
    pub transport_moves: u64,
}

/// Global and per-structure economy state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EconomyState {
    /// Global inventory.
    pub inventories: ItemBuffer,
    /// Typed input buffers keyed by structure.
    pub input_buffers: BTreeMap<EntityId, ItemBuffer>,
    /// Typed output buffers keyed by structure.
    pub output_buffers: BTreeMap<EntityId, ItemBuffer>,
    /// Recipe pinned per structure.
    pub pinned_recipes: BTreeMap<EntityId, String>,
    /// Running production/extraction cycles.
    pub production: BTreeMap<EntityId, ProductionProgress>,
    /// Transport payloads keyed by conveyor/splitter/merger.
    pub conveyor_payloads: BTreeMap<EntityId, ConveyorPayload>,
    /// Splitter output side / merger input side preference.
    pub transport_toggles: BTreeMap<EntityId, bool>,
    /// Storage pools keyed by storage id.
    pub storage_pools: BTreeMap<EntityId, ItemBuffer>,
    /// Explicit transport sides.
    pub conveyor_io: BTreeMap<EntityId, ConveyorIo>,
    /// Power supplied this tick.
    pub power_supply: u32,
    /// Power demanded this tick.
    pub power_demand: u32,
    /// `min(1, supply / demand)`.
    #[serde(with = "fixed_serde")]
    pub power_efficiency: Fixed,
    /// Currency earned from kills, waves and milestones.
    pub currency: u64,
    /// Counters.
    pub telemetry: EconomyTelemetry,
}

impl Default for EconomyState {
    fn default() -> Self {
        Self {
            inventories: ItemBuffer::new(),
            input_buffers: BTreeMap::new(),
            output_buffers: BTreeMap::new(),
            pinned_recipes: BTreeMap::new(),
            production: BTreeMap::new(),
            conveyor_payloads: BTreeMap::new(),
            transport_toggles: BTreeMap::new(),
            storage_pools: BTreeMap::new(),
            conveyor_io: BTreeMap::new(),
            power_supply: 0,
            power_demand: 0,
            power_efficiency: Fixed::ONE,
            currency: 0,
            telemetry: EconomyTelemetry::default(),
        }
    }
}

impl EconomyState {
    /// Global quantity of `item_id`.
    #[must_use]
    pub fn inventory(&self, item_id: &str) -> u32 {
        buffer_count(&self.inventories, item_id)
    }

    /// Add to the global inventory.
    pub fn add_inventory(&mut self, item_id: &str, quantity: u32) {
        buffer_add(&mut self.inventories, item_id, quantity);
    }

    /// Global inventory plus every storage pool.
    #[must_use]
    pub fn shared_available(&self, item_id: &str) -> u32 {
        self.inventory(item_id)
            + self
                .storage_pools
                .values()
                .map(|pool| buffer_count(pool, item_id))
                .sum::<u32>()
    }

    /// Whether `costs` can be paid from global inventory and storage pools.
    #[must_use]
    pub fn can_afford(&self, costs: &[(&str, u32)]) -> bool {
        costs
            .iter()
            .all(|&(item_id, quantity)| self.shared_available(item_id) >= quantity)
    }

    /// Pay `costs`: global inventory first, then storage pools in id order.
    /// Returns `false` without mutating anything when unaffordable.
    pub fn consume_costs(&mut self, costs: &[(&str, u32)]) -> bool {
        if !self.can_afford(costs) {
            return false;
        }
        for &(item_id, quantity) in costs {
            let mut remaining = quantity - buffer_take(&mut self.inventories, item_id, quantity);
            for pool in self.storage_pools.values_mut() {
                if remaining == 0 {
                    break;
                }
                remaining -= buffer_take(pool, item_id, remaining);
            }
        }
        true
    }

    /// Create buffers and defaults for a newly placed structure.
    pub fn register_structure(&mut self, id: EntityId, structure_type: StructureType) {
        if structure_type.input_capacity() > 0 {
            self.input_buffers.entry(id).or_default();
        }
        if structure_type.output_capacity() > 0 {
            self.output_buffers.entry(id).or_default();
        }
        if let Some(recipe_id) = structure_type.default_recipe() {
            self.pinned_recipes.insert(id, recipe_id.to_string());
        }
        match structure_type {
            StructureType::Storage => {
                self.storage_pools.entry(id).or_default();
            }
            StructureType::Splitter | StructureType::Merger => {
                self.transport_toggles.insert(id, false);
            }
            _ => {}
        }
    }

    /// Drop every record keyed by `id`, returning held items to the global
    /// inventory.
    pub fn unregister_structure(&mut self, id: EntityId) {
        let mut returned = ItemBuffer::new();
        for buffer in [
            self.input_buffers.remove(&id),
            self.output_buffers.remove(&id),
            self.storage_pools.remove(&id),
        ]
        .into_iter()
        .flatten()
        {
            for (item_id, quantity) in buffer {
                buffer_add(&mut returned, &item_id, quantity);
            }
        }
        if let Some(payload) = self.conveyor_payloads.remove(&id) {
            buffer_add(&mut returned, &payload.item_id, 1);
        }
        for (item_id, quantity) in returned {
            self.add_inventory(&item_id, quantity);
        }
        self.pinned_recipes.remove(&id);
        self.production.remove(&id);
        self.transport_toggles.remove(&id);
        self.conveyor_io.remove(&id);
    }

    /// Record produced items.
    pub fn record_produced(&mut self, item_id: &str, quantity: u32) {
        *self.telemetry.produced.entry(item_id.to_string()).or_insert(0) += u64::from(quantity);
    }

    /// Record consumed items.
    pub fn record_consumed(&mut self, item_id: &str, quantity: u32) {
        *self.telemetry.consumed.entry(item_id.to_string()).or_insert(0) += u64::from(quantity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::items;

    #[test]
    fn test_buffer_take_drops_empty_entries() {
        let mut buffer = ItemBuffer::new();
        buffer_add(&mut buffer, items::GEAR, 3);
        assert_eq!(buffer_take(&mut buffer, items::GEAR, 5), 3);
        assert!(buffer.is_empty());
        assert_eq!(buffer_take(&mut buffer, items::GEAR, 1), 0);
    }

    #[test]
    fn test_costs_draw_from_storage_after_inventory() {
        let mut economy = EconomyState::default();
        economy.add_inventory(items::PLATE_IRON, 2);
        let mut pool = ItemBuffer::new();
        buffer_add(&mut pool, items::PLATE_IRON, 6);
        buffer_add(&mut pool, items::GEAR, 3);
        economy.storage_pools.insert(9, pool);

        assert!(economy.consume_costs(StructureType::Miner.build_cost()));
        assert_eq!(economy.inventory(items::PLATE_IRON), 0);
        assert_eq!(buffer_count(&economy.storage_pools[&9], items::PLATE_IRON), 2);
        assert_eq!(buffer_count(&economy.storage_pools[&9], items::GEAR), 0);
    }

    #[test]
    fn test_unaffordable_costs_leave_state_untouched() {
        let mut economy = EconomyState::default();
        economy.add_inventory(items::PLATE_IRON, 5);
        let before = economy.clone();
        assert!(!economy.consume_costs(StructureType::Miner.build_cost()));
        assert_eq!(economy, before);
    }

    #[test]
    fn test_unregister_returns_buffers() {
        let mut economy = EconomyState::default();
        economy.register_structure(4, StructureType::Smelter);
        assert_eq!(economy.pinned_recipes[&4], "smelt_iron");
        buffer_add(economy.input_buffers.get_mut(&4).unwrap(), items::ORE_IRON, 3);
        buffer_add(economy.output_buffers.get_mut(&4).unwrap(), items::PLATE_IRON, 1);

        economy.unregister_structure(4);
        assert_eq!(economy.inventory(items::ORE_IRON), 3);
        assert_eq!(economy.inventory(items::PLATE_IRON), 1);
        assert!(!economy.pinned_recipes.contains_key(&4));
        assert!(!economy.input_buffers.contains_key(&4));
    }
}
