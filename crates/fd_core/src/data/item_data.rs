//! Item and recipe definitions.

use serde::{Deserialize, Serialize};

use crate::components::ItemId;

/// Broad item grouping used by content tooling and the reserve policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ItemCategory {
    /// Mined from ore patches.
    Ore,
    /// Processed material.
    #[default]
    Intermediate,
    /// Consumed when placing structures.
    Construction,
    /// Turret ammunition.
    Ammo,
}

/// A single item definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDef {
    /// Unique item id.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Item grouping.
    #[serde(default)]
    pub category: ItemCategory,
}

impl ItemDef {
    /// Create an item definition.
    #[must_use]
    pub fn new(id: &str, name: &str, category: ItemCategory) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category,
        }
    }
}

/// Quantity of one item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item id.
    pub item_id: ItemId,
    /// Count.
    pub quantity: u32,
}

impl ItemStack {
    /// Create a stack.
    #[must_use]
    pub fn new(item_id: &str, quantity: u32) -> Self {
        Self {
            item_id: item_id.to_string(),
            quantity,
        }
    }
}

/// Production recipe run by smelters, assemblers and ammo modules.
///
/// # Example RON
///
/// ```ron
/// RecipeDef(
///     id: "smelt_iron",
///     inputs: [(item_id: "ore_iron", quantity: 2)],
///     outputs: [(item_id: "plate_iron", quantity: 1)],
///     duration_ticks: 40,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDef {
    /// Unique recipe id.
    pub id: String,
    /// Consumed on completion.
    pub inputs: Vec<ItemStack>,
    /// Produced on completion.
    pub outputs: Vec<ItemStack>,
    /// Full-power production time in ticks.
    pub duration_ticks: u32,
}

impl RecipeDef {
    /// Create a recipe.
    #[must_use]
    pub fn new(id: &str, inputs: &[(&str, u32)], outputs: &[(&str, u32)], duration_ticks: u32) -> Self {
        Self {
            id: id.to_string(),
            inputs: inputs.iter().map(|&(item, qty)| ItemStack::new(item, qty)).collect(),
            outputs: outputs.iter().map(|&(item, qty)| ItemStack::new(item, qty)).collect(),
            duration_ticks,
        }
    }

    /// Whether the recipe produces `item_id`.
    #[must_use]
    pub fn outputs_item(&self, item_id: &str) -> bool {
        self.outputs.iter().any(|stack| stack.item_id == item_id)
    }

    /// Total number of output items per completion.
    #[must_use]
    pub fn output_count(&self) -> u32 {
        self.outputs.iter().map(|stack| stack.quantity).sum()
    }
}
