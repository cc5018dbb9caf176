//! Power, extraction, production and logistics.
//!
//! Order within a tick: wall networks are synced to the wall layout, power
//! efficiency is computed, miners extract, pinned recipes advance, transport
//! tiles move their payloads, output buffers drain into neighbours and
//! finally wall networks are topped up from the global ammo stock.

use crate::components::{items, Direction, EntityId, GridPosition, PatchId};
use crate::config::SimulationConfig;
use crate::data::RecipeDef;
use crate::economy::{
    buffer_add, buffer_count, buffer_take, buffer_total, ConveyorPayload, EconomyState, ProductionProgress,
};
use crate::events::EventKind;
use crate::math::{ratio, Fixed};
use crate::ore::{OrePatch, RenewalRequest};
use crate::structures::{StructureType, POWER_PLANT_OUTPUT, STORAGE_POOL_CAPACITY};
use crate::world::WorldState;

use super::{SimulationSystem, SystemContext};

/// Runs the factory for one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct EconomySystem;

impl SimulationSystem for EconomySystem {
    fn name(&self) -> &'static str {
        "economy"
    }

    fn update(&mut self, world: &mut WorldState, ctx: &mut SystemContext<'_>) {
        sync_wall_networks(world, ctx.config);
        update_power(world);
        run_miners(world, ctx);
        run_production(world, ctx);
        run_transports(world, ctx.config);
        drain_outputs(world);
        resupply_networks(world, ctx.config);
    }
}

/// Whether a miner bound to `patch_id` has anything to extract.
#[must_use]
pub fn miner_has_ore(world: &WorldState, patch_id: Option<PatchId>) -> bool {
    patch_id
        .and_then(|id| world.ore_patches.get(&id))
        .is_some_and(OrePatch::is_minable)
}

/// Whether `structure_id` holds, or may draw, every input of `recipe`.
///
/// The local input buffer counts in full. Global stock only counts above the
/// reserve floor for the item, unless the recipe is exempt or produces the
/// item itself.
#[must_use]
pub fn recipe_inputs_available(
    economy: &EconomyState,
    config: &SimulationConfig,
    recipe: &RecipeDef,
    structure_id: EntityId,
) -> bool {
    let local = economy.input_buffers.get(&structure_id);
    recipe.inputs.iter().all(|stack| {
        let held = local.map_or(0, |buffer| buffer_count(buffer, &stack.item_id));
        held + global_allowance(economy, config, recipe, &stack.item_id) >= stack.quantity
    })
}

fn global_allowance(economy: &EconomyState, config: &SimulationConfig, recipe: &RecipeDef, item_id: &str) -> u32 {
    let floor = config
        .economy
        .floor_for(&recipe.id, recipe.outputs_item(item_id), item_id);
    economy.inventory(item_id).saturating_sub(floor)
}

fn consume_recipe_inputs(economy: &mut EconomyState, recipe: &RecipeDef, structure_id: EntityId) {
    for stack in &recipe.inputs {
        let local = economy
            .input_buffers
            .get_mut(&structure_id)
            .map_or(0, |buffer| buffer_take(buffer, &stack.item_id, stack.quantity));
        if local < stack.quantity {
            buffer_take(&mut economy.inventories, &stack.item_id, stack.quantity - local);
        }
        economy.record_consumed(&stack.item_id, stack.quantity);
    }
}

fn sync_wall_networks(world: &mut WorldState, config: &SimulationConfig) {
    let Some(spill) = world
        .combat
        .rebuild_wall_networks(&world.entities, config.economy.ammo_per_wall)
    else {
        return;
    };
    tracing::debug!(
        networks = world.combat.wall_networks.len(),
        spilled = buffer_total(&spill),
        "Wall networks rebuilt"
    );
    for (item_id, quantity) in spill {
        world.economy.add_inventory(&item_id, quantity);
    }
}

fn update_power(world: &mut WorldState) {
    let mut supply = 0u32;
    let mut demand = 0u32;
    for structure in world.entities.structures() {
        match structure.structure_type {
            Some(StructureType::PowerPlant) => supply += POWER_PLANT_OUTPUT,
            // Idle miners draw nothing.
            Some(StructureType::Miner) if !miner_has_ore(world, structure.bound_patch_id) => {}
            Some(structure_type) => demand += structure_type.power_demand(),
            None => {}
        }
    }
    world.economy.power_supply = supply;
    world.economy.power_demand = demand;
    world.economy.power_efficiency = if demand == 0 || supply >= demand {
        Fixed::ONE
    } else {
        ratio(i64::from(supply), i64::from(demand))
    };
}

fn run_miners(world: &mut WorldState, ctx: &mut SystemContext<'_>) {
    let per_unit = Fixed::from_num(ctx.config.economy.miner_ticks_per_unit.max(1));
    let efficiency = world.economy.power_efficiency;
    let capacity = StructureType::Miner.output_capacity();
    let miners: Vec<(EntityId, Option<PatchId>)> = world
        .entities
        .structures_of(StructureType::Miner)
        .map(|miner| (miner.id, miner.bound_patch_id))
        .collect();

    for (miner, patch_id) in miners {
        let Some(patch_id) = patch_id else {
            continue;
        };
        if !miner_has_ore(world, Some(patch_id)) {
            continue;
        }
        let held = world.economy.output_buffers.get(&miner).map_or(0, buffer_total);
        if held >= capacity {
            continue;
        }
        let progress = world.economy.production.entry(miner).or_default();
        progress.elapsed += efficiency;
        if progress.elapsed < per_unit {
            continue;
        }
        progress.elapsed -= per_unit;

        let Some(patch) = world.ore_patches.get_mut(&patch_id) else {
            continue;
        };
        patch.remaining_ore -= 1;
        let item_id = patch.ore_item_id.clone();
        let mut renewal = None;
        if patch.remaining_ore == 0 {
            patch.exhausted_at_tick = Some(ctx.tick);
            if !patch.renewal_queued {
                patch.renewal_queued = true;
                renewal = Some(RenewalRequest {
                    source_patch_id: patch_id,
                    ore_item_id: item_id.clone(),
                    richness: patch.richness,
                    skip_count: 0,
                });
            }
        }
        let exhausted = patch.remaining_ore == 0;

        buffer_add(world.economy.output_buffers.entry(miner).or_default(), &item_id, 1);
        world.economy.record_produced(&item_id, 1);

        if exhausted {
            if let Some(request) = renewal {
                world.ore_lifecycle.renewal_queue.push_back(request);
            }
            tracing::info!(tick = ctx.tick, miner, patch = patch_id, item = %item_id, "Patch exhausted");
            let patch_value = patch_id as i64;
            ctx.emit(
                ctx.event(EventKind::PatchExhausted)
                    .with_entity(miner)
                    .with_value(patch_value)
                    .with_item(item_id.clone()),
            );
            ctx.emit(
                ctx.event(EventKind::MinerIdled)
                    .with_entity(miner)
                    .with_value(patch_value)
                    .with_item(item_id),
            );
        }
    }
}

fn run_production(world: &mut WorldState, ctx: &SystemContext<'_>) {
    let efficiency = world.economy.power_efficiency;
    let pinned: Vec<(EntityId, String)> = world
        .economy
        .pinned_recipes
        .iter()
        .map(|(&id, recipe_id)| (id, recipe_id.clone()))
        .collect();

    for (id, recipe_id) in pinned {
        let Some(structure_type) = world.entities.get(id).and_then(|entity| entity.structure_type) else {
            continue;
        };
        let Ok(recipe) = ctx.content.recipe(&recipe_id) else {
            continue;
        };
        let satisfiable = recipe_inputs_available(&world.economy, ctx.config, recipe, id);
        let progress = world.economy.production.entry(id).or_default();
        if !satisfiable {
            *progress = ProductionProgress::default();
            continue;
        }
        // The tick a cycle starts only arms it.
        if progress.recipe_id.as_deref() != Some(recipe.id.as_str()) {
            progress.recipe_id = Some(recipe.id.clone());
            progress.elapsed = Fixed::ZERO;
            continue;
        }
        let duration = Fixed::from_num(recipe.duration_ticks);
        if progress.elapsed < duration {
            progress.elapsed += efficiency;
        }
        if progress.elapsed < duration {
            continue;
        }

        let held = world.economy.output_buffers.get(&id).map_or(0, buffer_total);
        if held + recipe.output_count() > structure_type.output_capacity() {
            continue;
        }
        consume_recipe_inputs(&mut world.economy, recipe, id);
        let output = world.economy.output_buffers.entry(id).or_default();
        for stack in &recipe.outputs {
            buffer_add(output, &stack.item_id, stack.quantity);
        }
        for stack in &recipe.outputs {
            world.economy.record_produced(&stack.item_id, stack.quantity);
        }
        if let Some(progress) = world.economy.production.get_mut(&id) {
            progress.elapsed = Fixed::ZERO;
        }
        tracing::trace!(tick = ctx.tick, structure = id, recipe = %recipe.id, "Recipe completed");
    }
}

/// Directions a finished payload may leave through, in preference order.
fn transport_exits(economy: &EconomyState, id: EntityId, structure_type: StructureType, rotation: Direction) -> Vec<Direction> {
    match structure_type {
        StructureType::Splitter => {
            let left = rotation.rotated_counter_clockwise();
            let right = rotation.rotated_clockwise();
            if economy.transport_toggles.get(&id).copied().unwrap_or(false) {
                vec![right, left]
            } else {
                vec![left, right]
            }
        }
        StructureType::Conveyor => vec![economy.conveyor_io.get(&id).map_or(rotation, |io| io.output)],
        _ => vec![rotation],
    }
}

/// Offer one `item_id` to a structure from its `from_side`.
fn accept_item(
    economy: &mut EconomyState,
    id: EntityId,
    structure_type: StructureType,
    rotation: Direction,
    from_side: Direction,
    item_id: &str,
) -> bool {
    match structure_type {
        StructureType::Conveyor | StructureType::Splitter => {
            if economy.conveyor_payloads.contains_key(&id) {
                return false;
            }
            let accepts = match (structure_type, economy.conveyor_io.get(&id)) {
                (StructureType::Conveyor, Some(io)) => io.input == from_side,
                (StructureType::Conveyor, None) => from_side != rotation,
                _ => from_side == rotation.opposite(),
            };
            if !accepts {
                return false;
            }
            economy.conveyor_payloads.insert(id, ConveyorPayload::new(item_id));
            true
        }
        StructureType::Merger => false,
        StructureType::Storage => {
            let pool = economy.storage_pools.entry(id).or_default();
            if buffer_total(pool) >= STORAGE_POOL_CAPACITY {
                return false;
            }
            buffer_add(pool, item_id, 1);
            true
        }
        _ => {
            let capacity = structure_type.input_capacity();
            if capacity == 0 || !structure_type.accepts_input(item_id) || !structure_type.accepts_from(from_side) {
                return false;
            }
            let buffer = economy.input_buffers.entry(id).or_default();
            if buffer_total(buffer) >= capacity {
                return false;
            }
            buffer_add(buffer, item_id, 1);
            true
        }
    }
}

/// Push one item from `from` into whatever sits one cell toward `direction`.
fn push_item(world: &mut WorldState, from: GridPosition, direction: Direction, item_id: &str) -> bool {
    let cell = from.flattened().neighbor(direction);
    let Some((target, structure_type, rotation)) = world
        .entities
        .structure_at(cell)
        .and_then(|entity| Some((entity.id, entity.structure_type?, entity.rotation)))
    else {
        return false;
    };
    accept_item(&mut world.economy, target, structure_type, rotation, direction.opposite(), item_id)
}

fn run_transports(world: &mut WorldState, config: &SimulationConfig) {
    let transit = config.economy.conveyor_transit_ticks.max(1);
    let transports: Vec<(EntityId, StructureType, GridPosition, Direction)> = world
        .entities
        .structures()
        .filter_map(|entity| {
            let structure_type = entity.structure_type.filter(|t| t.is_transport())?;
            Some((entity.id, structure_type, entity.position, entity.rotation))
        })
        .collect();

    for (id, structure_type, position, rotation) in transports {
        if structure_type == StructureType::Merger && !world.economy.conveyor_payloads.contains_key(&id) {
            merger_pull(world, id, position, rotation, transit);
        }
        let Some(payload) = world.economy.conveyor_payloads.get_mut(&id) else {
            continue;
        };
        if payload.progress_ticks < transit {
            payload.progress_ticks += 1;
        }
        if payload.progress_ticks < transit {
            continue;
        }
        let item_id = payload.item_id.clone();
        for exit in transport_exits(&world.economy, id, structure_type, rotation) {
            if !push_item(world, position, exit, &item_id) {
                continue;
            }
            world.economy.conveyor_payloads.remove(&id);
            world.economy.telemetry.transport_moves += 1;
            if structure_type == StructureType::Splitter {
                // Next item prefers the side not just used.
                let used_left = exit == rotation.rotated_counter_clockwise();
                world.economy.transport_toggles.insert(id, used_left);
            }
            break;
        }
    }
}

/// Mergers pull from their preferred side, then the other one.
fn merger_pull(world: &mut WorldState, id: EntityId, position: GridPosition, rotation: Direction, transit: u32) {
    let left = rotation.rotated_counter_clockwise();
    let right = rotation.rotated_clockwise();
    let sides = if world.economy.transport_toggles.get(&id).copied().unwrap_or(false) {
        [right, left]
    } else {
        [left, right]
    };

    for side in sides {
        let Some(source) = world.entities.structure_at(position.flattened().neighbor(side)) else {
            continue;
        };
        let source_id = source.id;
        let from_transport = source.structure_type.is_some_and(StructureType::is_transport);
        let item = match source.structure_type {
            Some(source_type) if from_transport => {
                let heading = transport_exits(&world.economy, source_id, source_type, source.rotation);
                world
                    .economy
                    .conveyor_payloads
                    .get(&source_id)
                    .filter(|payload| payload.progress_ticks >= transit && heading.contains(&side.opposite()))
                    .map(|payload| payload.item_id.clone())
            }
            _ => world
                .economy
                .output_buffers
                .get(&source_id)
                .and_then(|buffer| buffer.keys().next().cloned()),
        };
        let Some(item_id) = item else {
            continue;
        };

        if from_transport {
            world.economy.conveyor_payloads.remove(&source_id);
        } else if let Some(buffer) = world.economy.output_buffers.get_mut(&source_id) {
            buffer_take(buffer, &item_id, 1);
        }
        world.economy.conveyor_payloads.insert(id, ConveyorPayload::new(item_id));
        world.economy.transport_toggles.insert(id, side == left);
        world.economy.telemetry.transport_moves += 1;
        return;
    }
}

/// Cell just beyond the footprint in the facing direction.
fn drain_cell(structure_type: StructureType, anchor: GridPosition, rotation: Direction) -> GridPosition {
    let (width, height) = structure_type.footprint();
    let anchor = anchor.flattened();
    match rotation {
        Direction::East => anchor.translated(1, 0),
        Direction::West => anchor.translated(-(width as i32), 0),
        Direction::North => anchor.translated(0, -(height as i32)),
        Direction::South => anchor.translated(0, 1),
    }
}

fn drain_outputs(world: &mut WorldState) {
    let producers: Vec<(EntityId, StructureType, GridPosition, Direction)> = world
        .entities
        .structures()
        .filter(|entity| {
            world
                .economy
                .output_buffers
                .get(&entity.id)
                .is_some_and(|buffer| !buffer.is_empty())
        })
        .filter_map(|entity| Some((entity.id, entity.structure_type?, entity.position, entity.rotation)))
        .collect();

    for (id, structure_type, anchor, rotation) in producers {
        let cell = drain_cell(structure_type, anchor, rotation);
        let target = world
            .entities
            .structure_at(cell)
            .and_then(|entity| Some((entity.id, entity.structure_type?, entity.rotation)));
        match target {
            None => {
                let drained = world
                    .economy
                    .output_buffers
                    .get_mut(&id)
                    .map(std::mem::take)
                    .unwrap_or_default();
                for (item_id, quantity) in drained {
                    world.economy.add_inventory(&item_id, quantity);
                }
            }
            Some((_, StructureType::Merger, _)) => {}
            Some((target_id, target_type, target_rotation)) => {
                let held: Vec<String> = world
                    .economy
                    .output_buffers
                    .get(&id)
                    .map(|buffer| buffer.keys().cloned().collect())
                    .unwrap_or_default();
                for item_id in held {
                    if accept_item(
                        &mut world.economy,
                        target_id,
                        target_type,
                        target_rotation,
                        rotation.opposite(),
                        &item_id,
                    ) {
                        if let Some(buffer) = world.economy.output_buffers.get_mut(&id) {
                            buffer_take(buffer, &item_id, 1);
                        }
                        break;
                    }
                }
            }
        }
    }
}

fn resupply_networks(world: &mut WorldState, config: &SimulationConfig) {
    let refill = config.economy.network_refill_per_tick;
    for network in world.combat.wall_networks.values_mut() {
        let mut budget = network.free_capacity().min(refill);
        if budget == 0 {
            continue;
        }
        let ammo: Vec<String> = world
            .economy
            .inventories
            .keys()
            .filter(|item_id| items::is_ammo(item_id))
            .cloned()
            .collect();
        for item_id in ammo {
            if budget == 0 {
                break;
            }
            let taken = buffer_take(&mut world.economy.inventories, &item_id, budget);
            buffer_add(&mut network.ammo_pool, &item_id, taken);
            budget -= taken;
        }
    }
}
