//! Applies player commands.
//!
//! The only system that creates or destroys structures on player intent.
//! Rejections never mutate state: placements are validated against the
//! current world (growing a staged copy of it when the board must expand)
//! and the build cost is taken exactly once, after validation succeeds.

use crate::commands::{BuildRequest, CommandPayload, PlayerCommand};
use crate::components::{Direction, EntityId};
use crate::economy::{buffer_count, buffer_take, ConveyorIo};
use crate::entity_store::StructureSpawn;
use crate::events::EventKind;
use crate::ore::RingState;
use crate::placement::{plan_placement, PlacementResult};
use crate::structures::StructureType;
use crate::world::{RunPhase, WorldState};

use super::{SimulationSystem, SystemContext};

/// Drains due commands into world mutations.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandSystem;

impl SimulationSystem for CommandSystem {
    fn name(&self) -> &'static str {
        "command"
    }

    fn update(&mut self, world: &mut WorldState, ctx: &mut SystemContext<'_>) {
        for command in std::mem::take(&mut ctx.commands) {
            apply_command(world, ctx, command);
        }
    }
}

fn apply_command(world: &mut WorldState, ctx: &mut SystemContext<'_>, command: PlayerCommand) {
    match command.payload {
        CommandPayload::PlaceStructure(request) => {
            place_structure(world, ctx, &request, true);
        }
        CommandPayload::RemoveStructure { entity_id } => remove_structure(world, ctx, entity_id),
        CommandPayload::PlaceConveyor { position, direction } => {
            let request = BuildRequest::new(StructureType::Conveyor, position).with_rotation(direction);
            place_structure(world, ctx, &request, false);
        }
        CommandPayload::RotateBuilding { entity_id, rotation } => rotate_building(world, entity_id, rotation),
        CommandPayload::ConfigureConveyorIo {
            entity_id,
            input,
            output,
        } => configure_conveyor_io(world, entity_id, input, output),
        CommandPayload::PinRecipe { entity_id, recipe_id } => pin_recipe(world, entity_id, &recipe_id),
        CommandPayload::StartOreSurvey {
            node_id,
            research_center_id,
        } => start_ore_survey(world, ctx, &node_id, research_center_id),
        CommandPayload::TriggerWave => trigger_wave(world, ctx),
        CommandPayload::Extract => {
            if !world.run.extracted {
                world.run.extracted = true;
                tracing::info!(tick = ctx.tick, "Run extracted");
                ctx.emit(ctx.event(EventKind::RunExtracted));
            }
        }
    }
}

fn reject(ctx: &mut SystemContext<'_>, result: PlacementResult, entity: Option<EntityId>, detail: &str) {
    tracing::debug!(tick = ctx.tick, code = result.token(), detail, "Command rejected");
    let mut event = ctx
        .event(EventKind::PlacementRejected)
        .with_value(i64::from(result.code()))
        .with_detail(detail);
    if let Some(entity) = entity {
        event = event.with_entity(entity);
    }
    ctx.emit(event);
}

/// Validate, pay for and spawn a structure. Returns the new id.
fn place_structure(
    world: &mut WorldState,
    ctx: &mut SystemContext<'_>,
    request: &BuildRequest,
    charge: bool,
) -> Option<EntityId> {
    let structure_type = request.structure_type;
    let detail = structure_type.token();
    if !structure_type.is_buildable() {
        reject(ctx, PlacementResult::RestrictedZone, None, detail);
        return None;
    }

    let footprint = structure_type.covered_cells(request.position.flattened());
    let Some(insets) = world.board.planned_expansion(&footprint, &ctx.config.growth) else {
        reject(ctx, PlacementResult::OutOfBounds, None, detail);
        return None;
    };

    // Growth only sticks if the placement succeeds.
    let mut staged = None;
    let mut position = request.position;
    if !insets.is_empty() {
        let mut grown = world.clone();
        grown.apply_expansion(&insets);
        let (dx, dy) = insets.shift();
        position = position.translated(dx, dy);
        staged = Some(grown);
    }
    let target = staged.as_mut().unwrap_or(&mut *world);

    let plan = match plan_placement(target, structure_type, position, request.target_patch_id) {
        Ok(plan) => plan,
        Err(result) => {
            reject(ctx, result, None, detail);
            return None;
        }
    };
    if charge && !target.economy.consume_costs(structure_type.build_cost()) {
        reject(ctx, PlacementResult::InsufficientResources, None, detail);
        return None;
    }

    let mut spawn = StructureSpawn::new(structure_type, plan.anchor).with_rotation(request.rotation);
    if let Some(patch) = plan.bound_patch_id {
        spawn = spawn.bound_to(patch);
    }
    if let Some(wall) = plan.host_wall_id {
        spawn = spawn.on_wall(wall);
    }
    if structure_type == StructureType::TurretMount {
        spawn = spawn.with_turret(turret_def_for(ctx, request.turret_def_id.as_deref()));
    }
    let id = target.spawn_structure(spawn);

    if let Some(grown) = staged {
        *world = grown;
        tracing::info!(
            tick = ctx.tick,
            left = insets.left,
            top = insets.top,
            right = insets.right,
            bottom = insets.bottom,
            width = world.board.width,
            height = world.board.height,
            "Board expanded"
        );
        ctx.emit(
            ctx.event(EventKind::BoardExpanded)
                .with_value(i64::from(world.board.width) * 10_000 + i64::from(world.board.height))
                .with_detail(format!(
                    "{},{},{},{}",
                    insets.left, insets.top, insets.right, insets.bottom
                )),
        );
    }

    tracing::debug!(tick = ctx.tick, id, structure = detail, x = plan.anchor.x, y = plan.anchor.y, "Structure placed");
    ctx.emit(
        ctx.event(EventKind::StructurePlaced)
            .with_entity(id)
            .with_detail(detail),
    );
    Some(id)
}

/// Requested turret if it exists, else the configured default, else the
/// content default.
fn turret_def_for(ctx: &SystemContext<'_>, requested: Option<&str>) -> String {
    requested
        .into_iter()
        .chain(ctx.config.combat.default_turret_id.as_deref())
        .find(|id| ctx.content.turret(id).is_ok())
        .unwrap_or(ctx.content.default_turret_id.as_str())
        .to_string()
}

fn remove_structure(world: &mut WorldState, ctx: &mut SystemContext<'_>, entity_id: EntityId) {
    let Some(structure_type) = world.entities.get(entity_id).and_then(|entity| entity.structure_type) else {
        reject(ctx, PlacementResult::InvalidRemoval, Some(entity_id), "missing");
        return;
    };
    if structure_type == StructureType::Hq {
        reject(ctx, PlacementResult::InvalidRemoval, Some(entity_id), structure_type.token());
        return;
    }
    let hosts_turret = world
        .entities
        .structures_of(StructureType::TurretMount)
        .any(|turret| turret.host_wall_id == Some(entity_id));
    if hosts_turret {
        reject(ctx, PlacementResult::InvalidRemoval, Some(entity_id), structure_type.token());
        return;
    }

    for &(item_id, quantity) in structure_type.build_cost() {
        world.economy.add_inventory(item_id, quantity.div_ceil(2));
    }
    for removed in world.remove_structure(entity_id) {
        ctx.emit(
            ctx.event(EventKind::StructureRemoved)
                .with_entity(removed.id)
                .with_detail(structure_type.token()),
        );
    }
}

fn rotate_building(world: &mut WorldState, entity_id: EntityId, rotation: Direction) {
    match world.entities.get_mut(entity_id) {
        Some(entity) if entity.structure_type.is_some_and(StructureType::is_buildable) => {
            entity.rotation = rotation;
        }
        _ => tracing::debug!(entity_id, "Rotate ignored"),
    }
}

fn configure_conveyor_io(world: &mut WorldState, entity_id: EntityId, input: Direction, output: Direction) {
    let is_transport = world
        .entities
        .get(entity_id)
        .and_then(|entity| entity.structure_type)
        .is_some_and(StructureType::is_transport);
    if !is_transport || input == output {
        tracing::debug!(entity_id, "Conveyor IO ignored");
        return;
    }
    world.economy.conveyor_io.insert(entity_id, ConveyorIo { input, output });
}

fn pin_recipe(world: &mut WorldState, entity_id: EntityId, recipe_id: &str) {
    let supported = world
        .entities
        .get(entity_id)
        .and_then(|entity| entity.structure_type)
        .is_some_and(|structure| structure.supports_recipe(recipe_id));
    if !supported {
        tracing::debug!(entity_id, recipe_id, "Pin rejected");
        return;
    }
    let previous = world.economy.pinned_recipes.insert(entity_id, recipe_id.to_string());
    if previous.as_deref() != Some(recipe_id) {
        world.economy.production.remove(&entity_id);
    }
}

fn start_ore_survey(world: &mut WorldState, ctx: &mut SystemContext<'_>, node_id: &str, research_center_id: EntityId) {
    let content = ctx.content;
    let Ok(node) = content.tech_node(node_id) else {
        tracing::debug!(node_id, "Survey rejected: unknown node");
        return;
    };
    let Some(ring) = node.survey_ring else {
        tracing::debug!(node_id, "Survey rejected: not a survey node");
        return;
    };
    if world.ore_lifecycle.ring_state(ring) != RingState::Locked {
        tracing::debug!(node_id, ring, "Survey rejected: ring not locked");
        return;
    }
    let is_center = world
        .entities
        .get(research_center_id)
        .is_some_and(|entity| entity.is_structure(StructureType::ResearchCenter));
    if !is_center {
        tracing::debug!(node_id, research_center_id, "Survey rejected: no research center");
        return;
    }
    if !node
        .prerequisites
        .iter()
        .all(|prerequisite| world.run.completed_tech.contains(prerequisite))
    {
        tracing::debug!(node_id, "Survey rejected: prerequisites missing");
        return;
    }
    let Some(buffer) = world.economy.input_buffers.get_mut(&research_center_id) else {
        return;
    };
    if !node
        .costs
        .iter()
        .all(|cost| buffer_count(buffer, &cost.item_id) >= cost.quantity)
    {
        tracing::debug!(node_id, "Survey rejected: research center lacks items");
        return;
    }
    for cost in &node.costs {
        buffer_take(buffer, &cost.item_id, cost.quantity);
    }
    for cost in &node.costs {
        world.economy.record_consumed(&cost.item_id, cost.quantity);
    }

    let end_tick = ctx.tick + u64::from(node.duration_ticks);
    world.ore_lifecycle.advance_ring(ring, RingState::Surveying);
    world.ore_lifecycle.survey_end_tick_by_ring.insert(ring, end_tick);
    world.ore_lifecycle.survey_node_by_ring.insert(ring, node.id.clone());
    tracing::info!(tick = ctx.tick, ring, end_tick, node_id, "Ring survey started");
    ctx.emit(
        ctx.event(EventKind::RingSurveyStarted)
            .with_entity(research_center_id)
            .with_value(i64::from(ring))
            .with_detail(node.id.clone()),
    );
}

fn trigger_wave(world: &mut WorldState, ctx: &mut SystemContext<'_>) {
    if world.run.phase == RunPhase::GameOver || world.run.extracted {
        tracing::debug!(tick = ctx.tick, "Trigger wave ignored");
        return;
    }
    let threat = &mut world.threat;
    if world.run.phase == RunPhase::GracePeriod {
        world.run.phase = RunPhase::Playing;
        threat.grace_ends_at_tick = ctx.tick;
        threat.next_trickle_tick = ctx.tick + threat.trickle_interval_ticks;
        threat.raid_cooldown_until_tick = ctx.tick;
        tracing::info!(tick = ctx.tick, "Grace period ended early");
        ctx.emit(ctx.event(EventKind::GracePeriodEnded));
    }
    if !threat.is_wave_active {
        threat.next_wave_tick = ctx.tick;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{items, GridPosition};
    use crate::config::SimulationConfig;
    use crate::data::{ContentBundle, Difficulty};
    use crate::events::SimEvent;

    fn run_commands(world: &mut WorldState, commands: Vec<CommandPayload>) -> Vec<SimEvent> {
        let content = ContentBundle::standard();
        let config = SimulationConfig::default();
        let commands = commands
            .into_iter()
            .map(|payload| PlayerCommand::new(world.tick, payload))
            .collect();
        let mut ctx = SystemContext::new(world.tick, &content, &config, commands);
        CommandSystem.update(world, &mut ctx);
        ctx.events
    }

    fn world() -> WorldState {
        WorldState::bootstrap(&ContentBundle::standard(), Difficulty::Normal, 7)
    }

    fn place(structure_type: StructureType, x: i32, y: i32) -> CommandPayload {
        CommandPayload::PlaceStructure(BuildRequest::new(structure_type, GridPosition::new(x, y)))
    }

    #[test]
    fn test_cost_paid_once_on_success() {
        let mut world = world();
        let kits = world.economy.inventory(items::WALL_KIT);
        let events = run_commands(&mut world, vec![place(StructureType::Wall, 30, 40)]);
        assert_eq!(events[0].kind, EventKind::StructurePlaced);
        assert_eq!(world.economy.inventory(items::WALL_KIT), kits - 1);
    }

    #[test]
    fn test_rejection_leaves_inventory() {
        let mut world = world();
        let before = world.economy.clone();
        let events = run_commands(&mut world, vec![place(StructureType::Wall, 40, 32)]);
        assert_eq!(events[0].kind, EventKind::PlacementRejected);
        assert_eq!(events[0].value, Some(i64::from(PlacementResult::RestrictedZone.code())));
        assert_eq!(world.economy, before);
    }

    #[test]
    fn test_insufficient_resources() {
        let mut world = world();
        world.economy.inventories.clear();
        let events = run_commands(&mut world, vec![place(StructureType::Wall, 30, 40)]);
        assert_eq!(events[0].value, Some(i64::from(PlacementResult::InsufficientResources.code())));
        assert!(world.entities.structure_at(GridPosition::new(30, 40)).is_none());
    }

    #[test]
    fn test_edge_placement_grows_board() {
        let mut world = world();
        let events = run_commands(&mut world, vec![place(StructureType::Wall, 6, 1)]);
        assert_eq!(events[0].kind, EventKind::BoardExpanded);
        assert_eq!(events[1].kind, EventKind::StructurePlaced);
        assert_eq!((world.board.width, world.board.height), (112, 80));
        let wall = world.entities.get(events[1].entity.unwrap()).unwrap();
        assert_eq!(wall.position, GridPosition::new(22, 17));
    }

    #[test]
    fn test_rejected_growth_is_discarded() {
        let mut world = world();
        world.economy.inventories.clear();
        run_commands(&mut world, vec![place(StructureType::Wall, 6, 1)]);
        assert_eq!((world.board.width, world.board.height), (96, 64));
    }

    #[test]
    fn test_remove_refunds_half() {
        let mut world = world();
        world.economy.add_inventory(items::PLATE_IRON, 10);
        world.economy.add_inventory(items::GEAR, 10);
        let events = run_commands(&mut world, vec![place(StructureType::Splitter, 30, 40)]);
        let id = events[0].entity.unwrap();
        let iron = world.economy.inventory(items::PLATE_IRON);
        let events = run_commands(&mut world, vec![CommandPayload::RemoveStructure { entity_id: id }]);
        assert_eq!(events[0].kind, EventKind::StructureRemoved);
        assert_eq!(world.economy.inventory(items::PLATE_IRON), iron + 1);
        assert!(!world.entities.contains(id));
    }

    #[test]
    fn test_refund_rounds_half_up() {
        let mut world = world();
        let events = run_commands(&mut world, vec![place(StructureType::Wall, 30, 40)]);
        let id = events[0].entity.unwrap();
        let kits = world.economy.inventory(items::WALL_KIT);
        run_commands(&mut world, vec![CommandPayload::RemoveStructure { entity_id: id }]);
        assert_eq!(world.economy.inventory(items::WALL_KIT), kits + 1);
    }

    #[test]
    fn test_hq_and_hosting_wall_cannot_be_removed() {
        let mut world = world();
        let hq = world.run.hq_entity_id.unwrap();
        let wall = world
            .entities
            .structure_of_type_at(StructureType::Wall, GridPosition::new(43, 31))
            .unwrap()
            .id;
        let events = run_commands(
            &mut world,
            vec![
                CommandPayload::RemoveStructure { entity_id: hq },
                CommandPayload::RemoveStructure { entity_id: wall },
            ],
        );
        assert!(events
            .iter()
            .all(|e| e.value == Some(i64::from(PlacementResult::InvalidRemoval.code()))));
        assert!(world.entities.contains(hq) && world.entities.contains(wall));
    }

    #[test]
    fn test_pin_recipe_rejects_unsupported() {
        let mut world = world();
        let smelter = world.entities.structure_ids_of(StructureType::Smelter)[0];
        let events = run_commands(
            &mut world,
            vec![CommandPayload::PinRecipe {
                entity_id: smelter,
                recipe_id: "forge_gear".into(),
            }],
        );
        assert!(events.is_empty());
        assert_eq!(world.economy.pinned_recipes[&smelter], "smelt_iron");

        run_commands(
            &mut world,
            vec![CommandPayload::PinRecipe {
                entity_id: smelter,
                recipe_id: "smelt_copper".into(),
            }],
        );
        assert_eq!(world.economy.pinned_recipes[&smelter], "smelt_copper");
    }

    #[test]
    fn test_survey_needs_buffered_items() {
        let mut world = world();
        world.economy.add_inventory(items::PLATE_STEEL, 4);
        world.economy.add_inventory(items::CIRCUIT, 2);
        world.economy.add_inventory(items::GEAR, 2);
        let events = run_commands(&mut world, vec![place(StructureType::ResearchCenter, 30, 44)]);
        let center = events[0].entity.unwrap();
        let survey = CommandPayload::StartOreSurvey {
            node_id: "geology_survey_1".into(),
            research_center_id: center,
        };

        assert!(run_commands(&mut world, vec![survey.clone()]).is_empty());
        assert_eq!(world.ore_lifecycle.ring_state(1), RingState::Locked);

        world
            .economy
            .input_buffers
            .get_mut(&center)
            .unwrap()
            .insert(items::GEAR.to_string(), 12);
        let events = run_commands(&mut world, vec![survey]);
        assert_eq!(events[0].kind, EventKind::RingSurveyStarted);
        assert_eq!(world.ore_lifecycle.ring_state(1), RingState::Surveying);
        assert_eq!(world.ore_lifecycle.survey_end_tick_by_ring[&1], 360);
        assert!(world.economy.input_buffers[&center].is_empty());
    }

    #[test]
    fn test_trigger_wave_ends_grace() {
        let mut world = world();
        let events = run_commands(&mut world, vec![CommandPayload::TriggerWave]);
        assert_eq!(events[0].kind, EventKind::GracePeriodEnded);
        assert_eq!(world.run.phase, RunPhase::Playing);
        assert_eq!(world.threat.next_wave_tick, 0);
    }
}
