//! Enemy stepping, structure attacks and base arrival.
//!
//! Enemies follow an A* route to the base over a siege grid where structure
//! cells are passable at `wall_breach_cost` extra. When the next cell on the
//! route holds a blocking structure the enemy attacks it instead of moving.

use crate::components::{EntityId, GridPosition};
use crate::events::EventKind;
use crate::pathfinding::{find_path, NavGrid};
use crate::world::{RunPhase, WorldState};

use super::{SimulationSystem, SystemContext};

/// Moves enemies on their cadence.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnemyMovementSystem;

impl SimulationSystem for EnemyMovementSystem {
    fn name(&self) -> &'static str {
        "enemy_movement"
    }

    fn update(&mut self, world: &mut WorldState, ctx: &mut SystemContext<'_>) {
        if world.run.phase == RunPhase::GameOver {
            return;
        }
        let movers: Vec<EntityId> = world
            .combat
            .enemies
            .iter()
            .filter(|(_, enemy)| ctx.tick % u64::from(enemy.move_every_ticks.max(1)) == 0)
            .map(|(&id, _)| id)
            .collect();
        if movers.is_empty() {
            return;
        }

        let breach_cost = Some(ctx.config.combat.wall_breach_cost);
        let mut grid = NavGrid::from_world(world);
        for id in movers {
            let Some(position) = world.entities.get(id).map(|enemy| enemy.position) else {
                continue;
            };
            let Some(path) = find_path(&grid, position, world.board.base, breach_cost) else {
                tracing::trace!(enemy = id, "No route to base");
                continue;
            };
            let next = path.first().copied().unwrap_or(world.board.base);

            if is_base_cell(world, next) {
                if reach_base(world, ctx, id) {
                    return;
                }
                continue;
            }
            if let Some(blocker) = world.entities.blocking_structure_at(next).map(|entity| entity.id) {
                if attack_structure(world, ctx, id, blocker) {
                    grid = NavGrid::from_world(world);
                }
                continue;
            }
            if let Some(enemy) = world.entities.get_mut(id) {
                enemy.position = world.board.elevated(next.x, next.y);
            }
        }
    }
}

fn is_base_cell(world: &WorldState, cell: GridPosition) -> bool {
    cell.same_cell(world.board.base) || world.hq().is_some_and(|hq| hq.covers(cell))
}

/// Damage the HQ and retire the enemy. Returns `true` when the run ended.
fn reach_base(world: &mut WorldState, ctx: &mut SystemContext<'_>, id: EntityId) -> bool {
    let damage = world.combat.enemies.get(&id).map_or(0, |enemy| enemy.base_damage);
    world.remove_unit(id);
    world.threat.telemetry.enemies_reached_base += 1;
    ctx.emit(
        ctx.event(EventKind::EnemyReachedBase)
            .with_entity(id)
            .with_value(i64::from(damage)),
    );

    let Some(hq) = world.run.hq_entity_id.and_then(|hq| world.entities.get_mut(hq)) else {
        return false;
    };
    hq.health = hq.health.saturating_sub(damage);
    tracing::debug!(tick = ctx.tick, enemy = id, damage, hq_health = hq.health, "Enemy reached base");
    if hq.health > 0 {
        return false;
    }
    let hq_id = hq.id;
    world.run.phase = RunPhase::GameOver;
    tracing::warn!(tick = ctx.tick, wave = world.threat.wave_index, "HQ destroyed");
    ctx.emit(ctx.event(EventKind::GameOver).with_entity(hq_id));
    true
}

/// Hit a structure in the enemy's way. Returns `true` if it was destroyed.
fn attack_structure(world: &mut WorldState, ctx: &mut SystemContext<'_>, id: EntityId, target: EntityId) -> bool {
    let damage = world.combat.enemies.get(&id).map_or(0, |enemy| enemy.structure_damage);
    let token = world
        .entities
        .get(target)
        .and_then(|entity| entity.structure_type)
        .map_or("unknown", |structure_type| structure_type.token());
    let Some(remaining) = world.damage_structure(target, damage) else {
        return false;
    };
    ctx.emit(
        ctx.event(EventKind::StructureDamaged)
            .with_entity(target)
            .with_value(i64::from(damage))
            .with_detail(token),
    );
    if remaining > 0 {
        return false;
    }
    tracing::info!(tick = ctx.tick, structure = target, kind = token, "Structure destroyed");
    ctx.emit(
        ctx.event(EventKind::StructureDestroyed)
            .with_entity(target)
            .with_detail(token),
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardState;
    use crate::combat::EnemyRuntime;
    use crate::config::SimulationConfig;
    use crate::data::{ContentBundle, Difficulty};
    use crate::entity_store::StructureSpawn;
    use crate::events::SimEvent;
    use crate::structures::StructureType;

    fn corridor(hq_health: u32) -> WorldState {
        let mut world = WorldState::new(
            BoardState::new(10, 5, GridPosition::new(1, 2), 8, (0, 4)),
            Difficulty::Normal,
            3,
        );
        let hq = world.spawn_structure(
            StructureSpawn::new(StructureType::Hq, GridPosition::new(1, 2)).with_health(hq_health),
        );
        world.run.hq_entity_id = Some(hq);
        world.run.phase = RunPhase::Playing;
        world
    }

    fn enemy(world: &mut WorldState, x: i32, y: i32, structure_damage: u32) -> EntityId {
        let id = world.entities.spawn_enemy(GridPosition::new(x, y), 20);
        world.combat.enemies.insert(
            id,
            EnemyRuntime {
                enemy_def_id: "scout".into(),
                wave_number: 1,
                move_every_ticks: 1,
                base_damage: 8,
                structure_damage,
                reward: 2,
            },
        );
        id
    }

    fn step(world: &mut WorldState) -> Vec<SimEvent> {
        let content = ContentBundle::standard();
        let config = SimulationConfig::default();
        let mut ctx = SystemContext::new(world.tick, &content, &config, Vec::new());
        EnemyMovementSystem.update(world, &mut ctx);
        world.tick += 1;
        ctx.events
    }

    #[test]
    fn test_enemy_steps_toward_base() {
        let mut world = corridor(100);
        let id = enemy(&mut world, 6, 2, 4);
        step(&mut world);
        assert_eq!(world.entities.get(id).unwrap().position, GridPosition::new(5, 2));
    }

    #[test]
    fn test_cadence_gates_movement() {
        let mut world = corridor(100);
        let id = enemy(&mut world, 6, 2, 4);
        world.combat.enemies.get_mut(&id).unwrap().move_every_ticks = 4;
        world.tick = 1;
        step(&mut world);
        assert_eq!(world.entities.get(id).unwrap().position, GridPosition::new(6, 2));
        world.tick = 4;
        step(&mut world);
        assert_eq!(world.entities.get(id).unwrap().position, GridPosition::new(5, 2));
    }

    #[test]
    fn test_arrival_damages_hq() {
        let mut world = corridor(100);
        let id = enemy(&mut world, 2, 2, 4);
        let events = step(&mut world);
        assert_eq!(events[0].kind, EventKind::EnemyReachedBase);
        assert!(!world.entities.contains(id));
        assert!(!world.combat.enemies.contains_key(&id));
        assert_eq!(world.hq().unwrap().health, 92);
        assert_eq!(world.threat.telemetry.enemies_reached_base, 1);
    }

    #[test]
    fn test_hq_at_zero_ends_run() {
        let mut world = corridor(5);
        enemy(&mut world, 2, 2, 4);
        let second = enemy(&mut world, 2, 1, 4);
        let events = step(&mut world);
        let kinds: Vec<EventKind> = events.iter().map(|event| event.kind).collect();
        assert_eq!(kinds, vec![EventKind::EnemyReachedBase, EventKind::GameOver]);
        assert_eq!(world.run.phase, RunPhase::GameOver);
        // Nothing moves after the HQ falls.
        assert!(world.entities.contains(second));
        assert!(step(&mut world).is_empty());
    }

    #[test]
    fn test_sealed_wall_is_attacked_then_breached() {
        let mut world = corridor(100);
        let walls: Vec<EntityId> = (0..5)
            .map(|y| world.spawn_structure(StructureSpawn::new(StructureType::Wall, GridPosition::new(4, y))))
            .collect();
        let id = enemy(&mut world, 5, 2, 150);

        let events = step(&mut world);
        assert_eq!(events[0].kind, EventKind::StructureDamaged);
        assert_eq!(events[0].entity, Some(walls[2]));
        assert_eq!(world.entities.get(walls[2]).unwrap().health, 50);
        assert_eq!(world.entities.get(id).unwrap().position, GridPosition::new(5, 2));

        let events = step(&mut world);
        assert_eq!(events[1].kind, EventKind::StructureDestroyed);
        assert!(!world.entities.contains(walls[2]));

        step(&mut world);
        assert_eq!(world.entities.get(id).unwrap().position, GridPosition::new(4, 2));
    }
}
