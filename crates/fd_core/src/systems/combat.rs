//! Turret targeting, ammo draw and firing.

use crate::combat::ProjectileRuntime;
use crate::components::{EntityId, GridPosition};
use crate::data::TurretDef;
use crate::economy::buffer_take;
use crate::events::EventKind;
use crate::math::Fixed;
use crate::structures::StructureType;
use crate::world::{RunPhase, WorldState};

use super::{SimulationSystem, SystemContext};

/// Where a shot's ammo came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AmmoSource {
    Local,
    Network,
}

impl AmmoSource {
    const fn token(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Network => "network",
        }
    }
}

/// Fires every turret that is due and has a target.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombatSystem;

impl SimulationSystem for CombatSystem {
    fn name(&self) -> &'static str {
        "combat"
    }

    fn update(&mut self, world: &mut WorldState, ctx: &mut SystemContext<'_>) {
        if world.run.phase == RunPhase::GameOver || world.combat.enemies.is_empty() {
            return;
        }
        let turrets: Vec<(EntityId, GridPosition, Option<EntityId>, Option<String>)> = world
            .entities
            .structures_of(StructureType::TurretMount)
            .map(|turret| (turret.id, turret.position, turret.host_wall_id, turret.turret_def_id.clone()))
            .collect();
        let enemies: Vec<(EntityId, GridPosition)> = world
            .entities
            .enemies()
            .map(|enemy| (enemy.id, enemy.position))
            .collect();

        for (turret, position, host_wall, def_id) in turrets {
            let Some(def) = resolve_turret(ctx, def_id.as_deref()) else {
                continue;
            };
            let cadence = def.ticks_per_shot(ctx.config.tick_rate);
            if let Some(&last) = world.combat.last_fire_tick.get(&turret) {
                if ctx.tick < last.saturating_add(cadence) {
                    continue;
                }
            }
            let range = ctx.config.combat.range_override.unwrap_or(def.range);
            let Some((target, target_position, distance)) = nearest_in_range(position, &enemies, range) else {
                continue;
            };

            world.combat.last_fire_tick.insert(turret, ctx.tick);
            let Some(source) = draw_ammo(world, turret, host_wall, &def.ammo_item_id) else {
                world.threat.telemetry.dry_fire_events += 1;
                tracing::trace!(tick = ctx.tick, turret, ammo = %def.ammo_item_id, "Dry fire");
                ctx.emit(
                    ctx.event(EventKind::NotEnoughAmmo)
                        .with_entity(turret)
                        .with_item(def.ammo_item_id.clone()),
                );
                continue;
            };

            let damage = ctx.config.combat.damage_override.unwrap_or(def.damage);
            let speed = ctx.config.combat.projectile_cells_per_tick.max(1);
            let flight = u64::from(distance.div_ceil(speed).max(1));
            let projectile = world.entities.spawn_projectile(position);
            world.combat.projectiles.insert(
                projectile,
                ProjectileRuntime {
                    source_turret_id: turret,
                    target_enemy_id: target,
                    damage,
                    ammo_item_id: def.ammo_item_id.clone(),
                    impact_tick: ctx.tick + flight,
                    target_last_position: target_position,
                },
            );
            ctx.emit(
                ctx.event(EventKind::AmmoSpent)
                    .with_entity(turret)
                    .with_value(1)
                    .with_item(def.ammo_item_id.clone())
                    .with_detail(source.token()),
            );
            ctx.emit(
                ctx.event(EventKind::ProjectileFired)
                    .with_entity(projectile)
                    .with_value(target as i64)
                    .with_item(def.ammo_item_id.clone()),
            );
        }
    }
}

/// The mount's own definition, then the configured default, then the
/// content default.
fn resolve_turret<'a>(ctx: &SystemContext<'a>, requested: Option<&str>) -> Option<&'a TurretDef> {
    let content = ctx.content;
    requested
        .into_iter()
        .chain(ctx.config.combat.default_turret_id.as_deref())
        .chain(std::iter::once(content.default_turret_id.as_str()))
        .find_map(|id| content.turret(id).ok())
}

/// Closest enemy within `range` (Manhattan), lowest id on ties.
fn nearest_in_range(
    origin: GridPosition,
    enemies: &[(EntityId, GridPosition)],
    range: Fixed,
) -> Option<(EntityId, GridPosition, u32)> {
    enemies
        .iter()
        .map(|&(id, position)| (id, position, origin.manhattan_distance(position)))
        .filter(|&(_, _, distance)| Fixed::from_num(distance) <= range)
        .min_by_key(|&(id, _, distance)| (distance, id))
}

/// Take one round from the turret's buffer, else from its wall network.
fn draw_ammo(world: &mut WorldState, turret: EntityId, host_wall: Option<EntityId>, ammo_item_id: &str) -> Option<AmmoSource> {
    if let Some(buffer) = world.economy.input_buffers.get_mut(&turret) {
        if buffer_take(buffer, ammo_item_id, 1) == 1 {
            return Some(AmmoSource::Local);
        }
    }
    let network = host_wall.and_then(|wall| world.combat.network_for_wall(wall))?;
    let pool = &mut world.combat.wall_networks.get_mut(&network)?.ammo_pool;
    (buffer_take(pool, ammo_item_id, 1) == 1).then_some(AmmoSource::Network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardState;
    use crate::combat::EnemyRuntime;
    use crate::components::items;
    use crate::config::SimulationConfig;
    use crate::data::{ContentBundle, Difficulty};
    use crate::economy::{buffer_add, buffer_count};
    use crate::entity_store::StructureSpawn;
    use crate::events::SimEvent;

    fn open_world() -> WorldState {
        let mut world = WorldState::new(
            BoardState::new(32, 16, GridPosition::new(1, 8), 30, (0, 15)),
            Difficulty::Normal,
            5,
        );
        world.run.phase = RunPhase::Playing;
        world
    }

    fn turret(world: &mut WorldState, x: i32, y: i32) -> EntityId {
        world.spawn_structure(
            StructureSpawn::new(StructureType::TurretMount, GridPosition::new(x, y)).with_turret("turret_mk1"),
        )
    }

    fn enemy(world: &mut WorldState, x: i32, y: i32) -> EntityId {
        let id = world.entities.spawn_enemy(GridPosition::new(x, y), 30);
        world.combat.enemies.insert(
            id,
            EnemyRuntime {
                enemy_def_id: "scout".into(),
                wave_number: 1,
                move_every_ticks: 8,
                base_damage: 8,
                structure_damage: 4,
                reward: 2,
            },
        );
        id
    }

    fn step_with(world: &mut WorldState, config: &SimulationConfig) -> Vec<SimEvent> {
        let content = ContentBundle::standard();
        let mut ctx = SystemContext::new(world.tick, &content, config, Vec::new());
        CombatSystem.update(world, &mut ctx);
        world.tick += 1;
        ctx.events
    }

    fn step(world: &mut WorldState) -> Vec<SimEvent> {
        step_with(world, &SimulationConfig::default())
    }

    #[test]
    fn test_fires_at_nearest_enemy_in_range() {
        let mut world = open_world();
        let mount = turret(&mut world, 10, 8);
        buffer_add(world.economy.input_buffers.get_mut(&mount).unwrap(), items::AMMO_LIGHT, 2);
        enemy(&mut world, 15, 8);
        let near = enemy(&mut world, 13, 8);

        let events = step(&mut world);
        assert_eq!(events[0].kind, EventKind::AmmoSpent);
        assert_eq!(events[0].detail.as_deref(), Some("local"));
        assert_eq!(events[1].kind, EventKind::ProjectileFired);
        let projectile = world.combat.projectiles.values().next().unwrap();
        assert_eq!(projectile.target_enemy_id, near);
        assert_eq!(projectile.damage, 12);
        // Three cells at two cells per tick.
        assert_eq!(projectile.impact_tick, 2);
        assert_eq!(buffer_count(&world.economy.input_buffers[&mount], items::AMMO_LIGHT), 1);
    }

    #[test]
    fn test_cadence_limits_fire_rate() {
        let mut world = open_world();
        let mount = turret(&mut world, 10, 8);
        buffer_add(world.economy.input_buffers.get_mut(&mount).unwrap(), items::AMMO_LIGHT, 6);
        enemy(&mut world, 12, 8);

        let mut shots = 0;
        for _ in 0..21 {
            shots += step(&mut world)
                .iter()
                .filter(|event| event.kind == EventKind::ProjectileFired)
                .count();
        }
        // turret_mk1 fires twice a second: ticks 0, 10 and 20.
        assert_eq!(shots, 3);
    }

    #[test]
    fn test_range_and_overrides() {
        let mut world = open_world();
        let mount = turret(&mut world, 10, 8);
        buffer_add(world.economy.input_buffers.get_mut(&mount).unwrap(), items::AMMO_LIGHT, 2);
        enemy(&mut world, 20, 8);

        assert!(step(&mut world).is_empty());

        let mut config = SimulationConfig::default();
        config.combat.range_override = Some(Fixed::from_num(12));
        config.combat.damage_override = Some(18);
        let events = step_with(&mut world, &config);
        assert_eq!(events.len(), 2);
        assert_eq!(world.combat.projectiles.values().next().unwrap().damage, 18);
    }

    #[test]
    fn test_wall_network_supplies_mounted_turret() {
        let mut world = open_world();
        let wall = world.spawn_structure(StructureSpawn::new(StructureType::Wall, GridPosition::new(10, 8)));
        let mount = world.spawn_structure(
            StructureSpawn::new(StructureType::TurretMount, GridPosition::new(10, 8))
                .on_wall(wall)
                .with_turret("turret_mk1"),
        );
        world.combat.rebuild_wall_networks(&world.entities, 8);
        let network = world.combat.network_for_wall(wall).unwrap();
        buffer_add(&mut world.combat.wall_networks.get_mut(&network).unwrap().ammo_pool, items::AMMO_LIGHT, 3);
        enemy(&mut world, 12, 8);

        let events = step(&mut world);
        assert_eq!(events[0].entity, Some(mount));
        assert_eq!(events[0].detail.as_deref(), Some("network"));
        assert_eq!(world.combat.wall_networks[&network].pool_total(), 2);
    }

    #[test]
    fn test_dry_fire_is_counted() {
        let mut world = open_world();
        let mount = turret(&mut world, 10, 8);
        enemy(&mut world, 12, 8);

        let events = step(&mut world);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::NotEnoughAmmo);
        assert_eq!(events[0].entity, Some(mount));
        assert_eq!(world.threat.telemetry.dry_fire_events, 1);
        assert!(world.combat.projectiles.is_empty());

        // The empty attempt still consumes the cadence slot.
        assert!(step(&mut world).is_empty());
    }
}
