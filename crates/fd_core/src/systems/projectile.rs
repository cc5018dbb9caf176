//! Projectile flight and damage.

use crate::components::{EntityId, GridPosition};
use crate::events::EventKind;
use crate::world::WorldState;

use super::{SimulationSystem, SystemContext};

/// Advances projectiles and resolves impacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectileSystem;

impl SimulationSystem for ProjectileSystem {
    fn name(&self) -> &'static str {
        "projectile"
    }

    fn update(&mut self, world: &mut WorldState, ctx: &mut SystemContext<'_>) {
        let ids: Vec<EntityId> = world.combat.projectiles.keys().copied().collect();
        let speed = ctx.config.combat.projectile_cells_per_tick.max(1);

        for id in ids {
            let Some(runtime) = world.combat.projectiles.get(&id) else {
                continue;
            };
            let target = runtime.target_enemy_id;
            let target_position = world
                .entities
                .get(target)
                .filter(|_| world.combat.enemies.contains_key(&target))
                .map(|enemy| enemy.position);
            let Some(target_position) = target_position else {
                tracing::trace!(projectile = id, target, "Target gone, projectile expired");
                world.remove_unit(id);
                continue;
            };

            let (impact_tick, damage) = match world.combat.projectiles.get_mut(&id) {
                Some(runtime) => {
                    runtime.target_last_position = target_position;
                    (runtime.impact_tick, runtime.damage)
                }
                None => continue,
            };
            if let Some(projectile) = world.entities.get_mut(id) {
                projectile.position = step_toward(projectile.position, target_position, speed);
            }
            if ctx.tick < impact_tick {
                continue;
            }

            world.remove_unit(id);
            hit_enemy(world, ctx, target, damage);
        }
    }
}

fn hit_enemy(world: &mut WorldState, ctx: &mut SystemContext<'_>, target: EntityId, damage: u32) {
    let Some(enemy) = world.entities.get_mut(target) else {
        return;
    };
    enemy.health = enemy.health.saturating_sub(damage);
    if enemy.health > 0 {
        return;
    }
    let Some(runtime) = world.combat.enemies.get(&target) else {
        return;
    };
    let reward = u64::from(runtime.reward);
    let def_id = runtime.enemy_def_id.clone();
    world.remove_unit(target);
    world.economy.currency += reward;
    world.threat.telemetry.enemies_destroyed += 1;
    tracing::debug!(tick = ctx.tick, enemy = target, reward, "Enemy destroyed");
    ctx.emit(
        ctx.event(EventKind::EnemyDestroyed)
            .with_entity(target)
            .with_value(reward as i64)
            .with_detail(def_id),
    );
}

/// Move up to `cells` steps toward `to`, x axis first. Elevation follows the
/// target once the projectile arrives.
fn step_toward(from: GridPosition, to: GridPosition, cells: u32) -> GridPosition {
    let mut position = from;
    for _ in 0..cells {
        if position.x != to.x {
            position.x += (to.x - position.x).signum();
        } else if position.y != to.y {
            position.y += (to.y - position.y).signum();
        } else {
            break;
        }
    }
    if position.same_cell(to) {
        position.z = to.z;
    }
    position
}
