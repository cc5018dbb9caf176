//! Grace period, scheduled waves, trickle spawns, raids and milestones.

use crate::combat::EnemyRuntime;
use crate::data::{ContentBundle, EnemyDef};
use crate::events::EventKind;
use crate::rng::{deterministic_roll, keyed_hash, SimRng};
use crate::threat::PendingSpawn;
use crate::world::{RunPhase, WorldState};

use super::{SimulationSystem, SystemContext};

/// Ticks between enemies of the same authored group.
const GROUP_STAGGER_TICKS: u64 = 10;

/// Procedural spawns released per group.
const PROCEDURAL_GROUP_SIZE: u32 = 4;

const SPAWN_CELL_KEY: u64 = 0x5A;
const PROCEDURAL_STREAM_KEY: u64 = 0x57;
const RAID_STREAM_KEY: u64 = 0x52;
const TRICKLE_KEY: u64 = 0x7C;

/// Drives the threat schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveSystem;

impl SimulationSystem for WaveSystem {
    fn name(&self) -> &'static str {
        "wave"
    }

    fn update(&mut self, world: &mut WorldState, ctx: &mut SystemContext<'_>) {
        match world.run.phase {
            RunPhase::GameOver => return,
            RunPhase::GracePeriod => {
                if ctx.tick < world.threat.grace_ends_at_tick {
                    return;
                }
                world.run.phase = RunPhase::Playing;
                tracing::info!(tick = ctx.tick, "Grace period ended");
                ctx.emit(ctx.event(EventKind::GracePeriodEnded));
            }
            RunPhase::Playing => {}
        }

        if world.threat.is_wave_active {
            world.economy.currency += ctx.config.waves.currency_per_active_tick;
            if wave_finished(world, ctx.tick) {
                end_wave(world, ctx);
            }
        }
        if !world.threat.is_wave_active && !world.run.extracted && ctx.tick >= world.threat.next_wave_tick {
            start_wave(world, ctx);
        }
        schedule_trickle(world, ctx);
        maybe_raid(world, ctx);
        release_due_spawns(world, ctx);
        world.threat.telemetry.queued_spawn_backlog = world.threat.pending_spawns.len() as u32;
    }
}

fn wave_finished(world: &WorldState, tick: u64) -> bool {
    let wave = world.threat.current_wave_number();
    if tick >= world.threat.wave_ends_at_tick {
        return true;
    }
    let queued = world
        .threat
        .pending_spawns
        .iter()
        .any(|spawn| spawn.wave_number == wave);
    let alive = world
        .combat
        .enemies
        .values()
        .any(|enemy| enemy.wave_number == wave);
    !queued && !alive
}

fn end_wave(world: &mut WorldState, ctx: &mut SystemContext<'_>) {
    let wave = world.threat.current_wave_number();
    let threat = &mut world.threat;
    threat.is_wave_active = false;
    threat.wave_index = wave;
    threat.next_wave_tick = ctx.tick + threat.wave_gap_ticks(wave);
    tracing::info!(tick = ctx.tick, wave, next_wave_tick = threat.next_wave_tick, "Wave ended");
    ctx.emit(ctx.event(EventKind::WaveEnded).with_value(i64::from(wave)));

    if threat.milestone_every > 0 && wave % threat.milestone_every == 0 {
        threat.milestones_reached += 1;
        let reward = u64::from(wave) * ctx.config.waves.milestone_reward_per_wave;
        world.economy.currency += reward;
        tracing::info!(wave, reward, "Milestone reached");
        ctx.emit(
            ctx.event(EventKind::MilestoneReached)
                .with_value(i64::from(wave))
                .with_detail(reward.to_string()),
        );
    }
}

fn start_wave(world: &mut WorldState, ctx: &mut SystemContext<'_>) {
    let wave = world.threat.current_wave_number();
    let spawns = plan_wave(ctx.content, world.run.seed, world.threat.budget_percent, wave, ctx.tick);
    let count = spawns.len();
    let threat = &mut world.threat;
    threat.pending_spawns.extend(spawns);
    threat.is_wave_active = true;
    threat.wave_started_at_tick = ctx.tick;
    threat.wave_ends_at_tick = ctx.tick + threat.wave_duration_ticks;
    tracing::info!(tick = ctx.tick, wave, spawns = count, "Wave started");
    ctx.emit(
        ctx.event(EventKind::WaveStarted)
            .with_value(i64::from(wave))
            .with_detail(count.to_string()),
    );
}

fn scaled_budget(budget: u32, percent: u32) -> u32 {
    (u64::from(budget) * u64::from(percent) / 100) as u32
}

/// Spawn list for wave `wave`: the authored definition when one exists,
/// otherwise the procedural budget.
#[must_use]
pub fn plan_wave(content: &ContentBundle, seed: u64, budget_percent: u32, wave: u32, tick: u64) -> Vec<PendingSpawn> {
    let Some(def) = content.waves.authored_wave(wave) else {
        let budget = scaled_budget(content.waves.procedural.budget(wave), budget_percent);
        let mut rng = SimRng::for_stream(seed, &[PROCEDURAL_STREAM_KEY, u64::from(wave)]);
        return procedural_spawns(content, &mut rng, wave, budget, tick, wave);
    };

    let mut remaining = scaled_budget(def.threat_budget, budget_percent);
    let mut spawns = Vec::new();
    'groups: for group in &def.groups {
        let Ok(enemy) = content.enemy(&group.enemy_id) else {
            tracing::warn!(enemy = %group.enemy_id, wave, "Unknown enemy in wave group");
            continue;
        };
        let cost = enemy.threat_cost.max(1);
        for n in 0..group.count {
            // The first spawn of a wave is always granted.
            if !spawns.is_empty() && cost > remaining {
                break 'groups;
            }
            remaining = remaining.saturating_sub(cost);
            spawns.push(PendingSpawn {
                due_tick: tick + u64::from(group.delay_ticks) + u64::from(n) * GROUP_STAGGER_TICKS,
                enemy_id: enemy.id.clone(),
                wave_number: wave,
                sequence: spawns.len() as u32,
            });
        }
    }
    spawns
}

/// Random affordable picks from enemies unlocked at `eligible_wave`.
fn procedural_spawns(
    content: &ContentBundle,
    rng: &mut SimRng,
    eligible_wave: u32,
    budget: u32,
    tick: u64,
    wave_number: u32,
) -> Vec<PendingSpawn> {
    let procedural = &content.waves.procedural;
    let eligible: Vec<&EnemyDef> = content
        .enemies
        .iter()
        .filter(|enemy| enemy.min_wave <= eligible_wave)
        .collect();
    let mut remaining = budget;
    let mut spawns = Vec::new();
    while (spawns.len() as u32) < procedural.max_spawns {
        let affordable: Vec<&EnemyDef> = eligible
            .iter()
            .copied()
            .filter(|enemy| enemy.threat_cost.max(1) <= remaining)
            .collect();
        let pick = if affordable.is_empty() {
            if !spawns.is_empty() {
                break;
            }
            match cheapest(&eligible) {
                Some(enemy) => enemy,
                None => break,
            }
        } else {
            affordable[rng.next_below(affordable.len() as u64) as usize]
        };
        remaining = remaining.saturating_sub(pick.threat_cost.max(1));
        let n = spawns.len() as u32;
        spawns.push(PendingSpawn {
            due_tick: tick + u64::from(n / PROCEDURAL_GROUP_SIZE) * u64::from(procedural.group_spacing_ticks),
            enemy_id: pick.id.clone(),
            wave_number,
            sequence: n,
        });
    }
    spawns
}

fn cheapest<'a>(enemies: &[&'a EnemyDef]) -> Option<&'a EnemyDef> {
    enemies
        .iter()
        .copied()
        .min_by(|a, b| a.threat_cost.cmp(&b.threat_cost).then_with(|| a.id.cmp(&b.id)))
}

fn schedule_trickle(world: &mut WorldState, ctx: &mut SystemContext<'_>) {
    let threat = &mut world.threat;
    if threat.trickle_interval_ticks == 0 || ctx.tick < threat.next_trickle_tick {
        return;
    }
    threat.next_trickle_tick = ctx.tick + threat.trickle_interval_ticks;
    // Bounds may arrive swapped from content.
    let low = threat.trickle_min.min(threat.trickle_max);
    let span = u64::from(threat.trickle_max.abs_diff(threat.trickle_min)) + 1;
    let roll = keyed_hash(world.run.seed, &[TRICKLE_KEY, u64::from(threat.trickle_count)]);
    let count = low + (roll % span) as u32;
    threat.trickle_count += 1;

    let eligible: Vec<&EnemyDef> = ctx
        .content
        .enemies
        .iter()
        .filter(|enemy| enemy.min_wave <= threat.wave_index)
        .collect();
    let Some(enemy) = cheapest(&eligible) else {
        return;
    };
    for n in 0..count {
        threat.pending_spawns.push(PendingSpawn {
            due_tick: ctx.tick,
            enemy_id: enemy.id.clone(),
            wave_number: 0,
            sequence: n,
        });
    }
    tracing::debug!(tick = ctx.tick, count, enemy = %enemy.id, "Trickle scheduled");
}

fn maybe_raid(world: &mut WorldState, ctx: &mut SystemContext<'_>) {
    let config = ctx.config;
    let waves = &config.waves;
    let threat = &mut world.threat;
    if !waves.enable_raids || threat.is_wave_active || world.run.extracted || ctx.tick < threat.raid_cooldown_until_tick {
        return;
    }
    if deterministic_roll(ctx.tick, threat.wave_index, waves.raid_roll_modulus) >= waves.raid_roll_threshold {
        return;
    }
    let wave = threat.current_wave_number();
    let budget = scaled_budget(ctx.content.waves.procedural.budget(wave), threat.budget_percent) / 2;
    let mut rng = SimRng::for_stream(world.run.seed, &[RAID_STREAM_KEY, ctx.tick]);
    let spawns = procedural_spawns(ctx.content, &mut rng, threat.wave_index, budget, ctx.tick, 0);
    let count = spawns.len();
    threat.pending_spawns.extend(spawns);
    threat.raid_cooldown_until_tick = ctx.tick + waves.raid_cooldown_ticks;
    threat.telemetry.raids_triggered += 1;
    tracing::info!(tick = ctx.tick, spawns = count, "Raid triggered");
    ctx.emit(ctx.event(EventKind::RaidTriggered).with_value(count as i64));
}

fn release_due_spawns(world: &mut WorldState, ctx: &mut SystemContext<'_>) {
    let (due, later): (Vec<PendingSpawn>, Vec<PendingSpawn>) = std::mem::take(&mut world.threat.pending_spawns)
        .into_iter()
        .partition(|spawn| spawn.due_tick <= ctx.tick);
    world.threat.pending_spawns = later;
    for spawn in due {
        spawn_enemy(world, ctx, &spawn);
    }
}

fn spawn_enemy(world: &mut WorldState, ctx: &mut SystemContext<'_>, spawn: &PendingSpawn) {
    let content = ctx.content;
    let Ok(def) = content.enemy(&spawn.enemy_id) else {
        tracing::warn!(enemy = %spawn.enemy_id, "Dropping spawn of unknown enemy");
        return;
    };
    let cells = world.board.spawn_cells();
    if cells.is_empty() {
        return;
    }
    let key = [
        SPAWN_CELL_KEY,
        u64::from(spawn.wave_number),
        u64::from(spawn.sequence),
        spawn.due_tick,
    ];
    let cell = cells[(keyed_hash(world.run.seed, &key) % cells.len() as u64) as usize];
    let position = world.board.elevated(cell.x, cell.y);

    // Off-schedule spawns scale with the waves cleared so far.
    let scale = match spawn.wave_number {
        0 => world.threat.wave_index,
        wave => wave - 1,
    };
    let id = world.entities.spawn_enemy(position, def.health_at_wave(scale));
    world.combat.enemies.insert(
        id,
        EnemyRuntime {
            enemy_def_id: def.id.clone(),
            wave_number: spawn.wave_number,
            move_every_ticks: def.move_every_ticks.max(1),
            base_damage: def.base_damage,
            structure_damage: def.structure_damage(),
            reward: def.reward,
        },
    );
    world.threat.telemetry.enemies_spawned += 1;
    ctx.emit(
        ctx.event(EventKind::EnemySpawned)
            .with_entity(id)
            .with_value(i64::from(spawn.wave_number))
            .with_detail(def.id.clone()),
    );
}
