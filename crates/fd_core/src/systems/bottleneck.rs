//! Bottleneck detection with hysteresis.
//!
//! Conditions are observed fresh every tick. A signal only shows after its
//! condition held for `activation_threshold_ticks` consecutive ticks and
//! only hides after `recovery_threshold_ticks` consecutive clear ticks.

use std::collections::{BTreeMap, BTreeSet};

use crate::bottleneck::{
    BottleneckKind, BottleneckObservation, BottleneckSignal, HysteresisCounter, Severity, SignalKey, SignalScope,
};
use crate::components::NetworkId;
use crate::config::SimulationConfig;
use crate::data::ContentBundle;
use crate::economy::buffer_total;
use crate::events::EventKind;
use crate::math::Fixed;
use crate::structures::StructureType;
use crate::world::WorldState;

use super::economy::{miner_has_ore, recipe_inputs_available};
use super::{SimulationSystem, SystemContext};

type Observations = BTreeMap<SignalKey, BottleneckObservation>;

/// Observes conditions and maintains the active signal list.
#[derive(Debug, Clone, Copy, Default)]
pub struct BottleneckSystem;

impl SimulationSystem for BottleneckSystem {
    fn name(&self) -> &'static str {
        "bottleneck"
    }

    fn update(&mut self, world: &mut WorldState, ctx: &mut SystemContext<'_>) {
        let observations = observe(world, ctx.content, ctx.config);
        world.bottleneck.previous_dry_fire_events = world.threat.telemetry.dry_fire_events;
        apply_hysteresis(world, ctx, observations);
        rebuild_signals(world);
    }
}

fn observe(world: &WorldState, content: &ContentBundle, config: &SimulationConfig) -> Observations {
    let thresholds = &config.bottleneck;
    let mut observations = Observations::new();
    let mut note = |kind, scope, severity, item_id: Option<&str>, detail: String| {
        observations.insert(
            SignalKey { kind, scope },
            BottleneckObservation {
                severity,
                item_id: item_id.map(str::to_string),
                detail,
            },
        );
    };

    let dry_fire_delta = world
        .threat
        .telemetry
        .dry_fire_events
        .saturating_sub(world.bottleneck.previous_dry_fire_events);
    if world.threat.is_wave_active && dry_fire_delta >= thresholds.dry_fire_delta.max(1) {
        note(
            BottleneckKind::AmmoDryFire,
            SignalScope::Global,
            Severity::Critical,
            None,
            format!("{dry_fire_delta} dry shots this tick"),
        );
    }

    let in_combat = world.threat.is_wave_active || !world.combat.enemies.is_empty();
    if in_combat {
        let defended: BTreeSet<NetworkId> = world
            .entities
            .structures_of(StructureType::TurretMount)
            .filter_map(|turret| turret.host_wall_id)
            .filter_map(|wall| world.combat.network_for_wall(wall))
            .collect();
        for network in defended.iter().filter_map(|id| world.combat.wall_networks.get(id)) {
            let threshold = Fixed::from_num(network.capacity) * thresholds.network_ammo_ratio;
            if Fixed::from_num(network.pool_total()) < threshold {
                note(
                    BottleneckKind::WallNetworkUnderfed,
                    SignalScope::Network(network.id),
                    Severity::Warn,
                    None,
                    format!("{}/{} ammo pooled", network.pool_total(), network.capacity),
                );
            }
        }
    }

    let backlog = world.threat.telemetry.queued_spawn_backlog;
    if backlog > thresholds.spawn_backlog_threshold {
        note(
            BottleneckKind::SurgeBacklogHigh,
            SignalScope::Global,
            Severity::Warn,
            None,
            format!("{backlog} spawns queued"),
        );
    }

    let economy = &world.economy;
    if economy.power_demand > economy.power_supply {
        note(
            BottleneckKind::PowerShortage,
            SignalScope::Global,
            Severity::Warn,
            None,
            format!("demand {} over supply {}", economy.power_demand, economy.power_supply),
        );
    }

    for (&id, recipe_id) in &economy.pinned_recipes {
        let Ok(recipe) = content.recipe(recipe_id) else {
            continue;
        };
        if !recipe_inputs_available(economy, config, recipe, id) {
            let missing = recipe.inputs.first().map(|input| input.item_id.as_str());
            note(
                BottleneckKind::InputStarved,
                SignalScope::Structure(id),
                Severity::Warn,
                missing,
                format!("{recipe_id} lacks inputs"),
            );
        }
    }

    for entity in world.entities.structures() {
        let Some(structure_type) = entity.structure_type else {
            continue;
        };
        let capacity = structure_type.output_capacity();
        if capacity > 0 {
            let held = economy.output_buffers.get(&entity.id).map_or(0, buffer_total);
            if held >= capacity {
                note(
                    BottleneckKind::OutputBlocked,
                    SignalScope::Structure(entity.id),
                    Severity::Info,
                    None,
                    format!("{held}/{capacity} output held"),
                );
            }
        }
        if structure_type == StructureType::Miner && !miner_has_ore(world, entity.bound_patch_id) {
            note(
                BottleneckKind::MinerNoOre,
                SignalScope::Structure(entity.id),
                Severity::Info,
                None,
                "no minable patch".to_string(),
            );
        }
    }

    let transit = config.economy.conveyor_transit_ticks.max(1);
    for (&id, payload) in &economy.conveyor_payloads {
        if payload.progress_ticks >= transit {
            note(
                BottleneckKind::ConveyorStall,
                SignalScope::Structure(id),
                Severity::Info,
                Some(payload.item_id.as_str()),
                "payload cannot move on".to_string(),
            );
        }
    }

    observations
}

/// Whether the subject of `scope` still exists.
fn scope_exists(world: &WorldState, scope: SignalScope) -> bool {
    match scope {
        SignalScope::Global => true,
        SignalScope::Structure(id) => world.entities.contains(id),
        SignalScope::Network(id) => world.combat.wall_networks.contains_key(&id),
    }
}

fn apply_hysteresis(world: &mut WorldState, ctx: &mut SystemContext<'_>, mut observations: Observations) {
    let activation = ctx.config.bottleneck.activation_threshold_ticks.max(1);
    let recovery = ctx.config.bottleneck.recovery_threshold_ticks.max(1);

    let keys: BTreeSet<SignalKey> = world
        .bottleneck
        .counters
        .keys()
        .chain(observations.keys())
        .copied()
        .collect();

    for key in keys {
        if !scope_exists(world, key.scope) {
            if let Some(counter) = world.bottleneck.counters.remove(&key) {
                if counter.is_active {
                    deactivate(world, ctx, key);
                }
            }
            continue;
        }

        let observation = observations.remove(&key);
        let counter = world.bottleneck.counters.entry(key).or_default();
        let mut activated = false;
        let mut deactivated = false;
        match observation {
            Some(observation) => {
                counter.condition_met_ticks = counter.condition_met_ticks.saturating_add(1);
                counter.cleared_ticks = 0;
                counter.last_observation = Some(observation);
                if !counter.is_active && counter.condition_met_ticks >= activation {
                    counter.is_active = true;
                    counter.active_since_tick = ctx.tick;
                    activated = true;
                }
            }
            None => {
                counter.condition_met_ticks = 0;
                counter.cleared_ticks = counter.cleared_ticks.saturating_add(1);
                if counter.is_active && counter.cleared_ticks >= recovery {
                    counter.is_active = false;
                    deactivated = true;
                }
            }
        }
        let idle = !counter.is_active && counter.condition_met_ticks == 0;

        if activated {
            let item_id = counter.last_observation.as_ref().and_then(|obs| obs.item_id.clone());
            let severity = counter.last_observation.as_ref().map(|obs| obs.severity);
            record_transition(world, key.kind);
            tracing::debug!(tick = ctx.tick, kind = key.kind.token(), scope = ?key.scope, ?severity, "Bottleneck activated");
            let mut event = ctx.event(EventKind::BottleneckActivated).with_detail(key.kind.token());
            if let Some(entity) = key.scope.entity() {
                event = event.with_entity(entity);
            }
            if let Some(item_id) = item_id {
                event = event.with_item(item_id);
            }
            ctx.emit(event);
        }
        if deactivated {
            deactivate(world, ctx, key);
        }
        if idle {
            world.bottleneck.counters.remove(&key);
        }
    }
}

fn deactivate(world: &mut WorldState, ctx: &mut SystemContext<'_>, key: SignalKey) {
    record_transition(world, key.kind);
    tracing::debug!(tick = ctx.tick, kind = key.kind.token(), scope = ?key.scope, "Bottleneck cleared");
    let mut event = ctx.event(EventKind::BottleneckDeactivated).with_detail(key.kind.token());
    if let Some(entity) = key.scope.entity() {
        event = event.with_entity(entity);
    }
    ctx.emit(event);
}

fn record_transition(world: &mut WorldState, kind: BottleneckKind) {
    *world.bottleneck.telemetry.transitions.entry(kind).or_insert(0) += 1;
}

/// Active signals in kind priority order, then scope.
fn rebuild_signals(world: &mut WorldState) {
    let state = &mut world.bottleneck;
    state.active_signals = state
        .counters
        .iter()
        .filter(|(_, counter)| counter.is_active)
        .map(|(key, counter)| signal(*key, counter))
        .collect();

    let kinds: BTreeSet<BottleneckKind> = state.active_signals.iter().map(|signal| signal.kind).collect();
    for kind in kinds {
        *state.telemetry.active_ticks.entry(kind).or_insert(0) += 1;
    }
    state.telemetry.max_concurrent = state.telemetry.max_concurrent.max(state.active_signals.len() as u32);
}

fn signal(key: SignalKey, counter: &HysteresisCounter) -> BottleneckSignal {
    let observation = counter.last_observation.as_ref();
    BottleneckSignal {
        kind: key.kind,
        scope: key.scope,
        severity: observation.map_or(Severity::Info, |obs| obs.severity),
        item_id: observation.and_then(|obs| obs.item_id.clone()),
        detail: observation.map(|obs| obs.detail.clone()).unwrap_or_default(),
        active_since_tick: counter.active_since_tick,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardState;
    use crate::components::{EntityId, GridPosition};
    use crate::data::Difficulty;
    use crate::entity_store::StructureSpawn;
    use crate::events::SimEvent;

    fn world() -> WorldState {
        WorldState::new(
            BoardState::new(16, 12, GridPosition::new(14, 10), 15, (0, 11)),
            Difficulty::Normal,
            1,
        )
    }

    fn step(world: &mut WorldState) -> Vec<SimEvent> {
        let content = ContentBundle::standard();
        let config = SimulationConfig::default();
        let mut ctx = SystemContext::new(world.tick, &content, &config, Vec::new());
        BottleneckSystem.update(world, &mut ctx);
        world.tick += 1;
        ctx.events
    }

    fn miner(world: &mut WorldState, x: i32) -> EntityId {
        world.spawn_structure(StructureSpawn::new(StructureType::Miner, GridPosition::new(x, 2)))
    }

    #[test]
    fn test_power_shortage_hysteresis() {
        let mut world = world();
        world.economy.power_supply = 12;
        world.economy.power_demand = 20;

        for _ in 0..5 {
            assert!(step(&mut world).is_empty());
        }
        let events = step(&mut world);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::BottleneckActivated);
        assert_eq!(events[0].detail.as_deref(), Some("power_shortage"));
        assert!(world.bottleneck.is_active(BottleneckKind::PowerShortage, SignalScope::Global));
        assert_eq!(world.bottleneck.active_signals[0].active_since_tick, 5);

        world.economy.power_supply = 24;
        for _ in 0..19 {
            assert!(step(&mut world).is_empty());
        }
        assert!(world.bottleneck.is_active(BottleneckKind::PowerShortage, SignalScope::Global));
        let events = step(&mut world);
        assert_eq!(events[0].kind, EventKind::BottleneckDeactivated);
        assert!(world.bottleneck.active_signals.is_empty());
        assert!(world.bottleneck.counters.is_empty());
        assert_eq!(world.bottleneck.telemetry.transitions[&BottleneckKind::PowerShortage], 2);
        assert_eq!(world.bottleneck.telemetry.active_ticks[&BottleneckKind::PowerShortage], 20);
    }

    #[test]
    fn test_flapping_condition_never_shows() {
        let mut world = world();
        world.economy.power_supply = 12;
        for tick in 0..60 {
            world.economy.power_demand = if tick % 6 == 5 { 0 } else { 20 };
            assert!(step(&mut world).is_empty());
        }
        assert!(world.bottleneck.active_signals.is_empty());
    }

    #[test]
    fn test_each_miner_gets_its_own_signal() {
        let mut world = world();
        let first = miner(&mut world, 2);
        let second = miner(&mut world, 5);

        for _ in 0..6 {
            step(&mut world);
        }
        let scopes: Vec<SignalScope> = world
            .bottleneck
            .signals_of(BottleneckKind::MinerNoOre)
            .map(|signal| signal.scope)
            .collect();
        assert_eq!(scopes, vec![SignalScope::Structure(first), SignalScope::Structure(second)]);
        assert_eq!(world.bottleneck.telemetry.max_concurrent, 2);
    }

    #[test]
    fn test_removed_structure_is_pruned() {
        let mut world = world();
        let first = miner(&mut world, 2);
        for _ in 0..6 {
            step(&mut world);
        }
        world.remove_structure(first);

        let events = step(&mut world);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::BottleneckDeactivated);
        assert_eq!(events[0].entity, Some(first));
        assert!(world.bottleneck.counters.is_empty());
        assert!(world.bottleneck.active_signals.is_empty());
    }

    #[test]
    fn test_dry_fire_only_counts_during_waves() {
        let mut world = world();
        for _ in 0..8 {
            world.threat.telemetry.dry_fire_events += 1;
            step(&mut world);
        }
        assert!(world.bottleneck.active_signals.is_empty());

        world.threat.is_wave_active = true;
        for _ in 0..6 {
            world.threat.telemetry.dry_fire_events += 1;
            step(&mut world);
        }
        let signal = &world.bottleneck.active_signals[0];
        assert_eq!(signal.kind, BottleneckKind::AmmoDryFire);
        assert_eq!(signal.severity, Severity::Critical);
    }

    #[test]
    fn test_signals_follow_kind_priority() {
        let mut world = world();
        miner(&mut world, 2);
        world.economy.power_supply = 0;
        world.economy.power_demand = 5;
        world.threat.telemetry.queued_spawn_backlog = 11;

        for _ in 0..6 {
            step(&mut world);
        }
        let kinds: Vec<BottleneckKind> = world.bottleneck.active_signals.iter().map(|signal| signal.kind).collect();
        assert_eq!(
            kinds,
            vec![BottleneckKind::SurgeBacklogHigh, BottleneckKind::PowerShortage, BottleneckKind::MinerNoOre]
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_power_signal_tracks_run_lengths(shortage in proptest::collection::vec(proptest::bool::ANY, 1..120)) {
            let thresholds = SimulationConfig::default().bottleneck;
            let mut world = world();
            world.economy.power_supply = 12;

            let (mut met, mut cleared, mut active) = (0, 0, false);
            for short in shortage {
                world.economy.power_demand = if short { 20 } else { 0 };
                step(&mut world);
                if short {
                    met += 1;
                    cleared = 0;
                    active |= met >= thresholds.activation_threshold_ticks;
                } else {
                    met = 0;
                    cleared += 1;
                    active &= cleared < thresholds.recovery_threshold_ticks;
                }
                proptest::prop_assert_eq!(
                    world.bottleneck.is_active(BottleneckKind::PowerShortage, SignalScope::Global),
                    active
                );
            }
        }
    }
}
