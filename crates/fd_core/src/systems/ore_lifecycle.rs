//! Ring surveys, seeded patch generation and patch renewal.
//!
//! Every random choice here is a keyed hash of the world seed or a
//! [`SimRng`] stream derived from it, so the same seed always yields the
//! same patches no matter how the run is driven.

use std::cmp::Reverse;
use std::collections::VecDeque;

use crate::components::{GridPosition, PatchId};
use crate::data::{ContentBundle, Difficulty, OreRingDef, Richness};
use crate::events::EventKind;
use crate::math::{powi, ratio, Fixed};
use crate::ore::{OrePatch, RenewalRequest, RingState};
use crate::rng::{keyed_hash, unit_interval, SimRng};
use crate::world::WorldState;

use super::{SimulationSystem, SystemContext};

const RING_RANK_KEY: u64 = 0xA0;
const RING_STREAM_KEY: u64 = 0xD0;
const RENEWAL_SKIP_KEY: u64 = 0x5E;
const RENEWAL_JITTER_KEY: u64 = 0xE7;

/// Completes surveys and drains the renewal queue at wave boundaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct OreLifecycleSystem;

impl SimulationSystem for OreLifecycleSystem {
    fn name(&self) -> &'static str {
        "ore_lifecycle"
    }

    fn update(&mut self, world: &mut WorldState, ctx: &mut SystemContext<'_>) {
        complete_surveys(world, ctx);
        process_renewals(world, ctx);
    }
}

fn complete_surveys(world: &mut WorldState, ctx: &mut SystemContext<'_>) {
    let due: Vec<u32> = world
        .ore_lifecycle
        .survey_end_tick_by_ring
        .iter()
        .filter(|&(&ring, &end)| {
            ctx.tick >= end && world.ore_lifecycle.ring_state(ring) == RingState::Surveying
        })
        .map(|(&ring, _)| ring)
        .collect();

    let content = ctx.content;
    for ring in due {
        world.ore_lifecycle.advance_ring(ring, RingState::Revealed);
        if let Some(node) = world.ore_lifecycle.survey_node_by_ring.remove(&ring) {
            world.run.completed_tech.insert(node);
        }
        let spawned = reveal_ring(world, content, ring);
        tracing::info!(tick = ctx.tick, ring, patches = spawned.len(), "Ring revealed");
        ctx.emit(
            ctx.event(EventKind::RingRevealed)
                .with_value(i64::from(ring))
                .with_detail(spawned.len().to_string()),
        );
    }
}

/// Generate the patches of `ring`, returning their ids.
///
/// Candidates are free cells whose Chebyshev distance from the base lies in
/// the ring's band, ranked by a keyed hash. Picks keep `min_spacing` from
/// every live patch. Ore type and richness come from a stream seeded by
/// `(world seed, ring)`.
pub fn reveal_ring(world: &mut WorldState, content: &ContentBundle, ring: u32) -> Vec<PatchId> {
    let Some(def) = content.ore.ring(ring) else {
        return Vec::new();
    };
    let seed = world.run.seed;
    let base = world.board.base;

    let mut candidates: Vec<GridPosition> = free_cells(world)
        .into_iter()
        .filter(|&cell| (def.min_distance..=def.max_distance).contains(&cell.chebyshev_distance(base)))
        .collect();
    candidates.sort_by_key(|cell| {
        (
            Reverse(keyed_hash(seed, &[RING_RANK_KEY, u64::from(ring), cell.x as u64, cell.y as u64])),
            cell.x,
            cell.y,
        )
    });

    let mut taken = live_patch_cells(world);
    let mut chosen = Vec::new();
    for cell in candidates {
        if chosen.len() as u32 >= def.patch_count {
            break;
        }
        if too_close(cell, &taken, content.ore.min_spacing) {
            continue;
        }
        taken.push(cell);
        chosen.push(cell);
    }

    let mut rng = SimRng::for_stream(seed, &[RING_STREAM_KEY, u64::from(ring)]);
    let ore_weights: Vec<u32> = content.ore.ore_types.iter().map(|ore| ore.weight).collect();
    let mut spawned = Vec::with_capacity(chosen.len());
    for cell in chosen {
        let Some(ore) = rng.weighted_index(&ore_weights).and_then(|index| content.ore.ore_types.get(index)) else {
            break;
        };
        let richness = rng
            .weighted_index(&def.richness.as_array())
            .map_or(Richness::Normal, |index| Richness::ALL[index]);
        let amount = ore.amount(richness);
        spawned.push(insert_patch(world, &ore.item_id, richness, cell, amount, ring));
    }
    tracing::debug!(ring, seed, patches = spawned.len(), "Ring patches generated");
    spawned
}

fn process_renewals(world: &mut WorldState, ctx: &mut SystemContext<'_>) {
    let wave = world.threat.wave_index;
    if world.threat.is_wave_active || wave == 0 || world.ore_lifecycle.last_renewal_wave_processed >= wave {
        return;
    }
    world.ore_lifecycle.last_renewal_wave_processed = wave;
    if world.ore_lifecycle.renewal_queue.is_empty() {
        return;
    }

    let content = ctx.content;
    let renewal = &content.ore.renewal;
    let difficulty = world.run.difficulty;
    let batch_cap = *renewal.batch_cap.get(difficulty);
    let seed = world.run.seed;

    let mut deferred = VecDeque::new();
    for _ in 0..batch_cap {
        let Some(mut request) = world.ore_lifecycle.renewal_queue.pop_front() else {
            break;
        };
        let live = world.ore_patches.values().filter(|patch| !patch.is_exhausted()).count() as u32;
        if live >= renewal.max_active_patches {
            deferred.push_back(request);
            continue;
        }
        let forced = request.skip_count >= renewal.hard_max_consecutive_skips;
        if difficulty == Difficulty::Hard && !forced {
            let roll = keyed_hash(seed, &[RENEWAL_SKIP_KEY, request.source_patch_id, u64::from(wave)]) % 100;
            if roll < u64::from(renewal.hard_skip_percent) {
                request.skip_count += 1;
                tracing::debug!(source = request.source_patch_id, skips = request.skip_count, "Renewal deferred");
                deferred.push_back(request);
                continue;
            }
        }
        let Some((cell, ring)) = renewal_cell(world, content, &request, forced) else {
            request.skip_count += 1;
            deferred.push_back(request);
            continue;
        };
        let id = spawn_renewal(world, content, &request, cell, ring);
        ctx.emit(
            ctx.event(EventKind::OreRenewalSpawned)
                .with_value(id as i64)
                .with_item(request.ore_item_id.clone()),
        );
    }

    // Deferred requests keep their place at the head of the queue.
    while let Some(request) = deferred.pop_back() {
        world.ore_lifecycle.renewal_queue.push_front(request);
    }
}

/// Best free cell for a renewed patch and the revealed ring holding it:
/// far from the base with a little seeded jitter, keeping `min_spacing`
/// unless `forced`. Only cells inside a revealed ring qualify, so `None`
/// while no ring is revealed.
fn renewal_cell(
    world: &WorldState,
    content: &ContentBundle,
    request: &RenewalRequest,
    forced: bool,
) -> Option<(GridPosition, u32)> {
    let mut revealed: Vec<&OreRingDef> = content
        .ore
        .rings
        .iter()
        .filter(|def| world.ore_lifecycle.ring_state(def.ring) == RingState::Revealed)
        .collect();
    revealed.sort_by_key(|def| def.ring);
    if revealed.is_empty() {
        return None;
    }

    let renewal = &content.ore.renewal;
    let base = world.board.base;
    let seed = world.run.seed;
    let max_distance = max_distance_from(world, base).max(1);
    let jitter_weight = ratio(15, 100);
    let taken = live_patch_cells(world);

    free_cells(world)
        .into_iter()
        .filter(|&cell| cell.chebyshev_distance(base) >= renewal.min_distance_from_base)
        .filter_map(|cell| {
            let distance = cell.chebyshev_distance(base);
            revealed
                .iter()
                .find(|def| (def.min_distance..=def.max_distance).contains(&distance))
                .map(|def| (cell, def.ring))
        })
        .filter(|&(cell, _)| forced || !too_close(cell, &taken, content.ore.min_spacing))
        .map(|(cell, ring)| {
            let normalized = ratio(i64::from(cell.chebyshev_distance(base)), i64::from(max_distance));
            let jitter = unit_interval(keyed_hash(
                seed,
                &[RENEWAL_JITTER_KEY, request.source_patch_id, cell.x as u64, cell.y as u64],
            ));
            let score: Fixed = powi(normalized, renewal.edge_bias_power) + jitter * jitter_weight;
            (score, cell, ring)
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| (b.1.x, b.1.y).cmp(&(a.1.x, a.1.y))))
        .map(|(_, cell, ring)| (cell, ring))
}

fn spawn_renewal(
    world: &mut WorldState,
    content: &ContentBundle,
    request: &RenewalRequest,
    cell: GridPosition,
    ring: u32,
) -> PatchId {
    let source = world.ore_patches.get(&request.source_patch_id);
    let amount = content
        .ore
        .ore_type(&request.ore_item_id)
        .map(|ore| ore.amount(request.richness))
        .or_else(|| source.map(|patch| patch.total_ore))
        .unwrap_or(0);
    let id = insert_patch(world, &request.ore_item_id, request.richness, cell, amount, ring);
    world.ore_lifecycle.renewals_spawned += 1;
    tracing::info!(
        source = request.source_patch_id,
        patch = id,
        x = cell.x,
        y = cell.y,
        ring,
        skips = request.skip_count,
        "Ore patch renewed"
    );
    id
}

fn insert_patch(
    world: &mut WorldState,
    ore_item_id: &str,
    richness: Richness,
    cell: GridPosition,
    amount: u32,
    ring: u32,
) -> PatchId {
    let id = world.ore_lifecycle.allocate_patch_id();
    let position = world.board.elevated(cell.x, cell.y);
    world.ore_patches.insert(
        id,
        OrePatch {
            id,
            ore_item_id: ore_item_id.to_string(),
            richness,
            position,
            total_ore: amount,
            remaining_ore: amount,
            bound_miner_id: None,
            reveal_ring: ring,
            is_revealed: true,
            exhausted_at_tick: None,
            renewal_queued: false,
        },
    );
    world.board.restrict(cell.flattened());
    id
}

/// Board cells with no terrain, restriction, structure or patch, in row
/// order.
fn free_cells(world: &WorldState) -> Vec<GridPosition> {
    let board = &world.board;
    (0..board.height as i32)
        .flat_map(|y| (0..board.width as i32).map(move |x| GridPosition::new(x, y)))
        .filter(|&cell| {
            !board.is_blocked(cell)
                && !board.is_restricted(cell)
                && !world.is_occupied(cell)
                && world.patch_at(cell).is_none()
        })
        .collect()
}

fn live_patch_cells(world: &WorldState) -> Vec<GridPosition> {
    world
        .ore_patches
        .values()
        .filter(|patch| !patch.is_exhausted())
        .map(|patch| patch.position)
        .collect()
}

fn too_close(cell: GridPosition, taken: &[GridPosition], spacing: u32) -> bool {
    taken.iter().any(|&other| cell.chebyshev_distance(other) < spacing)
}

fn max_distance_from(world: &WorldState, origin: GridPosition) -> u32 {
    let board = &world.board;
    let far_x = (board.width as i32 - 1 - origin.x).max(origin.x);
    let far_y = (board.height as i32 - 1 - origin.y).max(origin.y);
    far_x.max(far_y).max(0) as u32
}
