//! The world aggregate.
//!
//! [`WorldState`] owns every piece of mutable simulation state. Systems
//! receive it as `&mut WorldState`; cross references between parts are
//! plain ids resolved through lookups, never pointers.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::board::{BoardState, ExpansionInsets};
use crate::bottleneck::BottleneckState;
use crate::combat::CombatState;
use crate::components::{items, Direction, Entity, EntityId, GridPosition, PatchId};
use crate::data::{ContentBundle, Difficulty, Richness};
use crate::economy::EconomyState;
use crate::entity_store::{EntityStore, StructureSpawn};
use crate::ore::{OreLifecycleState, OrePatch, RingState};
use crate::simulation::TICK_RATE;
use crate::structures::StructureType;
use crate::systems::ore_lifecycle;
use crate::threat::ThreatState;

/// Run phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RunPhase {
    /// Building time before the first wave.
    #[default]
    GracePeriod,
    /// Waves are running.
    Playing,
    /// The HQ fell. Waves and spawning stop.
    GameOver,
}

/// Run metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RunState {
    /// Current phase.
    pub phase: RunPhase,
    /// Difficulty chosen at bootstrap.
    pub difficulty: Difficulty,
    /// World seed.
    pub seed: u64,
    /// The HQ entity.
    pub hq_entity_id: Option<EntityId>,
    /// Set by the extract command; no further waves are scheduled.
    pub extracted: bool,
    /// Completed research nodes.
    pub completed_tech: BTreeSet<String>,
}

/// Complete mutable simulation state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldState {
    /// Ticks processed so far.
    pub tick: u64,
    /// Board geometry.
    pub board: BoardState,
    /// Structures, enemies and projectiles.
    pub entities: EntityStore,
    /// Ore patches by id.
    pub ore_patches: BTreeMap<PatchId, OrePatch>,
    /// Ring reveal and renewal bookkeeping.
    pub ore_lifecycle: OreLifecycleState,
    /// Items, buffers and power.
    pub economy: EconomyState,
    /// Wave schedule.
    pub threat: ThreatState,
    /// Run metadata.
    pub run: RunState,
    /// Enemy, projectile and wall-network runtime.
    pub combat: CombatState,
    /// Bottleneck signals.
    pub bottleneck: BottleneckState,
}

impl WorldState {
    /// Empty world on `board`.
    #[must_use]
    pub fn new(board: BoardState, difficulty: Difficulty, seed: u64) -> Self {
        Self {
            tick: 0,
            board,
            entities: EntityStore::new(),
            ore_patches: BTreeMap::new(),
            ore_lifecycle: OreLifecycleState::default(),
            economy: EconomyState::default(),
            threat: ThreatState::default(),
            run: RunState {
                difficulty,
                seed,
                ..RunState::default()
            },
            combat: CombatState::default(),
            bottleneck: BottleneckState::default(),
        }
    }

    /// Starter world for `difficulty` and `seed` at the default tick rate.
    #[must_use]
    pub fn bootstrap(content: &ContentBundle, difficulty: Difficulty, seed: u64) -> Self {
        Self::bootstrap_at_rate(content, difficulty, seed, TICK_RATE)
    }

    /// Starter world with the threat schedule expressed at `tick_rate`.
    #[must_use]
    pub fn bootstrap_at_rate(content: &ContentBundle, difficulty: Difficulty, seed: u64, tick_rate: u32) -> Self {
        let mut world = Self::new(BoardState::from_def(&content.board), difficulty, seed);
        world.threat = ThreatState::for_difficulty(content.difficulty.get(difficulty), tick_rate);

        let base = world.board.base;
        for cell in StructureType::Hq.covered_cells(base) {
            world.board.restrict(cell);
        }
        let hq = world.spawn_structure(StructureSpawn::new(StructureType::Hq, base).with_health(content.hq.health));
        world.run.hq_entity_id = Some(hq);

        let at = |dx: i32, dy: i32| world_cell(base, dx, dy);
        world.spawn_structure(StructureSpawn::new(StructureType::PowerPlant, at(-1, -2)));

        let starter_patch = world.ore_lifecycle.allocate_patch_id();
        let amount = content
            .ore
            .ore_type(items::ORE_IRON)
            .map_or(500, |ore| ore.amount(Richness::Normal));
        let patch_cell = at(0, -3);
        world.ore_patches.insert(
            starter_patch,
            OrePatch {
                id: starter_patch,
                ore_item_id: items::ORE_IRON.to_string(),
                richness: Richness::Normal,
                position: patch_cell,
                total_ore: amount,
                remaining_ore: amount,
                bound_miner_id: None,
                reveal_ring: 0,
                is_revealed: true,
                exhausted_at_tick: None,
                renewal_queued: false,
            },
        );
        world.board.restrict(patch_cell);
        world.spawn_structure(StructureSpawn::new(StructureType::Miner, at(0, -2)).bound_to(starter_patch));
        world.spawn_structure(StructureSpawn::new(StructureType::Smelter, at(1, -2)));
        world.spawn_structure(StructureSpawn::new(StructureType::AmmoModule, at(2, -2)));

        let walls: Vec<EntityId> = (-1..=1)
            .map(|dy| world.spawn_structure(StructureSpawn::new(StructureType::Wall, at(3, dy))))
            .collect();
        for (index, wall) in [(0usize, -1), (2, 1)] {
            if let Some(&wall_id) = walls.get(index) {
                world.spawn_structure(
                    StructureSpawn::new(StructureType::TurretMount, at(3, wall))
                        .on_wall(wall_id)
                        .with_turret(content.default_turret_id.clone()),
                );
            }
        }

        for (item_id, quantity) in [
            (items::ORE_IRON, 10),
            (items::AMMO_LIGHT, 80),
            (items::PLATE_IRON, 12),
            (items::PLATE_COPPER, 4),
            (items::PLATE_STEEL, 4),
            (items::GEAR, 6),
            (items::CIRCUIT, 4),
        ] {
            world.economy.add_inventory(item_id, quantity);
        }
        for stack in content.hq.starting_resources.get(difficulty) {
            world.economy.add_inventory(&stack.item_id, stack.quantity);
        }

        for ring in &content.ore.rings {
            world.ore_lifecycle.advance_ring(ring.ring, RingState::Locked);
        }
        world.ore_lifecycle.advance_ring(0, RingState::Revealed);
        ore_lifecycle::reveal_ring(&mut world, content, 0);

        tracing::info!(
            ?difficulty,
            seed,
            patches = world.ore_patches.len(),
            structures = world.entities.structures().count(),
            "World bootstrapped"
        );
        world
    }

    /// Spawn a structure and create its economy records. Miners claim their
    /// bound patch.
    pub fn spawn_structure(&mut self, spawn: StructureSpawn) -> EntityId {
        let structure_type = spawn.structure_type;
        let patch = spawn.bound_patch_id;
        let id = self.entities.spawn_structure(spawn);
        self.economy.register_structure(id, structure_type);
        if let Some(patch) = patch.and_then(|patch| self.ore_patches.get_mut(&patch)) {
            patch.bound_miner_id = Some(id);
        }
        id
    }

    /// Remove a structure together with everything that depends on it.
    ///
    /// Turret mounts hosted on a removed wall go with it. Returns the removed
    /// entities, the requested one first; empty if `id` is not a structure.
    pub fn remove_structure(&mut self, id: EntityId) -> Vec<Entity> {
        if !self.entities.get(id).is_some_and(|entity| entity.structure_type.is_some()) {
            return Vec::new();
        }
        let hosted: Vec<EntityId> = self
            .entities
            .structures_of(StructureType::TurretMount)
            .filter(|turret| turret.host_wall_id == Some(id))
            .map(|turret| turret.id)
            .collect();

        let mut removed = Vec::with_capacity(1 + hosted.len());
        for target in std::iter::once(id).chain(hosted) {
            let Some(entity) = self.entities.remove(target) else {
                continue;
            };
            self.economy.unregister_structure(target);
            self.combat.forget_entity(target);
            if let Some(patch) = entity.bound_patch_id.and_then(|patch| self.ore_patches.get_mut(&patch)) {
                if patch.bound_miner_id == Some(target) {
                    patch.bound_miner_id = None;
                }
            }
            removed.push(entity);
        }
        removed
    }

    /// Damage a structure, removing it (and its dependents) at zero health.
    ///
    /// Returns the remaining health, or `None` if the structure is gone.
    pub fn damage_structure(&mut self, id: EntityId, amount: u32) -> Option<u32> {
        let entity = self.entities.get_mut(id)?;
        entity.health = entity.health.saturating_sub(amount);
        let remaining = entity.health;
        if remaining == 0 {
            self.remove_structure(id);
        }
        Some(remaining)
    }

    /// Remove an enemy or projectile and its runtime record.
    pub fn remove_unit(&mut self, id: EntityId) -> Option<Entity> {
        self.combat.forget_entity(id);
        self.entities.remove(id)
    }

    /// Grow the board and shift every stored position by the inset.
    pub fn apply_expansion(&mut self, insets: &ExpansionInsets) {
        if insets.is_empty() {
            return;
        }
        let (dx, dy) = insets.shift();
        self.board.apply_expansion(insets);
        self.entities.translate_all(dx, dy);
        for patch in self.ore_patches.values_mut() {
            patch.position = patch.position.translated(dx, dy);
        }
        for projectile in self.combat.projectiles.values_mut() {
            projectile.target_last_position = projectile.target_last_position.translated(dx, dy);
        }
        // Positions changed, so the cached topology no longer matches.
        self.combat.wall_topology.clear();
    }

    /// The HQ entity.
    #[must_use]
    pub fn hq(&self) -> Option<&Entity> {
        self.run.hq_entity_id.and_then(|id| self.entities.get(id))
    }

    /// Patch whose cell is `(x, y)`.
    #[must_use]
    pub fn patch_at(&self, cell: GridPosition) -> Option<&OrePatch> {
        self.ore_patches
            .values()
            .find(|patch| patch.position.same_cell(cell))
    }

    /// Revealed, non-exhausted, unbound patches covering or orthogonally
    /// adjacent to `cells`, in ascending id order.
    #[must_use]
    pub fn minable_patches_near(&self, cells: &[GridPosition]) -> Vec<PatchId> {
        self.ore_patches
            .values()
            .filter(|patch| patch.is_minable() && patch.bound_miner_id.is_none())
            .filter(|patch| {
                cells.iter().any(|&cell| {
                    patch.position.same_cell(cell)
                        || Direction::ALL
                            .iter()
                            .any(|&direction| patch.position.same_cell(cell.neighbor(direction)))
                })
            })
            .map(|patch| patch.id)
            .collect()
    }

    /// Whether any structure covers `(x, y)`.
    #[must_use]
    pub fn is_occupied(&self, cell: GridPosition) -> bool {
        self.entities.structures_covering(cell).next().is_some()
    }
}

fn world_cell(base: GridPosition, dx: i32, dy: i32) -> GridPosition {
    base.translated(dx, dy).flattened()
}
