//! Combat state: enemy and projectile runtimes, turret cadence, and wall
//! networks.
//!
//! Wall networks group walls that are cardinally adjacent in the `(x, y)`
//! plane. Elevation is ignored, so a wall on a ramp still links to its
//! ground-level neighbour. Each network owns a shared ammo pool used by every
//! turret mounted on a member wall.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, GridPosition, ItemId, NetworkId};
use crate::economy::{buffer_add, buffer_take, buffer_total, ItemBuffer};
use crate::entity_store::EntityStore;
use crate::structures::StructureType;

/// Per-enemy data not stored on the entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnemyRuntime {
    /// Enemy definition id.
    pub enemy_def_id: String,
    /// Wave number that spawned it (0 for trickle and raids).
    pub wave_number: u32,
    /// Steps once every this many ticks.
    pub move_every_ticks: u32,
    /// Damage dealt to the HQ on arrival.
    pub base_damage: u32,
    /// Damage dealt to a structure per attack.
    pub structure_damage: u32,
    /// Currency granted on death.
    pub reward: u32,
}

/// Per-projectile flight data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectileRuntime {
    /// Turret that fired it.
    pub source_turret_id: EntityId,
    /// Enemy it is flying at.
    pub target_enemy_id: EntityId,
    /// Damage applied on arrival.
    pub damage: u32,
    /// Ammo item it was made from.
    pub ammo_item_id: ItemId,
    /// Arrival tick.
    pub impact_tick: u64,
    /// Where the target was last seen.
    pub target_last_position: GridPosition,
}

/// A connected group of walls sharing an ammo pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WallNetworkState {
    /// Network id (lowest member wall id).
    pub id: NetworkId,
    /// Member walls in ascending id order.
    pub wall_ids: Vec<EntityId>,
    /// Shared ammo.
    pub ammo_pool: ItemBuffer,
    /// Maximum pooled ammo.
    pub capacity: u32,
}

impl WallNetworkState {
    /// Ammo currently pooled.
    #[must_use]
    pub fn pool_total(&self) -> u32 {
        buffer_total(&self.ammo_pool)
    }

    /// Room left in the pool.
    #[must_use]
    pub fn free_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.pool_total())
    }
}

/// Combat-side world state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CombatState {
    /// Live enemies.
    pub enemies: BTreeMap<EntityId, EnemyRuntime>,
    /// Projectiles in flight.
    pub projectiles: BTreeMap<EntityId, ProjectileRuntime>,
    /// Last tick each turret attempted to fire.
    pub last_fire_tick: BTreeMap<EntityId, u64>,
    /// Wall networks keyed by id.
    pub wall_networks: BTreeMap<NetworkId, WallNetworkState>,
    /// Wall to network index.
    pub network_by_wall: BTreeMap<EntityId, NetworkId>,
    /// Wall layout the networks were built from: `(id, x, y)`.
    pub wall_topology: Vec<(EntityId, i32, i32)>,
}

impl CombatState {
    /// Network a turret draws from, via its host wall.
    #[must_use]
    pub fn network_for_wall(&self, wall_id: EntityId) -> Option<NetworkId> {
        self.network_by_wall.get(&wall_id).copied()
    }

    /// Rebuild wall networks if the wall layout changed.
    ///
    /// Pools are carried over in proportion to how many surviving walls of
    /// each old network land in each new one. Ammo that no longer fits
    /// (destroyed walls, shrunken capacity) is returned for the caller to
    /// put back into the global inventory. Returns `None` when the layout is
    /// unchanged.
    pub fn rebuild_wall_networks(&mut self, entities: &EntityStore, ammo_per_wall: u32) -> Option<ItemBuffer> {
        let topology: Vec<(EntityId, i32, i32)> = entities
            .structures_of(StructureType::Wall)
            .map(|wall| (wall.id, wall.position.x, wall.position.y))
            .collect();
        if topology == self.wall_topology {
            return None;
        }

        let components = connected_components(&topology);
        let mut network_by_wall = BTreeMap::new();
        let mut networks: BTreeMap<NetworkId, WallNetworkState> = BTreeMap::new();
        for members in components {
            let id = members[0];
            for &wall in &members {
                network_by_wall.insert(wall, id);
            }
            let capacity = ammo_per_wall.saturating_mul(members.len() as u32);
            networks.insert(
                id,
                WallNetworkState {
                    id,
                    wall_ids: members,
                    ammo_pool: ItemBuffer::new(),
                    capacity,
                },
            );
        }

        let mut spill = ItemBuffer::new();
        for old in std::mem::take(&mut self.wall_networks).into_values() {
            let mut shares: BTreeMap<NetworkId, u32> = BTreeMap::new();
            for wall in &old.wall_ids {
                if let Some(&network) = network_by_wall.get(wall) {
                    *shares.entry(network).or_insert(0) += 1;
                }
            }
            let survivors: u32 = shares.values().sum();
            if survivors == 0 {
                for (item_id, quantity) in old.ammo_pool {
                    buffer_add(&mut spill, &item_id, quantity);
                }
                continue;
            }
            // Largest share takes the rounding remainder; ties go to the lowest id.
            let heir = shares
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                .map(|(&id, _)| id)
                .unwrap_or(old.id);
            for (item_id, quantity) in &old.ammo_pool {
                let mut distributed = 0;
                for (&network, &count) in &shares {
                    let share = (u64::from(*quantity) * u64::from(count) / u64::from(survivors)) as u32;
                    distributed += share;
                    if let Some(target) = networks.get_mut(&network) {
                        buffer_add(&mut target.ammo_pool, item_id, share);
                    }
                }
                if let Some(target) = networks.get_mut(&heir) {
                    buffer_add(&mut target.ammo_pool, item_id, quantity - distributed);
                }
            }
        }

        for network in networks.values_mut() {
            while network.pool_total() > network.capacity {
                let excess = network.pool_total() - network.capacity;
                let Some(item_id) = network.ammo_pool.keys().next_back().cloned() else {
                    break;
                };
                let taken = buffer_take(&mut network.ammo_pool, &item_id, excess);
                buffer_add(&mut spill, &item_id, taken);
            }
        }

        self.wall_networks = networks;
        self.network_by_wall = network_by_wall;
        self.wall_topology = topology;
        Some(spill)
    }

    /// Forget per-entity records for a removed structure or enemy.
    pub fn forget_entity(&mut self, id: EntityId) {
        self.enemies.remove(&id);
        self.projectiles.remove(&id);
        self.last_fire_tick.remove(&id);
    }
}

/// Group walls by `(x, y)` cardinal adjacency. Components are listed in
/// ascending order of their lowest wall id, members ascending.
fn connected_components(walls: &[(EntityId, i32, i32)]) -> Vec<Vec<EntityId>> {
    let mut by_cell: BTreeMap<(i32, i32), Vec<EntityId>> = BTreeMap::new();
    for &(id, x, y) in walls {
        by_cell.entry((x, y)).or_default().push(id);
    }
    let position: BTreeMap<EntityId, (i32, i32)> = walls.iter().map(|&(id, x, y)| (id, (x, y))).collect();

    let mut visited = BTreeSet::new();
    let mut components = Vec::new();
    for &(start, _, _) in walls {
        if !visited.insert(start) {
            continue;
        }
        let mut members = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let (x, y) = position[&current];
            for (nx, ny) in [(x, y - 1), (x + 1, y), (x, y + 1), (x - 1, y), (x, y)] {
                for &neighbor in by_cell.get(&(nx, ny)).into_iter().flatten() {
                    if visited.insert(neighbor) {
                        members.push(neighbor);
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        members.sort_unstable();
        components.push(members);
    }
    components.sort_by_key(|members| members[0]);
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::items;
    use crate::entity_store::StructureSpawn;

    fn wall(store: &mut EntityStore, x: i32, y: i32, z: i32) -> EntityId {
        store.spawn_structure(StructureSpawn::new(StructureType::Wall, GridPosition::with_z(x, y, z)))
    }

    #[test]
    fn test_networks_ignore_elevation() {
        let mut store = EntityStore::new();
        let a = wall(&mut store, 5, 5, 0);
        let b = wall(&mut store, 6, 5, 1);
        let c = wall(&mut store, 9, 9, 0);
        let mut combat = CombatState::default();
        combat.rebuild_wall_networks(&store, 8).unwrap();

        assert_eq!(combat.wall_networks.len(), 2);
        assert_eq!(combat.network_for_wall(a), combat.network_for_wall(b));
        assert_ne!(combat.network_for_wall(a), combat.network_for_wall(c));
        assert_eq!(combat.wall_networks[&a].capacity, 16);
    }

    #[test]
    fn test_unchanged_topology_is_not_rebuilt() {
        let mut store = EntityStore::new();
        wall(&mut store, 1, 1, 0);
        let mut combat = CombatState::default();
        assert!(combat.rebuild_wall_networks(&store, 8).is_some());
        assert!(combat.rebuild_wall_networks(&store, 8).is_none());
    }

    #[test]
    fn test_split_distributes_pool_by_survivors() {
        let mut store = EntityStore::new();
        let a = wall(&mut store, 1, 1, 0);
        let middle = wall(&mut store, 2, 1, 0);
        let c = wall(&mut store, 3, 1, 0);
        let mut combat = CombatState::default();
        combat.rebuild_wall_networks(&store, 8).unwrap();
        buffer_add(&mut combat.wall_networks.get_mut(&a).unwrap().ammo_pool, items::AMMO_LIGHT, 9);

        store.remove(middle);
        let spill = combat.rebuild_wall_networks(&store, 8).unwrap();
        assert!(spill.is_empty());
        let left = combat.wall_networks[&a].pool_total();
        let right = combat.wall_networks[&c].pool_total();
        assert_eq!(left + right, 9);
        assert_eq!((left, right), (5, 4));
    }

    #[test]
    fn test_overflow_spills_when_capacity_shrinks() {
        let mut store = EntityStore::new();
        let a = wall(&mut store, 1, 1, 0);
        let b = wall(&mut store, 1, 2, 0);
        let mut combat = CombatState::default();
        combat.rebuild_wall_networks(&store, 8).unwrap();
        buffer_add(&mut combat.wall_networks.get_mut(&a).unwrap().ammo_pool, items::AMMO_LIGHT, 16);

        store.remove(b);
        let spill = combat.rebuild_wall_networks(&store, 8).unwrap();
        assert_eq!(combat.wall_networks[&a].pool_total(), 8);
        assert_eq!(spill.get(items::AMMO_LIGHT), Some(&8));
    }
}
