//! Arena of structures, enemies and projectiles.
//!
//! Ids are allocated monotonically and never reused. Storage is a `BTreeMap`
//! so every iteration is in ascending id order, which keeps system behaviour
//! and snapshot bytes deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::{Direction, Entity, EntityCategory, EntityId, GridPosition, PatchId};
use crate::structures::StructureType;

/// Parameters for spawning a structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureSpawn {
    /// Structure kind.
    pub structure_type: StructureType,
    /// Anchor cell.
    pub position: GridPosition,
    /// Facing.
    pub rotation: Direction,
    /// Health override (defaults to the type's maximum).
    pub health: Option<u32>,
    /// Hosting wall for turret mounts.
    pub host_wall_id: Option<EntityId>,
    /// Ore patch for miners.
    pub bound_patch_id: Option<PatchId>,
    /// Turret definition for turret mounts.
    pub turret_def_id: Option<String>,
}

impl StructureSpawn {
    /// Spawn parameters with defaults.
    #[must_use]
    pub fn new(structure_type: StructureType, position: GridPosition) -> Self {
        Self {
            structure_type,
            position,
            rotation: Direction::default(),
            health: None,
            host_wall_id: None,
            bound_patch_id: None,
            turret_def_id: None,
        }
    }

    /// Set facing.
    #[must_use]
    pub fn with_rotation(mut self, rotation: Direction) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set health (and maximum health).
    #[must_use]
    pub fn with_health(mut self, health: u32) -> Self {
        self.health = Some(health);
        self
    }

    /// Mount on a wall.
    #[must_use]
    pub fn on_wall(mut self, wall_id: EntityId) -> Self {
        self.host_wall_id = Some(wall_id);
        self
    }

    /// Bind a miner to a patch.
    #[must_use]
    pub fn bound_to(mut self, patch_id: PatchId) -> Self {
        self.bound_patch_id = Some(patch_id);
        self
    }

    /// Use a specific turret definition.
    #[must_use]
    pub fn with_turret(mut self, turret_def_id: impl Into<String>) -> Self {
        self.turret_def_id = Some(turret_def_id.into());
        self
    }
}

/// Entity arena keyed by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityStore {
    entities: BTreeMap<EntityId, Entity>,
    next_id: EntityId,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    /// Create an empty store. The first id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn allocate(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Id the next spawn will receive.
    #[must_use]
    pub const fn next_id(&self) -> EntityId {
        self.next_id
    }

    /// Spawn a structure.
    pub fn spawn_structure(&mut self, spawn: StructureSpawn) -> EntityId {
        let id = self.allocate();
        let max_health = spawn
            .health
            .unwrap_or_else(|| spawn.structure_type.max_health());
        self.entities.insert(
            id,
            Entity {
                id,
                category: EntityCategory::Structure,
                structure_type: Some(spawn.structure_type),
                position: spawn.position,
                rotation: spawn.rotation,
                health: max_health,
                max_health,
                host_wall_id: spawn.host_wall_id,
                bound_patch_id: spawn.bound_patch_id,
                turret_def_id: spawn.turret_def_id,
            },
        );
        id
    }

    /// Spawn an enemy.
    pub fn spawn_enemy(&mut self, position: GridPosition, health: u32) -> EntityId {
        self.spawn_unit(EntityCategory::Enemy, position, health)
    }

    /// Spawn a projectile.
    pub fn spawn_projectile(&mut self, position: GridPosition) -> EntityId {
        self.spawn_unit(EntityCategory::Projectile, position, 1)
    }

    fn spawn_unit(&mut self, category: EntityCategory, position: GridPosition, health: u32) -> EntityId {
        let id = self.allocate();
        self.entities.insert(
            id,
            Entity {
                id,
                category,
                structure_type: None,
                position,
                rotation: Direction::default(),
                health,
                max_health: health,
                host_wall_id: None,
                bound_patch_id: None,
                turret_def_id: None,
            },
        );
        id
    }

    /// Remove an entity by id.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Get an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by id.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All ids in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Iterate in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Iterate mutably in ascending id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    /// Structures in ascending id order.
    pub fn structures(&self) -> impl Iterator<Item = &Entity> {
        self.iter()
            .filter(|entity| entity.category == EntityCategory::Structure)
    }

    /// Structures of one type in ascending id order.
    pub fn structures_of(&self, structure_type: StructureType) -> impl Iterator<Item = &Entity> {
        self.iter()
            .filter(move |entity| entity.structure_type == Some(structure_type))
    }

    /// Ids of structures of one type.
    #[must_use]
    pub fn structure_ids_of(&self, structure_type: StructureType) -> Vec<EntityId> {
        self.structures_of(structure_type).map(|e| e.id).collect()
    }

    /// Enemies in ascending id order.
    pub fn enemies(&self) -> impl Iterator<Item = &Entity> {
        self.iter()
            .filter(|entity| entity.category == EntityCategory::Enemy)
    }

    /// Structure of the given type whose footprint covers `cell`.
    #[must_use]
    pub fn structure_of_type_at(&self, structure_type: StructureType, cell: GridPosition) -> Option<&Entity> {
        self.structures_of(structure_type).find(|entity| entity.covers(cell))
    }

    /// Structures whose footprint covers `cell`, in ascending id order.
    pub fn structures_covering(&self, cell: GridPosition) -> impl Iterator<Item = &Entity> {
        self.structures().filter(move |entity| entity.covers(cell))
    }

    /// Structure at `cell` for logistics purposes. Turret mounts win over
    /// the wall they sit on, otherwise the lowest id.
    #[must_use]
    pub fn structure_at(&self, cell: GridPosition) -> Option<&Entity> {
        self.structures_covering(cell)
            .min_by_key(|entity| (!entity.is_structure(StructureType::TurretMount), entity.id))
    }

    /// Whether a movement-blocking structure covers `cell`.
    #[must_use]
    pub fn blocking_structure_at(&self, cell: GridPosition) -> Option<&Entity> {
        self.structures_covering(cell).find(|entity| {
            entity
                .structure_type
                .is_some_and(StructureType::blocks_movement)
        })
    }

    /// Every entity covering `cell`, ordered by selection priority:
    /// turret mounts, other structures, enemies, projectiles; ascending id
    /// within a class.
    #[must_use]
    pub fn selectable_entities(&self, cell: GridPosition) -> Vec<&Entity> {
        let mut candidates: Vec<&Entity> = self.iter().filter(|entity| entity.covers(cell)).collect();
        candidates.sort_by_key(|entity| (selection_rank(entity), entity.id));
        candidates
    }

    /// Highest-priority entity covering `cell`.
    #[must_use]
    pub fn selectable_entity(&self, cell: GridPosition) -> Option<&Entity> {
        self.selectable_entities(cell).into_iter().next()
    }

    /// Apply damage. Returns the remaining health; the entity is removed
    /// when it reaches zero. `None` if the entity does not exist.
    pub fn damage(&mut self, id: EntityId, amount: u32) -> Option<u32> {
        let entity = self.entities.get_mut(&id)?;
        entity.health = entity.health.saturating_sub(amount);
        let remaining = entity.health;
        if remaining == 0 {
            self.entities.remove(&id);
        }
        Some(remaining)
    }

    /// Shift every entity by `(dx, dy)`.
    pub fn translate_all(&mut self, dx: i32, dy: i32) {
        for entity in self.entities.values_mut() {
            entity.position = entity.position.translated(dx, dy);
        }
    }
}

fn selection_rank(entity: &Entity) -> u8 {
    match entity.category {
        EntityCategory::Structure if entity.is_structure(StructureType::TurretMount) => 0,
        EntityCategory::Structure => 1,
        EntityCategory::Enemy => 2,
        EntityCategory::Projectile => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut store = EntityStore::new();
        let a = store.spawn_structure(StructureSpawn::new(StructureType::Wall, GridPosition::new(1, 1)));
        let b = store.spawn_enemy(GridPosition::new(2, 2), 10);
        store.remove(a);
        let c = store.spawn_projectile(GridPosition::new(3, 3));
        assert!(a < b && b < c);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_footprint_cells_resolve_to_owner() {
        let mut store = EntityStore::new();
        let plant = store.spawn_structure(StructureSpawn::new(
            StructureType::PowerPlant,
            GridPosition::new(10, 10),
        ));
        for cell in [(9, 9), (10, 9), (9, 10), (10, 10)] {
            let found = store.selectable_entity(GridPosition::new(cell.0, cell.1)).unwrap();
            assert_eq!(found.id, plant);
        }
        assert!(store.selectable_entity(GridPosition::new(11, 10)).is_none());
    }

    #[test]
    fn test_selection_priority() {
        let mut store = EntityStore::new();
        let cell = GridPosition::new(6, 1);
        let projectile = store.spawn_projectile(cell);
        let enemy = store.spawn_enemy(cell, 10);
        let wall = store.spawn_structure(StructureSpawn::new(StructureType::Wall, cell));
        let turret = store.spawn_structure(StructureSpawn::new(StructureType::TurretMount, cell).on_wall(wall));

        let order: Vec<EntityId> = store.selectable_entities(cell).iter().map(|e| e.id).collect();
        assert_eq!(order, vec![turret, wall, enemy, projectile]);
        assert_eq!(store.structure_at(cell).map(|e| e.id), Some(turret));
        assert_eq!(store.blocking_structure_at(cell).map(|e| e.id), Some(wall));
    }

    #[test]
    fn test_damage_removes_at_zero() {
        let mut store = EntityStore::new();
        let id = store.spawn_enemy(GridPosition::new(0, 0), 10);
        assert_eq!(store.damage(id, 4), Some(6));
        assert_eq!(store.damage(id, 40), Some(0));
        assert!(!store.contains(id));
        assert_eq!(store.damage(id, 1), None);
    }
}
