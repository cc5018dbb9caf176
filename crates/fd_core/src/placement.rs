//! Placement validation.
//!
//! [`can_place`] answers whether a structure may occupy a cell right now.
//! It never mutates the world; the command system re-runs it against current
//! state before applying a placement.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, GridPosition, PatchId};
use crate::pathfinding::{CellType, NavGrid};
use crate::structures::StructureType;
use crate::world::WorldState;

/// Outcome of a placement or removal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementResult {
    /// Placement is allowed.
    Ok,
    /// A covered cell is blocked or already holds a structure.
    Occupied,
    /// The footprint leaves the board.
    OutOfBounds,
    /// Enemies could no longer reach the base from the spawn edge.
    BlocksCriticalPath,
    /// A covered cell is reserved.
    RestrictedZone,
    /// The build cost cannot be paid.
    InsufficientResources,
    /// No usable ore patch for a miner.
    InvalidMinerPlacement,
    /// No wall to mount a turret on.
    InvalidTurretMountPlacement,
    /// The structure cannot be removed.
    InvalidRemoval,
}

impl PlacementResult {
    /// Stable numeric code carried in events.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Occupied => 1,
            Self::OutOfBounds => 2,
            Self::BlocksCriticalPath => 3,
            Self::RestrictedZone => 4,
            Self::InsufficientResources => 5,
            Self::InvalidMinerPlacement => 6,
            Self::InvalidTurretMountPlacement => 7,
            Self::InvalidRemoval => 8,
        }
    }

    /// Stable name.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Occupied => "occupied",
            Self::OutOfBounds => "out_of_bounds",
            Self::BlocksCriticalPath => "blocks_critical_path",
            Self::RestrictedZone => "restricted_zone",
            Self::InsufficientResources => "insufficient_resources",
            Self::InvalidMinerPlacement => "invalid_miner_placement",
            Self::InvalidTurretMountPlacement => "invalid_turret_mount_placement",
            Self::InvalidRemoval => "invalid_removal",
        }
    }

    /// Whether placement is allowed.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Everything needed to apply an accepted placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementPlan {
    /// Anchor with board elevation applied.
    pub anchor: GridPosition,
    /// Covered cells.
    pub cells: Vec<GridPosition>,
    /// Patch a miner binds to.
    pub bound_patch_id: Option<PatchId>,
    /// Wall a turret mount sits on.
    pub host_wall_id: Option<EntityId>,
}

/// Whether `structure_type` may be placed at `position`.
#[must_use]
pub fn can_place(
    world: &WorldState,
    structure_type: StructureType,
    position: GridPosition,
    target_patch_id: Option<PatchId>,
) -> PlacementResult {
    match plan_placement(world, structure_type, position, target_patch_id) {
        Ok(_) => PlacementResult::Ok,
        Err(result) => result,
    }
}

/// Validate a placement and resolve its bindings.
///
/// Checks run in order and the first failure wins: bounds, cell
/// availability, miner or turret rules, then spawn-to-base connectivity.
pub fn plan_placement(
    world: &WorldState,
    structure_type: StructureType,
    position: GridPosition,
    target_patch_id: Option<PatchId>,
) -> std::result::Result<PlacementPlan, PlacementResult> {
    if !structure_type.is_buildable() {
        return Err(PlacementResult::RestrictedZone);
    }
    let anchor = world.board.elevated(position.x, position.y);
    let cells = structure_type.covered_cells(anchor.flattened());
    if !cells.iter().all(|&cell| world.board.contains(cell)) {
        return Err(PlacementResult::OutOfBounds);
    }

    for &cell in &cells {
        if world.board.is_restricted(cell) {
            return Err(PlacementResult::RestrictedZone);
        }
        if world.board.is_blocked(cell) {
            return Err(PlacementResult::Occupied);
        }
        // A mount's wall and any mount already on it are judged by the host rule.
        let taken = world.entities.structures_covering(cell).any(|other| {
            structure_type != StructureType::TurretMount
                || !(other.is_structure(StructureType::Wall) || other.is_structure(StructureType::TurretMount))
        });
        if taken {
            return Err(PlacementResult::Occupied);
        }
    }

    let mut plan = PlacementPlan {
        anchor,
        cells,
        bound_patch_id: None,
        host_wall_id: None,
    };
    match structure_type {
        StructureType::Miner => {
            plan.bound_patch_id = Some(
                resolve_miner_patch(world, &plan.cells, target_patch_id)
                    .ok_or(PlacementResult::InvalidMinerPlacement)?,
            );
        }
        StructureType::TurretMount => {
            plan.host_wall_id =
                Some(resolve_turret_host(world, anchor).ok_or(PlacementResult::InvalidTurretMountPlacement)?);
        }
        _ => {}
    }

    if structure_type.blocks_movement() && !preserves_critical_path(world, &plan.cells) {
        return Err(PlacementResult::BlocksCriticalPath);
    }
    Ok(plan)
}

/// Patch a miner covering `cells` would bind to.
///
/// With a target, that patch must be revealed, unexhausted, unbound and on
/// or next to the footprint. Without one, the lowest qualifying id wins.
#[must_use]
pub fn resolve_miner_patch(
    world: &WorldState,
    cells: &[GridPosition],
    target_patch_id: Option<PatchId>,
) -> Option<PatchId> {
    let candidates = world.minable_patches_near(cells);
    match target_patch_id {
        Some(target) => candidates.contains(&target).then_some(target),
        None => candidates.first().copied(),
    }
}

/// Wall covering the turret's anchor cell, unless a mount already sits there.
#[must_use]
pub fn resolve_turret_host(world: &WorldState, anchor: GridPosition) -> Option<EntityId> {
    let cell = anchor.flattened();
    let wall = world.entities.structure_of_type_at(StructureType::Wall, cell)?;
    if world
        .entities
        .structure_of_type_at(StructureType::TurretMount, cell)
        .is_some()
    {
        return None;
    }
    Some(wall.id)
}

/// Whether some spawn-edge cell still reaches the base with `pending`
/// blocked. Boards without spawn cells always pass.
#[must_use]
pub fn preserves_critical_path(world: &WorldState, pending: &[GridPosition]) -> bool {
    let spawn_cells = world.board.spawn_cells();
    if spawn_cells.is_empty() {
        return true;
    }
    let mut grid = NavGrid::from_world(world);
    for &cell in pending {
        if !cell.same_cell(world.board.base) {
            grid.set_cell(cell.flattened(), CellType::Blocked);
        }
    }
    grid.reaches_any(world.board.base, &spawn_cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardState;
    use crate::data::{ContentBundle, Difficulty};
    use crate::entity_store::StructureSpawn;

    fn corridor_world() -> WorldState {
        let board = BoardState::new(10, 5, GridPosition::new(1, 2), 8, (0, 4));
        WorldState::new(board, Difficulty::Normal, 1)
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(PlacementResult::Ok.code(), 0);
        assert_eq!(PlacementResult::BlocksCriticalPath.code(), 3);
        assert_eq!(PlacementResult::InvalidRemoval.code(), 8);
    }

    #[test]
    fn test_out_of_bounds_first() {
        let world = corridor_world();
        assert_eq!(
            can_place(&world, StructureType::Storage, GridPosition::new(0, 0), None),
            PlacementResult::OutOfBounds
        );
        assert_eq!(
            can_place(&world, StructureType::Wall, GridPosition::new(10, 0), None),
            PlacementResult::OutOfBounds
        );
    }

    #[test]
    fn test_occupied_and_restricted() {
        let mut world = corridor_world();
        world.spawn_structure(StructureSpawn::new(StructureType::Conveyor, GridPosition::new(3, 1)));
        world.board.restrict(GridPosition::new(4, 1));
        world.board.blocked.insert(GridPosition::new(6, 1));
        assert_eq!(
            can_place(&world, StructureType::Wall, GridPosition::new(3, 1), None),
            PlacementResult::Occupied
        );
        assert_eq!(
            can_place(&world, StructureType::Wall, GridPosition::new(4, 1), None),
            PlacementResult::RestrictedZone
        );
        assert_eq!(
            can_place(&world, StructureType::Wall, GridPosition::new(6, 1), None),
            PlacementResult::Occupied
        );
        assert_eq!(
            can_place(&world, StructureType::Hq, GridPosition::new(5, 3), None),
            PlacementResult::RestrictedZone
        );
    }

    #[test]
    fn test_turret_requires_wall() {
        let mut world = corridor_world();
        assert_eq!(
            can_place(&world, StructureType::TurretMount, GridPosition::new(5, 1), None),
            PlacementResult::InvalidTurretMountPlacement
        );
        let wall = world.spawn_structure(StructureSpawn::new(StructureType::Wall, GridPosition::new(5, 1)));
        let plan = plan_placement(&world, StructureType::TurretMount, GridPosition::new(5, 1), None).unwrap();
        assert_eq!(plan.host_wall_id, Some(wall));

        world.spawn_structure(StructureSpawn::new(StructureType::TurretMount, GridPosition::new(5, 1)).on_wall(wall));
        assert_eq!(resolve_turret_host(&world, GridPosition::new(5, 1)), None);
        assert_eq!(
            can_place(&world, StructureType::TurretMount, GridPosition::new(5, 1), None),
            PlacementResult::InvalidTurretMountPlacement
        );
        assert_eq!(
            can_place(&world, StructureType::Wall, GridPosition::new(5, 1), None),
            PlacementResult::Occupied
        );
    }

    #[test]
    fn test_last_gap_blocks_critical_path() {
        let mut world = corridor_world();
        for y in 0..4 {
            world.spawn_structure(StructureSpawn::new(StructureType::Wall, GridPosition::new(5, y)));
        }
        assert_eq!(
            can_place(&world, StructureType::Wall, GridPosition::new(5, 4), None),
            PlacementResult::BlocksCriticalPath
        );
        // Transports do not block movement.
        assert_eq!(
            can_place(&world, StructureType::Conveyor, GridPosition::new(5, 4), None),
            PlacementResult::Ok
        );
    }

    #[test]
    fn test_miner_needs_revealed_patch() {
        let content = ContentBundle::standard();
        let world = WorldState::bootstrap(&content, Difficulty::Normal, 99);
        // Far from any patch.
        assert_eq!(
            can_place(&world, StructureType::Miner, GridPosition::new(2, 60), None),
            PlacementResult::InvalidMinerPlacement
        );
        let (patch_id, patch) = world
            .ore_patches
            .iter()
            .find(|(_, patch)| patch.bound_miner_id.is_none() && patch.is_minable())
            .unwrap();
        let beside = patch.position.translated(0, 1);
        if can_place(&world, StructureType::Wall, beside, None).is_ok() {
            let plan = plan_placement(&world, StructureType::Miner, beside, Some(*patch_id)).unwrap();
            assert_eq!(plan.bound_patch_id, Some(*patch_id));
        }
    }
}
