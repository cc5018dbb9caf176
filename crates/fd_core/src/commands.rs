//! Player commands.
//!
//! Commands are tagged with the tick they apply on. Commands sharing a tick
//! run in the total order of [`PlayerCommand::order_key`], so the same set of
//! commands always applies the same way regardless of arrival order.

use serde::{Deserialize, Serialize};

use crate::components::{Direction, EntityId, GridPosition, PatchId};
use crate::structures::StructureType;

/// Issuer of a command.
pub type ActorId = u32;

/// A structure placement request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Structure kind.
    pub structure_type: StructureType,
    /// Anchor cell (elevation is taken from the board).
    pub position: GridPosition,
    /// Facing.
    #[serde(default)]
    pub rotation: Direction,
    /// Patch a miner should bind to.
    #[serde(default)]
    pub target_patch_id: Option<PatchId>,
    /// Turret definition for turret mounts.
    #[serde(default)]
    pub turret_def_id: Option<String>,
}

impl BuildRequest {
    /// Request with default rotation and no bindings.
    #[must_use]
    pub fn new(structure_type: StructureType, position: GridPosition) -> Self {
        Self {
            structure_type,
            position,
            rotation: Direction::default(),
            target_patch_id: None,
            turret_def_id: None,
        }
    }

    /// Set facing.
    #[must_use]
    pub fn with_rotation(mut self, rotation: Direction) -> Self {
        self.rotation = rotation;
        self
    }

    /// Bind a miner to a patch.
    #[must_use]
    pub fn with_patch(mut self, patch_id: PatchId) -> Self {
        self.target_patch_id = Some(patch_id);
        self
    }
}

/// What a command does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandPayload {
    /// Place a structure, paying its build cost.
    PlaceStructure(BuildRequest),
    /// Demolish a structure for a partial refund.
    RemoveStructure {
        /// Structure to remove.
        entity_id: EntityId,
    },
    /// Lay a conveyor tile.
    PlaceConveyor {
        /// Tile cell.
        position: GridPosition,
        /// Direction items travel.
        direction: Direction,
    },
    /// Set a structure's facing.
    RotateBuilding {
        /// Structure to rotate.
        entity_id: EntityId,
        /// New facing.
        rotation: Direction,
    },
    /// Override a transport's input and output sides.
    ConfigureConveyorIo {
        /// Transport entity.
        entity_id: EntityId,
        /// Side items arrive from.
        input: Direction,
        /// Side items leave through.
        output: Direction,
    },
    /// Pin the recipe a producer runs.
    PinRecipe {
        /// Producer entity.
        entity_id: EntityId,
        /// Recipe to run.
        recipe_id: String,
    },
    /// Start a geology survey at a research center.
    StartOreSurvey {
        /// Survey tech node.
        node_id: String,
        /// Research center paying for it.
        research_center_id: EntityId,
    },
    /// End the grace period and start the next wave now.
    TriggerWave,
    /// End the run voluntarily; no further waves are scheduled.
    Extract,
}

impl CommandPayload {
    /// Payload-specific ordering token: kind rank, then every field of the
    /// payload. Two payloads share a token only when they are equal.
    #[must_use]
    pub fn sort_token(&self) -> (u8, i64, i64, String) {
        match self {
            Self::PlaceStructure(request) => (
                0,
                i64::from(request.position.x),
                i64::from(request.position.y),
                format!(
                    "{}/{}/{}/{}/{}",
                    request.structure_type.token(),
                    request.position.z,
                    request.rotation.token(),
                    request.target_patch_id.map_or_else(|| "-".to_string(), |id| id.to_string()),
                    request.turret_def_id.as_deref().unwrap_or("-"),
                ),
            ),
            Self::RemoveStructure { entity_id } => (1, *entity_id as i64, 0, String::new()),
            Self::PlaceConveyor { position, direction } => (
                2,
                i64::from(position.x),
                i64::from(position.y),
                direction.token().to_string(),
            ),
            Self::RotateBuilding { entity_id, rotation } => (3, *entity_id as i64, 0, rotation.token().to_string()),
            Self::ConfigureConveyorIo { entity_id, input, output } => (
                4,
                *entity_id as i64,
                0,
                format!("{}>{}", input.token(), output.token()),
            ),
            Self::PinRecipe { entity_id, recipe_id } => (5, *entity_id as i64, 0, recipe_id.clone()),
            Self::StartOreSurvey {
                node_id,
                research_center_id,
            } => (6, *research_center_id as i64, 0, node_id.clone()),
            Self::TriggerWave => (7, 0, 0, String::new()),
            Self::Extract => (8, 0, 0, String::new()),
        }
    }
}

/// A command scheduled for a tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerCommand {
    /// Tick the command applies on.
    pub tick: u64,
    /// Issuer.
    pub actor: ActorId,
    /// What to do.
    pub payload: CommandPayload,
}

impl PlayerCommand {
    /// Command from actor 0.
    #[must_use]
    pub fn new(tick: u64, payload: CommandPayload) -> Self {
        Self { tick, actor: 0, payload }
    }

    /// Set the issuer.
    #[must_use]
    pub fn by(mut self, actor: ActorId) -> Self {
        self.actor = actor;
        self
    }

    /// Total order within a tick.
    #[must_use]
    pub fn order_key(&self) -> (ActorId, (u8, i64, i64, String)) {
        (self.actor, self.payload.sort_token())
    }
}

/// Sort commands into application order. The sort is stable, so exact
/// duplicates keep their enqueue order.
pub fn sort_commands(commands: &mut [PlayerCommand]) {
    commands.sort_by_cached_key(|command| (command.tick, command.order_key()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall(tick: u64, x: i32) -> PlayerCommand {
        PlayerCommand::new(
            tick,
            CommandPayload::PlaceStructure(BuildRequest::new(StructureType::Wall, GridPosition::new(x, 1))),
        )
    }

    #[test]
    fn test_order_is_independent_of_arrival() {
        let mut a = vec![wall(3, 5), wall(3, 2), PlayerCommand::new(3, CommandPayload::TriggerWave), wall(1, 9)];
        let mut b = a.clone();
        b.reverse();
        sort_commands(&mut a);
        sort_commands(&mut b);
        assert_eq!(a, b);
        assert_eq!(a[0].tick, 1);
        assert_eq!(a[1], wall(3, 2));
        assert_eq!(a[3].payload, CommandPayload::TriggerWave);
    }

    #[test]
    fn test_placements_differing_only_in_extras_are_ordered() {
        let request = BuildRequest::new(StructureType::TurretMount, GridPosition::new(30, 40));
        let variants = vec![
            request.clone().with_rotation(Direction::South),
            request.clone().with_rotation(Direction::North),
            request.clone().with_patch(4),
            BuildRequest {
                turret_def_id: Some("turret_heavy".to_string()),
                ..request.clone()
            },
            BuildRequest {
                position: GridPosition { z: 1, ..request.position },
                ..request
            },
        ];
        let mut forward: Vec<PlayerCommand> = variants
            .into_iter()
            .map(|request| PlayerCommand::new(3, CommandPayload::PlaceStructure(request)))
            .collect();
        let mut backward = forward.clone();
        backward.reverse();
        sort_commands(&mut forward);
        sort_commands(&mut backward);
        assert_eq!(forward, backward);

        let tokens: std::collections::BTreeSet<_> = forward.iter().map(|command| command.payload.sort_token()).collect();
        assert_eq!(tokens.len(), forward.len());
    }

    #[test]
    fn test_actor_orders_first() {
        let mut commands = vec![wall(0, 1).by(2), PlayerCommand::new(0, CommandPayload::Extract).by(1)];
        sort_commands(&mut commands);
        assert_eq!(commands[0].actor, 1);
    }
}
