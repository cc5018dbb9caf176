//! # FD Core
//!
//! Deterministic simulation core for Foundry Defense.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Headless runs and CI determinism checks
//! - Command-sourced replays
//! - Byte-stable snapshots and golden digests
//!
//! ## Crate Structure
//!
//! - [`world`] - The world aggregate every system mutates
//! - [`entity_store`] - Structures, enemies and projectiles by id
//! - [`placement`] - Placement validation with connectivity checking
//! - [`systems`] - The per-tick pipeline
//! - [`simulation`] - The engine: command queue, step, snapshots
//! - [`replay`] / [`snapshot`] - Recording and restoring runs
//! - [`data`] - Read-only content definitions
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod board;
pub mod bottleneck;
pub mod combat;
pub mod commands;
pub mod components;
pub mod config;
pub mod data;
pub mod economy;
pub mod entity_store;
pub mod error;
pub mod events;
pub mod math;
pub mod ore;
pub mod pathfinding;
pub mod placement;
pub mod replay;
pub mod rng;
pub mod simulation;
pub mod snapshot;
pub mod structures;
pub mod systems;
pub mod threat;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bottleneck::{BottleneckKind, BottleneckSignal, Severity, SignalScope};
    pub use crate::commands::{BuildRequest, CommandPayload, PlayerCommand};
    pub use crate::components::{Direction, EntityId, GridPosition, ItemId, PatchId};
    pub use crate::config::SimulationConfig;
    pub use crate::data::{ContentBundle, Difficulty};
    pub use crate::error::{GameError, Result};
    pub use crate::events::{EventKind, SimEvent};
    pub use crate::math::Fixed;
    pub use crate::placement::{can_place, PlacementResult};
    pub use crate::replay::Replay;
    pub use crate::simulation::{CommandSender, SimulationEngine, TICK_RATE};
    pub use crate::snapshot::{MemorySnapshotStore, SnapshotStore, WorldSnapshot};
    pub use crate::structures::StructureType;
    pub use crate::world::{RunPhase, WorldState};
}
