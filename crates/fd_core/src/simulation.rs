//! The simulation engine.
//!
//! [`SimulationEngine`] owns the [`WorldState`], the read-only content and
//! config, the ordered system pipeline and the command queue. One call to
//! [`SimulationEngine::step`] processes exactly one tick.
//!
//! # Determinism
//!
//! - No floating-point math (fractional values use [`crate::math::Fixed`])
//! - No system randomness (ore and raid rolls are seeded from the world seed)
//! - Every keyed collection is ordered, so iteration order is stable
//! - Commands sharing a tick are applied in a total order
//!
//! # Example
//!
//! ```
//! use fd_core::commands::{CommandPayload, PlayerCommand};
//! use fd_core::config::SimulationConfig;
//! use fd_core::data::{ContentBundle, Difficulty};
//! use fd_core::simulation::SimulationEngine;
//!
//! let mut engine = SimulationEngine::bootstrap(
//!     ContentBundle::standard(),
//!     SimulationConfig::default(),
//!     Difficulty::Normal,
//!     7,
//! );
//! engine.enqueue(PlayerCommand::new(1, CommandPayload::TriggerWave));
//! engine.run(40);
//! assert_eq!(engine.tick(), 40);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::mpsc::{self, Receiver, SendError, Sender};

use crate::commands::{sort_commands, PlayerCommand};
use crate::config::SimulationConfig;
use crate::data::{ContentBundle, Difficulty};
use crate::events::SimEvent;
use crate::snapshot::WorldSnapshot;
use crate::systems::{default_pipeline, SimulationSystem, SystemContext};
use crate::world::WorldState;

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 20;

/// Duration of one tick in milliseconds.
pub const TICK_DURATION_MS: u32 = 1000 / TICK_RATE;

/// Cloneable handle for submitting commands from another thread.
///
/// Commands sent here are moved into the engine's queue at the start of the
/// next [`SimulationEngine::step`].
#[derive(Debug, Clone)]
pub struct CommandSender {
    inner: Sender<PlayerCommand>,
}

impl CommandSender {
    /// Submit a command. Fails only if the engine was dropped.
    pub fn send(&self, command: PlayerCommand) -> Result<(), SendError<PlayerCommand>> {
        self.inner.send(command)
    }
}

/// Deterministic tick engine.
pub struct SimulationEngine {
    world: WorldState,
    content: ContentBundle,
    config: SimulationConfig,
    systems: Vec<Box<dyn SimulationSystem>>,
    queue: BTreeMap<u64, Vec<PlayerCommand>>,
    inbox: Receiver<PlayerCommand>,
    outbox: Sender<PlayerCommand>,
}

impl fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let systems: Vec<&str> = self.systems.iter().map(|system| system.name()).collect();
        f.debug_struct("SimulationEngine")
            .field("tick", &self.world.tick)
            .field("systems", &systems)
            .field("queued_ticks", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl SimulationEngine {
    /// Engine over an existing world with the default pipeline.
    #[must_use]
    pub fn new(world: WorldState, content: ContentBundle, config: SimulationConfig) -> Self {
        Self::with_systems(world, content, config, default_pipeline())
    }

    /// Engine over a freshly bootstrapped world.
    #[must_use]
    pub fn bootstrap(content: ContentBundle, config: SimulationConfig, difficulty: Difficulty, seed: u64) -> Self {
        let world = WorldState::bootstrap_at_rate(&content, difficulty, seed, config.tick_rate);
        Self::new(world, content, config)
    }

    /// Engine with a custom pipeline, run in the given order.
    #[must_use]
    pub fn with_systems(
        world: WorldState,
        content: ContentBundle,
        config: SimulationConfig,
        systems: Vec<Box<dyn SimulationSystem>>,
    ) -> Self {
        let (outbox, inbox) = mpsc::channel();
        Self {
            world,
            content,
            config,
            systems,
            queue: BTreeMap::new(),
            inbox,
            outbox,
        }
    }

    /// Restore an engine from a snapshot, including its queued commands.
    #[must_use]
    pub fn from_snapshot(snapshot: WorldSnapshot, content: ContentBundle, config: SimulationConfig) -> Self {
        let mut engine = Self::new(snapshot.world, content, config);
        for command in snapshot.queued_commands {
            engine.enqueue(command);
        }
        engine
    }

    /// Handle for submitting commands from another execution context.
    #[must_use]
    pub fn command_sender(&self) -> CommandSender {
        CommandSender {
            inner: self.outbox.clone(),
        }
    }

    /// Queue a command for its tick.
    ///
    /// Returns `false` (and drops the command) if its tick was already
    /// processed.
    pub fn enqueue(&mut self, command: PlayerCommand) -> bool {
        if command.tick < self.world.tick {
            tracing::warn!(
                command_tick = command.tick,
                current_tick = self.world.tick,
                actor = command.actor,
                "Discarding command for a processed tick"
            );
            return false;
        }
        self.queue.entry(command.tick).or_default().push(command);
        true
    }

    /// Process one tick and return its events.
    pub fn step(&mut self) -> Vec<SimEvent> {
        while let Ok(command) = self.inbox.try_recv() {
            self.enqueue(command);
        }

        let tick = self.world.tick;
        let mut due = self.queue.remove(&tick).unwrap_or_default();
        sort_commands(&mut due);

        let mut ctx = SystemContext::new(tick, &self.content, &self.config, due);
        for system in &mut self.systems {
            system.update(&mut self.world, &mut ctx);
            tracing::trace!(tick, system = system.name(), events = ctx.events.len(), "System updated");
        }
        let events = ctx.events;
        self.world.tick += 1;

        #[cfg(feature = "debug-validation")]
        for violation in validate(&self.world) {
            tracing::error!(tick, %violation, "World invariant violated");
        }

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick, state_hash = hash, events = events.len(), "Tick complete");
        }

        events
    }

    /// Run `ticks` steps and return every event in order.
    pub fn run(&mut self, ticks: u64) -> Vec<SimEvent> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            events.extend(self.step());
        }
        events
    }

    /// Current world state.
    #[must_use]
    pub const fn world(&self) -> &WorldState {
        &self.world
    }

    /// Content the engine runs on.
    #[must_use]
    pub const fn content(&self) -> &ContentBundle {
        &self.content
    }

    /// Tunables the engine runs with.
    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Next tick to process.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.world.tick
    }

    /// Commands waiting for future ticks, in application order.
    #[must_use]
    pub fn queued_commands(&self) -> Vec<PlayerCommand> {
        let mut commands: Vec<PlayerCommand> = self.queue.values().flatten().cloned().collect();
        sort_commands(&mut commands);
        commands
    }

    /// Fast in-process hash of the world for comparing engines.
    ///
    /// Not stable across builds; use [`WorldSnapshot::digest_hex`] for
    /// anything recorded.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.world.hash(&mut hasher);
        hasher.finish()
    }

    /// Copy of the world plus every queued command.
    ///
    /// Commands still in flight on a [`CommandSender`] are picked up by the
    /// next step, not by this snapshot.
    #[must_use]
    pub fn make_snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::new(self.world.clone(), self.queued_commands())
    }
}

/// Cross-reference checks run after every tick with `debug-validation`.
#[cfg(feature = "debug-validation")]
fn validate(world: &WorldState) -> Vec<String> {
    let mut violations = Vec::new();
    for id in world.combat.enemies.keys().chain(world.combat.projectiles.keys()) {
        if !world.entities.contains(*id) {
            violations.push(format!("runtime record for missing entity {id}"));
        }
    }
    for patch in world.ore_patches.values() {
        if patch.remaining_ore > patch.total_ore {
            violations.push(format!("patch {} holds more ore than it started with", patch.id));
        }
        if let Some(miner) = patch.bound_miner_id {
            if !world.entities.contains(miner) {
                violations.push(format!("patch {} bound to missing miner {miner}", patch.id));
            }
        }
    }
    if world.run.phase != crate::world::RunPhase::GameOver && world.hq().is_none() {
        violations.push("HQ missing while the run is live".to_string());
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{BuildRequest, CommandPayload};
    use crate::components::{Direction, GridPosition};
    use crate::events::EventKind;
    use crate::structures::StructureType;

    fn engine(seed: u64) -> SimulationEngine {
        SimulationEngine::bootstrap(ContentBundle::standard(), SimulationConfig::default(), Difficulty::Normal, seed)
    }

    fn wall_at(tick: u64, x: i32, y: i32) -> PlayerCommand {
        PlayerCommand::new(
            tick,
            CommandPayload::PlaceStructure(BuildRequest::new(StructureType::Wall, GridPosition::new(x, y))),
        )
    }

    #[test]
    fn test_step_advances_tick() {
        let mut engine = engine(1);
        assert_eq!(engine.tick(), 0);
        engine.step();
        engine.run(9);
        assert_eq!(engine.tick(), 10);
        assert_eq!(engine.world().tick, 10);
    }

    #[test]
    fn test_commands_apply_on_their_tick() {
        let mut engine = engine(1);
        assert!(engine.enqueue(wall_at(3, 6, 1)));
        let walls = engine.world().entities.structures_of(StructureType::Wall).count();

        let early = engine.run(3);
        assert!(early.iter().all(|event| event.kind != EventKind::StructurePlaced));
        let events = engine.step();
        assert!(events.iter().any(|event| event.kind == EventKind::StructurePlaced && event.tick == 3));
        assert_eq!(engine.world().entities.structures_of(StructureType::Wall).count(), walls + 1);
    }

    #[test]
    fn test_stale_commands_are_discarded() {
        let mut engine = engine(1);
        engine.run(5);
        assert!(!engine.enqueue(wall_at(2, 6, 1)));
        assert!(engine.queued_commands().is_empty());
    }

    #[test]
    fn test_sender_feeds_next_step() {
        let mut engine = engine(1);
        let sender = engine.command_sender();
        let handle = std::thread::spawn(move || sender.send(wall_at(0, 6, 1)).is_ok());
        assert!(handle.join().unwrap());

        let events = engine.step();
        assert!(events.iter().any(|event| event.kind == EventKind::StructurePlaced));
    }

    #[test]
    fn test_identical_engines_agree() {
        let mut a = engine(42);
        let mut b = engine(42);
        for command in [wall_at(2, 6, 1), PlayerCommand::new(4, CommandPayload::TriggerWave)] {
            a.enqueue(command.clone());
            b.enqueue(command);
        }
        a.run(300);
        b.run(300);
        assert_eq!(a.state_hash(), b.state_hash());
        assert_eq!(a.world(), b.world());
    }

    #[test]
    fn test_same_cell_rotations_ignore_enqueue_order() {
        let rotated = |rotation| {
            PlayerCommand::new(
                3,
                CommandPayload::PlaceStructure(
                    BuildRequest::new(StructureType::Wall, GridPosition::new(30, 40)).with_rotation(rotation),
                ),
            )
        };
        let north = rotated(Direction::North);
        let south = rotated(Direction::South);

        let mut a = engine(5);
        a.enqueue(north.clone());
        a.enqueue(south.clone());
        let mut b = engine(5);
        b.enqueue(south);
        b.enqueue(north);
        a.run(6);
        b.run(6);

        assert_eq!(
            a.make_snapshot().digest_hex().unwrap(),
            b.make_snapshot().digest_hex().unwrap()
        );
    }

    #[test]
    fn test_snapshot_restore_continues_identically() {
        let mut original = engine(9);
        original.enqueue(PlayerCommand::new(1, CommandPayload::TriggerWave));
        original.enqueue(wall_at(80, 6, 1));
        original.run(40);

        let snapshot = original.make_snapshot();
        assert_eq!(snapshot.queued_commands.len(), 1);
        let mut restored = SimulationEngine::from_snapshot(snapshot, ContentBundle::standard(), SimulationConfig::default());

        original.run(120);
        restored.run(120);
        assert_eq!(original.world(), restored.world());
    }

    #[test]
    fn test_debug_lists_pipeline() {
        let rendered = format!("{:?}", engine(1));
        assert!(rendered.contains("command"));
        assert!(rendered.contains("bottleneck"));
    }
}
