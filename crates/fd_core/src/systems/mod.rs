//! The per-tick system pipeline.
//!
//! Each system is a stateless object that mutates the [`WorldState`] and
//! pushes events into the shared [`SystemContext`]. Systems run in a fixed
//! order; a system only observes another system's output through world
//! state written earlier in the same tick.

pub mod bottleneck;
pub mod combat;
pub mod command;
pub mod economy;
pub mod enemy_movement;
pub mod ore_lifecycle;
pub mod projectile;
pub mod wave;

use crate::commands::PlayerCommand;
use crate::config::SimulationConfig;
use crate::data::ContentBundle;
use crate::events::{EventKind, SimEvent};
use crate::world::WorldState;

pub use bottleneck::BottleneckSystem;
pub use combat::CombatSystem;
pub use command::CommandSystem;
pub use economy::EconomySystem;
pub use enemy_movement::EnemyMovementSystem;
pub use ore_lifecycle::OreLifecycleSystem;
pub use projectile::ProjectileSystem;
pub use wave::WaveSystem;

/// Per-tick inputs and outputs shared by every system.
#[derive(Debug)]
pub struct SystemContext<'a> {
    /// Tick being processed.
    pub tick: u64,
    /// Read-only content.
    pub content: &'a ContentBundle,
    /// Tunables.
    pub config: &'a SimulationConfig,
    /// Commands due this tick, in application order.
    pub commands: Vec<PlayerCommand>,
    /// Events emitted so far this tick.
    pub events: Vec<SimEvent>,
}

impl<'a> SystemContext<'a> {
    /// Context for `tick` with the given due commands.
    #[must_use]
    pub fn new(
        tick: u64,
        content: &'a ContentBundle,
        config: &'a SimulationConfig,
        commands: Vec<PlayerCommand>,
    ) -> Self {
        Self {
            tick,
            content,
            config,
            commands,
            events: Vec::new(),
        }
    }

    /// Record an event.
    pub fn emit(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Start an event stamped with the current tick.
    #[must_use]
    pub const fn event(&self, kind: EventKind) -> SimEvent {
        SimEvent::new(self.tick, kind)
    }
}

/// One stage of the tick pipeline.
pub trait SimulationSystem: Send {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Advance this system by one tick.
    fn update(&mut self, world: &mut WorldState, ctx: &mut SystemContext<'_>);
}

/// The standard pipeline: Command, Economy, Wave, EnemyMovement, Combat,
/// Projectile, OreLifecycle, Bottleneck.
#[must_use]
pub fn default_pipeline() -> Vec<Box<dyn SimulationSystem>> {
    vec![
        Box::new(CommandSystem),
        Box::new(EconomySystem),
        Box::new(WaveSystem),
        Box::new(EnemyMovementSystem),
        Box::new(CombatSystem),
        Box::new(ProjectileSystem),
        Box::new(OreLifecycleSystem),
        Box::new(BottleneckSystem),
    ]
}
