//! Test fixtures and helpers.
//!
//! Pre-built engines and command builders for consistent testing, plus the
//! scripted command stream behind the golden replay digest.

use fd_core::commands::{BuildRequest, CommandPayload, PlayerCommand};
use fd_core::components::GridPosition;
use fd_core::config::SimulationConfig;
use fd_core::data::{ContentBundle, Difficulty};
use fd_core::error::Result;
use fd_core::simulation::SimulationEngine;
use fd_core::structures::StructureType;
use fixed::types::I32F32;

/// Seed of the golden replay run.
pub const GOLDEN_SEED: u64 = 0xDEFE_C7ED;

/// Ticks the golden replay runs for.
pub const GOLDEN_TICKS: u64 = 1200;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Normal-difficulty engine with standard content and default config.
#[must_use]
pub fn standard_engine(seed: u64) -> SimulationEngine {
    engine_with(Difficulty::Normal, seed, SimulationConfig::default())
}

/// Engine on standard content with the given difficulty and config.
#[must_use]
pub fn engine_with(difficulty: Difficulty, seed: u64, config: SimulationConfig) -> SimulationEngine {
    SimulationEngine::bootstrap(ContentBundle::standard(), config, difficulty, seed)
}

/// Placement command for `structure_type` at `(x, y)`.
#[must_use]
pub fn build(tick: u64, structure_type: StructureType, x: i32, y: i32) -> PlayerCommand {
    PlayerCommand::new(
        tick,
        CommandPayload::PlaceStructure(BuildRequest::new(structure_type, GridPosition::new(x, y))),
    )
}

/// Wall placement at `(x, y)`.
#[must_use]
pub fn wall(tick: u64, x: i32, y: i32) -> PlayerCommand {
    build(tick, StructureType::Wall, x, y)
}

/// Wave trigger.
#[must_use]
pub fn trigger_wave(tick: u64) -> PlayerCommand {
    PlayerCommand::new(tick, CommandPayload::TriggerWave)
}

/// Config of the golden replay: turret range 12 and damage 18.
#[must_use]
pub fn golden_config() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.combat.range_override = Some(fixed(12));
    config.combat.damage_override = Some(18);
    config
}

/// The golden replay's command stream.
#[must_use]
pub fn golden_commands() -> Vec<PlayerCommand> {
    vec![
        trigger_wave(1),
        wall(5, 6, 1),
        build(6, StructureType::TurretMount, 6, 1),
        build(30, StructureType::AmmoModule, 3, 1),
        wall(50, 2, 1),
        wall(51, 2, 2),
        wall(52, 2, 3),
    ]
}

/// Engine loaded with the golden script, not yet stepped.
#[must_use]
pub fn golden_engine() -> SimulationEngine {
    let mut engine = engine_with(Difficulty::Normal, GOLDEN_SEED, golden_config());
    for command in golden_commands() {
        engine.enqueue(command);
    }
    engine
}

/// Run the golden script to [`GOLDEN_TICKS`] and digest the snapshot.
pub fn golden_digest() -> Result<String> {
    let mut engine = golden_engine();
    engine.run(GOLDEN_TICKS);
    engine.make_snapshot().digest_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_commands_are_sorted_by_tick() {
        let commands = golden_commands();
        assert!(commands.windows(2).all(|pair| pair[0].tick <= pair[1].tick));
        assert_eq!(commands.len(), 7);
    }

    #[test]
    fn test_golden_engine_queues_script() {
        let engine = golden_engine();
        assert_eq!(engine.tick(), 0);
        assert_eq!(engine.queued_commands(), golden_commands());
        assert_eq!(engine.config().combat.damage_override, Some(18));
    }
}
