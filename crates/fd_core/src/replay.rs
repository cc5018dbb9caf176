//! Replays: an initial snapshot plus the command stream issued on top of it.
//!
//! Re-running the commands from the initial snapshot must reproduce the
//! recorded final digest exactly; anything else is a desync.

use serde::{Deserialize, Serialize};

use crate::commands::PlayerCommand;
use crate::config::SimulationConfig;
use crate::data::{ContentBundle, Difficulty};
use crate::error::{GameError, Result};
use crate::simulation::SimulationEngine;
use crate::snapshot::WorldSnapshot;

/// Replay format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Complete replay data structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Scenario identifier or name.
    pub scenario_id: String,
    /// Difficulty of the run.
    pub difficulty: Difficulty,
    /// World seed.
    pub seed: u64,
    /// Encoded [`WorldSnapshot`] the run started from.
    pub initial_snapshot: Vec<u8>,
    /// Commands in the order they were issued.
    pub commands: Vec<PlayerCommand>,
    /// Tick the recording stopped at.
    pub final_tick: u64,
    /// Snapshot digest at `final_tick`.
    pub final_digest: String,
}

impl Replay {
    /// Start recording from the engine's current state.
    pub fn new(scenario_id: impl Into<String>, engine: &SimulationEngine) -> Result<Self> {
        let world = engine.world();
        Ok(Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            difficulty: world.run.difficulty,
            seed: world.run.seed,
            initial_snapshot: engine.make_snapshot().encode()?,
            commands: Vec::new(),
            final_tick: engine.tick(),
            final_digest: String::new(),
        })
    }

    /// Record a command.
    pub fn record_command(&mut self, command: PlayerCommand) {
        self.commands.push(command);
    }

    /// Close the recording at the engine's current state.
    pub fn finalize(&mut self, engine: &SimulationEngine) -> Result<()> {
        self.final_tick = engine.tick();
        self.final_digest = engine.make_snapshot().digest_hex()?;
        Ok(())
    }

    /// Encode with bincode.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode and check the format version.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let replay: Self = bincode::deserialize(bytes)?;
        if replay.version != REPLAY_VERSION {
            return Err(GameError::ReplayVersion {
                expected: REPLAY_VERSION,
                found: replay.version,
            });
        }
        Ok(replay)
    }

    /// Commands issued for `tick`.
    #[must_use]
    pub fn commands_at_tick(&self, tick: u64) -> Vec<&PlayerCommand> {
        self.commands.iter().filter(|command| command.tick == tick).collect()
    }

    /// Get the total number of commands in the replay.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Engine restored from the initial snapshot with every command queued.
    pub fn restore(&self, content: ContentBundle, config: SimulationConfig) -> Result<SimulationEngine> {
        let snapshot = WorldSnapshot::decode(&self.initial_snapshot)?;
        let mut engine = SimulationEngine::from_snapshot(snapshot, content, config);
        for command in &self.commands {
            engine.enqueue(command.clone());
        }
        Ok(engine)
    }

    /// Re-run to `final_tick` and compare digests.
    ///
    /// # Errors
    /// [`GameError::DesyncDetected`] if the digests differ, or a decode error
    /// if the initial snapshot is unreadable.
    pub fn verify(&self, content: ContentBundle, config: SimulationConfig) -> Result<()> {
        let mut engine = self.restore(content, config)?;
        let remaining = self.final_tick.saturating_sub(engine.tick());
        engine.run(remaining);
        let actual = engine.make_snapshot().digest_hex()?;
        if actual != self.final_digest {
            tracing::warn!(tick = self.final_tick, expected = %self.final_digest, %actual, "Replay desync");
            return Err(GameError::DesyncDetected {
                tick: self.final_tick,
                expected: self.final_digest.clone(),
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{BuildRequest, CommandPayload};
    use crate::components::GridPosition;
    use crate::structures::StructureType;

    fn recorded(ticks: u64) -> Replay {
        let mut engine =
            SimulationEngine::bootstrap(ContentBundle::standard(), SimulationConfig::default(), Difficulty::Normal, 21);
        let mut replay = Replay::new("unit", &engine).unwrap();
        let commands = [
            PlayerCommand::new(2, CommandPayload::TriggerWave),
            PlayerCommand::new(
                5,
                CommandPayload::PlaceStructure(BuildRequest::new(StructureType::Wall, GridPosition::new(6, 1))),
            ),
        ];
        for command in commands {
            replay.record_command(command.clone());
            engine.enqueue(command);
        }
        engine.run(ticks);
        replay.finalize(&engine).unwrap();
        replay
    }

    #[test]
    fn test_replay_verifies() {
        let replay = recorded(200);
        assert_eq!(replay.final_tick, 200);
        assert_eq!(replay.command_count(), 2);
        assert_eq!(replay.commands_at_tick(5).len(), 1);
        replay
            .verify(ContentBundle::standard(), SimulationConfig::default())
            .unwrap();
    }

    #[test]
    fn test_tampered_replay_desyncs() {
        let mut replay = recorded(120);
        replay.commands.pop();
        let err = replay
            .verify(ContentBundle::standard(), SimulationConfig::default())
            .unwrap_err();
        assert!(matches!(err, GameError::DesyncDetected { tick: 120, .. }));
    }

    #[test]
    fn test_encode_decode_and_version_check() {
        let replay = recorded(10);
        let decoded = Replay::decode(&replay.encode().unwrap()).unwrap();
        assert_eq!(decoded, replay);

        let mut future = replay;
        future.version = 2;
        assert!(matches!(
            Replay::decode(&future.encode().unwrap()),
            Err(GameError::ReplayVersion { expected: 1, found: 2 })
        ));
    }
}
