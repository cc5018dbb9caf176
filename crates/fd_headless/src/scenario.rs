//! Scenario loading.
//!
//! A scenario fixes everything a headless run depends on: difficulty, seed,
//! run length, optional config overrides and the scripted command stream.

use std::path::Path;

use fd_core::commands::{ActorId, CommandPayload, PlayerCommand};
use fd_core::config::SimulationConfig;
use fd_core::data::Difficulty;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
}

/// A command in a scenario script. `actor` defaults to 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledCommand {
    /// Tick the command applies on.
    pub tick: u64,
    /// Issuer.
    #[serde(default)]
    pub actor: ActorId,
    /// What to do.
    pub payload: CommandPayload,
}

impl From<&ScheduledCommand> for PlayerCommand {
    fn from(scheduled: &ScheduledCommand) -> Self {
        PlayerCommand::new(scheduled.tick, scheduled.payload.clone()).by(scheduled.actor)
    }
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name; also the replay scenario id.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Run difficulty.
    #[serde(default)]
    pub difficulty: Difficulty,
    /// World seed.
    pub seed: u64,
    /// Ticks to run.
    pub ticks: u64,
    /// Config overrides; defaults when absent.
    #[serde(default)]
    pub config: Option<SimulationConfig>,
    /// Scripted commands.
    #[serde(default)]
    pub commands: Vec<ScheduledCommand>,
}

/// The golden replay script, embedded so the binary never depends on the
/// working directory.
const GOLDEN_RON: &str = include_str!("../scenarios/golden.ron");

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// The golden replay scenario.
    pub fn golden() -> Result<Self, ScenarioError> {
        Self::from_ron_str(GOLDEN_RON)
    }

    /// Effective config: the override or the defaults.
    #[must_use]
    pub fn simulation_config(&self) -> SimulationConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Scripted commands as engine commands.
    #[must_use]
    pub fn player_commands(&self) -> Vec<PlayerCommand> {
        self.commands.iter().map(PlayerCommand::from).collect()
    }
}
