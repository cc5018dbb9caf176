//! Headless scenario runner.
//!
//! Drives a [`SimulationEngine`] through a [`Scenario`] and reports the
//! outcome as a serializable [`RunSummary`].

use std::collections::BTreeMap;

use fd_core::data::{ContentBundle, Difficulty};
use fd_core::error::GameError;
use fd_core::events::SimEvent;
use fd_core::replay::Replay;
use fd_core::simulation::SimulationEngine;
use fd_core::snapshot::SnapshotStore;
use fd_core::world::RunPhase;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scenario::{Scenario, ScenarioError};
use crate::store::StoreError;

/// Error type for headless runs.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Scenario could not be loaded.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// Snapshot, replay or content failure.
    #[error(transparent)]
    Simulation(#[from] GameError),
    /// Snapshot store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Parallel runs disagreed.
    #[error("Determinism check failed: {unique} distinct digests across {runs} runs")]
    Nondeterministic {
        /// Runs compared.
        runs: usize,
        /// Distinct digests seen.
        unique: usize,
    },
}

/// Machine-readable outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Difficulty.
    pub difficulty: Difficulty,
    /// World seed.
    pub seed: u64,
    /// Ticks processed.
    pub tick: u64,
    /// Phase at the end of the run.
    pub phase: RunPhase,
    /// Waves started so far.
    pub wave_index: u32,
    /// HQ health, `None` once it has fallen.
    pub hq_health: Option<u32>,
    /// Currency earned.
    pub currency: u64,
    /// Enemies killed.
    pub enemies_destroyed: u64,
    /// Final snapshot digest.
    pub digest: String,
    /// Events fired, by kind token.
    pub event_counts: BTreeMap<String, u64>,
}

impl RunSummary {
    fn collect(scenario: &Scenario, engine: &SimulationEngine, events: &[SimEvent]) -> Result<Self, GameError> {
        let world = engine.world();
        let mut event_counts = BTreeMap::new();
        for event in events {
            *event_counts.entry(event.kind.token().to_string()).or_insert(0) += 1;
        }
        Ok(Self {
            scenario: scenario.name.clone(),
            difficulty: world.run.difficulty,
            seed: world.run.seed,
            tick: world.tick,
            phase: world.run.phase,
            wave_index: world.threat.wave_index,
            hq_health: world.hq().map(|hq| hq.health),
            currency: world.economy.currency,
            enemies_destroyed: world.threat.telemetry.enemies_destroyed,
            digest: engine.make_snapshot().digest_hex()?,
            event_counts,
        })
    }
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// Engine at the final tick.
    pub engine: SimulationEngine,
    /// Every event, in order.
    pub events: Vec<SimEvent>,
    /// Summary of the final state.
    pub summary: RunSummary,
}

/// Result of a parallel determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks each run covered.
    pub ticks: u64,
    /// Final digest of each run, in run order.
    pub digests: Vec<String>,
}

impl VerifyReport {
    /// Whether every run ended on the same digest.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.digests.windows(2).all(|w| w[0] == w[1])
    }

    /// Number of distinct digests.
    #[must_use]
    pub fn unique_digests(&self) -> usize {
        let mut unique = self.digests.clone();
        unique.sort();
        unique.dedup();
        unique.len()
    }
}

/// Runs one scenario against a content bundle.
#[derive(Debug, Clone)]
pub struct HeadlessRunner {
    scenario: Scenario,
    content: ContentBundle,
}

impl HeadlessRunner {
    /// Runner on the standard content.
    #[must_use]
    pub fn new(scenario: Scenario) -> Self {
        Self::with_content(scenario, ContentBundle::standard())
    }

    /// Runner on custom content.
    #[must_use]
    pub fn with_content(scenario: Scenario, content: ContentBundle) -> Self {
        Self { scenario, content }
    }

    /// The scenario being run.
    #[must_use]
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Fresh engine with the scenario's commands queued.
    #[must_use]
    pub fn engine(&self) -> SimulationEngine {
        let mut engine = SimulationEngine::bootstrap(
            self.content.clone(),
            self.scenario.simulation_config(),
            self.scenario.difficulty,
            self.scenario.seed,
        );
        for command in self.scenario.player_commands() {
            engine.enqueue(command);
        }
        engine
    }

    /// Run for `ticks`, or the scenario's own length.
    pub fn run(&self, ticks: Option<u64>) -> Result<RunOutcome, RunnerError> {
        let ticks = ticks.unwrap_or(self.scenario.ticks);
        tracing::info!(
            scenario = %self.scenario.name,
            seed = self.scenario.seed,
            difficulty = ?self.scenario.difficulty,
            ticks,
            commands = self.scenario.commands.len(),
            "Starting run"
        );

        let mut engine = self.engine();
        let events = engine.run(ticks);
        let summary = RunSummary::collect(&self.scenario, &engine, &events)?;

        tracing::info!(
            tick = summary.tick,
            phase = ?summary.phase,
            wave = summary.wave_index,
            digest = %summary.digest,
            "Run complete"
        );
        Ok(RunOutcome {
            engine,
            events,
            summary,
        })
    }

    /// Run the scenario and store the final snapshot as `<name>_<tick>`.
    pub fn run_and_store<S>(&self, ticks: Option<u64>, store: &mut S) -> Result<RunOutcome, RunnerError>
    where
        S: SnapshotStore<Error = StoreError>,
    {
        let outcome = self.run(ticks)?;
        let name = format!("{}_{}", self.scenario.name, outcome.summary.tick);
        store.put(&name, &outcome.engine.make_snapshot().encode()?)?;
        tracing::info!(name = %name, "Final snapshot saved");
        Ok(outcome)
    }

    /// Run `runs` independent engines in parallel and compare final digests.
    pub fn verify(&self, runs: usize) -> Result<VerifyReport, RunnerError> {
        let ticks = self.scenario.ticks;
        let digests = (0..runs)
            .into_par_iter()
            .map(|run| {
                let mut engine = self.engine();
                engine.run(ticks);
                let digest = engine.make_snapshot().digest_hex();
                tracing::debug!(run, "Verification run finished");
                digest
            })
            .collect::<Result<Vec<String>, GameError>>()?;

        let report = VerifyReport {
            scenario: self.scenario.name.clone(),
            ticks,
            digests,
        };
        if !report.is_deterministic() {
            tracing::error!(digests = ?report.digests, "Parallel runs diverged");
            return Err(RunnerError::Nondeterministic {
                runs,
                unique: report.unique_digests(),
            });
        }
        Ok(report)
    }

    /// Record the scenario as a replay, finalized at its last tick.
    pub fn record(&self) -> Result<Replay, RunnerError> {
        let mut engine = SimulationEngine::bootstrap(
            self.content.clone(),
            self.scenario.simulation_config(),
            self.scenario.difficulty,
            self.scenario.seed,
        );
        let mut replay = Replay::new(self.scenario.name.clone(), &engine)?;
        for command in self.scenario.player_commands() {
            replay.record_command(command.clone());
            engine.enqueue(command);
        }
        engine.run(self.scenario.ticks);
        replay.finalize(&engine)?;
        tracing::info!(
            commands = replay.command_count(),
            final_tick = replay.final_tick,
            digest = %replay.final_digest,
            "Replay recorded"
        );
        Ok(replay)
    }

    /// Re-run a replay under this runner's content and scenario config.
    pub fn verify_replay(&self, replay: &Replay) -> Result<(), RunnerError> {
        replay.verify(self.content.clone(), self.scenario.simulation_config())?;
        Ok(())
    }
}

/// Digest of the embedded golden scenario.
pub fn golden_digest() -> Result<String, RunnerError> {
    let runner = HeadlessRunner::new(Scenario::golden()?);
    Ok(runner.run(None)?.summary.digest)
}
