//! Headless Foundry Defense runner.
//!
//! Runs scenarios without any presentation layer. Designed for CI
//! determinism checks and replay verification.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario and print a JSON summary
//! cargo run -p fd_headless -- run --scenario scenarios/first_wave.ron
//!
//! # Also dump every event as JSON lines and keep the final snapshot
//! cargo run -p fd_headless -- run --scenario scenarios/first_wave.ron --events --snapshot-dir snaps/
//!
//! # Run the same scenario on 8 threads and compare digests
//! cargo run -p fd_headless -- verify --scenario scenarios/first_wave.ron --runs 8
//!
//! # Record a replay, then verify it
//! cargo run -p fd_headless -- record --scenario scenarios/first_wave.ron --out first_wave.replay
//! cargo run -p fd_headless -- replay --file first_wave.replay --scenario scenarios/first_wave.ron
//!
//! # Print the golden digest
//! cargo run -p fd_headless -- golden
//! ```
//!
//! Results go to stdout; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fd_core::replay::Replay;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fd_headless::{golden_digest, FileSnapshotStore, HeadlessRunner, RunOutcome, RunnerError, Scenario};

#[derive(Parser)]
#[command(name = "fd-headless")]
#[command(about = "Headless Foundry Defense runner for CI and replay checks")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print a JSON summary
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override the scenario's tick count
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Print every event as a JSON line before the summary
        #[arg(long)]
        events: bool,

        /// Save the final snapshot into this directory
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },

    /// Verify determinism by running the scenario several times in parallel
    Verify {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Number of verification runs
        #[arg(short, long, default_value = "4")]
        runs: usize,
    },

    /// Record a scenario as a replay file
    Record {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Replay output path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Verify a recorded replay
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,

        /// Scenario supplying the config the replay was recorded with
        #[arg(short, long)]
        scenario: Option<PathBuf>,
    },

    /// Print the golden replay digest
    Golden,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for results.
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            ticks,
            events,
            snapshot_dir,
        } => cmd_run(scenario, ticks, events, snapshot_dir),
        Commands::Verify { scenario, runs } => cmd_verify(scenario, runs),
        Commands::Record { scenario, out } => cmd_record(scenario, out),
        Commands::Replay { file, scenario } => cmd_replay(file, scenario),
        Commands::Golden => cmd_golden(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            eprintln!("FAIL: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Failure of a CLI command.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn io(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn load_runner(scenario: &std::path::Path) -> Result<HeadlessRunner, CliError> {
    let scenario = Scenario::load(scenario).map_err(RunnerError::from)?;
    Ok(HeadlessRunner::new(scenario))
}

/// Run a scenario
fn cmd_run(scenario: PathBuf, ticks: Option<u64>, events: bool, snapshot_dir: Option<PathBuf>) -> Result<(), CliError> {
    let runner = load_runner(&scenario)?;

    let outcome: RunOutcome = match snapshot_dir {
        Some(dir) => {
            let mut store = FileSnapshotStore::open(&dir).map_err(RunnerError::from)?;
            runner.run_and_store(ticks, &mut store)?
        }
        None => runner.run(ticks)?,
    };

    if events {
        for event in &outcome.events {
            println!("{}", serde_json::to_string(event)?);
        }
    }
    println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
    Ok(())
}

/// Verify determinism across parallel runs
fn cmd_verify(scenario: PathBuf, runs: usize) -> Result<(), CliError> {
    let runner = load_runner(&scenario)?;
    eprintln!("Verifying '{}' with {} parallel runs...", runner.scenario().name, runs);

    let report = runner.verify(runs)?;
    eprintln!("PASS: all {} runs ended on {}", report.digests.len(), report.digests.first().map_or("-", String::as_str));
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Record a replay
fn cmd_record(scenario: PathBuf, out: PathBuf) -> Result<(), CliError> {
    let runner = load_runner(&scenario)?;
    let replay = runner.record()?;
    let bytes = replay.encode().map_err(RunnerError::from)?;
    std::fs::write(&out, bytes).map_err(CliError::io(&out))?;

    eprintln!("Recorded replay:");
    eprintln!("  Scenario: {}", replay.scenario_id);
    eprintln!("  Seed: {}", replay.seed);
    eprintln!("  Commands: {}", replay.command_count());
    eprintln!("  Duration: {} ticks", replay.final_tick);
    eprintln!("  Digest: {}", replay.final_digest);
    eprintln!("Saved to: {}", out.display());
    Ok(())
}

/// Verify a recorded replay
fn cmd_replay(file: PathBuf, scenario: Option<PathBuf>) -> Result<(), CliError> {
    let bytes = std::fs::read(&file).map_err(CliError::io(&file))?;
    let replay = Replay::decode(&bytes).map_err(RunnerError::from)?;

    eprintln!("Loaded replay:");
    eprintln!("  Scenario: {}", replay.scenario_id);
    eprintln!("  Seed: {}", replay.seed);
    eprintln!("  Commands: {}", replay.command_count());
    eprintln!("  Duration: {} ticks", replay.final_tick);

    let runner = match scenario {
        Some(path) => load_runner(&path)?,
        None => HeadlessRunner::new(Scenario {
            name: replay.scenario_id.clone(),
            description: String::new(),
            difficulty: replay.difficulty,
            seed: replay.seed,
            ticks: replay.final_tick,
            config: None,
            commands: Vec::new(),
        }),
    };

    eprintln!("Verifying replay...");
    runner.verify_replay(&replay)?;
    eprintln!("PASS: Replay verification successful");
    eprintln!("  Digest: {}", replay.final_digest);
    Ok(())
}

/// Print the golden digest
fn cmd_golden() -> Result<(), CliError> {
    println!("{}", golden_digest()?);
    Ok(())
}
