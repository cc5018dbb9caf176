//! Headless simulation runner for CI verification and replay checks.
//!
//! Loads RON scenarios, drives the deterministic engine without any
//! presentation layer and reports results as JSON:
//!
//! - **CI verification**: run a scenario on several threads and compare digests
//! - **Replay verification**: record a scenario and check it re-runs exactly
//! - **Golden digest**: print the digest of the pinned golden scenario
//!
//! # Output
//!
//! - **stdout**: JSON summaries and JSON-lines event dumps
//! - **stderr**: logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! cargo run -p fd_headless -- run --scenario crates/fd_headless/scenarios/first_wave.ron --events
//! cargo run -p fd_headless -- verify --scenario crates/fd_headless/scenarios/first_wave.ron --runs 8
//! cargo run -p fd_headless -- golden
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod runner;
pub mod scenario;
pub mod store;

pub use runner::{golden_digest, HeadlessRunner, RunOutcome, RunSummary, RunnerError, VerifyReport};
pub use scenario::{Scenario, ScenarioError, ScheduledCommand};
pub use store::{FileSnapshotStore, StoreError};
