//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the engine produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Replays and golden digests only mean something if the engine is 100%
//! deterministic. Sources of non-determinism include:
//!
//! - **Floating-point math**: We use fixed-point arithmetic via
//!   [`fd_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   World state only uses ordered maps and sets.
//!
//! - **Command arrival order**: Commands sharing a tick are sorted into a
//!   total order before they apply.
//!
//! - **System randomness**: Ore and raid rolls are keyed hashes of the seed.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism
//! 2. **Property tests**: Random command streams must still replay exactly
//! 3. **Parallel tests**: Running N engines on N threads all match
//! 4. **Snapshot tests**: Restoring from bytes continues identically

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use fd_core::commands::PlayerCommand;
use fd_core::simulation::SimulationEngine;
use fd_core::snapshot::WorldSnapshot;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    fn from_hashes(hashes: Vec<u64>, ticks: u64) -> Self {
        Self {
            is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
            hashes,
            ticks,
        }
    }

    /// Get all unique hashes (should be 1 for a deterministic engine).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs agreed, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of steps per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    DeterminismResult::from_hashes(hashes, ticks)
}

/// Run two engines built by `setup_fn` and compare their final hashes.
pub fn verify_engine_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> SimulationEngine,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |engine| {
            engine.step();
        },
        SimulationEngine::state_hash,
    )
    .is_deterministic
}

/// Run N engines on scoped threads and collect their final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences. Each engine is built on its own thread.
///
/// # Example
///
/// ```
/// use fd_test_utils::determinism::run_parallel_engines;
/// use fd_test_utils::fixtures::{standard_engine, trigger_wave};
///
/// let result = run_parallel_engines(
///     || {
///         let mut engine = standard_engine(5);
///         engine.enqueue(trigger_wave(1));
///         engine
///     },
///     4,
///     200,
/// );
/// result.assert_deterministic();
/// ```
pub fn run_parallel_engines<F>(setup_fn: F, num_runs: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> SimulationEngine + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_runs)
            .map(|_| {
                s.spawn(|| {
                    let mut engine = setup_fn();
                    engine.run(num_ticks);
                    engine.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    DeterminismResult::from_hashes(hashes, num_ticks)
}

/// Step two engines in lockstep and return the first tick whose state
/// differs.
///
/// `Some(0)` means the engines already differed before stepping; `None`
/// means they agreed for all `num_ticks`.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> SimulationEngine,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        a.step();
        b.step();

        if a.state_hash() != b.state_hash() {
            tracing::warn!(tick, "Engines diverged");
            return Some(tick);
        }
    }

    None
}

/// Verify that encoding and decoding a snapshot preserves the engine
/// exactly: the restored engine hashes the same, re-encodes to the same
/// bytes and keeps agreeing with the original for `continue_ticks` more.
pub fn verify_snapshot_determinism<F>(setup_fn: F, num_ticks: u64, continue_ticks: u64) -> bool
where
    F: Fn() -> SimulationEngine,
{
    let mut original = setup_fn();
    original.run(num_ticks);

    let Ok(bytes) = original.make_snapshot().encode() else {
        return false;
    };
    let Ok(snapshot) = WorldSnapshot::decode(&bytes) else {
        return false;
    };
    let mut restored =
        SimulationEngine::from_snapshot(snapshot, original.content().clone(), original.config().clone());

    if restored.state_hash() != original.state_hash() {
        return false;
    }
    if restored.make_snapshot().encode().ok().as_deref() != Some(bytes.as_slice()) {
        return false;
    }

    original.run(continue_ticks);
    restored.run(continue_ticks);
    original.state_hash() == restored.state_hash()
}

/// Enqueue `commands` on a fresh engine and run it; returns the final hash.
pub fn run_stream<F>(setup_fn: F, commands: &[PlayerCommand], num_ticks: u64) -> u64
where
    F: Fn() -> SimulationEngine,
{
    let mut engine = setup_fn();
    for command in commands {
        engine.enqueue(command.clone());
    }
    engine.run(num_ticks);
    engine.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible command streams on the
/// standard board.
pub mod strategies {
    use fd_core::commands::{BuildRequest, CommandPayload, PlayerCommand};
    use fd_core::components::{Direction, GridPosition};
    use fd_core::data::Difficulty;
    use fd_core::structures::StructureType;
    use proptest::prelude::*;

    /// Width of the standard board.
    pub const BOARD_WIDTH: i32 = 96;
    /// Height of the standard board.
    pub const BOARD_HEIGHT: i32 = 64;

    /// Generate a difficulty.
    pub fn arb_difficulty() -> impl Strategy<Value = Difficulty> {
        prop_oneof![Just(Difficulty::Easy), Just(Difficulty::Normal), Just(Difficulty::Hard)]
    }

    /// Generate a world seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// Generate a cell on the standard board.
    pub fn arb_cell() -> impl Strategy<Value = GridPosition> {
        (0..BOARD_WIDTH, 0..BOARD_HEIGHT).prop_map(|(x, y)| GridPosition::new(x, y))
    }

    /// Generate a facing.
    pub fn arb_direction() -> impl Strategy<Value = Direction> {
        prop::sample::select(Direction::ALL.to_vec())
    }

    /// Generate a player-buildable structure type.
    pub fn arb_structure_type() -> impl Strategy<Value = StructureType> {
        let buildable: Vec<StructureType> =
            StructureType::ALL.into_iter().filter(|s| s.is_buildable()).collect();
        prop::sample::select(buildable)
    }

    /// Generate a placement request with the default facing.
    pub fn arb_build_request() -> impl Strategy<Value = BuildRequest> {
        (arb_structure_type(), arb_cell()).prop_map(|(structure_type, cell)| BuildRequest::new(structure_type, cell))
    }

    /// Generate any command payload. Entity ids are small so some of them
    /// hit real structures.
    pub fn arb_payload() -> impl Strategy<Value = CommandPayload> {
        prop_oneof![
            4 => arb_build_request().prop_map(CommandPayload::PlaceStructure),
            1 => (0u64..24).prop_map(|entity_id| CommandPayload::RemoveStructure { entity_id }),
            2 => (arb_cell(), arb_direction())
                .prop_map(|(position, direction)| CommandPayload::PlaceConveyor { position, direction }),
            1 => (0u64..24, arb_direction())
                .prop_map(|(entity_id, rotation)| CommandPayload::RotateBuilding { entity_id, rotation }),
            1 => Just(CommandPayload::TriggerWave),
        ]
    }

    /// Generate a command due at a tick below `max_tick`.
    pub fn arb_command(max_tick: u64) -> impl Strategy<Value = PlayerCommand> {
        (0..max_tick, 0u32..3, arb_payload())
            .prop_map(|(tick, actor, payload)| PlayerCommand::new(tick, payload).by(actor))
    }

    /// Generate a command stream of up to `max_len` commands.
    pub fn arb_command_stream(max_len: usize, max_tick: u64) -> impl Strategy<Value = Vec<PlayerCommand>> {
        proptest::collection::vec(arb_command(max_tick), 0..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{golden_engine, standard_engine, trigger_wave, wall};
    use proptest::prelude::*;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_detects_nondeterminism() {
        let counter = std::cell::Cell::new(0u64);
        let result = verify_determinism(
            2,
            1,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |_| {},
            |n| *n,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 2);
    }

    #[test]
    fn test_idle_engine_determinism() {
        assert!(verify_engine_determinism(|| standard_engine(1), 200));
    }

    #[test]
    fn test_golden_engine_determinism() {
        assert!(verify_engine_determinism(golden_engine, 400));
    }

    #[test]
    fn test_parallel_engines_agree() {
        let result = run_parallel_engines(
            || {
                let mut engine = standard_engine(77);
                engine.enqueue(trigger_wave(1));
                engine.enqueue(wall(3, 6, 1));
                engine
            },
            4,
            300,
        );
        assert_eq!(result.hashes.len(), 4);
        result.assert_deterministic();
    }

    #[test]
    fn test_no_divergence_for_identical_setup() {
        assert_eq!(find_first_divergence(golden_engine, 150), None);
    }

    #[test]
    fn test_different_seeds_diverge_immediately() {
        let seed = std::cell::Cell::new(0u64);
        let divergence = find_first_divergence(
            || {
                seed.set(seed.get() + 1);
                standard_engine(seed.get())
            },
            10,
        );
        assert_eq!(divergence, Some(0));
    }

    #[test]
    fn test_snapshot_round_trip_continues() {
        assert!(verify_snapshot_determinism(golden_engine, 120, 200));
    }

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash(&(1u32, "a")), compute_hash(&(1u32, "a")));
        assert_ne!(compute_hash(&1u32), compute_hash(&2u32));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_command_streams_replay_exactly(
            seed in strategies::arb_seed(),
            commands in strategies::arb_command_stream(24, 60),
        ) {
            let first = run_stream(|| standard_engine(seed), &commands, 120);
            let second = run_stream(|| standard_engine(seed), &commands, 120);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_enqueue_order_does_not_matter(
            commands in strategies::arb_command_stream(16, 40),
        ) {
            let mut reversed = commands.clone();
            reversed.reverse();
            let forward = run_stream(|| standard_engine(3), &commands, 60);
            let backward = run_stream(|| standard_engine(3), &reversed, 60);
            prop_assert_eq!(forward, backward);
        }
    }
}
