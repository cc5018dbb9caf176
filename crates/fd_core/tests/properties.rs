//! Property tests over random command streams.

use fd_core::commands::PlayerCommand;
use fd_core::components::items;
use fd_core::config::SimulationConfig;
use fd_core::data::{ContentBundle, Difficulty};
use fd_core::pathfinding::NavGrid;
use fd_core::simulation::SimulationEngine;
use fd_core::snapshot::WorldSnapshot;
use fd_core::world::WorldState;
use fd_test_utils::determinism::strategies;
use fd_test_utils::fixtures::{standard_engine, wall};
use proptest::prelude::*;

/// Engine with enough wall kits that placement is only limited by the board.
fn walled_engine(seed: u64) -> SimulationEngine {
    let content = ContentBundle::standard();
    let mut world = WorldState::bootstrap(&content, Difficulty::Normal, seed);
    world.economy.add_inventory(items::WALL_KIT, 400);
    SimulationEngine::new(world, content, SimulationConfig::default())
}

fn base_reaches_spawn(world: &WorldState) -> bool {
    NavGrid::from_world(world).reaches_any(world.board.base, &world.board.spawn_cells())
}

/// Walls between the base and the spawn column, one per tick.
fn arb_wall_line() -> impl Strategy<Value = Vec<PlayerCommand>> {
    proptest::collection::vec((41i32..56, 24i32..41), 1..80).prop_map(|cells| {
        cells
            .into_iter()
            .enumerate()
            .map(|(tick, (x, y))| wall(tick as u64, x, y))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_walls_never_seal_the_base(seed in strategies::arb_seed(), commands in arb_wall_line()) {
        let mut engine = walled_engine(seed);
        let ticks = commands.len() as u64 + 1;
        for command in commands {
            engine.enqueue(command);
        }
        for _ in 0..ticks {
            engine.step();
            prop_assert!(base_reaches_spawn(engine.world()));
        }
    }

    #[test]
    fn prop_random_streams_keep_a_route(commands in strategies::arb_command_stream(32, 40)) {
        let mut engine = standard_engine(17);
        for command in commands {
            engine.enqueue(command);
        }
        engine.run(60);
        prop_assert!(base_reaches_spawn(engine.world()));
    }

    #[test]
    fn prop_snapshot_restores_identical_state(
        seed in strategies::arb_seed(),
        commands in strategies::arb_command_stream(16, 80),
        split in 1u64..80,
    ) {
        let mut engine = standard_engine(seed);
        for command in commands {
            engine.enqueue(command);
        }
        engine.run(split);

        let bytes = engine.make_snapshot().encode().unwrap();
        let snapshot = WorldSnapshot::decode(&bytes).unwrap();
        prop_assert_eq!(&snapshot, &engine.make_snapshot());

        let mut restored = SimulationEngine::from_snapshot(
            snapshot,
            engine.content().clone(),
            engine.config().clone(),
        );
        prop_assert_eq!(restored.state_hash(), engine.state_hash());

        let original_events = engine.run(40);
        let restored_events = restored.run(40);
        prop_assert_eq!(original_events, restored_events);
        prop_assert_eq!(restored.state_hash(), engine.state_hash());
    }
}
