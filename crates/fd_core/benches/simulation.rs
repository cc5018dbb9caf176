#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fd_core::commands::{BuildRequest, CommandPayload, PlayerCommand};
use fd_core::components::GridPosition;
use fd_core::config::SimulationConfig;
use fd_core::data::{ContentBundle, Difficulty};
use fd_core::placement::can_place;
use fd_core::simulation::SimulationEngine;
use fd_core::structures::StructureType;
use fd_core::world::WorldState;

fn defended_engine(seed: u64) -> SimulationEngine {
    let mut engine =
        SimulationEngine::bootstrap(ContentBundle::standard(), SimulationConfig::default(), Difficulty::Normal, seed);
    let build = |tick, structure_type, x, y| {
        PlayerCommand::new(
            tick,
            CommandPayload::PlaceStructure(BuildRequest::new(structure_type, GridPosition::new(x, y))),
        )
    };
    engine.enqueue(PlayerCommand::new(1, CommandPayload::TriggerWave));
    engine.enqueue(build(2, StructureType::Wall, 6, 1));
    engine.enqueue(build(3, StructureType::TurretMount, 6, 1));
    engine.enqueue(build(4, StructureType::Wall, 6, 2));
    engine
}

fn bench_stepping(c: &mut Criterion) {
    let mut group = c.benchmark_group("stepping");
    for ticks in [100_u64, 600] {
        group.bench_with_input(BenchmarkId::from_parameter(ticks), &ticks, |b, &ticks| {
            b.iter(|| {
                let mut engine = defended_engine(0xBE7C);
                black_box(engine.run(ticks).len())
            });
        });
    }
    group.finish();
}

fn bench_state_hash(c: &mut Criterion) {
    let mut engine = defended_engine(3);
    engine.run(400);
    c.bench_function("state_hash", |b| b.iter(|| black_box(engine.state_hash())));
}

fn bench_placement(c: &mut Criterion) {
    let world = WorldState::bootstrap(&ContentBundle::standard(), Difficulty::Normal, 11);
    let cells: Vec<GridPosition> = (0..16).map(|x| GridPosition::new(x, 3)).collect();
    c.bench_function("can_place_wall_row", |b| {
        b.iter(|| {
            cells
                .iter()
                .filter(|cell| can_place(&world, StructureType::Wall, **cell, None).is_ok())
                .count()
        });
    });
}

criterion_group!(benches, bench_stepping, bench_state_hash, bench_placement);
criterion_main!(benches);
