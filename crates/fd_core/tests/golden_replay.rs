//! Golden replay: a scripted defense run whose final snapshot digest must not
//! change unless the simulation rules change on purpose.
//!
//! The digest is pinned in `tests/golden/golden_replay.sha256`. A missing or
//! different file fails the test. Run with `FD_RECORD_GOLDEN=1` to write the
//! current digest after an intended rule change.

use std::fs;
use std::path::PathBuf;

use fd_core::events::EventKind;
use fd_core::replay::Replay;
use fd_test_utils::fixtures::{golden_commands, golden_config, golden_digest, golden_engine, GOLDEN_TICKS};

const RECORD_ENV: &str = "FD_RECORD_GOLDEN";

fn golden_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("golden")
        .join("golden_replay.sha256")
}

fn recording() -> bool {
    std::env::var_os(RECORD_ENV).is_some_and(|value| !value.is_empty() && value != "0")
}

#[test]
fn test_golden_replay_digest_is_stable() {
    let digest = golden_digest().unwrap();
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    let path = golden_path();
    if recording() {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("{digest}\n")).unwrap();
        return;
    }

    let recorded = fs::read_to_string(&path).unwrap_or_else(|err| {
        panic!(
            "no golden digest at {} ({err}); current digest is {digest}, run with {RECORD_ENV}=1 to record it",
            path.display()
        )
    });
    assert_eq!(
        recorded.trim(),
        digest,
        "golden replay digest changed; run with {RECORD_ENV}=1 to re-record {}",
        path.display()
    );
}

#[test]
fn test_golden_replay_is_repeatable() {
    assert_eq!(golden_digest().unwrap(), golden_digest().unwrap());
}

#[test]
fn test_golden_script_builds_a_defense() {
    let mut engine = golden_engine();
    let events = engine.run(GOLDEN_TICKS);
    let world = engine.world();

    assert_eq!(world.tick, GOLDEN_TICKS);
    assert!(events.iter().any(|event| event.kind == EventKind::WaveStarted));
    assert!(events.iter().any(|event| event.kind == EventKind::BoardExpanded));
    assert!(events
        .iter()
        .any(|event| event.kind == EventKind::StructurePlaced && event.detail.as_deref() == Some("wall")));
}

#[test]
fn test_golden_replay_verifies_from_recording() {
    let mut engine = golden_engine();
    let mut replay = Replay::new("golden", &engine).unwrap();
    for command in golden_commands() {
        replay.record_command(command);
    }
    engine.run(GOLDEN_TICKS);
    replay.finalize(&engine).unwrap();

    assert_eq!(replay.final_digest, golden_digest().unwrap());
    let decoded = Replay::decode(&replay.encode().unwrap()).unwrap();
    decoded
        .verify(engine.content().clone(), golden_config())
        .unwrap();
}
