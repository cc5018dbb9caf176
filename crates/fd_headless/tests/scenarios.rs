//! Every bundled scenario loads and runs deterministically.

use std::path::PathBuf;

use fd_headless::{HeadlessRunner, Scenario};

fn scenario_files() -> Vec<PathBuf> {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios");
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "ron"))
        .collect();
    files.sort();
    files
}

#[test]
fn test_bundled_scenarios_parse() {
    let files = scenario_files();
    assert!(files.len() >= 3);
    for path in files {
        let scenario = Scenario::load(&path).unwrap_or_else(|err| panic!("{}: {err}", path.display()));
        assert!(!scenario.name.is_empty());
        assert!(scenario.ticks > 0);
    }
}

#[test]
fn test_bundled_scenarios_verify_briefly() {
    for path in scenario_files() {
        let mut scenario = Scenario::load(&path).unwrap();
        scenario.ticks = scenario.ticks.min(300);
        let report = HeadlessRunner::new(scenario).verify(2).unwrap();
        assert!(report.is_deterministic(), "{}", path.display());
    }
}

#[test]
fn test_hard_idle_enables_raids() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios/hard_idle.ron");
    let scenario = Scenario::load(path).unwrap();
    assert!(scenario.simulation_config().waves.enable_raids);
    assert!(scenario.commands.is_empty());
}
