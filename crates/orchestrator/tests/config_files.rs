//! Shipped config files load and run end to end.

use orchestrator::{create_kernel, create_simulation, RunnerState, SimulationConfig};
use std::path::PathBuf;

fn config_path(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("../../configs");
    path.push(name);
    path.to_string_lossy().into_owned()
}

#[test]
fn shipped_configs_validate() {
    for name in ["dam_break_2d.json", "sphere_3d.json", "interactive_2d.json"] {
        let config = SimulationConfig::load(&config_path(name))
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        assert!(!config.name.is_empty());
    }
}

#[test]
fn sphere_config_builds_3d_kernel() {
    let mut config = SimulationConfig::load(&config_path("sphere_3d.json")).unwrap();
    config.particle_count = 500;
    let mut kernel = create_kernel(&config).unwrap();
    for _ in 0..5 {
        kernel.step();
    }
    let snapshot = kernel.snapshot();
    for p in &snapshot.positions {
        let d = ((p[0] - 300.0).powi(2) + (p[1] - 300.0).powi(2) + (p[2] - 300.0).powi(2)).sqrt();
        assert!(d <= 280.0 + 1e-3, "outside sphere: {:?}", p);
    }
}

#[test]
fn dam_break_runs_to_frame_limit() {
    // Same scene, shortened and unpaced.
    let mut config = SimulationConfig::load(&config_path("dam_break_2d.json")).unwrap();
    config.particle_count = 300;
    config.max_frames = Some(20);
    config.target_fps = None;

    let dir = std::env::temp_dir().join(format!("fluid-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("short_dam_break.json");
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let runner = create_simulation(path.to_str().unwrap()).unwrap();
    assert_eq!(runner.state(), RunnerState::Created);
    runner.start();

    let snapshot = loop {
        if runner.state() == RunnerState::Finished {
            break runner.snapshot();
        }
        assert_ne!(runner.state(), RunnerState::Error, "{:?}", runner.error_message());
        std::thread::sleep(std::time::Duration::from_millis(10));
    };
    assert_eq!(runner.frame_count(), 20);
    assert_eq!(snapshot.len(), 300);
    for p in &snapshot.positions {
        assert!((0.0..=1280.0).contains(&p[0]) && (0.0..=720.0).contains(&p[1]), "{:?}", p);
    }
    runner.join().unwrap();
    std::fs::remove_dir_all(&dir).ok();
}
