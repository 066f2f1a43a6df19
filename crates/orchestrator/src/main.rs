//! Headless driver
//!
//! Runs a simulation from a JSON config without a renderer, logging frame
//! metrics once per second.
//!
//! Usage: `fluid-headless <config.json> [snapshot-out.json]`

use orchestrator::{create_simulation, RunnerState};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orchestrator=info,kernel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        eprintln!("usage: fluid-headless <config.json> [snapshot-out.json]");
        return ExitCode::FAILURE;
    };
    let snapshot_path = args.next();

    let runner = match create_simulation(&config_path) {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!("Setup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runner.start();

    loop {
        thread::sleep(Duration::from_secs(1));
        let metrics = runner.metrics();
        tracing::info!(
            "frame {} | t={:.2}s | {} particles | density mean {:.4} max {:.4} | max speed {:.2} | step {:.2} ms",
            runner.frame_count(),
            runner.sim_time(),
            metrics.particle_count,
            metrics.mean_density,
            metrics.max_density,
            metrics.max_speed,
            metrics.step_time.as_secs_f64() * 1000.0,
        );
        if matches!(runner.state(), RunnerState::Finished | RunnerState::Error) {
            break;
        }
    }

    let snapshot = runner.snapshot();
    if let Err(e) = runner.join() {
        tracing::error!("Simulation failed: {}", e);
        return ExitCode::FAILURE;
    }

    if let Some(path) = snapshot_path {
        let written = serde_json::to_string(snapshot.as_ref())
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => tracing::info!("Wrote {} particles to {}", snapshot.len(), path),
            Err(e) => {
                tracing::error!("Failed to write snapshot {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
