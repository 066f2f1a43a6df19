//! Orchestration Layer
//!
//! This crate wires the SPH kernel into a runnable simulation:
//! - JSON configuration loading and validation
//! - Kernel construction for the configured dimension and initial layout
//! - Simulation runner with lifecycle management on a background thread

#![warn(missing_docs)]

pub mod config;
pub mod runner;

pub use config::SimulationConfig;
pub use runner::{RunnerSettings, RunnerState, SimulationRunner};

use glam::{Vec2, Vec3};
use kernel::{Dimension, FluidSolver, SimulationKernel};

/// Create a complete simulation from a configuration file
///
/// This function performs the full simulation setup pipeline:
/// 1. Load and validate the configuration
/// 2. Build the kernel for the configured dimension and seed its particles
/// 3. Wrap it in a SimulationRunner for lifecycle management
///
/// # Arguments
/// * `config_path` - Path to the JSON configuration file
///
/// # Returns
/// A `SimulationRunner` ready to be started, or an error if setup fails
///
/// # Example
/// ```no_run
/// use orchestrator::create_simulation;
///
/// let runner = create_simulation("configs/dam_break_2d.json")?;
/// runner.start();
/// // ... query status, pause, resume, etc.
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_simulation(config_path: &str) -> Result<SimulationRunner, Box<dyn std::error::Error>> {
    tracing::info!("Creating simulation from config: {}", config_path);

    // 1. Load and validate configuration
    let config = SimulationConfig::load(config_path)?;
    tracing::info!("Configuration loaded: {}", config.name);

    // 2. Build the kernel
    let kernel = create_kernel(&config)?;

    // 3. Wrap in SimulationRunner
    tracing::info!("Creating simulation runner...");
    let runner = SimulationRunner::new(kernel, RunnerSettings::from(&config));

    tracing::info!("Simulation ready to start");
    Ok(runner)
}

/// Create a simulation kernel for `config.dimension`.
///
/// Particles are placed with `config.initial_layout` inside the solver bounds.
pub fn create_kernel(config: &SimulationConfig) -> Result<Box<dyn SimulationKernel + Send>, String> {
    config.validate()?;

    let solver = config.solver.clone();
    let count = config.particle_count;
    let layout = config.initial_layout;

    let kernel: Box<dyn SimulationKernel + Send> = match config.dimension {
        Dimension::Two => {
            tracing::info!("Creating 2D fluid kernel ({} particles, {:?})", count, layout);
            Box::new(
                FluidSolver::<Vec2>::with_layout(solver, count, layout)
                    .map_err(|e| format!("Failed to create 2D kernel: {}", e))?,
            )
        }
        Dimension::Three => {
            tracing::info!("Creating 3D fluid kernel ({} particles, {:?})", count, layout);
            Box::new(
                FluidSolver::<Vec3>::with_layout(solver, count, layout)
                    .map_err(|e| format!("Failed to create 3D kernel: {}", e))?,
            )
        }
    };
    Ok(kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::Layout;

    #[test]
    fn test_create_kernel_per_dimension() {
        let mut config = SimulationConfig {
            particle_count: 64,
            ..SimulationConfig::default()
        };

        let kernel = create_kernel(&config).unwrap();
        assert_eq!(kernel.dimension(), Dimension::Two);
        assert_eq!(kernel.particle_count(), 64);

        config.dimension = Dimension::Three;
        config.initial_layout = Layout::Disc { scale: 0.5 };
        let kernel = create_kernel(&config).unwrap();
        assert_eq!(kernel.dimension(), Dimension::Three);
        let snapshot = kernel.snapshot();
        assert_eq!(snapshot.len(), 64);

        // Disc of half the inscribed radius around the box centre
        for p in &snapshot.positions {
            let d = ((p[0] - 500.0).powi(2) + (p[1] - 500.0).powi(2) + (p[2] - 500.0).powi(2)).sqrt();
            assert!(d <= 250.0 + 1e-3, "particle outside disc: {:?}", p);
        }
    }

    #[test]
    fn test_create_kernel_rejects_invalid_config() {
        let config = SimulationConfig {
            particle_count: 0,
            ..SimulationConfig::default()
        };
        assert!(create_kernel(&config).is_err());
    }

    #[test]
    fn test_create_simulation_missing_file() {
        assert!(create_simulation("/nonexistent/fluid.json").is_err());
    }
}
