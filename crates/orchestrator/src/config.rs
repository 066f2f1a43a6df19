//! Configuration parsing and validation for fluid simulations

use kernel::{Dimension, Layout, SolverConfig, MAX_PARTICLES};
use serde::{Deserialize, Serialize};
use std::fs;

/// Main simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable simulation name
    pub name: String,
    /// Planar or volumetric simulation
    #[serde(default = "default_dimension")]
    pub dimension: Dimension,
    /// Number of particles at start
    #[serde(default = "default_particle_count")]
    pub particle_count: usize,
    /// Arrangement of the initial particles
    #[serde(default)]
    pub initial_layout: Layout,
    /// Physics parameters handed to the kernel
    #[serde(default)]
    pub solver: SolverConfig,
    /// Gravity rotation in the XY plane per frame (degrees, 0 disables)
    #[serde(default)]
    pub gravity_rotation_step_deg: f32,
    /// Stop after this many frames
    pub max_frames: Option<u64>,
    /// Pace frames to this rate; unpaced when absent
    pub target_fps: Option<f32>,
    /// Size of a dedicated rayon pool; the global pool when absent
    pub worker_threads: Option<usize>,
}

// Default values
fn default_dimension() -> Dimension {
    Dimension::Two
}

fn default_particle_count() -> usize {
    4096
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            name: "fluid".to_string(),
            dimension: default_dimension(),
            particle_count: default_particle_count(),
            initial_layout: Layout::default(),
            solver: SolverConfig::default(),
            gravity_rotation_step_deg: 0.0,
            max_frames: None,
            target_fps: None,
            worker_threads: None,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        Self::from_json(&contents)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(contents: &str) -> Result<Self, String> {
        let config: SimulationConfig = serde_json::from_str(contents)
            .map_err(|e| format!("Failed to parse config JSON: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.solver
            .validate(self.dimension)
            .map_err(|e| format!("Invalid solver config: {}", e))?;
        self.initial_layout
            .validate()
            .map_err(|e| format!("Invalid initial layout: {}", e))?;

        if self.particle_count == 0 {
            return Err("particle_count must be at least 1".to_string());
        }
        if self.particle_count > MAX_PARTICLES {
            return Err(format!(
                "particle_count {} exceeds the maximum of {}",
                self.particle_count, MAX_PARTICLES
            ));
        }

        if !self.gravity_rotation_step_deg.is_finite() {
            return Err("gravity_rotation_step_deg must be finite".to_string());
        }

        if let Some(max_frames) = self.max_frames {
            if max_frames == 0 {
                return Err("max_frames must be at least 1".to_string());
            }
        }

        if let Some(fps) = self.target_fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err("target_fps must be positive".to_string());
            }
        }

        if let Some(threads) = self.worker_threads {
            if threads == 0 {
                return Err("worker_threads must be at least 1".to_string());
            }
        }

        Ok(())
    }

    /// Wall-clock time per frame when pacing is enabled
    pub fn frame_interval(&self) -> Option<std::time::Duration> {
        self.target_fps
            .map(|fps| std::time::Duration::from_secs_f64(1.0 / fps as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config = SimulationConfig::from_json(r#"{ "name": "minimal" }"#).unwrap();

        assert_eq!(config.name, "minimal");
        assert_eq!(config.dimension, Dimension::Two);
        assert_eq!(config.particle_count, 4096);
        assert_eq!(config.initial_layout, Layout::Grid { scale: 1.0 });
        assert_eq!(config.solver.smoothing_radius, 10.0);
        assert!(config.max_frames.is_none());
        assert!(config.frame_interval().is_none());
    }

    #[test]
    fn test_full_json() {
        let json = r#"{
            "name": "sphere",
            "dimension": "Three",
            "particle_count": 2000,
            "initial_layout": { "Disc": { "scale": 0.5 } },
            "solver": {
                "smoothing_radius": 12.0,
                "boundary": { "Circle": { "center": [500, 500, 500], "radius": 300 } }
            },
            "gravity_rotation_step_deg": 0.5,
            "max_frames": 600,
            "target_fps": 60,
            "worker_threads": 4
        }"#;
        let config = SimulationConfig::from_json(json).unwrap();

        assert_eq!(config.dimension, Dimension::Three);
        assert_eq!(config.initial_layout, Layout::Disc { scale: 0.5 });
        assert_eq!(config.solver.smoothing_radius, 12.0);
        assert_eq!(config.solver.delta_time, 1.0 / 60.0);
        assert_eq!(config.max_frames, Some(600));
        assert_eq!(config.worker_threads, Some(4));
        let interval = config.frame_interval().unwrap();
        assert!((interval.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_validation_solver_errors_propagate() {
        let mut config = SimulationConfig::default();
        config.solver.smoothing_radius = -1.0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("smoothing radius"), "{err}");

        config.solver.smoothing_radius = 10.0;
        config.solver.bounds_min = [0.0, 0.0, 5.0];
        config.solver.bounds_max = [10.0, 10.0, 0.0];
        // z is not simulated in 2D.
        assert!(config.validate().is_ok());
        config.dimension = Dimension::Three;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_counts_and_limits() {
        let mut config = SimulationConfig::default();
        assert!(config.validate().is_ok());

        config.particle_count = 0;
        assert!(config.validate().is_err());
        config.particle_count = 10;

        config.max_frames = Some(0);
        assert!(config.validate().is_err());
        config.max_frames = Some(1);

        config.target_fps = Some(0.0);
        assert!(config.validate().is_err());
        config.target_fps = None;

        config.worker_threads = Some(0);
        assert!(config.validate().is_err());
        config.worker_threads = Some(2);

        config.initial_layout = Layout::Grid { scale: 2.0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = SimulationConfig::load("/nonexistent/fluid.json").unwrap_err();
        assert!(err.starts_with("Failed to read config file"));
    }
}
